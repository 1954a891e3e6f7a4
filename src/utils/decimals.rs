pub const LAMPORTS_PER_SOL_F64: f64 = 1_000_000_000.0;

pub fn tokens_to_ui_amount_with_decimals_f64(amount: u64, decimals: u8) -> f64 {
    if amount == 0 {
        return 0.0;
    }
    let divisor = 10u64.checked_pow(decimals as u32).unwrap_or(u64::MAX);
    amount as f64 / divisor as f64
}

pub fn ui_amount_with_decimals_to_tokens(amount: f64, decimals: u8) -> u64 {
    if amount == 0.0 {
        return 0;
    }
    let multiplier = 10u64.checked_pow(decimals as u32).unwrap_or(u64::MAX);
    (amount * multiplier as f64) as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL_F64
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL_F64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lamports_round_trip() {
        assert_eq!(sol_to_lamports(1.5), 1_500_000_000);
        assert_eq!(lamports_to_sol(1_500_000_000), 1.5);
    }

    #[test]
    fn test_token_ui_amount() {
        assert_eq!(tokens_to_ui_amount_with_decimals_f64(1_000_000, 6), 1.0);
        assert_eq!(ui_amount_with_decimals_to_tokens(2.5, 6), 2_500_000);
        assert_eq!(tokens_to_ui_amount_with_decimals_f64(0, 9), 0.0);
    }
}
