use crate::types::error::TradeError;
use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

/// Anchor account discriminators for the curve and global accounts.
const BONDING_CURVE_DISCRIMINATOR_LEN: usize = 8;

/// Bonding-curve state account. Layout shared by pump.fun and pump.pro.
#[derive(Debug, Clone, BorshDeserialize)]
pub struct BondingCurveAccount {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
    pub creator: [u8; 32],
    pub is_mayhem_mode: bool,
}

/// Launchpad global config account. Carries the normal fee recipient and the
/// Mayhem-mode allowlist.
#[derive(Debug, Clone, BorshDeserialize)]
pub struct GlobalConfigAccount {
    pub initialized: bool,
    pub authority: [u8; 32],
    pub fee_recipient: [u8; 32],
    pub fee_basis_points: u64,
    pub mayhem_fee_recipients: Vec<[u8; 32]>,
}

impl BondingCurveAccount {
    /// Parse from raw account data, skipping the 8-byte discriminator.
    /// Tolerates trailing bytes so layout extensions do not break the parse.
    pub fn parse(data: &[u8]) -> Result<Self, TradeError> {
        if data.len() <= BONDING_CURVE_DISCRIMINATOR_LEN {
            return Err(TradeError::Rpc(format!(
                "bonding curve account too short: {} bytes",
                data.len()
            )));
        }
        let mut rest = &data[BONDING_CURVE_DISCRIMINATOR_LEN..];
        BondingCurveAccount::deserialize(&mut rest)
            .map_err(|e| TradeError::Rpc(format!("bonding curve layout mismatch: {e}")))
    }

    /// Spot price in SOL per whole token (6-decimal launchpad tokens).
    pub fn price_sol_per_token(&self) -> f64 {
        if self.virtual_token_reserves == 0 {
            return 0.0;
        }
        let sol = self.virtual_sol_reserves as f64 / 1e9;
        let tokens = self.virtual_token_reserves as f64 / 1e6;
        sol / tokens
    }

    /// Constant-product buy quote: token base units out for lamports in.
    pub fn buy_quote(&self, lamports_in: u64) -> u64 {
        if lamports_in == 0 || self.virtual_sol_reserves == 0 {
            return 0;
        }
        let k = self.virtual_sol_reserves as u128 * self.virtual_token_reserves as u128;
        let new_sol = self.virtual_sol_reserves as u128 + lamports_in as u128;
        let new_tokens = k / new_sol;
        let out = self.virtual_token_reserves as u128 - new_tokens;
        // the curve can never pay out more than it actually holds
        out.min(self.real_token_reserves as u128) as u64
    }

    /// Constant-product sell quote: lamports out for token base units in.
    pub fn sell_quote(&self, tokens_in: u64) -> u64 {
        if tokens_in == 0 || self.virtual_token_reserves == 0 {
            return 0;
        }
        let k = self.virtual_sol_reserves as u128 * self.virtual_token_reserves as u128;
        let new_tokens = self.virtual_token_reserves as u128 + tokens_in as u128;
        let new_sol = k / new_tokens;
        let out = self.virtual_sol_reserves as u128 - new_sol;
        out.min(self.real_sol_reserves as u128) as u64
    }
}

impl GlobalConfigAccount {
    pub fn parse(data: &[u8]) -> Result<Self, TradeError> {
        if data.len() <= BONDING_CURVE_DISCRIMINATOR_LEN {
            return Err(TradeError::Rpc(format!(
                "global config account too short: {} bytes",
                data.len()
            )));
        }
        let mut rest = &data[BONDING_CURVE_DISCRIMINATOR_LEN..];
        GlobalConfigAccount::deserialize(&mut rest)
            .map_err(|e| TradeError::Rpc(format!("global config layout mismatch: {e}")))
    }

    /// Fee recipient for the sell/buy instruction. Mayhem mode redirects
    /// fees to an allowlisted recipient; the account index stays the same.
    pub fn resolve_fee_recipient(&self, curve: &BondingCurveAccount) -> Pubkey {
        if curve.is_mayhem_mode {
            if let Some(first) = self.mayhem_fee_recipients.first() {
                return Pubkey::new_from_array(*first);
            }
        }
        Pubkey::new_from_array(self.fee_recipient)
    }
}

/// Minimum acceptable lamports out for a sell. Slippage-derived, but never
/// below 1% of the expected output: a zero floor invites MEV sandwiching.
pub fn min_sol_output(expected_lamports: u64, slippage_bps: u16) -> u64 {
    let slip = expected_lamports as u128 * slippage_bps as u128 / 10_000;
    let after_slippage = expected_lamports as u128 - slip;
    let floor = (expected_lamports as u128 / 100).max(1);
    after_slippage.max(floor) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use borsh::BorshSerialize;

    fn curve(virtual_sol: u64, virtual_tokens: u64, complete: bool) -> BondingCurveAccount {
        BondingCurveAccount {
            virtual_token_reserves: virtual_tokens,
            virtual_sol_reserves: virtual_sol,
            real_token_reserves: virtual_tokens,
            real_sol_reserves: virtual_sol,
            token_total_supply: 1_000_000_000_000_000,
            complete,
            creator: Pubkey::new_unique().to_bytes(),
            is_mayhem_mode: false,
        }
    }

    #[derive(BorshSerialize)]
    struct CurveWire {
        virtual_token_reserves: u64,
        virtual_sol_reserves: u64,
        real_token_reserves: u64,
        real_sol_reserves: u64,
        token_total_supply: u64,
        complete: bool,
        creator: [u8; 32],
        is_mayhem_mode: bool,
    }

    #[test]
    fn parses_account_data_with_discriminator_and_trailing_bytes() {
        let wire = CurveWire {
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
            creator: Pubkey::new_unique().to_bytes(),
            is_mayhem_mode: true,
        };
        let mut data = vec![0u8; 8];
        wire.serialize(&mut data).unwrap();
        data.extend_from_slice(&[0u8; 16]); // future layout extension
        let parsed = BondingCurveAccount::parse(&data).unwrap();
        assert_eq!(parsed.virtual_sol_reserves, 30_000_000_000);
        assert!(!parsed.complete);
        assert!(parsed.is_mayhem_mode);
    }

    #[test]
    fn rejects_truncated_account() {
        assert!(BondingCurveAccount::parse(&[0u8; 8]).is_err());
    }

    #[test]
    fn buy_then_sell_loses_to_the_curve() {
        let c = curve(30_000_000_000, 1_073_000_000_000_000, false);
        let tokens = c.buy_quote(1_000_000_000);
        assert!(tokens > 0);
        let sol_back = c.sell_quote(tokens);
        // same pre-trade reserves, so the round trip can't profit
        assert!(sol_back <= 1_000_000_000);
    }

    #[test]
    fn quotes_are_monotonic() {
        let c = curve(30_000_000_000, 1_073_000_000_000_000, false);
        assert!(c.buy_quote(2_000_000_000) > c.buy_quote(1_000_000_000));
        assert!(c.sell_quote(2_000_000) > c.sell_quote(1_000_000));
        assert_eq!(c.buy_quote(0), 0);
        assert_eq!(c.sell_quote(0), 0);
    }

    #[test]
    fn min_sol_output_floors_at_one_percent() {
        // 0.5% slippage leaves 99.5% of expected
        assert_eq!(min_sol_output(10_000, 50), 9_950);
        // 99.99% slippage would round to ~0, the MEV floor holds at 1%
        assert_eq!(min_sol_output(10_000, 9_999), 100);
        // boundary slippage values still respect the floor
        assert_eq!(min_sol_output(10_000, 5_000), 5_000);
        assert!(min_sol_output(1, 9_999) >= 1);
    }

    #[test]
    fn mayhem_mode_redirects_fee_recipient() {
        let normal = Pubkey::new_unique();
        let mayhem = Pubkey::new_unique();
        let global = GlobalConfigAccount {
            initialized: true,
            authority: Pubkey::new_unique().to_bytes(),
            fee_recipient: normal.to_bytes(),
            fee_basis_points: 100,
            mayhem_fee_recipients: vec![mayhem.to_bytes()],
        };
        let mut c = curve(1, 1, false);
        assert_eq!(global.resolve_fee_recipient(&c), normal);
        c.is_mayhem_mode = true;
        assert_eq!(global.resolve_fee_recipient(&c), mayhem);
    }
}
