use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

pub const PUMPFUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";
pub const PUMP_PRO_PROGRAM_ID: &str = "proVF4pMXVaYqmy4NjniPh4pqKNfMmsihgd4wdkCX3u";
pub const METEORA_DBC_PROGRAM_ID: &str = "dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN";
pub const METAPLEX_METADATA_PROGRAM_ID: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";
pub const WSOL_MINT_ADDRESS: &str = "So11111111111111111111111111111111111111112";

pub static PUMPFUN_PROGRAM_PUBKEY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(PUMPFUN_PROGRAM_ID).unwrap());
pub static PUMP_PRO_PROGRAM_PUBKEY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(PUMP_PRO_PROGRAM_ID).unwrap());
pub static METEORA_DBC_PROGRAM_PUBKEY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(METEORA_DBC_PROGRAM_ID).unwrap());
pub static METAPLEX_METADATA_PROGRAM_PUBKEY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(METAPLEX_METADATA_PROGRAM_ID).unwrap());
pub static TOKEN_2022_PROGRAM_PUBKEY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(TOKEN_2022_PROGRAM_ID).unwrap());
pub static WSOL_MINT_PUBKEY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(WSOL_MINT_ADDRESS).unwrap());

/// First 8 bytes of instruction data, pinned from the launchpad IDLs.
pub mod discriminators {
    /// pump.fun legacy `create` (inline metadata, legacy SPL mint).
    pub const PUMPFUN_CREATE: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
    /// pump.fun `create_v2` (Token-2022 mint).
    pub const PUMPFUN_CREATE_V2: [u8; 8] = [214, 144, 76, 236, 95, 139, 49, 180];
    /// pump.pro `create` (short instruction data, metadata off-chain).
    pub const PUMP_PRO_CREATE: [u8; 8] = [147, 241, 123, 100, 244, 132, 174, 118];
    /// Bonding-curve `buy` / `sell`, shared by pump.fun and pump.pro.
    pub const CURVE_BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
    pub const CURVE_SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
    /// Meteora DBC pool creation variants.
    pub const DBC_INITIALIZE_POOL: [u8; 8] = [95, 180, 10, 172, 84, 174, 232, 40];
    pub const DBC_CREATE_POOL: [u8; 8] = [233, 146, 209, 142, 207, 104, 64, 188];
}

/// Instructions the discovery and routing paths can identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownInstruction {
    PumpfunCreate,
    PumpfunCreateV2,
    PumpProCreate,
    CurveBuy,
    CurveSell,
    DbcInitializePool,
    DbcCreatePool,
}

impl KnownInstruction {
    pub fn name(&self) -> &'static str {
        match self {
            KnownInstruction::PumpfunCreate => "create",
            KnownInstruction::PumpfunCreateV2 => "create_v2",
            KnownInstruction::PumpProCreate => "create_pro",
            KnownInstruction::CurveBuy => "buy",
            KnownInstruction::CurveSell => "sell",
            KnownInstruction::DbcInitializePool => "initialize_pool",
            KnownInstruction::DbcCreatePool => "create_pool",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            KnownInstruction::PumpfunCreate
                | KnownInstruction::PumpfunCreateV2
                | KnownInstruction::PumpProCreate
                | KnownInstruction::DbcInitializePool
                | KnownInstruction::DbcCreatePool
        )
    }

    /// IDL account ordering by name. Instruction builders index into this to
    /// keep account positions exact.
    pub fn account_ordering(&self) -> &'static [&'static str] {
        match self {
            KnownInstruction::CurveSell => &[
                "global",
                "fee_recipient",
                "mint",
                "bonding_curve",
                "associated_bonding_curve",
                "associated_user",
                "user",
                "system_program",
                "associated_token_program",
                "token_program",
                "event_authority",
                "program",
            ],
            KnownInstruction::CurveBuy => &[
                "global",
                "fee_recipient",
                "mint",
                "bonding_curve",
                "associated_bonding_curve",
                "associated_user",
                "user",
                "system_program",
                "token_program",
                "rent",
                "event_authority",
                "program",
            ],
            KnownInstruction::PumpfunCreate | KnownInstruction::PumpfunCreateV2 => &[
                "mint",
                "mint_authority",
                "bonding_curve",
                "associated_bonding_curve",
                "global",
                "mpl_token_metadata",
                "metadata",
                "user",
                "system_program",
                "token_program",
                "associated_token_program",
                "rent",
                "event_authority",
                "program",
            ],
            KnownInstruction::PumpProCreate => &[
                "mint",
                "bonding_curve",
                "associated_bonding_curve",
                "global",
                "user",
                "system_program",
                "token_program",
                "event_authority",
                "program",
            ],
            KnownInstruction::DbcInitializePool | KnownInstruction::DbcCreatePool => &[
                "config",
                "pool_authority",
                "creator",
                "base_mint",
                "quote_mint",
                "pool",
                "base_vault",
                "quote_vault",
                "payer",
                "token_program",
                "system_program",
                "event_authority",
                "program",
            ],
        }
    }
}

/// Identify an instruction from its program id and the first 8 bytes of its
/// data. Pinned IDL data only, nothing fetched at runtime.
pub fn identify_instruction(program_id: &Pubkey, data_first_8: &[u8]) -> Option<KnownInstruction> {
    if data_first_8.len() < 8 {
        return None;
    }
    let disc: [u8; 8] = data_first_8[..8].try_into().ok()?;
    use discriminators::*;
    if *program_id == *PUMPFUN_PROGRAM_PUBKEY {
        return match disc {
            PUMPFUN_CREATE => Some(KnownInstruction::PumpfunCreate),
            PUMPFUN_CREATE_V2 => Some(KnownInstruction::PumpfunCreateV2),
            CURVE_BUY => Some(KnownInstruction::CurveBuy),
            CURVE_SELL => Some(KnownInstruction::CurveSell),
            _ => None,
        };
    }
    if *program_id == *PUMP_PRO_PROGRAM_PUBKEY {
        return match disc {
            PUMP_PRO_CREATE => Some(KnownInstruction::PumpProCreate),
            CURVE_BUY => Some(KnownInstruction::CurveBuy),
            CURVE_SELL => Some(KnownInstruction::CurveSell),
            _ => None,
        };
    }
    if *program_id == *METEORA_DBC_PROGRAM_PUBKEY {
        return match disc {
            DBC_INITIALIZE_POOL => Some(KnownInstruction::DbcInitializePool),
            DBC_CREATE_POOL => Some(KnownInstruction::DbcCreatePool),
            _ => None,
        };
    }
    None
}

pub fn derive_pda(seeds: &[&[u8]], program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(seeds, program_id)
}

/// Bonding-curve state PDA for a launchpad mint.
pub fn bonding_curve_pda(mint: &Pubkey, launchpad_program: &Pubkey) -> Pubkey {
    derive_pda(&[b"bonding-curve", mint.as_ref()], launchpad_program).0
}

/// Launchpad global config PDA.
pub fn global_pda(launchpad_program: &Pubkey) -> Pubkey {
    derive_pda(&[b"global"], launchpad_program).0
}

/// Anchor event authority PDA.
pub fn event_authority_pda(launchpad_program: &Pubkey) -> Pubkey {
    derive_pda(&[b"__event_authority"], launchpad_program).0
}

/// Metaplex Metadata PDA for a mint.
pub fn metadata_pda(mint: &Pubkey) -> Pubkey {
    derive_pda(
        &[
            b"metadata",
            METAPLEX_METADATA_PROGRAM_PUBKEY.as_ref(),
            mint.as_ref(),
        ],
        &METAPLEX_METADATA_PROGRAM_PUBKEY,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_pumpfun_creates() {
        let legacy = identify_instruction(
            &PUMPFUN_PROGRAM_PUBKEY,
            &discriminators::PUMPFUN_CREATE,
        );
        assert_eq!(legacy, Some(KnownInstruction::PumpfunCreate));
        let v2 = identify_instruction(
            &PUMPFUN_PROGRAM_PUBKEY,
            &discriminators::PUMPFUN_CREATE_V2,
        );
        assert_eq!(v2, Some(KnownInstruction::PumpfunCreateV2));
        assert!(v2.unwrap().is_create());
    }

    #[test]
    fn create_pro_only_matches_pump_pro_program() {
        assert_eq!(
            identify_instruction(&PUMP_PRO_PROGRAM_PUBKEY, &discriminators::PUMP_PRO_CREATE),
            Some(KnownInstruction::PumpProCreate)
        );
        assert_eq!(
            identify_instruction(&PUMPFUN_PROGRAM_PUBKEY, &discriminators::PUMP_PRO_CREATE),
            None
        );
    }

    #[test]
    fn unknown_program_and_short_data_yield_none() {
        let random = Pubkey::new_unique();
        assert_eq!(
            identify_instruction(&random, &discriminators::CURVE_BUY),
            None
        );
        assert_eq!(identify_instruction(&PUMPFUN_PROGRAM_PUBKEY, &[1, 2, 3]), None);
    }

    #[test]
    fn sell_account_ordering_matches_idl() {
        let ordering = KnownInstruction::CurveSell.account_ordering();
        assert_eq!(ordering.len(), 12);
        assert_eq!(ordering[0], "global");
        assert_eq!(ordering[1], "fee_recipient");
        assert_eq!(ordering[6], "user");
        assert_eq!(ordering[8], "associated_token_program");
        assert_eq!(ordering[9], "token_program");
    }

    #[test]
    fn pda_derivation_is_deterministic() {
        let mint = Pubkey::new_unique();
        let a = bonding_curve_pda(&mint, &PUMPFUN_PROGRAM_PUBKEY);
        let b = bonding_curve_pda(&mint, &PUMPFUN_PROGRAM_PUBKEY);
        assert_eq!(a, b);
        // different program, different PDA
        let c = bonding_curve_pda(&mint, &PUMP_PRO_PROGRAM_PUBKEY);
        assert_ne!(a, c);
    }
}
