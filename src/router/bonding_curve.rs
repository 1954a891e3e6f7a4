use crate::config::constants::BROADCAST_TIMEOUT;
use crate::programs::pump_curve::{min_sol_output, BondingCurveAccount, GlobalConfigAccount};
use crate::programs::registry::{
    self, KnownInstruction, METEORA_DBC_PROGRAM_PUBKEY, PUMPFUN_PROGRAM_PUBKEY,
    PUMP_PRO_PROGRAM_PUBKEY, TOKEN_2022_PROGRAM_PUBKEY,
};
use crate::router::{Quote, SwapIntent, SwapResult, SwapRouter};
use crate::solana::rpc_fanout::RpcFanout;
use crate::types::candidate::LaunchSource;
use crate::types::error::TradeError;
use crate::types::execution::TradeSide;
use async_trait::async_trait;
use serde_json::json;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::sysvar::rent;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use tracing::{debug, instrument};

/// Meteora DBC `swap`, used for Bags tokens still on the dynamic curve.
const DBC_SWAP_DISCRIMINATOR: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];

/// Routes pre-graduation swaps straight against the launchpad's bonding
/// curve program with IDL-exact account ordering.
pub struct BondingCurveRouter {
    rpc: RpcFanout,
}

/// Everything read on-chain before an instruction can be assembled.
struct CurveContext {
    program: Pubkey,
    curve_pda: Pubkey,
    curve: BondingCurveAccount,
    global: GlobalConfigAccount,
    token_program: Pubkey,
}

impl BondingCurveRouter {
    pub fn new(rpc: RpcFanout) -> Self {
        Self { rpc }
    }

    #[cfg(test)]
    pub fn stub_for_tests() -> Self {
        use solana_sdk::commitment_config::CommitmentConfig;
        Self {
            rpc: RpcFanout::new(
                &["http://localhost:8899".to_string()],
                CommitmentConfig::confirmed(),
            ),
        }
    }

    fn launchpad_program(&self, source: LaunchSource, curve_owner: Option<&Pubkey>) -> Pubkey {
        match source {
            LaunchSource::Bags => *METEORA_DBC_PROGRAM_PUBKEY,
            LaunchSource::Pumpfun => match curve_owner {
                Some(owner) if *owner == *PUMP_PRO_PROGRAM_PUBKEY => *PUMP_PRO_PROGRAM_PUBKEY,
                _ => *PUMPFUN_PROGRAM_PUBKEY,
            },
        }
    }

    /// Load curve + global state and detect the mint's token program. The
    /// mint account owner decides legacy SPL vs Token-2022; both ATAs are
    /// derived under the detected program.
    async fn load_curve_context(&self, intent: &SwapIntent) -> Result<CurveContext, TradeError> {
        let mint_account = self
            .rpc
            .get_account_optional(&intent.mint)
            .await?
            .ok_or_else(|| TradeError::InvalidAddress(intent.mint.to_string()))?;
        let token_program = if mint_account.owner == *TOKEN_2022_PROGRAM_PUBKEY {
            *TOKEN_2022_PROGRAM_PUBKEY
        } else {
            spl_token::id()
        };

        // a discovered curve address wins; otherwise derive the canonical
        // PDA and fall back on the account owner
        let (curve_pda, curve_account, program) = if let Some(known) = intent.bonding_curve {
            let account = self
                .rpc
                .get_account_optional(&known)
                .await?
                .ok_or_else(|| TradeError::LifecycleUnknown(intent.mint.to_string()))?;
            let owner = account.owner;
            (known, account, owner)
        } else {
            let mut program = self.launchpad_program(intent.launch_source, None);
            let mut curve_pda = registry::bonding_curve_pda(&intent.mint, &program);
            let account = match self.rpc.get_account_optional(&curve_pda).await? {
                Some(account) => {
                    program = self.launchpad_program(intent.launch_source, Some(&account.owner));
                    account
                }
                None => {
                    let alt_program = *PUMP_PRO_PROGRAM_PUBKEY;
                    let alt_pda = registry::bonding_curve_pda(&intent.mint, &alt_program);
                    let account = self
                        .rpc
                        .get_account_optional(&alt_pda)
                        .await?
                        .ok_or_else(|| TradeError::NoLiquidity(intent.mint.to_string()))?;
                    program = alt_program;
                    curve_pda = alt_pda;
                    account
                }
            };
            (curve_pda, account, program)
        };

        let curve = BondingCurveAccount::parse(&curve_account.data)?;
        if curve.complete {
            // migrated away from the curve; the router must not touch it
            return Err(TradeError::LifecycleUnknown(intent.mint.to_string()));
        }

        let global_account = self
            .rpc
            .get_account(&registry::global_pda(&program))
            .await?;
        let global = GlobalConfigAccount::parse(&global_account.data)?;

        Ok(CurveContext {
            program,
            curve_pda,
            curve,
            global,
            token_program,
        })
    }

    fn curve_quote(ctx: &CurveContext, intent: &SwapIntent) -> Result<Quote, TradeError> {
        let (expected_out, min_out) = match intent.side {
            TradeSide::Buy => {
                let out = ctx.curve.buy_quote(intent.amount_in);
                if out == 0 {
                    return Err(TradeError::NoLiquidity(intent.mint.to_string()));
                }
                let slip = out as u128 * intent.slippage_bps as u128 / 10_000;
                (out, (out as u128 - slip) as u64)
            }
            TradeSide::Sell => {
                let out = ctx.curve.sell_quote(intent.amount_in);
                if out == 0 {
                    return Err(TradeError::NoLiquidity(intent.mint.to_string()));
                }
                // sell floor: never below 1% of expected even when slippage
                // math rounds to zero
                (out, min_sol_output(out, intent.slippage_bps))
            }
        };
        Ok(Quote {
            expected_out,
            min_out,
            price_sol_per_token: ctx.curve.price_sol_per_token(),
            route_label: format!("curve:{}", ctx.program),
            raw: json!({
                "virtual_sol_reserves": ctx.curve.virtual_sol_reserves,
                "virtual_token_reserves": ctx.curve.virtual_token_reserves,
                "is_mayhem_mode": ctx.curve.is_mayhem_mode,
                "complete": ctx.curve.complete,
            }),
        })
    }

    /// Assemble the venue instruction with the registry's account ordering.
    /// The fee recipient sits at the exact index the IDL specifies, resolved
    /// through the Mayhem allowlist when the curve state demands it.
    fn build_curve_instruction(
        ctx: &CurveContext,
        intent: &SwapIntent,
        quote: &Quote,
    ) -> Instruction {
        let fee_recipient = ctx.global.resolve_fee_recipient(&ctx.curve);
        let associated_bonding_curve = get_associated_token_address_with_program_id(
            &ctx.curve_pda,
            &intent.mint,
            &ctx.token_program,
        );
        let associated_user = get_associated_token_address_with_program_id(
            &intent.user,
            &intent.mint,
            &ctx.token_program,
        );
        let global = registry::global_pda(&ctx.program);
        let event_authority = registry::event_authority_pda(&ctx.program);

        if ctx.program == *METEORA_DBC_PROGRAM_PUBKEY {
            let mut data = DBC_SWAP_DISCRIMINATOR.to_vec();
            data.extend_from_slice(&intent.amount_in.to_le_bytes());
            data.extend_from_slice(&quote.min_out.to_le_bytes());
            return Instruction {
                program_id: ctx.program,
                accounts: vec![
                    AccountMeta::new_readonly(global, false),
                    AccountMeta::new(ctx.curve_pda, false),
                    AccountMeta::new_readonly(intent.mint, false),
                    AccountMeta::new(associated_bonding_curve, false),
                    AccountMeta::new(associated_user, false),
                    AccountMeta::new(intent.user, true),
                    AccountMeta::new_readonly(ctx.token_program, false),
                    AccountMeta::new_readonly(event_authority, false),
                    AccountMeta::new_readonly(ctx.program, false),
                ],
                data,
            };
        }

        let (discriminator, args) = match intent.side {
            TradeSide::Buy => (
                registry::discriminators::CURVE_BUY,
                // buy args: token amount out, max SOL cost
                (quote.min_out, intent.amount_in),
            ),
            TradeSide::Sell => (
                registry::discriminators::CURVE_SELL,
                // sell args: token amount in, min SOL output
                (intent.amount_in, quote.min_out),
            ),
        };
        let mut data = discriminator.to_vec();
        data.extend_from_slice(&args.0.to_le_bytes());
        data.extend_from_slice(&args.1.to_le_bytes());

        let ordering = match intent.side {
            TradeSide::Buy => KnownInstruction::CurveBuy.account_ordering(),
            TradeSide::Sell => KnownInstruction::CurveSell.account_ordering(),
        };
        let accounts = ordering
            .iter()
            .map(|name| match *name {
                "global" => AccountMeta::new_readonly(global, false),
                "fee_recipient" => AccountMeta::new(fee_recipient, false),
                "mint" => AccountMeta::new_readonly(intent.mint, false),
                "bonding_curve" => AccountMeta::new(ctx.curve_pda, false),
                "associated_bonding_curve" => AccountMeta::new(associated_bonding_curve, false),
                "associated_user" => AccountMeta::new(associated_user, false),
                "user" => AccountMeta::new(intent.user, true),
                "system_program" => AccountMeta::new_readonly(system_program::id(), false),
                "associated_token_program" => {
                    AccountMeta::new_readonly(spl_associated_token_account::id(), false)
                }
                "token_program" => AccountMeta::new_readonly(ctx.token_program, false),
                "rent" => AccountMeta::new_readonly(rent::id(), false),
                "event_authority" => AccountMeta::new_readonly(event_authority, false),
                "program" => AccountMeta::new_readonly(ctx.program, false),
                other => unreachable!("unknown account name in ordering: {other}"),
            })
            .collect();

        Instruction {
            program_id: ctx.program,
            accounts,
            data,
        }
    }
}

#[async_trait]
impl SwapRouter for BondingCurveRouter {
    fn name(&self) -> &'static str {
        "bonding_curve"
    }

    #[instrument(skip(self), fields(mint = %intent.mint, side = %intent.side))]
    async fn quote(&self, intent: &SwapIntent) -> Result<Quote, TradeError> {
        let ctx = self.load_curve_context(intent).await?;
        let quote = Self::curve_quote(&ctx, intent)?;
        debug!(expected_out = quote.expected_out, min_out = quote.min_out, "curve quote");
        Ok(quote)
    }

    async fn build(
        &self,
        intent: &SwapIntent,
        quote: &Quote,
    ) -> Result<VersionedTransaction, TradeError> {
        let ctx = self.load_curve_context(intent).await?;
        let mut instructions = Vec::with_capacity(4);
        if intent.priority_fee_lamports > 0 {
            instructions.push(
                solana_sdk::compute_budget::ComputeBudgetInstruction::set_compute_unit_price(
                    intent.priority_fee_lamports,
                ),
            );
        }
        // both ATAs derive under the detected token program; either may be
        // missing on a fresh launch and gets a prepended idempotent create
        let curve_ata = get_associated_token_address_with_program_id(
            &ctx.curve_pda,
            &intent.mint,
            &ctx.token_program,
        );
        if self.rpc.get_account_optional(&curve_ata).await?.is_none() {
            instructions.push(create_associated_token_account_idempotent(
                &intent.user,
                &ctx.curve_pda,
                &intent.mint,
                &ctx.token_program,
            ));
        }
        let user_ata = get_associated_token_address_with_program_id(
            &intent.user,
            &intent.mint,
            &ctx.token_program,
        );
        if self.rpc.get_account_optional(&user_ata).await?.is_none() {
            instructions.push(create_associated_token_account_idempotent(
                &intent.user,
                &intent.user,
                &intent.mint,
                &ctx.token_program,
            ));
        }
        instructions.push(Self::build_curve_instruction(&ctx, intent, quote));

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = Message::new_with_blockhash(&instructions, Some(&intent.user), &blockhash);
        Ok(VersionedTransaction {
            signatures: vec![Signature::default(); message.header.num_required_signatures as usize],
            message: VersionedMessage::Legacy(message),
        })
    }

    async fn execute(&self, signed_tx: &VersionedTransaction) -> Result<SwapResult, TradeError> {
        let outcome = self.rpc.broadcast(signed_tx, BROADCAST_TIMEOUT).await?;
        Ok(SwapResult {
            signature: outcome.signature,
            endpoint: outcome.endpoint,
            latency: outcome.latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::pump_curve::BondingCurveAccount;

    fn context_with(curve: BondingCurveAccount, mayhem_recipient: Option<Pubkey>) -> CurveContext {
        CurveContext {
            program: *PUMPFUN_PROGRAM_PUBKEY,
            curve_pda: Pubkey::new_unique(),
            global: GlobalConfigAccount {
                initialized: true,
                authority: Pubkey::new_unique().to_bytes(),
                fee_recipient: Pubkey::new_unique().to_bytes(),
                fee_basis_points: 100,
                mayhem_fee_recipients: mayhem_recipient
                    .into_iter()
                    .map(|k| k.to_bytes())
                    .collect(),
            },
            curve,
            token_program: spl_token::id(),
        }
    }

    fn live_curve(mayhem: bool) -> BondingCurveAccount {
        BondingCurveAccount {
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            real_sol_reserves: 20_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
            creator: Pubkey::new_unique().to_bytes(),
            is_mayhem_mode: mayhem,
        }
    }

    fn intent(side: TradeSide, amount_in: u64, slippage_bps: u16) -> SwapIntent {
        SwapIntent {
            user: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            side,
            amount_in,
            slippage_bps,
            priority_fee_lamports: 0,
            launch_source: LaunchSource::Pumpfun,
            bonding_curve: None,
        }
    }

    #[test]
    fn sell_quote_enforces_mev_floor() {
        let ctx = context_with(live_curve(false), None);
        // extreme slippage rounds min_out to zero without the floor
        let intent = intent(TradeSide::Sell, 1_000_000_000, 9_999);
        let quote = BondingCurveRouter::curve_quote(&ctx, &intent).unwrap();
        assert!(quote.min_out >= quote.expected_out / 100);
        assert!(quote.min_out > 0);
    }

    #[test]
    fn sell_instruction_account_ordering_is_idl_exact() {
        let ctx = context_with(live_curve(false), None);
        let intent = intent(TradeSide::Sell, 1_000_000, 300);
        let quote = BondingCurveRouter::curve_quote(&ctx, &intent).unwrap();
        let ix = BondingCurveRouter::build_curve_instruction(&ctx, &intent, &quote);

        assert_eq!(ix.program_id, *PUMPFUN_PROGRAM_PUBKEY);
        assert_eq!(ix.accounts.len(), 12);
        assert_eq!(ix.accounts[0].pubkey, registry::global_pda(&ctx.program));
        assert_eq!(
            ix.accounts[1].pubkey,
            Pubkey::new_from_array(ctx.global.fee_recipient)
        );
        assert!(ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[2].pubkey, intent.mint);
        assert_eq!(ix.accounts[3].pubkey, ctx.curve_pda);
        assert_eq!(ix.accounts[6].pubkey, intent.user);
        assert!(ix.accounts[6].is_signer);
        assert_eq!(ix.accounts[7].pubkey, system_program::id());
        assert_eq!(ix.accounts[8].pubkey, spl_associated_token_account::id());
        assert_eq!(ix.accounts[9].pubkey, spl_token::id());
        assert_eq!(ix.accounts[11].pubkey, *PUMPFUN_PROGRAM_PUBKEY);

        // data = discriminator + amount + min_sol_output
        assert_eq!(&ix.data[..8], &registry::discriminators::CURVE_SELL);
        let amount = u64::from_le_bytes(ix.data[8..16].try_into().unwrap());
        let min_out = u64::from_le_bytes(ix.data[16..24].try_into().unwrap());
        assert_eq!(amount, 1_000_000);
        assert_eq!(min_out, quote.min_out);
    }

    #[test]
    fn mayhem_mode_changes_fee_recipient_at_same_index() {
        let mayhem = Pubkey::new_unique();
        let ctx = context_with(live_curve(true), Some(mayhem));
        let intent = intent(TradeSide::Sell, 1_000_000, 300);
        let quote = BondingCurveRouter::curve_quote(&ctx, &intent).unwrap();
        let ix = BondingCurveRouter::build_curve_instruction(&ctx, &intent, &quote);
        assert_eq!(ix.accounts[1].pubkey, mayhem);
    }

    #[test]
    fn token_2022_mints_derive_distinct_atas() {
        let user = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let legacy = get_associated_token_address_with_program_id(&user, &mint, &spl_token::id());
        let token_2022 =
            get_associated_token_address_with_program_id(&user, &mint, &TOKEN_2022_PROGRAM_PUBKEY);
        assert_ne!(legacy, token_2022);
    }

    #[test]
    fn buy_quote_applies_slippage_to_token_out() {
        let ctx = context_with(live_curve(false), None);
        let intent = intent(TradeSide::Buy, 1_000_000_000, 500);
        let quote = BondingCurveRouter::curve_quote(&ctx, &intent).unwrap();
        assert!(quote.min_out < quote.expected_out);
        assert!(quote.min_out as f64 >= quote.expected_out as f64 * 0.95 - 1.0);
    }
}
