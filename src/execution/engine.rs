use crate::config::app_context::AppContext;
use crate::config::constants::{
    CONFIRMATION_POLL_INTERVAL, CONFIRMATION_TIMEOUT, HONEYPOT_ROUND_TRIP_LOSS,
    LAUNCHPAD_TOKEN_DECIMALS, SLIPPAGE_MAX_BPS, SLIPPAGE_MIN_BPS,
};
use crate::config::settings::ExecutionConfig;
use crate::execution::locks::TradeLocks;
use crate::router::{RouterSet, SwapIntent, SwapRouter};
use crate::solana::tx_parser;
use crate::storage::persistent::{self, BudgetReservation, OpenPositionParams};
use crate::types::error::TradeError;
use crate::types::execution::{Amount, Execution, Fill, TradeIntent, TradeSide};
use crate::types::outbox::{notification_type, NewOutboxNotification};
use crate::types::position::{ExitTrigger, LifecycleState, Position};
use crate::utils::decimals::sol_to_lamports;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionError;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

fn validate_intent(intent: &TradeIntent) -> Result<Pubkey, TradeError> {
    let mint = Pubkey::from_str(&intent.mint)
        .map_err(|_| TradeError::InvalidAddress(intent.mint.clone()))?;
    match intent.amount {
        Amount::Sol(sol) if sol <= 0.0 => {
            return Err(TradeError::AmountOutOfBounds(format!("{sol} SOL")))
        }
        Amount::Tokens(0) => return Err(TradeError::AmountOutOfBounds("0 tokens".into())),
        _ => {}
    }
    if intent.slippage_bps < SLIPPAGE_MIN_BPS || intent.slippage_bps > SLIPPAGE_MAX_BPS {
        return Err(TradeError::InvalidInput(format!(
            "slippage {} bps outside [{SLIPPAGE_MIN_BPS}, {SLIPPAGE_MAX_BPS}]",
            intent.slippage_bps
        )));
    }
    Ok(mint)
}

/// Base units for the venue router: lamports in for buys, token base units
/// in for sells. Full-position sells were already resolved to a concrete
/// token amount before reservation.
fn resolve_amount_in(intent: &TradeIntent) -> Result<u64, TradeError> {
    match (intent.side, intent.amount) {
        (TradeSide::Buy, Amount::Sol(sol)) => Ok(sol_to_lamports(sol)),
        (TradeSide::Sell, Amount::Tokens(tokens)) => Ok(tokens),
        (side, amount) => Err(TradeError::InvalidInput(format!(
            "{side} with {amount:?} is not a valid combination"
        ))),
    }
}

/// The single precedence point for priority fees: a strategy's explicit
/// lamports win when configured to, the chain default otherwise.
pub fn resolve_priority_fee(config: &ExecutionConfig, strategy_fee: Option<i64>) -> u64 {
    match strategy_fee {
        Some(fee) if config.prefer_strategy_priority_fee && fee > 0 => fee as u64,
        _ => config.default_priority_fee_lamports.max(0) as u64,
    }
}

/// Idempotent trade lifecycle: lock, reserve, route, simulate, sign,
/// broadcast, confirm, persist.
pub struct ExecutionEngine {
    context: AppContext,
    routers: RouterSet,
    locks: TradeLocks,
}

impl ExecutionEngine {
    pub fn new(context: AppContext, routers: RouterSet) -> Self {
        let locks = TradeLocks::new(context.db_pool.clone(), context.instance_id.clone());
        Self {
            context,
            routers,
            locks,
        }
    }

    /// Execute one trade intent end to end. Replays of an already-reserved
    /// idempotency key return the existing Execution row without a second
    /// broadcast.
    #[instrument(skip(self, intent), fields(key = %intent.idempotency_key, mint = %intent.mint, side = %intent.side))]
    pub async fn execute_trade(&self, intent: TradeIntent) -> Result<Execution, TradeError> {
        // step 1: validation is cheap and happens before any lock
        let mint = validate_intent(&intent)?;

        // step 2: re-entrancy lock on (user, mint)
        let guard = self
            .locks
            .acquire(intent.user_id, &intent.mint, &format!("{}", intent.side))
            .await?;

        let result = self.execute_locked(&intent, mint).await;

        // step 11: the lock is released on every exit path; a panic falls
        // back to the guard's drop and the row TTL
        guard.release().await;

        match &result {
            Err(e) if !matches!(e, TradeError::ConcurrentOperation | TradeError::AlreadyExecuted) => {
                self.notify_failure(&intent, e).await;
            }
            _ => {}
        }
        result
    }

    async fn execute_locked(
        &self,
        intent: &TradeIntent,
        mint: Pubkey,
    ) -> Result<Execution, TradeError> {
        let pool = &self.context.db_pool;

        // a full-position sell resolves to a concrete token amount before
        // anything is written: the Execution row requires one
        let (lifecycle, position) = self.lifecycle_for(intent).await?;
        let mut intent = intent.clone();
        if matches!(intent.amount, Amount::TokensMax) {
            let size = position.as_ref().map(|p| p.size_tokens).unwrap_or(0);
            if size <= 0 {
                return Err(TradeError::InvalidInput("nothing to sell".into()));
            }
            intent.amount = Amount::Tokens(size as u64);
        }

        // step 3: reserve budget and the idempotency slot atomically
        let wallet = persistent::load_active_wallet(pool, intent.user_id).await?;
        let wallet_pubkey = Pubkey::from_str(&wallet.pubkey)
            .map_err(|_| TradeError::InvalidAddress(wallet.pubkey.clone()))?;
        let balance_sol =
            crate::utils::decimals::lamports_to_sol(self.context.rpc.get_balance(&wallet_pubkey).await?);
        let execution = match persistent::reserve_trade_budget(pool, &intent, balance_sol).await? {
            BudgetReservation::Fresh(row) => row,
            BudgetReservation::Replay(row) => {
                info!(execution_id = %row.id, status = %row.status, "idempotent replay, no new broadcast");
                return Ok(row);
            }
        };

        match self
            .run_pipeline(&intent, mint, wallet_pubkey, wallet.id, &execution, lifecycle, position)
            .await
        {
            Ok(row) => Ok(row),
            Err(e) => {
                if !matches!(e, TradeError::ConfirmationTimeout) {
                    // timeouts stay `sent` for the startup sweep to reconcile
                    persistent::mark_execution_failed(pool, execution.id, &e).await?;
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pipeline(
        &self,
        intent: &TradeIntent,
        mint: Pubkey,
        wallet_pubkey: Pubkey,
        wallet_id: i32,
        execution: &Execution,
        lifecycle: Option<LifecycleState>,
        position: Option<Position>,
    ) -> Result<Execution, TradeError> {
        let pool = &self.context.db_pool;

        // step 4: route by lifecycle, quote, build
        let router = self.routers.route(&mint, lifecycle)?;
        let amount_in = resolve_amount_in(intent)?;
        let exec_config = self.context.get_settings().await.execution.clone();
        let known_curve = intent
            .bonding_curve
            .as_deref()
            .or(position.as_ref().and_then(|p| p.bonding_curve.as_deref()))
            .and_then(|c| Pubkey::from_str(c).ok());
        let swap_intent = SwapIntent {
            user: wallet_pubkey,
            mint,
            side: intent.side,
            amount_in,
            slippage_bps: intent.slippage_bps as u16,
            priority_fee_lamports: resolve_priority_fee(&exec_config, intent.priority_fee_lamports),
            launch_source: intent.launch_source,
            bonding_curve: known_curve,
        };
        let quote = router.quote(&swap_intent).await?;
        let unsigned = router.build(&swap_intent, &quote).await?;

        // step 5: pre-flight simulation; a revert with a honeypot signature
        // is fatal and never broadcast
        if exec_config.simulate_execution {
            self.simulate(&router, &swap_intent, &unsigned, quote.expected_out)
                .await?;
        }

        // step 6: external signer, scoped to this user's active wallet
        let signed = self
            .context
            .signer
            .sign(&wallet_pubkey.to_string(), &unsigned)
            .await?;

        // step 7: fan-out broadcast
        let swap_result = router.execute(&signed).await?;
        persistent::mark_execution_sent(
            pool,
            execution.id,
            &swap_result.signature.to_string(),
            router.name(),
            Some(quote.raw.clone()),
        )
        .await?;

        // step 8: poll to finalized and parse the fill from balance deltas
        let fill = self
            .confirm(&swap_result.signature, &wallet_pubkey, &intent.mint, intent.side)
            .await?;

        // steps 9-10: persist the domain change and its notification together
        match intent.side {
            TradeSide::Buy => {
                self.persist_buy(intent, wallet_id, execution.id, &fill)
                    .await?;
            }
            TradeSide::Sell => {
                let position_id = intent
                    .position_id
                    .ok_or_else(|| TradeError::InvalidInput("sell without position".into()))?;
                persistent::confirm_sell_and_close_position(
                    pool,
                    position_id,
                    execution.id,
                    fill,
                    intent.exit_trigger.unwrap_or(ExitTrigger::Manual),
                )
                .await?;
            }
        }

        persistent::load_execution(pool, execution.id).await
    }

    async fn lifecycle_for(
        &self,
        intent: &TradeIntent,
    ) -> Result<(Option<LifecycleState>, Option<Position>), TradeError> {
        match intent.side {
            // autohunt buys happen at launch, on the curve
            TradeSide::Buy => Ok((Some(LifecycleState::PreGraduation), None)),
            TradeSide::Sell => {
                let position_id = intent
                    .position_id
                    .ok_or_else(|| TradeError::InvalidInput("sell without position".into()))?;
                let position =
                    persistent::load_position(&self.context.db_pool, position_id).await?;
                Ok((Some(position.lifecycle_state), Some(position)))
            }
        }
    }

    /// Simulate and interpret a revert. A buy whose token would be
    /// unsellable (sell quote zero or a >90% round trip loss) is a honeypot
    /// and must never be broadcast.
    async fn simulate(
        &self,
        router: &Arc<dyn SwapRouter>,
        swap_intent: &SwapIntent,
        unsigned: &solana_sdk::transaction::VersionedTransaction,
        expected_out: u64,
    ) -> Result<(), TradeError> {
        let result = self.context.rpc.simulate(unsigned).await?;
        let Some(err) = result.err else {
            return Ok(());
        };

        if swap_intent.side == TradeSide::Buy {
            let sell_probe = SwapIntent {
                side: TradeSide::Sell,
                amount_in: expected_out,
                ..swap_intent.clone()
            };
            match router.quote(&sell_probe).await {
                Err(TradeError::NoLiquidity(_)) => {
                    return Err(TradeError::HoneypotDetected("sell quote is zero".into()));
                }
                Ok(sell_quote) => {
                    let round_trip = sell_quote.expected_out as f64 / swap_intent.amount_in as f64;
                    if round_trip < 1.0 - HONEYPOT_ROUND_TRIP_LOSS {
                        return Err(TradeError::HoneypotDetected(format!(
                            "round trip returns {:.1}% of input",
                            round_trip * 100.0
                        )));
                    }
                }
                Err(_) => {}
            }
        }

        let transient = matches!(
            err,
            TransactionError::BlockhashNotFound | TransactionError::ClusterMaintenance
        );
        Err(TradeError::SimulationFailed {
            detail: format!("{err:?}"),
            transient,
        })
    }

    /// Poll for finalized commitment, then compute the fill from the
    /// transaction's balance deltas.
    async fn confirm(
        &self,
        signature: &Signature,
        user: &Pubkey,
        mint: &str,
        side: TradeSide,
    ) -> Result<Fill, TradeError> {
        let deadline = Instant::now() + CONFIRMATION_TIMEOUT;
        loop {
            match self.context.rpc.get_signature_status(signature).await? {
                Some(Ok(())) => break,
                Some(Err(e)) => return Err(TradeError::TransactionReverted(format!("{e:?}"))),
                None => {
                    if Instant::now() >= deadline {
                        warn!(signature = %signature, "confirmation timed out, leaving execution as sent");
                        return Err(TradeError::ConfirmationTimeout);
                    }
                    sleep(CONFIRMATION_POLL_INTERVAL).await;
                }
            }
        }

        let tx = self.fetch_confirmed_tx(signature).await?;
        let keys = tx_parser::account_keys(&tx.transaction)?;
        let meta = tx
            .transaction
            .meta
            .as_ref()
            .ok_or_else(|| TradeError::Rpc("confirmed transaction without meta".into()))?;
        tx_parser::parse_fill(meta, &keys, user, mint, side, LAUNCHPAD_TOKEN_DECIMALS)
    }

    // freshly finalized txs may lag the tx index; retry briefly
    async fn fetch_confirmed_tx(
        &self,
        signature: &Signature,
    ) -> Result<solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta, TradeError>
    {
        let mut attempts = 0u32;
        loop {
            match self.context.rpc.get_transaction(signature).await {
                Ok(tx) => return Ok(tx),
                Err(e) if attempts < 3 => {
                    attempts += 1;
                    warn!(signature = %signature, error = %e, attempts, "transaction not yet indexed");
                    sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn persist_buy(
        &self,
        intent: &TradeIntent,
        wallet_id: i32,
        execution_id: Uuid,
        fill: &Fill,
    ) -> Result<(), TradeError> {
        let exit = intent.exit_params;
        let entry = fill.price_per_token;
        let mint = Pubkey::from_str(&intent.mint)
            .map_err(|_| TradeError::InvalidAddress(intent.mint.clone()))?;
        // discovery's curve address when known, the pump-style PDA otherwise
        let bonding_curve = intent.bonding_curve.clone().unwrap_or_else(|| {
            crate::programs::registry::bonding_curve_pda(
                &mint,
                &crate::programs::registry::PUMPFUN_PROGRAM_PUBKEY,
            )
            .to_string()
        });
        let params = OpenPositionParams {
            execution_id,
            user_id: intent.user_id,
            wallet_id,
            strategy_id: intent.strategy_id,
            mint: intent.mint.clone(),
            bonding_curve: Some(bonding_curve),
            fill: *fill,
            tp_price: exit.map(|e| entry * (1.0 + e.tp_percent / 100.0)),
            sl_price: exit.map(|e| entry * (1.0 - e.sl_percent / 100.0)),
            trailing_activation_percent: exit.and_then(|e| e.trailing_activation_percent),
            trailing_distance_percent: exit.and_then(|e| e.trailing_distance_percent),
            max_hold_seconds: exit.and_then(|e| e.max_hold_seconds),
            launch_candidate_id: intent.launch_candidate_id,
        };
        persistent::confirm_buy_and_open_position(&self.context.db_pool, params).await?;
        Ok(())
    }

    /// Errors reach the user only through the outbox; delivery never blocks
    /// the trading path.
    async fn notify_failure(&self, intent: &TradeIntent, error: &TradeError) {
        let notification_type = match (intent.side, error) {
            (_, TradeError::KillSwitch) => notification_type::KILL_SWITCH_BLOCKED,
            (TradeSide::Buy, _) => notification_type::BUY_FAILED,
            (TradeSide::Sell, _) => notification_type::TRIGGER_FAILED,
        };
        let result = persistent::enqueue_notification(
            &self.context.db_pool,
            NewOutboxNotification::new(
                intent.user_id,
                notification_type,
                json!({
                    "mint": intent.mint,
                    "side": intent.side.to_string(),
                    "error_code": error.code(),
                    "error": error.to_string(),
                    "source_tag": intent.source_tag,
                }),
            ),
        )
        .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to enqueue failure notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::candidate::LaunchSource;

    fn intent_with(slippage_bps: i32, amount: Amount) -> TradeIntent {
        TradeIntent {
            user_id: 1,
            mint: "So11111111111111111111111111111111111111112".into(),
            side: TradeSide::Buy,
            amount,
            slippage_bps,
            priority_fee_lamports: None,
            idempotency_key: "buy:1:test".into(),
            source_tag: None,
            position_id: None,
            strategy_id: None,
            launch_candidate_id: None,
            launch_source: LaunchSource::Pumpfun,
            bonding_curve: None,
            exit_params: None,
            exit_trigger: None,
            allow_retry: false,
        }
    }

    #[test]
    fn slippage_bounds_are_inclusive() {
        // 0.1% and 50% are accepted
        assert!(validate_intent(&intent_with(10, Amount::Sol(0.1))).is_ok());
        assert!(validate_intent(&intent_with(5_000, Amount::Sol(0.1))).is_ok());
        // just outside is rejected
        assert!(validate_intent(&intent_with(9, Amount::Sol(0.1))).is_err());
        assert!(validate_intent(&intent_with(5_001, Amount::Sol(0.1))).is_err());
    }

    #[test]
    fn amount_resolution_requires_concrete_amounts() {
        assert_eq!(
            resolve_amount_in(&intent_with(300, Amount::Sol(1.5))).unwrap(),
            1_500_000_000
        );
        let mut sell = intent_with(300, Amount::Tokens(42));
        sell.side = TradeSide::Sell;
        assert_eq!(resolve_amount_in(&sell).unwrap(), 42);
        // a full-position sell must be resolved from the position before it
        // reaches the router or the executions row
        let mut unresolved = intent_with(300, Amount::TokensMax);
        unresolved.side = TradeSide::Sell;
        assert!(resolve_amount_in(&unresolved).is_err());
    }

    #[test]
    fn rejects_bad_amounts_and_addresses() {
        assert!(matches!(
            validate_intent(&intent_with(300, Amount::Sol(0.0))),
            Err(TradeError::AmountOutOfBounds(_))
        ));
        assert!(matches!(
            validate_intent(&intent_with(300, Amount::Tokens(0))),
            Err(TradeError::AmountOutOfBounds(_))
        ));
        let mut bad = intent_with(300, Amount::Sol(0.1));
        bad.mint = "not-a-mint!!".into();
        assert!(matches!(
            validate_intent(&bad),
            Err(TradeError::InvalidAddress(_))
        ));
    }

    fn exec_config(prefer_strategy: bool) -> ExecutionConfig {
        ExecutionConfig {
            auto_execute_enabled: true,
            simulate_execution: true,
            default_priority_fee_lamports: 100_000,
            prefer_strategy_priority_fee: prefer_strategy,
        }
    }

    #[test]
    fn strategy_priority_fee_wins_when_preferred() {
        assert_eq!(resolve_priority_fee(&exec_config(true), Some(250_000)), 250_000);
        assert_eq!(resolve_priority_fee(&exec_config(false), Some(250_000)), 100_000);
        assert_eq!(resolve_priority_fee(&exec_config(true), None), 100_000);
        // zero is "unset", not "free"
        assert_eq!(resolve_priority_fee(&exec_config(true), Some(0)), 100_000);
    }
}
