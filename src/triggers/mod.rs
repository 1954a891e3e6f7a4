use crate::config::app_context::AppContext;
use crate::config::constants::EXECUTING_STALE_AFTER_SECONDS;
use crate::execution::engine::ExecutionEngine;
use crate::lifecycle::pricer::PositionPricer;
use crate::storage::persistent;
use crate::types::error::TradeError;
use crate::types::events::BusEvent;
use crate::types::execution::{Amount, ExecutionStatus, Fill, TradeIntent, TradeSide};
use crate::types::position::{ExitTrigger, LifecycleState, Position};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Exit conditions in priority order. Emergency always wins; the trailing
/// stop is evaluated only after its activation threshold was crossed.
pub fn evaluate_exit(
    position: &Position,
    current_price: f64,
    peak_price: f64,
    trailing_active: bool,
    now: DateTime<Utc>,
    emergency: bool,
    graduation_exit: bool,
) -> Option<ExitTrigger> {
    if emergency {
        return Some(ExitTrigger::Emergency);
    }
    if graduation_exit {
        return Some(ExitTrigger::Graduation);
    }
    if let Some(sl) = position.sl_price {
        if current_price <= sl {
            return Some(ExitTrigger::Sl);
        }
    }
    if let Some(max_hold) = position.max_hold_seconds {
        if (now - position.opened_at).num_seconds() >= max_hold {
            return Some(ExitTrigger::Maxhold);
        }
    }
    if let Some(tp) = position.tp_price {
        if current_price >= tp {
            return Some(ExitTrigger::Tp);
        }
    }
    if trailing_active {
        if let Some(distance) = position.trailing_distance_percent {
            if current_price <= peak_price * (1.0 - distance / 100.0) {
                return Some(ExitTrigger::Trail);
            }
        }
    }
    None
}

/// Periodic sweep over monitored positions: refresh prices, evaluate exit
/// conditions, win the atomic TRIGGERED transition, dispatch the sell.
pub struct TriggerEngine {
    context: AppContext,
    engine: Arc<ExecutionEngine>,
    pricer: PositionPricer,
    emergencies: Arc<Mutex<HashSet<i32>>>,
}

impl TriggerEngine {
    pub async fn new(context: &AppContext, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            context: context.clone(),
            engine,
            pricer: PositionPricer::new(context).await,
            emergencies: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn run(self, mut events: broadcast::Receiver<BusEvent>) {
        let sweep_interval = Duration::from_millis(
            self.context.get_settings().await.triggers.sweep_interval_ms,
        );
        let emergencies = self.emergencies.clone();
        let mut shutdown = self.context.shutdown_signal();
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("trigger engine finishing current sweep before stopping");
                        return;
                    }
                }
                event = events.recv() => match event {
                    Ok(BusEvent::EmergencyExit { position_id }) => {
                        info!(position_id, "emergency exit requested");
                        emergencies.lock().unwrap().insert(position_id);
                        // the emergency path is also the only way a FAILED
                        // trigger returns to MONITORING
                        match persistent::rearm_failed_trigger(&self.context.db_pool, position_id).await {
                            Ok(()) => info!(position_id, "failed trigger re-armed"),
                            Err(TradeError::TriggerStateMismatch(_)) => {}
                            Err(e) => warn!(position_id, error = %e, "re-arm failed"),
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "trigger sweep failed");
                    }
                }
            }
        }
    }

    async fn sweep(&self) -> Result<(), TradeError> {
        let positions = persistent::load_monitored_positions(&self.context.db_pool).await?;
        for position in positions {
            if let Err(e) = self.evaluate_position(&position).await {
                match e {
                    // migrated token, the graduation monitor owns this
                    TradeError::LifecycleUnknown(_) => {
                        debug!(position_id = position.id, "pricing deferred to graduation monitor");
                    }
                    other => {
                        warn!(position_id = position.id, error = %other, "position evaluation failed")
                    }
                }
            }
        }
        Ok(())
    }

    async fn evaluate_position(&self, position: &Position) -> Result<(), TradeError> {
        let pool = &self.context.db_pool;
        let current_price = self.pricer.price(position).await?;

        // peak is monotonic and never below entry
        let peak_price = position
            .peak_price
            .unwrap_or(position.entry_price)
            .max(position.entry_price)
            .max(current_price);
        let trailing_active = position.trailing_active
            || position
                .trailing_activation_price()
                .map(|activation| current_price >= activation)
                .unwrap_or(false);
        persistent::update_position_price(pool, position.id, current_price, peak_price, trailing_active)
            .await?;

        let emergency = self.emergencies.lock().unwrap().contains(&position.id);
        let graduation_exit = position.lifecycle_state == LifecycleState::PostGraduation
            && self.strategy_wants_graduation_exit(position).await;

        let Some(trigger) = evaluate_exit(
            position,
            current_price,
            peak_price,
            trailing_active,
            Utc::now(),
            emergency,
            graduation_exit,
        ) else {
            return Ok(());
        };

        let outcome =
            persistent::trigger_exit_atomically(pool, position.id, trigger, current_price).await?;
        if !outcome.triggered {
            debug!(
                position_id = position.id,
                reason = outcome.reason.as_deref().unwrap_or(""),
                "trigger lost the race"
            );
            return Ok(());
        }
        self.emergencies.lock().unwrap().remove(&position.id);
        info!(position_id = position.id, trigger = %trigger, price = current_price, "exit triggered");
        self.dispatch_exit(position, trigger).await
    }

    async fn strategy_wants_graduation_exit(&self, position: &Position) -> bool {
        let Some(strategy_id) = position.strategy_id else {
            return false;
        };
        matches!(
            persistent::load_strategy(&self.context.db_pool, strategy_id).await,
            Ok(Some(strategy)) if strategy.exit_on_graduation
        )
    }

    async fn dispatch_exit(
        &self,
        position: &Position,
        trigger: ExitTrigger,
    ) -> Result<(), TradeError> {
        let pool = &self.context.db_pool;
        persistent::mark_position_executing(pool, position.id).await?;

        let attempt_epoch = persistent::count_exit_attempts(pool, position.id).await?;
        let intent = TradeIntent {
            user_id: position.user_id,
            mint: position.mint.clone(),
            side: TradeSide::Sell,
            amount: Amount::TokensMax,
            slippage_bps: self.sell_slippage_bps(position).await,
            priority_fee_lamports: None,
            idempotency_key: TradeIntent::sell_key(position.id, trigger, attempt_epoch),
            source_tag: Some(format!("trigger:{trigger}")),
            position_id: Some(position.id),
            strategy_id: position.strategy_id,
            launch_candidate_id: position.launch_candidate_id,
            launch_source: crate::types::candidate::LaunchSource::Pumpfun,
            bonding_curve: position.bonding_curve.clone(),
            exit_params: None,
            exit_trigger: Some(trigger),
            allow_retry: false,
        };

        match self.engine.execute_trade(intent).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // a FAILED exit is never swallowed: the RPC records it and
                // notifies, and the position waits for manual intervention
                warn!(position_id = position.id, error = %e, "exit dispatch failed");
                persistent::mark_trigger_failed(pool, position.id, &e).await?;
                Err(e)
            }
        }
    }

    async fn sell_slippage_bps(&self, position: &Position) -> i32 {
        if let Some(strategy_id) = position.strategy_id {
            if let Ok(Some(strategy)) =
                persistent::load_strategy(&self.context.db_pool, strategy_id).await
            {
                return strategy.slippage_bps;
            }
        }
        match persistent::load_user_settings(&self.context.db_pool, position.user_id).await {
            Ok(settings) => settings.slippage_bps,
            Err(_) => 300,
        }
    }
}

/// Startup reconciliation: a position stuck in EXECUTING past the execution
/// timeout either reflects a terminal Execution (reconcile it) or a lease
/// that died mid-flight (back to MONITORING, with the error logged).
pub async fn recover_stale_executing(context: &AppContext) -> Result<(), TradeError> {
    let pool = &context.db_pool;
    let stale =
        persistent::load_stale_executing_positions(pool, EXECUTING_STALE_AFTER_SECONDS).await?;
    for position in stale {
        if !position.is_open() {
            // the close landed but the trigger transition didn't
            info!(position_id = position.id, "completing trigger on closed position");
            persistent::mark_trigger_completed(pool, position.id).await?;
            continue;
        }
        let latest = persistent::load_latest_exit_execution(pool, position.id).await?;
        match latest {
            Some(execution) if execution.status == ExecutionStatus::Confirmed => {
                let fill = Fill {
                    tokens: execution.filled_tokens.unwrap_or(position.size_tokens) as u64,
                    sol: execution.filled_amount_sol.unwrap_or(0.0),
                    price_per_token: execution.price_per_token.unwrap_or(0.0),
                };
                info!(position_id = position.id, "reconciling confirmed exit after restart");
                persistent::confirm_sell_and_close_position(
                    pool,
                    position.id,
                    execution.id,
                    fill,
                    position.exit_trigger.unwrap_or(ExitTrigger::Manual),
                )
                .await?;
            }
            Some(execution) if execution.status == ExecutionStatus::Failed => {
                warn!(position_id = position.id, "marking trigger failed after restart");
                persistent::mark_trigger_failed(
                    pool,
                    position.id,
                    &TradeError::TriggerStateMismatch("exit failed before restart".into()),
                )
                .await?;
            }
            _ => {
                warn!(
                    position_id = position.id,
                    "stale EXECUTING lease expired, returning to MONITORING"
                );
                persistent::reset_executing_to_monitoring(pool, position.id).await?;
            }
        }
    }
    persistent::purge_expired_trade_locks(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::position::{PricingSource, TriggerState};
    use chrono::Duration as ChronoDuration;

    fn position() -> Position {
        let now = Utc::now();
        Position {
            id: 1,
            user_id: 1,
            wallet_id: 1,
            strategy_id: Some(1),
            mint: "TestMint".into(),
            lifecycle_state: LifecycleState::PreGraduation,
            pricing_source: PricingSource::BondingCurve,
            bonding_curve: None,
            entry_price: 100.0,
            entry_cost_sol: 1.0,
            size_tokens: 1_000_000,
            current_price: Some(100.0),
            peak_price: Some(100.0),
            price_updated_at: Some(now),
            tp_price: Some(200.0),
            sl_price: Some(50.0),
            trailing_activation_percent: Some(50.0),
            trailing_distance_percent: Some(20.0),
            trailing_active: false,
            max_hold_seconds: Some(3_600),
            exit_price: None,
            exit_value_sol: None,
            exit_trigger: None,
            realized_pnl_sol: None,
            realized_pnl_percent: None,
            trigger_state: TriggerState::Monitoring,
            trigger_price: None,
            trigger_error: None,
            executing_since: None,
            opened_at: now,
            closed_at: None,
            launch_candidate_id: None,
            entry_execution_id: None,
            exit_execution_id: None,
        }
    }

    #[test]
    fn emergency_always_wins() {
        let p = position();
        // price is beyond TP and below SL simultaneously impossible, but
        // even a TP-qualifying price yields EMERGENCY when requested
        assert_eq!(
            evaluate_exit(&p, 250.0, 250.0, false, Utc::now(), true, true),
            Some(ExitTrigger::Emergency)
        );
    }

    #[test]
    fn graduation_beats_price_triggers() {
        let p = position();
        assert_eq!(
            evaluate_exit(&p, 250.0, 250.0, false, Utc::now(), false, true),
            Some(ExitTrigger::Graduation)
        );
    }

    #[test]
    fn stop_loss_fires_at_or_below_threshold() {
        let p = position();
        assert_eq!(
            evaluate_exit(&p, 50.0, 100.0, false, Utc::now(), false, false),
            Some(ExitTrigger::Sl)
        );
        assert_eq!(
            evaluate_exit(&p, 49.0, 100.0, false, Utc::now(), false, false),
            Some(ExitTrigger::Sl)
        );
        assert_eq!(
            evaluate_exit(&p, 51.0, 100.0, false, Utc::now(), false, false),
            None
        );
    }

    #[test]
    fn max_hold_beats_take_profit() {
        let p = position();
        let later = p.opened_at + ChronoDuration::seconds(3_601);
        assert_eq!(
            evaluate_exit(&p, 250.0, 250.0, false, later, false, false),
            Some(ExitTrigger::Maxhold)
        );
    }

    #[test]
    fn take_profit_fires_at_threshold() {
        let p = position();
        assert_eq!(
            evaluate_exit(&p, 200.0, 200.0, false, Utc::now(), false, false),
            Some(ExitTrigger::Tp)
        );
    }

    #[test]
    fn trailing_needs_activation_first() {
        let p = position();
        // 25% drawdown from a peak of 160, but trailing never activated
        assert_eq!(
            evaluate_exit(&p, 120.0, 160.0, false, Utc::now(), false, false),
            None
        );
        // once active, the same drawdown fires
        assert_eq!(
            evaluate_exit(&p, 120.0, 160.0, true, Utc::now(), false, false),
            Some(ExitTrigger::Trail)
        );
    }

    #[test]
    fn no_trigger_inside_the_band() {
        let p = position();
        assert_eq!(
            evaluate_exit(&p, 120.0, 130.0, false, Utc::now(), false, false),
            None
        );
    }
}
