use crate::config::constants::TRADE_LOCK_TTL_SECONDS;
use crate::types::candidate::{CandidateStatus, LaunchCandidate, NewLaunchCandidate};
use crate::types::error::TradeError;
use crate::types::execution::{
    Amount, Execution, ExecutionStatus, Fill, NewExecution, TradeIntent, TradeSide,
};
use crate::types::outbox::{notification_type, NewOutboxNotification, OutboxNotification, OutboxStatus};
use crate::types::position::{
    ExitTrigger, LifecycleState, NewPosition, Position, PricingSource, TriggerState,
};
use crate::types::strategy::Strategy;
use crate::types::user::{UserSettings, Wallet};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type DbPool = Arc<Pool<AsyncPgConnection>>;

pub fn connect(database_url: &str) -> DbPool {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Arc::new(
        Pool::builder(manager)
            .build()
            .expect("Failed to create pool."),
    )
}

/// Result of `reserve_trade_budget`: either a freshly inserted Execution row
/// or an existing row this intent collapsed onto.
#[derive(Debug, Clone)]
pub enum BudgetReservation {
    Fresh(Execution),
    Replay(Execution),
}

/// Atomically check kill-switch, position/rate limits and wallet budget, and
/// insert the Execution row under the intent's idempotency key. Two
/// concurrent intents with the same key resolve to one row.
pub async fn reserve_trade_budget(
    pool: &DbPool,
    intent: &TradeIntent,
    wallet_balance_sol: f64,
) -> Result<BudgetReservation, TradeError> {
    let mut conn = pool.get().await?;
    let intent = intent.clone();
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::user_settings::dsl as us;
            let settings: UserSettings = us::user_settings
                .filter(us::user_id.eq(intent.user_id))
                .first(conn)
                .await?;
            if settings.kill_switch {
                return Err(TradeError::KillSwitch);
            }

            if intent.side == TradeSide::Buy {
                use crate::schema::positions::dsl as p;
                let open: i64 = p::positions
                    .filter(p::user_id.eq(intent.user_id))
                    .filter(p::lifecycle_state.ne(LifecycleState::Closed))
                    .count()
                    .get_result(conn)
                    .await?;
                if open >= settings.max_positions as i64 {
                    return Err(TradeError::MaxPositionsReached);
                }

                use crate::schema::executions::dsl as e;
                let hour_ago = Utc::now() - ChronoDuration::hours(1);
                let recent: i64 = e::executions
                    .filter(e::user_id.eq(intent.user_id))
                    .filter(e::created_at.gt(hour_ago))
                    .count()
                    .get_result(conn)
                    .await?;
                if recent >= settings.max_trades_per_hour as i64 {
                    return Err(TradeError::RateLimit);
                }

                if let Amount::Sol(sol) = intent.amount {
                    let cap = settings.max_buy_amount_sol.min(wallet_balance_sol);
                    if sol > cap {
                        return Err(TradeError::InsufficientFunds {
                            needed_sol: sol,
                            available_sol: cap,
                        });
                    }
                }
            }

            use crate::schema::executions::dsl as e;
            let existing: Option<Execution> = e::executions
                .filter(e::idempotency_key.eq(&intent.idempotency_key))
                .first(conn)
                .await
                .optional()?;

            if let Some(row) = existing {
                match row.status {
                    ExecutionStatus::Pending | ExecutionStatus::Sent | ExecutionStatus::Confirmed => {
                        debug!(key = %intent.idempotency_key, status = %row.status, "idempotent replay");
                        return Ok(BudgetReservation::Replay(row));
                    }
                    ExecutionStatus::Failed => {
                        if !intent.allow_retry {
                            return Err(TradeError::AlreadyExecuted);
                        }
                        // explicit retry: clear the failed row and reinsert
                        diesel::delete(e::executions.filter(e::id.eq(row.id)))
                            .execute(conn)
                            .await?;
                    }
                }
            }

            let (sol, tokens) = match intent.amount {
                Amount::Sol(s) => (Some(s), None),
                Amount::Tokens(t) => (None, Some(t as i64)),
                // the executions row requires a concrete amount; callers
                // resolve a full-position sell from the position first
                Amount::TokensMax => {
                    return Err(TradeError::InvalidInput(
                        "full-position sell not resolved to a token amount".into(),
                    ))
                }
            };
            let new_row = NewExecution {
                id: Uuid::new_v4(),
                idempotency_key: intent.idempotency_key.clone(),
                user_id: intent.user_id,
                position_id: intent.position_id,
                mint: intent.mint.clone(),
                side: intent.side,
                requested_amount_sol: sol,
                requested_amount_tokens: tokens,
                slippage_bps: intent.slippage_bps,
                priority_fee_lamports: intent.priority_fee_lamports,
                status: ExecutionStatus::Pending,
                source_tag: intent.source_tag.clone(),
            };
            let inserted: Option<Execution> = diesel::insert_into(e::executions)
                .values(&new_row)
                .on_conflict(e::idempotency_key)
                .do_nothing()
                .get_result(conn)
                .await
                .optional()?;

            match inserted {
                Some(row) => Ok(BudgetReservation::Fresh(row)),
                None => {
                    // lost the race to a concurrent intent with the same key
                    let row: Execution = e::executions
                        .filter(e::idempotency_key.eq(&intent.idempotency_key))
                        .first(conn)
                        .await?;
                    Ok(BudgetReservation::Replay(row))
                }
            }
        }
        .scope_boxed()
    })
    .await
}

pub async fn mark_execution_sent(
    pool: &DbPool,
    execution_id: Uuid,
    signature: &str,
    router_used: &str,
    quote_response: Option<serde_json::Value>,
) -> Result<(), TradeError> {
    use crate::schema::executions::dsl as e;
    let mut conn = pool.get().await?;
    diesel::update(e::executions.filter(e::id.eq(execution_id)))
        .set((
            e::signature.eq(signature),
            e::status.eq(ExecutionStatus::Sent),
            e::router_used.eq(router_used),
            e::quote_response.eq(quote_response),
            e::sent_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;
    Ok(())
}

pub async fn mark_execution_failed(
    pool: &DbPool,
    execution_id: Uuid,
    error: &TradeError,
) -> Result<(), TradeError> {
    use crate::schema::executions::dsl as e;
    let mut conn = pool.get().await?;
    diesel::update(e::executions.filter(e::id.eq(execution_id)))
        .set((
            e::status.eq(ExecutionStatus::Failed),
            e::error_code.eq(error.code()),
            e::error_detail.eq(error.to_string()),
        ))
        .execute(&mut conn)
        .await?;
    Ok(())
}

/// Parameters for opening a position transactionally with a confirmed BUY.
#[derive(Debug, Clone)]
pub struct OpenPositionParams {
    pub execution_id: Uuid,
    pub user_id: i32,
    pub wallet_id: i32,
    pub strategy_id: Option<i32>,
    pub mint: String,
    pub bonding_curve: Option<String>,
    pub fill: Fill,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub trailing_activation_percent: Option<f64>,
    pub trailing_distance_percent: Option<f64>,
    pub max_hold_seconds: Option<i64>,
    pub launch_candidate_id: Option<i32>,
}

/// Confirm a BUY: create the Position in PRE_GRADUATION/MONITORING, flip the
/// Execution to confirmed, enqueue the buy_filled notification. One
/// transaction end-to-end, replay-safe on the execution status guard.
pub async fn confirm_buy_and_open_position(
    pool: &DbPool,
    params: OpenPositionParams,
) -> Result<Option<Position>, TradeError> {
    let mut conn = pool.get().await?;
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::executions::dsl as e;
            // the status guard makes a confirm replay a no-op
            let updated = diesel::update(
                e::executions
                    .filter(e::id.eq(params.execution_id))
                    .filter(e::status.ne(ExecutionStatus::Confirmed)),
            )
            .set((
                e::status.eq(ExecutionStatus::Confirmed),
                e::filled_amount_sol.eq(params.fill.sol),
                e::filled_tokens.eq(params.fill.tokens as i64),
                e::price_per_token.eq(params.fill.price_per_token),
                e::confirmed_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;
            if updated == 0 {
                return Ok(None);
            }

            use crate::schema::positions::dsl as p;
            let new_position = NewPosition {
                user_id: params.user_id,
                wallet_id: params.wallet_id,
                strategy_id: params.strategy_id,
                mint: params.mint.clone(),
                lifecycle_state: LifecycleState::PreGraduation,
                pricing_source: PricingSource::BondingCurve,
                bonding_curve: params.bonding_curve.clone(),
                entry_price: params.fill.price_per_token,
                entry_cost_sol: params.fill.sol,
                size_tokens: params.fill.tokens as i64,
                peak_price: Some(params.fill.price_per_token),
                tp_price: params.tp_price,
                sl_price: params.sl_price,
                trailing_activation_percent: params.trailing_activation_percent,
                trailing_distance_percent: params.trailing_distance_percent,
                max_hold_seconds: params.max_hold_seconds,
                trigger_state: TriggerState::Monitoring,
                launch_candidate_id: params.launch_candidate_id,
                entry_execution_id: Some(params.execution_id),
            };
            let position: Position = diesel::insert_into(p::positions)
                .values(&new_position)
                .get_result(conn)
                .await?;

            diesel::update(e::executions.filter(e::id.eq(params.execution_id)))
                .set(e::position_id.eq(position.id))
                .execute(conn)
                .await?;

            enqueue_notification_in_tx(
                conn,
                NewOutboxNotification::new(
                    params.user_id,
                    notification_type::BUY_FILLED,
                    json!({
                        "position_id": position.id,
                        "mint": params.mint,
                        "tokens": params.fill.tokens,
                        "cost_sol": params.fill.sol,
                        "price": params.fill.price_per_token,
                    }),
                ),
            )
            .await?;

            info!(position_id = position.id, mint = %params.mint, "position opened");
            Ok(Some(position))
        }
        .scope_boxed()
    })
    .await
}

/// Confirm a SELL: close the Position, record realized PnL, complete the
/// trigger, enqueue exit_completed. One transaction.
pub async fn confirm_sell_and_close_position(
    pool: &DbPool,
    position_id: i32,
    execution_id: Uuid,
    fill: Fill,
    trigger: ExitTrigger,
) -> Result<(), TradeError> {
    let mut conn = pool.get().await?;
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::executions::dsl as e;
            diesel::update(e::executions.filter(e::id.eq(execution_id)))
                .set((
                    e::status.eq(ExecutionStatus::Confirmed),
                    e::filled_amount_sol.eq(fill.sol),
                    e::filled_tokens.eq(fill.tokens as i64),
                    e::price_per_token.eq(fill.price_per_token),
                    e::confirmed_at.eq(Utc::now()),
                ))
                .execute(conn)
                .await?;

            use crate::schema::positions::dsl as p;
            let position: Position = p::positions
                .filter(p::id.eq(position_id))
                .first(conn)
                .await?;
            let pnl_sol = fill.sol - position.entry_cost_sol;
            let pnl_percent = if position.entry_cost_sol > 0.0 {
                pnl_sol / position.entry_cost_sol * 100.0
            } else {
                0.0
            };
            diesel::update(p::positions.filter(p::id.eq(position_id)))
                .set((
                    p::lifecycle_state.eq(LifecycleState::Closed),
                    p::trigger_state.eq(TriggerState::Completed),
                    p::exit_trigger.eq(trigger),
                    p::exit_price.eq(fill.price_per_token),
                    p::exit_value_sol.eq(fill.sol),
                    p::realized_pnl_sol.eq(pnl_sol),
                    p::realized_pnl_percent.eq(pnl_percent),
                    p::exit_execution_id.eq(execution_id),
                    p::closed_at.eq(Utc::now()),
                ))
                .execute(conn)
                .await?;

            enqueue_notification_in_tx(
                conn,
                NewOutboxNotification::new(
                    position.user_id,
                    notification_type::EXIT_COMPLETED,
                    json!({
                        "position_id": position_id,
                        "mint": position.mint,
                        "trigger": trigger.to_string(),
                        "exit_value_sol": fill.sol,
                        "pnl_sol": pnl_sol,
                        "pnl_percent": pnl_percent,
                    }),
                ),
            )
            .await?;

            info!(position_id, trigger = %trigger, pnl_sol, "position closed");
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

/// Outcome of `trigger_exit_atomically`.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub triggered: bool,
    pub reason: Option<String>,
}

/// Linearization point for exits: exactly one caller flips
/// MONITORING→TRIGGERED, and that caller's transaction also enqueues the
/// exit_triggered notification. Everyone else learns why they lost.
pub async fn trigger_exit_atomically(
    pool: &DbPool,
    position_id: i32,
    trigger: ExitTrigger,
    price: f64,
) -> Result<TriggerOutcome, TradeError> {
    let mut conn = pool.get().await?;
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::positions::dsl as p;
            let updated: Option<Position> = diesel::update(
                p::positions
                    .filter(p::id.eq(position_id))
                    .filter(p::trigger_state.eq(TriggerState::Monitoring)),
            )
            .set((
                p::trigger_state.eq(TriggerState::Triggered),
                p::exit_trigger.eq(trigger),
                p::trigger_price.eq(price),
            ))
            .get_result(conn)
            .await
            .optional()?;

            if let Some(position) = updated {
                enqueue_notification_in_tx(
                    conn,
                    NewOutboxNotification::new(
                        position.user_id,
                        notification_type::EXIT_TRIGGERED,
                        json!({
                            "position_id": position_id,
                            "mint": position.mint,
                            "trigger": trigger.to_string(),
                            "price": price,
                        }),
                    ),
                )
                .await?;
                return Ok(TriggerOutcome {
                    triggered: true,
                    reason: None,
                });
            }

            let state: Option<TriggerState> = p::positions
                .filter(p::id.eq(position_id))
                .select(p::trigger_state)
                .first(conn)
                .await
                .optional()?;
            Ok(TriggerOutcome {
                triggered: false,
                reason: Some(match state {
                    Some(TriggerState::Triggered) | Some(TriggerState::Executing) => {
                        "already_triggered".to_string()
                    }
                    Some(other) => format!("state_{}", other.to_string().to_lowercase()),
                    None => "position_not_found".to_string(),
                }),
            })
        }
        .scope_boxed()
    })
    .await
}

/// TRIGGERED→EXECUTING, stamped for crash recovery.
pub async fn mark_position_executing(pool: &DbPool, position_id: i32) -> Result<(), TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    let updated = diesel::update(
        p::positions
            .filter(p::id.eq(position_id))
            .filter(p::trigger_state.eq(TriggerState::Triggered)),
    )
    .set((
        p::trigger_state.eq(TriggerState::Executing),
        p::executing_since.eq(Utc::now()),
    ))
    .execute(&mut conn)
    .await?;
    if updated == 0 {
        return Err(TradeError::TriggerStateMismatch(format!(
            "position {position_id} not in TRIGGERED"
        )));
    }
    Ok(())
}

pub async fn mark_trigger_completed(pool: &DbPool, position_id: i32) -> Result<(), TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    diesel::update(
        p::positions
            .filter(p::id.eq(position_id))
            .filter(p::trigger_state.eq(TriggerState::Executing)),
    )
    .set(p::trigger_state.eq(TriggerState::Completed))
    .execute(&mut conn)
    .await?;
    Ok(())
}

/// EXECUTING→FAILED with the error recorded, plus the TRIGGER_FAILED
/// notification in the same transaction. The position stays closed to the
/// sweeper until explicitly re-armed.
pub async fn mark_trigger_failed(
    pool: &DbPool,
    position_id: i32,
    error: &TradeError,
) -> Result<(), TradeError> {
    let code = error.code().to_string();
    let detail = error.to_string();
    let mut conn = pool.get().await?;
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::positions::dsl as p;
            let position: Position = p::positions
                .filter(p::id.eq(position_id))
                .first(conn)
                .await?;
            diesel::update(p::positions.filter(p::id.eq(position_id)))
                .set((
                    p::trigger_state.eq(TriggerState::Failed),
                    p::trigger_error.eq(&detail),
                ))
                .execute(conn)
                .await?;
            enqueue_notification_in_tx(
                conn,
                NewOutboxNotification::new(
                    position.user_id,
                    notification_type::TRIGGER_FAILED,
                    json!({
                        "position_id": position_id,
                        "mint": position.mint,
                        "error_code": code,
                        "error": detail,
                    }),
                ),
            )
            .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

/// FAILED→MONITORING. Only the manual/emergency path calls this.
pub async fn rearm_failed_trigger(pool: &DbPool, position_id: i32) -> Result<(), TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    let updated = diesel::update(
        p::positions
            .filter(p::id.eq(position_id))
            .filter(p::trigger_state.eq(TriggerState::Failed)),
    )
    .set((
        p::trigger_state.eq(TriggerState::Monitoring),
        p::trigger_error.eq(None::<String>),
        p::exit_trigger.eq(None::<ExitTrigger>),
        p::trigger_price.eq(None::<f64>),
        p::executing_since.eq(None::<chrono::DateTime<Utc>>),
    ))
    .execute(&mut conn)
    .await?;
    if updated == 0 {
        return Err(TradeError::TriggerStateMismatch(format!(
            "position {position_id} not in FAILED"
        )));
    }
    Ok(())
}

/// Bulk graduation: flip every PRE_GRADUATION position on the mint to
/// POST_GRADUATION/AMM_POOL in one transaction, with one notification per
/// affected position. Already-closed positions are untouched.
pub async fn graduate_all_positions_for_mint(
    pool: &DbPool,
    mint: &str,
) -> Result<Vec<Position>, TradeError> {
    let mint = mint.to_string();
    let mut conn = pool.get().await?;
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::positions::dsl as p;
            let graduated: Vec<Position> = diesel::update(
                p::positions
                    .filter(p::mint.eq(&mint))
                    .filter(p::lifecycle_state.eq(LifecycleState::PreGraduation)),
            )
            .set((
                p::lifecycle_state.eq(LifecycleState::PostGraduation),
                p::pricing_source.eq(PricingSource::AmmPool),
            ))
            .get_results(conn)
            .await?;

            for position in &graduated {
                enqueue_notification_in_tx(
                    conn,
                    NewOutboxNotification::new(
                        position.user_id,
                        notification_type::GRADUATION,
                        json!({
                            "position_id": position.id,
                            "mint": mint,
                        }),
                    ),
                )
                .await?;
            }
            if !graduated.is_empty() {
                info!(mint = %mint, count = graduated.len(), "positions graduated");
            }
            Ok(graduated)
        }
        .scope_boxed()
    })
    .await
}

/// Roll a candidate up to terminal once every child trade job is terminal.
/// Jobs are linked by `source_tag = candidate:<id>`.
pub async fn complete_opportunity_if_terminal(
    pool: &DbPool,
    candidate_id: i32,
) -> Result<bool, TradeError> {
    use crate::schema::executions::dsl as e;
    use crate::schema::launch_candidates::dsl as c;
    let mut conn = pool.get().await?;
    let tag = format!("candidate:{candidate_id}");
    let open: i64 = e::executions
        .filter(e::source_tag.eq(&tag))
        .filter(e::status.eq_any([ExecutionStatus::Pending, ExecutionStatus::Sent]))
        .count()
        .get_result(&mut conn)
        .await?;
    if open > 0 {
        return Ok(false);
    }
    diesel::update(
        c::launch_candidates
            .filter(c::id.eq(candidate_id))
            .filter(c::processed_at.is_null()),
    )
    .set(c::processed_at.eq(Utc::now()))
    .execute(&mut conn)
    .await?;
    Ok(true)
}

// ---- notifications outbox ----

pub async fn enqueue_notification_in_tx(
    conn: &mut AsyncPgConnection,
    notification: NewOutboxNotification,
) -> Result<(), TradeError> {
    use crate::schema::notifications_outbox::dsl as n;
    diesel::insert_into(n::notifications_outbox)
        .values(&notification)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn enqueue_notification(
    pool: &DbPool,
    notification: NewOutboxNotification,
) -> Result<(), TradeError> {
    let mut conn = pool.get().await?;
    enqueue_notification_in_tx(&mut conn, notification).await
}

/// SKIP-LOCKED lease claim: atomically select claimable rows, flip them to
/// `sending` under this worker's lease, and return them. No two workers ever
/// hold the same row.
pub async fn claim_notifications(
    pool: &DbPool,
    worker_id: &str,
    limit: i64,
    lease_seconds: i64,
) -> Result<Vec<OutboxNotification>, TradeError> {
    let worker_id = worker_id.to_string();
    let mut conn = pool.get().await?;
    conn.transaction::<_, TradeError, _>(|conn| {
        async move {
            use crate::schema::notifications_outbox::dsl as n;
            let now = Utc::now();
            let claimable: Vec<i64> = n::notifications_outbox
                .filter(
                    n::status.eq(OutboxStatus::Pending).or(n::status
                        .eq(OutboxStatus::Sending)
                        .and(n::sending_expires_at.lt(now))),
                )
                .order(n::created_at.asc())
                .limit(limit)
                .select(n::id)
                .for_update()
                .skip_locked()
                .load(conn)
                .await?;
            if claimable.is_empty() {
                return Ok(vec![]);
            }
            let rows: Vec<OutboxNotification> =
                diesel::update(n::notifications_outbox.filter(n::id.eq_any(&claimable)))
                    .set((
                        n::status.eq(OutboxStatus::Sending),
                        n::worker_id.eq(&worker_id),
                        n::sending_expires_at
                            .eq(now + ChronoDuration::seconds(lease_seconds)),
                    ))
                    .get_results(conn)
                    .await?;
            Ok(rows)
        }
        .scope_boxed()
    })
    .await
}

pub async fn mark_notification_delivered(pool: &DbPool, id: i64) -> Result<(), TradeError> {
    use crate::schema::notifications_outbox::dsl as n;
    let mut conn = pool.get().await?;
    diesel::update(n::notifications_outbox.filter(n::id.eq(id)))
        .set((n::status.eq(OutboxStatus::Sent), n::sent_at.eq(Utc::now())))
        .execute(&mut conn)
        .await?;
    Ok(())
}

/// Decrement the attempt budget; terminal `failed` once exhausted, otherwise
/// back to `pending` for another worker to pick up.
pub async fn mark_notification_failed(
    pool: &DbPool,
    id: i64,
    error: &str,
) -> Result<(), TradeError> {
    use crate::schema::notifications_outbox::dsl as n;
    let mut conn = pool.get().await?;
    let row: OutboxNotification = n::notifications_outbox
        .filter(n::id.eq(id))
        .first(&mut conn)
        .await?;
    let attempts = row.attempts + 1;
    let status = if attempts >= row.max_attempts {
        warn!(id, attempts, "notification permanently failed");
        OutboxStatus::Failed
    } else {
        OutboxStatus::Pending
    };
    diesel::update(n::notifications_outbox.filter(n::id.eq(id)))
        .set((
            n::attempts.eq(attempts),
            n::status.eq(status),
            n::last_error.eq(error),
            n::sending_expires_at.eq(None::<chrono::DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .await?;
    Ok(())
}

// ---- trade locks ----

/// Try to take the cross-instance lock for `(user, mint)`. Expired rows are
/// purged first; the primary-key insert guarantees at most one winner.
pub async fn try_acquire_trade_lock(
    pool: &DbPool,
    lock_key: &str,
    operation: &str,
    instance_id: &str,
) -> Result<bool, TradeError> {
    use crate::schema::trade_locks::dsl as l;
    let mut conn = pool.get().await?;
    let expiry = Utc::now() - ChronoDuration::seconds(TRADE_LOCK_TTL_SECONDS);
    diesel::delete(
        l::trade_locks
            .filter(l::lock_key.eq(lock_key))
            .filter(l::created_at.lt(expiry)),
    )
    .execute(&mut conn)
    .await?;
    let inserted = diesel::insert_into(l::trade_locks)
        .values((
            l::lock_key.eq(lock_key),
            l::operation.eq(operation),
            l::instance_id.eq(instance_id),
            l::created_at.eq(Utc::now()),
        ))
        .on_conflict(l::lock_key)
        .do_nothing()
        .execute(&mut conn)
        .await?;
    Ok(inserted == 1)
}

pub async fn release_trade_lock(
    pool: &DbPool,
    lock_key: &str,
    instance_id: &str,
) -> Result<(), TradeError> {
    use crate::schema::trade_locks::dsl as l;
    let mut conn = pool.get().await?;
    diesel::delete(
        l::trade_locks
            .filter(l::lock_key.eq(lock_key))
            .filter(l::instance_id.eq(instance_id)),
    )
    .execute(&mut conn)
    .await?;
    Ok(())
}

pub async fn purge_expired_trade_locks(pool: &DbPool) -> Result<usize, TradeError> {
    use crate::schema::trade_locks::dsl as l;
    let mut conn = pool.get().await?;
    let expiry = Utc::now() - ChronoDuration::seconds(TRADE_LOCK_TTL_SECONDS);
    let purged = diesel::delete(l::trade_locks.filter(l::created_at.lt(expiry)))
        .execute(&mut conn)
        .await?;
    Ok(purged)
}

// ---- launch candidates ----

/// Insert a candidate, deduplicated on `(mint, launch_source)`. Returns None
/// when this launch was already seen.
pub async fn insert_candidate(
    pool: &DbPool,
    candidate: NewLaunchCandidate,
) -> Result<Option<LaunchCandidate>, TradeError> {
    use crate::schema::launch_candidates::dsl as c;
    let mut conn = pool.get().await?;
    let inserted: Option<LaunchCandidate> = diesel::insert_into(c::launch_candidates)
        .values(&candidate)
        .on_conflict((c::mint, c::launch_source))
        .do_nothing()
        .get_result(&mut conn)
        .await
        .optional()?;
    Ok(inserted)
}

pub async fn mark_candidate_status(
    pool: &DbPool,
    candidate_id: i32,
    status: CandidateStatus,
    reason: Option<&str>,
) -> Result<(), TradeError> {
    use crate::schema::launch_candidates::dsl as c;
    let mut conn = pool.get().await?;
    // accepted candidates stay in the pipeline until every child job is
    // terminal; complete_opportunity_if_terminal stamps processed_at then
    let processed_at = match status {
        CandidateStatus::Rejected | CandidateStatus::Expired => Some(Utc::now()),
        CandidateStatus::New | CandidateStatus::Accepted => None,
    };
    diesel::update(c::launch_candidates.filter(c::id.eq(candidate_id)))
        .set((
            c::status.eq(status),
            c::status_reason.eq(reason),
            c::processed_at.eq(processed_at),
        ))
        .execute(&mut conn)
        .await?;
    Ok(())
}

// ---- read paths ----

pub async fn load_enabled_auto_strategies(
    pool: &DbPool,
    chain: &str,
) -> Result<Vec<Strategy>, TradeError> {
    use crate::schema::strategies::dsl as s;
    let mut conn = pool.get().await?;
    Ok(s::strategies
        .filter(s::enabled.eq(true))
        .filter(s::chain.eq(chain))
        .load(&mut conn)
        .await?)
}

pub async fn load_strategy(pool: &DbPool, strategy_id: i32) -> Result<Option<Strategy>, TradeError> {
    use crate::schema::strategies::dsl as s;
    let mut conn = pool.get().await?;
    Ok(s::strategies
        .filter(s::id.eq(strategy_id))
        .first(&mut conn)
        .await
        .optional()?)
}

pub async fn load_user_settings(pool: &DbPool, user: i32) -> Result<UserSettings, TradeError> {
    use crate::schema::user_settings::dsl as us;
    let mut conn = pool.get().await?;
    Ok(us::user_settings
        .filter(us::user_id.eq(user))
        .first(&mut conn)
        .await?)
}

pub async fn load_active_wallet(pool: &DbPool, user: i32) -> Result<Wallet, TradeError> {
    use crate::schema::wallets::dsl as w;
    let mut conn = pool.get().await?;
    w::wallets
        .filter(w::user_id.eq(user))
        .filter(w::is_active.eq(true))
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| TradeError::InvalidInput(format!("user {user} has no active wallet")))
}

/// Positions the trigger sweeper evaluates: open and MONITORING.
pub async fn load_monitored_positions(pool: &DbPool) -> Result<Vec<Position>, TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    Ok(p::positions
        .filter(p::lifecycle_state.ne(LifecycleState::Closed))
        .filter(p::trigger_state.eq(TriggerState::Monitoring))
        .load(&mut conn)
        .await?)
}

pub async fn load_position(pool: &DbPool, position_id: i32) -> Result<Position, TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    Ok(p::positions
        .filter(p::id.eq(position_id))
        .first(&mut conn)
        .await?)
}

/// Distinct `(mint, curve)` pairs still on a bonding curve, deduplicated
/// across users, for the graduation monitor.
pub async fn load_pre_graduation_curves(
    pool: &DbPool,
) -> Result<Vec<(String, Option<String>)>, TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    Ok(p::positions
        .filter(p::lifecycle_state.eq(LifecycleState::PreGraduation))
        .select((p::mint, p::bonding_curve))
        .distinct()
        .load(&mut conn)
        .await?)
}

pub async fn update_position_price(
    pool: &DbPool,
    position_id: i32,
    current: f64,
    peak: f64,
    trailing_active: bool,
) -> Result<(), TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    diesel::update(p::positions.filter(p::id.eq(position_id)))
        .set((
            p::current_price.eq(current),
            p::peak_price.eq(peak),
            p::trailing_active.eq(trailing_active),
            p::price_updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;
    Ok(())
}

/// Positions stuck in EXECUTING past the execution timeout, for the startup
/// reconciliation sweep.
pub async fn load_stale_executing_positions(
    pool: &DbPool,
    stale_after_seconds: i64,
) -> Result<Vec<Position>, TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    let cutoff = Utc::now() - ChronoDuration::seconds(stale_after_seconds);
    Ok(p::positions
        .filter(p::trigger_state.eq(TriggerState::Executing))
        .filter(p::executing_since.lt(cutoff))
        .load(&mut conn)
        .await?)
}

pub async fn load_execution(pool: &DbPool, id: Uuid) -> Result<Execution, TradeError> {
    use crate::schema::executions::dsl as e;
    let mut conn = pool.get().await?;
    Ok(e::executions.filter(e::id.eq(id)).first(&mut conn).await?)
}

/// EXECUTING→MONITORING, for the startup sweep when the underlying exit
/// Execution never reached a terminal state and the lease expired.
pub async fn reset_executing_to_monitoring(
    pool: &DbPool,
    position_id: i32,
) -> Result<(), TradeError> {
    use crate::schema::positions::dsl as p;
    let mut conn = pool.get().await?;
    diesel::update(
        p::positions
            .filter(p::id.eq(position_id))
            .filter(p::trigger_state.eq(TriggerState::Executing)),
    )
    .set((
        p::trigger_state.eq(TriggerState::Monitoring),
        p::exit_trigger.eq(None::<ExitTrigger>),
        p::trigger_price.eq(None::<f64>),
        p::executing_since.eq(None::<chrono::DateTime<Utc>>),
    ))
    .execute(&mut conn)
    .await?;
    Ok(())
}

/// How many sell attempts exist for a position; the next attempt epoch.
pub async fn count_exit_attempts(pool: &DbPool, position_id: i32) -> Result<i64, TradeError> {
    use crate::schema::executions::dsl as e;
    let mut conn = pool.get().await?;
    Ok(e::executions
        .filter(e::position_id.eq(position_id))
        .filter(e::side.eq(TradeSide::Sell))
        .count()
        .get_result(&mut conn)
        .await?)
}

/// Most recent exit execution for a position, used by crash recovery.
pub async fn load_latest_exit_execution(
    pool: &DbPool,
    position_id: i32,
) -> Result<Option<Execution>, TradeError> {
    use crate::schema::executions::dsl as e;
    let mut conn = pool.get().await?;
    Ok(e::executions
        .filter(e::position_id.eq(position_id))
        .filter(e::side.eq(TradeSide::Sell))
        .order(e::created_at.desc())
        .first(&mut conn)
        .await
        .optional()?)
}
