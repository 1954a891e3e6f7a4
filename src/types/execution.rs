use crate::schema::executions;
use crate::types::candidate::LaunchSource;
use crate::types::position::ExitTrigger;
use crate::types::user::User;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::TradeSideType"]
#[DbValueStyle = "SCREAMING_SNAKE_CASE"]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::ExecutionStatusType"]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Sent,
    Confirmed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Confirmed | ExecutionStatus::Failed)
    }
}

/// Requested amount of a trade. SELLs triggered by the exit engine always
/// liquidate the whole position (`TokensMax`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Sol(f64),
    Tokens(u64),
    TokensMax,
}

/// Exit thresholds applied to the position a confirmed BUY opens. Prices are
/// computed from the filled entry price, not the quote.
#[derive(Debug, Clone, Copy)]
pub struct ExitParams {
    pub tp_percent: f64,
    pub sl_percent: f64,
    pub trailing_activation_percent: Option<f64>,
    pub trailing_distance_percent: Option<f64>,
    pub max_hold_seconds: Option<i64>,
}

/// A logical trade intent. The idempotency key makes replays collapse to a
/// single Execution row.
#[derive(Debug, Clone)]
pub struct TradeIntent {
    pub user_id: i32,
    pub mint: String,
    pub side: TradeSide,
    pub amount: Amount,
    pub slippage_bps: i32,
    pub priority_fee_lamports: Option<i64>,
    pub idempotency_key: String,
    pub source_tag: Option<String>,
    pub position_id: Option<i32>,
    pub strategy_id: Option<i32>,
    pub launch_candidate_id: Option<i32>,
    pub launch_source: LaunchSource,
    /// Curve/pool account discovered at launch; routing prefers it over PDA
    /// derivation (Bags pools are not derivable from the mint).
    pub bonding_curve: Option<String>,
    pub exit_params: Option<ExitParams>,
    /// Which trigger fired, for sells dispatched by the trigger engine.
    pub exit_trigger: Option<ExitTrigger>,
    pub allow_retry: bool,
}

impl TradeIntent {
    /// Deterministic key for an autohunt buy: one buy per strategy per mint.
    pub fn buy_key(strategy_id: i32, mint: &str) -> String {
        format!("buy:{}:{}", strategy_id, mint)
    }

    /// Deterministic key for a trigger-driven sell. `attempt_epoch` changes
    /// only on explicit retry, so concurrent sweepers collapse to one row.
    pub fn sell_key(position_id: i32, trigger: ExitTrigger, attempt_epoch: i64) -> String {
        format!("sell:{}:{}:{}", position_id, trigger, attempt_epoch)
    }
}

/// Immutable trade attempt log row.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = executions)]
#[diesel(belongs_to(User))]
pub struct Execution {
    pub id: Uuid,
    pub idempotency_key: String,
    pub user_id: i32,
    pub position_id: Option<i32>,
    pub mint: String,
    pub side: TradeSide,
    pub requested_amount_sol: Option<f64>,
    pub requested_amount_tokens: Option<i64>,
    pub slippage_bps: i32,
    pub priority_fee_lamports: Option<i64>,
    pub filled_amount_sol: Option<f64>,
    pub filled_tokens: Option<i64>,
    pub price_per_token: Option<f64>,
    pub signature: Option<String>,
    pub status: ExecutionStatus,
    pub error_code: Option<String>,
    pub error_detail: Option<String>,
    pub router_used: Option<String>,
    pub quote_response: Option<serde_json::Value>,
    pub source_tag: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = executions)]
pub struct NewExecution {
    pub id: Uuid,
    pub idempotency_key: String,
    pub user_id: i32,
    pub position_id: Option<i32>,
    pub mint: String,
    pub side: TradeSide,
    pub requested_amount_sol: Option<f64>,
    pub requested_amount_tokens: Option<i64>,
    pub slippage_bps: i32,
    pub priority_fee_lamports: Option<i64>,
    pub status: ExecutionStatus,
    pub source_tag: Option<String>,
}

/// Parsed fill of a confirmed transaction, from pre/post balance deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub tokens: u64,
    pub sol: f64,
    pub price_per_token: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_keys_are_deterministic() {
        assert_eq!(
            TradeIntent::buy_key(42, "So11111111111111111111111111111111111111112"),
            "buy:42:So11111111111111111111111111111111111111112"
        );
        assert_eq!(
            TradeIntent::sell_key(7, ExitTrigger::Tp, 0),
            "sell:7:TP:0"
        );
        // same intent, same key; a fresh attempt epoch makes a fresh key
        assert_eq!(
            TradeIntent::sell_key(7, ExitTrigger::Tp, 0),
            TradeIntent::sell_key(7, ExitTrigger::Tp, 0)
        );
        assert_ne!(
            TradeIntent::sell_key(7, ExitTrigger::Tp, 0),
            TradeIntent::sell_key(7, ExitTrigger::Tp, 1)
        );
    }
}
