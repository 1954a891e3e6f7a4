use crate::schema::positions;
use crate::types::user::{User, Wallet};
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::LifecycleStateType"]
#[DbValueStyle = "SCREAMING_SNAKE_CASE"]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    PreGraduation,
    PostGraduation,
    Closed,
}

impl LifecycleState {
    /// The only transitions the state machine admits. `CLOSED` is terminal.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (
                LifecycleState::PreGraduation,
                LifecycleState::PostGraduation
            ) | (LifecycleState::PreGraduation, LifecycleState::Closed)
                | (LifecycleState::PostGraduation, LifecycleState::Closed)
        )
    }

    /// Pricing source pinned to this lifecycle phase. `CLOSED` keeps the
    /// last source it had; callers never price a closed position.
    pub fn pricing_source(&self) -> Option<PricingSource> {
        match self {
            LifecycleState::PreGraduation => Some(PricingSource::BondingCurve),
            LifecycleState::PostGraduation => Some(PricingSource::AmmPool),
            LifecycleState::Closed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::PricingSourceType"]
#[DbValueStyle = "SCREAMING_SNAKE_CASE"]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingSource {
    BondingCurve,
    AmmPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::ExitTriggerType"]
#[DbValueStyle = "SCREAMING_SNAKE_CASE"]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitTrigger {
    Tp,
    Sl,
    Trail,
    Maxhold,
    Emergency,
    Manual,
    Graduation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::TriggerStateType"]
#[DbValueStyle = "SCREAMING_SNAKE_CASE"]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
    Monitoring,
    Triggered,
    Executing,
    Completed,
    Failed,
}

impl TriggerState {
    /// MONITORING→TRIGGERED→EXECUTING→{COMPLETED,FAILED}. FAILED→MONITORING
    /// is the explicit re-arm path and only reachable via manual/emergency
    /// retry.
    pub fn can_transition_to(&self, next: TriggerState) -> bool {
        matches!(
            (self, next),
            (TriggerState::Monitoring, TriggerState::Triggered)
                | (TriggerState::Triggered, TriggerState::Executing)
                | (TriggerState::Executing, TriggerState::Completed)
                | (TriggerState::Executing, TriggerState::Failed)
                | (TriggerState::Failed, TriggerState::Monitoring)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TriggerState::Completed | TriggerState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = positions)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Wallet))]
pub struct Position {
    pub id: i32,
    pub user_id: i32,
    pub wallet_id: i32,
    pub strategy_id: Option<i32>,
    pub mint: String,
    pub lifecycle_state: LifecycleState,
    pub pricing_source: PricingSource,
    pub bonding_curve: Option<String>,
    pub entry_price: f64,
    pub entry_cost_sol: f64,
    pub size_tokens: i64,
    pub current_price: Option<f64>,
    pub peak_price: Option<f64>,
    pub price_updated_at: Option<DateTime<Utc>>,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub trailing_activation_percent: Option<f64>,
    pub trailing_distance_percent: Option<f64>,
    pub trailing_active: bool,
    pub max_hold_seconds: Option<i64>,
    pub exit_price: Option<f64>,
    pub exit_value_sol: Option<f64>,
    pub exit_trigger: Option<ExitTrigger>,
    pub realized_pnl_sol: Option<f64>,
    pub realized_pnl_percent: Option<f64>,
    pub trigger_state: TriggerState,
    pub trigger_price: Option<f64>,
    pub trigger_error: Option<String>,
    pub executing_since: Option<DateTime<Utc>>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub launch_candidate_id: Option<i32>,
    pub entry_execution_id: Option<Uuid>,
    pub exit_execution_id: Option<Uuid>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.lifecycle_state != LifecycleState::Closed
    }

    /// Trailing stops are inert until the activation threshold is crossed.
    pub fn trailing_activation_price(&self) -> Option<f64> {
        self.trailing_activation_percent
            .map(|pct| self.entry_price * (1.0 + pct / 100.0))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = positions)]
pub struct NewPosition {
    pub user_id: i32,
    pub wallet_id: i32,
    pub strategy_id: Option<i32>,
    pub mint: String,
    pub lifecycle_state: LifecycleState,
    pub pricing_source: PricingSource,
    pub bonding_curve: Option<String>,
    pub entry_price: f64,
    pub entry_cost_sol: f64,
    pub size_tokens: i64,
    pub peak_price: Option<f64>,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub trailing_activation_percent: Option<f64>,
    pub trailing_distance_percent: Option<f64>,
    pub max_hold_seconds: Option<i64>,
    pub trigger_state: TriggerState,
    pub launch_candidate_id: Option<i32>,
    pub entry_execution_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use LifecycleState::*;
        assert!(PreGraduation.can_transition_to(PostGraduation));
        assert!(PreGraduation.can_transition_to(Closed));
        assert!(PostGraduation.can_transition_to(Closed));
        // graduation never reverses, CLOSED is terminal
        assert!(!PostGraduation.can_transition_to(PreGraduation));
        assert!(!Closed.can_transition_to(PreGraduation));
        assert!(!Closed.can_transition_to(PostGraduation));
    }

    #[test]
    fn pricing_source_pinned_to_lifecycle() {
        assert_eq!(
            LifecycleState::PreGraduation.pricing_source(),
            Some(PricingSource::BondingCurve)
        );
        assert_eq!(
            LifecycleState::PostGraduation.pricing_source(),
            Some(PricingSource::AmmPool)
        );
        assert_eq!(LifecycleState::Closed.pricing_source(), None);
    }

    #[test]
    fn trigger_transitions() {
        use TriggerState::*;
        assert!(Monitoring.can_transition_to(Triggered));
        assert!(Triggered.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Completed));
        assert!(Executing.can_transition_to(Failed));
        // re-arm only from FAILED
        assert!(Failed.can_transition_to(Monitoring));
        assert!(!Completed.can_transition_to(Monitoring));
        assert!(!Monitoring.can_transition_to(Executing));
        assert!(!Triggered.can_transition_to(Completed));
    }
}
