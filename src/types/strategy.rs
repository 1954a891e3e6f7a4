use crate::schema::strategies;
use crate::types::user::User;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

/// Per-user trade-off between discovery latency and metadata depth.
/// `Balanced` exists in storage and scoring even where a UI exposes only
/// speed/quality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum, Display,
)]
#[ExistingTypePath = "crate::schema::sql_types::SnipeModeType"]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnipeMode {
    Speed,
    Balanced,
    Quality,
}

impl SnipeMode {
    /// Metadata fetch budget for scoring, per mode.
    pub fn metadata_budget(&self) -> Option<std::time::Duration> {
        match self {
            SnipeMode::Speed => None,
            SnipeMode::Balanced => Some(std::time::Duration::from_millis(200)),
            SnipeMode::Quality => Some(std::time::Duration::from_secs(2)),
        }
    }
}

/// Armed autohunt configuration for one user on one chain.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = strategies)]
#[diesel(belongs_to(User))]
pub struct Strategy {
    pub id: i32,
    pub user_id: i32,
    pub chain: String,
    pub enabled: bool,
    pub min_score: i32,
    pub max_per_trade_sol: f64,
    pub max_positions: i32,
    pub slippage_bps: i32,
    pub priority_fee_lamports: Option<i64>,
    pub snipe_mode: SnipeMode,
    pub tp_percent: f64,
    pub sl_percent: f64,
    pub trailing_enabled: bool,
    pub trailing_activation_percent: f64,
    pub trailing_distance_percent: f64,
    pub max_hold_seconds: Option<i64>,
    pub exit_on_graduation: bool,
    pub min_liquidity_sol: Option<f64>,
    pub allowed_launchpads: Vec<String>,
    pub token_allowlist: Vec<String>,
    pub token_denylist: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Strategy {
    pub fn allows_launchpad(&self, launchpad: &str) -> bool {
        self.allowed_launchpads.is_empty()
            || self.allowed_launchpads.iter().any(|l| l == launchpad)
    }

    pub fn allows_mint(&self, mint: &str) -> bool {
        if self.token_denylist.iter().any(|m| m == mint) {
            return false;
        }
        self.token_allowlist.is_empty() || self.token_allowlist.iter().any(|m| m == mint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy_with_lists(allow: Vec<&str>, deny: Vec<&str>) -> Strategy {
        Strategy {
            id: 1,
            user_id: 1,
            chain: "solana".into(),
            enabled: true,
            min_score: 23,
            max_per_trade_sol: 0.1,
            max_positions: 3,
            slippage_bps: 300,
            priority_fee_lamports: None,
            snipe_mode: SnipeMode::Balanced,
            tp_percent: 100.0,
            sl_percent: 50.0,
            trailing_enabled: false,
            trailing_activation_percent: 50.0,
            trailing_distance_percent: 20.0,
            max_hold_seconds: None,
            exit_on_graduation: false,
            min_liquidity_sol: None,
            allowed_launchpads: vec![],
            token_allowlist: allow.into_iter().map(String::from).collect(),
            token_denylist: deny.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn denylist_beats_allowlist() {
        let s = strategy_with_lists(vec!["MintA"], vec!["MintA"]);
        assert!(!s.allows_mint("MintA"));
    }

    #[test]
    fn empty_allowlist_allows_everything_not_denied() {
        let s = strategy_with_lists(vec![], vec!["Bad"]);
        assert!(s.allows_mint("Good"));
        assert!(!s.allows_mint("Bad"));
    }

    #[test]
    fn non_empty_allowlist_requires_membership() {
        let s = strategy_with_lists(vec!["Only"], vec![]);
        assert!(s.allows_mint("Only"));
        assert!(!s.allows_mint("Other"));
    }

    #[test]
    fn snipe_mode_budgets() {
        assert!(SnipeMode::Speed.metadata_budget().is_none());
        assert_eq!(
            SnipeMode::Balanced.metadata_budget().unwrap().as_millis(),
            200
        );
        assert_eq!(SnipeMode::Quality.metadata_budget().unwrap().as_secs(), 2);
    }
}
