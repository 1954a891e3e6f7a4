use crate::schema::launch_candidates;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::LaunchSourceType"]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LaunchSource {
    Bags,
    Pumpfun,
}

impl LaunchSource {
    /// Launchpad label used by strategy `allowed_launchpads` filters.
    pub fn launchpad(&self) -> &'static str {
        match self {
            LaunchSource::Bags => "bags",
            LaunchSource::Pumpfun => "pumpfun",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::DiscoveryMethodType"]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscoveryMethod {
    Telegram,
    Onchain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::CandidateStatusType"]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CandidateStatus {
    New,
    Accepted,
    Rejected,
    Expired,
}

impl CandidateStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CandidateStatus::New)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_new_is_non_terminal() {
        assert!(!CandidateStatus::New.is_terminal());
        assert!(CandidateStatus::Accepted.is_terminal());
        assert!(CandidateStatus::Rejected.is_terminal());
        assert!(CandidateStatus::Expired.is_terminal());
    }
}

/// A freshly discovered token launch, deduplicated by `(mint, launch_source)`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = launch_candidates)]
pub struct LaunchCandidate {
    pub id: i32,
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub launch_source: LaunchSource,
    pub discovery_method: DiscoveryMethod,
    pub metadata_provenance: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
    pub status: CandidateStatus,
    pub status_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = launch_candidates)]
pub struct NewLaunchCandidate {
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub launch_source: LaunchSource,
    pub discovery_method: DiscoveryMethod,
    pub metadata_provenance: Option<String>,
    pub raw_payload: serde_json::Value,
}
