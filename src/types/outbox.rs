use crate::schema::notifications_outbox;
use crate::types::user::User;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display)]
#[ExistingTypePath = "crate::schema::sql_types::OutboxStatusType"]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

/// Notification type tags; the payload shape is the sink's concern.
pub mod notification_type {
    pub const BUY_FILLED: &str = "buy_filled";
    pub const BUY_FAILED: &str = "buy_failed";
    pub const EXIT_TRIGGERED: &str = "exit_triggered";
    pub const EXIT_COMPLETED: &str = "exit_completed";
    pub const TRIGGER_FAILED: &str = "trigger_failed";
    pub const GRADUATION: &str = "graduation";
    pub const KILL_SWITCH_BLOCKED: &str = "kill_switch_blocked";
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = notifications_outbox)]
#[diesel(belongs_to(User))]
pub struct OutboxNotification {
    pub id: i64,
    pub user_id: i32,
    pub notification_type: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub sending_expires_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = notifications_outbox)]
pub struct NewOutboxNotification {
    pub user_id: i32,
    pub notification_type: String,
    pub payload: serde_json::Value,
}

impl NewOutboxNotification {
    pub fn new(user_id: i32, notification_type: &str, payload: serde_json::Value) -> Self {
        Self {
            user_id,
            notification_type: notification_type.to_string(),
            payload,
        }
    }
}
