use crate::schema::{user_settings, users, wallets};
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::AllowlistModeType"]
#[serde(rename_all = "snake_case")]
pub enum AllowlistMode {
    Off,
    PartnersOnly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub telegram_chat_id: i64,
    pub tier: String,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Public keys only; private material lives in the external signer.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = wallets)]
#[diesel(belongs_to(User))]
pub struct Wallet {
    pub id: i32,
    pub user_id: i32,
    pub pubkey: String,
    pub label: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(check_for_backend(Pg))]
#[diesel(table_name = user_settings)]
#[diesel(primary_key(user_id))]
#[diesel(belongs_to(User))]
pub struct UserSettings {
    pub user_id: i32,
    pub slippage_bps: i32,
    pub max_positions: i32,
    pub max_trades_per_hour: i32,
    pub max_buy_amount_sol: f64,
    pub allowlist_mode: AllowlistMode,
    pub kill_switch: bool,
    pub updated_at: DateTime<Utc>,
}
