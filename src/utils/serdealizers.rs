use diesel::deserialize::FromSql;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{IsNull, Output, ToSql};
use diesel::sql_types::Jsonb;
use diesel::{deserialize, serialize, sql_types};
use diesel_derives::{AsExpression, FromSqlRow};
use serde::{Deserialize, Deserializer, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt::Debug;
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, FromSqlRow, AsExpression)]
#[diesel(check_for_backend(Pg))]
#[diesel(sql_type = sql_types::Text)]
pub struct PubkeyString(pub Pubkey);

#[derive(Debug, Clone, FromSqlRow, AsExpression)]
#[diesel(check_for_backend(Pg))]
#[diesel(sql_type = sql_types::Text)]
pub struct SignatureString(pub Signature);

impl From<Pubkey> for PubkeyString {
    fn from(value: Pubkey) -> Self {
        PubkeyString(value)
    }
}

impl TryFrom<PubkeyString> for Pubkey {
    type Error = std::io::Error;

    fn try_from(value: PubkeyString) -> Result<Self, Self::Error> {
        Ok(value.0)
    }
}

impl ToSql<sql_types::Text, Pg> for PubkeyString {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.0.to_string().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::Text, Pg> for PubkeyString {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(bytes.as_bytes())?;
        Ok(PubkeyString(Pubkey::from_str(s)?))
    }
}

impl From<Signature> for SignatureString {
    fn from(value: Signature) -> Self {
        SignatureString(value)
    }
}

impl ToSql<sql_types::Text, Pg> for SignatureString {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.0.to_string().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::Text, Pg> for SignatureString {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(bytes.as_bytes())?;
        Ok(SignatureString(Signature::from_str(s)?))
    }
}

pub fn deserialize_pubkey<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Pubkey::from_str(&s).map_err(serde::de::Error::custom)
}

pub fn serialize_pubkey<S>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&key.to_string())
}

#[derive(Debug, Clone, FromSqlRow, AsExpression)]
#[diesel(sql_type = Jsonb)]
pub struct JsonbWrapper<T>(pub T);

impl<T> From<T> for JsonbWrapper<T> {
    fn from(value: T) -> Self {
        JsonbWrapper(value)
    }
}

impl<T> ToSql<Jsonb, Pg> for JsonbWrapper<T>
where
    T: Serialize + Debug,
{
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let value = serde_json::to_value(&self.0)?;
        out.write_all(&[1])?;
        serde_json::to_writer(out, &value)?;
        Ok(IsNull::No)
    }
}

impl<T> FromSql<Jsonb, Pg> for JsonbWrapper<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let data = bytes.as_bytes();
        if data.is_empty() || data[0] != 1 {
            return Err("unsupported JSONB version".into());
        }
        Ok(JsonbWrapper(serde_json::from_slice(&data[1..])?))
    }
}
