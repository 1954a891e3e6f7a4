use crate::types::error::TradeError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_derive::{Deserialize, Serialize};
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tracing::debug;

/// Signs transactions on behalf of a user's active wallet. Private key
/// material never enters this process.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign `tx` with the given wallet. The signer service enforces that the
    /// wallet belongs to the requesting scope.
    async fn sign(
        &self,
        wallet_pubkey: &str,
        tx: &VersionedTransaction,
    ) -> Result<VersionedTransaction, TradeError>;
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    wallet: &'a str,
    transaction: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signed_transaction: String,
}

/// HTTP client for the external signer service.
#[derive(Debug, Clone)]
pub struct HttpSigner {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSigner {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, TradeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::Signer(e.to_string()))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl TransactionSigner for HttpSigner {
    async fn sign(
        &self,
        wallet_pubkey: &str,
        tx: &VersionedTransaction,
    ) -> Result<VersionedTransaction, TradeError> {
        let serialized =
            bincode::serialize(tx).map_err(|e| TradeError::Signer(format!("serialize: {e}")))?;
        let request = SignRequest {
            wallet: wallet_pubkey,
            transaction: BASE64.encode(serialized),
        };
        let response = self
            .http
            .post(format!("{}/sign", self.endpoint.trim_end_matches('/')))
            .json(&request)
            .send()
            .await
            .map_err(|e| TradeError::Signer(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TradeError::Signer(format!(
                "signer returned {}",
                response.status()
            )));
        }
        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| TradeError::Signer(format!("bad signer response: {e}")))?;
        let bytes = BASE64
            .decode(&body.signed_transaction)
            .map_err(|e| TradeError::Signer(format!("bad base64 from signer: {e}")))?;
        let signed: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| TradeError::Signer(format!("bad transaction from signer: {e}")))?;
        debug!(wallet = %wallet_pubkey, "transaction signed");
        Ok(signed)
    }
}
