use crate::config::constants::{PUBLIC_RPC_FALLBACK, RPC_CALL_TIMEOUT};
use crate::types::error::TradeError;
use anyhow::Error;
use futures_util::future::{select_ok, BoxFuture};
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcSendTransactionConfig, RpcSimulateTransactionConfig, RpcTransactionConfig,
};
use solana_client::rpc_response::RpcSimulateTransactionResult;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument, trace, warn};

pub struct RpcEndpoint {
    pub name: String,
    client: Arc<RpcClient>,
    healthy: AtomicBool,
}

impl RpcEndpoint {
    fn new(name: String, url: String, commitment: CommitmentConfig) -> Self {
        Self {
            name,
            client: Arc::new(RpcClient::new_with_commitment(url, commitment)),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    fn mark_unhealthy(&self) {
        if self.healthy.swap(false, Ordering::Relaxed) {
            warn!(endpoint = %self.name, "rpc endpoint marked unhealthy");
        }
    }

    fn mark_healthy(&self) {
        self.healthy.store(true, Ordering::Relaxed);
    }
}

impl Debug for RpcEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEndpoint")
            .field("name", &self.name)
            .field("healthy", &self.is_healthy())
            .finish()
    }
}

/// Outcome of a fan-out broadcast: first endpoint to return a signature wins.
#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub signature: Signature,
    pub endpoint: String,
    pub latency: Duration,
}

/// Broadcasts signed transactions to every healthy endpoint in parallel and
/// falls through endpoints in priority order for plain RPC calls.
#[derive(Clone)]
pub struct RpcFanout {
    endpoints: Vec<Arc<RpcEndpoint>>,
}

impl Debug for RpcFanout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcFanout")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl RpcFanout {
    pub fn new(urls: &[String], commitment: CommitmentConfig) -> Self {
        let urls: Vec<String> = if urls.is_empty() {
            warn!(
                "no SOLANA_RPC_n endpoints configured, degrading to public fallback {}",
                PUBLIC_RPC_FALLBACK
            );
            vec![PUBLIC_RPC_FALLBACK.to_string()]
        } else {
            urls.to_vec()
        };
        let endpoints = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| Arc::new(RpcEndpoint::new(format!("rpc-{}", i + 1), url, commitment)))
            .collect();
        Self { endpoints }
    }

    fn healthy_endpoints(&self) -> Vec<Arc<RpcEndpoint>> {
        let healthy: Vec<_> = self
            .endpoints
            .iter()
            .filter(|e| e.is_healthy())
            .cloned()
            .collect();
        if healthy.is_empty() {
            // nothing healthy left: try everything rather than nothing
            self.endpoints.clone()
        } else {
            healthy
        }
    }

    /// Re-enable all endpoints. Run periodically so a transient outage does
    /// not exile an endpoint forever.
    pub fn reset_health(&self) {
        for endpoint in &self.endpoints {
            endpoint.mark_healthy();
        }
        debug!("rpc endpoint health reset");
    }

    fn is_connection_failure(e: &ClientError) -> bool {
        matches!(e.kind(), ClientErrorKind::Reqwest(_) | ClientErrorKind::Io(_))
    }

    /// Single-endpoint fallback chain in priority order. First success wins;
    /// endpoint-level connection failures flip the health flag and fall
    /// through to the next endpoint.
    pub async fn call<F, Fut, T>(&self, method: F) -> Result<T, TradeError>
    where
        F: Fn(Arc<RpcClient>) -> Fut + Send,
        Fut: Future<Output = Result<T, ClientError>> + Send,
        T: Send + 'static,
    {
        let mut last_error: Option<ClientError> = None;
        for endpoint in self.healthy_endpoints() {
            match timeout(RPC_CALL_TIMEOUT, method(endpoint.client.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    trace!(endpoint = %endpoint.name, error = %e, "rpc call failed");
                    if Self::is_connection_failure(&e) {
                        endpoint.mark_unhealthy();
                    }
                    last_error = Some(e);
                }
                Err(_) => {
                    trace!(endpoint = %endpoint.name, "rpc call timed out");
                    endpoint.mark_unhealthy();
                }
            }
        }
        Err(match last_error {
            Some(e) => TradeError::Rpc(e.to_string()),
            None => TradeError::AllEndpointsFailed,
        })
    }

    /// Broadcast a signed transaction to every healthy endpoint in parallel.
    /// Returns as soon as any endpoint yields a signature; remaining outcomes
    /// are still collected in the background for endpoint telemetry.
    #[instrument(skip(self, tx), fields(endpoints = self.endpoints.len()))]
    pub async fn broadcast(
        &self,
        tx: &VersionedTransaction,
        broadcast_timeout: Duration,
    ) -> Result<BroadcastOutcome, TradeError> {
        let started = Instant::now();
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentConfig::confirmed().commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            max_retries: Some(3),
            min_context_slot: None,
        };

        let mut attempts: Vec<BoxFuture<'static, Result<BroadcastOutcome, Error>>> = Vec::new();
        for endpoint in self.healthy_endpoints() {
            let tx = tx.clone();
            let endpoint = endpoint.clone();
            let config = config.clone();
            let task: JoinHandle<Result<BroadcastOutcome, Error>> = tokio::spawn(async move {
                let send = endpoint
                    .client
                    .send_transaction_with_config(&tx, config);
                match timeout(broadcast_timeout, send).await {
                    Ok(Ok(signature)) => {
                        let outcome = BroadcastOutcome {
                            signature,
                            endpoint: endpoint.name.clone(),
                            latency: started.elapsed(),
                        };
                        debug!(endpoint = %endpoint.name, signature = %signature, latency_ms = outcome.latency.as_millis() as u64, "broadcast accepted");
                        Ok(outcome)
                    }
                    Ok(Err(e)) => {
                        if RpcFanout::is_connection_failure(&e) {
                            endpoint.mark_unhealthy();
                        }
                        warn!(endpoint = %endpoint.name, error = %e, "broadcast rejected");
                        Err(e.into())
                    }
                    Err(_) => {
                        endpoint.mark_unhealthy();
                        warn!(endpoint = %endpoint.name, "broadcast timed out");
                        Err(anyhow::anyhow!("broadcast timed out on {}", endpoint.name))
                    }
                }
            });
            // flatten the join so a rejected send counts as a failure, not a
            // completion: select_ok must resolve on the first signature
            attempts.push(Box::pin(async move { task.await? }));
        }

        match select_ok(attempts).await {
            Ok((outcome, rest)) => {
                // let the stragglers finish for telemetry without blocking
                tokio::spawn(async move {
                    for attempt in rest {
                        let _ = attempt.await;
                    }
                });
                info!(endpoint = %outcome.endpoint, signature = %outcome.signature, "transaction broadcast");
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "all endpoints failed to broadcast");
                Err(TradeError::AllEndpointsFailed)
            }
        }
    }

    pub async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, TradeError> {
        let pubkey = *pubkey;
        self.call(move |client| async move { client.get_balance(&pubkey).await })
            .await
    }

    pub async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, TradeError> {
        let pubkey = *pubkey;
        self.call(move |client| async move { client.get_account(&pubkey).await })
            .await
    }

    /// `Ok(None)` when the account does not exist; launchpads close the
    /// bonding-curve account at migration, so absence is a signal, not an
    /// error.
    pub async fn get_account_optional(&self, pubkey: &Pubkey) -> Result<Option<Account>, TradeError> {
        let pubkey = *pubkey;
        let result = self
            .call(move |client| async move {
                client
                    .get_account_with_commitment(&pubkey, CommitmentConfig::confirmed())
                    .await
            })
            .await?;
        Ok(result.value)
    }

    /// Largest token accounts for a mint, in base units. Drives the
    /// distribution scoring category.
    pub async fn get_token_largest_amounts(&self, mint: &Pubkey) -> Result<Vec<u64>, TradeError> {
        let mint = *mint;
        let balances = self
            .call(move |client| async move { client.get_token_largest_accounts(&mint).await })
            .await?;
        Ok(balances
            .into_iter()
            .filter_map(|b| b.amount.amount.parse::<u64>().ok())
            .collect())
    }

    // get_transaction does not support commitment below confirmed
    pub async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<EncodedConfirmedTransactionWithStatusMeta, TradeError> {
        let signature = *signature;
        self.call(move |client| async move {
            client
                .get_transaction_with_config(
                    &signature,
                    RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::Base64),
                        commitment: Some(CommitmentConfig::confirmed()),
                        max_supported_transaction_version: Some(0),
                    },
                )
                .await
        })
        .await
    }

    pub async fn simulate(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<RpcSimulateTransactionResult, TradeError> {
        let tx = tx.clone();
        let response = self
            .call(move |client| {
                let tx = tx.clone();
                async move {
                    client
                        .simulate_transaction_with_config(
                            &tx,
                            RpcSimulateTransactionConfig {
                                sig_verify: false,
                                replace_recent_blockhash: true,
                                commitment: Some(CommitmentConfig::confirmed()),
                                encoding: Some(UiTransactionEncoding::Base64),
                                accounts: None,
                                min_context_slot: None,
                                inner_instructions: false,
                            },
                        )
                        .await
                }
            })
            .await?;
        Ok(response.value)
    }

    pub async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<solana_sdk::transaction::Result<()>>, TradeError> {
        let signature = *signature;
        self.call(move |client| async move {
            client
                .get_signature_status_with_commitment(&signature, CommitmentConfig::finalized())
                .await
        })
        .await
    }

    pub async fn get_latest_blockhash(&self) -> Result<solana_sdk::hash::Hash, TradeError> {
        self.call(move |client| async move { client.get_latest_blockhash().await })
            .await
    }
}
