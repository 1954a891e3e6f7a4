use crate::config::constants::{
    WS_HEARTBEAT_INTERVAL, WS_MAX_MISSED_HEARTBEATS, WS_RECONNECT_BASE_DELAY,
    WS_RECONNECT_COOLDOWN, WS_RECONNECT_MAX_ATTEMPTS,
};
use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// One logsSubscribe connection to one launchpad program. The reconnect
/// counter and heartbeat state are owned by this task alone.
#[derive(Debug, Clone)]
pub struct LogSubscription {
    pub name: &'static str,
    pub ws_url: String,
    pub program_id: Pubkey,
}

/// Raw notification: transaction signature plus its log lines.
pub type LogEvent = (String, Vec<String>);

/// Run the subscription until shutdown. Connection liveness is watched via a
/// heartbeat window; a connection that misses two windows is declared dead
/// and reconnected with `3s × min(attempts, 5)` backoff, a 60s cooldown
/// after ten straight failures, then a fresh counter.
pub async fn run_log_subscription(
    subscription: LogSubscription,
    sink: mpsc::UnboundedSender<LogEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempts: u32 = 0;
    loop {
        if *shutdown.borrow() {
            info!(source = subscription.name, "log subscription stopping");
            return;
        }
        if attempts > 0 {
            if attempts > WS_RECONNECT_MAX_ATTEMPTS {
                warn!(
                    source = subscription.name,
                    "reconnect attempts exhausted, cooling down"
                );
                sleep(WS_RECONNECT_COOLDOWN).await;
                attempts = 0;
            } else {
                sleep(WS_RECONNECT_BASE_DELAY * attempts.min(5)).await;
            }
        }

        let client = match PubsubClient::new(&subscription.ws_url).await {
            Ok(client) => client,
            Err(e) => {
                warn!(source = subscription.name, error = %e, "websocket connect failed");
                attempts += 1;
                continue;
            }
        };
        let subscribe = client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![subscription.program_id.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(CommitmentConfig::confirmed()),
                },
            )
            .await;
        let (mut stream, unsubscribe) = match subscribe {
            Ok(pair) => pair,
            Err(e) => {
                warn!(source = subscription.name, error = %e, "logsSubscribe failed");
                attempts += 1;
                continue;
            }
        };
        info!(
            source = subscription.name,
            program = %subscription.program_id,
            "logs subscription confirmed"
        );
        attempts = 0;

        let mut missed_heartbeats = 0u32;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        unsubscribe().await;
                        info!(source = subscription.name, "log subscription stopping");
                        return;
                    }
                }
                next = timeout(WS_HEARTBEAT_INTERVAL, stream.next()) => {
                    match next {
                        Ok(Some(notification)) => {
                            missed_heartbeats = 0;
                            let signature = notification.value.signature.clone();
                            let logs = notification.value.logs.clone();
                            if sink.send((signature, logs)).is_err() {
                                // receiver dropped, nothing left to feed
                                unsubscribe().await;
                                return;
                            }
                        }
                        Ok(None) => {
                            warn!(source = subscription.name, "log stream closed by server");
                            break;
                        }
                        Err(_) => {
                            missed_heartbeats += 1;
                            debug!(
                                source = subscription.name,
                                missed_heartbeats, "heartbeat window elapsed without traffic"
                            );
                            if missed_heartbeats >= WS_MAX_MISSED_HEARTBEATS {
                                warn!(
                                    source = subscription.name,
                                    "connection declared dead, forcing reconnect"
                                );
                                break;
                            }
                        }
                    }
                }
            }
        }
        attempts += 1;
        drop(stream);
    }
}
