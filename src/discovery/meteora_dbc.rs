use crate::config::app_context::AppContext;
use crate::config::constants::{SIGNATURE_DEDUP_CAPACITY, TX_FETCH_BACKOFF, TX_FETCH_RETRIES};
use crate::discovery::dedup::SignatureDedup;
use crate::discovery::ws::{run_log_subscription, LogEvent, LogSubscription};
use crate::programs::registry::{self, METEORA_DBC_PROGRAM_PUBKEY};
use crate::solana::tx_parser;
use crate::types::candidate::{DiscoveryMethod, LaunchSource};
use crate::types::error::TradeError;
use crate::types::events::{BusEvent, Collector, DiscoveredLaunch, EventStream};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

/// Does this log set describe a DBC pool creation? Only an exact
/// `Program log: Instruction: InitializePool`/`CreatePool` line counts; a
/// mention of the word inside other log text must not.
pub fn is_create_instruction(logs: &[String]) -> bool {
    logs.iter().any(|line| {
        matches!(
            line.strip_prefix("Program log: Instruction: "),
            Some("InitializePool") | Some("CreatePool")
        )
    })
}

/// Bags launches surface on Meteora's Dynamic Bonding Curve program. Pool
/// creations are detected by discriminator after a cheap log pre-filter;
/// the Telegram Bags feed cross-references the same mints by source dedup.
pub struct MeteoraDbcCollector {
    context: AppContext,
    ws_urls: Vec<String>,
}

impl MeteoraDbcCollector {
    pub async fn new(context: &AppContext) -> Self {
        let settings = context.get_settings().await;
        Self {
            context: context.clone(),
            ws_urls: settings.solana.ws_urls_or_derived(),
        }
    }

    async fn decode_launch(
        context: &AppContext,
        signature_str: &str,
    ) -> Result<Option<DiscoveredLaunch>, TradeError> {
        let signature = Signature::from_str(signature_str)
            .map_err(|e| TradeError::InvalidInput(format!("bad signature: {e}")))?;
        let mut attempt = 0u32;
        let tx = loop {
            match context.rpc.get_transaction(&signature).await {
                Ok(tx) => break tx,
                Err(e) => {
                    attempt += 1;
                    if attempt >= TX_FETCH_RETRIES {
                        return Err(e);
                    }
                    sleep(TX_FETCH_BACKOFF).await;
                }
            }
        };
        if tx
            .transaction
            .meta
            .as_ref()
            .map(|m| m.err.is_some())
            .unwrap_or(true)
        {
            return Ok(None);
        }

        for ix in tx_parser::walk_instructions(&tx.transaction)? {
            let Some(known) = registry::identify_instruction(&ix.program_id, &ix.data) else {
                continue;
            };
            if !known.is_create() || ix.program_id != *METEORA_DBC_PROGRAM_PUBKEY {
                continue;
            }
            // base_mint per the pool-create account ordering
            let ordering = known.account_ordering();
            let base_mint_index = ordering.iter().position(|n| *n == "base_mint").unwrap_or(3);
            let Some(mint) = ix.accounts.get(base_mint_index) else {
                continue;
            };
            let pool = ordering
                .iter()
                .position(|n| *n == "pool")
                .and_then(|i| ix.accounts.get(i))
                .map(|k| k.to_string());

            info!(mint = %mint, instruction = known.name(), "bags dbc launch discovered");
            return Ok(Some(DiscoveredLaunch {
                mint: mint.to_string(),
                symbol: None,
                name: None,
                launch_source: LaunchSource::Bags,
                discovery_method: DiscoveryMethod::Onchain,
                metadata_provenance: None,
                raw_payload: json!({
                    "signature": signature_str,
                    "instruction": known.name(),
                    "pool": pool,
                }),
                is_token_2022: false,
                bonding_curve: pool,
            }));
        }
        Ok(None)
    }
}

#[async_trait]
impl Collector<BusEvent> for MeteoraDbcCollector {
    async fn get_event_stream(&self) -> Result<EventStream<'_, BusEvent>> {
        let (log_tx, mut log_rx) = mpsc::unbounded_channel::<LogEvent>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BusEvent>();

        let ws_url = self
            .ws_urls
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no websocket endpoint configured"))?;
        tokio::spawn(run_log_subscription(
            LogSubscription {
                name: "meteora-dbc-logs",
                ws_url,
                program_id: *METEORA_DBC_PROGRAM_PUBKEY,
            },
            log_tx,
            self.context.shutdown_signal(),
        ));

        let context = self.context.clone();
        tokio::spawn(async move {
            let dedup = Arc::new(SignatureDedup::new(SIGNATURE_DEDUP_CAPACITY));
            while let Some((signature, logs)) = log_rx.recv().await {
                if !is_create_instruction(&logs) {
                    continue;
                }
                if !dedup.insert(&signature) {
                    continue;
                }
                match Self::decode_launch(&context, &signature).await {
                    Ok(Some(launch)) => {
                        if event_tx.send(BusEvent::LaunchDiscovered(launch)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!(signature = %signature, error = %e, "dbc decode skipped"),
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(event_rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_pool_logs_are_detected() {
        let logs = vec![
            "Program dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN invoke [1]".to_string(),
            "Program log: Instruction: InitializePool".to_string(),
            "Program dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN success".to_string(),
        ];
        assert!(is_create_instruction(&logs));
    }

    #[test]
    fn create_pool_mention_in_other_text_does_not_count() {
        let logs = vec![
            "Program dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN invoke [1]".to_string(),
            "Program log: Instruction: Swap".to_string(),
            "Program log: CreatePool mentioned".to_string(),
            "Program dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN success".to_string(),
        ];
        assert!(!is_create_instruction(&logs));
    }

    #[test]
    fn create_pool_exact_line_is_detected() {
        let logs = vec!["Program log: Instruction: CreatePool".to_string()];
        assert!(is_create_instruction(&logs));
    }
}
