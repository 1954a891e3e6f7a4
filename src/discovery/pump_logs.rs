use crate::config::app_context::AppContext;
use crate::config::constants::{
    SIGNATURE_DEDUP_CAPACITY, TX_FETCH_BACKOFF, TX_FETCH_RETRIES,
};
use crate::discovery::dedup::SignatureDedup;
use crate::discovery::metadata::{self, MetadataProvenance};
use crate::discovery::ws::{run_log_subscription, LogEvent, LogSubscription};
use crate::programs::registry::{
    self, KnownInstruction, PUMPFUN_PROGRAM_PUBKEY, PUMP_PRO_PROGRAM_PUBKEY,
};
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

/// Inline metadata carried by pump.fun `create`/`create_v2` instruction data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineCreateArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub is_mayhem_mode: Option<bool>,
}

fn read_borsh_string(data: &[u8], cursor: &mut usize) -> Result<String, TradeError> {
    if data.len() < *cursor + 4 {
        return Err(TradeError::InvalidInput("create args truncated".into()));
    }
    let len = u32::from_le_bytes(data[*cursor..*cursor + 4].try_into().unwrap()) as usize;
    *cursor += 4;
    if data.len() < *cursor + len {
        return Err(TradeError::InvalidInput("create string overruns data".into()));
    }
    let s = String::from_utf8(data[*cursor..*cursor + len].to_vec())
        .map_err(|e| TradeError::InvalidInput(format!("create string not utf-8: {e}")))?;
    *cursor += len;
    Ok(s)
}

/// Decode `(name, symbol, uri, is_mayhem_mode?)` from create instruction
/// data, after the 8-byte discriminator. Trailing fields beyond the flag are
/// tolerated.
pub fn decode_create_args(data: &[u8]) -> Result<InlineCreateArgs, TradeError> {
    if data.len() < 8 {
        return Err(TradeError::InvalidInput("create data too short".into()));
    }
    let mut cursor = 8usize;
    let name = read_borsh_string(data, &mut cursor)?;
    let symbol = read_borsh_string(data, &mut cursor)?;
    let uri = read_borsh_string(data, &mut cursor)?;
    // optional creator pubkey then mayhem flag, depending on layout version
    let is_mayhem_mode = match data.len().saturating_sub(cursor) {
        0 => None,
        1 => Some(data[cursor] != 0),
        n if n >= 33 => Some(data[cursor + 32] != 0),
        _ => None,
    };
    Ok(InlineCreateArgs {
        name,
        symbol,
        uri,
        is_mayhem_mode,
    })
}

/// WebSocket discovery for pump.fun and pump.pro launches: subscribe to the
/// program logs, fetch each creating transaction, decode it by
/// discriminator, and emit a launch candidate.
pub struct PumpLaunchCollector {
    context: AppContext,
    ws_urls: Vec<String>,
    pump_rest_base: String,
}

impl PumpLaunchCollector {
    pub async fn new(context: &AppContext) -> Self {
        let settings = context.get_settings().await;
        Self {
            context: context.clone(),
            ws_urls: settings.solana.ws_urls_or_derived(),
            pump_rest_base: settings.discovery.pump_rest_base.clone(),
        }
    }

    /// Fetch a just-notified transaction; it may not be indexed yet.
    async fn fetch_tx_with_retry(
        context: &AppContext,
        signature: &Signature,
    ) -> Result<solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta, TradeError>
    {
        let mut attempt = 0u32;
        loop {
            match context.rpc.get_transaction(signature).await {
                Ok(tx) => return Ok(tx),
                Err(e) => {
                    attempt += 1;
                    if attempt >= TX_FETCH_RETRIES {
                        return Err(e);
                    }
                    sleep(TX_FETCH_BACKOFF).await;
                }
            }
        }
    }

    async fn decode_launch(
        context: &AppContext,
        pump_rest_base: &str,
        signature_str: &str,
    ) -> Result<Option<DiscoveredLaunch>, TradeError> {
        let signature = Signature::from_str(signature_str)
            .map_err(|e| TradeError::InvalidInput(format!("bad signature: {e}")))?;
        let tx = Self::fetch_tx_with_retry(context, &signature).await?;
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
            if !known.is_create() {
                continue;
            }
            let mint = match ix.accounts.first() {
                Some(mint) => *mint,
                None => continue,
            };
            let bonding_curve = ix
                .accounts
                .get(match known {
                    KnownInstruction::PumpProCreate => 1,
                    _ => 2,
                })
                .map(|k| k.to_string());

            let launch = match known {
                KnownInstruction::PumpfunCreate | KnownInstruction::PumpfunCreateV2 => {
                    let args = decode_create_args(&ix.data)?;
                    DiscoveredLaunch {
                        mint: mint.to_string(),
                        symbol: Some(args.symbol.clone()),
                        name: Some(args.name.clone()),
                        launch_source: LaunchSource::Pumpfun,
                        discovery_method: DiscoveryMethod::Onchain,
                        metadata_provenance: Some(MetadataProvenance::Inline.as_str().to_string()),
                        raw_payload: json!({
                            "signature": signature_str,
                            "instruction": known.name(),
                            "uri": args.uri,
                            "is_mayhem_mode": args.is_mayhem_mode,
                        }),
                        is_token_2022: known == KnownInstruction::PumpfunCreateV2,
                        bonding_curve,
                    }
                }
                KnownInstruction::PumpProCreate => {
                    // short instruction data, metadata resolved off-chain
                    let resolved = metadata::resolve_pump_pro_metadata(
                        &context.http,
                        pump_rest_base,
                        &context.rpc,
                        &mint,
                    )
                    .await;
                    DiscoveredLaunch {
                        mint: mint.to_string(),
                        symbol: Some(resolved.symbol.clone()),
                        name: Some(resolved.name.clone()),
                        launch_source: LaunchSource::Pumpfun,
                        discovery_method: DiscoveryMethod::Onchain,
                        metadata_provenance: Some(resolved.provenance.as_str().to_string()),
                        raw_payload: json!({
                            "signature": signature_str,
                            "instruction": known.name(),
                            "uri": resolved.uri,
                        }),
                        is_token_2022: false,
                        bonding_curve,
                    }
                }
                _ => continue,
            };
            info!(mint = %launch.mint, instruction = known.name(), "pump launch discovered");
            return Ok(Some(launch));
        }
        Ok(None)
    }
}

#[async_trait]
impl Collector<BusEvent> for PumpLaunchCollector {
    async fn get_event_stream(&self) -> Result<EventStream<'_, BusEvent>> {
        let (log_tx, mut log_rx) = mpsc::unbounded_channel::<LogEvent>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BusEvent>();
        let shutdown = self.context.shutdown_signal();

        let ws_url = self
            .ws_urls
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no websocket endpoint configured"))?;
        for (name, program_id) in [
            ("pumpfun-logs", *PUMPFUN_PROGRAM_PUBKEY),
            ("pumppro-logs", *PUMP_PRO_PROGRAM_PUBKEY),
        ] {
            tokio::spawn(run_log_subscription(
                LogSubscription {
                    name,
                    ws_url: ws_url.clone(),
                    program_id,
                },
                log_tx.clone(),
                shutdown.clone(),
            ));
        }

        let context = self.context.clone();
        let pump_rest_base = self.pump_rest_base.clone();
        tokio::spawn(async move {
            let dedup = Arc::new(SignatureDedup::new(SIGNATURE_DEDUP_CAPACITY));
            while let Some((signature, _logs)) = log_rx.recv().await {
                if !dedup.insert(&signature) {
                    continue;
                }
                match Self::decode_launch(&context, &pump_rest_base, &signature).await {
                    Ok(Some(launch)) => {
                        if event_tx.send(BusEvent::LaunchDiscovered(launch)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(signature = %signature, error = %e, "launch decode skipped");
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(event_rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_create_args(name: &str, symbol: &str, uri: &str, mayhem: Option<bool>) -> Vec<u8> {
        let mut data = registry::discriminators::PUMPFUN_CREATE.to_vec();
        for s in [name, symbol, uri] {
            data.extend_from_slice(&(s.len() as u32).to_le_bytes());
            data.extend_from_slice(s.as_bytes());
        }
        if let Some(flag) = mayhem {
            data.push(flag as u8);
        }
        data
    }

    #[test]
    fn decodes_inline_create_metadata() {
        let data = encode_create_args("Moon Cat", "MCAT", "https://pump.fun/mcat.json", None);
        let args = decode_create_args(&data).unwrap();
        assert_eq!(args.name, "Moon Cat");
        assert_eq!(args.symbol, "MCAT");
        assert_eq!(args.uri, "https://pump.fun/mcat.json");
        assert_eq!(args.is_mayhem_mode, None);
    }

    #[test]
    fn decodes_trailing_mayhem_flag() {
        let data = encode_create_args("A", "B", "", Some(true));
        assert_eq!(decode_create_args(&data).unwrap().is_mayhem_mode, Some(true));
        let data = encode_create_args("A", "B", "", Some(false));
        assert_eq!(decode_create_args(&data).unwrap().is_mayhem_mode, Some(false));
    }

    #[test]
    fn truncated_create_data_is_rejected() {
        let data = encode_create_args("Moon Cat", "MCAT", "uri", None);
        assert!(decode_create_args(&data[..12]).is_err());
        assert!(decode_create_args(&[0u8; 4]).is_err());
    }
}
