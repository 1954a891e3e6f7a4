pub mod bags_telegram;
pub mod dedup;
pub mod metadata;
pub mod meteora_dbc;
pub mod pump_logs;
pub mod ws;

use crate::types::candidate::{DiscoveryMethod, LaunchSource};
use crate::types::events::{BusEvent, Collector, DiscoveredLaunch, EventStream};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

/// Bridges the external Bags Telegram feed into the discovery bus. The feed
/// pushes raw message text; the deterministic parser decides what counts.
pub struct BagsTelegramCollector {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl BagsTelegramCollector {
    pub fn new(receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

#[async_trait]
impl Collector<BusEvent> for BagsTelegramCollector {
    async fn get_event_stream(&self) -> Result<EventStream<'_, BusEvent>> {
        let mut raw_rx = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("bags telegram stream already taken"))?;
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BusEvent>();
        tokio::spawn(async move {
            while let Some(message) = raw_rx.recv().await {
                match bags_telegram::parse_bags_message(&message) {
                    Ok(parsed) => {
                        info!(mint = %parsed.mint, "bags telegram launch parsed");
                        let launch = DiscoveredLaunch {
                            mint: parsed.mint,
                            symbol: parsed.symbol,
                            name: parsed.name,
                            launch_source: LaunchSource::Bags,
                            discovery_method: DiscoveryMethod::Telegram,
                            metadata_provenance: None,
                            raw_payload: json!({ "message": message }),
                            is_token_2022: false,
                            bonding_curve: None,
                        };
                        if event_tx.send(BusEvent::LaunchDiscovered(launch)).is_err() {
                            return;
                        }
                    }
                    Err(reason) => {
                        debug!(reason = %reason, "bags message rejected");
                    }
                }
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(event_rx)))
    }
}
