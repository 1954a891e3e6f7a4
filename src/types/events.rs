use crate::types::candidate::{DiscoveryMethod, LaunchSource};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde_derive::{Deserialize, Serialize};
use std::pin::Pin;

/// A stream of events emitted by a [Collector].
pub type EventStream<'a, E> = Pin<Box<dyn Stream<Item = E> + Send + 'a>>;

/// A source of raw events, like a launchpad create instruction seen on a
/// WebSocket feed.
#[async_trait]
pub trait Collector<E>: Send + Sync {
    async fn get_event_stream(&self) -> Result<EventStream<'_, E>>;
}

/// A launch seen by a discovery source, before persistence and dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredLaunch {
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub launch_source: LaunchSource,
    pub discovery_method: DiscoveryMethod,
    pub metadata_provenance: Option<String>,
    /// Opaque decoded payload kept for forensic logging only.
    pub raw_payload: serde_json::Value,
    /// Token-2022 mints derive ATAs under a different token program.
    pub is_token_2022: bool,
    pub bonding_curve: Option<String>,
}

/// Events on the internal bus between worker tasks. Workers otherwise
/// coordinate only through the store.
#[derive(Debug, Clone)]
pub enum BusEvent {
    LaunchDiscovered(DiscoveredLaunch),
    /// User-initiated emergency exit for a position; always wins over other
    /// triggers at the next sweep.
    EmergencyExit { position_id: i32 },
}
