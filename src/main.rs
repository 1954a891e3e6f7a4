mod config;
mod discovery;
mod execution;
mod graduation;
mod lifecycle;
mod opportunity;
mod outbox;
mod programs;
mod router;
mod schema;
mod scoring;
mod solana;
mod storage;
mod triggers;
mod types;
mod utils;

use crate::config::constants::{
    ENDPOINT_HEALTH_RESET_INTERVAL, EVENT_CHANNEL_CAPACITY, PRICE_CACHE_CLEANUP_INTERVAL,
};
use crate::discovery::meteora_dbc::MeteoraDbcCollector;
use crate::discovery::pump_logs::PumpLaunchCollector;
use crate::discovery::BagsTelegramCollector;
use crate::execution::engine::ExecutionEngine;
use crate::graduation::GraduationMonitor;
use crate::opportunity::OpportunityLoop;
use crate::outbox::{HttpSink, OutboxWorker};
use crate::router::{amm::AmmRouter, bonding_curve::BondingCurveRouter, RouterSet};
use crate::triggers::TriggerEngine;
use crate::types::events::{BusEvent, Collector};
use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let context = config::app_context::AppContext::new("config").await;
    info!(instance_id = %context.instance_id, "starting raptor");

    // reconcile anything a previous instance left mid-flight
    if let Err(e) = triggers::recover_stale_executing(&context).await {
        warn!(error = %e, "startup reconciliation incomplete");
    }

    let settings = context.get_settings().await;
    let quote_base_url = settings.amm.quote_base_url.clone();
    let sink_url = settings.outbox.sink_url.clone();
    let pumpfun_enabled = settings.discovery.pumpfun_enabled;
    let dbc_enabled = settings.discovery.meteora_dbc_enabled;
    drop(settings);

    let routers = RouterSet {
        bonding_curve: Arc::new(BondingCurveRouter::new(context.rpc.clone())),
        amm: Arc::new(AmmRouter::new(
            context.rpc.clone(),
            context.http.clone(),
            quote_base_url,
        )),
    };
    let engine = Arc::new(ExecutionEngine::new(context.clone(), routers));

    let (event_tx, _) = broadcast::channel::<BusEvent>(EVENT_CHANNEL_CAPACITY);
    let mut set = JoinSet::new();

    // discovery collectors feed the shared event bus
    let mut collectors: Vec<Box<dyn Collector<BusEvent>>> = Vec::new();
    if pumpfun_enabled {
        collectors.push(Box::new(PumpLaunchCollector::new(&context).await));
    }
    if dbc_enabled {
        collectors.push(Box::new(MeteoraDbcCollector::new(&context).await));
    }
    // the external Bags feed pushes raw message text into this channel
    let (_bags_tx, bags_rx) = mpsc::unbounded_channel::<String>();
    collectors.push(Box::new(BagsTelegramCollector::new(bags_rx)));

    for collector in collectors {
        let event_tx = event_tx.clone();
        set.spawn(async move {
            let mut stream = match collector.get_event_stream().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!(error = %e, "collector failed to start");
                    return;
                }
            };
            while let Some(event) = stream.next().await {
                if event_tx.send(event).is_err() {
                    return;
                }
            }
        });
    }

    let opportunity = OpportunityLoop::new(context.clone(), engine.clone());
    set.spawn(opportunity.run(event_tx.subscribe()));

    let trigger_engine = TriggerEngine::new(&context, engine.clone()).await;
    set.spawn(trigger_engine.run(event_tx.subscribe()));

    set.spawn(GraduationMonitor::new(&context).run());

    let sink = Arc::new(HttpSink::new(context.http.clone(), sink_url));
    set.spawn(OutboxWorker::new(&context, sink).run());

    // housekeeping: endpoint health resets and price cache eviction
    {
        let context = context.clone();
        set.spawn(async move {
            let mut health = tokio::time::interval(ENDPOINT_HEALTH_RESET_INTERVAL);
            let mut cache = tokio::time::interval(PRICE_CACHE_CLEANUP_INTERVAL);
            let mut shutdown = context.shutdown_signal();
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                    _ = health.tick() => context.rpc.reset_health(),
                    _ = cache.tick() => {
                        context.price_cache.evict_expired();
                        context.amm_quote_cache.evict_expired();
                    }
                }
            }
        });
    }

    info!("all workers started");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        Some(res) = set.join_next() => {
            error!("worker exited unexpectedly: {:?}", res);
        }
    }

    // graceful shutdown: sources stop subscribing, the outbox finishes its
    // in-flight leases, the trigger engine finishes its current sweep
    let _ = context.shutdown.send(true);
    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            error!("worker join error: {e}");
        }
    }
    info!("raptor stopped");
    Ok(())
}
