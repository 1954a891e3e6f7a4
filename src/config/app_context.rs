use crate::config::constants::{
    AMM_QUOTE_CACHE_TTL, PRICE_CACHE_CAPACITY, PRICE_CACHE_TTL, SIGNER_TIMEOUT,
};
use crate::config::settings::Settings;
use crate::solana::rpc_fanout::RpcFanout;
use crate::solana::signer::{HttpSigner, TransactionSigner};
use crate::storage::persistent::{self, DbPool};
use crate::storage::price_cache::PriceCache;
use solana_sdk::commitment_config::CommitmentConfig;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

/// Handles to every shared collaborator, built once at startup and cloned
/// into each worker task. No module-level singletons.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<RwLock<Settings>>,
    pub rpc: RpcFanout,
    pub db_pool: DbPool,
    /// Bonding-curve spot prices, short TTL.
    pub price_cache: Arc<PriceCache>,
    /// AMM aggregator quotes, longer TTL with jitter.
    pub amm_quote_cache: Arc<PriceCache>,
    pub signer: Arc<dyn TransactionSigner>,
    pub http: reqwest::Client,
    /// Identifies this process in trade locks and outbox leases.
    pub instance_id: String,
    pub shutdown: watch::Sender<bool>,
}

impl Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("rpc", &self.rpc)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

impl AppContext {
    pub async fn new(config_filename: &str) -> Self {
        let settings = Settings::new(config_filename).expect("Failed to load settings");

        let filter = tracing_subscriber::EnvFilter::new(&settings.logger.level)
            .add_directive("hyper::client=info".parse().unwrap())
            .add_directive("tokio_postgres=info".parse().unwrap())
            .add_directive("reqwest=info".parse().unwrap());
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .init();

        let rpc = RpcFanout::new(&settings.solana.rpc_urls, CommitmentConfig::confirmed());
        let db_pool = persistent::connect(&settings.storage.database_uri);
        let signer = Arc::new(
            HttpSigner::new(settings.signer.endpoint.clone(), SIGNER_TIMEOUT)
                .expect("Failed to build signer client"),
        );
        let (shutdown, _) = watch::channel(false);

        Self {
            settings: Arc::new(RwLock::new(settings)),
            rpc,
            db_pool,
            price_cache: Arc::new(PriceCache::new(PRICE_CACHE_CAPACITY, PRICE_CACHE_TTL)),
            amm_quote_cache: Arc::new(PriceCache::new(PRICE_CACHE_CAPACITY, AMM_QUOTE_CACHE_TTL)),
            signer,
            http: reqwest::Client::new(),
            instance_id: Uuid::new_v4().to_string(),
            shutdown,
        }
    }

    pub async fn get_settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().await
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
