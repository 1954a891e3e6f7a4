use std::time::Duration;

// every outbound call carries an explicit timeout
pub const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const BROADCAST_TIMEOUT: Duration = Duration::from_secs(10);
pub const METADATA_REST_TIMEOUT: Duration = Duration::from_secs(3);
pub const SIGNER_TIMEOUT: Duration = Duration::from_secs(5);
pub const AMM_QUOTE_TIMEOUT: Duration = Duration::from_secs(5);

pub const PUBLIC_RPC_FALLBACK: &str = "https://api.mainnet-beta.solana.com";

// trade locks
pub const TRADE_LOCK_TTL_SECONDS: i64 = 60;

// slippage bounds: [0.1%, 50%]
pub const SLIPPAGE_MIN_BPS: i32 = 10;
pub const SLIPPAGE_MAX_BPS: i32 = 5_000;

// confirmation polling
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

// tx fetch after a logsNotification: the node may not have indexed it yet
pub const TX_FETCH_RETRIES: u32 = 3;
pub const TX_FETCH_BACKOFF: Duration = Duration::from_millis(500);

// websocket hygiene
pub const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const WS_MAX_MISSED_HEARTBEATS: u32 = 2;
pub const WS_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(3);
pub const WS_RECONNECT_MAX_ATTEMPTS: u32 = 10;
pub const WS_RECONNECT_COOLDOWN: Duration = Duration::from_secs(60);

// inbound signature dedup LRU
pub const SIGNATURE_DEDUP_CAPACITY: usize = 8_192;

// price cache (per-process, bounded)
pub const PRICE_CACHE_CAPACITY: usize = 1_000;
pub const PRICE_CACHE_TTL: Duration = Duration::from_secs(10);
pub const AMM_QUOTE_CACHE_TTL: Duration = Duration::from_secs(30);
pub const PRICE_CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

// honeypot heuristic: round-trip loss beyond this is fatal
pub const HONEYPOT_ROUND_TRIP_LOSS: f64 = 0.90;

// background cadences
pub const ENDPOINT_HEALTH_RESET_INTERVAL: Duration = Duration::from_secs(120);
pub const GRADUATION_POLL_INTERVAL_DEFAULT_MS: u64 = 10_000;
pub const TRIGGER_SWEEP_INTERVAL_DEFAULT_MS: u64 = 2_000;
pub const OPPORTUNITY_POLL_INTERVAL: Duration = Duration::from_millis(500);

// a position stuck in EXECUTING longer than this is reconciled at startup
pub const EXECUTING_STALE_AFTER_SECONDS: i64 = 120;

// outbox worker
pub const OUTBOX_CLAIM_BATCH: i64 = 20;
pub const OUTBOX_LEASE_SECONDS: i64 = 30;
pub const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

// event bus
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

// launchpad token decimals (pump.fun and pump.pro mints are 6-decimal)
pub const LAUNCHPAD_TOKEN_DECIMALS: u8 = 6;
