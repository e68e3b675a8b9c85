//! Scanner configuration from environment variables
//!
//! Every knob has a default so the runtime starts with nothing but a node
//! URL. Parse failures fall back to the default silently, matching the
//! rest of the env handling here.

use std::env;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// JSON-RPC endpoint of the chain node.
    pub node_url: String,

    /// Path to the SQLite event store.
    pub db_path: String,

    /// Blocks per batch in the bulk scan.
    pub batch_size: u64,

    /// Maximum in-flight block fetches within one batch.
    pub max_concurrent_requests: usize,

    /// Block count cap for the priority single-address scan.
    pub priority_scan_max_blocks: u64,

    /// Height at which proof-of-stake activates; default resume point for
    /// addresses with no indexed history.
    pub activation_height: u64,

    /// Blocks a freshly created output must wait before staking again.
    pub cooldown_blocks: u64,

    // Gateway tuning.
    pub min_request_spacing_ms: u64,
    pub requests_per_second: u32,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub burst_limit: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_recovery_timeout_ms: u64,
    pub circuit_probe_successes: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_retries: u32,

    /// Capacity of the per-pass block cache.
    pub block_cache_capacity: usize,

    /// Non-fatal errors kept in the progress snapshot.
    pub max_recorded_errors: usize,

    /// Trend metrics older than this many hours get recomputed.
    pub trend_staleness_hours: i64,

    /// Half-window comparisons within this band are labeled stable.
    pub trend_stability_band_pct: f64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl ScanConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `STAKESCAN_NODE_URL` (default: http://127.0.0.1:27486)
    /// - `STAKESCAN_DB_PATH` (default: stakescan.db)
    /// - `SCAN_BATCH_SIZE` (default: 50)
    /// - `SCAN_MAX_CONCURRENT_REQUESTS` (default: 8)
    /// - `SCAN_PRIORITY_MAX_BLOCKS` (default: 5000)
    /// - `SCAN_ACTIVATION_HEIGHT` (default: 0)
    /// - `SCAN_COOLDOWN_BLOCKS` (default: 500)
    /// - gateway knobs: `GATEWAY_MIN_SPACING_MS`, `GATEWAY_RPS`,
    ///   `GATEWAY_RPM`, `GATEWAY_RPH`, `GATEWAY_BURST_LIMIT`,
    ///   `GATEWAY_CIRCUIT_FAILURES`, `GATEWAY_CIRCUIT_RECOVERY_MS`,
    ///   `GATEWAY_CIRCUIT_PROBES`, `GATEWAY_RETRY_INITIAL_MS`,
    ///   `GATEWAY_RETRY_MAX_MS`, `GATEWAY_MAX_RETRIES`
    /// - `SCAN_BLOCK_CACHE_CAPACITY` (default: 512)
    /// - `SCAN_MAX_RECORDED_ERRORS` (default: 100)
    /// - `TREND_STALENESS_HOURS` (default: 6)
    /// - `TREND_STABILITY_BAND_PCT` (default: 10.0)
    pub fn from_env() -> Self {
        Self {
            node_url: env::var("STAKESCAN_NODE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:27486".to_string()),
            db_path: env::var("STAKESCAN_DB_PATH").unwrap_or_else(|_| "stakescan.db".to_string()),
            batch_size: env_parse("SCAN_BATCH_SIZE", 50),
            max_concurrent_requests: env_parse("SCAN_MAX_CONCURRENT_REQUESTS", 8),
            priority_scan_max_blocks: env_parse("SCAN_PRIORITY_MAX_BLOCKS", 5_000),
            activation_height: env_parse("SCAN_ACTIVATION_HEIGHT", 0),
            cooldown_blocks: env_parse("SCAN_COOLDOWN_BLOCKS", 500),
            min_request_spacing_ms: env_parse("GATEWAY_MIN_SPACING_MS", 25),
            requests_per_second: env_parse("GATEWAY_RPS", 20),
            requests_per_minute: env_parse("GATEWAY_RPM", 600),
            requests_per_hour: env_parse("GATEWAY_RPH", 20_000),
            burst_limit: env_parse("GATEWAY_BURST_LIMIT", 10),
            circuit_failure_threshold: env_parse("GATEWAY_CIRCUIT_FAILURES", 5),
            circuit_recovery_timeout_ms: env_parse("GATEWAY_CIRCUIT_RECOVERY_MS", 30_000),
            circuit_probe_successes: env_parse("GATEWAY_CIRCUIT_PROBES", 2),
            retry_initial_delay_ms: env_parse("GATEWAY_RETRY_INITIAL_MS", 250),
            retry_max_delay_ms: env_parse("GATEWAY_RETRY_MAX_MS", 10_000),
            max_retries: env_parse("GATEWAY_MAX_RETRIES", 3),
            block_cache_capacity: env_parse("SCAN_BLOCK_CACHE_CAPACITY", 512),
            max_recorded_errors: env_parse("SCAN_MAX_RECORDED_ERRORS", 100),
            trend_staleness_hours: env_parse("TREND_STALENESS_HOURS", 6),
            trend_stability_band_pct: env_parse("TREND_STABILITY_BAND_PCT", 10.0),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        // Defaults only; does not consult the environment.
        Self {
            node_url: "http://127.0.0.1:27486".to_string(),
            db_path: "stakescan.db".to_string(),
            batch_size: 50,
            max_concurrent_requests: 8,
            priority_scan_max_blocks: 5_000,
            activation_height: 0,
            cooldown_blocks: 500,
            min_request_spacing_ms: 25,
            requests_per_second: 20,
            requests_per_minute: 600,
            requests_per_hour: 20_000,
            burst_limit: 10,
            circuit_failure_threshold: 5,
            circuit_recovery_timeout_ms: 30_000,
            circuit_probe_successes: 2,
            retry_initial_delay_ms: 250,
            retry_max_delay_ms: 10_000,
            max_retries: 3,
            block_cache_capacity: 512,
            max_recorded_errors: 100,
            trend_staleness_hours: 6,
            trend_stability_band_pct: 10.0,
        }
    }
}
