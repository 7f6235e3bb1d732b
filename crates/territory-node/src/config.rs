//! Node configuration from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use territory_ledger::{LedgerConfig, DEFAULT_LOG_CAPACITY};
use territory_sync::SyncConfig;
use tracing::warn;

use crate::chunk::DEFAULT_CHUNK_PAYLOAD;

const DEFAULT_VIEWER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SOCKET_BUFFER: usize = 4 * 1024 * 1024; // 4MB

/// Configuration for a territory node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// UDP address viewers send `hello`/`bye` datagrams to.
    pub bind_addr: SocketAddr,

    /// Ledger settings (change log retention).
    pub ledger: LedgerConfig,

    /// Replication cadence and backoff.
    pub sync: SyncConfig,

    /// A viewer that has not said hello within this window stops receiving
    /// updates.
    pub viewer_timeout: Duration,

    /// Socket send buffer size in bytes
    pub sndbuf: usize,
    /// Socket receive buffer size in bytes
    pub rcvbuf: usize,

    /// Body bytes per chunk datagram
    pub chunk_payload: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9100)),
            ledger: LedgerConfig::default(),
            sync: SyncConfig::default(),
            viewer_timeout: DEFAULT_VIEWER_TIMEOUT,
            sndbuf: DEFAULT_SOCKET_BUFFER,
            rcvbuf: DEFAULT_SOCKET_BUFFER,
            chunk_payload: DEFAULT_CHUNK_PAYLOAD,
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    ///
    /// Unparseable values are logged and replaced by their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind_addr = parse_or(&lookup, "TERRITORY_BIND_ADDR", defaults.bind_addr);

        let tick_ms = parse_or(
            &lookup,
            "TERRITORY_TICK_MS",
            defaults.sync.tick_interval.as_millis() as u64,
        );
        let sync = defaults
            .sync
            .with_tick_interval(Duration::from_millis(tick_ms));

        let log_capacity = parse_or(&lookup, "TERRITORY_LOG_CAPACITY", DEFAULT_LOG_CAPACITY);
        let ledger = LedgerConfig::default().with_log_capacity(log_capacity);

        let viewer_timeout = Duration::from_secs(parse_or(
            &lookup,
            "TERRITORY_VIEWER_TIMEOUT_SECS",
            defaults.viewer_timeout.as_secs(),
        ));

        Self {
            bind_addr,
            ledger,
            sync,
            viewer_timeout,
            sndbuf: parse_or(&lookup, "TERRITORY_SNDBUF", defaults.sndbuf),
            rcvbuf: parse_or(&lookup, "TERRITORY_RCVBUF", defaults.rcvbuf),
            chunk_payload: parse_or(&lookup, "TERRITORY_CHUNK_BYTES", defaults.chunk_payload),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, %default, "invalid config value, using default");
            default
        }
    }
}
