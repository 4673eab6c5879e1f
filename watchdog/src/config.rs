//! Runtime configuration and its defaults

use rcon::Timeouts;
use std::path::PathBuf;
use std::time::Duration;

/// Wait after a successful poll before the next one.
pub const DEFAULT_SUCCESS_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Wait after a failed poll before retrying.
pub const DEFAULT_FAILURE_INTERVAL: Duration = Duration::from_secs(10);
/// Bound on how long a client may take to send its request headers.
pub const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Settings for the roster poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// RCON server address, `host:port`
    pub address: String,
    pub password: String,
    pub timeouts: Timeouts,
    pub success_interval: Duration,
    pub failure_interval: Duration,
}

impl PollerConfig {
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            timeouts: Timeouts::default(),
            success_interval: DEFAULT_SUCCESS_INTERVAL,
            failure_interval: DEFAULT_FAILURE_INTERVAL,
        }
    }
}

/// Everything the `watchdog` subcommand needs to run
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Address the HTTP status server binds to
    pub listen_addr: String,
    /// File served by `GET /log`, if any
    pub log_path: Option<PathBuf>,
    pub header_read_timeout: Duration,
    pub poller: PollerConfig,
}

impl WatchdogConfig {
    pub fn new(listen_addr: impl Into<String>, poller: PollerConfig) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            log_path: None,
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
            poller,
        }
    }
}
