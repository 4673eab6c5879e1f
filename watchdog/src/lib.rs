//! # Game Server Watchdog
//!
//! Keeps an eye on a game server through its RCON console and publishes a
//! small JSON health summary over HTTP for supervisors and dashboards.
//!
//! ## Architecture
//!
//! Two long-lived tasks run side by side and never talk to each other
//! directly:
//!
//! - **Roster poller** (`poller`): dials a fresh RCON session each cycle,
//!   runs `listplayers`, and records either the player count or the failure.
//!   Success waits five minutes, failure retries after ten seconds.
//! - **HTTP server** (`http`): answers `GET /` from the cached status and
//!   optionally streams a log file on `GET /log`. Handlers never reach out
//!   to the game server, so a hung server cannot stall a health check.
//!
//! The only thing they share is the [`status::StatusStore`], a reader/writer
//! locked cell holding exactly one current [`status::Status`].
//!
//! ```text
//! poller ──RCON──▶ game server
//!    │
//!    └─write─▶ StatusStore ◀─read── HTTP handlers ──▶ clients
//! ```
//!
//! ## Module Organization
//!
//! - `config`: defaults and settings structs for the poller and server
//! - `roster`: turns `listplayers` output into a list of players
//! - `status`: the status value, its JSON projection and the store
//! - `poller`: the background polling task
//! - `http`: router, handlers and the connection loop
//! - `probe`: one-shot check that a local port is listening
//! - `error`: top-level error type used by the binary
//!
//! ## Shutdown
//!
//! Both tasks take a `tokio::sync::watch::Receiver<bool>`. Sending `true`
//! (or dropping the sender) stops the poller mid-cycle and makes the HTTP
//! server stop accepting connections.

pub mod config;
pub mod error;
pub mod http;
pub mod poller;
pub mod probe;
pub mod roster;
pub mod status;

use tokio::sync::watch;

/// Resolves once shutdown has been requested or the sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
