//! Background task that keeps the status store in step with the game server
//!
//! Every cycle dials a brand-new RCON session, asks for the player list and
//! closes the session again. Sessions are never carried over between cycles,
//! so a connection that went bad in one cycle cannot poison the next.
//!
//! Scheduling is deliberately flat: a successful cycle waits the long
//! interval, any failure waits the short one. There is no escalation and no
//! retry budget; the task runs until it is told to stop.

use crate::config::PollerConfig;
use crate::roster::{parse_roster, LIST_PLAYERS_COMMAND};
use crate::status::{Status, StatusStore};
use crate::wait_for_shutdown;
use log::{debug, info, warn};
use rcon::{RconError, Session};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Periodically polls the RCON server and publishes the result
pub struct Poller {
    config: PollerConfig,
    store: StatusStore,
}

impl Poller {
    pub fn new(config: PollerConfig, store: StatusStore) -> Self {
        Self { config, store }
    }

    /// Runs one dial/list/close exchange and returns the roster.
    ///
    /// The session is closed whenever the dial succeeded, whatever happened
    /// to the command.
    pub async fn poll_once(&self) -> Result<Vec<String>, RconError> {
        let mut session = Session::dial(
            &self.config.address,
            &self.config.password,
            self.config.timeouts,
        )
        .await?;

        let response = session.execute(LIST_PLAYERS_COMMAND).await;

        if let Err(e) = session.close().await {
            debug!("Error while closing RCON session: {}", e);
        }

        Ok(parse_roster(&response?))
    }

    /// Polls once, stores the outcome and returns it.
    pub async fn run_cycle(&self) -> Status {
        let status = match self.poll_once().await {
            Ok(roster) => Status::Running {
                player_count: roster.len(),
            },
            Err(e) => Status::Error {
                message: e.to_string(),
            },
        };

        self.store.write(status.clone()).await;
        status
    }

    /// How long to wait after a cycle that produced `status`
    pub fn interval_after(&self, status: &Status) -> Duration {
        match status {
            Status::Running { .. } => self.config.success_interval,
            Status::Error { .. } => self.config.failure_interval,
        }
    }

    /// Polls forever until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A shutdown request also abandons a cycle that is still in flight.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Roster poller started for {} (every {:?}, retry after {:?})",
            self.config.address, self.config.success_interval, self.config.failure_interval
        );

        let mut last_count: Option<usize> = None;

        loop {
            let status = tokio::select! {
                status = self.run_cycle() => status,
                _ = wait_for_shutdown(&mut shutdown) => break,
            };

            match &status {
                Status::Running { player_count } => {
                    if last_count != Some(*player_count) {
                        info!("Server online with {} player(s)", player_count);
                    }
                    last_count = Some(*player_count);
                }
                Status::Error { message } => {
                    warn!("Roster poll failed: {}", message);
                    last_count = None;
                }
            }

            let wait = self.interval_after(&status);
            debug!("Next roster poll in {:?}", wait);

            tokio::select! {
                _ = sleep(wait) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("Roster poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon::Timeouts;

    fn unreachable_config() -> PollerConfig {
        let mut config = PollerConfig::new("127.0.0.1:1", "pw");
        config.timeouts = Timeouts {
            dial: Duration::from_millis(200),
            write: Duration::from_millis(200),
            read: Duration::from_millis(200),
            command: Duration::from_millis(500),
        };
        config.success_interval = Duration::from_secs(300);
        config.failure_interval = Duration::from_millis(20);
        config
    }

    #[test]
    fn test_interval_selection() {
        let poller = Poller::new(unreachable_config(), StatusStore::new());

        assert_eq!(
            poller.interval_after(&Status::Running { player_count: 3 }),
            Duration::from_secs(300)
        );
        assert_eq!(
            poller.interval_after(&Status::Error {
                message: "x".to_string()
            }),
            Duration::from_millis(20)
        );
    }

    #[tokio::test]
    async fn test_failed_cycle_stores_error() {
        let store = StatusStore::new();
        let poller = Poller::new(unreachable_config(), store.clone());

        let status = poller.run_cycle().await;

        match &status {
            Status::Error { message } => assert!(message.contains("127.0.0.1:1")),
            other => panic!("expected error status, got {:?}", other),
        }
        assert_eq!(store.read().await, status);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = StatusStore::new();
        let poller = Poller::new(unreachable_config(), store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poller did not stop")
            .unwrap();

        assert!(matches!(store.read().await, Status::Error { .. }));
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let poller = Poller::new(unreachable_config(), StatusStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(2), poller.run(shutdown_rx))
            .await
            .expect("poller did not stop");
    }
}
