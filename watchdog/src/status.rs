//! The single latest server status, shared between the poller and HTTP handlers

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Message held by the store until the first poll completes.
pub const INITIAL_STATUS_MESSAGE: &str = "waiting for first poll";

/// Outcome of the most recent poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running { player_count: usize },
    Error { message: String },
}

impl Status {
    /// Value reported before any poll has finished.
    ///
    /// It is an error on purpose: until the server has answered once, nothing
    /// is known about it, and "online with 0 players" would be a claim.
    pub fn initial() -> Self {
        Status::Error {
            message: INITIAL_STATUS_MESSAGE.to_string(),
        }
    }

    /// JSON projection served over HTTP
    pub fn report(&self) -> StatusReport {
        match self {
            Status::Running { player_count } => StatusReport {
                kind: ReportKind::Running,
                result: format!("online: {} player(s)", player_count),
            },
            Status::Error { message } => StatusReport {
                kind: ReportKind::Error,
                result: message.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Running,
    Error,
}

/// Body of `GET /`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub result: String,
}

/// Concurrency-safe cell holding the current [`Status`]
///
/// Clones share the same cell. The write lock is held only while the value
/// is swapped, never across I/O, so readers are delayed by at most a move.
#[derive(Debug, Clone)]
pub struct StatusStore {
    current: Arc<RwLock<Status>>,
}

impl StatusStore {
    /// Creates a store holding [`Status::initial`]
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(Status::initial())),
        }
    }

    /// Replaces the current status as a whole
    ///
    /// The write guard is held only for the swap. The previous status, and
    /// the message string it may own, is freed after the guard is released
    /// so readers never wait on a deallocation.
    pub async fn write(&self, status: Status) {
        let previous = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, status)
        };
        drop(previous);
    }

    /// Returns a copy of the current status
    pub async fn read(&self) -> Status {
        self.current.read().await.clone()
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_report() {
        let report = Status::Running { player_count: 2 }.report();
        assert_eq!(report.kind, ReportKind::Running);
        assert_eq!(report.result, "online: 2 player(s)");

        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"type":"running","result":"online: 2 player(s)"}"#);
    }

    #[test]
    fn test_error_report() {
        let report = Status::Error {
            message: "connection refused".to_string(),
        }
        .report();

        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"type":"error","result":"connection refused"}"#);
    }

    #[tokio::test]
    async fn test_initial_status_is_explicit_error() {
        let store = StatusStore::new();
        assert_eq!(
            store.read().await,
            Status::Error {
                message: INITIAL_STATUS_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = StatusStore::new();

        store
            .write(Status::Error {
                message: "boom".to_string(),
            })
            .await;
        assert_eq!(
            store.read().await,
            Status::Error {
                message: "boom".to_string()
            }
        );

        store.write(Status::Running { player_count: 4 }).await;
        assert_eq!(store.read().await, Status::Running { player_count: 4 });
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = StatusStore::new();
        let reader = store.clone();

        store.write(Status::Running { player_count: 1 }).await;
        assert_eq!(reader.read().await, Status::Running { player_count: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_never_see_mixed_values() {
        let store = StatusStore::new();

        // Even counts are always Running, odd ones always Error with that number
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for n in 0..2000usize {
                    let status = if n % 2 == 0 {
                        Status::Running { player_count: n }
                    } else {
                        Status::Error {
                            message: format!("failure {}", n),
                        }
                    };
                    store.write(status).await;
                    if n % 100 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..2000 {
                    match store.read().await {
                        Status::Running { player_count } => assert_eq!(player_count % 2, 0),
                        Status::Error { message } if message == INITIAL_STATUS_MESSAGE => {}
                        Status::Error { message } => {
                            let n: usize = message
                                .strip_prefix("failure ")
                                .and_then(|n| n.parse().ok())
                                .expect("well-formed error message");
                            assert_eq!(n % 2, 1);
                        }
                    }
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(
            store.read().await,
            Status::Error {
                message: "failure 1999".to_string()
            }
        );
    }
}
