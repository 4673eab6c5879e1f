use std::io;
use thiserror::Error;

/// Failures surfaced by the RCON client.
///
/// Callers branch on the variant; none of them are recovered inside the
/// session itself.
#[derive(Debug, Error)]
pub enum RconError {
    /// The transport connection could not be established.
    #[error("could not connect to RCON server {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The server refused the password or answered the handshake oddly.
    #[error("RCON authentication failed: {0}")]
    Authentication(String),

    /// A read or write on an established session failed.
    #[error("RCON I/O error: {0}")]
    Io(#[from] io::Error),

    /// A packet could not be framed or did not follow the framing rules.
    #[error("malformed RCON packet: {0}")]
    Encoding(String),

    /// The server answered with an id other than the one expected.
    #[error("RCON response id {received} does not match request id {expected}")]
    ProtocolSequence { expected: i32, received: i32 },

    /// The session previously desynchronized and must be discarded.
    #[error("RCON session is desynchronized and cannot be reused")]
    Desynchronized,
}

impl RconError {
    pub(crate) fn timed_out(operation: &str, after: std::time::Duration) -> Self {
        RconError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} timed out after {:?}", operation, after),
        ))
    }

    /// True for errors after which the session can no longer be trusted.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            RconError::ProtocolSequence { .. } | RconError::Desynchronized
        )
    }
}
