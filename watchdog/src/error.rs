use crate::probe::ProbeError;
use rcon::RconError;
use std::io;
use thiserror::Error;

/// Errors that end a CLI subcommand
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error(transparent)]
    Rcon(#[from] RconError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(#[from] io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}
