//! Listen-state check against the kernel socket tables
//!
//! Reads `/proc/net/{tcp,udp}` (and their IPv6 twins when present) and looks
//! for a socket bound to the requested local port in the expected state.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// `TCP_LISTEN` in the kernel's state numbering
pub const TCP_LISTEN_STATE: u8 = 0x0A;
/// `TCP_CLOSE`, which is how an unconnected bound UDP socket is reported
pub const UDP_BOUND_STATE: u8 = 0x07;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("cannot open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse socket table line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("{protocol} port {port} is not listening")]
    NotListening { protocol: Protocol, port: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// State a socket must be in to count as listening
    pub fn listen_state(self) -> u8 {
        match self {
            Protocol::Tcp => TCP_LISTEN_STATE,
            Protocol::Udp => UDP_BOUND_STATE,
        }
    }

    /// Socket tables to scan, IPv4 first
    pub fn tables(self) -> [&'static str; 2] {
        match self {
            Protocol::Tcp => ["/proc/net/tcp", "/proc/net/tcp6"],
            Protocol::Udp => ["/proc/net/udp", "/proc/net/udp6"],
        }
    }
}

impl FromStr for Protocol {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(ProbeError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// One row of a socket table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketEntry {
    pub local_port: u16,
    pub state: u8,
}

/// Parses the text of a `/proc/net/*` socket table.
///
/// The first line is a column header and is skipped.
pub fn parse_socket_table(text: &str) -> Result<Vec<SocketEntry>, ProbeError> {
    let mut entries = Vec::new();

    for (index, row) in text.lines().enumerate().skip(1) {
        if row.trim().is_empty() {
            continue;
        }
        let line = index + 1;
        let columns: Vec<&str> = row.split_whitespace().collect();
        if columns.len() < 4 {
            return Err(ProbeError::Parse {
                line,
                reason: format!("expected at least 4 columns, found {}", columns.len()),
            });
        }

        let local_port = columns[1]
            .rsplit_once(':')
            .and_then(|(_, port)| u16::from_str_radix(port, 16).ok())
            .ok_or_else(|| ProbeError::Parse {
                line,
                reason: format!("bad local address {:?}", columns[1]),
            })?;

        let state = u8::from_str_radix(columns[3], 16).map_err(|_| ProbeError::Parse {
            line,
            reason: format!("bad state {:?}", columns[3]),
        })?;

        entries.push(SocketEntry { local_port, state });
    }

    Ok(entries)
}

/// True when some entry has `port` bound in `state`
pub fn has_state(entries: &[SocketEntry], state: u8, port: u16) -> bool {
    entries
        .iter()
        .any(|entry| entry.state == state && entry.local_port == port)
}

fn read_table(path: &str, required: bool) -> Result<Option<String>, ProbeError> {
    match std::fs::read_to_string(Path::new(path)) {
        Ok(text) => Ok(Some(text)),
        Err(e) if !required && e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ProbeError::Io {
            path: path.to_string(),
            source,
        }),
    }
}

/// Scans the kernel tables for `port` in the protocol's listening state.
///
/// The IPv4 table must exist; the IPv6 one is skipped on kernels without it.
pub fn is_listening(protocol: Protocol, port: u16) -> Result<bool, ProbeError> {
    let [primary, secondary] = protocol.tables();

    for (path, required) in [(primary, true), (secondary, false)] {
        if let Some(text) = read_table(path, required)? {
            let entries = parse_socket_table(&text)?;
            if has_state(&entries, protocol.listen_state(), port) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Like [`is_listening`] but turns a negative answer into an error
pub fn check_listening(protocol: Protocol, port: u16) -> Result<(), ProbeError> {
    if is_listening(protocol, port)? {
        Ok(())
    } else {
        Err(ProbeError::NotListening { protocol, port })
    }
}
