//! Authenticated RCON sessions with strict request/response correlation

use crate::{
    Packet, RconError, AUTH_FAILED_ID, MAX_RESPONSE_LEN, SERVERDATA_AUTH,
    SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};
use log::{debug, warn};
use rand::Rng;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Upper bounds for each blocking step of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Establishing the TCP connection
    pub dial: Duration,
    /// Writing one request
    pub write: Duration,
    /// Waiting for one response packet
    pub read: Duration,
    /// Whole command exchange, from the first write to the end marker
    pub command: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dial: Duration::from_secs(10),
            write: Duration::from_secs(10),
            read: Duration::from_secs(30),
            command: Duration::from_secs(60),
        }
    }
}

/// An open, authenticated connection to an RCON server
///
/// The session is owned by whoever is issuing commands and is never shared.
/// Each [`execute`](Session::execute) call completes its exchange before the
/// next may begin, so there is never more than one outstanding request.
#[derive(Debug)]
pub struct Session<S = TcpStream> {
    stream: S,
    next_id: i32,
    timeouts: Timeouts,
    desynchronized: bool,
}

impl Session<TcpStream> {
    /// Connects to `addr` and performs the password handshake.
    pub async fn dial(addr: &str, password: &str, timeouts: Timeouts) -> Result<Self, RconError> {
        let stream = match timeout(timeouts.dial, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(RconError::Connection {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(RconError::Connection {
                    addr: addr.to_string(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("dial timed out after {:?}", timeouts.dial),
                    ),
                })
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle on RCON socket: {}", e);
        }
        debug!("Connected to RCON server at {}", addr);

        let first_id = rand::thread_rng().gen_range(1..=i32::MAX / 2);
        Session::authenticate(stream, password, first_id, timeouts).await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs the auth handshake over an already-connected stream.
    ///
    /// `first_id` seeds the correlation counter; ids stay positive because
    /// `-1` is how the server signals a rejected password.
    pub async fn authenticate(
        stream: S,
        password: &str,
        first_id: i32,
        timeouts: Timeouts,
    ) -> Result<Self, RconError> {
        let mut session = Session {
            stream,
            next_id: first_id.max(1),
            timeouts,
            desynchronized: false,
        };

        let auth_id = session.allocate_id();
        let frame = Packet::new(auth_id, SERVERDATA_AUTH, password).encode()?;
        session.send(&frame).await?;

        let mut reply = session.receive().await?;
        if reply.kind != SERVERDATA_AUTH_RESPONSE {
            // Many servers emit an empty RESPONSE_VALUE ahead of the auth reply
            reply = session.receive().await?;
        }

        if reply.kind != SERVERDATA_AUTH_RESPONSE {
            return Err(RconError::Authentication(format!(
                "expected auth response, got packet type {}",
                reply.kind
            )));
        }
        if reply.id == AUTH_FAILED_ID {
            return Err(RconError::Authentication("password rejected".to_string()));
        }
        if reply.id != auth_id {
            return Err(RconError::ProtocolSequence {
                expected: auth_id,
                received: reply.id,
            });
        }

        debug!("RCON session authenticated");
        Ok(session)
    }

    /// Sends `command` and returns its complete output.
    ///
    /// An empty RESPONSE_VALUE with a fresh id follows the command. Servers
    /// answer in order, so its echo marks the end of a response that may
    /// have been split across several packets. The exchange as a whole is
    /// bounded by [`Timeouts::command`] and the output by
    /// [`MAX_RESPONSE_LEN`](crate::MAX_RESPONSE_LEN). Any failure after the
    /// request hits the wire leaves the session unusable.
    pub async fn execute(&mut self, command: &str) -> Result<String, RconError> {
        if self.desynchronized {
            return Err(RconError::Desynchronized);
        }

        let request_id = self.allocate_id();
        let marker_id = self.allocate_id();

        let mut frames = Packet::new(request_id, SERVERDATA_EXECCOMMAND, command).encode()?;
        frames.extend(Packet::new(marker_id, SERVERDATA_RESPONSE_VALUE, "").encode()?);

        let limit = self.timeouts.command;
        let result = match timeout(limit, self.exchange(&frames, request_id, marker_id)).await {
            Ok(result) => result,
            Err(_) => Err(RconError::timed_out("command", limit)),
        };
        if result.is_err() {
            self.desynchronized = true;
        }
        result
    }

    async fn exchange(
        &mut self,
        frames: &[u8],
        request_id: i32,
        marker_id: i32,
    ) -> Result<String, RconError> {
        self.send(frames).await?;

        let mut output = String::new();
        let mut packets = 0usize;
        loop {
            let packet = self.receive().await?;
            if packet.id == marker_id {
                break;
            }
            if packet.id != request_id {
                return Err(RconError::ProtocolSequence {
                    expected: request_id,
                    received: packet.id,
                });
            }
            if packet.kind != SERVERDATA_RESPONSE_VALUE {
                return Err(RconError::Encoding(format!(
                    "unexpected packet type {} in command response",
                    packet.kind
                )));
            }
            output.push_str(&packet.body);
            packets += 1;
            if output.len() > MAX_RESPONSE_LEN {
                return Err(RconError::Encoding(format!(
                    "command response exceeds {} bytes after {} packet(s)",
                    MAX_RESPONSE_LEN, packets
                )));
            }
        }

        debug!(
            "RCON command {} answered with {} packet(s), {} bytes",
            request_id,
            packets,
            output.len()
        );
        Ok(output)
    }

    /// Releases the transport. Safe to call after any earlier error.
    pub async fn close(mut self) -> Result<(), RconError> {
        match timeout(self.timeouts.write, self.stream.shutdown()).await {
            Ok(result) => result.map_err(RconError::from),
            Err(_) => Err(RconError::timed_out("shutdown", self.timeouts.write)),
        }
    }

    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), RconError> {
        let limit = self.timeouts.write;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(frame).await?;
            stream.flush().await
        };
        match timeout(limit, write).await {
            Ok(result) => result.map_err(RconError::from),
            Err(_) => Err(RconError::timed_out("write", limit)),
        }
    }

    async fn receive(&mut self) -> Result<Packet, RconError> {
        match timeout(self.timeouts.read, Packet::read_from(&mut self.stream)).await {
            Ok(result) => result,
            Err(_) => Err(RconError::timed_out("read", self.timeouts.read)),
        }
    }
}
