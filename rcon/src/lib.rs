//! # RCON Protocol Library
//!
//! Client side of the Source-style remote console protocol used by game
//! servers for authenticated administrative commands.
//!
//! ## Wire Format
//!
//! Every packet is a length-prefixed frame of little-endian 32-bit integers
//! followed by a NUL-terminated body and one padding NUL:
//!
//! ```text
//! size:i32 | id:i32 | type:i32 | body bytes | 0x00 | 0x00
//! ```
//!
//! `size` counts everything after itself. The `id` is chosen by the client and
//! echoed by the server, which is how responses are correlated with requests.
//!
//! ## Sessions
//!
//! A [`Session`] owns one authenticated stream. Only one request is ever in
//! flight on it; a response carrying the wrong id leaves the session
//! desynchronized and it refuses further commands. Callers are expected to
//! dial a fresh session rather than repair a broken one.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rcon::{Session, Timeouts};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rcon::RconError> {
//!     let mut session = Session::dial("127.0.0.1:27020", "secret", Timeouts::default()).await?;
//!     let players = session.execute("listplayers").await;
//!     session.close().await?;
//!     println!("{}", players?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod packet;
pub mod session;

pub use error::RconError;
pub use packet::Packet;
pub use session::{Session, Timeouts};

/// Client request carrying the password.
pub const SERVERDATA_AUTH: i32 = 3;
/// Client request carrying a console command.
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
/// Server reply to [`SERVERDATA_AUTH`]. Shares its value with EXECCOMMAND.
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
/// Server reply carrying command output.
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server puts in an auth response when the password is wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// Largest body a request may carry.
pub const MAX_REQUEST_BODY: usize = 1014;
/// Largest `size` field accepted from the server.
pub const MAX_PACKET_SIZE: i32 = 4106;
/// Largest reassembled command output a session will buffer.
pub const MAX_RESPONSE_LEN: usize = 64 * 1024;
/// Smallest legal `size` field: id, type and the two terminating NULs.
pub const MIN_PACKET_SIZE: i32 = 10;
