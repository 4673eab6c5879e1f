//! Packet framing for the RCON wire protocol

use crate::{RconError, MAX_PACKET_SIZE, MAX_REQUEST_BODY, MIN_PACKET_SIZE};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes taken by the size, id and type fields.
pub const HEADER_LEN: usize = 12;

/// Fixed-width packet header, laid out exactly as on the wire.
///
/// bincode's legacy configuration writes each `i32` as four little-endian
/// bytes with no length prefixes, which matches the protocol.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    size: i32,
    id: i32,
    kind: i32,
}

/// A single RCON packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Serializes the packet into a complete frame ready for the socket.
    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let body = self.body.as_bytes();
        if body.len() > MAX_REQUEST_BODY {
            return Err(RconError::Encoding(format!(
                "body of {} bytes exceeds the {} byte limit",
                body.len(),
                MAX_REQUEST_BODY
            )));
        }
        if body.contains(&0) {
            return Err(RconError::Encoding("body contains a NUL byte".to_string()));
        }

        // Bounded by MAX_REQUEST_BODY above
        let size = (body.len() + 10) as i32;
        let header = Header {
            size,
            id: self.id,
            kind: self.kind,
        };

        let mut frame =
            bincode::serialize(&header).map_err(|e| RconError::Encoding(e.to_string()))?;
        frame.reserve(body.len() + 2);
        frame.extend_from_slice(body);
        frame.extend_from_slice(&[0, 0]);
        Ok(frame)
    }

    /// Parses one complete frame, size field included.
    pub fn decode(frame: &[u8]) -> Result<Packet, RconError> {
        if frame.len() < HEADER_LEN + 2 {
            return Err(RconError::Encoding(format!(
                "frame of {} bytes is shorter than the minimum packet",
                frame.len()
            )));
        }

        let header: Header = bincode::deserialize(&frame[..HEADER_LEN])
            .map_err(|e| RconError::Encoding(e.to_string()))?;

        let carried = frame.len() - 4;
        if header.size < 0 || header.size as usize != carried {
            return Err(RconError::Encoding(format!(
                "size field says {} bytes but frame carries {}",
                header.size, carried
            )));
        }

        match &frame[HEADER_LEN..] {
            [content @ .., 0, 0] => Ok(Packet {
                id: header.id,
                kind: header.kind,
                body: String::from_utf8_lossy(content).into_owned(),
            }),
            _ => Err(RconError::Encoding(
                "packet body is missing its NUL terminators".to_string(),
            )),
        }
    }

    /// Reads exactly one packet from the stream.
    pub async fn read_from<R>(reader: &mut R) -> Result<Packet, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let mut size_bytes = [0u8; 4];
        reader.read_exact(&mut size_bytes).await?;

        let size = i32::from_le_bytes(size_bytes);
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::Encoding(format!(
                "packet size {} outside {}..={}",
                size, MIN_PACKET_SIZE, MAX_PACKET_SIZE
            )));
        }

        let mut frame = vec![0u8; 4 + size as usize];
        frame[..4].copy_from_slice(&size_bytes);
        reader.read_exact(&mut frame[4..]).await?;

        Self::decode(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SERVERDATA_AUTH, SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE};
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_layout() {
        let frame = Packet::new(7, SERVERDATA_AUTH, "pw").encode().unwrap();

        assert_eq!(
            frame,
            vec![
                12, 0, 0, 0, // size
                7, 0, 0, 0, // id
                3, 0, 0, 0, // type
                b'p', b'w', 0, 0,
            ]
        );
    }

    #[test]
    fn test_encode_negative_id_is_little_endian() {
        let frame = Packet::new(-1, SERVERDATA_RESPONSE_VALUE, "").encode().unwrap();
        assert_eq!(&frame[4..8], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(frame.len(), 14);
    }

    #[test]
    fn test_encode_rejects_long_body() {
        let body = "x".repeat(MAX_REQUEST_BODY + 1);
        let result = Packet::new(1, SERVERDATA_EXECCOMMAND, body).encode();
        assert!(matches!(result, Err(RconError::Encoding(_))));

        let body = "x".repeat(MAX_REQUEST_BODY);
        assert!(Packet::new(1, SERVERDATA_EXECCOMMAND, body).encode().is_ok());
    }

    #[test]
    fn test_encode_rejects_interior_nul() {
        let result = Packet::new(1, SERVERDATA_EXECCOMMAND, "say\0hi").encode();
        assert!(matches!(result, Err(RconError::Encoding(_))));
    }

    #[test]
    fn test_decode_missing_terminators() {
        let mut frame = Packet::new(5, SERVERDATA_RESPONSE_VALUE, "abc").encode().unwrap();
        let last = frame.len() - 1;
        frame[last] = b'!';

        let result = Packet::decode(&frame);
        assert!(matches!(result, Err(RconError::Encoding(_))));
    }

    #[test]
    fn test_decode_size_mismatch() {
        let mut frame = Packet::new(5, SERVERDATA_RESPONSE_VALUE, "abc").encode().unwrap();
        frame.push(0);

        let result = Packet::decode(&frame);
        assert!(matches!(result, Err(RconError::Encoding(_))));
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let mut frame = vec![12, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0];
        frame.extend_from_slice(&[b'a', 0xff, 0, 0]);

        let packet = Packet::decode(&frame).unwrap();
        assert_eq!(packet.body, "a\u{fffd}");
    }

    #[tokio::test]
    async fn test_read_from_stream() {
        let frame = Packet::new(42, SERVERDATA_RESPONSE_VALUE, "Alice\nBob\n")
            .encode()
            .unwrap();
        // Split the frame across reads like a real socket would
        let mut stream = Builder::new().read(&frame[..6]).read(&frame[6..]).build();

        let packet = Packet::read_from(&mut stream).await.unwrap();
        assert_eq!(packet.id, 42);
        assert_eq!(packet.kind, SERVERDATA_RESPONSE_VALUE);
        assert_eq!(packet.body, "Alice\nBob\n");
    }

    #[tokio::test]
    async fn test_read_from_rejects_oversized() {
        let size = (MAX_PACKET_SIZE + 1).to_le_bytes();
        let mut stream = Builder::new().read(&size).build();

        let result = Packet::read_from(&mut stream).await;
        assert!(matches!(result, Err(RconError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_read_from_rejects_undersized() {
        let size = 9i32.to_le_bytes();
        let mut stream = Builder::new().read(&size).build();

        let result = Packet::read_from(&mut stream).await;
        assert!(matches!(result, Err(RconError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_read_from_truncated_stream() {
        let frame = Packet::new(1, SERVERDATA_RESPONSE_VALUE, "abc").encode().unwrap();
        let mut stream = Builder::new().read(&frame[..8]).build();

        match Packet::read_from(&mut stream).await {
            Err(RconError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected unexpected EOF, got {:?}", other),
        }
    }
}
