//! Protocol packet structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{TCP_MAGIC_1, TCP_MAGIC_2},
    error::{Error, Result},
};

/// Protocol packet
///
/// # Packet Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │   Command   │  Checksum   │  SessionID  │  ReplyID    │   Payload   │
/// │   2 bytes   │   2 bytes   │   2 bytes   │   2 bytes   │   N bytes   │
/// │ (LE u16)    │  (LE u16)   │  (LE u16)   │  (LE u16)   │   (bytes)   │
/// └─────────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// All multi-byte values are in little-endian format. On TCP the frame is
/// wrapped in an 8-byte envelope (see [`tcp_top`]).
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command code
    pub command: Command,

    /// Session identifier (assigned by device on connect)
    pub session_id: u16,

    /// Reply number (increments per command in session)
    pub reply_id: u16,

    /// Packet payload (command-specific data)
    pub payload: Bytes,
}

impl Packet {
    /// Packet header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Create a new packet with empty payload
    pub fn new(command: Command, session_id: u16, reply_id: u16) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload: Bytes::new(),
        }
    }

    /// Create a packet with payload
    pub fn with_payload(
        command: Command,
        session_id: u16,
        reply_id: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload: payload.into(),
        }
    }

    /// Calculate the checksum for this packet
    pub fn checksum(&self) -> u16 {
        checksum::calculate(
            self.command.into(),
            self.session_id,
            self.reply_id,
            &self.payload,
        )
    }

    /// Encode packet to bytes
    pub fn encode(&self) -> BytesMut {
        let total_size = Self::HEADER_SIZE + self.payload.len();
        let mut buf = BytesMut::with_capacity(total_size);

        buf.put_u16_le(self.command.into());
        buf.put_u16_le(self.checksum());
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.reply_id);

        buf.put_slice(&self.payload);

        buf
    }

    /// Decode packet from bytes, verifying the checksum
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer is too short (< 8 bytes)
    /// - Checksum verification fails
    /// - Command code is unknown
    ///
    /// Device replies on TCP may carry bytes beyond the declared frame,
    /// which poisons a whole-buffer checksum; the request engine uses the
    /// lenient [`ReplyHeader::parse`] instead.
    pub fn decode(mut buf: BytesMut) -> Result<Self> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let command_raw = buf.get_u16_le();
        let checksum_received = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let reply_id = buf.get_u16_le();

        let command = Command::try_from(command_raw)?;
        let payload = buf.freeze();

        let packet = Self {
            command,
            session_id,
            reply_id,
            payload,
        };

        let checksum_calculated = packet.checksum();
        if checksum_calculated != checksum_received {
            return Err(Error::ChecksumMismatch {
                expected: checksum_calculated,
                received: checksum_received,
            });
        }

        Ok(packet)
    }

    /// Get total packet size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("command", &self.command)
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("reply_id", &format!("0x{:04X}", self.reply_id))
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[{}](session={}, reply={}, len={})",
            self.command,
            self.session_id,
            self.reply_id,
            self.payload.len()
        )
    }
}

/// Leniently parsed reply header
///
/// The device echoes the 8-byte header on every reply; the command field
/// may be a code outside [`Command`] (legacy success code 2007 among
/// them), so the raw `u16` is kept. The checksum is not verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub code: u16,
    pub checksum: u16,
    pub session_id: u16,
    pub reply_id: u16,
}

impl ReplyHeader {
    /// Parse the first 8 bytes of a reply
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Packet::HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: Packet::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        Ok(Self {
            code: u16::from_le_bytes([buf[0], buf[1]]),
            checksum: u16::from_le_bytes([buf[2], buf[3]]),
            session_id: u16::from_le_bytes([buf[4], buf[5]]),
            reply_id: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }

    /// Check for a plain success code (CMD_ACK_OK / CMD_ACK_DATA / 2007)
    pub fn is_success(&self) -> bool {
        self.code == Command::AckOk as u16
            || self.code == Command::AckData as u16
            || self.code == crate::constants::ACK_OK_LEGACY
    }
}

/// Wrap a frame in the TCP envelope: `magic1 | magic2 | length(u32)`
pub fn tcp_top(frame: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(8 + frame.len());
    buf.put_u16_le(TCP_MAGIC_1);
    buf.put_u16_le(TCP_MAGIC_2);
    buf.put_u32_le(frame.len() as u32);
    buf.put_slice(frame);
    buf
}

/// Check a buffer for the TCP envelope
///
/// Returns the declared inner frame length, or 0 when the buffer is too
/// short or the magic words do not match. A 0 return is the caller's
/// signal that the frame is malformed or truncated.
pub fn test_tcp_top(buf: &[u8]) -> u32 {
    if buf.len() <= 8 {
        return 0;
    }

    let magic1 = u16::from_le_bytes([buf[0], buf[1]]);
    let magic2 = u16::from_le_bytes([buf[2], buf[3]]);

    if magic1 == TCP_MAGIC_1 && magic2 == TCP_MAGIC_2 {
        u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]])
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_packet_new() {
        let packet = Packet::new(Command::Connect, 0, 0);
        assert_eq!(packet.command, Command::Connect);
        assert_eq!(packet.session_id, 0);
        assert_eq!(packet.reply_id, 0);
        assert_eq!(packet.payload.len(), 0);
    }

    #[test]
    fn test_packet_encode_decode() {
        let original = Packet::with_payload(Command::Connect, 0, 0, vec![1, 2, 3, 4]);

        let encoded = original.encode();
        let decoded = Packet::decode(encoded).unwrap();

        assert_eq!(original.command, decoded.command);
        assert_eq!(original.session_id, decoded.session_id);
        assert_eq!(original.reply_id, decoded.reply_id);
        assert_eq!(original.payload, decoded.payload);
    }

    #[test]
    fn test_packet_checksum_field() {
        // Connect frame with no payload carries checksum 0xFC17
        let packet = Packet::new(Command::Connect, 0, 0);
        let encoded = packet.encode();

        assert_eq!(&encoded[..], &[0xE8, 0x03, 0x17, 0xFC, 0, 0, 0, 0]);
    }

    #[test]
    fn test_packet_checksum_verification() {
        let packet = Packet::new(Command::Connect, 0, 65534);
        let mut encoded = packet.encode();

        // Corrupt checksum (bytes 2-3)
        encoded[2] ^= 0xFF;
        encoded[3] ^= 0xFF;

        let result = Packet::decode(encoded);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_packet_too_short() {
        let buf = BytesMut::from(&[1, 2, 3][..]);
        let result = Packet::decode(buf);

        assert!(matches!(result, Err(Error::PacketTooShort { .. })));
    }

    #[test]
    fn test_reply_header_parses_unknown_codes() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2007u16.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&0x1234u16.to_le_bytes());
        buf.extend_from_slice(&7u16.to_le_bytes());

        let header = ReplyHeader::parse(&buf).unwrap();
        assert_eq!(header.code, 2007);
        assert_eq!(header.session_id, 0x1234);
        assert_eq!(header.reply_id, 7);
        assert!(header.is_success());
    }

    #[test]
    fn test_reply_header_success_codes() {
        let mk = |code: u16| {
            let mut buf = vec![0u8; 8];
            buf[..2].copy_from_slice(&code.to_le_bytes());
            ReplyHeader::parse(&buf).unwrap()
        };

        assert!(mk(2000).is_success());
        assert!(mk(2002).is_success());
        assert!(mk(2007).is_success());
        assert!(!mk(2001).is_success());
        assert!(!mk(2005).is_success());
    }

    #[test]
    fn test_tcp_top_round_trip() {
        let frame = Packet::new(Command::Connect, 0, 0).encode();
        let wrapped = tcp_top(&frame);

        assert_eq!(wrapped.len(), frame.len() + 8);
        assert_eq!(test_tcp_top(&wrapped), frame.len() as u32);
        assert_eq!(&wrapped[8..], &frame[..]);
    }

    #[test]
    fn test_tcp_top_rejects_bad_magic() {
        assert_eq!(test_tcp_top(&[0u8; 16]), 0);
        assert_eq!(test_tcp_top(&[0x50, 0x50, 0x00, 0x00, 8, 0, 0, 0, 1]), 0);
        // Too short to carry an inner frame
        assert_eq!(test_tcp_top(&[0x50, 0x50, 0x74, 0x82, 8, 0, 0, 0]), 0);
    }
}
