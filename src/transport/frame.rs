//! Frame encoding and decoding for Z/IP datagrams.
//!
//! Two frame shapes travel over a session:
//! - Z/IP Packet frames (`0x23 0x02` wrapper) carrying a sequence number,
//!   ACK/NAK flags, an optional header extension and an optional command.
//! - Raw frames (`[command class, command, payload...]`). The only raw frame
//!   accepted inbound is the ZipNd Node Advertisement.
//!
//! Decode failures are never reported to the peer; the session drops them.

use thiserror::Error;

use crate::core::commands::zip_nd;
use crate::core::{
    command_class, FLAG0_ACK_REQ, FLAG0_ACK_RES, FLAG0_NACK_QF, FLAG0_NACK_RES, FLAG0_WAIT_RES,
    FLAG1_HDR_EXT_INCL, FLAG1_MORE_INFORMATION, FLAG1_SECURE_ORIGIN, FLAG1_ZW_CMD_INCL,
    FRAME_MIN_SIZE, HEADER_EXTENSION_LENGTH, ZIP_COMMAND_CLASS, ZIP_HEADER_MIN_SIZE,
    ZIP_OPTION_MAINTENANCE_GET, ZIP_PACKET_COMMAND, ZIP_REQUEST_HEADER_SIZE,
};

/// First flag byte of a Z/IP Packet (ACK/NAK signalling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckFlags(u8);

impl AckFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Sender requests an ACK.
    pub const ACK_REQUEST: Self = Self(FLAG0_ACK_REQ);

    /// Create flags from a raw byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value.
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if the sender requests an ACK.
    pub fn ack_requested(self) -> bool {
        self.0 & FLAG0_ACK_REQ != 0
    }

    /// Check if this frame is an ACK.
    pub fn ack_response(self) -> bool {
        self.0 & FLAG0_ACK_RES != 0
    }

    /// Check if this frame is a NAK.
    pub fn nack_response(self) -> bool {
        self.0 & FLAG0_NACK_RES != 0
    }

    /// Check the NAK "still working" qualifier.
    pub fn nack_waiting(self) -> bool {
        self.0 & FLAG0_WAIT_RES != 0
    }

    /// Check the NAK "queue full" qualifier.
    pub fn nack_queue_full(self) -> bool {
        self.0 & FLAG0_NACK_QF != 0
    }
}

/// Second flag byte of a Z/IP Packet (content description).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentFlags(u8);

impl ContentFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Create flags from a raw byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value.
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if a header extension follows the endpoints.
    pub fn header_ext_included(self) -> bool {
        self.0 & FLAG1_HDR_EXT_INCL != 0
    }

    /// Check if a Z-Wave command follows the header.
    pub fn command_included(self) -> bool {
        self.0 & FLAG1_ZW_CMD_INCL != 0
    }

    /// Check if the gateway holds more information for us.
    pub fn more_information(self) -> bool {
        self.0 & FLAG1_MORE_INFORMATION != 0
    }

    /// Check if the command arrived over a secure channel.
    pub fn secure_origin(self) -> bool {
        self.0 & FLAG1_SECURE_ORIGIN != 0
    }

    /// Set the header extension flag.
    pub fn with_header_ext(self) -> Self {
        Self(self.0 | FLAG1_HDR_EXT_INCL)
    }

    /// Set the command included flag.
    pub fn with_command(self) -> Self {
        Self(self.0 | FLAG1_ZW_CMD_INCL)
    }

    /// Set the secure origin flag.
    pub fn with_secure_origin(self) -> Self {
        Self(self.0 | FLAG1_SECURE_ORIGIN)
    }
}

/// A decoded Z/IP Packet.
///
/// Wire format:
/// ```text
/// +------+------+--------+--------+-----+-----+-----+-----------+----+-----+---------+
/// | 0x23 | 0x02 | flags0 | flags1 | seq | src | dst | ext (opt) | cc | cmd | payload |
/// +------+------+--------+--------+-----+-----+-----+-----------+----+-----+---------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedFrame {
    /// ACK/NAK flags.
    pub ack_flags: AckFlags,
    /// Content flags.
    pub content_flags: ContentFlags,
    /// Sequence number.
    pub sequence_number: u8,
    /// Source endpoint.
    pub source_endpoint: u8,
    /// Destination endpoint.
    pub destination_endpoint: u8,
    /// Encapsulated command class, absent when the header leaves no room.
    pub command_class: Option<u8>,
    /// Encapsulated command, absent when the header leaves no room.
    pub command: Option<u8>,
    /// Command payload (empty without a command).
    pub payload: Vec<u8>,
}

impl WrappedFrame {
    /// Check if the sender requests an ACK.
    pub fn ack_requested(&self) -> bool {
        self.ack_flags.ack_requested()
    }

    /// Check if this frame is an ACK.
    pub fn ack_response(&self) -> bool {
        self.ack_flags.ack_response()
    }

    /// Check if this frame is a NAK.
    pub fn nack_response(&self) -> bool {
        self.ack_flags.nack_response()
    }

    /// Check the NAK waiting qualifier.
    pub fn nack_waiting(&self) -> bool {
        self.ack_flags.nack_waiting()
    }

    /// Check the NAK queue-full qualifier.
    pub fn nack_queue_full(&self) -> bool {
        self.ack_flags.nack_queue_full()
    }

    /// Check if a header extension was present.
    pub fn header_ext_included(&self) -> bool {
        self.content_flags.header_ext_included()
    }
}

/// A decoded raw (unwrapped) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Command class.
    pub command_class: u8,
    /// Command.
    pub command: u8,
    /// Command payload.
    pub payload: Vec<u8>,
}

/// A decoded inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Z/IP Packet.
    Wrapped(WrappedFrame),
    /// Raw command (neighbor discovery).
    Raw(RawFrame),
}

impl Frame {
    /// Get the carried `(command class, command)` pair, if any.
    pub fn command(&self) -> Option<(u8, u8)> {
        match self {
            Frame::Wrapped(f) => f.command_class.zip(f.command),
            Frame::Raw(f) => Some((f.command_class, f.command)),
        }
    }

    /// Get the command payload.
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Wrapped(f) => &f.payload,
            Frame::Raw(f) => &f.payload,
        }
    }

    /// Check if this is a Z/IP Packet.
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Frame::Wrapped(_))
    }
}

/// Errors that can occur during frame decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Datagram carried no bytes.
    #[error("empty datagram")]
    Empty,

    /// Datagram is shorter than its shape requires.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Leading pair is neither the Z/IP wrapper nor an accepted raw command.
    #[error("unrecognized command: class 0x{command_class:02x}, command 0x{command:02x}")]
    UnrecognizedCommand {
        /// Leading byte.
        command_class: u8,
        /// Second byte.
        command: u8,
    },
}

impl FrameError {
    /// Check if this error should result in a silent drop.
    ///
    /// Every decode failure is dropped without a reply; the gateway is never
    /// told that a datagram was unintelligible.
    pub fn is_silent_drop(&self) -> bool {
        true
    }
}

/// Encode a Z/IP Packet requesting an ACK.
///
/// The header carries `HDR_EXT_INCL | ZW_CMD_INCL | SECURE_ORIGIN` and a
/// maintenance-get header extension.
pub fn encode_zip_packet(
    sequence_number: u8,
    command_class: u8,
    command: u8,
    payload: &[u8],
) -> Vec<u8> {
    let content = ContentFlags::NONE
        .with_header_ext()
        .with_command()
        .with_secure_origin();

    let mut buf = Vec::with_capacity(ZIP_REQUEST_HEADER_SIZE + 2 + payload.len());
    buf.extend_from_slice(&[
        ZIP_COMMAND_CLASS,
        ZIP_PACKET_COMMAND,
        AckFlags::ACK_REQUEST.as_byte(),
        content.as_byte(),
        sequence_number,
        0,
        0,
        HEADER_EXTENSION_LENGTH,
        ZIP_OPTION_MAINTENANCE_GET,
        0,
        command_class,
        command,
    ]);
    buf.extend_from_slice(payload);
    buf
}

/// Encode a Z/IP Packet that asks for no ACK and has no header extension.
///
/// Used for discovery probes, where the reply itself is the only signal.
pub fn encode_unacknowledged(
    sequence_number: u8,
    command_class: u8,
    command: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ZIP_HEADER_MIN_SIZE + 2 + payload.len());
    buf.extend_from_slice(&[
        ZIP_COMMAND_CLASS,
        ZIP_PACKET_COMMAND,
        AckFlags::NONE.as_byte(),
        ContentFlags::NONE.with_command().as_byte(),
        sequence_number,
        0,
        0,
        command_class,
        command,
    ]);
    buf.extend_from_slice(payload);
    buf
}

/// Encode a raw frame: `[command class, command, payload...]`.
pub fn encode_raw(command_class: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + payload.len());
    buf.push(command_class);
    buf.push(command);
    buf.extend_from_slice(payload);
    buf
}

/// Check if a leading pair is a raw frame accepted inbound.
fn is_accepted_raw(command_class: u8, command: u8) -> bool {
    command_class == command_class::ZIP_ND && command == zip_nd::NODE_ADVERTISEMENT
}

/// Decode an inbound datagram.
pub fn decode(data: &[u8]) -> Result<Frame, FrameError> {
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    if data.len() < FRAME_MIN_SIZE {
        return Err(FrameError::TooShort {
            expected: FRAME_MIN_SIZE,
            actual: data.len(),
        });
    }

    let (first, second) = (data[0], data[1]);

    if first == ZIP_COMMAND_CLASS && second == ZIP_PACKET_COMMAND {
        return decode_wrapped(data).map(Frame::Wrapped);
    }

    if is_accepted_raw(first, second) {
        return Ok(Frame::Raw(RawFrame {
            command_class: first,
            command: second,
            payload: data[2..].to_vec(),
        }));
    }

    Err(FrameError::UnrecognizedCommand {
        command_class: first,
        command: second,
    })
}

fn decode_wrapped(data: &[u8]) -> Result<WrappedFrame, FrameError> {
    if data.len() < ZIP_HEADER_MIN_SIZE {
        return Err(FrameError::TooShort {
            expected: ZIP_HEADER_MIN_SIZE,
            actual: data.len(),
        });
    }

    let ack_flags = AckFlags::from_byte(data[2]);
    let content_flags = ContentFlags::from_byte(data[3]);

    // the extension is skipped as a whole; its length byte counts itself
    let ext_len = if content_flags.header_ext_included() {
        data.get(ZIP_HEADER_MIN_SIZE).copied().unwrap_or(0) as usize
    } else {
        0
    };
    let command_offset = ZIP_HEADER_MIN_SIZE + ext_len;

    let (command_class, command, payload) = if data.len() >= command_offset + 2 {
        (
            Some(data[command_offset]),
            Some(data[command_offset + 1]),
            data[command_offset + 2..].to_vec(),
        )
    } else {
        (None, None, Vec::new())
    };

    Ok(WrappedFrame {
        ack_flags,
        content_flags,
        sequence_number: data[4],
        source_endpoint: data[5],
        destination_endpoint: data[6],
        command_class,
        command,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::network_management_proxy;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_encode_zip_packet_layout() {
        let packet = encode_zip_packet(0x42, 0x25, 0x01, &[0xff]);
        assert_eq!(hex::encode(&packet), "230280d042000003020025 01ff".replace(' ', ""));
    }

    #[test]
    fn test_encode_raw() {
        assert_eq!(encode_raw(0x58, 0x04, &[0x00, 0x07]), vec![0x58, 0x04, 0x00, 0x07]);
        assert_eq!(encode_raw(0x58, 0x04, &[]), vec![0x58, 0x04]);
    }

    #[test]
    fn test_encode_discovery_probe() {
        let probe = encode_unacknowledged(
            0x11,
            command_class::NETWORK_MANAGEMENT_PROXY,
            network_management_proxy::NODE_INFO_CACHED_GET,
            &[0x11, 0xf0, 0x00],
        );
        assert_eq!(probe, unhex("230200401100005203 11f000".replace(' ', "").as_str()));
    }

    #[test]
    fn test_decode_recovers_encoded_request() {
        let payload = [0x01, 0x02, 0x03];
        let packet = encode_zip_packet(200, 0x52, 0x01, &payload);

        let Frame::Wrapped(frame) = decode(&packet).unwrap() else {
            panic!("expected wrapped frame");
        };
        assert_eq!(frame.sequence_number, 200);
        assert_eq!(frame.command_class, Some(0x52));
        assert_eq!(frame.command, Some(0x01));
        assert_eq!(frame.payload, payload);
        assert!(frame.ack_requested());
        assert!(frame.header_ext_included());
        assert!(frame.content_flags.secure_origin());
        assert!(!frame.ack_response());
    }

    #[test]
    fn test_decode_recovers_any_payload_length() {
        for seq in [0u8, 1, 127, 200, 255] {
            for len in 0..=255usize {
                let payload: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31) ^ seq).collect();
                let packet = encode_zip_packet(seq, 0x25, 0x03, &payload);

                let Frame::Wrapped(frame) = decode(&packet).unwrap() else {
                    panic!("expected wrapped frame for seq {seq} len {len}");
                };
                assert_eq!(frame.sequence_number, seq);
                assert_eq!(frame.command_class, Some(0x25), "seq {seq} len {len}");
                assert_eq!(frame.command, Some(0x03), "seq {seq} len {len}");
                assert_eq!(frame.payload, payload, "seq {seq} len {len}");
            }
        }
    }

    #[test]
    fn test_decode_ack_without_command() {
        // ACK for seq 0x10, no extension, no command
        let frame = decode(&unhex("23024000100000")).unwrap();
        let Frame::Wrapped(frame) = frame else {
            panic!("expected wrapped frame");
        };
        assert!(frame.ack_response());
        assert_eq!(frame.sequence_number, 0x10);
        assert_eq!(frame.command_class, None);
        assert_eq!(frame.command, None);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_decode_nak_qualifiers() {
        let Frame::Wrapped(waiting) = decode(&unhex("23023000050000")).unwrap() else {
            panic!("expected wrapped frame");
        };
        assert!(waiting.nack_response());
        assert!(waiting.nack_waiting());
        assert!(!waiting.nack_queue_full());

        let Frame::Wrapped(full) = decode(&unhex("23022800050000")).unwrap() else {
            panic!("expected wrapped frame");
        };
        assert!(full.nack_response());
        assert!(full.nack_queue_full());
        assert!(!full.nack_waiting());
    }

    #[test]
    fn test_decode_skips_header_extension() {
        // extension of length 5 (length byte + 4 option bytes) then a command
        let data = unhex("2302c0c0070000 05 01 02 aabb 52 02 07 00".replace(' ', "").as_str());
        let Frame::Wrapped(frame) = decode(&data).unwrap() else {
            panic!("expected wrapped frame");
        };
        assert_eq!(frame.command_class, Some(0x52));
        assert_eq!(frame.command, Some(0x02));
        assert_eq!(frame.payload, vec![0x07, 0x00]);
    }

    #[test]
    fn test_decode_extension_leaves_no_room_for_command() {
        // declared extension runs past the end of the datagram
        let data = unhex("2302c0800700000a0102");
        let Frame::Wrapped(frame) = decode(&data).unwrap() else {
            panic!("expected wrapped frame");
        };
        assert_eq!(frame.command_class, None);
        assert!(frame.payload.is_empty());

        // flag set but the length byte itself is missing
        let Frame::Wrapped(frame) = decode(&unhex("23020080070000")).unwrap() else {
            panic!("expected wrapped frame");
        };
        assert_eq!(frame.command, None);
    }

    #[test]
    fn test_decode_node_advertisement() {
        let data = unhex(concat!(
            "58010007",
            "00000000000000000000ffff",
            "c0a80107",
            "deadbeef"
        ));
        let frame = decode(&data).unwrap();
        assert!(!frame.is_wrapped());
        assert_eq!(frame.command(), Some((0x58, 0x01)));
        assert_eq!(frame.payload().len(), 22);
        assert_eq!(frame.payload()[1], 0x07);
    }

    #[test]
    fn test_decode_drops_malformed_input() {
        assert_eq!(decode(&[]), Err(FrameError::Empty));
        assert_eq!(
            decode(&[0x23]),
            Err(FrameError::TooShort {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            decode(&unhex("230280000100")),
            Err(FrameError::TooShort {
                expected: 7,
                actual: 6
            })
        );
        assert_eq!(
            decode(&[0x25, 0x03, 0xff]),
            Err(FrameError::UnrecognizedCommand {
                command_class: 0x25,
                command: 0x03
            })
        );
        // other ZipNd commands are not accepted raw
        assert!(decode(&[0x58, 0x04, 0x00, 0x01]).is_err());
    }

    #[test]
    fn test_frame_errors_are_silent() {
        assert!(FrameError::Empty.is_silent_drop());
        assert!(
            FrameError::UnrecognizedCommand {
                command_class: 0,
                command: 0
            }
            .is_silent_drop()
        );
    }

    #[test]
    fn test_flag_accessors() {
        let flags = ContentFlags::from_byte(0xf0);
        assert!(flags.header_ext_included());
        assert!(flags.command_included());
        assert!(flags.more_information());
        assert!(flags.secure_origin());
        assert!(!ContentFlags::NONE.command_included());
        assert_eq!(AckFlags::from_byte(0x80), AckFlags::ACK_REQUEST);
    }
}
