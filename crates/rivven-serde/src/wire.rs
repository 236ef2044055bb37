//! Confluent wire format
//!
//! ```text
//! byte 0       : magic byte (0x00)
//! bytes 1..5   : schema id, u32 big-endian
//! bytes 5..    : schema-encoded payload
//! ```
//!
//! The magic byte is written as zero but not checked on read; only the
//! length and the id are significant when parsing.

use crate::error::{SerdeError, SerdeResult};
use crate::types::SchemaId;
use bytes::{BufMut, Bytes, BytesMut};

/// Marker written in the first byte of every message
pub const MAGIC_BYTE: u8 = 0x00;

/// Length of the magic byte plus schema id
pub const HEADER_LEN: usize = 5;

/// Build the 5-byte header for `id`
pub fn encode_header(id: SchemaId) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = MAGIC_BYTE;
    header[1..].copy_from_slice(&id.0.to_be_bytes());
    header
}

/// Split a message into its schema id and payload
pub fn decode_header(message: &[u8]) -> SerdeResult<(SchemaId, &[u8])> {
    if message.len() < HEADER_LEN {
        return Err(SerdeError::MalformedMessage(format!(
            "message is {} bytes, header needs {}",
            message.len(),
            HEADER_LEN
        )));
    }

    let id = u32::from_be_bytes([message[1], message[2], message[3], message[4]]);
    Ok((SchemaId::new(id), &message[HEADER_LEN..]))
}

/// Prefix `payload` with the header for `id`
pub fn frame(id: SchemaId, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(MAGIC_BYTE);
    buf.put_u32(id.0);
    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_big_endian() {
        let header = encode_header(SchemaId::new(0x0102_0304));
        assert_eq!(header, [0x00, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_decode_header_splits_payload() {
        let message = [0x00, 0x00, 0x00, 0x30, 0x39, 0xAA, 0xBB];
        let (id, payload) = decode_header(&message).unwrap();
        assert_eq!(id, SchemaId(12345));
        assert_eq!(payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_header_only_message_has_empty_payload() {
        let header = encode_header(SchemaId(7));
        let (id, payload) = decode_header(&header).unwrap();
        assert_eq!(id, SchemaId(7));
        assert!(payload.is_empty());
    }

    #[test]
    fn test_short_message_is_malformed() {
        for len in 0..HEADER_LEN {
            let message = vec![0u8; len];
            assert!(matches!(
                decode_header(&message),
                Err(SerdeError::MalformedMessage(_))
            ));
        }
    }

    #[test]
    fn test_magic_byte_not_validated() {
        let (id, _) = decode_header(&[0x7F, 0x00, 0x00, 0x00, 0x02]).unwrap();
        assert_eq!(id, SchemaId(2));
    }

    #[test]
    fn test_frame_matches_header() {
        let framed = frame(SchemaId(u32::MAX), b"xyz");
        assert_eq!(&framed[..HEADER_LEN], &encode_header(SchemaId(u32::MAX)));
        assert_eq!(&framed[HEADER_LEN..], b"xyz");
    }
}
