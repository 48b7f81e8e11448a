//! Binary frame format for FPP.
//!
//! Frame layout (18 bytes header + optional header extension + payload):
//!
//! ```text
//! +--------+---------+--------+------------+-------------+--------+
//! | magic  | version | flags  | header_len | payload_len | crc32c |
//! | 4 bytes| 2 bytes |2 bytes |  2 bytes   |   4 bytes   | 4 bytes|
//! +--------+---------+--------+------------+-------------+--------+
//! | [header_ext] | payload                                        |
//! | header_len   | payload_len bytes                              |
//! +--------------+------------------------------------------------+
//! ```
//!
//! Version 1 writes no header extension. A received extension is skipped.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic bytes identifying FPP frames: "FLXP"
pub const MAGIC: [u8; 4] = *b"FLXP";

/// Size of the fixed frame header in bytes (4+2+2+2+4+4 = 18).
pub const FRAME_HEADER_SIZE: usize = 18;

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// CRC32C checksum is present and valid.
    pub const CRC_PRESENT: u16 = 1 << 0;
    /// Payload is compressed (reserved).
    pub const COMPRESSED: u16 = 1 << 1;

    const VALID_V1_MASK: u16 = 0x0003;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_crc(mut self) -> Self {
        self.0 |= Self::CRC_PRESENT;
        self
    }

    pub fn has_crc(&self) -> bool {
        self.0 & Self::CRC_PRESENT != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_V1_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// Fields of a frame header, read without consuming the buffer.
struct Header {
    version: u16,
    flags: FrameFlags,
    extension_len: usize,
    payload_len: usize,
    crc: u32,
}

impl Header {
    fn peek(buf: &[u8]) -> Result<Self, ProtocolError> {
        let magic = [buf[0], buf[1], buf[2], buf[3]];
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = u16::from_be_bytes([buf[4], buf[5]]);
        if version != crate::PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let flags = FrameFlags::from_bits(u16::from_be_bytes([buf[6], buf[7]]))?;
        let extension_len = u16::from_be_bytes([buf[8], buf[9]]) as usize;
        let payload_len = u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            version,
            flags,
            extension_len,
            payload_len: payload_len as usize,
            crc: u32::from_be_bytes([buf[14], buf[15], buf[16], buf[17]]),
        })
    }

    fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.extension_len + self.payload_len
    }
}

/// A parsed FPP frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Protocol version.
    pub version: u16,
    /// Frame flags.
    pub flags: FrameFlags,
    /// Frame payload (JSON data).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new checksummed frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION,
            flags: FrameFlags::new().with_crc(),
            payload,
        }
    }

    /// Creates a new frame from a JSON-serializable value.
    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(Bytes::from(payload)))
    }

    /// Deserializes the JSON payload.
    pub fn to_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let payload = std::str::from_utf8(&self.payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(serde_json::from_str(payload)?)
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let payload_len = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&MAGIC);
        buf.put_u16(self.version);
        buf.put_u16(self.flags.bits());
        buf.put_u16(0);
        buf.put_u32(payload_len);

        let crc = if self.flags.has_crc() {
            crc32c::crc32c(&self.payload)
        } else {
            0
        };
        buf.put_u32(crc);
        buf.put_slice(&self.payload);

        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = Header::peek(buf)?;
        if buf.len() < header.frame_len() {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE + header.extension_len);
        let payload = buf.split_to(header.payload_len).freeze();

        if header.flags.has_crc() {
            let actual = crc32c::crc32c(&payload);
            if actual != header.crc {
                return Err(ProtocolError::CrcMismatch {
                    expected: header.crc,
                    actual,
                });
            }
        }

        Ok(Some(Self {
            version: header.version,
            flags: header.flags,
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(magic: &[u8; 4], version: u16, flags: u16, ext: u16, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(magic);
        buf.put_u16(version);
        buf.put_u16(flags);
        buf.put_u16(ext);
        buf.put_u32(payload.len() as u32);
        buf.put_u32(crc32c::crc32c(payload));
        buf
    }

    #[test]
    fn test_frame_roundtrip() {
        let payload = Bytes::from(r#"{"type":"request","id":"1","op":"ENCODE","params":{}}"#);
        let frame = Frame::new(payload.clone());

        let mut buf = frame.encode().unwrap();
        assert_eq!(&buf[..4], b"FLXP");
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.version, crate::PROTOCOL_VERSION);
        assert!(decoded.flags.has_crc());
        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_crc_validation() {
        let frame = Frame::new(Bytes::from(r#"{"capcode":425321}"#));
        let mut encoded = frame.encode().unwrap();

        let len = encoded.len();
        encoded[len - 2] ^= 0xFF;

        let result = Frame::decode(&mut encoded);
        assert!(matches!(result, Err(ProtocolError::CrcMismatch { .. })));
    }

    #[test]
    fn test_invalid_magic() {
        let mut buf = header(b"RCPX", 1, 0, 0, b"");
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::InvalidMagic(m)) if &m == b"RCPX"));
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&b"FLXP\x00\x01\x00\x01"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        let mut buf = header(b"FLXP", 1, 1, 0, b"{}");
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = header(b"FLXP", 99, 0, 0, b"");
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_invalid_flags() {
        assert!(matches!(
            FrameFlags::from_bits(0x0004),
            Err(ProtocolError::InvalidFlags(0x0004))
        ));
        let flags = FrameFlags::from_bits(0x0003).unwrap();
        assert!(flags.has_crc());
        assert!(flags.is_compressed());
    }

    #[test]
    fn test_frame_too_large() {
        let huge_payload = vec![0u8; (MAX_PAYLOAD_SIZE + 1) as usize];
        let frame = Frame::new(Bytes::from(huge_payload));
        assert!(matches!(
            frame.encode(),
            Err(ProtocolError::FrameTooLarge { .. })
        ));

        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u16(1);
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u32(MAX_PAYLOAD_SIZE + 1);
        buf.put_u32(0);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_header_extension_skipped() {
        let payload = br#"{"ok":true}"#;
        let mut buf = header(b"FLXP", 1, 1, 3, payload);
        buf.put_slice(b"ext");
        buf.put_slice(payload);

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload.as_ref(), payload);
    }

    #[test]
    fn test_frame_without_crc() {
        let mut frame = Frame::new(Bytes::from(r#"{"test":true}"#));
        frame.flags = FrameFlags::new();

        let mut buf = frame.encode().unwrap();
        assert_eq!(&buf[14..18], &[0, 0, 0, 0]);
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(!decoded.flags.has_crc());
    }

    #[test]
    fn test_json_payload() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Page {
            capcode: u32,
        }
        let frame = Frame::from_json(&Page { capcode: 42 }).unwrap();
        assert_eq!(frame.to_json::<Page>().unwrap(), Page { capcode: 42 });

        let frame = Frame::new(Bytes::from_static(&[0xFF, 0xFE]));
        assert!(matches!(
            frame.to_json::<Page>(),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(Bytes::from(r#"{"id":"1"}"#)).encode().unwrap());
        buf.extend_from_slice(&Frame::new(Bytes::from(r#"{"id":"2"}"#)).encode().unwrap());

        let first = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), br#"{"id":"1"}"#);
        let second = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.payload.as_ref(), br#"{"id":"2"}"#);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    proptest! {
        #[test]
        fn prop_any_payload_survives(payload in proptest::collection::vec(any::<u8>(), 0..2048), split in 0usize..2066) {
            let encoded = Frame::new(Bytes::from(payload.clone())).encode().unwrap();
            let split = split.min(encoded.len());

            let mut buf = BytesMut::from(&encoded[..split]);
            if split < encoded.len() {
                prop_assert!(Frame::decode(&mut buf).unwrap().is_none());
                buf.extend_from_slice(&encoded[split..]);
            }
            let decoded = Frame::decode(&mut buf).unwrap().unwrap();
            prop_assert_eq!(decoded.payload.as_ref(), &payload[..]);
        }
    }
}
