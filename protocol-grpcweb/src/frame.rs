//! Length-delimited gRPC-Web frames.
//!
//! Format: 1 byte flag + 4 byte big-endian length + payload. A flag of
//! `0x00` marks a data frame carrying one serialized message; a flag of
//! `0x80` marks the trailer frame, whose payload is a header block.

use crate::error::ParseError;
use crate::headers;
use crate::metadata::Metadata;

/// Flag byte of a data frame.
pub const DATA_FLAG: u8 = 0x00;
/// Flag byte of a trailer frame.
pub const TRAILER_FLAG: u8 = 0x80;
/// Flag byte plus length prefix.
pub const FRAME_HEADER_LEN: usize = 5;
/// Default upper bound on a single frame's payload (4 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;
/// The client's half-close marker: a data frame with no payload.
pub const EMPTY_DATA_FRAME: [u8; FRAME_HEADER_LEN] = [DATA_FLAG, 0, 0, 0, 0];

/// One unit of the response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An already-serialized application message.
    Data(Vec<u8>),
    /// The terminal trailer block, including the reserved status entries.
    Trailer(Metadata),
}

impl Frame {
    /// Append the wire encoding of this frame to `out`.
    ///
    /// Fails without writing anything if the payload does not fit the
    /// 32-bit length prefix or a trailer entry cannot be represented.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        match self {
            Frame::Data(payload) => encode_data(payload, out),
            Frame::Trailer(metadata) => encode_trailer(metadata, out),
        }
    }

    /// Parse one frame from the front of `buf` with the default length limit.
    ///
    /// Returns the frame and the number of bytes consumed.
    pub fn parse(buf: &[u8]) -> Result<(Frame, usize), ParseError> {
        Self::parse_with_limit(buf, DEFAULT_MAX_FRAME_LEN)
    }

    /// Parse one frame, rejecting payloads longer than `max_len`.
    pub fn parse_with_limit(buf: &[u8], max_len: usize) -> Result<(Frame, usize), ParseError> {
        let Some(&flag) = buf.first() else {
            return Err(ParseError::Incomplete);
        };
        if flag != DATA_FLAG && flag != TRAILER_FLAG {
            return Err(ParseError::MalformedFrame(flag));
        }
        if buf.len() < FRAME_HEADER_LEN {
            return Err(ParseError::Incomplete);
        }

        let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if len > max_len {
            return Err(ParseError::FrameTooLarge { len, max: max_len });
        }
        let total = FRAME_HEADER_LEN + len;
        if buf.len() < total {
            return Err(ParseError::Incomplete);
        }

        let payload = &buf[FRAME_HEADER_LEN..total];
        let frame = if flag == TRAILER_FLAG {
            Frame::Trailer(headers::parse(payload)?)
        } else {
            Frame::Data(payload.to_vec())
        };
        Ok((frame, total))
    }

    pub fn is_trailer(&self) -> bool {
        matches!(self, Frame::Trailer(_))
    }
}

/// Encode a data frame around `payload`.
pub fn encode_data(payload: &[u8], out: &mut Vec<u8>) -> Result<(), ParseError> {
    encode_raw(DATA_FLAG, payload, out)
}

/// Encode a trailer frame carrying `metadata` as a header block.
pub fn encode_trailer(metadata: &Metadata, out: &mut Vec<u8>) -> Result<(), ParseError> {
    let mut block = Vec::new();
    headers::encode(metadata, &mut block)?;
    encode_raw(TRAILER_FLAG, &block, out)
}

fn encode_raw(flag: u8, payload: &[u8], out: &mut Vec<u8>) -> Result<(), ParseError> {
    let len = length_prefix(payload.len())?;
    out.reserve(FRAME_HEADER_LEN + payload.len());
    out.push(flag);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

fn length_prefix(len: usize) -> Result<u32, ParseError> {
    u32::try_from(len).map_err(|_| ParseError::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })
}

/// Reassembles frames from socket messages.
///
/// A single message may carry several frames and a frame may be split
/// across messages; push each message as it arrives and drain with
/// [`try_decode`](Self::try_decode).
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Try to drain one complete frame. Returns `Ok(None)` if incomplete.
    ///
    /// On error the buffer is left untouched; the stream cannot be resynced.
    pub fn try_decode(&mut self) -> Result<Option<Frame>, ParseError> {
        match Frame::parse_with_limit(&self.buf, self.max_len) {
            Ok((frame, consumed)) => {
                self.buf.drain(..consumed);
                Ok(Some(frame))
            }
            Err(ParseError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of buffered bytes not yet decoded.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_data_layout() {
        let mut buf = Vec::new();
        encode_data(b"hello", &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn length_prefix_limit() {
        assert_eq!(length_prefix(0), Ok(0));
        assert_eq!(length_prefix(u32::MAX as usize), Ok(u32::MAX));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn length_prefix_rejects_more_than_u32() {
        let len = u32::MAX as usize + 1;
        assert_eq!(
            length_prefix(len),
            Err(ParseError::FrameTooLarge {
                len,
                max: u32::MAX as usize
            })
        );
    }

    #[test]
    fn encode_empty_data_frame() {
        let mut buf = Vec::new();
        Frame::Data(Vec::new()).encode(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 0]);
        assert_eq!(buf, EMPTY_DATA_FRAME);
        assert_eq!(Frame::parse(&buf).unwrap(), (Frame::Data(Vec::new()), 5));
    }

    #[test]
    fn encode_trailer_layout() {
        let md = Metadata::new().with("grpc-status", "0");
        let mut buf = Vec::new();
        encode_trailer(&md, &mut buf).unwrap();
        assert_eq!(buf[0], TRAILER_FLAG);
        let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(&buf[5..], b"grpc-status: 0\r\n");
        assert_eq!(len, buf.len() - 5);

        let (frame, consumed) = Frame::parse(&buf).unwrap();
        assert_eq!(frame, Frame::Trailer(md));
        assert!(frame.is_trailer());
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn parse_incomplete_header() {
        assert_eq!(Frame::parse(&[]), Err(ParseError::Incomplete));
        assert_eq!(Frame::parse(&[0x00, 0, 0]), Err(ParseError::Incomplete));
        assert_eq!(Frame::parse(&[0x80, 0, 0, 0]), Err(ParseError::Incomplete));
    }

    #[test]
    fn parse_incomplete_payload() {
        let mut buf = Vec::new();
        encode_data(b"hello", &mut buf).unwrap();
        buf.truncate(7);
        assert_eq!(Frame::parse(&buf), Err(ParseError::Incomplete));
    }

    #[test]
    fn parse_unknown_flag_is_malformed() {
        assert_eq!(Frame::parse(&[0x01]), Err(ParseError::MalformedFrame(0x01)));
        assert_eq!(
            Frame::parse(&[0x7f, 0, 0, 0, 0]),
            Err(ParseError::MalformedFrame(0x7f))
        );
    }

    #[test]
    fn parse_rejects_oversized_frame() {
        let buf = [0x00, 0, 0, 1, 0];
        assert_eq!(
            Frame::parse_with_limit(&buf, 16),
            Err(ParseError::FrameTooLarge { len: 256, max: 16 })
        );
    }

    #[test]
    fn parse_bad_trailer_block() {
        let mut buf = Vec::new();
        encode_raw(TRAILER_FLAG, b"no separator", &mut buf).unwrap();
        assert!(matches!(
            Frame::parse(&buf),
            Err(ParseError::InvalidHeader(_))
        ));
    }

    #[test]
    fn decoder_reassembles_split_frame() {
        let mut encoded = Vec::new();
        encode_data(b"reassembled message", &mut encoded).unwrap();

        let mut dec = FrameDecoder::new();
        assert!(dec.is_empty());

        dec.push(&encoded[..3]);
        assert_eq!(dec.try_decode(), Ok(None));
        dec.push(&encoded[3..8]);
        assert_eq!(dec.try_decode(), Ok(None));
        dec.push(&encoded[8..]);
        assert_eq!(
            dec.try_decode(),
            Ok(Some(Frame::Data(b"reassembled message".to_vec())))
        );
        assert!(dec.is_empty());
    }

    #[test]
    fn decoder_drains_coalesced_frames() {
        let mut encoded = Vec::new();
        encode_data(b"first", &mut encoded).unwrap();
        encode_data(b"second", &mut encoded).unwrap();
        encode_trailer(&Metadata::new().with("grpc-status", "0"), &mut encoded).unwrap();

        let mut dec = FrameDecoder::new();
        dec.push(&encoded);

        assert_eq!(dec.try_decode(), Ok(Some(Frame::Data(b"first".to_vec()))));
        assert_eq!(dec.try_decode(), Ok(Some(Frame::Data(b"second".to_vec()))));
        assert!(matches!(dec.try_decode(), Ok(Some(Frame::Trailer(_)))));
        assert_eq!(dec.try_decode(), Ok(None));
        assert_eq!(dec.buffered_len(), 0);
    }

    #[test]
    fn decoder_surfaces_malformed_flag() {
        let mut dec = FrameDecoder::new();
        dec.push(&[0x42, 0, 0, 0, 0]);
        assert_eq!(dec.try_decode(), Err(ParseError::MalformedFrame(0x42)));
        assert_eq!(dec.buffered_len(), 5);
        dec.clear();
        assert!(dec.is_empty());
    }
}
