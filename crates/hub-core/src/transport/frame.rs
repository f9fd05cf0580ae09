// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing for the persistent channel (§4.A): a 1-byte kind tag, a
//! 4-byte little-endian correlation id, and the remaining bytes as payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Request = 0,
    Response = 1,
    Push = 2,
    Ping = 3,
    Pong = 4,
    Close = 5,
}

impl FrameKind {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Request),
            1 => Some(Self::Response),
            2 => Some(Self::Push),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            5 => Some(Self::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub id: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: FrameKind, id: u32, payload: Bytes) -> Self {
        Self { kind, id, payload }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.payload.len());
        buf.put_u8(self.kind as u8);
        buf.put_u32_le(self.id);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, TransportError> {
        if bytes.len() < 5 {
            return Err(TransportError::Fatal("frame shorter than header".to_owned()));
        }
        let tag = bytes.get_u8();
        let kind = FrameKind::from_u8(tag)
            .ok_or_else(|| TransportError::Fatal(format!("unknown frame kind {tag}")))?;
        let id = bytes.get_u32_le();
        Ok(Self { kind, id, payload: bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() -> anyhow::Result<()> {
        let frame = Frame::new(FrameKind::Request, 42, Bytes::from_static(b"hello"));
        let decoded = Frame::decode(frame.encode())?;
        assert_eq!(decoded.kind, FrameKind::Request);
        assert_eq!(decoded.id, 42);
        assert_eq!(&decoded.payload[..], b"hello");
        Ok(())
    }

    #[test]
    fn rejects_truncated_header() {
        let err = Frame::decode(Bytes::from_static(b"ab"));
        assert!(matches!(err, Err(TransportError::Fatal(_))));
    }

    #[test]
    fn rejects_unknown_kind_tag() {
        let mut buf = BytesMut::new();
        buf.put_u8(99);
        buf.put_u32_le(1);
        let err = Frame::decode(buf.freeze());
        assert!(matches!(err, Err(TransportError::Fatal(_))));
    }
}
