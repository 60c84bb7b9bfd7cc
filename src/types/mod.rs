//! Wire-level identifiers and frame codecs.

use std::fmt;

use thiserror::Error;

pub mod address;
pub mod control;
pub mod stream;

pub use address::{RouteAddressExt, TcpAddressExt};
pub use control::{ControlCommand, ControlResponse, RouteCommand, UnrouteCommand};
pub use stream::{
    AbortFrame, BeginFrame, DataFrame, EndFrame, ResetFrame, StreamFrame, ThrottleFrame,
    WindowFrame,
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record truncated while decoding {context}")]
    Truncated { context: &'static str },
    #[error("unknown frame type {got}")]
    UnknownFrameType { got: u8 },
    #[error("unknown role {got}")]
    UnknownRole { got: u8 },
    #[error("unknown address family {got}")]
    UnknownAddressFamily { got: u8 },
    #[error("string field is not utf-8")]
    BadUtf8,
    #[error("variable field of {got} bytes exceeds u16 length prefix")]
    FieldTooLong { got: usize },
}

/// Identifier of one configured route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub u64);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of one unidirectional stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier pairing the two halves of a stream pair across nuklei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            Role::Server => 0,
            Role::Client => 1,
        }
    }

    pub(crate) fn from_wire(raw: u8) -> Result<Self, CodecError> {
        match raw {
            0 => Ok(Role::Server),
            1 => Ok(Role::Client),
            got => Err(CodecError::UnknownRole { got }),
        }
    }
}

/// Bounds-checked little-endian cursor over one decoded record.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated { context });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn u8(&mut self, context: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, context)?[0])
    }

    pub(crate) fn u16(&mut self, context: &'static str) -> Result<u16, CodecError> {
        let raw = self.take(2, context)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    pub(crate) fn i32(&mut self, context: &'static str) -> Result<i32, CodecError> {
        let raw = self.take(4, context)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub(crate) fn u64(&mut self, context: &'static str) -> Result<u64, CodecError> {
        let raw = self.take(8, context)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        Ok(u64::from_le_bytes(bytes))
    }

    pub(crate) fn i64(&mut self, context: &'static str) -> Result<i64, CodecError> {
        Ok(self.u64(context)? as i64)
    }

    pub(crate) fn var_bytes(&mut self, context: &'static str) -> Result<&'a [u8], CodecError> {
        let len = self.u16(context)? as usize;
        self.take(len, context)
    }

    pub(crate) fn var_str(&mut self, context: &'static str) -> Result<&'a str, CodecError> {
        std::str::from_utf8(self.var_bytes(context)?).map_err(|_| CodecError::BadUtf8)
    }
}

pub(crate) fn put_var_bytes(out: &mut Vec<u8>, field: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(field.len()).map_err(|_| CodecError::FieldTooLong { got: field.len() })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(field);
    Ok(())
}
