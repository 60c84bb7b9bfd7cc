//! Stream and throttle frame codecs.
//!
//! Frames travel as length-delimited ring records. The forward direction
//! carries BEGIN/DATA/END/ABORT; the reverse (throttle) direction carries
//! WINDOW/RESET. All integers are little-endian.

use bytes::Bytes;

use super::{put_var_bytes, CodecError, CorrelationId, Cursor, StreamId};

pub const BEGIN_TYPE: u8 = 1;
pub const DATA_TYPE: u8 = 2;
pub const END_TYPE: u8 = 3;
pub const ABORT_TYPE: u8 = 4;
pub const WINDOW_TYPE: u8 = 5;
pub const RESET_TYPE: u8 = 6;

/// Offset of the payload bytes inside an encoded DATA record.
///
/// The worker's scratch buffer is laid out as one DATA record so the socket
/// read lands directly in the payload region and the header is written in
/// front of the same bytes before dispatch.
pub const DATA_PAYLOAD_OFFSET: usize = 1 + 8 + 8 + 1 + 8 + 2 + 2;

/// Trailing bytes after the payload of an in-place DATA record (empty
/// extension length).
pub const DATA_TRAILER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginFrame {
    pub stream_id: StreamId,
    pub authorization: u64,
    pub source_ref: u64,
    pub correlation_id: CorrelationId,
    pub extension: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: StreamId,
    pub authorization: u64,
    pub flags: u8,
    pub group_id: u64,
    pub padding: u16,
    pub payload: Bytes,
    pub extension: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndFrame {
    pub stream_id: StreamId,
    pub authorization: u64,
    pub extension: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortFrame {
    pub stream_id: StreamId,
    pub authorization: u64,
    pub extension: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub stream_id: StreamId,
    pub credit: i32,
    pub padding: i32,
    pub group_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetFrame {
    pub stream_id: StreamId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Begin(BeginFrame),
    Data(DataFrame),
    End(EndFrame),
    Abort(AbortFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleFrame {
    Window(WindowFrame),
    Reset(ResetFrame),
}

impl StreamFrame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            StreamFrame::Begin(f) => f.stream_id,
            StreamFrame::Data(f) => f.stream_id,
            StreamFrame::End(f) => f.stream_id,
            StreamFrame::Abort(f) => f.stream_id,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            StreamFrame::Begin(f) => {
                out.push(BEGIN_TYPE);
                out.extend_from_slice(&f.stream_id.0.to_le_bytes());
                out.extend_from_slice(&f.authorization.to_le_bytes());
                out.extend_from_slice(&f.source_ref.to_le_bytes());
                out.extend_from_slice(&f.correlation_id.0.to_le_bytes());
                put_var_bytes(out, &f.extension)?;
            }
            StreamFrame::Data(f) => {
                out.push(DATA_TYPE);
                out.extend_from_slice(&f.stream_id.0.to_le_bytes());
                out.extend_from_slice(&f.authorization.to_le_bytes());
                out.push(f.flags);
                out.extend_from_slice(&f.group_id.to_le_bytes());
                out.extend_from_slice(&f.padding.to_le_bytes());
                put_var_bytes(out, &f.payload)?;
                put_var_bytes(out, &f.extension)?;
            }
            StreamFrame::End(f) => {
                out.push(END_TYPE);
                out.extend_from_slice(&f.stream_id.0.to_le_bytes());
                out.extend_from_slice(&f.authorization.to_le_bytes());
                put_var_bytes(out, &f.extension)?;
            }
            StreamFrame::Abort(f) => {
                out.push(ABORT_TYPE);
                out.extend_from_slice(&f.stream_id.0.to_le_bytes());
                out.extend_from_slice(&f.authorization.to_le_bytes());
                put_var_bytes(out, &f.extension)?;
            }
        }
        Ok(())
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(raw);
        let frame_type = cursor.u8("frame type")?;
        match frame_type {
            BEGIN_TYPE => {
                let stream_id = StreamId(cursor.u64("begin stream id")?);
                let authorization = cursor.u64("begin authorization")?;
                let source_ref = cursor.u64("begin source ref")?;
                let correlation_id = CorrelationId(cursor.u64("begin correlation id")?);
                let extension = Bytes::copy_from_slice(cursor.var_bytes("begin extension")?);
                Ok(StreamFrame::Begin(BeginFrame {
                    stream_id,
                    authorization,
                    source_ref,
                    correlation_id,
                    extension,
                }))
            }
            DATA_TYPE => {
                let stream_id = StreamId(cursor.u64("data stream id")?);
                let authorization = cursor.u64("data authorization")?;
                let flags = cursor.u8("data flags")?;
                let group_id = cursor.u64("data group id")?;
                let padding = cursor.u16("data padding")?;
                let payload = Bytes::copy_from_slice(cursor.var_bytes("data payload")?);
                let extension = Bytes::copy_from_slice(cursor.var_bytes("data extension")?);
                Ok(StreamFrame::Data(DataFrame {
                    stream_id,
                    authorization,
                    flags,
                    group_id,
                    padding,
                    payload,
                    extension,
                }))
            }
            END_TYPE => {
                let stream_id = StreamId(cursor.u64("end stream id")?);
                let authorization = cursor.u64("end authorization")?;
                let extension = Bytes::copy_from_slice(cursor.var_bytes("end extension")?);
                Ok(StreamFrame::End(EndFrame {
                    stream_id,
                    authorization,
                    extension,
                }))
            }
            ABORT_TYPE => {
                let stream_id = StreamId(cursor.u64("abort stream id")?);
                let authorization = cursor.u64("abort authorization")?;
                let extension = Bytes::copy_from_slice(cursor.var_bytes("abort extension")?);
                Ok(StreamFrame::Abort(AbortFrame {
                    stream_id,
                    authorization,
                    extension,
                }))
            }
            got => Err(CodecError::UnknownFrameType { got }),
        }
    }
}

impl ThrottleFrame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            ThrottleFrame::Window(f) => f.stream_id,
            ThrottleFrame::Reset(f) => f.stream_id,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            ThrottleFrame::Window(f) => {
                out.push(WINDOW_TYPE);
                out.extend_from_slice(&f.stream_id.0.to_le_bytes());
                out.extend_from_slice(&f.credit.to_le_bytes());
                out.extend_from_slice(&f.padding.to_le_bytes());
                out.extend_from_slice(&f.group_id.to_le_bytes());
            }
            ThrottleFrame::Reset(f) => {
                out.push(RESET_TYPE);
                out.extend_from_slice(&f.stream_id.0.to_le_bytes());
            }
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(raw);
        let frame_type = cursor.u8("frame type")?;
        match frame_type {
            WINDOW_TYPE => {
                let stream_id = StreamId(cursor.u64("window stream id")?);
                let credit = cursor.i32("window credit")?;
                let padding = cursor.i32("window padding")?;
                let group_id = cursor.u64("window group id")?;
                Ok(ThrottleFrame::Window(WindowFrame {
                    stream_id,
                    credit,
                    padding,
                    group_id,
                }))
            }
            RESET_TYPE => Ok(ThrottleFrame::Reset(ResetFrame {
                stream_id: StreamId(cursor.u64("reset stream id")?),
            })),
            got => Err(CodecError::UnknownFrameType { got }),
        }
    }
}

/// Encode a DATA header in front of payload bytes already resident in
/// `record`, returning the total record length.
///
/// `record[DATA_PAYLOAD_OFFSET..DATA_PAYLOAD_OFFSET + payload_len]` must
/// already hold the payload. The two trailer bytes after the payload are
/// written as an empty extension.
pub fn encode_data_in_place(
    record: &mut [u8],
    payload_len: usize,
    stream_id: StreamId,
    authorization: u64,
    flags: u8,
    group_id: u64,
    padding: u16,
) -> usize {
    record[0] = DATA_TYPE;
    record[1..9].copy_from_slice(&stream_id.0.to_le_bytes());
    record[9..17].copy_from_slice(&authorization.to_le_bytes());
    record[17] = flags;
    record[18..26].copy_from_slice(&group_id.to_le_bytes());
    record[26..28].copy_from_slice(&padding.to_le_bytes());
    record[28..30].copy_from_slice(&(payload_len as u16).to_le_bytes());
    let trailer = DATA_PAYLOAD_OFFSET + payload_len;
    record[trailer..trailer + DATA_TRAILER_LEN].copy_from_slice(&0u16.to_le_bytes());
    trailer + DATA_TRAILER_LEN
}
