//! Shared-memory conduits and the framed message reader/writer over them.
//!
//! A `StreamsConduit` pairs a forward frames ring with a reverse throttle
//! ring; a `TargetConduits` holds one conduit per direction between this
//! worker and one peer nukleus. Both sides of each ring are SPSC: the worker
//! is sole producer on its outbound rings and sole consumer on its inbound
//! rings.

use std::sync::Arc;

use bytes::Bytes;

use crate::ring::{RingBuffer, RingError};
use crate::types::stream::{encode_data_in_place, DATA_PAYLOAD_OFFSET, DATA_TRAILER_LEN};
use crate::types::{
    BeginFrame, CodecError, ControlCommand, ControlResponse, DataFrame, EndFrame, ResetFrame,
    StreamFrame, StreamId, ThrottleFrame, WindowFrame,
};

/// One direction of stream traffic plus its reverse throttle channel.
#[derive(Clone, Debug)]
pub struct StreamsConduit {
    pub frames: Arc<RingBuffer>,
    pub throttle: Arc<RingBuffer>,
}

impl StreamsConduit {
    pub fn allocate(capacity: usize) -> Result<Self, RingError> {
        Ok(Self {
            frames: RingBuffer::with_capacity(capacity)?,
            throttle: RingBuffer::with_capacity(capacity)?,
        })
    }
}

/// Both directions between this worker and one peer nukleus.
///
/// `output` carries network-to-application streams, `input` carries
/// application-to-network streams.
#[derive(Clone, Debug)]
pub struct TargetConduits {
    pub output: StreamsConduit,
    pub input: StreamsConduit,
}

impl TargetConduits {
    pub fn allocate(capacity: usize) -> Result<Self, RingError> {
        Ok(Self {
            output: StreamsConduit::allocate(capacity)?,
            input: StreamsConduit::allocate(capacity)?,
        })
    }
}

/// Command and response rings of the control plane.
#[derive(Clone, Debug)]
pub struct ControlConduits {
    pub commands: Arc<RingBuffer>,
    pub responses: Arc<RingBuffer>,
}

impl ControlConduits {
    pub fn allocate(
        command_capacity: usize,
        response_capacity: usize,
    ) -> Result<Self, RingError> {
        Ok(Self {
            commands: RingBuffer::with_capacity(command_capacity)?,
            responses: RingBuffer::with_capacity(response_capacity)?,
        })
    }
}

/// Encodes frames into ring records, reusing one staging buffer.
#[derive(Debug, Default)]
pub struct MessageWriter {
    staging: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, ring: &RingBuffer, frame: &BeginFrame) -> Result<(), RingError> {
        self.staging.clear();
        StreamFrame::Begin(frame.clone())
            .encode(&mut self.staging)
            .expect("begin frame fields fit the wire format");
        ring.push(&[&self.staging])
    }

    pub fn data(&mut self, ring: &RingBuffer, frame: &DataFrame) -> Result<(), RingError> {
        self.staging.clear();
        StreamFrame::Data(frame.clone())
            .encode(&mut self.staging)
            .expect("data frame fields fit the wire format");
        ring.push(&[&self.staging])
    }

    /// Dispatch a DATA record whose payload already sits at
    /// `DATA_PAYLOAD_OFFSET` inside `record`.
    pub fn data_in_place(
        &mut self,
        ring: &RingBuffer,
        record: &mut [u8],
        payload_len: usize,
        stream_id: StreamId,
        authorization: u64,
        group_id: u64,
        padding: u16,
    ) -> Result<(), RingError> {
        let record_len = encode_data_in_place(
            record,
            payload_len,
            stream_id,
            authorization,
            0,
            group_id,
            padding,
        );
        ring.push(&[&record[..record_len]])
    }

    pub fn end(
        &mut self,
        ring: &RingBuffer,
        stream_id: StreamId,
        authorization: u64,
    ) -> Result<(), RingError> {
        self.staging.clear();
        StreamFrame::End(EndFrame {
            stream_id,
            authorization,
            extension: Bytes::new(),
        })
        .encode(&mut self.staging)
        .expect("end frame fields fit the wire format");
        ring.push(&[&self.staging])
    }

    pub fn abort(
        &mut self,
        ring: &RingBuffer,
        stream_id: StreamId,
        authorization: u64,
    ) -> Result<(), RingError> {
        self.staging.clear();
        StreamFrame::Abort(crate::types::AbortFrame {
            stream_id,
            authorization,
            extension: Bytes::new(),
        })
        .encode(&mut self.staging)
        .expect("abort frame fields fit the wire format");
        ring.push(&[&self.staging])
    }

    pub fn window(
        &mut self,
        ring: &RingBuffer,
        stream_id: StreamId,
        credit: i32,
        padding: i32,
        group_id: u64,
    ) -> Result<(), RingError> {
        self.staging.clear();
        ThrottleFrame::Window(WindowFrame {
            stream_id,
            credit,
            padding,
            group_id,
        })
        .encode(&mut self.staging);
        ring.push(&[&self.staging])
    }

    pub fn reset(&mut self, ring: &RingBuffer, stream_id: StreamId) -> Result<(), RingError> {
        self.staging.clear();
        ThrottleFrame::Reset(ResetFrame { stream_id }).encode(&mut self.staging);
        ring.push(&[&self.staging])
    }

    pub fn command(
        &mut self,
        ring: &RingBuffer,
        command: &ControlCommand,
    ) -> Result<(), RingError> {
        self.staging.clear();
        command
            .encode(&mut self.staging)
            .expect("control command fields fit the wire format");
        ring.push(&[&self.staging])
    }

    pub fn response(
        &mut self,
        ring: &RingBuffer,
        response: &ControlResponse,
    ) -> Result<(), RingError> {
        self.staging.clear();
        response.encode(&mut self.staging);
        ring.push(&[&self.staging])
    }
}

/// Decodes ring records into typed frames, reusing one record buffer.
#[derive(Debug, Default)]
pub struct MessageReader {
    record: Vec<u8>,
}

impl MessageReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_stream(&mut self, ring: &RingBuffer) -> Result<Option<StreamFrame>, CodecError> {
        if !ring.pop(&mut self.record) {
            return Ok(None);
        }
        StreamFrame::decode(&self.record).map(Some)
    }

    pub fn next_throttle(
        &mut self,
        ring: &RingBuffer,
    ) -> Result<Option<ThrottleFrame>, CodecError> {
        if !ring.pop(&mut self.record) {
            return Ok(None);
        }
        ThrottleFrame::decode(&self.record).map(Some)
    }

    pub fn next_command(
        &mut self,
        ring: &RingBuffer,
    ) -> Result<Option<ControlCommand>, CodecError> {
        if !ring.pop(&mut self.record) {
            return Ok(None);
        }
        ControlCommand::decode(&self.record).map(Some)
    }

    pub fn next_response(
        &mut self,
        ring: &RingBuffer,
    ) -> Result<Option<ControlResponse>, CodecError> {
        if !ring.pop(&mut self.record) {
            return Ok(None);
        }
        ControlResponse::decode(&self.record).map(Some)
    }
}

/// Size of the scratch buffer used for in-place DATA encoding.
pub(crate) fn scratch_len(max_message_length: usize) -> usize {
    DATA_PAYLOAD_OFFSET + max_message_length + DATA_TRAILER_LEN
}
