//! Network-to-application stream state machine.

use std::io::{self, Read};
use std::sync::atomic::Ordering;

use tracing::{debug, trace};

use crate::counters::TcpRouteCounters;
use crate::poller::Ops;
use crate::types::stream::DATA_PAYLOAD_OFFSET;
use crate::types::StreamId;

use super::{ConnCx, SocketState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    Continue,
    Failed,
}

/// Credit-gated reader for one socket's inbound direction.
///
/// `readable_bytes` is the credit granted by the consumer that has not yet
/// been consumed by DATA frames; −1 marks the input as closed.
#[derive(Debug)]
pub struct ReadStream {
    stream_id: StreamId,
    readable_bytes: i32,
    read_padding: i32,
    read_group_id: u64,
    reset_required: bool,
    correlated: Option<StreamId>,
    ended: bool,
}

impl ReadStream {
    pub(crate) fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            readable_bytes: 0,
            read_padding: 0,
            read_group_id: 0,
            reset_required: false,
            correlated: None,
            ended: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub(crate) fn on_readable(
        &mut self,
        cx: &mut ConnCx<'_>,
        sock: &mut SocketState,
        counters: &TcpRouteCounters,
        authorization: u64,
    ) -> crate::Result<ReadOutcome> {
        if self.ended || self.readable_bytes <= self.read_padding {
            return Ok(ReadOutcome::Continue);
        }

        let budget = (self.readable_bytes - self.read_padding) as usize;
        let limit = budget.min(cx.config.max_message_length);
        let payload = &mut cx.scratch[DATA_PAYLOAD_OFFSET..DATA_PAYLOAD_OFFSET + limit];

        match sock.stream.read(payload) {
            Ok(0) => {
                // Orderly half-close from the peer.
                self.readable_bytes = -1;
                self.ended = true;
                cx.writer
                    .end(&cx.conduits.output.frames, self.stream_id, authorization)?;
                sock.key.cancel_op(Ops::READ);
                sock.shutdown_input();
                sock.close_if_both_shutdown();
                debug!(stream = %self.stream_id, "input closed by peer");
                Ok(ReadOutcome::Continue)
            }
            Ok(bytes_read) => {
                counters.frames_read.fetch_add(1, Ordering::Relaxed);
                counters
                    .bytes_read
                    .fetch_add(bytes_read as u64, Ordering::Relaxed);
                // The scratch bytes are dispatched as the DATA payload in
                // place; nothing may retain them past this call.
                cx.writer.data_in_place(
                    &cx.conduits.output.frames,
                    cx.scratch,
                    bytes_read,
                    self.stream_id,
                    authorization,
                    self.read_group_id,
                    self.read_padding as u16,
                )?;
                self.readable_bytes -= bytes_read as i32 + self.read_padding;
                if self.readable_bytes <= self.read_padding {
                    sock.key.clear_op(Ops::READ);
                }
                trace!(stream = %self.stream_id, bytes = bytes_read, "data dispatched");
                Ok(ReadOutcome::Continue)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                sock.key.clear_ready(Ops::READ);
                Ok(ReadOutcome::Continue)
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(ReadOutcome::Continue),
            Err(err) => {
                debug!(stream = %self.stream_id, error = %err, "read failed");
                self.fail(cx, sock, authorization)?;
                Ok(ReadOutcome::Failed)
            }
        }
    }

    /// A read failure implies neither socket direction will function again:
    /// ABORT forward, RESET the correlated throttle (or latch it), release
    /// the socket abortively.
    fn fail(
        &mut self,
        cx: &mut ConnCx<'_>,
        sock: &mut SocketState,
        authorization: u64,
    ) -> crate::Result<()> {
        self.readable_bytes = -1;
        if !self.ended {
            self.ended = true;
            cx.writer
                .abort(&cx.conduits.output.frames, self.stream_id, authorization)?;
        }
        sock.key.cancel_op(Ops::READ);

        match self.correlated {
            Some(correlated) => {
                cx.writer.reset(&cx.conduits.input.throttle, correlated)?;
            }
            None => self.reset_required = true,
        }

        sock.close_abortive();
        Ok(())
    }

    /// Terminate the inbound direction because the connection is being
    /// released abortively by the write side.
    pub(crate) fn terminate_abortive(
        &mut self,
        cx: &mut ConnCx<'_>,
        sock: &mut SocketState,
        authorization: u64,
    ) -> crate::Result<()> {
        if !self.ended {
            self.ended = true;
            self.readable_bytes = -1;
            cx.writer
                .abort(&cx.conduits.output.frames, self.stream_id, authorization)?;
        }
        sock.key.cancel_op(Ops::READ);
        Ok(())
    }

    pub(crate) fn on_window(
        &mut self,
        cx: &mut ConnCx<'_>,
        sock: &mut SocketState,
        counters: &TcpRouteCounters,
        authorization: u64,
        credit: i32,
        padding: i32,
        group_id: u64,
    ) -> crate::Result<()> {
        if self.readable_bytes == -1 || self.ended {
            return Ok(());
        }

        self.read_padding = padding;
        self.readable_bytes += credit;
        self.read_group_id = group_id;

        if self.readable_bytes > self.read_padding {
            sock.key.mark_ready(Ops::READ);
            self.on_readable(cx, sock, counters, authorization)?;
        } else {
            sock.key.clear_op(Ops::READ);
        }
        if self.readable_bytes > self.read_padding && !self.ended {
            sock.key.register_op(Ops::READ);
        }
        Ok(())
    }

    pub(crate) fn on_reset(&mut self, sock: &mut SocketState) {
        self.ended = true;
        self.readable_bytes = -1;
        sock.key.cancel_op(Ops::READ);
        if self.correlated.is_some() {
            // The reply direction was already bound; only the inbound half
            // goes away.
            sock.shutdown_input();
            sock.close_if_both_shutdown();
        } else {
            sock.close_abortive();
        }
    }

    /// Attach the reverse throttle once the counterpart stream is known.
    pub(crate) fn set_correlated(
        &mut self,
        cx: &mut ConnCx<'_>,
        correlated: StreamId,
    ) -> crate::Result<()> {
        self.correlated = Some(correlated);
        if self.reset_required {
            self.reset_required = false;
            cx.writer.reset(&cx.conduits.input.throttle, correlated)?;
        }
        Ok(())
    }
}
