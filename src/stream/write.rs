//! Application-to-network stream state machine.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::Ordering;

use tracing::{debug, trace};

use crate::counters::TcpRouteCounters;
use crate::poller::Ops;
use crate::types::{DataFrame, StreamId};

use super::{ConnCx, SocketState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    Continue,
    Overflow,
    Failed,
}

#[derive(Debug)]
struct PendingFrame {
    data: Vec<u8>,
    written: usize,
    /// Bytes already on the wire before the frame was buffered; their credit
    /// is granted when the frame completes.
    head: usize,
}

/// Credit-granting writer for one socket's outbound direction.
///
/// `writable_bytes` tracks credit granted to the producer that has not yet
/// been consumed by DATA frames; each frame charges its payload length plus
/// the advertised padding, and the WINDOW emitted once the bytes reach the
/// socket restores the same amount. The pending FIFO is bounded by that
/// accounting: it can never hold more than the outstanding credit.
#[derive(Debug)]
pub struct WriteStream {
    app_stream: Option<StreamId>,
    writable_bytes: i32,
    window_padding: i32,
    group_id: u64,
    pending: VecDeque<PendingFrame>,
    pending_bytes: usize,
    end_deferred: bool,
    reset_sent: bool,
    ended: bool,
}

impl WriteStream {
    pub(crate) fn new() -> Self {
        Self {
            app_stream: None,
            writable_bytes: 0,
            window_padding: 0,
            group_id: 0,
            pending: VecDeque::new(),
            pending_bytes: 0,
            end_deferred: false,
            reset_sent: false,
            ended: false,
        }
    }

    pub fn app_stream(&self) -> Option<StreamId> {
        self.app_stream
    }

    /// Bind the application stream and grant it the initial window.
    pub(crate) fn bind(
        &mut self,
        cx: &mut ConnCx<'_>,
        app_stream: StreamId,
    ) -> crate::Result<()> {
        self.app_stream = Some(app_stream);
        self.window_padding = cx.config.window_padding;
        self.writable_bytes = cx.config.window_size;
        cx.writer.window(
            &cx.conduits.input.throttle,
            app_stream,
            cx.config.window_size,
            cx.config.window_padding,
            0,
        )?;
        Ok(())
    }

    pub(crate) fn on_data(
        &mut self,
        cx: &mut ConnCx<'_>,
        sock: &mut SocketState,
        counters: &TcpRouteCounters,
        frame: DataFrame,
    ) -> crate::Result<WriteOutcome> {
        let Some(app_stream) = self.app_stream else {
            return Ok(WriteOutcome::Continue);
        };
        if self.ended {
            // Frame on a closed stream.
            if !self.reset_sent {
                self.reset_sent = true;
                cx.writer.reset(&cx.conduits.input.throttle, app_stream)?;
            }
            return Ok(WriteOutcome::Continue);
        }

        let charge = frame.payload.len() as i32 + self.window_padding;
        if charge > self.writable_bytes || frame.payload.len() > cx.config.max_message_length {
            debug!(
                stream = %app_stream,
                charge,
                writable = self.writable_bytes,
                "data exceeds granted credit"
            );
            cx.counters.overflows.fetch_add(1, Ordering::Relaxed);
            if !self.reset_sent {
                self.reset_sent = true;
                cx.writer.reset(&cx.conduits.input.throttle, app_stream)?;
            }
            self.ended = true;
            return Ok(WriteOutcome::Overflow);
        }
        self.writable_bytes -= charge;
        self.group_id = frame.group_id;

        if !self.pending.is_empty() {
            self.enqueue(frame.payload.to_vec(), 0);
            return Ok(WriteOutcome::Continue);
        }

        let payload = frame.payload;
        let mut written = 0usize;
        while written < payload.len() {
            match sock.stream.write(&payload[written..]) {
                Ok(0) => break,
                Ok(n) => {
                    written += n;
                    counters.bytes_wrote.fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(stream = %app_stream, error = %err, "write failed");
                    return Ok(WriteOutcome::Failed);
                }
            }
        }

        if written == payload.len() {
            counters.frames_wrote.fetch_add(1, Ordering::Relaxed);
            self.grant(cx, written, 1)?;
            trace!(stream = %app_stream, bytes = written, "data written direct");
        } else {
            self.enqueue(payload.to_vec(), written);
            sock.key.register_op(Ops::WRITE);
            trace!(
                stream = %app_stream,
                written,
                buffered = self.pending_bytes,
                "partial write buffered"
            );
        }
        Ok(WriteOutcome::Continue)
    }

    pub(crate) fn on_writable(
        &mut self,
        cx: &mut ConnCx<'_>,
        sock: &mut SocketState,
        counters: &TcpRouteCounters,
    ) -> crate::Result<WriteOutcome> {
        let mut fifo_drained = 0usize;
        let mut grant_bytes = 0usize;
        let mut frames_completed = 0u32;

        while let Some(front) = self.pending.front_mut() {
            match sock.stream.write(&front.data[front.written..]) {
                Ok(0) => break,
                Ok(n) => {
                    front.written += n;
                    fifo_drained += n;
                    grant_bytes += n;
                    counters.bytes_wrote.fetch_add(n as u64, Ordering::Relaxed);
                    if front.written == front.data.len() {
                        frames_completed += 1;
                        grant_bytes += front.head;
                        counters.frames_wrote.fetch_add(1, Ordering::Relaxed);
                        self.pending.pop_front();
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    sock.key.clear_ready(Ops::WRITE);
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(error = %err, "write failed while draining");
                    return Ok(WriteOutcome::Failed);
                }
            }
        }

        self.pending_bytes -= fifo_drained;
        if grant_bytes > 0 && !self.ended {
            self.grant(cx, grant_bytes, frames_completed)?;
        }

        if self.pending.is_empty() {
            sock.key.clear_op(Ops::WRITE);
            if self.end_deferred {
                self.end_deferred = false;
                self.finish_end(sock);
            }
        }
        Ok(WriteOutcome::Continue)
    }

    pub(crate) fn on_end(&mut self, _cx: &mut ConnCx<'_>, sock: &mut SocketState) -> crate::Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        if self.pending.is_empty() {
            self.finish_end(sock);
        } else {
            self.end_deferred = true;
        }
        Ok(())
    }

    pub(crate) fn on_abort(&mut self, cx: &mut ConnCx<'_>, sock: &mut SocketState) -> crate::Result<()> {
        self.discard_pending();
        self.ended = true;
        self.end_deferred = false;
        if let Some(app_stream) = self.app_stream {
            if !self.reset_sent {
                self.reset_sent = true;
                cx.writer.reset(&cx.conduits.input.throttle, app_stream)?;
            }
        }
        sock.key.cancel_op(Ops::WRITE);
        sock.close_abortive();
        Ok(())
    }

    /// A write failure carries ABORT semantics: RESET the producer and stop
    /// emitting WINDOW frames. The caller aborts the inbound direction and
    /// releases the socket.
    pub(crate) fn fail(&mut self, cx: &mut ConnCx<'_>) -> crate::Result<()> {
        self.discard_pending();
        self.ended = true;
        self.end_deferred = false;
        if let Some(app_stream) = self.app_stream {
            if !self.reset_sent {
                self.reset_sent = true;
                cx.writer.reset(&cx.conduits.input.throttle, app_stream)?;
            }
        }
        Ok(())
    }

    /// Stop the outbound direction without emitting anything; used when the
    /// read side already released the socket.
    pub(crate) fn silence(&mut self) {
        self.discard_pending();
        self.ended = true;
        self.end_deferred = false;
    }

    fn finish_end(&mut self, sock: &mut SocketState) {
        sock.key.clear_op(Ops::WRITE);
        sock.shutdown_output();
        sock.close_if_both_shutdown();
    }

    fn grant(&mut self, cx: &mut ConnCx<'_>, bytes: usize, frames: u32) -> crate::Result<()> {
        let Some(app_stream) = self.app_stream else {
            return Ok(());
        };
        let credit = bytes as i32 + frames as i32 * self.window_padding;
        self.writable_bytes += credit;
        cx.writer.window(
            &cx.conduits.input.throttle,
            app_stream,
            credit,
            self.window_padding,
            self.group_id,
        )?;
        Ok(())
    }

    fn enqueue(&mut self, data: Vec<u8>, written: usize) {
        self.pending_bytes += data.len() - written;
        self.pending.push_back(PendingFrame {
            data,
            written,
            head: written,
        });
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
        self.pending_bytes = 0;
    }
}
