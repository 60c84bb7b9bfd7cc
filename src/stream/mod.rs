//! Per-connection read/write state machines.
//!
//! The worker owns every connection in an arena keyed by poller token; the
//! read and write halves coordinate through the shared `SocketState` rather
//! than referencing each other. Whichever half detects terminal close marks
//! the socket for closing and the worker sweeps the entry after dispatch.

use std::time::Duration;

use mio::net::TcpStream;
use socket2::SockRef;
use tracing::warn;

use crate::conduit::{MessageWriter, TargetConduits};
use crate::config::TcpConfig;
use crate::counters::{TcpCounters, TcpRouteCounters};
use crate::poller::{Ops, PollerKey};
use crate::types::{RouteId, StreamId};

pub mod correlation;
pub mod read;
pub mod write;

pub use correlation::CorrelationMap;
pub use read::ReadStream;
pub use write::WriteStream;

/// How the socket should be released at sweep time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    Orderly,
    Abortive,
}

/// Socket-level state shared by both stream halves.
#[derive(Debug)]
pub struct SocketState {
    pub stream: TcpStream,
    pub key: PollerKey,
    pub input_shutdown: bool,
    pub output_shutdown: bool,
    pub close: Option<CloseMode>,
}

impl SocketState {
    pub fn new(stream: TcpStream, key: PollerKey) -> Self {
        Self {
            stream,
            key,
            input_shutdown: false,
            output_shutdown: false,
            close: None,
        }
    }

    pub(crate) fn shutdown_input(&mut self) {
        if !self.input_shutdown {
            self.input_shutdown = true;
            if let Err(err) = self.stream.shutdown(std::net::Shutdown::Read) {
                warn!(error = %err, "input shutdown failed");
            }
        }
    }

    pub(crate) fn shutdown_output(&mut self) {
        if !self.output_shutdown {
            self.output_shutdown = true;
            if let Err(err) = self.stream.shutdown(std::net::Shutdown::Write) {
                warn!(error = %err, "output shutdown failed");
            }
        }
    }

    pub(crate) fn close_if_both_shutdown(&mut self) {
        if self.input_shutdown && self.output_shutdown && self.close.is_none() {
            self.close = Some(CloseMode::Orderly);
        }
    }

    /// Arrange an abortive release: `SO_LINGER = 0` forces a TCP RST when
    /// the socket is dropped at sweep time.
    pub(crate) fn close_abortive(&mut self) {
        if self.close.is_none() {
            if let Err(err) = SockRef::from(&self.stream).set_linger(Some(Duration::ZERO)) {
                warn!(error = %err, "linger(0) failed before abortive close");
            }
            self.close = Some(CloseMode::Abortive);
        }
    }
}

/// Worker-held context handed into stream handlers.
pub(crate) struct ConnCx<'a> {
    pub conduits: &'a TargetConduits,
    pub writer: &'a mut MessageWriter,
    pub counters: &'a TcpCounters,
    pub scratch: &'a mut Vec<u8>,
    pub config: &'a TcpConfig,
}

/// One accepted or connected socket with its stream pair.
#[derive(Debug)]
pub struct Connection {
    pub sock: SocketState,
    pub read: ReadStream,
    pub write: WriteStream,
    pub route_id: RouteId,
    pub target: String,
    pub(crate) counters: TcpRouteCounters,
    pub(crate) authorization: u64,
}

impl Connection {
    pub(crate) fn new(
        sock: SocketState,
        route_id: RouteId,
        target: String,
        counters: TcpRouteCounters,
        authorization: u64,
        net_stream: StreamId,
    ) -> Self {
        Self {
            sock,
            read: ReadStream::new(net_stream),
            write: WriteStream::new(),
            route_id,
            target,
            counters,
            authorization,
        }
    }

    pub(crate) fn handle_readable(&mut self, cx: &mut ConnCx<'_>) -> crate::Result<u32> {
        let outcome = self.read.on_readable(
            cx,
            &mut self.sock,
            &self.counters,
            self.authorization,
        )?;
        if matches!(outcome, read::ReadOutcome::Failed) {
            self.write.silence();
            self.sock.key.cancel_op(Ops::WRITE);
        }
        Ok(1)
    }

    pub(crate) fn handle_writable(&mut self, cx: &mut ConnCx<'_>) -> crate::Result<u32> {
        let outcome = self.write.on_writable(cx, &mut self.sock, &self.counters)?;
        if matches!(outcome, write::WriteOutcome::Failed) {
            self.abort_both(cx)?;
        }
        Ok(1)
    }

    pub(crate) fn on_app_data(
        &mut self,
        cx: &mut ConnCx<'_>,
        frame: crate::types::DataFrame,
    ) -> crate::Result<()> {
        let outcome = self
            .write
            .on_data(cx, &mut self.sock, &self.counters, frame)?;
        match outcome {
            write::WriteOutcome::Continue => Ok(()),
            write::WriteOutcome::Overflow | write::WriteOutcome::Failed => self.abort_both(cx),
        }
    }

    pub(crate) fn on_app_end(&mut self, cx: &mut ConnCx<'_>) -> crate::Result<()> {
        self.write.on_end(cx, &mut self.sock)
    }

    pub(crate) fn on_app_abort(&mut self, cx: &mut ConnCx<'_>) -> crate::Result<()> {
        self.write.on_abort(cx, &mut self.sock)?;
        // The socket is going away; terminate the inbound stream as well so
        // the consumer is not left waiting on a dead connection.
        self.read
            .terminate_abortive(cx, &mut self.sock, self.authorization)?;
        Ok(())
    }

    pub(crate) fn on_window(
        &mut self,
        cx: &mut ConnCx<'_>,
        credit: i32,
        padding: i32,
        group_id: u64,
    ) -> crate::Result<()> {
        self.read.on_window(
            cx,
            &mut self.sock,
            &self.counters,
            self.authorization,
            credit,
            padding,
            group_id,
        )
    }

    pub(crate) fn on_reset(&mut self) {
        self.read.on_reset(&mut self.sock);
        if self.sock.close.is_some() {
            self.write.silence();
            self.sock.key.cancel_op(Ops::WRITE);
        }
    }

    /// Complete the correlation: bind the reply stream to the write half and
    /// route RESET/WINDOW flows between the two directions.
    pub(crate) fn bind_reply(
        &mut self,
        cx: &mut ConnCx<'_>,
        app_stream: StreamId,
    ) -> crate::Result<()> {
        self.write.bind(cx, app_stream)?;
        self.read.set_correlated(cx, app_stream)?;
        Ok(())
    }

    /// Abort both directions: forward ABORT on the inbound stream, RESET on
    /// the outbound throttle, abortive socket release.
    pub(crate) fn abort_both(&mut self, cx: &mut ConnCx<'_>) -> crate::Result<()> {
        self.write.fail(cx)?;
        self.read
            .terminate_abortive(cx, &mut self.sock, self.authorization)?;
        self.sock.key.cancel_op(Ops::READ | Ops::WRITE);
        self.sock.close_abortive();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use bytes::Bytes;

    use super::*;
    use crate::conduit::{scratch_len, MessageReader, MessageWriter};
    use crate::counters::CounterRegistry;
    use crate::poller::Poller;
    use crate::types::{DataFrame, StreamFrame, ThrottleFrame};

    struct Bench {
        conduits: TargetConduits,
        writer: MessageWriter,
        counters: TcpCounters,
        route: TcpRouteCounters,
        scratch: Vec<u8>,
        config: TcpConfig,
        sock: SocketState,
        client: std::net::TcpStream,
    }

    fn bench(config: TcpConfig) -> Bench {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        accepted.set_nonblocking(true).unwrap();
        let stream = TcpStream::from_std(accepted);

        let mut poller = Poller::new().unwrap();
        let key = poller.alloc_key();
        let mut counters = TcpCounters::new(CounterRegistry::new());
        let route = counters.route(RouteId(1)).clone();
        Bench {
            conduits: TargetConduits::allocate(config.streams_buffer_capacity).unwrap(),
            writer: MessageWriter::new(),
            counters,
            route,
            scratch: vec![0u8; scratch_len(config.max_message_length)],
            config,
            sock: SocketState::new(stream, key),
            client,
        }
    }

    impl Bench {
        fn cx(&mut self) -> ConnCx<'_> {
            ConnCx {
                conduits: &self.conduits,
                writer: &mut self.writer,
                counters: &self.counters,
                scratch: &mut self.scratch,
                config: &self.config,
            }
        }
    }

    fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = poll() {
                return value;
            }
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn read_stream_respects_credit() {
        let mut bench = bench(TcpConfig::default());
        let mut read = ReadStream::new(StreamId(9));
        let mut reader = MessageReader::new();

        bench.client.write_all(b"abcdef").unwrap();
        let Bench {
            conduits,
            writer,
            counters,
            route,
            scratch,
            config,
            sock,
            ..
        } = &mut bench;
        let frames = conduits.output.frames.clone();
        {
            let mut cx = ConnCx {
                conduits,
                writer,
                counters,
                scratch,
                config,
            };
            read.on_window(&mut cx, sock, route, 0, 4, 0, 0).unwrap();
        }
        let first = wait_for(|| {
            let mut cx = ConnCx {
                conduits,
                writer,
                counters,
                scratch,
                config,
            };
            sock.key.mark_ready(Ops::READ);
            read.on_readable(&mut cx, sock, route, 0).unwrap();
            reader.next_stream(&frames).unwrap()
        });
        // Four bytes of credit yield a four-byte DATA at most.
        match first {
            StreamFrame::Data(data) => assert_eq!(&data.payload[..], b"abcd"),
            other => panic!("expected DATA, got {other:?}"),
        }
        assert!(sock.key.dispatchable().is_empty());

        // Replenished credit releases the rest without a poller event.
        {
            let mut cx = ConnCx {
                conduits,
                writer,
                counters,
                scratch,
                config,
            };
            read.on_window(&mut cx, sock, route, 0, 64, 0, 0).unwrap();
        }
        let second = wait_for(|| {
            let mut cx = ConnCx {
                conduits,
                writer,
                counters,
                scratch,
                config,
            };
            sock.key.mark_ready(Ops::READ);
            read.on_readable(&mut cx, sock, route, 0).unwrap();
            reader.next_stream(&frames).unwrap()
        });
        match second {
            StreamFrame::Data(data) => assert_eq!(&data.payload[..], b"ef"),
            other => panic!("expected DATA, got {other:?}"),
        }
        assert_eq!(route.bytes_read.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn write_overflow_resets_the_producer() {
        let config = TcpConfig {
            window_size: 50,
            ..TcpConfig::default()
        };
        let mut bench = bench(config);
        let mut write = WriteStream::new();
        let mut reader = MessageReader::new();

        {
            let Bench {
                conduits,
                writer,
                counters,
                scratch,
                config,
                sock,
                route,
                ..
            } = &mut bench;
            let mut cx = ConnCx {
                conduits,
                writer,
                counters,
                scratch,
                config,
            };
            write.bind(&mut cx, StreamId(21)).unwrap();

            let frame = DataFrame {
                stream_id: StreamId(21),
                authorization: 0,
                flags: 0,
                group_id: 0,
                padding: 0,
                payload: Bytes::from(vec![1u8; 100]),
                extension: Bytes::new(),
            };
            let outcome = write.on_data(&mut cx, sock, route, frame).unwrap();
            assert_eq!(outcome, super::write::WriteOutcome::Overflow);
        }

        assert_eq!(
            bench.counters.overflows.load(Ordering::Relaxed),
            1,
            "overflow counted once"
        );
        let throttle = bench.conduits.input.throttle.clone();
        // Initial WINDOW then the RESET.
        match reader.next_throttle(&throttle).unwrap() {
            Some(ThrottleFrame::Window(window)) => assert_eq!(window.credit, 50),
            other => panic!("expected WINDOW, got {other:?}"),
        }
        match reader.next_throttle(&throttle).unwrap() {
            Some(ThrottleFrame::Reset(reset)) => assert_eq!(reset.stream_id, StreamId(21)),
            other => panic!("expected RESET, got {other:?}"),
        }

        // A later frame on the closed stream does not reset again.
        let Bench {
            conduits,
            writer,
            counters,
            scratch,
            config,
            sock,
            route,
            ..
        } = &mut bench;
        let mut cx = ConnCx {
            conduits,
            writer,
            counters,
            scratch,
            config,
        };
        let late = DataFrame {
            stream_id: StreamId(21),
            authorization: 0,
            flags: 0,
            group_id: 0,
            padding: 0,
            payload: Bytes::from_static(b"late"),
            extension: Bytes::new(),
        };
        write.on_data(&mut cx, sock, route, late).unwrap();
        assert!(reader.next_throttle(&throttle).unwrap().is_none());
        assert_eq!(counters.overflows.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn write_charges_padding_per_frame() {
        let config = TcpConfig {
            window_size: 10,
            window_padding: 3,
            ..TcpConfig::default()
        };
        let mut bench = bench(config);
        let mut write = WriteStream::new();
        let mut reader = MessageReader::new();

        let Bench {
            conduits,
            writer,
            counters,
            scratch,
            config,
            sock,
            route,
            ..
        } = &mut bench;
        let mut cx = ConnCx {
            conduits,
            writer,
            counters,
            scratch,
            config,
        };
        write.bind(&mut cx, StreamId(4)).unwrap();

        // 7 payload + 3 padding consumes the window exactly; the grant after
        // the write restores both.
        let frame = DataFrame {
            stream_id: StreamId(4),
            authorization: 0,
            flags: 0,
            group_id: 0,
            padding: 0,
            payload: Bytes::from_static(b"seven!!"),
            extension: Bytes::new(),
        };
        let outcome = write.on_data(&mut cx, sock, route, frame).unwrap();
        assert_eq!(outcome, super::write::WriteOutcome::Continue);

        let throttle = conduits.input.throttle.clone();
        match reader.next_throttle(&throttle).unwrap() {
            Some(ThrottleFrame::Window(window)) => assert_eq!(window.credit, 10),
            other => panic!("expected initial WINDOW, got {other:?}"),
        }
        match reader.next_throttle(&throttle).unwrap() {
            Some(ThrottleFrame::Window(window)) => {
                assert_eq!(window.credit, 10, "payload plus one padding unit");
                assert_eq!(window.padding, 3);
            }
            other => panic!("expected WINDOW, got {other:?}"),
        }
    }
}
