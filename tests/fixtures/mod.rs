//! Test rig: worker on its own thread plus the application side of its
//! conduits.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use nukleus_tcp::types::{
    BeginFrame, ControlCommand, ControlResponse, CorrelationId, DataFrame, Role,
    RouteAddressExt, RouteCommand, RouteId, StreamFrame, StreamId, ThrottleFrame,
    UnrouteCommand,
};
use nukleus_tcp::{
    ControlConduits, CounterRegistry, MessageReader, MessageWriter, TargetConduits, TcpConfig,
    TcpWorker, WorkerHandle,
};

pub const APP: &str = "echo";

const WAIT: Duration = Duration::from_secs(5);

pub struct Rig {
    handle: Option<WorkerHandle>,
    pub control: ControlConduits,
    pub conduits: TargetConduits,
    writer: MessageWriter,
    reader: MessageReader,
    next_correlation: u64,
    next_stream: u64,
}

impl Rig {
    pub fn start(config: TcpConfig) -> Self {
        let control = ControlConduits::allocate(
            config.command_buffer_capacity,
            config.response_buffer_capacity,
        )
        .expect("control conduits");
        let conduits =
            TargetConduits::allocate(config.streams_buffer_capacity).expect("stream conduits");
        let mut targets = HashMap::new();
        targets.insert(APP.to_owned(), conduits.clone());
        let handle = TcpWorker::start(config, control.clone(), targets).expect("worker start");
        Self {
            handle: Some(handle),
            control,
            conduits,
            writer: MessageWriter::new(),
            reader: MessageReader::new(),
            next_correlation: 0x1000,
            next_stream: 0x2000,
        }
    }

    pub fn registry(&self) -> &CounterRegistry {
        self.handle.as_ref().expect("worker running").registry()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.registry().value(name).unwrap_or(0)
    }

    pub fn await_counter(&self, name: &str, expected: u64) {
        await_with(
            || (self.counter(name) == expected).then_some(()),
            &format!("counter {name} == {expected}"),
        );
    }

    // ---- control plane ----

    pub fn route_server(&mut self, local: SocketAddr) -> RouteId {
        self.route(Role::Server, local, None)
    }

    pub fn route_server_filtered(&mut self, local: SocketAddr, remote: SocketAddr) -> RouteId {
        self.route(Role::Server, local, Some(remote))
    }

    pub fn route_client(&mut self, remote: SocketAddr) -> RouteId {
        self.route(Role::Client, "0.0.0.0:0".parse().unwrap(), Some(remote))
    }

    fn route(&mut self, role: Role, local: SocketAddr, remote: Option<SocketAddr>) -> RouteId {
        match self.route_raw(role, local, remote, APP) {
            ControlResponse::Routed { route_id, .. } => route_id,
            other => panic!("route rejected: {other:?}"),
        }
    }

    /// Send a ROUTE command and return whatever response the worker gives.
    pub fn route_raw(
        &mut self,
        role: Role,
        local: SocketAddr,
        remote: Option<SocketAddr>,
        target: &str,
    ) -> ControlResponse {
        let correlation_id = self.next_correlation_id();
        let extension = RouteAddressExt { local, remote }.to_extension();
        let command = ControlCommand::Route(RouteCommand {
            correlation_id,
            nukleus: "tcp".to_owned(),
            role,
            reference: i64::from(local.port()),
            source_name: "any".to_owned(),
            source_ref: 0,
            target_name: target.to_owned(),
            target_ref: 0,
            authorization: 0,
            extension: Bytes::from(extension),
        });
        self.writer
            .command(&self.control.commands, &command)
            .expect("command ring");
        self.await_response(correlation_id)
    }

    pub fn unroute(&mut self, route_id: RouteId) -> bool {
        matches!(
            self.unroute_raw(route_id),
            ControlResponse::Unrouted { .. }
        )
    }

    /// Send an UNROUTE command and return whatever response the worker gives.
    pub fn unroute_raw(&mut self, route_id: RouteId) -> ControlResponse {
        let correlation_id = self.next_correlation_id();
        let command = ControlCommand::Unroute(UnrouteCommand {
            correlation_id,
            route_id,
        });
        self.writer
            .command(&self.control.commands, &command)
            .expect("command ring");
        self.await_response(correlation_id)
    }

    fn await_response(&mut self, correlation_id: CorrelationId) -> ControlResponse {
        let responses = self.control.responses.clone();
        let reader = &mut self.reader;
        await_with(
            || {
                reader
                    .next_response(&responses)
                    .expect("response decode")
                    .filter(|response| response.correlation_id() == correlation_id)
            },
            "control response",
        )
    }

    // ---- stream plane ----

    pub fn try_stream_frame(&mut self) -> Option<StreamFrame> {
        self.reader
            .next_stream(&self.conduits.output.frames)
            .expect("stream decode")
    }

    pub fn await_stream_frame(&mut self) -> StreamFrame {
        let frames = self.conduits.output.frames.clone();
        let reader = &mut self.reader;
        await_with(
            || reader.next_stream(&frames).expect("stream decode"),
            "stream frame",
        )
    }

    pub fn await_begin(&mut self) -> BeginFrame {
        match self.await_stream_frame() {
            StreamFrame::Begin(begin) => begin,
            other => panic!("expected BEGIN, got {other:?}"),
        }
    }

    pub fn await_data(&mut self) -> DataFrame {
        match self.await_stream_frame() {
            StreamFrame::Data(data) => data,
            other => panic!("expected DATA, got {other:?}"),
        }
    }

    pub fn try_throttle(&mut self) -> Option<ThrottleFrame> {
        self.reader
            .next_throttle(&self.conduits.input.throttle)
            .expect("throttle decode")
    }

    pub fn await_throttle(&mut self) -> ThrottleFrame {
        let throttle = self.conduits.input.throttle.clone();
        let reader = &mut self.reader;
        await_with(
            || reader.next_throttle(&throttle).expect("throttle decode"),
            "throttle frame",
        )
    }

    /// Grant read credit for a network-to-application stream.
    pub fn grant_window(&mut self, stream_id: StreamId, credit: i32, padding: i32) {
        self.writer
            .window(&self.conduits.output.throttle, stream_id, credit, padding, 0)
            .expect("throttle ring");
    }

    pub fn send_reset(&mut self, stream_id: StreamId) {
        self.writer
            .reset(&self.conduits.output.throttle, stream_id)
            .expect("throttle ring");
    }

    /// Answer an accepted connection's BEGIN, binding the reply stream.
    pub fn reply_begin(&mut self, correlation_id: CorrelationId) -> StreamId {
        let stream_id = self.next_stream_id();
        let begin = BeginFrame {
            stream_id,
            authorization: 0,
            source_ref: 0,
            correlation_id,
            extension: Bytes::new(),
        };
        self.writer
            .begin(&self.conduits.input.frames, &begin)
            .expect("frames ring");
        stream_id
    }

    /// Open a client-role stream over `route_id`.
    pub fn begin_client(&mut self, route_id: RouteId) -> (StreamId, CorrelationId) {
        let stream_id = self.next_stream_id();
        let correlation_id = self.next_correlation_id();
        let begin = BeginFrame {
            stream_id,
            authorization: 0,
            source_ref: route_id.0,
            correlation_id,
            extension: Bytes::new(),
        };
        self.writer
            .begin(&self.conduits.input.frames, &begin)
            .expect("frames ring");
        (stream_id, correlation_id)
    }

    pub fn send_data(&mut self, stream_id: StreamId, payload: &[u8]) {
        let frame = DataFrame {
            stream_id,
            authorization: 0,
            flags: 0,
            group_id: 0,
            padding: 0,
            payload: Bytes::copy_from_slice(payload),
            extension: Bytes::new(),
        };
        self.writer
            .data(&self.conduits.input.frames, &frame)
            .expect("frames ring");
    }

    pub fn send_end(&mut self, stream_id: StreamId) {
        self.writer
            .end(&self.conduits.input.frames, stream_id, 0)
            .expect("frames ring");
    }

    pub fn send_abort(&mut self, stream_id: StreamId) {
        self.writer
            .abort(&self.conduits.input.frames, stream_id, 0)
            .expect("frames ring");
    }

    fn next_correlation_id(&mut self) -> CorrelationId {
        self.next_correlation += 1;
        CorrelationId(self.next_correlation)
    }

    fn next_stream_id(&mut self) -> StreamId {
        self.next_stream += 1;
        StreamId(self.next_stream)
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.shutdown();
        }
    }
}

/// Worker driven by explicit `tick` calls on the test thread, for tests
/// that need to query the worker between rounds.
pub struct ManualRig {
    pub worker: TcpWorker,
    pub control: ControlConduits,
    pub conduits: TargetConduits,
    writer: MessageWriter,
    reader: MessageReader,
    next_correlation: u64,
}

impl ManualRig {
    pub fn new(config: TcpConfig) -> Self {
        let control = ControlConduits::allocate(
            config.command_buffer_capacity,
            config.response_buffer_capacity,
        )
        .expect("control conduits");
        let conduits =
            TargetConduits::allocate(config.streams_buffer_capacity).expect("stream conduits");
        let mut targets = HashMap::new();
        targets.insert(APP.to_owned(), conduits.clone());
        let worker = TcpWorker::new(config, control.clone(), targets).expect("worker");
        Self {
            worker,
            control,
            conduits,
            writer: MessageWriter::new(),
            reader: MessageReader::new(),
            next_correlation: 0x9000,
        }
    }

    pub fn route_server(&mut self, local: SocketAddr) -> RouteId {
        self.next_correlation += 1;
        let correlation_id = CorrelationId(self.next_correlation);
        let extension = RouteAddressExt {
            local,
            remote: None,
        }
        .to_extension();
        let command = ControlCommand::Route(RouteCommand {
            correlation_id,
            nukleus: "tcp".to_owned(),
            role: Role::Server,
            reference: i64::from(local.port()),
            source_name: "any".to_owned(),
            source_ref: 0,
            target_name: APP.to_owned(),
            target_ref: 0,
            authorization: 0,
            extension: Bytes::from(extension),
        });
        self.writer
            .command(&self.control.commands, &command)
            .expect("command ring");

        let Self {
            worker,
            reader,
            control,
            ..
        } = self;
        let responses = control.responses.clone();
        drive(
            worker,
            || match reader.next_response(&responses).expect("response decode") {
                Some(ControlResponse::Routed {
                    route_id,
                    correlation_id: got,
                }) if got == correlation_id => Some(route_id),
                Some(other) => panic!("route rejected: {other:?}"),
                None => None,
            },
            "routed response",
        )
    }

    pub fn await_begin(&mut self) -> BeginFrame {
        let Self {
            worker,
            reader,
            conduits,
            ..
        } = self;
        let frames = conduits.output.frames.clone();
        drive(
            worker,
            || match reader.next_stream(&frames).expect("stream decode") {
                Some(StreamFrame::Begin(begin)) => Some(begin),
                Some(other) => panic!("expected BEGIN, got {other:?}"),
                None => None,
            },
            "begin frame",
        )
    }

    pub fn await_data(&mut self) -> DataFrame {
        let Self {
            worker,
            reader,
            conduits,
            ..
        } = self;
        let frames = conduits.output.frames.clone();
        drive(
            worker,
            || match reader.next_stream(&frames).expect("stream decode") {
                Some(StreamFrame::Data(data)) => Some(data),
                Some(other) => panic!("expected DATA, got {other:?}"),
                None => None,
            },
            "data frame",
        )
    }

    pub fn grant_window(&mut self, stream_id: StreamId, credit: i32, padding: i32) {
        self.writer
            .window(&self.conduits.output.throttle, stream_id, credit, padding, 0)
            .expect("throttle ring");
    }
}

fn drive<T>(worker: &mut TcpWorker, mut poll: impl FnMut() -> Option<T>, what: &str) -> T {
    let deadline = Instant::now() + WAIT;
    loop {
        worker.tick(Duration::from_millis(1)).expect("tick");
        if let Some(value) = poll() {
            return value;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
    }
}

/// Reserve a loopback address with a free port.
pub fn free_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("ephemeral bind");
    listener.local_addr().expect("local addr")
}

pub fn await_with<T>(mut poll: impl FnMut() -> Option<T>, what: &str) -> T {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(value) = poll() {
            return value;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Assert that nothing arrives within a settle window.
pub fn assert_quiet(mut poll: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_millis(150);
    while Instant::now() < deadline {
        assert!(!poll(), "unexpected {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
