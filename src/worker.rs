//! Single-threaded worker event loop.
//!
//! One worker owns the poller, the route table, the connection arena, the
//! correlation map, and both ends of its conduits. Each tick drains the
//! control and stream rings, applies interest changes, polls readiness once,
//! and dispatches every ready key exactly once. No locks are taken on the
//! data path; the rings are the only cross-thread boundary.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use mio::Token;
use tracing::{debug, info, trace, warn};

use crate::acceptor::Acceptor;
use crate::conduit::{scratch_len, ControlConduits, MessageReader, MessageWriter, TargetConduits};
use crate::config::TcpConfig;
use crate::connector::{ConnectProbe, Connector, PendingConnect};
use crate::counters::{CounterRegistry, TcpCounters};
use crate::poller::{Ops, Poller};
use crate::route::RouteTable;
use crate::stream::{ConnCx, Connection, CorrelationMap, SocketState};
use crate::types::{
    BeginFrame, ControlCommand, ControlResponse, DataFrame, Role, RouteCommand, RouteId,
    StreamFrame, StreamId, TcpAddressExt, ThrottleFrame, UnrouteCommand,
};

const DEFAULT_TICK: Duration = Duration::from_millis(1);

pub struct TcpWorker {
    config: TcpConfig,
    poller: Poller,
    counters: TcpCounters,
    routes: RouteTable,
    acceptor: Acceptor,
    connector: Connector,
    connections: HashMap<Token, Connection>,
    correlations: CorrelationMap,
    app_streams: HashMap<StreamId, Token>,
    net_streams: HashMap<StreamId, Token>,
    control: ControlConduits,
    targets: HashMap<String, TargetConduits>,
    writer: MessageWriter,
    reader: MessageReader,
    scratch: Vec<u8>,
    next_stream_id: u64,
    next_correlation_id: u64,
    open_connections: usize,
}

pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    join: JoinHandle<crate::Result<()>>,
    registry: CounterRegistry,
}

impl WorkerHandle {
    pub fn registry(&self) -> &CounterRegistry {
        &self.registry
    }

    pub fn shutdown(self) -> crate::Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(io::Error::other("worker thread panicked").into()),
        }
    }
}

impl TcpWorker {
    pub fn new(
        config: TcpConfig,
        control: ControlConduits,
        targets: HashMap<String, TargetConduits>,
    ) -> crate::Result<Self> {
        config.validate()?;
        let scratch = vec![0u8; scratch_len(config.max_message_length)];
        Ok(Self {
            poller: Poller::new()?,
            counters: TcpCounters::new(CounterRegistry::new()),
            routes: RouteTable::new(),
            acceptor: Acceptor::new(),
            connector: Connector::new(),
            connections: HashMap::new(),
            correlations: CorrelationMap::new(),
            app_streams: HashMap::new(),
            net_streams: HashMap::new(),
            control,
            targets,
            writer: MessageWriter::new(),
            reader: MessageReader::new(),
            scratch,
            next_stream_id: 0,
            next_correlation_id: 0,
            open_connections: 0,
            config,
        })
    }

    /// Spawn the worker on its own thread; it runs until shutdown.
    pub fn start(
        config: TcpConfig,
        control: ControlConduits,
        targets: HashMap<String, TargetConduits>,
    ) -> crate::Result<WorkerHandle> {
        let worker = TcpWorker::new(config, control, targets)?;
        let registry = worker.registry().clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let join = thread::Builder::new()
            .name("tcp-worker".to_owned())
            .spawn(move || worker.run(flag))
            .map_err(crate::Error::Io)?;
        Ok(WorkerHandle {
            shutdown,
            join,
            registry,
        })
    }

    pub fn registry(&self) -> &CounterRegistry {
        self.counters.registry()
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections
    }

    /// Effective local address of a server route's listener.
    pub fn listener_addr(&self, route_id: RouteId) -> Option<SocketAddr> {
        self.acceptor.local_addr(route_id)
    }

    pub fn run(mut self, shutdown: Arc<AtomicBool>) -> crate::Result<()> {
        info!("tcp worker started");
        while !shutdown.load(Ordering::Relaxed) {
            self.tick(DEFAULT_TICK)?;
        }
        info!("tcp worker stopped");
        Ok(())
    }

    /// One cooperative scheduling round; returns the work units processed.
    pub fn tick(&mut self, timeout: Duration) -> crate::Result<u64> {
        let mut work = 0u64;
        work += self.drain_commands()?;
        work += self.drain_app_frames()?;
        work += self.drain_throttles()?;
        self.sweep_closed();
        self.sync_interests()?;

        let poll_timeout = if self.has_dispatchable() {
            Duration::ZERO
        } else {
            timeout
        };
        let events = self.poller.poll(Some(poll_timeout))?;
        for (token, ops) in events {
            self.mark_ready(token, ops);
        }

        work += self.dispatch()?;
        self.sweep_closed();
        self.sync_interests()?;
        Ok(work)
    }

    fn next_stream_id(&mut self) -> StreamId {
        self.next_stream_id += 1;
        StreamId(self.next_stream_id)
    }

    fn next_correlation_id(&mut self) -> crate::types::CorrelationId {
        self.next_correlation_id += 1;
        crate::types::CorrelationId(self.next_correlation_id)
    }

    // ---- control plane ----

    fn drain_commands(&mut self) -> crate::Result<u64> {
        let mut work = 0;
        loop {
            let command = match self.reader.next_command(&self.control.commands) {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "malformed command skipped");
                    continue;
                }
            };
            work += 1;
            match command {
                ControlCommand::Route(command) => self.handle_route(command)?,
                ControlCommand::Unroute(command) => self.handle_unroute(command)?,
            }
        }
        Ok(work)
    }

    fn handle_route(&mut self, command: RouteCommand) -> crate::Result<()> {
        let correlation_id = command.correlation_id;
        if !self.targets.contains_key(&command.target_name) {
            warn!(target = %command.target_name, "route to unknown target rejected");
            return self.respond(ControlResponse::Error { correlation_id });
        }
        let route = match self.routes.insert(&command) {
            Ok(route) => route.clone(),
            Err(err) => {
                warn!(error = %err, "route rejected");
                return self.respond(ControlResponse::Error { correlation_id });
            }
        };
        if route.role == Role::Server {
            if let Err(err) = self.acceptor.bind(&mut self.poller, &route) {
                warn!(error = %err, addr = %route.local, "listener bind failed");
                let _ = self.routes.remove(route.id);
                return self.respond(ControlResponse::Error { correlation_id });
            }
        }
        info!(route = %route.id, role = ?route.role, addr = %route.local, "route added");
        self.respond(ControlResponse::Routed {
            correlation_id,
            route_id: route.id,
        })
    }

    fn handle_unroute(&mut self, command: UnrouteCommand) -> crate::Result<()> {
        let correlation_id = command.correlation_id;
        match self.routes.remove(command.route_id) {
            Ok(route) => {
                if route.role == Role::Server {
                    self.acceptor.unbind(&self.poller, route.id);
                }
                self.counters.remove_route(route.id);
                info!(route = %route.id, "route removed");
                self.respond(ControlResponse::Unrouted { correlation_id })
            }
            Err(err) => {
                warn!(error = %err, "unroute rejected");
                self.respond(ControlResponse::Error { correlation_id })
            }
        }
    }

    fn respond(&mut self, response: ControlResponse) -> crate::Result<()> {
        self.writer.response(&self.control.responses, &response)?;
        Ok(())
    }

    // ---- application frames ----

    fn drain_app_frames(&mut self) -> crate::Result<u64> {
        let mut work = 0;
        let names: Vec<String> = self.targets.keys().cloned().collect();
        for name in names {
            let conduits = self.targets.get(&name).expect("target table").clone();
            loop {
                let Some(frame) = self.reader.next_stream(&conduits.input.frames)? else {
                    break;
                };
                work += 1;
                match frame {
                    StreamFrame::Begin(begin) => self.handle_app_begin(&conduits, begin)?,
                    StreamFrame::Data(data) => self.handle_app_data(data)?,
                    StreamFrame::End(end) => self.handle_app_end(end.stream_id)?,
                    StreamFrame::Abort(abort) => self.handle_app_abort(abort.stream_id)?,
                }
            }
        }
        Ok(work)
    }

    fn handle_app_begin(
        &mut self,
        source: &TargetConduits,
        begin: BeginFrame,
    ) -> crate::Result<()> {
        if begin.source_ref != 0 {
            return self.initiate_client_stream(source, begin);
        }

        // Reply BEGIN: complete the correlation established at accept time.
        let Some(token) = self.correlations.take(begin.correlation_id) else {
            debug!(correlation = %begin.correlation_id, "reply begin without correlation");
            self.writer
                .reset(&source.input.throttle, begin.stream_id)?;
            return Ok(());
        };
        let alive = self
            .connections
            .get(&token)
            .map(|conn| conn.sock.close.is_none())
            .unwrap_or(false);
        if !alive {
            self.writer
                .reset(&source.input.throttle, begin.stream_id)?;
            return Ok(());
        }

        let target = self
            .connections
            .get(&token)
            .expect("checked above")
            .target
            .clone();
        let conduits = self.targets.get(&target).expect("target table").clone();
        {
            let conn = self.connections.get_mut(&token).expect("checked above");
            let mut cx = ConnCx {
                conduits: &conduits,
                writer: &mut self.writer,
                counters: &self.counters,
                scratch: &mut self.scratch,
                config: &self.config,
            };
            conn.bind_reply(&mut cx, begin.stream_id)?;
        }
        self.app_streams.insert(begin.stream_id, token);
        debug!(stream = %begin.stream_id, correlation = %begin.correlation_id, "reply stream bound");
        Ok(())
    }

    fn initiate_client_stream(
        &mut self,
        source: &TargetConduits,
        begin: BeginFrame,
    ) -> crate::Result<()> {
        let route = match self.routes.client(RouteId(begin.source_ref)) {
            Ok(route) => route.clone(),
            Err(err) => {
                warn!(error = %err, stream = %begin.stream_id, "client begin rejected");
                self.writer
                    .reset(&source.input.throttle, begin.stream_id)?;
                return Ok(());
            }
        };
        if !self.targets.contains_key(&route.target) {
            warn!(target = %route.target, "client route targets unknown nukleus");
            self.writer
                .reset(&source.input.throttle, begin.stream_id)?;
            return Ok(());
        }
        if let Err(err) = self.connector.connect(
            &mut self.poller,
            &route,
            begin.stream_id,
            begin.correlation_id,
        ) {
            warn!(error = %err, stream = %begin.stream_id, "connect failed to start");
            self.writer
                .reset(&source.input.throttle, begin.stream_id)?;
        }
        Ok(())
    }

    fn handle_app_data(&mut self, data: DataFrame) -> crate::Result<()> {
        let Some(&token) = self.app_streams.get(&data.stream_id) else {
            trace!(stream = %data.stream_id, "data on unknown stream ignored");
            return Ok(());
        };
        let Some(target) = self.connections.get(&token).map(|c| c.target.clone()) else {
            return Ok(());
        };
        let conduits = self.targets.get(&target).expect("target table").clone();
        let conn = self.connections.get_mut(&token).expect("mapped stream");
        let mut cx = ConnCx {
            conduits: &conduits,
            writer: &mut self.writer,
            counters: &self.counters,
            scratch: &mut self.scratch,
            config: &self.config,
        };
        conn.on_app_data(&mut cx, data)
    }

    fn handle_app_end(&mut self, stream_id: StreamId) -> crate::Result<()> {
        let Some(&token) = self.app_streams.get(&stream_id) else {
            trace!(stream = %stream_id, "end on unknown stream ignored");
            return Ok(());
        };
        let Some(target) = self.connections.get(&token).map(|c| c.target.clone()) else {
            return Ok(());
        };
        let conduits = self.targets.get(&target).expect("target table").clone();
        let conn = self.connections.get_mut(&token).expect("mapped stream");
        let mut cx = ConnCx {
            conduits: &conduits,
            writer: &mut self.writer,
            counters: &self.counters,
            scratch: &mut self.scratch,
            config: &self.config,
        };
        conn.on_app_end(&mut cx)
    }

    fn handle_app_abort(&mut self, stream_id: StreamId) -> crate::Result<()> {
        let Some(&token) = self.app_streams.get(&stream_id) else {
            trace!(stream = %stream_id, "abort on unknown stream ignored");
            return Ok(());
        };
        let Some(target) = self.connections.get(&token).map(|c| c.target.clone()) else {
            return Ok(());
        };
        let conduits = self.targets.get(&target).expect("target table").clone();
        let conn = self.connections.get_mut(&token).expect("mapped stream");
        let mut cx = ConnCx {
            conduits: &conduits,
            writer: &mut self.writer,
            counters: &self.counters,
            scratch: &mut self.scratch,
            config: &self.config,
        };
        conn.on_app_abort(&mut cx)
    }

    // ---- throttle frames ----

    fn drain_throttles(&mut self) -> crate::Result<u64> {
        let mut work = 0;
        let names: Vec<String> = self.targets.keys().cloned().collect();
        for name in names {
            let conduits = self.targets.get(&name).expect("target table").clone();
            loop {
                let Some(frame) = self.reader.next_throttle(&conduits.output.throttle)? else {
                    break;
                };
                work += 1;
                let stream_id = frame.stream_id();
                let Some(&token) = self.net_streams.get(&stream_id) else {
                    trace!(stream = %stream_id, "throttle on unknown stream ignored");
                    continue;
                };
                let Some(conn) = self.connections.get_mut(&token) else {
                    continue;
                };
                match frame {
                    ThrottleFrame::Window(window) => {
                        let mut cx = ConnCx {
                            conduits: &conduits,
                            writer: &mut self.writer,
                            counters: &self.counters,
                            scratch: &mut self.scratch,
                            config: &self.config,
                        };
                        conn.on_window(&mut cx, window.credit, window.padding, window.group_id)?;
                    }
                    ThrottleFrame::Reset(_) => {
                        debug!(stream = %stream_id, "stream reset by consumer");
                        conn.on_reset();
                    }
                }
            }
        }
        Ok(work)
    }

    // ---- readiness dispatch ----

    fn has_dispatchable(&self) -> bool {
        self.acceptor.has_dispatchable()
            || self.connector.has_dispatchable()
            || self
                .connections
                .values()
                .any(|conn| !conn.sock.key.dispatchable().is_empty())
    }

    fn mark_ready(&mut self, token: Token, ops: Ops) {
        if let Some(listener) = self.acceptor.get_mut(token) {
            listener.key.mark_ready(ops);
        } else if let Some(pending) = self.connector.get_mut(token) {
            pending.key.mark_ready(ops);
        } else if let Some(conn) = self.connections.get_mut(&token) {
            conn.sock.key.mark_ready(ops);
        }
    }

    fn dispatch(&mut self) -> crate::Result<u64> {
        let mut work = 0u64;

        for token in self.acceptor.tokens() {
            let ready = self
                .acceptor
                .get_mut(token)
                .map(|l| l.key.dispatchable())
                .unwrap_or(Ops::NONE);
            if ready.contains(Ops::ACCEPT) {
                work += self.handle_accept(token)?;
            }
        }

        for token in self.connector.tokens() {
            let ready = self
                .connector
                .get_mut(token)
                .map(|p| p.key.dispatchable())
                .unwrap_or(Ops::NONE);
            if ready.contains(Ops::CONNECT) {
                work += self.handle_connect(token)?;
            }
        }

        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            let ready = self
                .connections
                .get(&token)
                .map(|c| c.sock.key.dispatchable())
                .unwrap_or(Ops::NONE);
            if ready.is_empty() {
                continue;
            }
            let target = self
                .connections
                .get(&token)
                .expect("listed token")
                .target
                .clone();
            let conduits = self.targets.get(&target).expect("target table").clone();
            let conn = self.connections.get_mut(&token).expect("listed token");
            let mut cx = ConnCx {
                conduits: &conduits,
                writer: &mut self.writer,
                counters: &self.counters,
                scratch: &mut self.scratch,
                config: &self.config,
            };
            if ready.contains(Ops::READ) {
                work += u64::from(conn.handle_readable(&mut cx)?);
            }
            if ready.contains(Ops::WRITE) && conn.sock.close.is_none() {
                work += u64::from(conn.handle_writable(&mut cx)?);
            }
        }
        Ok(work)
    }

    fn handle_accept(&mut self, token: Token) -> crate::Result<u64> {
        if self.open_connections >= self.config.max_connections {
            self.acceptor.pause();
            return Ok(0);
        }

        // One accept per tick per listener keeps dispatch fair across
        // listeners; the latched readiness surfaces the next pending
        // connection on the following tick.
        let (stream, peer, route_ids) = {
            let Some(listener) = self.acceptor.get_mut(token) else {
                return Ok(0);
            };
            match listener.listener.accept() {
                Ok((stream, peer)) => (stream, peer, listener.routes.clone()),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    listener.key.clear_ready(Ops::ACCEPT);
                    return Ok(0);
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::Interrupted
                            | io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                    ) =>
                {
                    warn!(error = %err, "transient accept error");
                    return Ok(0);
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    listener.key.clear_ready(Ops::ACCEPT);
                    return Ok(0);
                }
            }
        };

        let Some(route) = self.routes.match_accept(&route_ids, peer).cloned() else {
            debug!(%peer, "no route matches remote; connection dropped");
            drop(stream);
            return Ok(1);
        };
        if !self.targets.contains_key(&route.target) {
            debug!(target = %route.target, "route target missing; connection dropped");
            drop(stream);
            return Ok(1);
        }
        self.create_server_connection(stream, peer, &route)?;
        Ok(1)
    }

    fn create_server_connection(
        &mut self,
        stream: mio::net::TcpStream,
        peer: SocketAddr,
        route: &crate::route::Route,
    ) -> crate::Result<()> {
        let _ = stream.set_nodelay(true);
        let local = stream.local_addr()?;
        let net_stream = self.next_stream_id();
        let correlation_id = self.next_correlation_id();
        let route_counters = self.counters.route(route.id).clone();
        let key = self.poller.alloc_key();
        let token = key.token();

        let extension = TcpAddressExt {
            local,
            remote: peer,
        }
        .to_extension();
        let begin = BeginFrame {
            stream_id: net_stream,
            authorization: route.authorization,
            source_ref: route.id.0,
            correlation_id,
            extension: Bytes::from(extension),
        };
        let conduits = self.targets.get(&route.target).expect("checked by caller");
        self.writer.begin(&conduits.output.frames, &begin)?;

        self.counters.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.open_connections += 1;
        let connection = Connection::new(
            SocketState::new(stream, key),
            route.id,
            route.target.clone(),
            route_counters,
            route.authorization,
            net_stream,
        );
        self.correlations.insert(correlation_id, token);
        self.net_streams.insert(net_stream, token);
        self.connections.insert(token, connection);
        info!(route = %route.id, %peer, stream = %net_stream, "connection accepted");

        if self.open_connections >= self.config.max_connections {
            self.acceptor.pause();
        }
        Ok(())
    }

    fn handle_connect(&mut self, token: Token) -> crate::Result<u64> {
        let probe = {
            let Some(pending) = self.connector.get_mut(token) else {
                return Ok(0);
            };
            Connector::probe(pending)
        };
        match probe {
            ConnectProbe::InProgress => Ok(0),
            ConnectProbe::Connected => {
                let pending = self.connector.take(token).expect("probed token");
                self.finish_connect(pending)?;
                Ok(1)
            }
            ConnectProbe::Failed(err) => {
                let mut pending = self.connector.take(token).expect("probed token");
                warn!(error = %err, stream = %pending.app_stream, "connect failed");
                self.poller
                    .deregister(&mut pending.stream, &mut pending.key);
                let conduits = self
                    .targets
                    .get(&pending.target)
                    .expect("target table")
                    .clone();
                self.writer
                    .reset(&conduits.input.throttle, pending.app_stream)?;
                Ok(1)
            }
        }
    }

    fn finish_connect(&mut self, mut pending: PendingConnect) -> crate::Result<()> {
        let _ = pending.stream.set_nodelay(true);
        let (local, peer) = match (pending.stream.local_addr(), pending.stream.peer_addr()) {
            (Ok(local), Ok(peer)) => (local, peer),
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, stream = %pending.app_stream, "connect finalization failed");
                self.poller
                    .deregister(&mut pending.stream, &mut pending.key);
                let conduits = self
                    .targets
                    .get(&pending.target)
                    .expect("target table")
                    .clone();
                self.writer
                    .reset(&conduits.input.throttle, pending.app_stream)?;
                return Ok(());
            }
        };

        let net_stream = self.next_stream_id();
        let route_counters = self.counters.route(pending.route_id).clone();
        let conduits = self
            .targets
            .get(&pending.target)
            .expect("target table")
            .clone();

        // Reply BEGIN carries the application-owned correlation id back.
        let extension = TcpAddressExt {
            local,
            remote: peer,
        }
        .to_extension();
        let begin = BeginFrame {
            stream_id: net_stream,
            authorization: pending.authorization,
            source_ref: 0,
            correlation_id: pending.correlation_id,
            extension: Bytes::from(extension),
        };
        self.writer.begin(&conduits.output.frames, &begin)?;

        self.counters.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.open_connections += 1;
        pending.key.cancel_op(Ops::CONNECT);
        let token = pending.key.token();
        let mut connection = Connection::new(
            SocketState::new(pending.stream, pending.key),
            pending.route_id,
            pending.target,
            route_counters,
            pending.authorization,
            net_stream,
        );
        {
            let mut cx = ConnCx {
                conduits: &conduits,
                writer: &mut self.writer,
                counters: &self.counters,
                scratch: &mut self.scratch,
                config: &self.config,
            };
            connection.bind_reply(&mut cx, pending.app_stream)?;
        }
        let app_stream = pending.app_stream;
        self.net_streams.insert(net_stream, token);
        self.app_streams.insert(app_stream, token);
        self.connections.insert(token, connection);
        info!(route = %pending.route_id, %peer, stream = %net_stream, "connection established");
        Ok(())
    }

    // ---- lifecycle ----

    fn sweep_closed(&mut self) {
        let closed: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.sock.close.is_some())
            .map(|(token, _)| *token)
            .collect();
        for token in closed {
            let mut conn = self.connections.remove(&token).expect("listed token");
            self.poller
                .deregister(&mut conn.sock.stream, &mut conn.sock.key);
            self.net_streams.remove(&conn.read.stream_id());
            if let Some(app_stream) = conn.write.app_stream() {
                self.app_streams.remove(&app_stream);
            }
            self.correlations.remove_token(token);
            self.counters
                .connections_closed
                .fetch_add(1, Ordering::Relaxed);
            self.open_connections -= 1;
            info!(route = %conn.route_id, mode = ?conn.sock.close, "connection closed");
        }
        if self.acceptor.is_paused() && self.open_connections < self.config.max_connections {
            self.acceptor.resume();
        }
    }

    fn sync_interests(&mut self) -> crate::Result<()> {
        self.acceptor.sync_all(&self.poller)?;
        self.connector.sync_all(&self.poller)?;
        let poller = &self.poller;
        for conn in self.connections.values_mut() {
            poller.sync(&mut conn.sock.stream, &mut conn.sock.key)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TcpWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpWorker")
            .field("open_connections", &self.open_connections)
            .field("connections", &self.connections.len())
            .field("correlations", &self.correlations.len())
            .finish()
    }
}
