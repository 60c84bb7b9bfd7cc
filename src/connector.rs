//! Outbound connections for client-role streams.

use std::collections::HashMap;
use std::io;

use mio::net::TcpStream;
use mio::Token;
use tracing::debug;

use crate::poller::{Ops, Poller, PollerKey};
use crate::route::Route;
use crate::types::{CorrelationId, RouteId, StreamId};

/// A connect in flight, awaiting OP_CONNECT readiness.
#[derive(Debug)]
pub struct PendingConnect {
    pub stream: TcpStream,
    pub key: PollerKey,
    pub route_id: RouteId,
    pub target: String,
    pub app_stream: StreamId,
    pub correlation_id: CorrelationId,
    pub authorization: u64,
}

#[derive(Debug, Default)]
pub struct Connector {
    pending: HashMap<Token, PendingConnect>,
}

/// Result of probing a pending connect after OP_CONNECT fired.
#[derive(Debug)]
pub enum ConnectProbe {
    /// Handshake still in flight; keep waiting.
    InProgress,
    Connected,
    Failed(io::Error),
}

impl Connector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a non-blocking connect toward the route's remote address.
    pub fn connect(
        &mut self,
        poller: &mut Poller,
        route: &Route,
        app_stream: StreamId,
        correlation_id: CorrelationId,
    ) -> io::Result<Token> {
        let remote = route.remote.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "client route has no remote")
        })?;
        let stream = TcpStream::connect(remote)?;
        let mut key = poller.alloc_key();
        key.register_op(Ops::CONNECT);
        let token = key.token();
        debug!(%remote, stream = %app_stream, "connect started");
        self.pending.insert(
            token,
            PendingConnect {
                stream,
                key,
                route_id: route.id,
                target: route.target.clone(),
                app_stream,
                correlation_id,
                authorization: route.authorization,
            },
        );
        Ok(token)
    }

    /// Finalize a connect whose socket reported writability.
    pub fn probe(pending: &mut PendingConnect) -> ConnectProbe {
        match pending.stream.take_error() {
            Ok(Some(err)) => ConnectProbe::Failed(err),
            Err(err) => ConnectProbe::Failed(err),
            Ok(None) => match pending.stream.peer_addr() {
                Ok(_) => ConnectProbe::Connected,
                Err(err) if err.kind() == io::ErrorKind::NotConnected => {
                    pending.key.clear_ready(Ops::CONNECT);
                    ConnectProbe::InProgress
                }
                Err(err) => ConnectProbe::Failed(err),
            },
        }
    }

    pub fn contains(&self, token: Token) -> bool {
        self.pending.contains_key(&token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut PendingConnect> {
        self.pending.get_mut(&token)
    }

    pub fn take(&mut self, token: Token) -> Option<PendingConnect> {
        self.pending.remove(&token)
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.pending.keys().copied().collect()
    }

    pub fn has_dispatchable(&self) -> bool {
        self.pending
            .values()
            .any(|pending| !pending.key.dispatchable().is_empty())
    }

    pub fn sync_all(&mut self, poller: &Poller) -> io::Result<()> {
        for pending in self.pending.values_mut() {
            poller.sync(&mut pending.stream, &mut pending.key)?;
        }
        Ok(())
    }
}
