//! Listening sockets for server-role routes.
//!
//! One listener is bound per distinct local address; several routes may
//! share it, distinguished by their remote address filters. When the
//! connection cap is reached every listener's accept interest is cancelled
//! (a logical unbind); closing a connection below the cap re-arms them.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use mio::net::TcpListener;
use mio::Token;
use tracing::{debug, info};

use crate::poller::{Ops, Poller, PollerKey};
use crate::route::Route;
use crate::types::RouteId;

#[derive(Debug)]
pub struct Listener {
    pub listener: TcpListener,
    pub key: PollerKey,
    pub local_addr: SocketAddr,
    pub routes: Vec<RouteId>,
}

#[derive(Debug, Default)]
pub struct Acceptor {
    listeners: HashMap<Token, Listener>,
    by_addr: HashMap<SocketAddr, Token>,
    route_tokens: HashMap<RouteId, Token>,
    paused: bool,
}

impl Acceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener for a server route, reusing an existing listener on
    /// the same address.
    pub fn bind(&mut self, poller: &mut Poller, route: &Route) -> io::Result<()> {
        if let Some(token) = self.by_addr.get(&route.local) {
            let listener = self
                .listeners
                .get_mut(token)
                .expect("listener table out of sync");
            listener.routes.push(route.id);
            self.route_tokens.insert(route.id, *token);
            debug!(addr = %listener.local_addr, route = %route.id, "route joined listener");
            return Ok(());
        }

        let listener = TcpListener::bind(route.local)?;
        let local_addr = listener.local_addr()?;
        let mut key = poller.alloc_key();
        if !self.paused {
            key.register_op(Ops::ACCEPT);
        }
        let token = key.token();
        info!(addr = %local_addr, route = %route.id, "listener bound");
        self.listeners.insert(
            token,
            Listener {
                listener,
                key,
                local_addr,
                routes: vec![route.id],
            },
        );
        self.by_addr.insert(route.local, token);
        self.route_tokens.insert(route.id, token);
        Ok(())
    }

    /// Detach a route; the listener is torn down once no route references it.
    pub fn unbind(&mut self, poller: &Poller, route_id: RouteId) {
        let Some(token) = self.route_tokens.remove(&route_id) else {
            return;
        };
        let Some(listener) = self.listeners.get_mut(&token) else {
            return;
        };
        listener.routes.retain(|id| *id != route_id);
        if listener.routes.is_empty() {
            let mut listener = self
                .listeners
                .remove(&token)
                .expect("listener table out of sync");
            poller.deregister(&mut listener.listener, &mut listener.key);
            self.by_addr.retain(|_, t| *t != token);
            info!(addr = %listener.local_addr, "listener unbound");
        }
    }

    /// Cancel accept interest on every listener (connection cap reached).
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            for listener in self.listeners.values_mut() {
                listener.key.clear_op(Ops::ACCEPT);
            }
            info!("listeners paused at connection cap");
        }
    }

    /// Re-arm accept interest after the connection count dropped below cap.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            for listener in self.listeners.values_mut() {
                listener.key.register_op(Ops::ACCEPT);
            }
            info!("listeners resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Listener> {
        self.listeners.get_mut(&token)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.listeners.contains_key(&token)
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.listeners.keys().copied().collect()
    }

    pub fn has_dispatchable(&self) -> bool {
        self.listeners
            .values()
            .any(|listener| !listener.key.dispatchable().is_empty())
    }

    pub fn sync_all(&mut self, poller: &Poller) -> io::Result<()> {
        for listener in self.listeners.values_mut() {
            poller.sync(&mut listener.listener, &mut listener.key)?;
        }
        Ok(())
    }

    /// Local address of the listener serving `route_id`, once bound. Routes
    /// configured with port 0 read their effective port from here.
    pub fn local_addr(&self, route_id: RouteId) -> Option<SocketAddr> {
        let token = self.route_tokens.get(&route_id)?;
        self.listeners.get(token).map(|l| l.local_addr)
    }
}
