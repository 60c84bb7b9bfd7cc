//! Route table: configured mappings from network addresses to targets.

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use crate::types::{Role, RouteAddressExt, RouteCommand, RouteId};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {0} is not configured")]
    UnknownRoute(RouteId),
    #[error("route extension does not carry an address")]
    MissingAddress,
    #[error("client route requires a remote address")]
    MissingRemoteAddress,
    #[error("route {route} is not a {expected:?} route")]
    RoleMismatch { route: RouteId, expected: Role },
}

#[derive(Debug, Clone)]
pub struct Route {
    pub id: RouteId,
    pub role: Role,
    pub local: SocketAddr,
    pub remote: Option<SocketAddr>,
    pub target: String,
    pub authorization: u64,
}

impl Route {
    /// Whether this route accepts a connection from `peer`.
    pub fn matches_remote(&self, peer: SocketAddr) -> bool {
        match self.remote {
            None => true,
            Some(filter) => {
                filter.ip() == peer.ip() && (filter.port() == 0 || filter.port() == peer.port())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<RouteId, Route>,
    next_id: u64,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register the route described by a ROUTE command, assigning its id.
    pub fn insert(&mut self, command: &RouteCommand) -> Result<&Route, RouteError> {
        let address = RouteAddressExt::decode(&command.extension)
            .map_err(|_| RouteError::MissingAddress)?;
        if command.role == Role::Client && address.remote.is_none() {
            return Err(RouteError::MissingRemoteAddress);
        }

        let id = RouteId(self.next_id);
        self.next_id += 1;
        let route = Route {
            id,
            role: command.role,
            local: address.local,
            remote: address.remote,
            target: command.target_name.clone(),
            authorization: command.authorization,
        };
        Ok(self.routes.entry(id).or_insert(route))
    }

    pub fn remove(&mut self, id: RouteId) -> Result<Route, RouteError> {
        self.routes.remove(&id).ok_or(RouteError::UnknownRoute(id))
    }

    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub fn client(&self, id: RouteId) -> Result<&Route, RouteError> {
        let route = self.get(id).ok_or(RouteError::UnknownRoute(id))?;
        if route.role != Role::Client {
            return Err(RouteError::RoleMismatch {
                route: id,
                expected: Role::Client,
            });
        }
        Ok(route)
    }

    /// Pick the route for an accepted connection, preferring an exact remote
    /// filter over a wildcard.
    pub fn match_accept<'a>(
        &'a self,
        candidates: &[RouteId],
        peer: SocketAddr,
    ) -> Option<&'a Route> {
        let mut wildcard = None;
        for id in candidates {
            let Some(route) = self.routes.get(id) else {
                continue;
            };
            if !route.matches_remote(peer) {
                continue;
            }
            if route.remote.is_some() {
                return Some(route);
            }
            wildcard.get_or_insert(route);
        }
        wildcard
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
