//! Named monotonic counters.
//!
//! The registry hands out `Arc<AtomicU64>` slots by name so the embedder can
//! observe worker progress without touching worker state. Per-route counters
//! are created lazily on first use and removed on unroute.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::RouteId;

#[derive(Clone, Debug, Default)]
pub struct CounterRegistry {
    inner: Arc<Mutex<BTreeMap<String, Arc<AtomicU64>>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Arc<AtomicU64> {
        let mut counters = self.inner.lock().expect("counter registry lock poisoned");
        match counters.get(name) {
            Some(counter) => Arc::clone(counter),
            None => {
                let counter = Arc::new(AtomicU64::new(0));
                counters.insert(name.to_owned(), Arc::clone(&counter));
                counter
            }
        }
    }

    pub fn value(&self, name: &str) -> Option<u64> {
        self.inner
            .lock()
            .expect("counter registry lock poisoned")
            .get(name)
            .map(|counter| counter.load(Ordering::Relaxed))
    }

    pub fn remove(&self, name: &str) {
        self.inner
            .lock()
            .expect("counter registry lock poisoned")
            .remove(name);
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("counter registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

/// Counters of one route, cloned into each of its connections.
#[derive(Clone, Debug)]
pub struct TcpRouteCounters {
    pub frames_read: Arc<AtomicU64>,
    pub frames_wrote: Arc<AtomicU64>,
    pub bytes_read: Arc<AtomicU64>,
    pub bytes_wrote: Arc<AtomicU64>,
}

impl TcpRouteCounters {
    fn new(registry: &CounterRegistry, route_id: RouteId) -> Self {
        Self {
            frames_read: registry.counter(&format!("{route_id}.frames.read")),
            frames_wrote: registry.counter(&format!("{route_id}.frames.wrote")),
            bytes_read: registry.counter(&format!("{route_id}.bytes.read")),
            bytes_wrote: registry.counter(&format!("{route_id}.bytes.wrote")),
        }
    }
}

#[derive(Debug)]
pub struct TcpCounters {
    registry: CounterRegistry,
    pub overflows: Arc<AtomicU64>,
    pub connections_opened: Arc<AtomicU64>,
    pub connections_closed: Arc<AtomicU64>,
    per_route: HashMap<RouteId, TcpRouteCounters>,
}

impl TcpCounters {
    pub fn new(registry: CounterRegistry) -> Self {
        let overflows = registry.counter("overflows");
        let connections_opened = registry.counter("connections.opened");
        let connections_closed = registry.counter("connections.closed");
        Self {
            registry,
            overflows,
            connections_opened,
            connections_closed,
            per_route: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &CounterRegistry {
        &self.registry
    }

    pub fn route(&mut self, route_id: RouteId) -> &TcpRouteCounters {
        let registry = &self.registry;
        self.per_route
            .entry(route_id)
            .or_insert_with(|| TcpRouteCounters::new(registry, route_id))
    }

    pub fn remove_route(&mut self, route_id: RouteId) {
        self.per_route.remove(&route_id);
        for suffix in ["frames.read", "frames.wrote", "bytes.read", "bytes.wrote"] {
            self.registry.remove(&format!("{route_id}.{suffix}"));
        }
    }
}
