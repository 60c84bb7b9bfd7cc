//! Readiness selector wrapper.
//!
//! `mio` delivers edge-triggered readiness; the worker's dispatch contract is
//! level-triggered, one dispatch per ready key per tick. `PollerKey` bridges
//! the two with sticky ready bits: an op stays dispatchable across ticks
//! until the handler observes `WouldBlock` and clears it. Interest mutations
//! are recorded on the key and applied by `sync` between ticks, so a handler
//! always runs against the interest set it was dispatched with.

use std::io;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

/// Readiness operation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ops(u8);

impl Ops {
    pub const NONE: Ops = Ops(0);
    pub const READ: Ops = Ops(1);
    pub const WRITE: Ops = Ops(2);
    pub const ACCEPT: Ops = Ops::READ;
    pub const CONNECT: Ops = Ops::WRITE;

    pub fn contains(self, other: Ops) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn intersects(self, other: Ops) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn insert(&mut self, other: Ops) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: Ops) {
        self.0 &= !other.0;
    }

    fn and(self, other: Ops) -> Ops {
        Ops(self.0 & other.0)
    }

    fn to_interest(self) -> Option<Interest> {
        match (self.contains(Ops::READ), self.contains(Ops::WRITE)) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

impl BitOr for Ops {
    type Output = Ops;

    fn bitor(self, rhs: Ops) -> Ops {
        Ops(self.0 | rhs.0)
    }
}

impl BitOrAssign for Ops {
    fn bitor_assign(&mut self, rhs: Ops) {
        self.0 |= rhs.0;
    }
}

/// Registration handle for one channel.
#[derive(Debug)]
pub struct PollerKey {
    token: Token,
    interest: Ops,
    registered: Option<Ops>,
    ready: Ops,
}

impl PollerKey {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Add interest in `op`; takes effect at the next sync.
    pub fn register_op(&mut self, op: Ops) {
        self.interest.insert(op);
    }

    /// Drop interest in `op`, keeping any latched readiness.
    pub fn clear_op(&mut self, op: Ops) {
        self.interest.remove(op);
    }

    /// Drop interest in `op` and discard its latched readiness.
    pub fn cancel_op(&mut self, op: Ops) {
        self.interest.remove(op);
        self.ready.remove(op);
    }

    pub fn mark_ready(&mut self, ops: Ops) {
        self.ready.insert(ops);
    }

    /// Called by a handler that observed `WouldBlock` for `op`.
    pub fn clear_ready(&mut self, op: Ops) {
        self.ready.remove(op);
    }

    /// Ops that are both wanted and ready.
    pub fn dispatchable(&self) -> Ops {
        self.interest.and(self.ready)
    }
}

pub struct Poller {
    poll: Poll,
    events: Events,
    next_token: usize,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(256),
            next_token: 0,
        })
    }

    /// Allocate a key for a channel. The channel is registered with the OS
    /// selector on the first sync that finds a non-empty interest set.
    pub fn alloc_key(&mut self) -> PollerKey {
        let token = Token(self.next_token);
        self.next_token += 1;
        PollerKey {
            token,
            interest: Ops::NONE,
            registered: None,
            ready: Ops::NONE,
        }
    }

    /// Apply any pending interest change for `key` to the OS selector.
    pub fn sync<S: Source>(&self, source: &mut S, key: &mut PollerKey) -> io::Result<()> {
        let wanted = key.interest.to_interest();
        let current = key.registered.and_then(Ops::to_interest);
        match (current, wanted) {
            (None, Some(interest)) => {
                self.poll.registry().register(source, key.token, interest)?;
            }
            (Some(current), Some(interest)) if current != interest => {
                self.poll
                    .registry()
                    .reregister(source, key.token, interest)?;
            }
            (Some(_), None) => {
                self.poll.registry().deregister(source)?;
            }
            _ => {}
        }
        key.registered = if wanted.is_some() {
            Some(key.interest)
        } else {
            None
        };
        Ok(())
    }

    pub fn deregister<S: Source>(&self, source: &mut S, key: &mut PollerKey) {
        if key.registered.take().is_some() {
            let _ = self.poll.registry().deregister(source);
        }
    }

    /// Poll the OS selector once and collect `(token, ops)` readiness.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<(Token, Ops)>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(err) => return Err(err),
        }
        let mut out = Vec::with_capacity(self.events.iter().count());
        for event in self.events.iter() {
            let mut ops = Ops::NONE;
            if event.is_readable() || event.is_read_closed() {
                ops |= Ops::READ;
            }
            if event.is_writable() || event.is_write_closed() || event.is_error() {
                ops |= Ops::WRITE;
            }
            if !ops.is_empty() {
                out.push((event.token(), ops));
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("next_token", &self.next_token)
            .finish()
    }
}
