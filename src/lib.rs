#![forbid(unsafe_code)]

pub mod acceptor;
pub mod conduit;
pub mod config;
pub mod connector;
pub mod counters;
pub mod error;
pub mod layout;
pub mod poller;
pub mod ring;
pub mod route;
pub mod stream;
pub mod types;
pub mod worker;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the embedder-facing surface at the crate root.
pub use conduit::{ControlConduits, MessageReader, MessageWriter, StreamsConduit, TargetConduits};
pub use config::TcpConfig;
pub use counters::CounterRegistry;
pub use layout::Layout;
pub use ring::RingBuffer;
pub use types::{CorrelationId, Role, RouteId, StreamId};
pub use worker::{TcpWorker, WorkerHandle};
