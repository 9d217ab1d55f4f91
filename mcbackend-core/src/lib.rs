//! This crate implements the backend-side half of a memcached ASCII
//! protocol proxy: a [`Handler`](handler::Handler) that owns one pooled
//! connection to a single memcached node, speaks the wire protocol over
//! it, and reassembles `VALUE ... END` responses without unnecessary
//! copies.
//!
//! The handler itself is runtime-agnostic: it is generic over a
//! [`Connection`](conn::Connection) trait implemented once per async
//! runtime (see the sibling `mcbackend-tokio` crate for the tokio
//! binding). Everything else a proxy needs — the consistent-hash ring
//! that picks a backend for a key, the frontend parser, the dispatching
//! proxy loop, and the stats sink's storage backend — lives outside this
//! crate; only the interfaces they share with the handler are defined
//! here ([`pool`], [`stats`]).

pub mod conn;
pub mod error;
pub mod handler;
pub mod io;
pub mod pool;
pub mod protocol;
pub mod stats;

pub use conn::Connection;
pub use error::Error;
pub use handler::{Canceller, Handler};
pub use pool::{Conn, DialConfig, HandlerPool};
pub use protocol::{Request, RequestKind, Response};
pub use stats::{NoopStats, Stats};
