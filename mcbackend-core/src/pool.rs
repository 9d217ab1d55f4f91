//! The minimal capability a [`Handler`] exposes so an external
//! connection pool can acquire, use, and discard it (§4.5 "Pool
//! contract"), plus the glue that lets a [`DialConfig`] act as a
//! [`deadpool`] manager for handlers.

use crate::conn::Connection;
use crate::error::Error;
use crate::handler::Handler;
use crate::protocol::{Request, Response};
use crate::stats::{NoopStats, Stats};
use async_trait::async_trait;
use deadpool::managed::{self, RecycleResult};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// The capability a pool needs from a pooled connection: execute a
/// request, close it, and check whether it's already closed. Kept as
/// a trait (rather than requiring `Handler<C>` directly) so a pool can
/// be written against this interface without naming the concrete
/// `Connection` binding.
#[async_trait]
pub trait Conn: Send {
    async fn handle(&mut self, req: &Request) -> Result<Response, Error>;
    fn close(&self) -> Result<(), Error>;
    fn is_closed(&self) -> bool;
}

#[async_trait]
impl<C: Connection> Conn for Handler<C> {
    async fn handle(&mut self, req: &Request) -> Result<Response, Error> {
        Handler::handle(self, req).await
    }

    fn close(&self) -> Result<(), Error> {
        Handler::close(self)
    }

    fn is_closed(&self) -> bool {
        Handler::is_closed(self)
    }
}

/// Per-dial configuration for one backend address (§6 "Configuration").
/// A zero-or-`None` timeout means "no deadline".
#[derive(Clone)]
pub struct DialConfig<C: Connection> {
    pub cluster: String,
    pub addr: String,
    pub dial_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub stats: Arc<dyn Stats>,
    _conn: PhantomData<fn() -> C>,
}

impl<C: Connection> DialConfig<C> {
    pub fn new(cluster: impl Into<String>, addr: impl Into<String>) -> Self {
        DialConfig {
            cluster: cluster.into(),
            addr: addr.into(),
            dial_timeout: None,
            read_timeout: None,
            write_timeout: None,
            stats: Arc::new(NoopStats),
            _conn: PhantomData,
        }
    }

    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn stats(mut self, stats: Arc<dyn Stats>) -> Self {
        self.stats = stats;
        self
    }
}

#[async_trait]
impl<C: Connection> managed::Manager<Handler<C>, Error> for DialConfig<C> {
    async fn create(&self) -> Result<Handler<C>, Error> {
        Handler::dial(
            self.cluster.clone(),
            self.addr.clone(),
            self.dial_timeout,
            self.read_timeout,
            self.write_timeout,
            self.stats.clone(),
        )
        .await
    }

    /// A handler poisoned by a prior I/O error (§3 invariant 4) closes
    /// itself only when told to; recycling is where the pool finds out
    /// and actually discards it instead of handing it back out.
    async fn recycle(&self, handler: &mut Handler<C>) -> RecycleResult<Error> {
        if handler.is_closed() {
            return Err(Error::Closed.into());
        }
        Ok(())
    }
}

/// A ready-to-use pool of handlers for one backend address.
pub type HandlerPool<C> = deadpool::managed::Pool<Handler<C>, Error>;
