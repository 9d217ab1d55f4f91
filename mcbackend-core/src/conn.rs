use crate::error::Error;
use async_trait::async_trait;
use std::time::Duration;

/// A raw, runtime-agnostic TCP connection to a single memcached backend.
///
/// Concrete implementations bind this to a particular async runtime
/// (see `mcbackend-tokio::TokioConnection`); [`Handler`](crate::Handler)
/// builds the buffered read/write primitives and the wire protocol on
/// top of these three operations without knowing which runtime is
/// underneath.
///
/// `Connection` is `Clone` for the same reason the teacher's own
/// `Connection` trait is: [`Handler::handle`](crate::Handler::handle)
/// takes `&mut self` for the whole exchange, so nothing else can reach
/// the handler while a call is blocked on the socket. The only way to
/// honor §5's cancellation contract ("a caller wishing to abort a hung
/// exchange must `Close` the handler" while that exchange is still
/// in flight) is for a [`Canceller`](crate::handler::Canceller) to hold
/// an independent clone of the same underlying connection, obtained
/// before the blocking call starts, so its `close` can reach the socket
/// through a path that never borrows the `Handler` itself.
#[async_trait]
pub trait Connection: Clone + Send + Sync + Sized + 'static {
    /// Open a TCP connection to `addr`, failing if it doesn't complete
    /// within `timeout` (`None` means wait indefinitely).
    async fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self, Error>;

    /// Read at least one and at most `buf.len()` bytes into `buf`,
    /// returning the number of bytes read. A return value of `0`
    /// indicates the peer closed the connection (EOF). Fails if no
    /// bytes arrive within `timeout`.
    async fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, Error>;

    /// Write the entirety of `buf`, failing if it doesn't complete
    /// within `timeout`.
    async fn write_all(&mut self, buf: &[u8], timeout: Option<Duration>) -> Result<(), Error>;

    /// Shut down the socket. Safe to call on a clone of the connection
    /// a `read`/`write_all` call is currently blocked on — this is what
    /// lets a [`Canceller`](crate::handler::Canceller) unstick a hung
    /// `Handle` call from outside the exclusive `&mut` borrow that call
    /// holds on the `Handler`'s own copy.
    fn close(&self) -> Result<(), Error>;
}
