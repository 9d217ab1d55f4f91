//! Owns one backend connection and executes one request/response
//! exchange at a time (§4.4).

use crate::conn::Connection;
use crate::error::Error;
use crate::io::{FrameReader, FrameWriter, READ_BUFFER_SIZE, WRITE_BUFFER_SIZE};
use crate::protocol::{read_response, write_request, Request, Response};
use crate::stats::Stats;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A handler's identity and deadlines, fixed for its whole lifetime.
struct Identity {
    cluster: String,
    addr: String,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

/// A cloneable handle that can close a [`Handler`]'s backend connection
/// from another task while a [`Handler::handle`] call is still blocked
/// on it (§4.4 "Close", §5 "Cancellation").
///
/// `Handler::handle` takes `&mut self` for the whole exchange, so no
/// second reference — shared or exclusive — to that `Handler` can exist
/// while a call is in flight; nothing reachable through the `Handler`
/// itself could ever satisfy "a caller wishing to abort a hung exchange
/// must `Close` the handler" (`spec.md` §5) concurrently with that
/// exchange. A `Canceller` sidesteps this by holding its own clone of
/// the connection, obtained up front via [`Handler::canceller`] — before
/// the blocking call starts — and an `Arc`-shared closed flag, so its
/// `close` reaches the socket through a path that never borrows the
/// `Handler` at all.
pub struct Canceller<C: Connection> {
    conn: C,
    closed: Arc<AtomicBool>,
}

impl<C: Connection> Canceller<C> {
    /// Shut down the connection. Idempotent, and safe to call while a
    /// [`Handler::handle`] call on the handler this was cloned from is
    /// still blocked on the socket; that call observes the shutdown as
    /// an I/O error and returns it to its own caller (§5 "Cancellation").
    pub fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.conn.close()
    }

    /// Whether [`close`](Canceller::close) has already run, on this
    /// handle or on the [`Handler`] (or another `Canceller`) it shares
    /// its closed flag with.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<C: Connection> Clone for Canceller<C> {
    fn clone(&self) -> Self {
        Canceller {
            conn: self.conn.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

/// Owns exactly one backend TCP connection plus its read/write buffers
/// (§3 "Handler"). Created by [`Handler::dial`], mutated only by
/// [`Handler::handle`] and [`Handler::close`].
///
/// The closed flag lives behind the `Arc` inside `canceller` rather than
/// as a plain field, so it can be shared with [`Canceller`] handles
/// vended by [`Handler::canceller`] and observed/flipped from outside
/// whatever borrow `handle()` currently holds (§4.4, §5 "Cancellation").
pub struct Handler<C: Connection> {
    conn: C,
    reader: FrameReader,
    writer: FrameWriter,
    canceller: Canceller<C>,
    identity: Identity,
    stats: Arc<dyn Stats>,
}

impl<C: Connection> Handler<C> {
    /// Dial a new backend connection and wrap it in a `Handler`. This is
    /// the factory an external pool calls when it needs a new member
    /// (§4.5).
    pub async fn dial(
        cluster: impl Into<String>,
        addr: impl Into<String>,
        dial_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
        stats: Arc<dyn Stats>,
    ) -> Result<Self, Error> {
        let addr = addr.into();
        let conn = C::connect(&addr, dial_timeout)
            .await
            .map_err(|e| e.restage("dial"))?;
        debug!("dialed backend {}", addr);
        let canceller = Canceller {
            conn: conn.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        };
        Ok(Handler {
            conn,
            reader: FrameReader::new(READ_BUFFER_SIZE),
            writer: FrameWriter::new(WRITE_BUFFER_SIZE),
            canceller,
            identity: Identity {
                cluster: cluster.into(),
                addr,
                read_timeout,
                write_timeout,
            },
            stats,
        })
    }

    /// Execute one request/response exchange (§4.4 "Handle(req) contract").
    ///
    /// Requires exclusive access to the handler; callers (the pool) are
    /// responsible for serializing calls (invariant 1, §3). A caller
    /// that wants to be able to abort this call while it's blocked must
    /// have obtained a [`Canceller`] via [`Handler::canceller`] first.
    pub async fn handle(&mut self, req: &Request) -> Result<Response, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        debug!(
            "handling {:?} request (key len {}) against {}",
            req.kind,
            req.key.len(),
            self.identity.addr
        );

        write_request(&mut self.writer, req);
        let result = self.exchange(req).await;

        match result {
            Err(ref err @ Error::Io { .. }) | Err(ref err @ Error::BadResponse(_)) => {
                warn!(
                    "handle failed against {} ({}): {}",
                    self.identity.addr, self.identity.cluster, err
                );
            }
            _ => {}
        }
        result
    }

    async fn exchange(&mut self, req: &Request) -> Result<Response, Error> {
        self.writer.flush(&mut self.conn, self.identity.write_timeout).await?;
        read_response(
            &mut self.reader,
            &mut self.conn,
            req.kind,
            self.identity.read_timeout,
            self.stats.as_ref(),
            &self.identity.cluster,
            &self.identity.addr,
        )
        .await
    }

    /// A cloneable handle that can [`close`](Canceller::close) this
    /// handler's connection from another task, including while a
    /// [`handle`](Handler::handle) call is still blocked on it. Obtain
    /// this before starting a call you might need to abort — once
    /// `handle()` is blocked, nothing can reach the `Handler` itself to
    /// ask for one.
    pub fn canceller(&self) -> Canceller<C> {
        self.canceller.clone()
    }

    /// Shut down the socket. Idempotent: the first call (on the
    /// `Handler` or on any [`Canceller`] sharing its closed flag)
    /// performs the atomic `Open` → `Closed` transition and invokes
    /// [`Connection::close`]; every call after that is a no-op that
    /// returns `Ok(())` (§4.4 "Close").
    pub fn close(&self) -> Result<(), Error> {
        if self.canceller.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("closing backend {}", self.identity.addr);
        self.canceller.conn.close()
    }

    /// Whether [`close`](Handler::close) has already run, on this
    /// handler or on a [`Canceller`] obtained from it.
    pub fn is_closed(&self) -> bool {
        self.canceller.is_closed()
    }
}
