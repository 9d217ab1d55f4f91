//! The tokio binding for [`mcbackend_core::Connection`]: a TCP socket
//! read and written through tokio's I/O traits, with per-call deadlines
//! enforced by `tokio::time::timeout` and a socket-level shutdown that
//! works from a shared reference so it can unstick a blocked read or
//! write from outside the exclusive borrow that call holds.

use async_trait::async_trait;
use mcbackend_core::{Connection, Error};
use socket2::SockRef;
use std::net::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub use mcbackend_core::{Canceller, DialConfig, Handler, HandlerPool, Request, RequestKind, Response};

/// A pool of handlers bound to the tokio runtime, for one backend
/// address. Build one per `(cluster, addr)` pair a proxy talks to.
pub type Pool = HandlerPool<TokioConnection>;

/// A [`Connection`] backed by a tokio [`TcpStream`].
///
/// The stream is wrapped in an `Arc` rather than the `Arc<Mutex<_>>`
/// this corpus otherwise reaches for, because nothing here needs
/// mutual exclusion between reads and writes: a [`Handler`] already
/// guarantees at most one in-flight exchange (serialize-then-flush-
/// then-read), and `TcpStream`'s own `AsyncRead`/`AsyncWrite` impls for
/// `&TcpStream` make concurrent read/write safe at the socket level
/// regardless. The `Arc` exists purely so [`close`](Connection::close)
/// can reach the socket through a shared reference.
#[derive(Clone)]
pub struct TokioConnection {
    stream: Arc<TcpStream>,
}

async fn with_deadline<T>(
    timeout: Option<Duration>,
    stage: &'static str,
    fut: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<T, Error> {
    match timeout {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| Error::timeout(stage))?
            .map_err(|e| Error::io(stage, e)),
        None => fut.await.map_err(|e| Error::io(stage, e)),
    }
}

#[async_trait]
impl Connection for TokioConnection {
    async fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self, Error> {
        let stream = with_deadline(timeout, "dial", TcpStream::connect(addr)).await?;
        Ok(TokioConnection {
            stream: Arc::new(stream),
        })
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, Error> {
        with_deadline(timeout, "read", (&*self.stream).read(buf)).await
    }

    async fn write_all(&mut self, buf: &[u8], timeout: Option<Duration>) -> Result<(), Error> {
        with_deadline(timeout, "write", (&*self.stream).write_all(buf)).await
    }

    fn close(&self) -> Result<(), Error> {
        SockRef::from(&*self.stream)
            .shutdown(Shutdown::Both)
            .or_else(|e| match e.kind() {
                // Already shut down or never fully connected; not an error
                // from the caller's perspective.
                std::io::ErrorKind::NotConnected => Ok(()),
                _ => Err(e),
            })
            .map_err(|e| Error::io("close", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbackend_core::stats::NoopStats;
    use rand::Rng;
    use std::sync::Arc as StdArc;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TokioConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server, _) = listener.accept().await.unwrap();
        let client = client.await.unwrap();
        (
            TokioConnection {
                stream: StdArc::new(client),
            },
            server,
        )
    }

    #[tokio::test]
    async fn writes_reach_the_peer_and_reads_see_them() {
        let (mut conn, mut server) = loopback_pair().await;
        conn.write_all(b"get k\r\n", None).await.unwrap();

        let mut got = vec![0u8; 7];
        server.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, b"get k\r\n");

        server.write_all(b"END\r\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = conn.read(&mut buf, None).await.unwrap();
        assert_eq!(&buf[..n], b"END\r\n");
    }

    #[tokio::test]
    async fn close_unblocks_a_pending_read() {
        let (conn, _server) = loopback_pair().await;
        let mut reader = conn.clone();
        let closer = conn.clone();

        let read = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            reader.read(&mut buf, None).await
        });

        tokio::task::yield_now().await;
        closer.close().unwrap();

        let result = read.await.unwrap();
        // A shutdown socket surfaces either a clean EOF (read() returns
        // Ok(0), which bubbles up through FrameReader only — the bare
        // Connection::read contract allows Ok(0) — or an explicit error)
        // depending on platform; either is an acceptable unstick.
        match result {
            Ok(n) => assert_eq!(n, 0),
            Err(_) => {}
        }
    }

    #[tokio::test]
    async fn dial_fails_fast_against_a_closed_port() {
        // Bind and immediately drop, freeing the port but leaving nothing
        // listening on it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = TokioConnection::connect(&addr.to_string(), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn canceller_unblocks_a_handle_call_blocked_on_the_wire() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });

        let mut handler: Handler<TokioConnection> =
            Handler::dial("c", &addr, Some(Duration::from_secs(2)), None, None, StdArc::new(NoopStats))
                .await
                .unwrap();
        // Obtained before handle() ever starts: once it's blocked on the
        // socket, nothing can reach the Handler itself to ask for one.
        let canceller = handler.canceller();
        // Hold the server side open so the client's read blocks on a live
        // connection rather than an immediate EOF from an unaccepted peer.
        let _peer = accept.await.unwrap();

        let call = tokio::spawn(async move { handler.handle(&Request::get("k")).await });

        tokio::task::yield_now().await;
        canceller.close().unwrap();

        let result = call.await.unwrap();
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn handle_times_out_waiting_for_a_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Read the request off the wire, then go silent forever.
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
            std::future::pending::<()>().await;
        });

        let mut handler: Handler<TokioConnection> = Handler::dial(
            "c",
            &addr,
            Some(Duration::from_secs(2)),
            Some(Duration::from_millis(100)),
            Some(Duration::from_secs(2)),
            StdArc::new(NoopStats),
        )
        .await
        .unwrap();

        let err = handler.handle(&Request::get("absent")).await.unwrap_err();
        match err {
            Error::Io { stage, source } => {
                assert!(matches!(stage, "read response bytes length" | "read response bytes"));
                assert_eq!(source.kind(), std::io::ErrorKind::TimedOut);
            }
            other => panic!("expected a timed-out IO error, got {:?}", other),
        }

        accept.abort();
    }

    /// Spins up a throwaway `memcached` container on a random loopback
    /// port, the same way `rsmc-tokio`'s own integration tests do, so
    /// concurrent test binaries never fight over a fixed port.
    struct MemcachedTester {
        name: String,
        proc: std::process::Child,
    }

    impl MemcachedTester {
        fn new(port: u16) -> Self {
            let name = format!("mcbackend_test_memcached_{}", port);
            let mut proc = std::process::Command::new("docker")
                .args([
                    "run",
                    "--rm",
                    "-t",
                    "--name",
                    &name,
                    "-p",
                    &format!("{}:11211", port),
                    "memcached",
                    "memcached",
                    "-vv",
                ])
                .stdout(std::process::Stdio::piped())
                .spawn()
                .unwrap();

            let stdout = proc.stdout.as_mut().unwrap();
            let mut reader = std::io::BufReader::new(stdout);
            let mut line = String::new();
            std::io::BufRead::read_line(&mut reader, &mut line).unwrap();

            MemcachedTester { name, proc }
        }
    }

    impl Drop for MemcachedTester {
        fn drop(&mut self) {
            let _ = std::process::Command::new("docker").args(["stop", &self.name]).output();
            let _ = self.proc.wait();
        }
    }

    #[tokio::test]
    #[ignore = "spawns a docker memcached container; not run in this exercise's environment"]
    async fn handler_round_trips_against_a_real_memcached() {
        let _ = env_logger::try_init();
        let port = rand::thread_rng().gen_range(30000..40000);
        let _tester = MemcachedTester::new(port);
        let addr = format!("127.0.0.1:{}", port);

        let mut handler: Handler<TokioConnection> = Handler::dial(
            "c",
            &addr,
            Some(Duration::from_secs(5)),
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(2)),
            StdArc::new(NoopStats),
        )
        .await
        .unwrap();

        let stored = handler.handle(&Request::set("itest", 0, 0, b"value")).await.unwrap();
        assert_eq!(&stored.data[..], b"STORED\r\n");

        let got = handler.handle(&Request::get("itest")).await.unwrap();
        assert!(got.is_hit());
        assert_eq!(&got.data[..], b"VALUE itest 0 5\r\nvalue\r\nEND\r\n");

        handler.close().unwrap();
        let err = handler.handle(&Request::get("itest")).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }
}
