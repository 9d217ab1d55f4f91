//! Buffered reading and writing over a [`Connection`](crate::Connection).
//!
//! This is deliberately a hand-rolled ring-buffer-ish reader rather than
//! something built on an executor's own buffered-I/O type, because the
//! handler needs two primitives no stock buffered reader gives you:
//! `read_until` that refills from the socket under a deadline, and
//! `read_exact` that does the same for a length known only at runtime
//! (the `<bytes>` field of a `VALUE` header). Both borrow out of the
//! same internal buffer, so a hit response with no embedded newlines in
//! its value never gets copied until the final chunk concatenation in
//! `protocol::wire`.

use crate::conn::Connection;
use crate::error::Error;
use std::time::Duration;

/// Default capacity of a [`FrameWriter`]'s buffer. Requests are short:
/// a command keyword, a key, and a handful of ASCII fields.
pub const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Default capacity of a [`FrameReader`]'s buffer. Responses can carry
/// large values, so this is sized generously to amortize syscalls.
pub const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Accumulates bytes for one request, then flushes them as a single
/// write.
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new(capacity: usize) -> Self {
        FrameWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append bytes to the pending write. Does not touch the socket.
    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drain the pending write to the connection under `timeout`,
    /// then clear the buffer for the next request.
    pub async fn flush<C: Connection>(
        &mut self,
        conn: &mut C,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        conn.write_all(&self.buf, timeout)
            .await
            .map_err(|e| e.restage("flush request"))?;
        self.buf.clear();
        Ok(())
    }
}

/// A growable read buffer that supports delimiter-based and
/// fixed-length reads, refilling from a [`Connection`] as needed.
///
/// `read_until` and `read_exact` both return a slice borrowed from the
/// internal buffer; the borrow must be consumed (copied out, or used
/// immediately) before the next call, since that call may move the
/// buffer's contents around or overwrite them.
pub struct FrameReader {
    buf: Vec<u8>,
    /// Start of the unconsumed region.
    pos: usize,
    /// End of the filled region (unconsumed + already-seen-but-not-yet-returned).
    filled: usize,
}

impl FrameReader {
    pub fn new(capacity: usize) -> Self {
        FrameReader {
            buf: vec![0; capacity],
            pos: 0,
            filled: 0,
        }
    }

    /// Return a slice from the current position up to and including
    /// the next `delim` byte, refilling from `conn` as needed. `stage`
    /// names the exchange step this read belongs to, for error context
    /// (e.g. `"read response bytes length"` for a `VALUE` header line,
    /// `"reread response bytes"` for a continuation line).
    pub async fn read_until<C: Connection>(
        &mut self,
        conn: &mut C,
        delim: u8,
        timeout: Option<Duration>,
        stage: &'static str,
    ) -> Result<&[u8], Error> {
        let mut scanned = self.pos;
        loop {
            if let Some(offset) = self.buf[scanned..self.filled].iter().position(|&b| b == delim) {
                let end = scanned + offset + 1;
                let start = self.pos;
                self.pos = end;
                return Ok(&self.buf[start..end]);
            }
            scanned = self.filled;
            self.fill(conn, timeout, stage).await?;
        }
    }

    /// Return a slice of exactly `n` bytes starting at the current
    /// position, refilling from `conn` as needed. See [`read_until`]
    /// for `stage`.
    pub async fn read_exact<C: Connection>(
        &mut self,
        conn: &mut C,
        n: usize,
        timeout: Option<Duration>,
        stage: &'static str,
    ) -> Result<&[u8], Error> {
        self.reserve(n);
        while self.filled - self.pos < n {
            self.fill(conn, timeout, stage).await?;
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..self.pos])
    }

    /// Make sure the buffer can hold `n` unconsumed bytes, compacting
    /// first so the unconsumed region starts at offset 0, then growing
    /// if the buffer's capacity still falls short. Large values (at or
    /// above the buffer's original capacity) grow the buffer rather
    /// than bouncing through a separate allocation, which keeps the
    /// read path a single code path regardless of value size.
    fn reserve(&mut self, n: usize) {
        self.compact();
        if self.buf.len() < n {
            self.buf.resize(n, 0);
        }
    }

    fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.buf.copy_within(self.pos..self.filled, 0);
        self.filled -= self.pos;
        self.pos = 0;
    }

    async fn fill<C: Connection>(
        &mut self,
        conn: &mut C,
        timeout: Option<Duration>,
        stage: &'static str,
    ) -> Result<(), Error> {
        if self.filled == self.buf.len() {
            self.compact();
            if self.filled == self.buf.len() {
                let grow_to = self.buf.len() * 2;
                self.buf.resize(grow_to, 0);
            }
        }
        let n = conn
            .read(&mut self.buf[self.filled..], timeout)
            .await
            .map_err(|e| e.restage(stage))?;
        if n == 0 {
            return Err(Error::io(
                stage,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed by peer"),
            ));
        }
        self.filled += n;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tests_support::ScriptedConn;

    #[tokio::test]
    async fn read_until_assembles_a_line_split_across_reads() {
        let mut conn = ScriptedConn::new(vec![b"VALUE k".to_vec(), b" 0 3\r".to_vec(), b"\nabc\r\n".to_vec()]);
        let mut reader = FrameReader::new(16);
        let line = reader.read_until(&mut conn, b'\n', None, "test").await.unwrap();
        assert_eq!(line, b"VALUE k 0 3\r\n");
    }

    #[tokio::test]
    async fn read_exact_grows_the_buffer_for_large_values() {
        let value = vec![b'x'; 200];
        let mut framed = value.clone();
        framed.extend_from_slice(b"\r\n");
        let mut conn = ScriptedConn::new(vec![framed[..100].to_vec(), framed[100..].to_vec()]);
        let mut reader = FrameReader::new(16);
        let got = reader.read_exact(&mut conn, framed.len(), None, "test").await.unwrap();
        assert_eq!(got, &framed[..]);
    }

    #[tokio::test]
    async fn read_until_then_read_exact_share_the_buffer() {
        let mut conn = ScriptedConn::new(vec![b"VALUE k 0 3\r\nabc\r\nEND\r\n".to_vec()]);
        let mut reader = FrameReader::new(16);
        let header = reader.read_until(&mut conn, b'\n', None, "test").await.unwrap().to_vec();
        assert_eq!(header, b"VALUE k 0 3\r\n");
        let payload = reader.read_exact(&mut conn, 5, None, "test").await.unwrap().to_vec();
        assert_eq!(payload, b"abc\r\n");
        let end = reader.read_until(&mut conn, b'\n', None, "test").await.unwrap();
        assert_eq!(end, b"END\r\n");
    }

    #[tokio::test]
    async fn read_until_surfaces_eof_as_an_io_error() {
        let mut conn = ScriptedConn::new(vec![b"no newline here".to_vec()]);
        let mut reader = FrameReader::new(16);
        let err = reader.read_until(&mut conn, b'\n', None, "test").await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn writer_buffers_until_flush() {
        let mut conn = ScriptedConn::new(vec![]);
        let mut writer = FrameWriter::new(WRITE_BUFFER_SIZE);
        writer.write(b"get ");
        writer.write(b"k\r\n");
        writer.flush(&mut conn, None).await.unwrap();
        assert_eq!(conn.written, b"get k\r\n");
    }
}
