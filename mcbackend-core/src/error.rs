use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

/// An error raised while a [`Handler`](crate::Handler) serializes a
/// request, reads a response, or manages its own lifecycle.
///
/// Every variant that wraps an I/O failure also carries a short, static
/// context string identifying the stage that failed (`"flush request"`,
/// `"read response bytes"`, ...) so a caller logging the error, or the
/// pool deciding whether to discard the handler, doesn't have to guess
/// where in the exchange things went wrong.
#[derive(Debug)]
pub enum Error {
    /// `Handle` was called on a handler that has already been closed.
    Closed,
    /// The request handed to `Handle` was not a memcached request.
    AssertRequest,
    /// The backend sent a response that doesn't parse as memcached
    /// ASCII framing (too few fields in a `VALUE` header, an unparsable
    /// length, ...).
    BadResponse(String),
    /// A read, write, flush, or dial failed, or its deadline elapsed.
    Io { stage: &'static str, source: io::Error },
}

impl Error {
    /// Wrap an I/O error with the stage that was in progress when it
    /// occurred.
    pub fn io(stage: &'static str, source: io::Error) -> Self {
        Error::Io { stage, source }
    }

    /// Build a deadline-exceeded I/O error for the given stage. Used by
    /// `Connection` implementations when their runtime's timeout future
    /// fires before the underlying read/write completes.
    pub fn timeout(stage: &'static str) -> Self {
        Error::Io {
            stage,
            source: io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded"),
        }
    }

    /// Re-tag an [`Error::Io`] with a more specific stage than whatever
    /// the underlying `Connection` attached — the connection only knows
    /// it did a read or a write, not whether that read was the `VALUE`
    /// header, the payload, or a continuation line. Every other variant
    /// passes through unchanged.
    pub fn restage(self, stage: &'static str) -> Self {
        match self {
            Error::Io { source, .. } => Error::Io { stage, source },
            other => other,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Error::Closed => write!(f, "handler is closed"),
            Error::AssertRequest => write!(f, "request payload is not a memcached request"),
            Error::BadResponse(msg) => write!(f, "bad response: {}", msg),
            Error::Io { stage, source } => write!(f, "{}: {}", stage, source),
        }
    }
}

/// A generically-staged conversion, for call sites where the `?`
/// operator is more natural than [`Error::io`] and the surrounding
/// context already makes the stage obvious from the log line above it.
impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { stage: "io", source }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
