use super::RequestKind;
use bytes::Bytes;

/// Keys longer than this are rejected by real memcached servers. The
/// handler does not enforce this itself — per §3 the key is expected to
/// already be validated (non-empty, no interior spaces, within this
/// length) by the frontend parser before it ever reaches [`Request`].
pub const MAX_KEY_LEN: usize = 250;

/// A single memcached ASCII request, already shaped the way the wire
/// codec (`protocol::wire`) expects to write it: `key` is the bare key
/// bytes, and `data` is the command-specific trailing bytes described
/// in §3 (already carrying any separators and the terminating `\r\n`
/// the codec doesn't add itself).
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: RequestKind,
    pub key: Bytes,
    pub data: Bytes,
}

impl Request {
    /// Look up a value. Misses come back as `END\r\n`, hits as a single
    /// `VALUE ... END` block.
    pub fn get(key: impl Into<Bytes>) -> Self {
        Request {
            kind: RequestKind::Get,
            key: key.into(),
            data: Bytes::from_static(b"\r\n"),
        }
    }

    /// Look up a value, with the cas token included in the response
    /// `VALUE` header.
    pub fn gets(key: impl Into<Bytes>) -> Self {
        Request {
            kind: RequestKind::Gets,
            key: key.into(),
            data: Bytes::from_static(b"\r\n"),
        }
    }

    /// Look up a value and update its expiration time in one round
    /// trip. `data` holds only the `exptime` digits; the codec inserts
    /// the spaces and the key around it (§4.2 step 3).
    pub fn gat(key: impl Into<Bytes>, exptime: u32) -> Self {
        Request {
            kind: RequestKind::Gat,
            key: key.into(),
            data: Bytes::from(exptime.to_string()),
        }
    }

    /// Like [`Request::gat`], with the cas token in the response.
    pub fn gats(key: impl Into<Bytes>, exptime: u32) -> Self {
        Request {
            kind: RequestKind::Gats,
            key: key.into(),
            data: Bytes::from(exptime.to_string()),
        }
    }

    // The codec writes `key` then `data` back to back with no space of
    // its own (§4.2 step 4), so every non-empty trailing-argument list
    // below starts with its own leading space.
    fn storage(kind: RequestKind, key: impl Into<Bytes>, flags: u32, exptime: u32, value: &[u8]) -> Self {
        let mut data = format!(" {} {} {}\r\n", flags, exptime, value.len()).into_bytes();
        data.extend_from_slice(value);
        data.extend_from_slice(b"\r\n");
        Request {
            kind,
            key: key.into(),
            data: Bytes::from(data),
        }
    }

    /// Store a value unconditionally, overwriting any existing value.
    pub fn set(key: impl Into<Bytes>, flags: u32, exptime: u32, value: &[u8]) -> Self {
        Self::storage(RequestKind::Set, key, flags, exptime, value)
    }

    /// Store a value only if the key does not already exist.
    pub fn add(key: impl Into<Bytes>, flags: u32, exptime: u32, value: &[u8]) -> Self {
        Self::storage(RequestKind::Add, key, flags, exptime, value)
    }

    /// Store a value only if the key already exists.
    pub fn replace(key: impl Into<Bytes>, flags: u32, exptime: u32, value: &[u8]) -> Self {
        Self::storage(RequestKind::Replace, key, flags, exptime, value)
    }

    /// Append bytes to an existing value.
    pub fn append(key: impl Into<Bytes>, value: &[u8]) -> Self {
        Self::storage(RequestKind::Append, key, 0, 0, value)
    }

    /// Prepend bytes to an existing value.
    pub fn prepend(key: impl Into<Bytes>, value: &[u8]) -> Self {
        Self::storage(RequestKind::Prepend, key, 0, 0, value)
    }

    /// Store a value only if its current cas token matches `cas`.
    pub fn cas(key: impl Into<Bytes>, flags: u32, exptime: u32, value: &[u8], cas: u64) -> Self {
        let mut data = format!(" {} {} {} {}\r\n", flags, exptime, value.len(), cas).into_bytes();
        data.extend_from_slice(value);
        data.extend_from_slice(b"\r\n");
        Request {
            kind: RequestKind::Cas,
            key: key.into(),
            data: Bytes::from(data),
        }
    }

    /// Delete a key. A no-op (`NOT_FOUND`) if it isn't set.
    pub fn delete(key: impl Into<Bytes>) -> Self {
        Request {
            kind: RequestKind::Delete,
            key: key.into(),
            data: Bytes::from_static(b"\r\n"),
        }
    }

    /// Increment a numeric value by `delta`.
    pub fn incr(key: impl Into<Bytes>, delta: u64) -> Self {
        Request {
            kind: RequestKind::Incr,
            key: key.into(),
            data: Bytes::from(format!(" {}\r\n", delta)),
        }
    }

    /// Decrement a numeric value by `delta`, floored at zero.
    pub fn decr(key: impl Into<Bytes>, delta: u64) -> Self {
        Request {
            kind: RequestKind::Decr,
            key: key.into(),
            data: Bytes::from(format!(" {}\r\n", delta)),
        }
    }

    /// Update a key's expiration time without fetching its value.
    pub fn touch(key: impl Into<Bytes>, exptime: u32) -> Self {
        Request {
            kind: RequestKind::Touch,
            key: key.into(),
            data: Bytes::from(format!(" {}\r\n", exptime)),
        }
    }
}
