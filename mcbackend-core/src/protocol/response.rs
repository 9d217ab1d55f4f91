use super::RequestKind;
use bytes::Bytes;

/// A memcached ASCII response: the command kind it answers, and the
/// full wire bytes of the reply (§3), already self-framed — ending in
/// `\r\n`, and in `END\r\n` for retrieval responses.
#[derive(Debug, Clone)]
pub struct Response {
    pub kind: RequestKind,
    pub data: Bytes,
}

impl Response {
    /// Whether a retrieval response found at least one value (begins
    /// with a `VALUE ` header rather than being a bare `END\r\n`).
    pub fn is_hit(&self) -> bool {
        self.data.starts_with(b"VALUE ")
    }

    /// Whether a retrieval response was a miss (`END\r\n` with no
    /// preceding `VALUE` header).
    pub fn is_miss(&self) -> bool {
        &self.data[..] == b"END\r\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_are_distinguished_by_the_leading_token() {
        let hit = Response {
            kind: RequestKind::Get,
            data: Bytes::from_static(b"VALUE k 0 3\r\nabc\r\nEND\r\n"),
        };
        assert!(hit.is_hit());
        assert!(!hit.is_miss());

        let miss = Response {
            kind: RequestKind::Get,
            data: Bytes::from_static(b"END\r\n"),
        };
        assert!(miss.is_miss());
        assert!(!miss.is_hit());
    }
}
