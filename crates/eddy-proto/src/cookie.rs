//! Version cookie handed out by the server on every pull.

use serde::{Deserialize, Serialize};

/// A monotonically increasing version number.
///
/// A cookie of `n` means "I have seen patches `0..n`". `Cookie::ZERO`
/// asks the server for everything.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cookie(pub u64);

impl Cookie {
    /// The cookie of a client that has seen nothing.
    pub const ZERO: Cookie = Cookie(0);

    #[inline]
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// The log index this cookie points just past.
    #[inline]
    #[must_use]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Cookie {
    #[inline]
    fn from(n: u64) -> Self {
        Cookie(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(Cookie::ZERO, Cookie(0));
        assert_eq!(Cookie::default(), Cookie::ZERO);
    }

    #[test]
    fn test_ordering_is_monotonic() {
        assert!(Cookie(1) < Cookie(2));
        assert!(Cookie(2) <= Cookie(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Cookie(42).to_string(), "42");
    }

    #[test]
    fn test_serde_transparent() {
        let encoded = serde_json::to_string(&Cookie(7)).unwrap();
        assert_eq!(encoded, "7");
        let decoded: Cookie = serde_json::from_str("7").unwrap();
        assert_eq!(decoded, Cookie(7));
    }
}
