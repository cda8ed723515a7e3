//! Correlation tokens.
//!
//! Every subscription and every outbound request carries a token that the
//! gateway echoes on the matching events. Tokens are plain integers on the
//! wire; [`TokenSource`] hands them out from a single process-wide counter so
//! a value is never issued twice, whether it ends up tagging a long-lived
//! subscription or a one-shot order request.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier attached to a request or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(pub u64);

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic token allocator, safe to share between the event loop and the
/// dispatcher thread.
#[derive(Debug)]
pub struct TokenSource {
    next: AtomicU64,
}

impl TokenSource {
    /// Create a source whose first token is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    /// Allocate the next unused token.
    #[inline]
    pub fn next_token(&self) -> CorrelationToken {
        CorrelationToken(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn tokens_are_sequential() {
        let src = TokenSource::starting_at(100);
        assert_eq!(src.next_token(), CorrelationToken(100));
        assert_eq!(src.next_token(), CorrelationToken(101));
    }

    #[test]
    fn tokens_unique_across_threads() {
        let src = Arc::new(TokenSource::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let src = Arc::clone(&src);
                std::thread::spawn(move || (0..1000).map(|_| src.next_token()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<CorrelationToken> =
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 4000);
    }

    #[test]
    fn display_and_wire_format() {
        let t = CorrelationToken(42);
        assert_eq!(t.to_string(), "#42");
        assert_eq!(serde_json::to_string(&t).unwrap(), "42");
    }
}
