//! Correlation registry: orders sent but not yet answered.
//!
//! Owned exclusively by the dispatcher thread, so a plain map suffices. An
//! entry exists from just before transmission until the matching response
//! arrives or the send fails locally.

use std::time::Instant;

use ahash::AHashMap;
use et_core::error::EtError;
use et_core::token::CorrelationToken;
use et_core::types::OrderRequest;

/// One in-flight order.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub request: OrderRequest,
    /// When the entry was registered; used for acknowledgement latency.
    pub registered_at: Instant,
}

impl PendingOrder {
    pub fn new(request: OrderRequest) -> Self {
        Self { request, registered_at: Instant::now() }
    }
}

/// Token → in-flight order.
///
/// # Thread safety
///
/// Not thread-safe. The dispatcher thread owns the only instance.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    entries: AHashMap<CorrelationToken, PendingOrder>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token`. A token that is already present is refused and the
    /// existing entry is left untouched.
    pub fn insert(&mut self, token: CorrelationToken, pending: PendingOrder) -> Result<(), EtError> {
        if self.entries.contains_key(&token) {
            return Err(EtError::Registry(token));
        }
        self.entries.insert(token, pending);
        Ok(())
    }

    /// Remove and return the entry for `token`. Absent tokens are a no-op.
    #[inline]
    pub fn remove(&mut self, token: CorrelationToken) -> Option<PendingOrder> {
        self.entries.remove(&token)
    }

    pub fn get(&self, token: CorrelationToken) -> Option<&PendingOrder> {
        self.entries.get(&token)
    }

    pub fn contains(&self, token: CorrelationToken) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered tokens in ascending order.
    pub fn tokens(&self) -> Vec<CorrelationToken> {
        let mut tokens: Vec<_> = self.entries.keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }
}

#[cfg(test)]
mod tests {
    use et_core::config::OrderDefaults;
    use et_core::types::{InstrumentConfig, PricePoint, Quote, Side};

    use super::*;

    fn order() -> OrderRequest {
        let cfg = InstrumentConfig::new("IBM US Equity", 100, PricePoint::Bid, PricePoint::Ask).unwrap();
        OrderRequest::priced_from(Side::Buy, &cfg, Quote { bid: 1.0, ask: 2.0 }, &OrderDefaults::default())
    }

    #[test]
    fn insert_and_remove() {
        let mut reg = CorrelationRegistry::new();
        reg.insert(CorrelationToken(7), PendingOrder::new(order())).unwrap();
        assert!(reg.contains(CorrelationToken(7)));
        assert_eq!(reg.len(), 1);

        let removed = reg.remove(CorrelationToken(7)).unwrap();
        assert_eq!(removed.request.side, Side::Buy);
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_token_refused() {
        let mut reg = CorrelationRegistry::new();
        reg.insert(CorrelationToken(1), PendingOrder::new(order())).unwrap();
        let err = reg.insert(CorrelationToken(1), PendingOrder::new(order())).unwrap_err();
        assert!(matches!(err, EtError::Registry(CorrelationToken(1))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn removing_unknown_token_changes_nothing() {
        let mut reg = CorrelationRegistry::new();
        reg.insert(CorrelationToken(3), PendingOrder::new(order())).unwrap();
        assert!(reg.remove(CorrelationToken(99)).is_none());
        assert!(reg.remove(CorrelationToken(99)).is_none());
        assert_eq!(reg.tokens(), vec![CorrelationToken(3)]);
    }
}
