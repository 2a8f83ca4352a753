//! The acknowledged offset and the advance held back from the backend.

use crate::ChainError;

/// Per-connection acknowledgement counter.
///
/// `acknowledged` is the running total of last-seen entries the relay has
/// acknowledged towards the backend. It only ever grows:
///
/// ```text
///   advance_to(n)  with n >= current  →  current = n
///   advance_to(n)  with n <  current  →  ChainError::Regression
/// ```
///
/// `pending` is advance the relay owes the backend but has not sent yet
/// (standalone client acknowledgements below the forwarding threshold).
/// It is folded into the next packet that carries an offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureChain {
    acknowledged: u64,
    pending: u32,
}

impl SignatureChain {
    /// A fresh chain for a new connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The offset acknowledged so far.
    pub fn current_offset(&self) -> u64 {
        self.acknowledged
    }

    /// Advance owed to the backend but not yet sent.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Moves the acknowledged offset forward to `offset`.
    ///
    /// Equal offsets are accepted (no-op).
    ///
    /// # Errors
    /// Returns `ChainError::Regression` if `offset` is below the current
    /// offset. The value is never clamped: a regression means the relay
    /// has lost track of the chain.
    pub fn advance_to(&mut self, offset: u64) -> Result<(), ChainError> {
        if offset < self.acknowledged {
            return Err(ChainError::Regression {
                current: self.acknowledged,
                requested: offset,
            });
        }
        tracing::trace!(from = self.acknowledged, to = offset, "chain advanced");
        self.acknowledged = offset;
        Ok(())
    }

    /// Moves the acknowledged offset forward by `delta` and returns the
    /// new offset.
    pub fn advance_by(&mut self, delta: u32) -> Result<u64, ChainError> {
        let target = self.acknowledged.saturating_add(u64::from(delta));
        self.advance_to(target)?;
        Ok(target)
    }

    /// Adds `count` to the held-back advance and returns the new total.
    pub fn hold_back(&mut self, count: u32) -> u32 {
        self.pending = self.pending.saturating_add(count);
        self.pending
    }

    /// Overwrites the held-back advance.
    pub(crate) fn set_pending(&mut self, pending: u32) {
        self.pending = pending;
    }

    /// Clears the held-back advance and returns what it was.
    pub fn take_pending(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chain_starts_at_zero() {
        let chain = SignatureChain::new();
        assert_eq!(chain.current_offset(), 0);
        assert_eq!(chain.pending(), 0);
    }

    #[test]
    fn test_advance_to_is_monotonic() {
        let mut chain = SignatureChain::new();
        chain.advance_to(5).unwrap();
        chain.advance_to(5).unwrap();
        chain.advance_to(9).unwrap();
        assert_eq!(chain.current_offset(), 9);
    }

    #[test]
    fn test_advance_to_backwards_is_regression() {
        let mut chain = SignatureChain::new();
        chain.advance_to(7).unwrap();
        let err = chain.advance_to(6).unwrap_err();
        assert_eq!(
            err,
            ChainError::Regression {
                current: 7,
                requested: 6
            }
        );
        // Not clamped: the offset stays where it was.
        assert_eq!(chain.current_offset(), 7);
    }

    #[test]
    fn test_advance_by_accumulates() {
        let mut chain = SignatureChain::new();
        assert_eq!(chain.advance_by(3).unwrap(), 3);
        assert_eq!(chain.advance_by(0).unwrap(), 3);
        assert_eq!(chain.advance_by(4).unwrap(), 7);
    }

    #[test]
    fn test_hold_back_and_take_pending() {
        let mut chain = SignatureChain::new();
        assert_eq!(chain.hold_back(2), 2);
        assert_eq!(chain.hold_back(3), 5);
        // Holding back does not touch the acknowledged offset.
        assert_eq!(chain.current_offset(), 0);
        assert_eq!(chain.take_pending(), 5);
        assert_eq!(chain.pending(), 0);
    }
}
