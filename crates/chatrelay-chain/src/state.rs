//! Per-connection chat state built around the signature chain.

use chatrelay_protocol::{LastSeenMessages, MessageSignature, Timestamp};

use crate::{ChainError, SignatureChain};

/// Default number of standalone acknowledgements kept back from the
/// backend before any are forwarded.
pub const DEFAULT_DELAYED_ACK_FLOOR: u32 = LastSeenMessages::WINDOW_SIZE as u32;

/// Chat state for one connection.
///
/// Owned by the connection's drain task and only touched while a queued
/// item is being turned into a packet, so it needs no locking of its own.
///
/// ## Standalone acknowledgements
///
/// Clients acknowledge messages they've seen even when they aren't
/// chatting. Forwarding each of those would be chatty, and the backend
/// only needs them before its own window overflows. So they are held back:
///
/// ```text
///   held = held + count
///   if held - floor >= WINDOW_SIZE:
///       forward (held - floor), held = floor
/// ```
///
/// Whatever is still held back rides along with the next chat or command
/// packet as extra offset.
#[derive(Debug, Clone)]
pub struct ChatState {
    chain: SignatureChain,
    last_timestamp: Timestamp,
    last_seen: Vec<MessageSignature>,
    delayed_ack_floor: u32,
}

impl ChatState {
    /// Creates the state for a new connection.
    pub fn new(delayed_ack_floor: u32) -> Self {
        Self {
            chain: SignatureChain::new(),
            last_timestamp: Timestamp::EPOCH,
            last_seen: Vec::new(),
            delayed_ack_floor,
        }
    }

    /// The signature chain.
    pub fn chain(&self) -> &SignatureChain {
        &self.chain
    }

    /// Mutable access to the signature chain.
    pub fn chain_mut(&mut self) -> &mut SignatureChain {
        &mut self.chain
    }

    /// Newest timestamp seen on this connection.
    pub fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }

    /// Records a drained item's timestamp and window entries.
    ///
    /// The timestamp never moves backwards: packets built by the proxy use
    /// it and the backend rejects chat that is older than what it has seen.
    pub fn observe(
        &mut self,
        timestamp: Timestamp,
        window: Option<&LastSeenMessages>,
    ) {
        if timestamp > self.last_timestamp {
            self.last_timestamp = timestamp;
        }
        if let Some(window) = window {
            self.last_seen.clone_from(&window.acknowledged);
        }
    }

    /// The window as it should be forwarded: the client's offset plus any
    /// acknowledgements the relay is still holding back.
    pub fn effective_window(
        &self,
        window: &LastSeenMessages,
    ) -> LastSeenMessages {
        window.with_offset(window.offset.saturating_add(self.chain.pending()))
    }

    /// Commits a window that is about to be sent: the chain advances by its
    /// offset and the held-back advance is cleared (it is included in the
    /// offset of a window built by [`Self::effective_window`]).
    ///
    /// # Errors
    /// Propagates `ChainError::Regression` from the chain.
    pub fn commit_window(
        &mut self,
        window: &LastSeenMessages,
    ) -> Result<u64, ChainError> {
        let offset = self.chain.advance_by(window.offset)?;
        self.chain.take_pending();
        Ok(offset)
    }

    /// Accounts for a standalone client acknowledgement.
    ///
    /// Returns `Some(count)` when `count` acknowledgements should be
    /// forwarded now, after advancing the chain by that amount. Returns
    /// `None` when everything is held back.
    ///
    /// # Errors
    /// Propagates `ChainError::Regression` from the chain.
    pub fn accumulate_ack(
        &mut self,
        count: u32,
    ) -> Result<Option<u32>, ChainError> {
        let held = self.chain.hold_back(count);
        let excess = held.saturating_sub(self.delayed_ack_floor);
        if excess < LastSeenMessages::WINDOW_SIZE as u32 {
            tracing::trace!(held, "acknowledgement held back");
            return Ok(None);
        }
        // The remainder after forwarding never drops below the floor, so
        // the client's and the backend's windows never need shifting.
        self.chain.set_pending(self.delayed_ack_floor);
        self.chain.advance_by(excess)?;
        tracing::debug!(forwarded = excess, "forwarding held-back acknowledgements");
        Ok(Some(excess))
    }

    /// A window for a packet the proxy creates itself: the last entries the
    /// client acknowledged and no new offset.
    pub fn create_last_seen(&self) -> LastSeenMessages {
        LastSeenMessages::new(0, self.last_seen.clone())
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new(DEFAULT_DELAYED_ACK_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(byte: u8) -> MessageSignature {
        MessageSignature(vec![byte])
    }

    #[test]
    fn test_observe_keeps_newest_timestamp() {
        let mut state = ChatState::default();
        state.observe(Timestamp(100), None);
        state.observe(Timestamp(50), None);
        assert_eq!(state.last_timestamp(), Timestamp(100));
        state.observe(Timestamp(150), None);
        assert_eq!(state.last_timestamp(), Timestamp(150));
    }

    #[test]
    fn test_observe_records_last_seen_entries() {
        let mut state = ChatState::default();
        let window = LastSeenMessages::new(3, vec![sig(1), sig(2)]);
        state.observe(Timestamp(1), Some(&window));

        let created = state.create_last_seen();
        assert_eq!(created.offset, 0);
        assert_eq!(created.acknowledged, vec![sig(1), sig(2)]);
    }

    #[test]
    fn test_effective_window_adds_pending() {
        let mut state = ChatState::default();
        state.chain_mut().hold_back(4);
        let window = LastSeenMessages::new(2, vec![sig(1)]);
        let effective = state.effective_window(&window);
        assert_eq!(effective.offset, 6);
        assert_eq!(effective.acknowledged, window.acknowledged);
    }

    #[test]
    fn test_commit_window_advances_and_clears_pending() {
        let mut state = ChatState::default();
        state.chain_mut().hold_back(4);
        let effective =
            state.effective_window(&LastSeenMessages::new(1, vec![]));
        assert_eq!(state.commit_window(&effective).unwrap(), 5);
        assert_eq!(state.chain().current_offset(), 5);
        assert_eq!(state.chain().pending(), 0);
    }

    #[test]
    fn test_accumulate_ack_holds_back_below_threshold() {
        let mut state = ChatState::new(20);
        // 20 floor + 19 below window size: nothing forwarded.
        assert_eq!(state.accumulate_ack(39).unwrap(), None);
        assert_eq!(state.chain().pending(), 39);
        assert_eq!(state.chain().current_offset(), 0);
    }

    #[test]
    fn test_accumulate_ack_forwards_excess_and_keeps_floor() {
        let mut state = ChatState::new(20);
        assert_eq!(state.accumulate_ack(30).unwrap(), None);
        assert_eq!(state.accumulate_ack(15).unwrap(), Some(25));
        assert_eq!(state.chain().current_offset(), 25);
        assert_eq!(state.chain().pending(), 20);
    }

    #[test]
    fn test_accumulate_ack_zero_floor() {
        let mut state = ChatState::new(0);
        assert_eq!(state.accumulate_ack(19).unwrap(), None);
        assert_eq!(state.accumulate_ack(1).unwrap(), Some(20));
        assert_eq!(state.chain().pending(), 0);
    }
}
