//! Per-subscriber delivery cursors.
//!
//! A cursor is the last ledger version known to have been handed to a
//! subscriber's transport. `None` means the subscriber was never
//! synchronized and must be sent a snapshot.

use std::collections::{BTreeSet, HashMap};

use crate::transport::SubscriberId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CursorEntry {
    last_sent: Option<u64>,
    /// Consecutive failed sends.
    failures: u32,
    /// First tick at which a send may be attempted again.
    retry_at: u64,
}

/// Tracks delivery cursors and failure backoff per subscriber.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    entries: HashMap<SubscriberId, CursorEntry>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last version delivered to `subscriber`, `None` if never synchronized.
    pub fn cursor_of(&self, subscriber: &str) -> Option<u64> {
        self.entries.get(subscriber).and_then(|e| e.last_sent)
    }

    /// Record that `version` was delivered to `subscriber`.
    ///
    /// Cursors only move forward: a version at or behind the current cursor
    /// is rejected and `false` is returned. A successful advance also clears
    /// the subscriber's failure backoff.
    pub fn advance(&mut self, subscriber: &str, version: u64) -> bool {
        let entry = self.entries.entry(subscriber.to_string()).or_default();
        if entry.last_sent.is_some_and(|current| version <= current) {
            return false;
        }
        entry.last_sent = Some(version);
        entry.failures = 0;
        entry.retry_at = 0;
        true
    }

    /// Set the cursor unconditionally, e.g. after a snapshot replaced
    /// everything the subscriber held.
    pub fn reset(&mut self, subscriber: &str, version: u64) {
        let entry = self.entries.entry(subscriber.to_string()).or_default();
        entry.last_sent = Some(version);
        entry.failures = 0;
        entry.retry_at = 0;
    }

    /// Drop a subscriber's cursor. Idempotent.
    pub fn forget(&mut self, subscriber: &str) {
        self.entries.remove(subscriber);
    }

    /// Drop every cursor whose subscriber is not in `active`.
    ///
    /// Returns the number of cursors removed.
    pub fn prune_missing(&mut self, active: &BTreeSet<SubscriberId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| active.contains(id));
        before - self.entries.len()
    }

    /// Record a failed send at `tick` and schedule the next attempt.
    ///
    /// After `f` consecutive failures the next attempt is made
    /// `min(2^(f-1), max_backoff_ticks)` ticks later, so the first retry is
    /// always on the following tick. `max_backoff_ticks == 0` disables
    /// backoff entirely.
    ///
    /// Returns the consecutive failure count.
    pub fn record_failure(&mut self, subscriber: &str, tick: u64, max_backoff_ticks: u64) -> u32 {
        let entry = self.entries.entry(subscriber.to_string()).or_default();
        entry.failures = entry.failures.saturating_add(1);

        let delay = if max_backoff_ticks == 0 {
            1
        } else {
            let exp = (entry.failures - 1).min(63);
            (1u64 << exp).min(max_backoff_ticks).max(1)
        };
        entry.retry_at = tick.saturating_add(delay);
        entry.failures
    }

    /// Whether `subscriber` must sit out `tick` because of earlier failures.
    pub fn is_backed_off(&self, subscriber: &str, tick: u64) -> bool {
        self.entries
            .get(subscriber)
            .is_some_and(|e| e.failures > 0 && tick < e.retry_at)
    }

    /// Consecutive failed sends for `subscriber`.
    pub fn failures(&self, subscriber: &str) -> u32 {
        self.entries.get(subscriber).map_or(0, |e| e.failures)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_subscriber_has_no_cursor() {
        let registry = CursorRegistry::new();
        assert_eq!(registry.cursor_of("x"), None);
    }

    #[test]
    fn advance_only_moves_forward() {
        let mut registry = CursorRegistry::new();
        assert!(registry.advance("x", 0));
        assert!(registry.advance("x", 3));
        assert!(!registry.advance("x", 3));
        assert!(!registry.advance("x", 2));
        assert_eq!(registry.cursor_of("x"), Some(3));
    }

    #[test]
    fn reset_may_move_backwards() {
        let mut registry = CursorRegistry::new();
        registry.advance("x", 9);
        registry.reset("x", 4);
        assert_eq!(registry.cursor_of("x"), Some(4));
    }

    #[test]
    fn forget_is_idempotent() {
        let mut registry = CursorRegistry::new();
        registry.advance("x", 1);
        registry.forget("x");
        registry.forget("x");
        assert_eq!(registry.cursor_of("x"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn prune_keeps_only_active() {
        let mut registry = CursorRegistry::new();
        registry.advance("a", 1);
        registry.advance("b", 1);
        registry.advance("c", 1);

        let active: BTreeSet<SubscriberId> = ["a".to_string(), "c".to_string()].into();
        assert_eq!(registry.prune_missing(&active), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.cursor_of("b"), None);
    }

    #[test]
    fn first_failure_retries_next_tick() {
        let mut registry = CursorRegistry::new();
        registry.record_failure("x", 10, 32);
        assert!(!registry.is_backed_off("x", 11));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let mut registry = CursorRegistry::new();
        registry.record_failure("x", 0, 4); // retry at 1
        registry.record_failure("x", 1, 4); // retry at 3
        assert!(registry.is_backed_off("x", 2));
        assert!(!registry.is_backed_off("x", 3));

        registry.record_failure("x", 3, 4); // retry at 7
        registry.record_failure("x", 7, 4); // capped: retry at 11
        assert_eq!(registry.failures("x"), 4);
        assert!(registry.is_backed_off("x", 10));
        assert!(!registry.is_backed_off("x", 11));
    }

    #[test]
    fn zero_max_disables_backoff() {
        let mut registry = CursorRegistry::new();
        for tick in 0..10 {
            registry.record_failure("x", tick, 0);
            assert!(!registry.is_backed_off("x", tick + 1));
        }
    }

    #[test]
    fn failure_keeps_cursor_and_success_clears_backoff() {
        let mut registry = CursorRegistry::new();
        registry.advance("x", 5);
        registry.record_failure("x", 0, 8);
        registry.record_failure("x", 1, 8);
        assert_eq!(registry.cursor_of("x"), Some(5));

        assert!(registry.advance("x", 6));
        assert_eq!(registry.failures("x"), 0);
        assert!(!registry.is_backed_off("x", 2));
    }
}
