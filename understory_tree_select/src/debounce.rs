// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trailing-edge debouncing of search input.
//!
//! The host supplies timestamps in milliseconds, the same way pointer event
//! helpers receive them, and polls with [`Debouncer::poll`] from its timer or
//! frame loop. Nothing here reads a clock.

/// Quiet period before a typed search query is applied, in milliseconds.
pub const INPUT_DEBOUNCE_DELAY_MS: u64 = 200;

/// Holds the latest scheduled value until it has been quiet for the delay.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay_ms: u64,
    pending: Option<(T, u64)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(INPUT_DEBOUNCE_DELAY_MS)
    }
}

impl<T> Debouncer<T> {
    /// Creates a debouncer with the given quiet period.
    #[must_use]
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    /// Replaces any pending value and restarts the quiet period at `now_ms`.
    pub fn schedule(&mut self, value: T, now_ms: u64) {
        self.pending = Some((value, now_ms.saturating_add(self.delay_ms)));
    }

    /// Takes the pending value once its quiet period has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now_ms >= *due => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Drops the pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Returns `true` while a value is waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes due.
    #[must_use]
    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|(_, due)| *due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_last_value_fires_after_quiet_period() {
        let mut d = Debouncer::default();
        d.schedule("a", 1000);
        d.schedule("ab", 1100);
        assert_eq!(d.poll(1250), None);
        assert_eq!(d.deadline(), Some(1300));
        assert_eq!(d.poll(1300), Some("ab"));
        assert_eq!(d.poll(2000), None);
        assert!(!d.is_pending());
    }

    #[test]
    fn cancel_drops_pending_value() {
        let mut d = Debouncer::new(50);
        d.schedule(1, 0);
        assert!(d.is_pending());
        d.cancel();
        assert_eq!(d.poll(100), None);
    }
}
