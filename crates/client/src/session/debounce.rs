// Asymmetric debouncer for the "has unsynced changes" signal.
//
// A rise (no changes -> changes) takes effect only after the delay, so single
// keystrokes never flash a dirty status. A fall takes effect immediately, so
// "saved" feedback is never delayed. A fall before the delay elapses cancels
// the pending rise.

use std::time::Duration;

use tokio::time::Instant;

/// Default delay before a rise takes effect.
pub const DEFAULT_UNSYNCED_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct UnsyncedDebouncer {
    delay: Duration,
    effective: bool,
    rising_since: Option<Instant>,
}

impl UnsyncedDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, effective: false, rising_since: None }
    }

    /// The debounced value.
    pub fn effective(&self) -> bool {
        self.effective
    }

    /// Record a raw value. Returns the new debounced value if it changed now.
    pub fn push(&mut self, raw: bool) -> Option<bool> {
        self.push_at(raw, Instant::now())
    }

    /// Like `push` but with a specific timestamp (for testing).
    pub(crate) fn push_at(&mut self, raw: bool, now: Instant) -> Option<bool> {
        if raw {
            // Repeated rises keep the original timer.
            if !self.effective && self.rising_since.is_none() {
                self.rising_since = Some(now);
            }
            return None;
        }

        self.rising_since = None;
        if self.effective {
            self.effective = false;
            return Some(false);
        }
        None
    }

    /// Promote a pending rise whose delay has elapsed.
    pub fn poll(&mut self) -> Option<bool> {
        self.poll_at(Instant::now())
    }

    /// Like `poll` but with a specific timestamp (for testing).
    pub(crate) fn poll_at(&mut self, now: Instant) -> Option<bool> {
        let since = self.rising_since?;
        if now.duration_since(since) < self.delay {
            return None;
        }
        self.rising_since = None;
        self.effective = true;
        Some(true)
    }

    /// When the pending rise becomes effective, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.rising_since.map(|since| since + self.delay)
    }

    /// Drop any pending rise (teardown).
    pub fn cancel(&mut self) {
        self.rising_since = None;
    }
}

impl Default for UnsyncedDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_UNSYNCED_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    // ── Rising edge ────────────────────────────────────────────────

    #[test]
    fn rise_is_delayed() {
        let mut debouncer = UnsyncedDebouncer::default();
        let now = Instant::now();

        assert_eq!(debouncer.push_at(true, now), None);
        assert!(!debouncer.effective());
        assert_eq!(debouncer.poll_at(now + ms(499)), None);
        assert_eq!(debouncer.poll_at(now + ms(500)), Some(true));
        assert!(debouncer.effective());
    }

    #[test]
    fn repeated_rises_do_not_reset_the_timer() {
        let mut debouncer = UnsyncedDebouncer::default();
        let now = Instant::now();

        debouncer.push_at(true, now);
        debouncer.push_at(true, now + ms(300));
        debouncer.push_at(true, now + ms(450));
        assert_eq!(debouncer.next_deadline(), Some(now + ms(500)));
        assert_eq!(debouncer.poll_at(now + ms(500)), Some(true));
    }

    #[test]
    fn rise_while_effective_is_a_no_op() {
        let mut debouncer = UnsyncedDebouncer::default();
        let now = Instant::now();

        debouncer.push_at(true, now);
        debouncer.poll_at(now + ms(500));
        assert_eq!(debouncer.push_at(true, now + ms(600)), None);
        assert!(debouncer.next_deadline().is_none());
        assert!(debouncer.effective());
    }

    // ── Falling edge ───────────────────────────────────────────────

    #[test]
    fn fall_is_immediate() {
        let mut debouncer = UnsyncedDebouncer::default();
        let now = Instant::now();

        debouncer.push_at(true, now);
        debouncer.poll_at(now + ms(500));
        assert_eq!(debouncer.push_at(false, now + ms(501)), Some(false));
        assert!(!debouncer.effective());
    }

    #[test]
    fn fall_within_delay_never_surfaces_a_rise() {
        let mut debouncer = UnsyncedDebouncer::default();
        let now = Instant::now();

        debouncer.push_at(true, now);
        assert_eq!(debouncer.push_at(false, now + ms(100)), None);
        assert_eq!(debouncer.poll_at(now + ms(1_000)), None);
        assert!(!debouncer.effective());
        assert!(debouncer.next_deadline().is_none());
    }

    #[test]
    fn fall_while_clean_is_a_no_op() {
        let mut debouncer = UnsyncedDebouncer::default();
        assert_eq!(debouncer.push_at(false, Instant::now()), None);
    }

    // ── Teardown ───────────────────────────────────────────────────

    #[test]
    fn cancel_drops_pending_rise() {
        let mut debouncer = UnsyncedDebouncer::default();
        let now = Instant::now();

        debouncer.push_at(true, now);
        debouncer.cancel();
        assert!(debouncer.next_deadline().is_none());
        assert_eq!(debouncer.poll_at(now + ms(10_000)), None);
    }

    #[test]
    fn custom_delay_respected() {
        let mut debouncer = UnsyncedDebouncer::new(ms(50));
        let now = Instant::now();

        debouncer.push_at(true, now);
        assert_eq!(debouncer.poll_at(now + ms(49)), None);
        assert_eq!(debouncer.poll_at(now + ms(50)), Some(true));
    }
}
