use crate::pl1000::PicoStatus;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Wait between attempts; doubled after each failed attempt.
    pub cooldown: Duration,
    /// Consecutive `PICO_NOT_FOUND` statuses before an attempt, and failed attempts before
    /// the session is given up.
    pub count: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown: Duration::from_secs(10),
            count: 3,
        }
    }
}

/// Bookkeeping for automatic reconnects after the unit drops off the bus.
#[derive(Debug)]
pub struct ReconnectTracker {
    policy: ReconnectPolicy,
    not_found: u32,
    failures: u32,
    cooldown: Duration,
    last_attempt: Option<Instant>,
}

impl ReconnectTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            not_found: 0,
            failures: 0,
            cooldown: policy.cooldown,
            last_attempt: None,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ReconnectPolicy) {
        self.policy = policy;
        self.cooldown = policy.cooldown;
    }

    /// Feed the outcome of a device call.
    pub fn observe(&mut self, status: Result<(), PicoStatus>) {
        match status {
            Err(PicoStatus::NotFound) => self.not_found += 1,
            Ok(()) => self.not_found = 0,
            Err(_) => (),
        }
    }

    pub fn not_found_count(&self) -> u32 {
        self.not_found
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// True when an attempt should be made now.
    pub fn due(&self, now: Instant) -> bool {
        if !self.policy.enabled || self.exhausted() {
            return false;
        }
        if self.not_found < self.policy.count.max(1) {
            return false;
        }
        match self.last_attempt {
            Some(at) => now.duration_since(at) >= self.cooldown,
            None => true,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.failures >= self.policy.count.max(1)
    }

    pub fn record_attempt(&mut self, now: Instant, success: bool) {
        self.last_attempt = Some(now);
        if success {
            self.not_found = 0;
            self.failures = 0;
            self.cooldown = self.policy.cooldown;
        } else {
            self.failures += 1;
            self.cooldown = self.cooldown.saturating_mul(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            cooldown: Duration::from_millis(100),
            count: 2,
        }
    }

    #[test]
    fn needs_consecutive_not_found() {
        let mut t = ReconnectTracker::new(policy());
        let now = Instant::now();
        t.observe(Err(PicoStatus::NotFound));
        assert!(!t.due(now));
        t.observe(Ok(()));
        t.observe(Err(PicoStatus::NotFound));
        assert!(!t.due(now));
        t.observe(Err(PicoStatus::NotFound));
        assert!(t.due(now));
    }

    #[test]
    fn other_errors_do_not_count() {
        let mut t = ReconnectTracker::new(policy());
        t.observe(Err(PicoStatus::Busy));
        t.observe(Err(PicoStatus::Busy));
        assert_eq!(t.not_found_count(), 0);
    }

    #[test]
    fn failure_extends_cooldown_and_gives_up() {
        let mut t = ReconnectTracker::new(policy());
        let start = Instant::now();
        t.observe(Err(PicoStatus::NotFound));
        t.observe(Err(PicoStatus::NotFound));
        t.record_attempt(start, false);
        assert_eq!(t.cooldown(), Duration::from_millis(200));
        assert!(!t.due(start + Duration::from_millis(150)));
        assert!(t.due(start + Duration::from_millis(250)));
        t.record_attempt(start, false);
        assert!(t.exhausted());
        assert!(!t.due(start + Duration::from_secs(60)));
    }

    #[test]
    fn success_resets() {
        let mut t = ReconnectTracker::new(policy());
        let now = Instant::now();
        t.observe(Err(PicoStatus::NotFound));
        t.observe(Err(PicoStatus::NotFound));
        t.record_attempt(now, false);
        t.record_attempt(now, true);
        assert_eq!(t.failures(), 0);
        assert_eq!(t.not_found_count(), 0);
        assert_eq!(t.cooldown(), Duration::from_millis(100));
    }

    #[test]
    fn disabled_never_due() {
        let mut t = ReconnectTracker::new(ReconnectPolicy::default());
        for _ in 0..10 {
            t.observe(Err(PicoStatus::NotFound));
        }
        assert!(!t.due(Instant::now()));
    }
}
