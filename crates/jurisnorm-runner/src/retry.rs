//! Counting of postponed failures per record and escalation past the limit.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    count: u32,
    last_seen_at: DateTime<Utc>,
}

/// In-process postponed-failure counts, keyed by record.
#[derive(Debug, Default)]
pub struct FailureCounter {
    entries: HashMap<String, Entry>,
}

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more failure for `key` and return the new count.
    pub fn increment(&mut self, key: &str) -> u32 {
        let now = Utc::now();
        let entry = self.entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            last_seen_at: now,
        });
        entry.count += 1;
        entry.last_seen_at = now;
        entry.count
    }

    pub fn reset(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn count(&self, key: &str) -> u32 {
        self.entries.get(key).map_or(0, |e| e.count)
    }

    pub fn last_seen_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.last_seen_at)
    }
}

/// What to do after a postponed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Wait, then try the same record again.
    Retry { attempt: u32, delay: Duration },
    /// Give up: move the artifact to the failure store.
    Escalate { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct RetryController {
    policy: RetryPolicy,
    counter: FailureCounter,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            counter: FailureCounter::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn counter(&self) -> &FailureCounter {
        &self.counter
    }

    pub fn on_success(&mut self, key: &str) {
        self.counter.reset(key);
    }

    /// A generic failure ends the record, so its postponements are forgotten.
    pub fn on_blocked(&mut self, key: &str) {
        self.counter.reset(key);
    }

    /// Count a postponed failure. Escalating resets the count.
    pub fn on_postponed(&mut self, key: &str) -> Escalation {
        let attempts = self.counter.increment(key);
        if attempts >= self.policy.max_postponed {
            self.counter.reset(key);
            Escalation::Escalate { attempts }
        } else {
            Escalation::Retry {
                attempt: attempts,
                delay: self.policy.postpone_delay,
            }
        }
    }

    /// Pause after a generic failure.
    pub fn failure_delay(&self) -> Duration {
        self.policy.failure_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_postponement_escalates_and_resets() {
        let mut retry = RetryController::new(RetryPolicy::default());
        assert_eq!(
            retry.on_postponed("r1"),
            Escalation::Retry {
                attempt: 1,
                delay: Duration::from_secs(20)
            }
        );
        assert!(matches!(
            retry.on_postponed("r1"),
            Escalation::Retry { attempt: 2, .. }
        ));
        assert_eq!(retry.on_postponed("r1"), Escalation::Escalate { attempts: 3 });
        assert_eq!(retry.counter().count("r1"), 0);
    }

    #[test]
    fn success_resets_the_count() {
        let mut retry = RetryController::new(RetryPolicy::immediate());
        retry.on_postponed("r1");
        retry.on_postponed("r1");
        retry.on_success("r1");
        assert_eq!(retry.counter().count("r1"), 0);
        assert!(retry.counter().last_seen_at("r1").is_none());
        assert!(matches!(
            retry.on_postponed("r1"),
            Escalation::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn blocking_after_postponement_clears_the_entry() {
        let mut retry = RetryController::new(RetryPolicy::immediate());
        retry.on_postponed("r1");
        retry.on_postponed("r2");
        retry.on_blocked("r1");
        assert_eq!(retry.counter().count("r1"), 0);
        assert!(retry.counter().last_seen_at("r1").is_none());
        assert_eq!(retry.counter().count("r2"), 1);
    }

    #[test]
    fn keys_are_counted_separately() {
        let mut counter = FailureCounter::new();
        counter.increment("a");
        counter.increment("a");
        counter.increment("b");
        assert_eq!(counter.count("a"), 2);
        assert_eq!(counter.count("b"), 1);
        assert!(counter.last_seen_at("a").is_some());
    }
}
