//! Composite request throttle
//!
//! This module handles:
//! - Holding every quota rule that applies to the shared call stream
//! - Checking coarse (long-window) rules before fine ones
//! - Resetting all rules once the limiter has been idle past every window
//! - Serialising concurrent callers so a rule's count and window start move together

use crate::config::RateLimitEntry;
use crate::state::{RateRule, RuleSnapshot};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Limiter enforcing several independent quota rules on one call stream
///
/// `acquire` waits on each rule in descending order of window length, so a
/// caller that would violate a long-window quota is held back before it
/// consumes short-window capacity.
#[derive(Debug)]
pub struct RateLimiter {
    rules: Mutex<Vec<RateRule>>,
}

impl RateLimiter {
    /// Creates a limiter from a set of rules, in any order
    pub fn new(mut rules: Vec<RateRule>) -> Self {
        rules.sort_by(|a, b| b.window().cmp(&a.window()));
        Self {
            rules: Mutex::new(rules),
        }
    }

    /// Creates a limiter from configured `[[rate-limit]]` entries
    pub fn from_config(entries: &[RateLimitEntry]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|e| RateRule::new(e.limit, e.window()))
                .collect(),
        )
    }

    /// Waits until every rule grants one call
    ///
    /// Only one caller at a time makes progress; others queue on the lock.
    pub async fn acquire(&self) {
        let mut rules = self.rules.lock().await;

        let now = Instant::now();
        if rules.iter().all(|rule| rule.is_over(now)) {
            for rule in rules.iter_mut() {
                rule.reset();
            }
        }

        for rule in rules.iter_mut() {
            rule.acquire().await;
        }
    }

    /// Returns true if every rule is idle or past its window
    pub async fn is_over(&self) -> bool {
        let rules = self.rules.lock().await;
        let now = Instant::now();
        rules.iter().all(|rule| rule.is_over(now))
    }

    /// Clears every rule
    pub async fn reset(&self) {
        for rule in self.rules.lock().await.iter_mut() {
            rule.reset();
        }
    }

    /// Captures the consumption of every rule
    pub async fn snapshot(&self) -> Vec<RuleSnapshot> {
        self.rules
            .lock()
            .await
            .iter()
            .map(RateRule::snapshot)
            .collect()
    }

    /// Restores consumption for the rules matching a snapshot
    ///
    /// Rules without a matching snapshot (changed limit or window) start idle.
    /// Returns the number of rules restored.
    pub async fn restore(&self, snapshots: &[RuleSnapshot]) -> usize {
        let mut rules = self.rules.lock().await;
        let mut restored = 0;
        for rule in rules.iter_mut() {
            if let Some(snapshot) = snapshots
                .iter()
                .find(|s| s.limit == rule.limit() && s.window == rule.window())
            {
                if rule.restore(snapshot) {
                    restored += 1;
                }
            }
        }
        restored
    }

    /// (limit, window) of each rule, in evaluation order
    pub async fn describe(&self) -> Vec<(u32, std::time::Duration)> {
        self.rules
            .lock()
            .await
            .iter()
            .map(|rule| (rule.limit(), rule.window()))
            .collect()
    }
}
