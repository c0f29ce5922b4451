use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// One quota rule: at most `limit` calls per `window`
///
/// This structure tracks the consumption of the current window. A window
/// opens with the first call after the rule was idle; once `limit` calls
/// have been made, the next caller is suspended until the window ends and
/// then opens a fresh one.
#[derive(Debug, Clone)]
pub struct RateRule {
    /// Calls permitted per window
    limit: u32,

    /// Length of a window
    window: Duration,

    /// Calls consumed in the current window
    count: u32,

    /// Start of the current window, `None` while idle
    window_start: Option<Instant>,
}

/// Serializable form of a rule's consumption, stored in the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub limit: u32,
    pub window: Duration,
    pub count: u32,
    pub window_started_at: Option<DateTime<Utc>>,
}

impl RateRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            count: 0,
            window_start: None,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// End of the current window, if one is open
    pub fn window_end(&self) -> Option<Instant> {
        self.window_start.map(|start| start + self.window)
    }

    /// Takes one call from the quota, without waiting
    ///
    /// Returns `None` if the call was granted, or the instant at which the
    /// caller may proceed if the window is exhausted. In the latter case the
    /// caller must sleep until that instant and then call [`RateRule::restart`].
    pub fn try_take(&mut self, now: Instant) -> Option<Instant> {
        let Some(end) = self.window_end() else {
            self.restart(now);
            return None;
        };

        // A stale window is not carried over into a new burst
        if now >= end {
            self.restart(now);
            return None;
        }

        if self.count < self.limit {
            self.count += 1;
            return None;
        }

        Some(end)
    }

    /// Opens a fresh window at `now` holding one call
    pub fn restart(&mut self, now: Instant) {
        self.count = 1;
        self.window_start = Some(now);
    }

    /// Waits for one call's worth of quota
    pub async fn acquire(&mut self) {
        if let Some(end) = self.try_take(Instant::now()) {
            let now = Instant::now();
            if now < end {
                let wait = end - now;
                tracing::info!(
                    "Quota exhausted ({}/{} per {:?}), waiting {:.3}s",
                    self.count,
                    self.limit,
                    self.window,
                    wait.as_secs_f64()
                );
                tokio::time::sleep_until(end).await;
            }
            self.restart(Instant::now());
        }
    }

    /// Returns true if the rule is idle or its window has fully elapsed
    pub fn is_over(&self, now: Instant) -> bool {
        match self.window_end() {
            Some(end) => now > end,
            None => true,
        }
    }

    /// Clears consumption and closes the window
    pub fn reset(&mut self) {
        self.count = 0;
        self.window_start = None;
    }

    /// Captures consumption with a wall-clock window start
    pub fn snapshot(&self) -> RuleSnapshot {
        let window_started_at = self.window_start.map(|start| {
            let age = chrono::Duration::from_std(start.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
            Utc::now() - age
        });

        RuleSnapshot {
            limit: self.limit,
            window: self.window,
            count: self.count,
            window_started_at,
        }
    }

    /// Restores consumption captured by [`RateRule::snapshot`]
    ///
    /// Returns false, leaving the rule untouched, if the snapshot belongs to a
    /// rule with a different limit or window. A window that has elapsed in the
    /// meantime is not restored.
    pub fn restore(&mut self, snapshot: &RuleSnapshot) -> bool {
        if snapshot.limit != self.limit || snapshot.window != self.window {
            return false;
        }

        self.reset();

        let Some(started_at) = snapshot.window_started_at else {
            return true;
        };

        let age = (Utc::now() - started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age >= self.window {
            return true;
        }

        if let Some(start) = Instant::now().checked_sub(age) {
            self.window_start = Some(start);
            self.count = snapshot.count.min(self.limit);
        }

        true
    }
}
