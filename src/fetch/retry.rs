// src/fetch/retry.rs
//! Per-source failure bookkeeping.
//!
//! An entry exists only while a source is failing. It is created by the first
//! failure, consulted before every fetch for the cooldown, and removed on success
//! or once the retry ceiling is passed. Time is `tokio::time::Instant` so paused
//! test clocks drive the cooldown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttemptState {
    pub retry_count: u32,
    pub last_attempt_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// What to do after a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule background retry number `attempt` (1-based) after the cooldown.
    Retry { attempt: u32 },
    /// Ceiling passed; the entry has been dropped.
    GiveUp,
}

#[derive(Debug, Default)]
pub struct RetryTable {
    policy: RetryPolicy,
    states: Mutex<HashMap<String, FetchAttemptState>>,
}

impl RetryTable {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Time left before `key` may be fetched again; `None` when it may go now.
    pub fn cooldown_remaining(&self, key: &str, now: Instant) -> Option<Duration> {
        let states = self.states.lock().expect("retry table mutex poisoned");
        let state = states.get(key)?;
        let elapsed = now.saturating_duration_since(state.last_attempt_at);
        self.policy.cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub fn record_failure(&self, key: &str, now: Instant) -> RetryDecision {
        let mut states = self.states.lock().expect("retry table mutex poisoned");
        let state = states.entry(key.to_string()).or_insert(FetchAttemptState {
            retry_count: 0,
            last_attempt_at: now,
        });
        state.retry_count += 1;
        state.last_attempt_at = now;

        if state.retry_count > self.policy.max_retries {
            states.remove(key);
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                attempt: state.retry_count,
            }
        }
    }

    pub fn clear(&self, key: &str) {
        self.states
            .lock()
            .expect("retry table mutex poisoned")
            .remove(key);
    }

    pub fn state(&self, key: &str) -> Option<FetchAttemptState> {
        self.states
            .lock()
            .expect("retry table mutex poisoned")
            .get(key)
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.states
            .lock()
            .expect("retry table mutex poisoned")
            .is_empty()
    }
}
