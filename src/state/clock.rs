//! Turn and match countdowns.
//!
//! Both clocks are absolute UTC timestamps stamped by the server; clients
//! reconcile against the `server_time` field carried on every broadcast
//! (`offset = server_time - local_now`). Expiry checks take `now` as a
//! parameter so the logic is deterministic; the host schedules a single
//! wakeup from [`MatchClock::next_deadline`].

use chrono::{DateTime, Duration, Utc};

/// Which countdown reached zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    Turn,
    Match,
}

/// Dual countdown state for one match.
#[derive(Debug, Clone)]
pub struct MatchClock {
    pub turn_time_limit: Duration,
    pub match_time_limit: Duration,
    pub turn_started_at: DateTime<Utc>,
    pub match_started_at: DateTime<Utc>,
    /// Set when the match clock expires on a tied score. The match clock
    /// is not extended; the next goal ends the match.
    pub is_golden_goal: bool,
}

impl MatchClock {
    pub fn new(now: DateTime<Utc>, turn_time_limit: Duration, match_time_limit: Duration) -> Self {
        Self {
            turn_time_limit,
            match_time_limit,
            turn_started_at: now,
            match_started_at: now,
            is_golden_goal: false,
        }
    }

    /// Restart the turn countdown (called on every turn hand-over).
    pub fn restart_turn(&mut self, now: DateTime<Utc>) {
        self.turn_started_at = now;
    }

    pub fn turn_deadline(&self) -> DateTime<Utc> {
        self.turn_started_at + self.turn_time_limit
    }

    pub fn match_deadline(&self) -> DateTime<Utc> {
        self.match_started_at + self.match_time_limit
    }

    /// Remaining turn time, clamped at zero.
    pub fn remaining_turn(&self, now: DateTime<Utc>) -> Duration {
        (self.turn_deadline() - now).max(Duration::zero())
    }

    /// Remaining match time, clamped at zero.
    pub fn remaining_match(&self, now: DateTime<Utc>) -> Duration {
        (self.match_deadline() - now).max(Duration::zero())
    }

    pub fn turn_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.turn_deadline()
    }

    /// The match clock only fires once; in golden goal it is spent.
    pub fn match_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_golden_goal && now >= self.match_deadline()
    }

    pub fn enter_golden_goal(&mut self) {
        self.is_golden_goal = true;
    }

    /// The next authoritative expiry the host should schedule.
    pub fn next_deadline(&self) -> (DeadlineKind, DateTime<Utc>) {
        let turn = self.turn_deadline();
        if self.is_golden_goal || turn <= self.match_deadline() {
            (DeadlineKind::Turn, turn)
        } else {
            (DeadlineKind::Match, self.match_deadline())
        }
    }

    pub fn to_json(&self, now: DateTime<Utc>) -> serde_json::Value {
        serde_json::json!({
            "turn_time_limit": self.turn_time_limit.num_seconds(),
            "turn_start_time": self.turn_started_at.timestamp_millis(),
            "match_time_limit": self.match_time_limit.num_seconds(),
            "match_start_time": self.match_started_at.timestamp_millis(),
            "turn_remaining": self.remaining_turn(now).num_seconds(),
            "match_remaining": if self.is_golden_goal {
                serde_json::Value::Null
            } else {
                serde_json::json!(self.remaining_match(now).num_seconds())
            },
            "is_golden_goal": self.is_golden_goal
        })
    }
}
