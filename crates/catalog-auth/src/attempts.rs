//! Brute-force lockout tracking
//!
//! Failed logins are counted per username. Once a username reaches
//! `max_attempts` failures it stays locked until `lockout_duration` has
//! passed since the most recent failure. Records are evicted lazily by
//! [`LoginAttemptTracker::is_locked`] and periodically by the sweeper.
//!
//! Logins reserve their attempt with [`LoginAttemptTracker::reserve`]
//! before verifying, so failures plus in-flight verifications never
//! exceed `max_attempts` for a username.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Lockout thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that trigger a lockout
    pub max_attempts: u32,
    /// How long a lockout lasts after the most recent failure
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lockout_duration: Duration::minutes(3),
        }
    }
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout_duration: Duration::seconds(lockout_secs.min(u64::from(u32::MAX)) as i64),
        }
    }
}

/// Failure record for a single username
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub failure_count: u32,
    /// Reserved attempts whose verification has not finished
    pub in_flight: u32,
    pub last_attempt_at: DateTime<Utc>,
}

impl LoginAttempt {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            failure_count: 0,
            in_flight: 0,
            last_attempt_at: now,
        }
    }

    fn is_idle(&self) -> bool {
        self.failure_count == 0 && self.in_flight == 0
    }
}

/// An attempt slot held while a password is being verified
///
/// Dropping it unsettled gives the slot back without counting a failure.
#[must_use]
#[derive(Debug)]
pub struct AttemptReservation<'a> {
    tracker: &'a LoginAttemptTracker,
    username: String,
    settled: bool,
}

impl AttemptReservation<'_> {
    /// Settle as a failed login and return the new failure count
    pub fn fail(mut self) -> u32 {
        self.settled = true;
        self.tracker.bump_failure(&self.username, true)
    }

    /// Settle as a successful login
    ///
    /// Returns `false` when the account got locked while this attempt was
    /// being verified; the failures are kept in that case.
    pub fn succeed(mut self) -> bool {
        self.settled = true;
        self.tracker.settle_success(&self.username)
    }
}

impl Drop for AttemptReservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.release(&self.username);
        }
    }
}

/// Per-username failed-login tracker
#[derive(Debug)]
pub struct LoginAttemptTracker {
    attempts: DashMap<String, LoginAttempt>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for LoginAttemptTracker {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}

impl LoginAttemptTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    fn window_elapsed(&self, attempt: &LoginAttempt, now: DateTime<Utc>) -> bool {
        now >= attempt.last_attempt_at + self.policy.lockout_duration
    }

    /// Whether the username is currently locked out
    ///
    /// A lockout whose window has elapsed is evicted on the way.
    pub fn is_locked(&self, username: &str) -> bool {
        let now = self.clock.now();
        let max = self.policy.max_attempts;

        let evicted = self
            .attempts
            .remove_if(username, |_, attempt| {
                attempt.in_flight == 0
                    && attempt.failure_count >= max
                    && self.window_elapsed(attempt, now)
            })
            .is_some();
        if evicted {
            info!("Lockout expired for user: {}", username);
            return false;
        }

        self.attempts
            .get(username)
            .map(|attempt| attempt.failure_count >= max && !self.window_elapsed(&attempt, now))
            .unwrap_or(false)
    }

    /// Claim an attempt slot before verifying a password
    ///
    /// Returns `None` when the username is locked, or when the failures so
    /// far plus the verifications already running use up `max_attempts`.
    pub fn reserve(&self, username: &str) -> Option<AttemptReservation<'_>> {
        let now = self.clock.now();
        let max = self.policy.max_attempts;
        {
            let mut attempt = self
                .attempts
                .entry(username.to_string())
                .or_insert_with(|| LoginAttempt::fresh(now));

            if attempt.failure_count >= max && self.window_elapsed(&attempt, now) {
                info!("Lockout expired for user: {}", username);
                attempt.failure_count = 0;
            }
            if attempt.failure_count.saturating_add(attempt.in_flight) >= max {
                debug!(
                    "No attempt slot for {} ({} failures, {} in flight)",
                    username, attempt.failure_count, attempt.in_flight
                );
                return None;
            }
            attempt.in_flight += 1;
        }

        Some(AttemptReservation {
            tracker: self,
            username: username.to_string(),
            settled: false,
        })
    }

    /// Record a failed login and return the new failure count
    pub fn record_failure(&self, username: &str) -> u32 {
        self.bump_failure(username, false)
    }

    fn bump_failure(&self, username: &str, settles_reservation: bool) -> u32 {
        let now = self.clock.now();
        let count = {
            let mut attempt = self
                .attempts
                .entry(username.to_string())
                .or_insert_with(|| LoginAttempt::fresh(now));
            if settles_reservation {
                attempt.in_flight = attempt.in_flight.saturating_sub(1);
            }
            attempt.failure_count = attempt.failure_count.saturating_add(1);
            attempt.last_attempt_at = now;
            attempt.failure_count
        };

        if count == self.policy.max_attempts {
            warn!("User {} locked out after {} failed attempts", username, count);
            metrics::counter!("catalog_lockouts_total").increment(1);
        } else {
            debug!("Failed login {} for user: {}", count, username);
        }
        count
    }

    fn settle_success(&self, username: &str) -> bool {
        let now = self.clock.now();
        let accepted = match self.attempts.get_mut(username) {
            Some(mut attempt) => {
                attempt.in_flight = attempt.in_flight.saturating_sub(1);
                if attempt.failure_count >= self.policy.max_attempts
                    && !self.window_elapsed(&attempt, now)
                {
                    false
                } else {
                    attempt.failure_count = 0;
                    true
                }
            }
            None => true,
        };
        self.remove_idle(username);
        accepted
    }

    fn release(&self, username: &str) {
        if let Some(mut attempt) = self.attempts.get_mut(username) {
            attempt.in_flight = attempt.in_flight.saturating_sub(1);
        }
        self.remove_idle(username);
    }

    fn remove_idle(&self, username: &str) {
        self.attempts.remove_if(username, |_, attempt| attempt.is_idle());
    }

    /// Forget all failures for the username
    ///
    /// Reservations still in flight keep their slots.
    pub fn clear(&self, username: &str) {
        if let Some(mut attempt) = self.attempts.get_mut(username) {
            attempt.failure_count = 0;
        }
        self.remove_idle(username);
    }

    /// Current failure count (zero when no record exists)
    pub fn failure_count(&self, username: &str) -> u32 {
        self.attempts
            .get(username)
            .map(|attempt| attempt.failure_count)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Drop every record whose window has elapsed, locked or not
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.attempts.retain(|_, attempt| {
            let keep = attempt.in_flight > 0 || !self.window_elapsed(attempt, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// Spawn a background task that purges expired attempt records periodically
pub fn spawn_attempt_sweeper(
    tracker: Arc<LoginAttemptTracker>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    use tokio::time::{Duration, interval};

    info!(
        "Starting login attempt sweeper (interval: {} seconds)",
        interval_secs
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = tracker.purge_expired();
            if removed > 0 {
                info!("Attempt sweeper removed {} expired records", removed);
            }
        }
    })
}
