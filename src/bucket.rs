//! Token bucket admission engine for a single priority class.
//!
//! The bucket never refuses a request outright. Reserving more tokens than are available
//! drives the balance negative, and the caller is told how long the refill takes to repay
//! that debt. Only a zero-rate bucket, which never refills, can report a request as
//! unsatisfiable.
//!
//! ```rust
//! use sharelimit::TokenBucket;
//! use std::time::{Duration, Instant};
//!
//! let bucket = TokenBucket::new(10, 10.0);
//! let now = Instant::now();
//! assert_eq!(bucket.reserve_n(now, 10).delay_from(now), Duration::ZERO);
//! // The bucket is empty; five more tokens take half a second to refill.
//! let grant = bucket.reserve_n(now, 5);
//! assert_eq!(grant.delay_from(now), Duration::from_millis(500));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Longest wait a grant can quote. Longer backlogs saturate here to keep `Instant`
/// arithmetic from overflowing (365 days).
pub const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug)]
struct BucketState {
    /// Balance as of `last`. Negative while granted tokens are still owed.
    tokens: f64,
    /// `None` until the first mutation; the bucket starts full.
    last: Option<Instant>,
    /// Latest `time_to_act` handed out.
    last_event: Option<Instant>,
}

/// A capped reservoir of tokens refilled linearly at `rate` tokens per second.
///
/// All mutation happens under a per-bucket mutex, so concurrent reservations against the same
/// bucket are strictly ordered while separate buckets never contend.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket holding up to `capacity` tokens, refilled at `rate` tokens/second.
    ///
    /// Negative or NaN rates are treated as zero; `f64::INFINITY` makes the bucket unlimited.
    pub fn new(capacity: u64, rate: f64) -> Self {
        let rate = if rate > 0.0 { rate } else { 0.0 };
        Self {
            capacity,
            rate,
            state: Mutex::new(BucketState { tokens: capacity as f64, last: None, last_event: None }),
        }
    }

    /// A bucket that grants everything immediately.
    pub fn unlimited() -> Self {
        Self::new(u64::MAX, f64::INFINITY)
    }

    /// Maximum burst.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate.is_infinite()
    }

    /// Balance the bucket would report at `now`, without mutating it.
    pub fn tokens_at(&self, now: Instant) -> f64 {
        if self.is_unlimited() {
            return f64::INFINITY;
        }
        self.advance(&self.lock(), now)
    }

    /// Reserve `n` tokens as of `now`.
    ///
    /// The returned grant says when the tokens become available. A zero-sized request, or any
    /// request against an unlimited bucket, is granted at `now` without touching the balance.
    pub fn reserve_n(&self, now: Instant, n: u64) -> Grant {
        if n == 0 || self.is_unlimited() {
            return Grant::new(n, now, true);
        }

        let mut state = self.lock();
        let tokens = self.advance(&state, now) - n as f64;
        let now = latest(state.last, now);

        if self.rate == 0.0 {
            // Nothing ever refills, so debt could never be repaid.
            if tokens < 0.0 {
                return Grant::new(n, now, false);
            }
            state.tokens = tokens;
            state.last = Some(now);
            return Grant::new(n, now, true);
        }

        let wait = if tokens < 0.0 { self.duration_from_tokens(-tokens) } else { Duration::ZERO };
        let time_to_act = now + wait;
        state.tokens = tokens;
        state.last = Some(now);
        state.last_event = Some(time_to_act);
        Grant::new(n, time_to_act, true)
    }

    /// Refund the part of `grant` that hasn't been consumed by elapsed time as of `now`.
    ///
    /// A grant whose wait has already elapsed is left alone. Tokens that later reservations
    /// have since been scheduled against are not refunded. Cancelling the same grant twice is
    /// a no-op. `grant` must come from this bucket.
    pub fn cancel_at(&self, grant: &Grant, now: Instant) {
        if !grant.ok || grant.tokens == 0 || self.is_unlimited() || grant.time_to_act < now {
            return;
        }
        if grant.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut state = self.lock();
        let last_event = state.last_event.unwrap_or(grant.time_to_act);
        let scheduled_after = last_event.saturating_duration_since(grant.time_to_act);
        let restore = grant.tokens as f64 - self.tokens_from_duration(scheduled_after);
        if restore <= 0.0 {
            return;
        }

        let tokens = (self.advance(&state, now) + restore).min(self.capacity as f64);
        let now = latest(state.last, now);
        state.tokens = tokens;
        state.last = Some(now);

        if state.last_event == Some(grant.time_to_act) {
            // Nothing scheduled before `now` is still pending.
            let previous =
                grant.time_to_act.checked_sub(self.duration_from_tokens(grant.tokens as f64));
            state.last_event = Some(previous.map_or(now, |prev| prev.max(now)));
        }
        tracing::trace!(restored = restore, balance = tokens, "token bucket refund");
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // The balance and timestamp are written together with no fallible step in between.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Balance at `now`, refilled since the last update and clamped to capacity.
    fn advance(&self, state: &BucketState, now: Instant) -> f64 {
        let elapsed = match state.last {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        let refilled = state.tokens + self.tokens_from_duration(elapsed);
        refilled.min(self.capacity as f64)
    }

    fn duration_from_tokens(&self, tokens: f64) -> Duration {
        if self.rate == 0.0 {
            return MAX_DELAY;
        }
        Duration::try_from_secs_f64(tokens / self.rate).map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
    }

    fn tokens_from_duration(&self, elapsed: Duration) -> f64 {
        if self.rate == 0.0 {
            return 0.0;
        }
        elapsed.as_secs_f64() * self.rate
    }
}

fn latest(last: Option<Instant>, now: Instant) -> Instant {
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

/// A single bucket's answer to a reservation: `tokens` become available at `time_to_act`.
#[derive(Debug)]
pub struct Grant {
    tokens: u64,
    time_to_act: Instant,
    ok: bool,
    cancelled: AtomicBool,
}

impl Grant {
    fn new(tokens: u64, time_to_act: Instant, ok: bool) -> Self {
        Self { tokens, time_to_act, ok, cancelled: AtomicBool::new(false) }
    }

    /// Tokens requested from the bucket.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// When the tokens are available.
    pub fn time_to_act(&self) -> Instant {
        self.time_to_act
    }

    /// `false` if the bucket can never satisfy this grant.
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Wait remaining at `now`; `Duration::MAX` for an unsatisfiable grant.
    pub fn delay_from(&self, now: Instant) -> Duration {
        if !self.ok {
            return Duration::MAX;
        }
        self.time_to_act.saturating_duration_since(now)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
