//! Priority-aware limiter: one token bucket per tier, sized by its share of the ceiling.
//!
//! A request for `n` tokens at some priority is split across buckets:
//!
//! 1. the requester's own bucket takes `max(1, floor(n * share))`;
//! 2. every other named tier, visited from `Critical` to `Background`, takes
//!    `floor(remaining * share)` when that is at least one token;
//! 3. whatever is still left goes back to the requester's bucket, or to the unclassified
//!    bucket when the requester has no bucket of its own.
//!
//! This lets a tier borrow idle capacity from its siblings during a burst while every tier
//! keeps its configured share of the steady-state rate.
//!
//! ```rust
//! use sharelimit::{Priority, PriorityLimiter, Share};
//! use std::time::{Duration, Instant};
//!
//! let limiter = PriorityLimiter::new(
//!     100,
//!     [Share::new(Priority::High, 0.7), Share::new(Priority::Low, 0.3)],
//! );
//! let now = Instant::now();
//! let r = limiter.reserve_n(Priority::High, now, 30);
//! assert!(r.ok());
//! assert_eq!(r.delay_from(now), Duration::ZERO);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::bucket::TokenBucket;
use crate::clock::{Clock, MonotonicClock};
use crate::error::ConfigError;
use crate::priority::Class;
use crate::reservation::Reservation;
use crate::share::{LimiterConfig, Share, ShareConfig};
use crate::Priority;

#[derive(Debug)]
struct Slot {
    share: f64,
    bucket: Arc<TokenBucket>,
}

#[derive(Debug)]
struct Inner {
    ceiling: u64,
    shares: ShareConfig,
    slots: BTreeMap<Class, Slot>,
}

/// Admission control over a shared budget split between priority tiers.
///
/// Clones share the same buckets via `Arc`, so every handle draws from the same budget.
/// Reservations never block: they return immediately with the wait the caller should observe.
#[derive(Debug, Clone)]
pub struct PriorityLimiter {
    inner: Arc<Inner>,
    clock: Arc<dyn Clock>,
}

impl PriorityLimiter {
    /// Build a limiter with `ceiling` tokens per second (and burst) split by `shares`.
    ///
    /// An empty `shares` gives `High` and `Low` half each. Panics if any share is outside
    /// `(0.0, 1.0]` or the shares add up to more than 1.0; use [`PriorityLimiter::try_new`] to
    /// get the error as a value.
    pub fn new<I>(ceiling: u64, shares: I) -> Self
    where
        I: IntoIterator<Item = Share>,
    {
        match Self::try_new(ceiling, shares) {
            Ok(limiter) => limiter,
            Err(e) => panic!("invalid limiter configuration: {e}"),
        }
    }

    /// Build a limiter, returning configuration errors instead of panicking.
    pub fn try_new<I>(ceiling: u64, shares: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Share>,
    {
        let shares = shares.into_iter().collect();
        Self::from_config(LimiterConfig { ceiling, shares, ..Default::default() })
    }

    /// Build a limiter from plain configuration data.
    pub fn from_config(config: LimiterConfig) -> Result<Self, ConfigError> {
        let shares = ShareConfig::resolve(config.shares)?;
        let slots = shares
            .classes()
            .map(|(class, share)| {
                let bucket = build_bucket(class, config.ceiling, share, config.unlimited_zero_rate);
                (class, Slot { share, bucket: Arc::new(bucket) })
            })
            .collect();
        Ok(Self::from_parts(config.ceiling, shares, slots))
    }

    /// Start a [`PriorityLimiterBuilder`].
    pub fn builder() -> PriorityLimiterBuilder {
        PriorityLimiterBuilder::new()
    }

    /// A limiter that admits everything immediately, whatever the priority.
    ///
    /// Lets call sites keep reserving while admission control is switched off.
    pub fn unlimited() -> Self {
        let slot = Slot { share: 1.0, bucket: Arc::new(TokenBucket::unlimited()) };
        let slots = BTreeMap::from([(Class::Unclassified, slot)]);
        Self::from_parts(u64::MAX, ShareConfig::unclassified_only(), slots)
    }

    fn from_parts(ceiling: u64, shares: ShareConfig, slots: BTreeMap<Class, Slot>) -> Self {
        Self {
            inner: Arc::new(Inner { ceiling, shares, slots }),
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Override the clock used by [`reserve`](Self::reserve) and by the returned reservations'
    /// `delay`/`cancel` (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Aggregate tokens per second, and burst.
    pub fn ceiling(&self) -> u64 {
        self.inner.ceiling
    }

    /// The resolved share map.
    pub fn shares(&self) -> &ShareConfig {
        &self.inner.shares
    }

    /// Share configured for `priority`, if it has a bucket.
    pub fn share(&self, priority: Priority) -> Option<f64> {
        self.inner.shares.get(priority)
    }

    /// Share left to unclassified traffic, if any.
    pub fn unclassified_share(&self) -> Option<f64> {
        self.inner.shares.unclassified()
    }

    /// Burst size (and rate) of `priority`'s bucket.
    pub fn capacity(&self, priority: Priority) -> Option<u64> {
        self.inner.slots.get(&Class::Named(priority)).map(|slot| slot.bucket.capacity())
    }

    pub fn is_unlimited(&self) -> bool {
        self.inner.slots.values().all(|slot| slot.bucket.is_unlimited())
    }

    /// Reserve a full ceiling's worth of tokens at `priority`, as of the limiter's clock.
    pub fn reserve(&self, priority: Priority) -> Reservation {
        self.reserve_n(priority, self.clock.now(), self.inner.ceiling)
    }

    /// Reserve `n` tokens at `priority` as of `now`.
    ///
    /// Always returns immediately. Check [`Reservation::ok`] before waiting out
    /// [`Reservation::delay_from`]. A zero-token request is an empty, always-ok reservation
    /// that leaves every bucket untouched.
    pub fn reserve_n(&self, priority: Priority, now: Instant, n: u64) -> Reservation {
        let mut reservation = Reservation::new(Arc::clone(&self.clock));
        if n == 0 {
            return reservation;
        }

        let own = Class::Named(priority);
        let own_slot = self.inner.slots.get(&own);
        let mut remaining = n;

        if let Some(slot) = own_slot {
            // Never round the requester's own slice down to nothing.
            let primary = quota(n, slot.share).max(1);
            reservation.push(own, &slot.bucket, slot.bucket.reserve_n(now, primary));
            remaining -= primary;
        }

        if remaining > 0 {
            for (class, slot) in &self.inner.slots {
                if *class == own || *class == Class::Unclassified {
                    continue;
                }
                let take = quota(remaining, slot.share);
                if take < 1 {
                    continue;
                }
                reservation.push(*class, &slot.bucket, slot.bucket.reserve_n(now, take));
                remaining -= take;
            }
        }

        if remaining > 0 {
            if let Some((class, slot)) = self.remainder_slot(own) {
                reservation.push(class, &slot.bucket, slot.bucket.reserve_n(now, remaining));
            }
        }

        tracing::debug!(
            priority = %priority,
            requested = n,
            parts = reservation.len(),
            delay = ?reservation.delay_from(now),
            "priority reservation"
        );
        if !reservation.ok() {
            tracing::warn!(priority = %priority, requested = n, "reservation can never be satisfied");
        }
        reservation
    }

    /// Where leftover tokens go: the requester's bucket, else unclassified, else the first tier.
    fn remainder_slot(&self, own: Class) -> Option<(Class, &Slot)> {
        let slots = &self.inner.slots;
        slots
            .get(&own)
            .map(|slot| (own, slot))
            .or_else(|| slots.get(&Class::Unclassified).map(|slot| (Class::Unclassified, slot)))
            .or_else(|| slots.iter().next().map(|(class, slot)| (*class, slot)))
    }
}

/// `floor(n * share)`, never more than `n`.
fn quota(n: u64, share: f64) -> u64 {
    ((n as f64 * share).floor() as u64).min(n)
}

fn build_bucket(class: Class, ceiling: u64, share: f64, unlimited_zero_rate: bool) -> TokenBucket {
    // Float-to-int casts saturate, so a full share of a huge ceiling can't overflow.
    let size = (ceiling as f64 * share).floor() as u64;
    if size == 0 {
        if unlimited_zero_rate {
            tracing::debug!(class = %class, share, "zero-rate class gets an unlimited bucket");
            return TokenBucket::unlimited();
        }
        tracing::warn!(class = %class, share, ceiling, "class rounds to a zero-rate bucket");
    }
    tracing::debug!(class = %class, share, capacity = size, "token bucket configured");
    TokenBucket::new(size, size as f64)
}

/// Builder for [`PriorityLimiter`].
///
/// ```rust
/// use sharelimit::{ManualClock, Priority, PriorityLimiter};
///
/// let limiter = PriorityLimiter::builder()
///     .ceiling(1_000)
///     .share(Priority::Critical, 0.5)
///     .share(Priority::Normal, 0.3)
///     .clock(ManualClock::new())
///     .build()
///     .unwrap();
/// assert_eq!(limiter.capacity(Priority::Critical), Some(500));
/// assert!(limiter.unclassified_share().is_some());
/// ```
#[derive(Debug)]
pub struct PriorityLimiterBuilder {
    config: LimiterConfig,
    clock: Arc<dyn Clock>,
}

impl PriorityLimiterBuilder {
    /// Create a builder with no shares (the default `High`/`Low` split) and a zero ceiling.
    pub fn new() -> Self {
        Self { config: LimiterConfig::default(), clock: Arc::new(MonotonicClock) }
    }

    /// Set the aggregate tokens per second (and burst).
    pub fn ceiling(mut self, ceiling: u64) -> Self {
        self.config.ceiling = ceiling;
        self
    }

    /// Guarantee `priority` a `fraction` of the ceiling. Validated on [`build`](Self::build).
    pub fn share(mut self, priority: Priority, fraction: f64) -> Self {
        self.config.shares.push(Share::unchecked(priority, fraction));
        self
    }

    /// Give zero-rate classes an unlimited bucket instead.
    pub fn unlimited_zero_rate(mut self, enabled: bool) -> Self {
        self.config.unlimited_zero_rate = enabled;
        self
    }

    /// Provide a custom clock implementation.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the limiter, validating the shares.
    pub fn build(self) -> Result<PriorityLimiter, ConfigError> {
        let mut limiter = PriorityLimiter::from_config(self.config)?;
        limiter.clock = self.clock;
        Ok(limiter)
    }
}

impl Default for PriorityLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
