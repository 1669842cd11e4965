//! Aggregate reservation returned by [`PriorityLimiter`](crate::PriorityLimiter).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bucket::{Grant, TokenBucket};
use crate::clock::Clock;
use crate::priority::Class;
use crate::Priority;

#[derive(Debug)]
struct Part {
    class: Class,
    bucket: Arc<TokenBucket>,
    grant: Grant,
}

/// The per-bucket grants made for one top-level request, in the order they were made.
///
/// The caller must wait for every slice to clear, so the delay is the sum of the parts rather
/// than the longest one. Dropping a reservation does not refund anything; call
/// [`Reservation::cancel`] for that.
#[derive(Debug)]
pub struct Reservation {
    parts: Vec<Part>,
    clock: Arc<dyn Clock>,
}

impl Reservation {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self { parts: Vec::new(), clock }
    }

    pub(crate) fn push(&mut self, class: Class, bucket: &Arc<TokenBucket>, grant: Grant) {
        self.parts.push(Part { class, bucket: Arc::clone(bucket), grant });
    }

    /// Total wait from the limiter's clock reading.
    pub fn delay(&self) -> Duration {
        self.delay_from(self.clock.now())
    }

    /// Total wait from `now`. Saturates at `Duration::MAX` if any part can never be satisfied.
    pub fn delay_from(&self, now: Instant) -> Duration {
        self.parts
            .iter()
            .fold(Duration::ZERO, |total, part| total.saturating_add(part.grant.delay_from(now)))
    }

    /// `false` means the request can never be satisfied under the current configuration.
    /// Treat it as a rejection, not as a longer wait.
    pub fn ok(&self) -> bool {
        self.parts.iter().all(|part| part.grant.ok())
    }

    /// Refund every part as of the limiter's clock reading.
    pub fn cancel(&self) {
        self.cancel_at(self.clock.now());
    }

    /// Refund every part as of `now`.
    ///
    /// Parts are cancelled newest first, so when one bucket received two grants for this
    /// request the later one is rolled back before the earlier one and both refund in full.
    pub fn cancel_at(&self, now: Instant) {
        for part in self.parts.iter().rev() {
            part.bucket.cancel_at(&part.grant, now);
        }
    }

    /// Tokens requested across all parts.
    pub fn tokens(&self) -> u64 {
        self.parts.iter().map(|part| part.grant.tokens()).sum()
    }

    /// Number of bucket grants in this reservation.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The individual grants, tagged with the tier whose bucket issued them
    /// (`None` for the unclassified bucket).
    pub fn grants(&self) -> impl Iterator<Item = (Option<Priority>, &Grant)> + '_ {
        self.parts.iter().map(|part| {
            let priority = match part.class {
                Class::Named(p) => Some(p),
                Class::Unclassified => None,
            };
            (priority, &part.grant)
        })
    }
}
