//! Share configuration: how the ceiling is split between priority tiers.
//!
//! Shares are validated once, when the limiter is built, and converted to integer bucket sizes
//! right away. Nothing here is recomputed per request.
//!
//! ```rust
//! use sharelimit::{Priority, Share, ShareConfig};
//!
//! let shares = ShareConfig::resolve([
//!     Share::new(Priority::High, 0.1),
//!     Share::new(Priority::Low, 0.2),
//! ])
//! .unwrap();
//! assert_eq!(shares.get(Priority::High), Some(0.1));
//! // The residual goes to unclassified traffic.
//! assert!((shares.unclassified().unwrap() - 0.7).abs() < 1e-9);
//! ```

use std::collections::BTreeMap;

use crate::error::{ConfigError, SHARE_EPSILON};
use crate::priority::Class;
use crate::Priority;

/// Share applied to each default tier when nothing is configured.
pub const DEFAULT_SPLIT: f64 = 0.5;

/// A single configuration entry: `priority` is guaranteed `fraction` of the ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Share {
    priority: Priority,
    fraction: f64,
}

impl Share {
    /// Create a share. Panics if `fraction` is outside `(0.0, 1.0]`.
    ///
    /// Use [`Share::try_new`] to get the error as a value instead.
    pub fn new(priority: Priority, fraction: f64) -> Self {
        match Self::try_new(priority, fraction) {
            Ok(share) => share,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a share, validating the fraction.
    pub fn try_new(priority: Priority, fraction: f64) -> Result<Self, ConfigError> {
        let share = Self { priority, fraction };
        share.validate()?;
        Ok(share)
    }

    /// Skip validation; [`ShareConfig::resolve`] checks the fraction later.
    pub(crate) fn unchecked(priority: Priority, fraction: f64) -> Self {
        Self { priority, fraction }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    // NaN fails both comparisons.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fraction > 0.0 && self.fraction <= 1.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidShare { priority: self.priority, fraction: self.fraction })
        }
    }
}

/// Validated share map, including the residual assigned to unclassified traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareConfig {
    shares: BTreeMap<Class, f64>,
}

impl ShareConfig {
    /// Validate `shares` and fill in defaults.
    ///
    /// - no shares at all: `High` and `Low` get [`DEFAULT_SPLIT`] each, nothing is left over;
    /// - a repeated tier keeps the last fraction given for it;
    /// - a total above 1.0 is rejected;
    /// - a total below 1.0 leaves `1.0 - total` to unclassified traffic.
    pub fn resolve<I>(shares: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Share>,
    {
        let mut map = BTreeMap::new();
        for share in shares {
            share.validate()?;
            map.insert(Class::Named(share.priority), share.fraction);
        }
        if map.is_empty() {
            map.insert(Class::Named(Priority::High), DEFAULT_SPLIT);
            map.insert(Class::Named(Priority::Low), DEFAULT_SPLIT);
        }

        let total: f64 = map.values().sum();
        if total > 1.0 + SHARE_EPSILON {
            return Err(ConfigError::OverAllocated { total });
        }
        let residual = 1.0 - total;
        if residual > SHARE_EPSILON {
            map.insert(Class::Unclassified, residual);
        }
        Ok(Self { shares: map })
    }

    /// Everything goes to unclassified traffic.
    pub(crate) fn unclassified_only() -> Self {
        Self { shares: BTreeMap::from([(Class::Unclassified, 1.0)]) }
    }

    /// Share configured for `priority`, if any.
    pub fn get(&self, priority: Priority) -> Option<f64> {
        self.shares.get(&Class::Named(priority)).copied()
    }

    /// Residual share left to unclassified traffic, if any.
    pub fn unclassified(&self) -> Option<f64> {
        self.shares.get(&Class::Unclassified).copied()
    }

    /// Named tiers with a share, in spillover order.
    pub fn priorities(&self) -> impl Iterator<Item = Priority> + '_ {
        self.shares.keys().filter_map(|class| match class {
            Class::Named(p) => Some(*p),
            Class::Unclassified => None,
        })
    }

    /// Sum of every share, unclassified residual included.
    pub fn total(&self) -> f64 {
        self.shares.values().sum()
    }

    pub(crate) fn classes(&self) -> impl Iterator<Item = (Class, f64)> + '_ {
        self.shares.iter().map(|(class, share)| (*class, *share))
    }
}

/// Plain-data limiter configuration, suitable for loading from the host's own config files.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimiterConfig {
    /// Aggregate budget in tokens per second; also the burst size.
    pub ceiling: u64,
    /// Explicit shares. Empty means the default `High`/`Low` split.
    #[cfg_attr(feature = "serde", serde(default))]
    pub shares: Vec<Share>,
    /// Give classes whose computed rate floors to zero an unlimited bucket instead of a
    /// zero-rate one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub unlimited_zero_rate: bool,
}

impl LimiterConfig {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling, ..Self::default() }
    }

    /// Add a share entry.
    pub fn with_share(mut self, share: Share) -> Self {
        self.shares.push(share);
        self
    }

    pub fn with_unlimited_zero_rate(mut self, enabled: bool) -> Self {
        self.unlimited_zero_rate = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn residual_goes_to_unclassified() {
        let cfg = ShareConfig::resolve([
            Share::new(Priority::High, 0.1),
            Share::new(Priority::Low, 0.2),
        ])
        .unwrap();
        assert_eq!(cfg.get(Priority::High), Some(0.1));
        assert_eq!(cfg.get(Priority::Low), Some(0.2));
        assert!(approx(cfg.unclassified().unwrap(), 0.7));
        assert!(approx(cfg.total(), 1.0));
    }

    #[test]
    fn full_single_share_leaves_no_residual() {
        let cfg = ShareConfig::resolve([Share::new(Priority::Low, 1.0)]).unwrap();
        assert_eq!(cfg.get(Priority::Low), Some(1.0));
        assert_eq!(cfg.unclassified(), None);
    }

    #[test]
    fn empty_config_defaults_to_even_high_low_split() {
        let cfg = ShareConfig::resolve([]).unwrap();
        assert_eq!(cfg.get(Priority::High), Some(0.5));
        assert_eq!(cfg.get(Priority::Low), Some(0.5));
        assert_eq!(cfg.unclassified(), None);
        assert_eq!(cfg.priorities().collect::<Vec<_>>(), vec![Priority::High, Priority::Low]);
    }

    #[test]
    fn rounding_noise_does_not_create_unclassified_bucket() {
        let cfg = ShareConfig::resolve([
            Share::new(Priority::High, 0.7),
            Share::new(Priority::Normal, 0.2),
            Share::new(Priority::Low, 0.1),
        ])
        .unwrap();
        assert_eq!(cfg.unclassified(), None);
    }

    #[test]
    fn over_allocation_is_rejected() {
        let err = ShareConfig::resolve([
            Share::new(Priority::High, 0.7),
            Share::new(Priority::Low, 0.4),
        ])
        .unwrap_err();
        assert!(err.is_over_allocated());
    }

    #[test]
    fn repeated_priority_keeps_last_fraction() {
        let cfg = ShareConfig::resolve([
            Share::new(Priority::High, 0.9),
            Share::new(Priority::High, 0.3),
        ])
        .unwrap();
        assert_eq!(cfg.get(Priority::High), Some(0.3));
        assert!(approx(cfg.unclassified().unwrap(), 0.7));
    }

    #[test]
    fn out_of_range_fractions_are_rejected() {
        for bad in [0.0, -0.1, 1.01, f64::NAN, f64::INFINITY] {
            let err = Share::try_new(Priority::Normal, bad).unwrap_err();
            assert!(err.is_invalid_share(), "{bad} should be rejected");
        }
    }

    #[test]
    #[should_panic(expected = "must be within")]
    fn new_panics_on_invalid_fraction() {
        let _ = Share::new(Priority::High, 2.0);
    }

    #[test]
    fn config_builder_collects_shares() {
        let cfg = LimiterConfig::new(100)
            .with_share(Share::new(Priority::High, 0.7))
            .with_unlimited_zero_rate(true);
        assert_eq!(cfg.ceiling, 100);
        assert_eq!(cfg.shares.len(), 1);
        assert!(cfg.unlimited_zero_rate);
    }
}
