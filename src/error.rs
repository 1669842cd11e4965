//! Error types for limiter configuration.
//!
//! Only construction can fail. Reservations always come back as a value; a request that can
//! never be satisfied is reported through [`Reservation::ok`](crate::Reservation::ok).

use crate::Priority;

/// Upper bound on the sum of explicit shares, allowing for floating-point noise.
pub(crate) const SHARE_EPSILON: f64 = 1e-9;

/// Errors produced when validating limiter configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A single share is outside `(0.0, 1.0]`.
    #[error("share for {priority} must be within (0.0, 1.0] (got {fraction})")]
    InvalidShare {
        /// Tier the share was configured for.
        priority: Priority,
        /// Value provided by caller.
        fraction: f64,
    },
    /// The explicit shares add up to more than the whole budget.
    #[error("total share must not exceed 1.0 (got {total})")]
    OverAllocated {
        /// Sum of the configured shares.
        total: f64,
    },
}

impl ConfigError {
    /// Check if this error is about a single out-of-range share.
    pub fn is_invalid_share(&self) -> bool {
        matches!(self, Self::InvalidShare { .. })
    }

    /// Check if this error is about the shares' total.
    pub fn is_over_allocated(&self) -> bool {
        matches!(self, Self::OverAllocated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_share_display() {
        let err = ConfigError::InvalidShare { priority: Priority::High, fraction: 1.5 };
        let msg = err.to_string();
        assert!(msg.contains("high"));
        assert!(msg.contains("1.5"));
        assert!(err.is_invalid_share());
        assert!(!err.is_over_allocated());
    }

    #[test]
    fn over_allocated_display() {
        let err = ConfigError::OverAllocated { total: 1.2 };
        assert!(err.to_string().contains("1.2"));
        assert!(err.is_over_allocated());
    }
}
