//! Convenient re-exports for common sharelimit types.
pub use crate::{
    clock::{Clock, ManualClock, MonotonicClock},
    error::ConfigError,
    limiter::{PriorityLimiter, PriorityLimiterBuilder},
    priority::Priority,
    reservation::Reservation,
    share::{LimiterConfig, Share},
};
