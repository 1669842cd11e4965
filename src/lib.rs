#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # sharelimit
//!
//! Priority-aware admission control for Rust: one aggregate rate ceiling, split between
//! priority tiers by static shares.
//!
//! ## Features
//!
//! - **Token buckets** that never reject: over-budget requests get a future start time
//! - **Proportional shares** per tier, with the residual going to unclassified traffic
//! - **Spillover** so a tier can borrow idle sibling capacity during a burst
//! - **Refunds** for reservations the caller decides not to use
//! - **Unlimited mode** to switch admission control off without touching call sites
//! - **Per-bucket locking**: tiers never contend with each other
//!
//! ## Quick Start
//!
//! ```rust
//! use sharelimit::{Priority, PriorityLimiter, Share};
//!
//! let limiter = PriorityLimiter::new(
//!     100,
//!     [Share::new(Priority::High, 0.7), Share::new(Priority::Low, 0.3)],
//! );
//!
//! let reservation = limiter.reserve(Priority::High);
//! if !reservation.ok() {
//!     // Never satisfiable under this configuration: reject the work.
//!     return;
//! }
//! let wait = reservation.delay();
//! // Sleep for `wait` (or give up and `reservation.cancel()`), then proceed.
//! # let _ = wait;
//! ```

pub mod bucket;
pub mod clock;
pub mod error;
pub mod limiter;
pub mod prelude;
pub mod priority;
pub mod reservation;
pub mod share;

// Re-exports
pub use bucket::{Grant, TokenBucket, MAX_DELAY};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::ConfigError;
pub use limiter::{PriorityLimiter, PriorityLimiterBuilder};
pub use priority::Priority;
pub use reservation::Reservation;
pub use share::{LimiterConfig, Share, ShareConfig, DEFAULT_SPLIT};
