//! Priority tiers and the internal catch-all class.

use std::fmt;

/// A named traffic tier.
///
/// Tiers are compared by identity when looking up buckets. The declaration order only fixes
/// the order in which sibling buckets are visited during spillover; it says nothing about
/// how much capacity a tier gets. That is decided by its configured share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl Priority {
    /// Every tier, in spillover visiting order.
    pub const ALL: [Priority; 5] =
        [Priority::Critical, Priority::High, Priority::Normal, Priority::Low, Priority::Background];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Background => "background",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket key inside the limiter.
///
/// `Unclassified` receives whatever share the named tiers leave over. It can't be produced from
/// configuration, so it never collides with a caller-supplied tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Class {
    Named(Priority),
    Unclassified,
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Named(p) => p.fmt(f),
            Class::Unclassified => f.write_str("unclassified"),
        }
    }
}

impl From<Priority> for Class {
    fn from(p: Priority) -> Self {
        Class::Named(p)
    }
}
