//! TTL classes and write-time expiry.

use std::time::Duration;

/// Named TTL classes shared by every cache consumer.
///
/// The second counts are shared with already-deployed consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTtl {
    /// 1 minute.
    VeryShort,
    /// 5 minutes.
    Short,
    /// 15 minutes.
    Medium,
    /// 1 hour.
    Long,
    /// 6 hours.
    VeryLong,
    /// 1 day.
    Day,
    /// 1 week.
    Week,
    /// 30 days.
    Month,
}

impl CacheTtl {
    /// Length of this class in seconds.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        match self {
            Self::VeryShort => 60,
            Self::Short => 300,
            Self::Medium => 900,
            Self::Long => 3_600,
            Self::VeryLong => 21_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
            Self::Month => 2_592_000,
        }
    }

    /// Length of this class as a Duration.
    #[must_use]
    pub const fn duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl From<CacheTtl> for Duration {
    fn from(ttl: CacheTtl) -> Self {
        ttl.duration()
    }
}

/// How long a written value lives in the store.
///
/// Every write carries exactly one expiry: a duration, or explicitly none.
/// The store enforces it; this layer only forwards it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expiry {
    /// Keep until overwritten or deleted.
    #[default]
    Never,
    /// Expire after the given duration.
    After(Duration),
}

impl Expiry {
    /// Whole seconds to send to the store, or `None` for no expiry.
    ///
    /// Sub-second durations round up to one second; stores reject `EX 0`.
    #[must_use]
    pub fn seconds(self) -> Option<u64> {
        match self {
            Self::Never => None,
            Self::After(duration) => Some(duration.as_secs().max(1)),
        }
    }
}

impl From<CacheTtl> for Expiry {
    fn from(ttl: CacheTtl) -> Self {
        Self::After(ttl.duration())
    }
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl From<Option<Duration>> for Expiry {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Never, Self::After)
    }
}
