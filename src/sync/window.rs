use chrono::{DateTime, Duration, Utc};

/// Number of days a polling client looks back for changed orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LookbackWindow {
    days: u32,
}

impl LookbackWindow {
    pub const DEFAULT_DAYS: u32 = 30;

    /// Build a window from a raw day count. Negative counts are rejected;
    /// counts beyond `u32::MAX` saturate.
    pub fn from_days(days: i64) -> Option<Self> {
        if days < 0 {
            return None;
        }
        Some(Self {
            days: u32::try_from(days).unwrap_or(u32::MAX),
        })
    }

    pub fn days(self) -> u32 {
        self.days
    }

    /// Absolute cutoff relative to `now`. Windows reaching past the earliest
    /// representable instant clamp to it.
    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(i64::from(self.days))
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self {
            days: Self::DEFAULT_DAYS,
        }
    }
}
