//! Quota tiers and the fixed windows they count over.

use std::fmt;
use std::time::Duration;

use super::clock::WindowInstant;

/// Fixed time window a counter covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// Per-hour counting, keyed by hour of day
    Hour,
    /// Per-day counting, keyed by day of month
    Day,
}

impl TimeWindow {
    /// Get the nominal duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }

    /// Expiry applied to a counter of this window.
    ///
    /// Twice the window length, so a counter is never evicted while its
    /// window is still current even with some clock skew between hosts.
    pub fn ttl(&self) -> Duration {
        self.duration() * 2
    }

    /// Segment used in counter keys.
    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "Hour",
            TimeWindow::Day => "Day",
        }
    }

    /// Index of the window instance containing `now`.
    pub fn index(&self, now: WindowInstant) -> u32 {
        match self {
            TimeWindow::Hour => now.hour_of_day,
            TimeWindow::Day => now.day_of_month,
        }
    }
}

/// One of the four independent quota dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    UserHourly,
    UserDaily,
    GlobalHourly,
    GlobalDaily,
}

impl Tier {
    /// All tiers in evaluation order.
    pub const ALL: [Tier; 4] = [
        Tier::UserHourly,
        Tier::UserDaily,
        Tier::GlobalHourly,
        Tier::GlobalDaily,
    ];

    /// Whether this tier counts per user rather than per data source.
    pub fn is_user_scoped(&self) -> bool {
        matches!(self, Tier::UserHourly | Tier::UserDaily)
    }

    /// The window this tier counts over.
    pub fn window(&self) -> TimeWindow {
        match self {
            Tier::UserHourly | Tier::GlobalHourly => TimeWindow::Hour,
            Tier::UserDaily | Tier::GlobalDaily => TimeWindow::Day,
        }
    }

    /// The configuration name of this tier.
    pub fn name(&self) -> &'static str {
        match self {
            Tier::UserHourly => "UserHourly",
            Tier::UserDaily => "UserDaily",
            Tier::GlobalHourly => "GlobalHourly",
            Tier::GlobalDaily => "GlobalDaily",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_time_window_ttl_outlives_window() {
        assert_eq!(TimeWindow::Hour.ttl(), Duration::from_secs(2 * 60 * 60));
        assert_eq!(TimeWindow::Day.ttl(), Duration::from_secs(2 * 24 * 60 * 60));
    }

    #[test]
    fn test_time_window_index() {
        let now = WindowInstant {
            hour_of_day: 17,
            day_of_month: 9,
        };
        assert_eq!(TimeWindow::Hour.index(now), 17);
        assert_eq!(TimeWindow::Day.index(now), 9);
    }

    #[test]
    fn test_tier_order_and_scope() {
        assert_eq!(
            Tier::ALL,
            [
                Tier::UserHourly,
                Tier::UserDaily,
                Tier::GlobalHourly,
                Tier::GlobalDaily
            ]
        );
        assert!(Tier::UserDaily.is_user_scoped());
        assert!(!Tier::GlobalHourly.is_user_scoped());
        assert_eq!(Tier::GlobalDaily.window(), TimeWindow::Day);
        assert_eq!(Tier::UserHourly.window(), TimeWindow::Hour);
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(Tier::GlobalHourly.to_string(), "GlobalHourly");
    }
}
