//! Relative day windows for Traf-Sys requests
//!
//! Traf-Sys rejects requests wider than about a month, so a requested range
//! is split into consecutive windows of at most 31 days, walking backward
//! from the oldest day.

use chrono::{Days, NaiveDate};

/// Days covered by one request, inclusive on both ends
pub const MAX_WINDOW_DAYS: u32 = 31;

/// Date format Traf-Sys expects for `DateFrom` / `DateTo`
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive range of days, counted back from today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_days_ago: u32,
    pub end_days_ago: u32,
}

impl DayWindow {
    /// Number of calendar days the window covers
    pub fn span_days(&self) -> u32 {
        self.start_days_ago - self.end_days_ago + 1
    }

    /// Calendar dates (from, to) relative to `today`
    pub fn dates(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (days_before(today, self.start_days_ago), days_before(today, self.end_days_ago))
    }
}

fn days_before(today: NaiveDate, days: u32) -> NaiveDate {
    today.checked_sub_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MIN)
}

/// Split `start_days_ago..=end_days_ago` into request windows.
///
/// Returns windows in request order, oldest first. An empty vec means
/// `start_days_ago < end_days_ago`.
pub fn plan_windows(start_days_ago: u32, end_days_ago: u32) -> Vec<DayWindow> {
    let mut windows = Vec::new();
    let mut start = i64::from(start_days_ago);
    let end = i64::from(end_days_ago);
    let step = i64::from(MAX_WINDOW_DAYS);

    while start >= end {
        let window_end = end.max(start - (step - 1));
        windows.push(DayWindow { start_days_ago: start as u32, end_days_ago: window_end as u32 });
        start -= step;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_day() {
        assert_eq!(plan_windows(1, 1), vec![DayWindow { start_days_ago: 1, end_days_ago: 1 }]);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert!(plan_windows(2, 5).is_empty());
    }

    #[test]
    fn test_fits_in_one_window() {
        let windows = plan_windows(30, 0);
        assert_eq!(windows, vec![DayWindow { start_days_ago: 30, end_days_ago: 0 }]);
        assert_eq!(windows[0].span_days(), 31);
    }

    #[test]
    fn test_just_over_one_window() {
        assert_eq!(
            plan_windows(31, 0),
            vec![
                DayWindow { start_days_ago: 31, end_days_ago: 1 },
                DayWindow { start_days_ago: 0, end_days_ago: 0 },
            ]
        );
    }

    #[test]
    fn test_sixty_five_days_needs_three_windows() {
        let windows = plan_windows(65, 0);
        assert_eq!(
            windows,
            vec![
                DayWindow { start_days_ago: 65, end_days_ago: 35 },
                DayWindow { start_days_ago: 34, end_days_ago: 4 },
                DayWindow { start_days_ago: 3, end_days_ago: 0 },
            ]
        );

        // No gaps, no overlaps, full coverage
        let mut covered: Vec<u32> = windows
            .iter()
            .flat_map(|w| (w.end_days_ago..=w.start_days_ago).rev())
            .collect();
        assert!(windows.iter().all(|w| w.span_days() <= MAX_WINDOW_DAYS));
        covered.sort_unstable();
        assert_eq!(covered, (0..=65).collect::<Vec<_>>());
    }

    #[test]
    fn test_dates_relative_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let window = DayWindow { start_days_ago: 12, end_days_ago: 1 };
        let (from, to) = window.dates(today);
        assert_eq!(from.format(QUERY_DATE_FORMAT).to_string(), "2024-02-27");
        assert_eq!(to.format(QUERY_DATE_FORMAT).to_string(), "2024-03-09");
    }
}
