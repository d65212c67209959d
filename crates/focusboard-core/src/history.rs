//! Date windows for focus-history views.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest window a history view may span, about ten years.
pub const MAX_WINDOW_DAYS: u32 = 3660;

/// Which slice of the focus history a view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    SevenDays,
    ThirtyDays,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl ViewMode {
    /// Dates shown by this view, oldest first.
    pub fn display_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        match *self {
            Self::SevenDays => date_range(today, 7),
            Self::ThirtyDays => date_range(today, 30),
            Self::Custom { start, end } => inclusive_dates(start, end),
        }
    }

    /// Build a custom view, rejecting an end before the start or a span
    /// longer than [`MAX_WINDOW_DAYS`].
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        let span = (end - start).num_days() + 1;
        if span > i64::from(MAX_WINDOW_DAYS) {
            return Err(window_too_long("range", span));
        }
        Ok(Self::Custom { start, end })
    }

    /// The `days` days ending at `today`.
    pub fn last_days(today: NaiveDate, days: u32) -> Result<Self, ValidationError> {
        match days {
            7 => return Ok(Self::SevenDays),
            30 => return Ok(Self::ThirtyDays),
            0 => {
                return Err(ValidationError::InvalidValue {
                    field: "days".into(),
                    message: "must be at least 1".into(),
                })
            }
            _ if days > MAX_WINDOW_DAYS => return Err(window_too_long("days", days.into())),
            _ => {}
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| window_too_long("days", days.into()))?;
        Self::custom(start, today)
    }
}

fn window_too_long(field: &str, days: i64) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: format!("{days} days exceeds the {MAX_WINDOW_DAYS}-day limit"),
    }
}

/// The `days` dates ending at `today`, oldest first, at most
/// [`MAX_WINDOW_DAYS`] of them.
pub fn date_range(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    let days = days.min(MAX_WINDOW_DAYS);
    if days == 0 {
        return Vec::new();
    }
    let start = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .unwrap_or(NaiveDate::MIN);
    inclusive_dates(start, today)
}

fn inclusive_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .take(MAX_WINDOW_DAYS as usize)
        .collect()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn seven_day_view_ends_today() {
        let dates = ViewMode::SevenDays.display_dates(d(2025, 3, 3));
        assert_eq!(dates.len(), 7);
        assert_eq!(dates.first(), Some(&d(2025, 2, 25)));
        assert_eq!(dates.last(), Some(&d(2025, 3, 3)));
    }

    #[test]
    fn thirty_day_view_crosses_year_boundary() {
        let dates = ViewMode::ThirtyDays.display_dates(d(2025, 1, 10));
        assert_eq!(dates.len(), 30);
        assert_eq!(dates[0], d(2024, 12, 12));
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn custom_view_is_inclusive() {
        let view = ViewMode::Custom {
            start: d(2025, 2, 27),
            end: d(2025, 3, 1),
        };
        assert_eq!(
            view.display_dates(d(2030, 1, 1)),
            vec![d(2025, 2, 27), d(2025, 2, 28), d(2025, 3, 1)]
        );
    }

    #[test]
    fn inverted_custom_view_is_empty() {
        let view = ViewMode::Custom {
            start: d(2025, 3, 5),
            end: d(2025, 3, 1),
        };
        assert!(view.display_dates(d(2025, 3, 5)).is_empty());
        assert!(ViewMode::custom(d(2025, 3, 5), d(2025, 3, 1)).is_err());
    }

    #[test]
    fn zero_day_range_is_empty() {
        assert!(date_range(d(2025, 3, 5), 0).is_empty());
        assert_eq!(date_range(d(2025, 3, 5), 1), vec![d(2025, 3, 5)]);
    }

    #[test]
    fn windows_are_capped() {
        assert_eq!(date_range(d(2025, 3, 5), u32::MAX).len(), MAX_WINDOW_DAYS as usize);

        let wide = ViewMode::Custom {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        };
        assert_eq!(wide.display_dates(d(2025, 3, 5)).len(), MAX_WINDOW_DAYS as usize);

        assert!(matches!(
            ViewMode::custom(d(2000, 1, 1), d(2025, 1, 1)),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(ViewMode::custom(d(2025, 1, 1), d(2025, 1, 1)).is_ok());
    }

    #[test]
    fn last_days_maps_to_views() {
        let today = d(2025, 3, 5);
        assert_eq!(ViewMode::last_days(today, 7).unwrap(), ViewMode::SevenDays);
        assert_eq!(ViewMode::last_days(today, 30).unwrap(), ViewMode::ThirtyDays);
        assert_eq!(
            ViewMode::last_days(today, 3).unwrap(),
            ViewMode::Custom {
                start: d(2025, 3, 3),
                end: today
            }
        );
        assert_eq!(
            ViewMode::last_days(today, MAX_WINDOW_DAYS)
                .unwrap()
                .display_dates(today)
                .len(),
            MAX_WINDOW_DAYS as usize
        );
        assert!(ViewMode::last_days(today, 0).is_err());
        assert!(ViewMode::last_days(today, MAX_WINDOW_DAYS + 1).is_err());
        assert!(ViewMode::last_days(today, u32::MAX).is_err());
    }

    #[test]
    fn parse_date_accepts_iso_only() {
        assert_eq!(parse_date("2025-03-05").unwrap(), d(2025, 3, 5));
        assert!(matches!(
            parse_date("03/05/2025"),
            Err(ValidationError::InvalidDate(_))
        ));
    }
}
