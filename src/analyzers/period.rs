//! Calendar periods used as aggregation keys.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::config::Granularity;

/// A day, Monday-aligned week, or month, identified by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub granularity: Granularity,
    pub start: NaiveDate,
}

impl Period {
    /// Truncates a timestamp to the period that contains it.
    pub fn containing(at: &NaiveDateTime, granularity: Granularity) -> Self {
        let date = at.date();
        let start = match granularity {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        };
        Period { granularity, start }
    }

    /// Last day inside the period.
    pub fn end(&self) -> NaiveDate {
        match self.granularity {
            Granularity::Day => self.start,
            Granularity::Week => self.start + Duration::days(6),
            Granularity::Month => {
                let (y, m) = if self.start.month() == 12 {
                    (self.start.year() + 1, 1)
                } else {
                    (self.start.year(), self.start.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1)
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(self.start)
            }
        }
    }

    /// Label written to the `date_group` column: `2025-09-01`,
    /// `2025-09-01/2025-09-07`, or `2025-09`.
    pub fn label(&self) -> String {
        match self.granularity {
            Granularity::Day => self.start.format("%Y-%m-%d").to_string(),
            Granularity::Week => format!(
                "{}/{}",
                self.start.format("%Y-%m-%d"),
                self.end().format("%Y-%m-%d")
            ),
            Granularity::Month => self.start.format("%Y-%m").to_string(),
        }
    }
}
