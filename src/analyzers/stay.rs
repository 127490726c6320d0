//! Stay breakdowns: how a person's or a department's buckets split across
//! places.

use std::collections::BTreeMap;

use crate::analyzers::period::Period;
use crate::analyzers::types::{StayRow, StayTrendRow};
use crate::config::Granularity;
use crate::records::EnrichedPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StayMode {
    /// Share of the subject's buckets, 0 to 100.
    Percentage,
    /// Bucket count times bucket width, in minutes.
    Duration,
}

impl StayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StayMode::Percentage => "percentage",
            StayMode::Duration => "duration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaySubject {
    Person,
    Department,
}

impl StaySubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaySubject::Person => "person",
            StaySubject::Department => "department",
        }
    }

    fn key<'a>(&self, p: &'a EnrichedPosition) -> &'a str {
        match self {
            StaySubject::Person => &p.tag_name,
            StaySubject::Department => &p.department,
        }
    }
}

fn stay_value(count: usize, total: usize, mode: StayMode, bucket_minutes: u32) -> f64 {
    match mode {
        StayMode::Percentage if total > 0 => 100.0 * count as f64 / total as f64,
        StayMode::Percentage => 0.0,
        StayMode::Duration => (count as u64 * u64::from(bucket_minutes)) as f64,
    }
}

/// Stay per `(subject, place)` over the whole input, sorted by subject then
/// place name.
pub fn overall_breakdown(
    positions: &[EnrichedPosition],
    subject: StaySubject,
    mode: StayMode,
    bucket_minutes: u32,
) -> Vec<StayRow> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for p in positions {
        let key = subject.key(p);
        *counts.entry((key, p.place_name.as_str())).or_default() += 1;
        *totals.entry(key).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((key, place), count)| StayRow {
            subject: key.to_string(),
            place_name: place.to_string(),
            count,
            value: stay_value(count, totals.get(key).copied().unwrap_or(0), mode, bucket_minutes),
        })
        .collect()
}

/// Stay per `(period, department, place)`, sorted in that order.
pub fn trend_breakdown(
    positions: &[EnrichedPosition],
    granularity: Granularity,
    mode: StayMode,
    bucket_minutes: u32,
) -> Vec<StayTrendRow> {
    let mut counts: BTreeMap<(Period, &str, &str), usize> = BTreeMap::new();
    let mut totals: BTreeMap<(Period, &str), usize> = BTreeMap::new();
    for p in positions {
        let period = Period::containing(&p.datetime, granularity);
        let dept = p.department.as_str();
        *counts.entry((period, dept, p.place_name.as_str())).or_default() += 1;
        *totals.entry((period, dept)).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((period, dept, place), count)| {
            let total = totals.get(&(period, dept)).copied().unwrap_or(0);
            StayTrendRow {
                period: period.label(),
                department: dept.to_string(),
                place_name: place.to_string(),
                count,
                value: stay_value(count, total, mode, bucket_minutes),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_datetime;

    fn pos(at: &str, tag: &str, dept: &str, place: &str) -> EnrichedPosition {
        EnrichedPosition {
            datetime: parse_datetime(at).unwrap(),
            node_id: place.to_string(),
            tag_id: tag.to_string(),
            tag_rssi: -50.0,
            tag_volt: None,
            place_name: place.to_string(),
            floor: None,
            west_to_east: None,
            tag_name: tag.to_string(),
            department: dept.to_string(),
        }
    }

    fn sample() -> Vec<EnrichedPosition> {
        vec![
            pos("2025-09-01 08:00:00", "Sato", "giken", "Desk"),
            pos("2025-09-01 08:05:00", "Sato", "giken", "Desk"),
            pos("2025-09-01 08:10:00", "Sato", "giken", "Desk"),
            pos("2025-09-01 08:15:00", "Sato", "giken", "Lobby"),
            pos("2025-09-08 08:00:00", "Ito", "giken", "Lobby"),
        ]
    }

    #[test]
    fn test_percentages_sum_to_hundred_per_subject() {
        let rows = overall_breakdown(&sample(), StaySubject::Person, StayMode::Percentage, 5);
        let sato: Vec<_> = rows.iter().filter(|r| r.subject == "Sato").collect();
        assert_eq!(sato.len(), 2);
        assert!((sato[0].value - 75.0).abs() < 1e-9);
        assert!((sato[1].value - 25.0).abs() < 1e-9);

        let ito_total: f64 = rows.iter().filter(|r| r.subject == "Ito").map(|r| r.value).sum();
        assert!((ito_total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_is_count_times_width() {
        let rows = overall_breakdown(&sample(), StaySubject::Department, StayMode::Duration, 5);
        let desk = rows.iter().find(|r| r.place_name == "Desk").unwrap();
        assert_eq!(desk.count, 3);
        assert_eq!(desk.value, 15.0);
    }

    #[test]
    fn test_weekly_trend_splits_periods() {
        let rows = trend_breakdown(&sample(), Granularity::Week, StayMode::Percentage, 5);
        let periods: Vec<_> = rows.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(
            periods,
            vec![
                "2025-09-01/2025-09-07",
                "2025-09-01/2025-09-07",
                "2025-09-08/2025-09-14",
            ]
        );
        assert!((rows[2].value - 100.0).abs() < 1e-9);
    }
}
