//! Effective-location tables: how many places, areas and floors a person
//! effectively used per day, week or month.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::analyzers::hhi::Concentration;
use crate::analyzers::period::Period;
use crate::analyzers::utility::{mode, mode_by, numeric_aware_cmp};
use crate::config::Granularity;
use crate::records::EnrichedPosition;

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveLocations {
    pub tag_name: String,
    pub period: Period,
    pub eff_loc_place: f64,
    /// Floor × west-to-east buckets.
    pub eff_loc_area: f64,
    pub eff_loc_floor: f64,
    pub department: Option<String>,
    pub floor: Option<String>,
    pub west_to_east: Option<String>,
}

impl EffectiveLocations {
    /// Column names; the period column is `date`, `week_start` or `month_start`.
    pub fn header(granularity: Granularity) -> [&'static str; 8] {
        let period_col = match granularity {
            Granularity::Day => "date",
            Granularity::Week => "week_start",
            Granularity::Month => "month_start",
        };
        [
            "tag_name",
            period_col,
            "eff_loc_place",
            "eff_loc_area",
            "eff_loc_floor",
            "department",
            "floor",
            "west_to_east",
        ]
    }

    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.tag_name.clone(),
            self.period.start.format("%Y-%m-%d").to_string(),
            self.eff_loc_place.to_string(),
            self.eff_loc_area.to_string(),
            self.eff_loc_floor.to_string(),
            self.department.clone().unwrap_or_default(),
            self.floor.clone().unwrap_or_default(),
            self.west_to_east.clone().unwrap_or_default(),
        ]
    }
}

/// An effective-location row read back from any of the three tables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EffectiveRecord {
    pub tag_name: String,
    #[serde(alias = "week_start", alias = "month_start")]
    pub date: NaiveDate,
    pub eff_loc_place: f64,
    pub eff_loc_area: f64,
    pub eff_loc_floor: f64,
    pub department: Option<String>,
    pub floor: Option<String>,
    pub west_to_east: Option<String>,
}

fn by_number(a: &String, b: &String) -> std::cmp::Ordering {
    numeric_aware_cmp(a, b)
}

/// One row per `(tag_name, period)`, sorted by tag name then period.
///
/// The trailing categorical columns hold the period's most frequent value.
pub fn effective_locations(
    positions: &[EnrichedPosition],
    granularity: Granularity,
) -> Vec<EffectiveLocations> {
    let mut groups: BTreeMap<(&str, Period), Vec<&EnrichedPosition>> = BTreeMap::new();
    for p in positions {
        groups
            .entry((p.tag_name.as_str(), Period::containing(&p.datetime, granularity)))
            .or_default()
            .push(p);
    }

    groups
        .into_iter()
        .map(|((tag_name, period), rows)| {
            let places = Concentration::of(rows.iter().map(|r| r.place_name.as_str()));
            let areas = Concentration::of(rows.iter().filter_map(|r| r.area()));
            let floors = Concentration::of(rows.iter().filter_map(|r| r.floor.as_deref()));

            let departments: Vec<String> = rows.iter().map(|r| r.department.clone()).collect();
            let floor_values: Vec<String> = rows.iter().filter_map(|r| r.floor.clone()).collect();
            let w2e_values: Vec<String> = rows.iter().filter_map(|r| r.west_to_east.clone()).collect();

            EffectiveLocations {
                tag_name: tag_name.to_string(),
                period,
                eff_loc_place: places.effective_count(),
                eff_loc_area: areas.effective_count(),
                eff_loc_floor: floors.effective_count(),
                department: mode(&departments),
                floor: mode_by(&floor_values, by_number),
                west_to_east: mode_by(&w2e_values, by_number),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_datetime;

    fn pos(at: &str, tag: &str, place: &str, floor: Option<&str>, w2e: Option<&str>) -> EnrichedPosition {
        EnrichedPosition {
            datetime: parse_datetime(at).unwrap(),
            node_id: place.to_string(),
            tag_id: tag.to_string(),
            tag_rssi: -50.0,
            tag_volt: None,
            place_name: place.to_string(),
            floor: floor.map(str::to_string),
            west_to_east: w2e.map(str::to_string),
            tag_name: tag.to_string(),
            department: "giken".to_string(),
        }
    }

    #[test]
    fn test_effective_counts_per_level() {
        let positions = vec![
            pos("2025-09-01 08:00:00", "Sato", "P1", Some("1"), Some("1")),
            pos("2025-09-01 08:05:00", "Sato", "P2", Some("1"), Some("1")),
            pos("2025-09-01 08:10:00", "Sato", "P3", Some("2"), Some("1")),
            pos("2025-09-01 08:15:00", "Sato", "P4", Some("2"), Some("2")),
        ];
        let rows = effective_locations(&positions, Granularity::Day);
        assert_eq!(rows.len(), 1);

        let r = &rows[0];
        assert!((r.eff_loc_place - 4.0).abs() < 1e-9);
        // areas (1,1) x2, (2,1), (2,2): shares .5 .25 .25 -> 1/0.375
        assert!((r.eff_loc_area - 1.0 / 0.375).abs() < 1e-9);
        assert!((r.eff_loc_floor - 2.0).abs() < 1e-9);
        // floor tie 1 vs 2 goes to the smaller
        assert_eq!(r.floor.as_deref(), Some("1"));
        assert_eq!(r.west_to_east.as_deref(), Some("1"));
        assert_eq!(r.department.as_deref(), Some("giken"));
    }

    #[test]
    fn test_floor_tie_compares_numbers() {
        let positions = vec![
            pos("2025-09-01 08:00:00", "Sato", "a", Some("10"), Some("12")),
            pos("2025-09-01 08:05:00", "Sato", "b", Some("2"), Some("3")),
        ];
        let rows = effective_locations(&positions, Granularity::Day);
        assert_eq!(rows[0].floor.as_deref(), Some("2"));
        assert_eq!(rows[0].west_to_east.as_deref(), Some("3"));
    }

    #[test]
    fn test_unknown_floor_counts_as_zero_areas() {
        let positions = vec![pos("2025-09-01 08:00:00", "Ito", "n9", None, None)];
        let rows = effective_locations(&positions, Granularity::Week);
        assert_eq!(rows[0].eff_loc_place, 1.0);
        assert_eq!(rows[0].eff_loc_area, 0.0);
        assert_eq!(rows[0].eff_loc_floor, 0.0);
        assert_eq!(rows[0].floor, None);
    }

    #[test]
    fn test_sorted_by_tag_then_period() {
        let positions = vec![
            pos("2025-09-09 08:00:00", "Sato", "P1", None, None),
            pos("2025-09-01 08:00:00", "Sato", "P1", None, None),
            pos("2025-09-01 08:00:00", "Abe", "P1", None, None),
        ];
        let rows = effective_locations(&positions, Granularity::Week);
        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.tag_name.as_str(), r.period.start.format("%m-%d").to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Abe", "09-01".to_string()),
                ("Sato", "09-01".to_string()),
                ("Sato", "09-08".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_period_column() {
        assert_eq!(EffectiveLocations::header(Granularity::Day)[1], "date");
        assert_eq!(EffectiveLocations::header(Granularity::Week)[1], "week_start");
        assert_eq!(EffectiveLocations::header(Granularity::Month)[1], "month_start");
    }
}
