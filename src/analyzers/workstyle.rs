//! Work-style summary built from the effective-location tables.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::effective::EffectiveRecord;
use crate::analyzers::types::WorkstyleRow;
use crate::analyzers::utility::{mean, median, mode};

/// The `eff_loc_area` values of one person, for box plots.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaDistribution {
    pub tag_name: String,
    pub department: Option<String>,
    pub values: Vec<f64>,
}

/// Per-person distributions, highest median first.
pub fn area_distributions(records: &[EffectiveRecord]) -> Vec<AreaDistribution> {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<String>)> = BTreeMap::new();
    for r in records {
        let (values, departments) = groups.entry(r.tag_name.as_str()).or_default();
        values.push(r.eff_loc_area);
        if let Some(d) = &r.department {
            departments.push(d.clone());
        }
    }

    let mut out: Vec<AreaDistribution> = groups
        .into_iter()
        .map(|(tag_name, (values, departments))| AreaDistribution {
            tag_name: tag_name.to_string(),
            department: mode(&departments),
            values,
        })
        .collect();

    out.sort_by(|a, b| {
        let ma = median(&a.values).unwrap_or(f64::NEG_INFINITY);
        let mb = median(&b.values).unwrap_or(f64::NEG_INFINITY);
        mb.total_cmp(&ma).then_with(|| a.tag_name.cmp(&b.tag_name))
    });
    out
}

fn average_by_tag(records: &[EffectiveRecord]) -> BTreeMap<&str, f64> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in records {
        groups.entry(r.tag_name.as_str()).or_default().push(r.eff_loc_area);
    }
    groups.into_iter().map(|(k, v)| (k, mean(&v))).collect()
}

/// Mean `eff_loc_area` per person at each granularity, outer-joined by tag
/// name and sorted by it.
///
/// The department comes from the daily table; people that only appear in
/// the weekly or monthly table have none.
pub fn workstyle_summary(
    daily: &[EffectiveRecord],
    weekly: &[EffectiveRecord],
    monthly: &[EffectiveRecord],
) -> Vec<WorkstyleRow> {
    let daily_avg = average_by_tag(daily);
    let weekly_avg = average_by_tag(weekly);
    let monthly_avg = average_by_tag(monthly);

    let mut departments: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for r in daily {
        if let Some(d) = &r.department {
            departments.entry(r.tag_name.as_str()).or_default().push(d.clone());
        }
    }

    let names: BTreeSet<&str> = daily_avg
        .keys()
        .chain(weekly_avg.keys())
        .chain(monthly_avg.keys())
        .copied()
        .collect();

    names
        .into_iter()
        .map(|name| WorkstyleRow {
            tag_name: name.to_string(),
            department: departments.get(name).and_then(|d| mode(d)),
            daily_avg: daily_avg.get(name).copied(),
            weekly_avg: weekly_avg.get(name).copied(),
            monthly_avg: monthly_avg.get(name).copied(),
        })
        .collect()
}

/// Rows ordered by monthly average ascending; rows without one go last.
pub fn dumbbell_order(rows: &[WorkstyleRow]) -> Vec<&WorkstyleRow> {
    let mut ordered: Vec<&WorkstyleRow> = rows.iter().collect();
    ordered.sort_by(|a, b| match (a.monthly_avg, b.monthly_avg) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(tag: &str, day: u32, area: f64, dept: Option<&str>) -> EffectiveRecord {
        EffectiveRecord {
            tag_name: tag.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 9, day).unwrap(),
            eff_loc_place: area,
            eff_loc_area: area,
            eff_loc_floor: 1.0,
            department: dept.map(str::to_string),
            floor: None,
            west_to_east: None,
        }
    }

    #[test]
    fn test_summary_outer_joins_by_tag() {
        let daily = vec![
            rec("Sato", 1, 1.0, Some("giken")),
            rec("Sato", 2, 3.0, Some("giken")),
        ];
        let weekly = vec![rec("Sato", 1, 2.5, Some("giken")), rec("Ito", 1, 1.5, Some("airtro"))];
        let monthly = vec![rec("Sato", 1, 4.0, Some("giken"))];

        let rows = workstyle_summary(&daily, &weekly, &monthly);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].tag_name, "Ito");
        assert_eq!(rows[0].department, None);
        assert_eq!(rows[0].daily_avg, None);
        assert_eq!(rows[0].weekly_avg, Some(1.5));

        assert_eq!(rows[1].department.as_deref(), Some("giken"));
        assert_eq!(rows[1].daily_avg, Some(2.0));
        assert_eq!(rows[1].monthly_avg, Some(4.0));
    }

    #[test]
    fn test_distributions_sorted_by_median_descending() {
        let records = vec![
            rec("Abe", 1, 1.0, Some("giken")),
            rec("Abe", 2, 1.0, Some("giken")),
            rec("Sato", 1, 2.0, Some("giken")),
            rec("Sato", 2, 4.0, Some("giken")),
        ];
        let dists = area_distributions(&records);
        assert_eq!(dists[0].tag_name, "Sato");
        assert_eq!(dists[0].values, vec![2.0, 4.0]);
        assert_eq!(dists[1].tag_name, "Abe");
    }

    #[test]
    fn test_dumbbell_order_puts_missing_monthly_last() {
        let row = |name: &str, monthly: Option<f64>| WorkstyleRow {
            tag_name: name.to_string(),
            department: None,
            daily_avg: Some(1.0),
            weekly_avg: None,
            monthly_avg: monthly,
        };
        let rows = vec![row("a", Some(3.0)), row("b", None), row("c", Some(1.0))];
        let names: Vec<_> = dumbbell_order(&rows).iter().map(|r| r.tag_name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
