//! Herfindahl-Hirschman concentration of time spent across places.
//!
//! Shares are expressed in percent, so HHI ranges over `[0, 10000]`:
//! a subject seen at a single place scores 10000, one spread evenly over
//! `n` places scores `10000 / n`. The inverted index `10000 - HHI` reads as
//! mobility (per person) or dispersion (per department). The effective
//! count `1 / Σ p²` (fractional shares) is the number of equally used places
//! that would give the same concentration.

use std::collections::BTreeMap;

use crate::analyzers::period::Period;
use crate::config::{Granularity, SubjectKey};
use crate::records::EnrichedPosition;

pub const HHI_MAX: f64 = 10_000.0;

/// Concentration of one group of categorical observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Concentration {
    pub observations: usize,
    pub hhi: f64,
}

impl Concentration {
    /// From per-category counts; zero counts are ignored.
    pub fn from_counts<I: IntoIterator<Item = usize>>(counts: I) -> Self {
        let counts: Vec<usize> = counts.into_iter().filter(|&c| c > 0).collect();
        let total: usize = counts.iter().sum();
        if total == 0 {
            return Concentration { observations: 0, hhi: 0.0 };
        }

        let hhi = counts
            .iter()
            .map(|&c| {
                let share_pct = c as f64 / total as f64 * 100.0;
                share_pct * share_pct
            })
            .sum::<f64>()
            .min(HHI_MAX);

        Concentration { observations: total, hhi }
    }

    /// From raw observations, one per row.
    ///
    /// Counts are summed in key order so the result does not depend on the
    /// order rows arrive in.
    pub fn of<T: Ord, I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut counts: BTreeMap<T, usize> = BTreeMap::new();
        for v in values {
            *counts.entry(v).or_default() += 1;
        }
        Self::from_counts(counts.into_values())
    }

    /// `10000 - HHI`; an empty group scores 0 rather than full dispersion.
    pub fn inverted(&self) -> f64 {
        if self.observations == 0 {
            0.0
        } else {
            HHI_MAX - self.hhi
        }
    }

    /// `1 / Σ p²`; 0 for an empty group.
    pub fn effective_count(&self) -> f64 {
        if self.observations == 0 || self.hhi == 0.0 {
            0.0
        } else {
            HHI_MAX / self.hhi
        }
    }
}

/// One `(period, subject)` row of an index table.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub period: Period,
    /// `None` when the subject is a tag alone.
    pub department: Option<String>,
    /// `None` when the subject is a department.
    pub tag_name: Option<String>,
    pub concentration: Concentration,
}

/// Computes the place concentration of every subject in every period.
///
/// Rows come out sorted by period, department, then tag name.
pub fn concentration_index(
    positions: &[EnrichedPosition],
    granularity: Granularity,
    subject: SubjectKey,
) -> Vec<IndexRow> {
    type Key = (Period, Option<String>, Option<String>);
    let mut groups: BTreeMap<Key, BTreeMap<&str, usize>> = BTreeMap::new();

    for p in positions {
        let period = Period::containing(&p.datetime, granularity);
        let (department, tag_name) = match subject {
            SubjectKey::Tag => (None, Some(p.tag_name.clone())),
            SubjectKey::TagDepartment => (Some(p.department.clone()), Some(p.tag_name.clone())),
            SubjectKey::Department => (Some(p.department.clone()), None),
        };
        *groups
            .entry((period, department, tag_name))
            .or_default()
            .entry(p.place_name.as_str())
            .or_default() += 1;
    }

    groups
        .into_iter()
        .map(|((period, department, tag_name), places)| IndexRow {
            period,
            department,
            tag_name,
            concentration: Concentration::from_counts(places.into_values()),
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

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_single_place_is_fully_concentrated() {
        let c = Concentration::of(["desk"; 7]);
        assert!(close(c.hhi, 10_000.0));
        assert!(close(c.inverted(), 0.0));
        assert!(close(c.effective_count(), 1.0));
    }

    #[test]
    fn test_uniform_places_give_n() {
        for n in 1..=6usize {
            let c = Concentration::from_counts(vec![3; n]);
            assert!(close(c.hhi, 10_000.0 / n as f64), "n={n}");
            assert!(close(c.effective_count(), n as f64), "n={n}");
        }
    }

    #[test]
    fn test_four_equal_places() {
        let c = Concentration::of(["a", "b", "c", "d", "a", "b", "c", "d"]);
        assert!(close(c.effective_count(), 4.0));
        assert!(close(c.hhi, 2500.0));
        assert!(close(c.inverted(), 7500.0));
    }

    #[test]
    fn test_bounds_hold_for_skewed_counts() {
        let samples: Vec<Vec<usize>> = vec![
            vec![1],
            vec![1, 1000],
            vec![5, 3, 1, 1],
            vec![2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
            vec![999_999, 1],
        ];
        for counts in samples {
            let c = Concentration::from_counts(counts.clone());
            assert!((0.0..=10_000.0).contains(&c.hhi), "{counts:?}");
            assert!((0.0..=10_000.0).contains(&c.inverted()), "{counts:?}");
            assert!(c.effective_count() >= 1.0 - 1e-12, "{counts:?}");
        }
    }

    #[test]
    fn test_bounds_hold_for_generated_counts() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(0x7a6);
        for _ in 0..2_000 {
            let len = rng.gen_range(1..=40);
            let counts: Vec<usize> = (0..len).map(|_| rng.gen_range(0..=500)).collect();
            let c = Concentration::from_counts(counts.clone());

            if c.observations == 0 {
                assert_eq!((c.hhi, c.inverted()), (0.0, 0.0), "{counts:?}");
                continue;
            }
            let places = counts.iter().filter(|&&n| n > 0).count() as f64;
            assert!(c.hhi >= HHI_MAX / places - 1e-6 && c.hhi <= HHI_MAX, "{counts:?}");
            assert!(close(c.inverted(), HHI_MAX - c.hhi), "{counts:?}");
            assert!((0.0..=HHI_MAX).contains(&c.inverted()), "{counts:?}");
            assert!(c.effective_count() >= 1.0 - 1e-9, "{counts:?}");
            assert!(c.effective_count() <= places + 1e-9, "{counts:?}");
        }
    }

    #[test]
    fn test_result_does_not_depend_on_row_order() {
        use rand::SeedableRng;
        use rand::rngs::SmallRng;
        use rand::seq::SliceRandom;

        let mut rows: Vec<String> = (0..37)
            .flat_map(|i| std::iter::repeat(format!("place{i}")).take(i % 7 + 1))
            .collect();
        let expected = Concentration::of(rows.iter().map(String::as_str));

        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..20 {
            rows.shuffle(&mut rng);
            let c = Concentration::of(rows.iter().map(String::as_str));
            assert_eq!(c.hhi.to_bits(), expected.hhi.to_bits());
        }
    }

    #[test]
    fn test_empty_group_is_zero_not_error() {
        let c = Concentration::from_counts(Vec::<usize>::new());
        assert_eq!(c.observations, 0);
        assert_eq!(c.effective_count(), 0.0);
        assert_eq!(c.inverted(), 0.0);

        let zeros = Concentration::from_counts(vec![0, 0]);
        assert_eq!(zeros.effective_count(), 0.0);
    }

    #[test]
    fn test_index_by_tag_and_department() {
        let positions = vec![
            pos("2025-09-01 08:00:00", "Sato", "giken", "A"),
            pos("2025-09-01 08:05:00", "Sato", "giken", "B"),
            pos("2025-09-02 08:00:00", "Sato", "giken", "A"),
            pos("2025-09-02 08:05:00", "Sato", "giken", "A"),
            pos("2025-09-01 08:00:00", "Ito", "airtro", "A"),
        ];

        let rows = concentration_index(&positions, Granularity::Month, SubjectKey::TagDepartment);
        assert_eq!(rows.len(), 2);
        // sorted by department: airtro first
        assert_eq!(rows[0].department.as_deref(), Some("airtro"));
        assert!(close(rows[0].concentration.hhi, 10_000.0));
        // Sato: A 3/4, B 1/4 -> 75^2 + 25^2 = 6250
        assert_eq!(rows[1].tag_name.as_deref(), Some("Sato"));
        assert!(close(rows[1].concentration.hhi, 6250.0));
        assert!(close(rows[1].concentration.inverted(), 3750.0));

        let daily = concentration_index(&positions, Granularity::Day, SubjectKey::Tag);
        assert_eq!(daily.len(), 3);
        assert!(daily.iter().all(|r| r.department.is_none()));
        let sato_day1 = daily
            .iter()
            .find(|r| r.tag_name.as_deref() == Some("Sato") && r.period.label() == "2025-09-01")
            .unwrap();
        assert!(close(sato_day1.concentration.hhi, 5000.0));
    }

    #[test]
    fn test_department_subject_pools_people() {
        let positions = vec![
            pos("2025-09-01 08:00:00", "Sato", "giken", "A"),
            pos("2025-09-01 08:00:00", "Kato", "giken", "B"),
        ];
        let rows = concentration_index(&positions, Granularity::Week, SubjectKey::Department);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tag_name, None);
        assert!(close(rows[0].concentration.hhi, 5000.0));
        assert!(close(rows[0].concentration.inverted(), 5000.0));
    }
}
