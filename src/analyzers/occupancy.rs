//! Head counts per place over time, and check-in counts from the roster.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::analyzers::types::{CheckinCount, OccupancyRow};
use crate::config::Filters;
use crate::records::{EnrichedPosition, Reservation};

/// Distinct tags per `(bucket, place)`, sorted by time then place name.
pub fn occupancy(positions: &[EnrichedPosition]) -> Vec<OccupancyRow> {
    let mut seen: BTreeMap<(NaiveDateTime, &str), BTreeSet<&str>> = BTreeMap::new();
    for p in positions {
        seen.entry((p.datetime, p.place_name.as_str()))
            .or_default()
            .insert(p.tag_id.as_str());
    }

    seen.into_iter()
        .map(|((datetime, place_name), tags)| OccupancyRow {
            datetime,
            place_name: place_name.to_string(),
            user_count: tags.len(),
        })
        .collect()
}

/// Counts roster check-ins inside the filter's date range per user.
///
/// Rows without a check-in time are ignored. Sorted by count descending,
/// then user name.
pub fn checkin_ranking(reservations: &[Reservation], filters: &Filters) -> Vec<CheckinCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in reservations {
        let Some(check_in) = r.check_in else {
            continue;
        };
        if !filters.admits_time(&check_in) {
            continue;
        }
        *counts.entry(r.user.as_str()).or_default() += 1;
    }

    let mut ranking: Vec<CheckinCount> = counts
        .into_iter()
        .map(|(user, count)| CheckinCount {
            user: user.to_string(),
            count,
        })
        .collect();
    ranking.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user.cmp(&b.user)));
    ranking
}
