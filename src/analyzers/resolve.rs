//! Closest-node resolution: one node per tag per time bucket.

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

use crate::config::AggregationPolicy;
use crate::records::{RawReading, ResolvedPosition};

/// Start of the fixed-width bucket containing `at`, counted from midnight.
pub fn bucket_start(at: &NaiveDateTime, width: Duration) -> NaiveDateTime {
    let midnight = at.date().and_hms_opt(0, 0, 0).unwrap_or(*at);
    let width_secs = width.num_seconds().max(1);
    let offset = (*at - midnight).num_seconds();
    midnight + Duration::seconds(offset - offset.rem_euclid(width_secs))
}

/// Resolves readings to the closest node per `(bucket, tag_id)`.
///
/// Output is sorted by bucket then tag id. Ties keep the earliest reading
/// for [`AggregationPolicy::Max`] and the smallest node id otherwise.
pub fn resolve_closest_nodes(
    readings: &[RawReading],
    policy: AggregationPolicy,
    width: Duration,
) -> Vec<ResolvedPosition> {
    let mut groups: BTreeMap<(NaiveDateTime, &str), Vec<&RawReading>> = BTreeMap::new();
    for r in readings.iter().filter(|r| !r.rssi.is_nan()) {
        groups
            .entry((bucket_start(&r.at, width), r.tag_id.as_str()))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .filter_map(|((bucket, tag_id), group)| {
            let (node_id, tag_rssi, tag_volt) = match policy {
                AggregationPolicy::Max => strongest_reading(&group)?,
                AggregationPolicy::Mean | AggregationPolicy::Sum => best_node(&group, policy)?,
            };
            Some(ResolvedPosition {
                datetime: bucket,
                node_id,
                tag_id: tag_id.to_string(),
                tag_rssi,
                tag_volt,
            })
        })
        .collect()
}

fn strongest_reading(group: &[&RawReading]) -> Option<(String, f64, Option<f64>)> {
    let mut best: Option<&RawReading> = None;
    for &r in group {
        if best.is_none_or(|b| r.rssi > b.rssi) {
            best = Some(r);
        }
    }
    best.map(|r| (r.node_id.clone(), r.rssi, r.volt))
}

#[derive(Default)]
struct NodeTally {
    rssi_sum: f64,
    count: usize,
    volt_sum: f64,
    volt_count: usize,
}

fn best_node(group: &[&RawReading], policy: AggregationPolicy) -> Option<(String, f64, Option<f64>)> {
    let mut tallies: BTreeMap<&str, NodeTally> = BTreeMap::new();
    for r in group {
        let t = tallies.entry(r.node_id.as_str()).or_default();
        t.rssi_sum += r.rssi;
        t.count += 1;
        if let Some(v) = r.volt {
            t.volt_sum += v;
            t.volt_count += 1;
        }
    }

    let mut best: Option<(&str, f64, &NodeTally)> = None;
    for (&node, tally) in &tallies {
        let score = match policy {
            AggregationPolicy::Mean => tally.rssi_sum / tally.count as f64,
            _ => tally.rssi_sum,
        };
        if best.is_none_or(|(_, s, _)| score > s) {
            best = Some((node, score, tally));
        }
    }

    best.map(|(node, score, tally)| {
        let volt = (tally.volt_count > 0).then(|| tally.volt_sum / tally.volt_count as f64);
        (node.to_string(), score, volt)
    })
}
