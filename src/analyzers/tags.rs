//! Per-tag views over raw readings.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::analyzers::join::TagDirectory;
use crate::analyzers::types::LatestVoltage;
use crate::records::{RawReading, RawRecord, timestamp};

/// Most recent reading per tag, left-joined onto the tag table.
///
/// Every registered tag appears once, in table order. When several readings
/// share the latest timestamp the last one in input order wins.
pub fn latest_voltages(tags: &TagDirectory, readings: &[RawReading]) -> Vec<LatestVoltage> {
    let mut latest: HashMap<&str, &RawReading> = HashMap::new();
    for r in readings {
        let current = latest.entry(r.tag_id.as_str()).or_insert(r);
        if r.at >= current.at {
            *current = r;
        }
    }

    tags.entries()
        .iter()
        .map(|t| {
            let reading = latest.get(t.tag_id.as_str());
            LatestVoltage {
                tag_id: t.tag_id.clone(),
                tag_name: t.tag_name.clone(),
                department: t.department.clone(),
                datetime: reading.map(|r| format_timestamp(&r.at)),
                tag_volt: reading.and_then(|r| r.volt),
            }
        })
        .collect()
}

fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(timestamp::FORMAT).to_string()
}

/// Raw rows of a single tag, untouched.
pub fn select_tag(records: &[RawRecord], tag_id: &str) -> Vec<RawRecord> {
    records
        .iter()
        .filter(|r| r.tag_id.trim() == tag_id)
        .cloned()
        .collect()
}
