//! Parsers for the text formats coming out of the store and the spreadsheets:
//! timestamps in several layouts and the nested `rowdata` JSON payload.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::records::RawRecord;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parses a timestamp the way the exports write them.
///
/// Accepts `-` or `/` date separators, an optional `T`, optional seconds and
/// fractional seconds, bare dates (midnight), and RFC 3339 with an offset
/// (kept as wall-clock time). Returns `None` for anything else.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Flattens one store item's `rowdata` payload into raw records, one per tag.
///
/// The payload looks like
/// `{"node": {"id": "n1"}, "tag": [{"id": "t1", "rssi": -60, "volt": 3.1}]}`.
/// Tags without an id or RSSI are skipped.
///
/// # Errors
///
/// Returns an error if the payload is not JSON or carries no node id.
pub fn flatten_rowdata(datetime: &str, rowdata: &str) -> Result<Vec<RawRecord>> {
    let payload: Value = serde_json::from_str(rowdata)?;

    let node_id = payload
        .get("node")
        .and_then(|n| n.get("id"))
        .and_then(json_id)
        .ok_or_else(|| anyhow!("node id missing"))?;

    let tags = payload
        .get("tag")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let records = tags
        .iter()
        .filter_map(|tag| {
            let tag_id = tag.get("id").and_then(json_id)?;
            let tag_rssi = tag.get("rssi").and_then(json_number)?;
            Some(RawRecord {
                datetime: datetime.to_string(),
                node_id: node_id.clone(),
                tag_id,
                tag_rssi: Some(tag_rssi),
                tag_volt: tag.get("volt").and_then(json_number),
            })
        })
        .collect();

    Ok(records)
}

/// Ids arrive as strings or bare numbers depending on the firmware.
fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_store_format_with_millis() {
        let dt = parse_datetime("2025/09/01 08:00:00.250").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_csv_format() {
        let dt = parse_datetime("2025-09-01 12:34:56").unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (12, 34, 56));
    }

    #[test]
    fn test_parse_bare_date_is_midnight() {
        let dt = parse_datetime("2025-09-26").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (0, 0));
    }

    #[test]
    fn test_parse_rfc3339_keeps_wall_clock() {
        let dt = parse_datetime("2025-09-01T08:15:00+09:00").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (8, 15));
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("2025-13-01 00:00:00").is_none());
    }

    #[test]
    fn test_flatten_rowdata_one_record_per_tag() {
        let payload = r#"{"node":{"id":"n7"},"tag":[
            {"id":"0081f9860662","rssi":-61,"volt":3.0},
            {"id":"0081f986053f","rssi":"-70"}
        ]}"#;
        let records = flatten_rowdata("2025/09/01 08:00:00.000", payload).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].node_id, "n7");
        assert_eq!(records[0].tag_rssi, Some(-61.0));
        assert_eq!(records[0].tag_volt, Some(3.0));
        assert_eq!(records[1].tag_rssi, Some(-70.0));
        assert_eq!(records[1].tag_volt, None);
    }

    #[test]
    fn test_flatten_rowdata_numeric_node_id() {
        let records =
            flatten_rowdata("2025/09/01 08:00:00.000", r#"{"node":{"id":12},"tag":[{"id":"t","rssi":1}]}"#)
                .unwrap();
        assert_eq!(records[0].node_id, "12");
    }

    #[test]
    fn test_flatten_rowdata_skips_incomplete_tags() {
        let payload = r#"{"node":{"id":"n1"},"tag":[{"id":"t1"},{"rssi":-50},{"id":"t2","rssi":-40}]}"#;
        let records = flatten_rowdata("x", payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag_id, "t2");
    }

    #[test]
    fn test_flatten_rowdata_without_node_fails() {
        assert!(flatten_rowdata("x", r#"{"tag":[]}"#).is_err());
        assert!(flatten_rowdata("x", "{not json").is_err());
    }

    #[test]
    fn test_flatten_rowdata_without_tags_is_empty() {
        let records = flatten_rowdata("x", r#"{"node":{"id":"n1"}}"#).unwrap();
        assert!(records.is_empty());
    }
}
