//! Row types flowing between the pipeline stages.
//!
//! Wire types mirror the CSV columns one to one; typed readings carry parsed
//! timestamps. Column names and order are part of the file format and are
//! fixed by the field order and `rename` attributes below.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::parser::parse_datetime;

/// Department assigned to tags that are missing from the tag table.
pub const UNAFFILIATED: &str = "unaffiliated";

/// Raw reading as exported from the store (`processed_tag_data.csv`).
///
/// Timestamps stay in the store's text format so the export is lossless;
/// [`RawRecord::parse`] turns it into a [`RawReading`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub datetime: String,
    pub node_id: String,
    pub tag_id: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub tag_rssi: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub tag_volt: Option<f64>,
}

impl RawRecord {
    /// `None` when the timestamp does not parse or the RSSI is missing.
    pub fn parse(&self) -> Option<RawReading> {
        Some(RawReading {
            at: parse_datetime(&self.datetime)?,
            node_id: self.node_id.trim().to_string(),
            tag_id: self.tag_id.trim().to_string(),
            rssi: self.tag_rssi?,
            volt: self.tag_volt,
        })
    }
}

/// One tag detection at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub at: NaiveDateTime,
    pub node_id: String,
    pub tag_id: String,
    pub rssi: f64,
    pub volt: Option<f64>,
}

/// The node judged closest to a tag within one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPosition {
    #[serde(with = "timestamp")]
    pub datetime: NaiveDateTime,
    pub node_id: String,
    pub tag_id: String,
    pub tag_rssi: f64,
    pub tag_volt: Option<f64>,
}

/// A resolved position with its place and tag metadata attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPosition {
    #[serde(with = "timestamp")]
    pub datetime: NaiveDateTime,
    pub node_id: String,
    pub tag_id: String,
    pub tag_rssi: f64,
    pub tag_volt: Option<f64>,
    pub place_name: String,
    pub floor: Option<String>,
    pub west_to_east: Option<String>,
    pub tag_name: String,
    pub department: String,
}

impl EnrichedPosition {
    /// Floor × west-to-east bucket, `None` when either half is unknown.
    pub fn area(&self) -> Option<(String, String)> {
        Some((self.floor.clone()?, self.west_to_east.clone()?))
    }
}

/// Row of `node_names.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub place_name: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub west_to_east: Option<String>,
}

/// Row of `tag_names.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagInfo {
    pub tag_id: String,
    pub tag_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// One check-in/check-out entry of the reservation roster.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub user: String,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub seat_number: Option<String>,
    pub area: Option<String>,
}

/// A reservation expanded to one row per bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationSlot {
    #[serde(with = "timestamp")]
    pub datetime: NaiveDateTime,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "SeatNumber")]
    pub seat_number: Option<String>,
    #[serde(rename = "Area")]
    pub area: Option<String>,
}

/// `YYYY-MM-DD HH:MM:SS` on the way out, anything [`parse_datetime`]
/// understands on the way in.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::parser::parse_datetime;

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_datetime(&raw).ok_or_else(|| de::Error::custom(format!("invalid datetime '{raw}'")))
    }
}
