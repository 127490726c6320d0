//! Row types written by the report pipelines.
//!
//! Field order and `rename` attributes fix the CSV column layout.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::analyzers::hhi::IndexRow;
use crate::records::timestamp;

/// Mobility of one person per period, without department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMobilityRow {
    pub date_group: String,
    pub tag_name: String,
    #[serde(rename = "HHI")]
    pub hhi: f64,
    #[serde(rename = "Mobility_Index")]
    pub mobility_index: f64,
    pub date: NaiveDate,
}

/// Mobility of one person per period, split by department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeptTagMobilityRow {
    pub date_group: String,
    pub department: String,
    pub tag_name: String,
    #[serde(rename = "HHI")]
    pub hhi: f64,
    #[serde(rename = "Mobility_Index")]
    pub mobility_index: f64,
    pub date: NaiveDate,
}

/// Place dispersion of a whole department per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentDispersionRow {
    pub date_group: String,
    pub department: String,
    #[serde(rename = "Department_HHI")]
    pub department_hhi: f64,
    #[serde(rename = "Dispersion_Index")]
    pub dispersion_index: f64,
    pub date: NaiveDate,
}

impl From<&IndexRow> for TagMobilityRow {
    fn from(row: &IndexRow) -> Self {
        TagMobilityRow {
            date_group: row.period.label(),
            tag_name: row.tag_name.clone().unwrap_or_default(),
            hhi: row.concentration.hhi,
            mobility_index: row.concentration.inverted(),
            date: row.period.start,
        }
    }
}

impl From<&IndexRow> for DeptTagMobilityRow {
    fn from(row: &IndexRow) -> Self {
        DeptTagMobilityRow {
            date_group: row.period.label(),
            department: row.department.clone().unwrap_or_default(),
            tag_name: row.tag_name.clone().unwrap_or_default(),
            hhi: row.concentration.hhi,
            mobility_index: row.concentration.inverted(),
            date: row.period.start,
        }
    }
}

impl From<&IndexRow> for DepartmentDispersionRow {
    fn from(row: &IndexRow) -> Self {
        DepartmentDispersionRow {
            date_group: row.period.label(),
            department: row.department.clone().unwrap_or_default(),
            department_hhi: row.concentration.hhi,
            dispersion_index: row.concentration.inverted(),
            date: row.period.start,
        }
    }
}

/// Distinct tags seen at a place within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyRow {
    #[serde(with = "timestamp")]
    pub datetime: NaiveDateTime,
    pub place_name: String,
    pub user_count: usize,
}

/// Check-ins per roster user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckinCount {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "CheckinCount")]
    pub count: usize,
}

/// Stay at one place for one subject (a person or a department) over the
/// whole input. `value` is a percentage or minutes depending on the mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StayRow {
    pub subject: String,
    pub place_name: String,
    pub count: usize,
    pub value: f64,
}

/// Stay at one place for one department within one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StayTrendRow {
    pub period: String,
    pub department: String,
    pub place_name: String,
    pub count: usize,
    pub value: f64,
}

/// Average effective area count of one person at each granularity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkstyleRow {
    pub tag_name: String,
    pub department: Option<String>,
    #[serde(rename = "Daily_Avg")]
    pub daily_avg: Option<f64>,
    #[serde(rename = "Weekly_Avg")]
    pub weekly_avg: Option<f64>,
    #[serde(rename = "Monthly_Avg")]
    pub monthly_avg: Option<f64>,
}

/// Most recent voltage of a registered tag; the reading fields stay empty
/// for tags that were never seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestVoltage {
    pub tag_id: String,
    pub tag_name: Option<String>,
    pub department: Option<String>,
    pub datetime: Option<String>,
    pub tag_volt: Option<f64>,
}
