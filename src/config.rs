//! Pipeline configuration and named profiles.
//!
//! Every pipeline takes a [`PipelineConfig`] explicitly. Profiles are stored as
//! a plain JSON object on disk:
//! ```json
//! {
//!   "profiles": {
//!     "monthly_by_dept": {
//!       "granularity": "month",
//!       "subject": "tag_department",
//!       "filters": { "departments": ["airtro", "giken"] }
//!     }
//!   }
//! }
//! ```
//! Any field left out falls back to its default.

use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// How the winning node is chosen among the readings of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Node of the single strongest reading.
    #[default]
    Max,
    /// Node with the highest average RSSI.
    Mean,
    /// Node with the highest summed RSSI.
    Sum,
}

/// Period length used by the index calculators.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    /// Monday-aligned week.
    Week,
    #[default]
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        };
        f.write_str(s)
    }
}

/// Who an index row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKey {
    Tag,
    #[default]
    TagDepartment,
    Department,
}

/// What happens to rows whose tag has no department in the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UnaffiliatedPolicy {
    /// Keep them under the `unaffiliated` sentinel.
    #[default]
    Retain,
    /// Remove them from the enriched table.
    Drop,
}

/// Roster column plotted on the reservation panel of the comparison chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReservationAxis {
    #[default]
    Area,
    SeatNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub raw_readings: PathBuf,
    pub resolved: PathBuf,
    pub enriched: PathBuf,
    pub node_names: PathBuf,
    pub tag_names: PathBuf,
    pub reservations: PathBuf,
    pub effective_prefix: String,
    pub output_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            raw_readings: PathBuf::from("processed_tag_data.csv"),
            resolved: PathBuf::from("closest_node_per_interval.csv"),
            enriched: PathBuf::from("closest_node_per_interval_with_names.csv"),
            node_names: PathBuf::from("node_names.csv"),
            tag_names: PathBuf::from("tag_names.csv"),
            reservations: PathBuf::from("data/reservations.xlsx"),
            effective_prefix: "effective_locations".to_string(),
            output_dir: PathBuf::from("output_files"),
        }
    }
}

/// Row filters applied by the pipelines before aggregating.
///
/// Empty include lists mean "everything".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub departments: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Filters {
    pub fn admits_tag(&self, tag_id: &str) -> bool {
        if self.exclude_tags.iter().any(|t| t == tag_id) {
            return false;
        }
        self.include_tags.is_empty() || self.include_tags.iter().any(|t| t == tag_id)
    }

    pub fn admits_department(&self, department: &str) -> bool {
        self.departments.is_empty() || self.departments.iter().any(|d| d == department)
    }

    /// Inclusive on both ends: the end date covers its whole day.
    pub fn admits_time(&self, at: &NaiveDateTime) -> bool {
        if let Some(start) = self.start_date {
            if at.date() < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if at.date() > end {
                return false;
            }
        }
        true
    }
}

/// Remote time-series store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub table_name: String,
    pub partition_attribute: String,
    pub sort_attribute: String,
    pub payload_attribute: String,
    pub partition_value: String,
    /// Range bounds in the store's own text format.
    pub start: String,
    pub end: String,
    pub page_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            table_name: "mmms_rowdata".to_string(),
            partition_attribute: "bukken".to_string(),
            sort_attribute: "datetime".to_string(),
            payload_attribute: "rowdata".to_string(),
            partition_value: "tama_b".to_string(),
            start: "2025/09/01 08:00:00.000".to_string(),
            end: "2025/10/01 00:00:00.000".to_string(),
            page_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: Paths,
    pub bucket_minutes: u32,
    pub policy: AggregationPolicy,
    pub granularity: Granularity,
    pub subject: SubjectKey,
    pub filters: Filters,
    pub unaffiliated: UnaffiliatedPolicy,
    pub reservation_axis: ReservationAxis,
    pub source: SourceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            bucket_minutes: 5,
            policy: AggregationPolicy::default(),
            granularity: Granularity::default(),
            subject: SubjectKey::default(),
            filters: Filters::default(),
            unaffiliated: UnaffiliatedPolicy::default(),
            reservation_axis: ReservationAxis::default(),
            source: SourceConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket_minutes == 0 {
            bail!("bucket_minutes must be greater than zero");
        }
        if let (Some(start), Some(end)) = (self.filters.start_date, self.filters.end_date) {
            if end < start {
                bail!("end_date {end} is before start_date {start}");
            }
        }
        Ok(())
    }

    pub fn bucket_width(&self) -> Duration {
        Duration::minutes(i64::from(self.bucket_minutes))
    }

    /// Path of an artifact inside the configured output directory.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.paths.output_dir.join(file_name)
    }

    /// Effective-location table path for one granularity, e.g.
    /// `effective_locations_weekly.csv`.
    pub fn effective_table_path(&self, granularity: Granularity) -> PathBuf {
        let suffix = match granularity {
            Granularity::Day => "daily",
            Granularity::Week => "weekly",
            Granularity::Month => "monthly",
        };
        self.output_path(&format!("{}_{}.csv", self.paths.effective_prefix, suffix))
    }
}

/// Named presets replacing the per-variant script constants.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileBook {
    #[serde(default)]
    profiles: BTreeMap<String, PipelineConfig>,
}

impl ProfileBook {
    /// Loads the profile book from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile book '{}'", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("invalid profile book '{}'", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let book: ProfileBook = serde_json::from_str(content)?;
        for (name, profile) in &book.profiles {
            profile
                .validate()
                .with_context(|| format!("profile '{name}'"))?;
        }
        Ok(book)
    }

    pub fn get(&self, name: &str) -> Option<&PipelineConfig> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
