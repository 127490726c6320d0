//! Stages that move raw readings around: remote fetch, closest-node
//! resolution, lookup joins, per-tag extracts and artifact publishing.

use std::path::PathBuf;
use tracing::{info, warn};

use super::require_rows;
use crate::analyzers::join::{NodeDirectory, TagDirectory, enrich_positions};
use crate::analyzers::resolve::resolve_closest_nodes;
use crate::analyzers::tags::{latest_voltages, select_tag as extract_tag};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::fetch::{ReadingStore, fetch_readings};
use crate::infra::s3::{PublishTarget, publish_artifacts};
use crate::output::{read_records, read_timestamped, write_records};
use crate::records::{RawReading, RawRecord, ResolvedPosition};

/// Pulls the configured range from the store into the raw readings CSV.
#[tracing::instrument(skip_all, fields(table = %cfg.source.table_name))]
pub async fn fetch<S: ReadingStore>(cfg: &PipelineConfig, store: &S) -> PipelineResult<Vec<PathBuf>> {
    let records = require_rows(fetch_readings(store, &cfg.source).await?, "fetch")?;
    write_records(&cfg.paths.raw_readings, &records)?;
    Ok(vec![cfg.paths.raw_readings.clone()])
}

/// Raw records parsed into readings; unparseable rows are dropped.
fn parse_readings(records: &[RawRecord]) -> Vec<RawReading> {
    let readings: Vec<RawReading> = records.iter().filter_map(RawRecord::parse).collect();
    let dropped = records.len() - readings.len();
    if dropped > 0 {
        warn!(dropped, "Dropped readings with an invalid timestamp or missing RSSI");
    }
    readings
}

/// Resolves every tag to its closest node per bucket.
#[tracing::instrument(skip_all, fields(policy = ?cfg.policy, bucket_minutes = cfg.bucket_minutes))]
pub fn resolve(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let records: Vec<RawRecord> = read_records(&cfg.paths.raw_readings)?;
    let readings: Vec<RawReading> = parse_readings(&records)
        .into_iter()
        .filter(|r| cfg.filters.admits_tag(&r.tag_id) && cfg.filters.admits_time(&r.at))
        .collect();
    info!(raw = records.len(), kept = readings.len(), "Readings loaded");

    let resolved = resolve_closest_nodes(&readings, cfg.policy, cfg.bucket_width());
    let resolved = require_rows(resolved, "resolve")?;
    write_records(&cfg.paths.resolved, &resolved)?;
    Ok(vec![cfg.paths.resolved.clone()])
}

/// Joins resolved positions with the node and tag tables.
#[tracing::instrument(skip_all, fields(unaffiliated = ?cfg.unaffiliated))]
pub fn enrich(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions: Vec<ResolvedPosition> = read_timestamped(&cfg.paths.resolved)?;
    let nodes = NodeDirectory::load(&cfg.paths.node_names)?;
    let tags = TagDirectory::load(&cfg.paths.tag_names)?;

    let enriched = enrich_positions(&positions, &nodes, &tags, cfg.unaffiliated);
    info!(resolved = positions.len(), enriched = enriched.len(), "Positions enriched");

    let enriched = require_rows(enriched, "enrich")?;
    write_records(&cfg.paths.enriched, &enriched)?;
    Ok(vec![cfg.paths.enriched.clone()])
}

/// Latest voltage of every registered tag.
#[tracing::instrument(skip_all)]
pub fn voltage(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let records: Vec<RawRecord> = read_records(&cfg.paths.raw_readings)?;
    let readings = parse_readings(&records);
    let tags = TagDirectory::load(&cfg.paths.tag_names)?;

    let latest = require_rows(latest_voltages(&tags, &readings), "joining voltages")?;
    let never_seen = latest.iter().filter(|v| v.datetime.is_none()).count();
    if never_seen > 0 {
        warn!(never_seen, "Registered tags without any reading");
    }

    let path = cfg.output_path("tag_voltages_latest.csv");
    write_records(&path, &latest)?;
    Ok(vec![path])
}

/// Copies one tag's raw rows into their own CSV.
#[tracing::instrument(skip(cfg))]
pub fn select_tag(cfg: &PipelineConfig, tag_id: &str) -> PipelineResult<Vec<PathBuf>> {
    let records: Vec<RawRecord> = read_records(&cfg.paths.raw_readings)?;
    let selected = require_rows(extract_tag(&records, tag_id.trim()), "selecting tag")?;

    let path = cfg.output_path(&format!("tag_select_{}.csv", tag_id.trim()));
    write_records(&path, &selected)?;
    Ok(vec![path])
}

/// Uploads every artifact of the output directory.
pub async fn publish(
    cfg: &PipelineConfig,
    client: &aws_sdk_s3::Client,
    target: &PublishTarget,
) -> PipelineResult<usize> {
    let uploaded = publish_artifacts(client, target, &cfg.paths.output_dir).await?;
    if uploaded == 0 {
        warn!(dir = %cfg.paths.output_dir.display(), "No artifacts to publish");
    }
    Ok(uploaded)
}
