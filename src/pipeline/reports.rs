//! Descriptive reports over enriched positions and the reservation roster.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{load_enriched, panel_departments, render_chart, require_rows};
use crate::analyzers::join::NodeDirectory;
use crate::analyzers::occupancy::{checkin_ranking, occupancy as occupancy_rows};
use crate::analyzers::reservation::expand_reservations;
use crate::analyzers::stay::{StayMode, StaySubject, overall_breakdown, trend_breakdown};
use crate::charts::Series;
use crate::charts::bar::{StackedPanel, ranking_bars, stacked_bars};
use crate::charts::line::{CategoryPanel, Track, ValuePanel, category_timeline, value_lines};
use crate::config::{Granularity, PipelineConfig, ReservationAxis};
use crate::error::{PipelineError, PipelineResult};
use crate::infra::roster::load_roster;
use crate::output::write_records;
use crate::records::{EnrichedPosition, Reservation, ReservationSlot};

/// Head count per place per bucket.
#[tracing::instrument(skip_all)]
pub fn occupancy(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions = load_enriched(cfg)?;
    let rows = require_rows(occupancy_rows(&positions), "occupancy")?;

    let csv_path = cfg.output_path("area_occupancy_trend.csv");
    write_records(&csv_path, &rows)?;

    let nodes = NodeDirectory::load(&cfg.paths.node_names)?;
    let places = nodes.order_places(rows.iter().map(|r| r.place_name.clone()));
    let series: Vec<Series<NaiveDateTime>> = places
        .iter()
        .map(|place| Series {
            name: place.clone(),
            points: rows
                .iter()
                .filter(|r| r.place_name == *place)
                .map(|r| (r.datetime, r.user_count as f64))
                .collect(),
        })
        .collect();
    let panels = [ValuePanel { title: String::new(), series }];

    let chart = render_chart(cfg.output_path("area_occupancy_trend.svg"), |path| {
        value_lines(path, "People per place over time", "people", None, &panels)
    })?;
    Ok(vec![csv_path, chart])
}

/// Builds one stacked panel from `(category, place, value)` cells; segments
/// follow `places`, categories keep their first-seen order.
fn stacked_panel<'a, I>(title: String, cells: I, places: &[String]) -> StackedPanel
where
    I: IntoIterator<Item = (&'a str, &'a str, f64)>,
{
    let cells: Vec<(&str, &str, f64)> = cells.into_iter().collect();

    let mut categories: Vec<String> = Vec::new();
    for (category, _, _) in &cells {
        if !categories.iter().any(|c| c == category) {
            categories.push(category.to_string());
        }
    }
    let present: BTreeSet<&str> = cells.iter().map(|(_, place, _)| *place).collect();
    let segments: Vec<String> = places.iter().filter(|p| present.contains(p.as_str())).cloned().collect();

    let mut values = vec![vec![0.0; segments.len()]; categories.len()];
    for (category, place, value) in &cells {
        let c = categories.iter().position(|x| x == category);
        let s = segments.iter().position(|x| x == place);
        if let (Some(c), Some(s)) = (c, s) {
            values[c][s] += value;
        }
    }

    StackedPanel { title, categories, segments, values }
}

fn stay_axis(mode: StayMode) -> &'static str {
    match mode {
        StayMode::Percentage => "share of stay (%)",
        StayMode::Duration => "total stay (minutes)",
    }
}

/// Stacked stay breakdowns: overall per person and per department, and per
/// department over days and weeks, each as shares and as minutes.
#[tracing::instrument(skip_all, fields(bucket_minutes = cfg.bucket_minutes))]
pub fn totalling(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions = load_enriched(cfg)?;
    let nodes = NodeDirectory::load(&cfg.paths.node_names)?;
    let places = nodes.order_places(positions.iter().map(|p| p.place_name.clone()));
    let modes = [StayMode::Percentage, StayMode::Duration];

    let mut written = Vec::new();
    for subject in [StaySubject::Person, StaySubject::Department] {
        for mode in modes {
            let rows = overall_breakdown(&positions, subject, mode, cfg.bucket_minutes);
            let stem = format!("overall_{}_stay_{}", subject.as_str(), mode.as_str());
            let csv_path = cfg.output_path(&format!("{stem}.csv"));
            write_records(&csv_path, &rows)?;
            written.push(csv_path);

            let title = format!("Overall stay per {} ({})", subject.as_str(), mode.as_str());
            let panel = stacked_panel(
                String::new(),
                rows.iter().map(|r| (r.subject.as_str(), r.place_name.as_str(), r.value)),
                &places,
            );
            written.push(render_chart(cfg.output_path(&format!("{stem}.svg")), |path| {
                stacked_bars(path, &title, stay_axis(mode), mode == StayMode::Percentage, &[panel])
            })?);
        }
    }

    for (granularity, label) in [(Granularity::Day, "daily"), (Granularity::Week, "weekly")] {
        for mode in modes {
            let rows = trend_breakdown(&positions, granularity, mode, cfg.bucket_minutes);
            let stem = format!("department_trends_{label}_{}", mode.as_str());
            let csv_path = cfg.output_path(&format!("{stem}.csv"));
            write_records(&csv_path, &rows)?;
            written.push(csv_path);

            let departments = panel_departments(cfg, rows.iter().map(|r| r.department.as_str()));
            let panels: Vec<StackedPanel> = departments
                .iter()
                .map(|dept| {
                    stacked_panel(
                        dept.clone(),
                        rows.iter()
                            .filter(|r| r.department == *dept)
                            .map(|r| (r.period.as_str(), r.place_name.as_str(), r.value)),
                        &places,
                    )
                })
                .collect();
            let title = format!("Department stay trend, {label} ({})", mode.as_str());
            written.push(render_chart(cfg.output_path(&format!("{stem}.svg")), |path| {
                stacked_bars(path, &title, stay_axis(mode), mode == StayMode::Percentage, &panels)
            })?);
        }
    }

    info!(artifacts = written.len(), "Stay breakdowns complete");
    Ok(written)
}

/// Groups `(name, time, category)` points into one track per name, each
/// sorted by time.
fn tracks<I>(points: I) -> Vec<Track>
where
    I: IntoIterator<Item = (String, NaiveDateTime, String)>,
{
    let mut by_name: BTreeMap<String, Vec<(NaiveDateTime, String)>> = BTreeMap::new();
    for (name, at, category) in points {
        by_name.entry(name).or_default().push((at, category));
    }
    by_name
        .into_iter()
        .map(|(name, mut points)| {
            points.sort_by(|a, b| a.0.cmp(&b.0));
            Track { name, points }
        })
        .collect()
}

/// Closest place over time, one track per person, places in floor order.
fn sensor_panel(positions: &[EnrichedPosition], nodes: &NodeDirectory) -> CategoryPanel {
    CategoryPanel {
        title: "Tag movement (sensor data)".to_string(),
        categories: nodes.order_places(positions.iter().map(|p| p.place_name.clone())),
        tracks: tracks(
            positions
                .iter()
                .map(|p| (p.tag_name.clone(), p.datetime, p.place_name.clone())),
        ),
    }
}

/// Per-person closest-place timeline.
#[tracing::instrument(skip_all)]
pub fn movement(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions = load_enriched(cfg)?;
    let nodes = NodeDirectory::load(&cfg.paths.node_names)?;
    let panels = [sensor_panel(&positions, &nodes)];

    let chart = render_chart(cfg.output_path("tag_movement_graph.svg"), |path| {
        category_timeline(path, "Tag movement", "closest place", &panels)
    })?;
    Ok(vec![chart])
}

/// Loads the roster; a missing file leaves the reservation side empty.
fn roster_or_empty(cfg: &PipelineConfig) -> PipelineResult<Vec<Reservation>> {
    match load_roster(&cfg.paths.reservations) {
        Ok(rows) => Ok(rows),
        Err(PipelineError::FileNotFound(path)) => {
            warn!(path = %path.display(), "Reservation roster not found, comparing against nothing");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn slot_axis_value(slot: &ReservationSlot, axis: ReservationAxis) -> Option<String> {
    match axis {
        ReservationAxis::Area => slot.area.clone(),
        ReservationAxis::SeatNumber => slot.seat_number.clone(),
    }
}

/// Sensor timeline on top, reservation roster below, restricted to the
/// people shown in the sensor panel.
#[tracing::instrument(skip_all, fields(axis = ?cfg.reservation_axis))]
pub fn compare(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions = load_enriched(cfg)?;
    let nodes = NodeDirectory::load(&cfg.paths.node_names)?;
    let sensor = sensor_panel(&positions, &nodes);
    let shown: BTreeSet<&str> = positions.iter().map(|p| p.tag_name.as_str()).collect();

    let roster = roster_or_empty(cfg)?;
    let mut slots = expand_reservations(&roster, cfg.bucket_width());
    slots.retain(|s| shown.contains(s.user.as_str()) && cfg.filters.admits_time(&s.datetime));
    slots.sort_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.user.cmp(&b.user)));

    let mut written = Vec::new();
    if slots.is_empty() {
        warn!("No reservations for the people shown");
    } else {
        let csv_path = cfg.output_path("reservation_slots.csv");
        write_records(&csv_path, &slots)?;
        written.push(csv_path);
    }

    let axis_name = match cfg.reservation_axis {
        ReservationAxis::Area => "Area",
        ReservationAxis::SeatNumber => "SeatNumber",
    };
    let mut categories: Vec<String> = Vec::new();
    let mut points = Vec::new();
    for slot in &slots {
        let Some(value) = slot_axis_value(slot, cfg.reservation_axis) else { continue };
        if !categories.contains(&value) {
            categories.push(value.clone());
        }
        points.push((slot.user.clone(), slot.datetime, value));
    }
    let reservations = CategoryPanel {
        title: "Stay history (reservation data)".to_string(),
        categories,
        tracks: tracks(points),
    };

    let panels = [sensor, reservations];
    written.push(render_chart(cfg.output_path("tag_movement_comparison_graph.svg"), |path| {
        category_timeline(path, "Sensor positions against reservations", axis_name, &panels)
    })?);
    Ok(written)
}

/// Check-ins per person from the reservation roster.
#[tracing::instrument(skip_all, fields(start = ?cfg.filters.start_date, end = ?cfg.filters.end_date))]
pub fn ranking(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let roster = load_roster(&cfg.paths.reservations)?;
    let counts = require_rows(checkin_ranking(&roster, &cfg.filters), "check-in ranking")?;

    let csv_path = cfg.output_path("check_in_ranking.csv");
    write_records(&csv_path, &counts)?;

    let title = match (cfg.filters.start_date, cfg.filters.end_date) {
        (Some(start), Some(end)) => format!("Check-in ranking ({start} to {end})"),
        (Some(start), None) => format!("Check-in ranking (from {start})"),
        (None, Some(end)) => format!("Check-in ranking (until {end})"),
        (None, None) => "Check-in ranking".to_string(),
    };
    let items: Vec<(String, usize)> = counts.iter().map(|c| (c.user.clone(), c.count)).collect();
    let chart = render_chart(cfg.output_path("check_in_ranking.svg"), |path| {
        ranking_bars(path, &title, "check-ins", &items)
    })?;

    info!(users = counts.len(), "Check-in ranking complete");
    Ok(vec![csv_path, chart])
}
