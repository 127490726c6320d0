//! HHI based stages: mobility, department dispersion, effective-location
//! tables and the work-style report built on top of them.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

use super::{load_enriched, panel_departments, render_chart, require_rows};
use crate::analyzers::effective::{EffectiveLocations, EffectiveRecord, effective_locations};
use crate::analyzers::hhi::{HHI_MAX, IndexRow, concentration_index};
use crate::analyzers::types::{DepartmentDispersionRow, DeptTagMobilityRow, TagMobilityRow};
use crate::analyzers::workstyle::{area_distributions, dumbbell_order, workstyle_summary};
use crate::charts::Series;
use crate::charts::distribution::{box_plots, dumbbell, workstyle_scatter};
use crate::charts::heatmap::{HeatmapGrid, index_heatmap};
use crate::charts::line::{ValuePanel, value_lines};
use crate::config::{Granularity, PipelineConfig, SubjectKey};
use crate::error::PipelineResult;
use crate::output::{read_records, write_records, write_table};

const INDEX_AXIS: std::ops::Range<f64> = -500.0..10_500.0;
const INDEX_SCALE: std::ops::Range<f64> = 0.0..HHI_MAX;

/// One value of an index chart: `panel` picks the subplot, `series` the line.
struct IndexPoint {
    panel: String,
    series: String,
    date: NaiveDate,
    value: f64,
}

/// Pivots index points into a heatmap: one row per `(panel, series)`, one
/// column per period start.
fn index_grid(points: &[IndexPoint], label: impl Fn(&IndexPoint) -> String) -> HeatmapGrid {
    let rows: Vec<(String, String)> = points
        .iter()
        .map(|p| (p.panel.clone(), p.series.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect::<BTreeSet<_>>().into_iter().collect();

    let mut grid = HeatmapGrid {
        rows: Vec::with_capacity(rows.len()),
        columns: dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
        cells: Vec::with_capacity(points.len()),
    };
    for p in points {
        let row = rows.iter().position(|(panel, series)| *panel == p.panel && *series == p.series);
        let col = dates.iter().position(|d| *d == p.date);
        if let (Some(row), Some(col)) = (row, col) {
            grid.cells.push((row, col, p.value));
        }
    }
    for p in rows.iter() {
        let sample = points.iter().find(|q| q.panel == p.0 && q.series == p.1);
        grid.rows.push(sample.map(&label).unwrap_or_default());
    }
    grid
}

/// Splits index points into one line panel per name in `panels`.
fn index_panels(points: &[IndexPoint], panels: &[String]) -> Vec<ValuePanel> {
    panels
        .iter()
        .map(|panel| {
            let names: BTreeSet<&str> = points
                .iter()
                .filter(|p| p.panel == *panel)
                .map(|p| p.series.as_str())
                .collect();
            let series = names
                .into_iter()
                .map(|name| Series {
                    name: name.to_string(),
                    points: points
                        .iter()
                        .filter(|p| p.panel == *panel && p.series == name)
                        .filter_map(|p| Some((p.date.and_hms_opt(0, 0, 0)?, p.value)))
                        .collect(),
                })
                .collect();
            ValuePanel {
                title: panel.clone(),
                series,
            }
        })
        .collect()
}

/// File names and labels of one index report.
struct IndexCharts<'a> {
    graph: &'a str,
    heatmap: &'a str,
    title: &'a str,
    y_desc: &'a str,
}

/// Writes the line chart and heatmap shared by mobility and dispersion.
fn index_charts(
    cfg: &PipelineConfig,
    charts: IndexCharts<'_>,
    points: &[IndexPoint],
    panels: &[String],
    row_label: impl Fn(&IndexPoint) -> String,
) -> PipelineResult<Vec<PathBuf>> {
    let line_panels = index_panels(points, panels);
    let grid = index_grid(points, row_label);

    let lines = render_chart(cfg.output_path(charts.graph), |path| {
        value_lines(path, &format!("{} over time", charts.title), charts.y_desc, Some(INDEX_AXIS), &line_panels)
    })?;
    let heatmap = render_chart(cfg.output_path(charts.heatmap), |path| {
        index_heatmap(path, &format!("{} heatmap", charts.title), &grid, INDEX_SCALE)
    })?;
    Ok(vec![lines, heatmap])
}

/// Per-person mobility index (10000 − HHI of places visited).
///
/// The subject key decides whether rows carry the department; a department
/// subject is served by [`dispersion`].
#[tracing::instrument(skip_all, fields(granularity = %cfg.granularity, subject = ?cfg.subject))]
pub fn mobility(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    if cfg.subject == SubjectKey::Department {
        info!("Department subject requested, computing dispersion instead");
        return dispersion(cfg);
    }

    let positions = load_enriched(cfg)?;
    let rows = require_rows(concentration_index(&positions, cfg.granularity, cfg.subject), "mobility index")?;

    let mut written = Vec::new();
    let (points, panels, charts) = if cfg.subject == SubjectKey::Tag {
        let table: Vec<TagMobilityRow> = rows.iter().map(TagMobilityRow::from).collect();
        let path = cfg.output_path("mobility_index_data.csv");
        write_records(&path, &table)?;
        written.push(path);

        let points: Vec<IndexPoint> = table
            .iter()
            .map(|r| IndexPoint {
                panel: String::new(),
                series: r.tag_name.clone(),
                date: r.date,
                value: r.mobility_index,
            })
            .collect();
        let charts = IndexCharts {
            graph: "mobility_index_graph.svg",
            heatmap: "mobility_index_heatmap.svg",
            title: "Mobility index",
            y_desc: "mobility index (higher is more dispersed)",
        };
        (points, vec![String::new()], charts)
    } else {
        let table: Vec<DeptTagMobilityRow> = rows.iter().map(DeptTagMobilityRow::from).collect();
        let path = cfg.output_path("mobility_index_data_by_dept.csv");
        write_records(&path, &table)?;
        written.push(path);

        let points: Vec<IndexPoint> = table
            .iter()
            .map(|r| IndexPoint {
                panel: r.department.clone(),
                series: r.tag_name.clone(),
                date: r.date,
                value: r.mobility_index,
            })
            .collect();
        let panels = panel_departments(cfg, points.iter().map(|p| p.panel.as_str()));
        let charts = IndexCharts {
            graph: "mobility_index_graph_by_dept.svg",
            heatmap: "mobility_index_heatmap_by_dept.svg",
            title: "Mobility index",
            y_desc: "mobility index (higher is more dispersed)",
        };
        (points, panels, charts)
    };

    written.extend(index_charts(cfg, charts, &points, &panels, |p| {
        if p.panel.is_empty() { p.series.clone() } else { format!("{} / {}", p.panel, p.series) }
    })?);

    info!(rows = rows.len(), "Mobility index complete");
    Ok(written)
}

/// Per-department dispersion index (10000 − HHI of places used by the
/// whole department).
#[tracing::instrument(skip_all, fields(granularity = %cfg.granularity))]
pub fn dispersion(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions = load_enriched(cfg)?;
    let rows: Vec<IndexRow> = concentration_index(&positions, cfg.granularity, SubjectKey::Department);
    let rows = require_rows(rows, "dispersion index")?;

    let table: Vec<DepartmentDispersionRow> = rows.iter().map(DepartmentDispersionRow::from).collect();
    let csv_path = cfg.output_path("department_dispersion_data.csv");
    write_records(&csv_path, &table)?;

    let points: Vec<IndexPoint> = table
        .iter()
        .map(|r| IndexPoint {
            panel: String::new(),
            series: r.department.clone(),
            date: r.date,
            value: r.dispersion_index,
        })
        .collect();

    let mut written = vec![csv_path];
    let charts = IndexCharts {
        graph: "department_dispersion_graph.svg",
        heatmap: "department_dispersion_heatmap.svg",
        title: "Department dispersion index",
        y_desc: "dispersion index (higher is more dispersed)",
    };
    written.extend(index_charts(cfg, charts, &points, &[String::new()], |p| p.series.clone())?);

    info!(rows = rows.len(), "Dispersion index complete");
    Ok(written)
}

/// Effective-location tables at day, week and month granularity.
#[tracing::instrument(skip_all)]
pub fn effective(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let positions = load_enriched(cfg)?;

    let mut written = Vec::new();
    for granularity in [Granularity::Day, Granularity::Week, Granularity::Month] {
        let rows = effective_locations(&positions, granularity);
        let path = cfg.effective_table_path(granularity);
        let header = EffectiveLocations::header(granularity);
        write_table(&path, &header, rows.iter().map(EffectiveLocations::to_record))?;
        written.push(path);
    }
    Ok(written)
}

/// Box plots, scatter and dumbbell chart over the effective-location tables,
/// plus the averaged summary table.
#[tracing::instrument(skip_all)]
pub fn workstyle(cfg: &PipelineConfig) -> PipelineResult<Vec<PathBuf>> {
    let load = |granularity: Granularity| -> PipelineResult<Vec<EffectiveRecord>> {
        let rows: Vec<EffectiveRecord> = read_records(&cfg.effective_table_path(granularity))?;
        Ok(rows
            .into_iter()
            .filter(|r| cfg.filters.admits_department(r.department.as_deref().unwrap_or("")))
            .collect())
    };
    let daily = load(Granularity::Day)?;
    let weekly = load(Granularity::Week)?;
    let monthly = load(Granularity::Month)?;

    let summary = require_rows(workstyle_summary(&daily, &weekly, &monthly), "work-style summary")?;
    let csv_path = cfg.output_path("workstyle_summary.csv");
    write_records(&csv_path, &summary)?;

    let mut written = vec![csv_path];
    for (label, records) in [("daily", &daily), ("weekly", &weekly), ("monthly", &monthly)] {
        let distributions = area_distributions(records);
        written.push(render_chart(cfg.output_path(&format!("graph1_{label}_distribution.svg")), |path| {
            box_plots(path, &format!("Effective areas per person ({label})"), "effective areas", &distributions)
        })?);
    }
    written.push(render_chart(cfg.output_path("graph3_workstyle_scatter.svg"), |path| {
        workstyle_scatter(path, "Work style: daily against monthly effective areas", &summary)
    })?);
    let ordered = dumbbell_order(&summary);
    written.push(render_chart(cfg.output_path("graph4_dumbbell_3points.svg"), |path| {
        dumbbell(path, "Effective areas by granularity", "effective areas", &ordered)
    })?);

    info!(people = summary.len(), "Work-style report complete");
    Ok(written)
}
