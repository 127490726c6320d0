//! One function per CLI subcommand: load the stage's input, run the
//! analyzers, write CSV artifacts and their charts.
//!
//! Every stage takes the [`PipelineConfig`] explicitly and returns the paths
//! it wrote. A stage with nothing left to emit returns
//! [`PipelineError::EmptyResult`] before touching any chart.

mod indices;
mod ingest;
mod reports;

pub use indices::{dispersion, effective, mobility, workstyle};
pub use ingest::{enrich, fetch, publish, resolve, select_tag, voltage};
pub use reports::{compare, movement, occupancy, ranking, totalling};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::output::read_timestamped;
use crate::records::EnrichedPosition;

/// Fails with [`PipelineError::EmptyResult`] when `rows` is empty.
fn require_rows<T>(rows: Vec<T>, stage: &'static str) -> PipelineResult<Vec<T>> {
    if rows.is_empty() {
        return Err(PipelineError::EmptyResult(stage));
    }
    Ok(rows)
}

/// Reads the enriched table and applies the tag, date and department filters.
fn load_enriched(cfg: &PipelineConfig) -> PipelineResult<Vec<EnrichedPosition>> {
    let rows: Vec<EnrichedPosition> = read_timestamped(&cfg.paths.enriched)?;
    let total = rows.len();
    let filters = &cfg.filters;

    let kept: Vec<EnrichedPosition> = rows
        .into_iter()
        .filter(|p| filters.admits_tag(&p.tag_id))
        .filter(|p| filters.admits_time(&p.datetime))
        .filter(|p| filters.admits_department(&p.department))
        .collect();

    info!(
        path = %cfg.paths.enriched.display(),
        total,
        kept = kept.len(),
        "Enriched positions loaded"
    );
    require_rows(kept, "filtering enriched positions")
}

/// Departments that get their own chart panel: the configured filter when
/// set (so a department without rows still shows a placeholder), otherwise
/// every department present.
fn panel_departments<'a, I: IntoIterator<Item = &'a str>>(cfg: &PipelineConfig, present: I) -> Vec<String> {
    if !cfg.filters.departments.is_empty() {
        return cfg.filters.departments.clone();
    }
    present
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Renders one chart and logs where it went.
fn render_chart<F>(path: PathBuf, render: F) -> PipelineResult<PathBuf>
where
    F: FnOnce(&Path) -> anyhow::Result<()>,
{
    render(&path)?;
    debug!(path = %path.display(), "Chart written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Filters;

    #[test]
    fn test_require_rows_flags_empty_stage() {
        let err = require_rows(Vec::<u8>::new(), "resolve").unwrap_err();
        assert!(err.is_empty_result());
        assert_eq!(require_rows(vec![1], "resolve").unwrap(), vec![1]);
    }

    #[test]
    fn test_panel_departments_prefer_filter() {
        let mut cfg = PipelineConfig::default();
        assert_eq!(panel_departments(&cfg, ["giken", "airtro", "giken"]), vec!["airtro", "giken"]);

        cfg.filters = Filters {
            departments: vec!["giken".into(), "sales".into()],
            ..Default::default()
        };
        assert_eq!(panel_departments(&cfg, ["airtro"]), vec!["giken", "sales"]);
    }
}
