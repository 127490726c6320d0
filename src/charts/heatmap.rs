//! Annotated heatmaps on a fixed color scale.

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;
use std::path::Path;

use super::{FONT, canvas, viridis};

/// Values laid out on a `rows × columns` grid; missing cells stay blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeatmapGrid {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `(row, column, value)`.
    pub cells: Vec<(usize, usize, f64)>,
}

/// Position of `value` on the scale, in `[0, 1]`.
fn scale_position(value: f64, scale: &Range<f64>) -> f64 {
    let span = scale.end - scale.start;
    if span <= 0.0 {
        return 0.0;
    }
    ((value - scale.start) / span).clamp(0.0, 1.0)
}

/// Draws the grid with every cell annotated by its rounded value. The first
/// row is drawn at the top.
pub fn index_heatmap(path: &Path, title: &str, grid: &HeatmapGrid, scale: Range<f64>) -> Result<()> {
    let n_rows = grid.rows.len().max(1);
    let n_cols = grid.columns.len().max(1);
    let width = (300 + 90 * n_cols as u32).clamp(900, 3600);
    let height = (200 + 36 * n_rows as u32).clamp(500, 3600);

    let root = canvas(path, (width, height))?;
    let root = root.titled(title, (FONT, 26))?;
    let (main, legend) = root.split_horizontally((width - 140) as i32);

    let rows = &grid.rows;
    let columns = &grid.columns;
    let mut chart = ChartBuilder::on(&main)
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(200)
        .build_cartesian_2d((0..n_cols as i32).into_segmented(), (0..n_rows as i32).into_segmented())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_cols)
        .y_labels(n_rows)
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(c) => columns.get(*c as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(r) => usize::try_from(n_rows as i32 - 1 - *r)
                .ok()
                .and_then(|i| rows.get(i).cloned())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    let flip = |row: usize| n_rows as i32 - 1 - row as i32;

    chart.draw_series(grid.cells.iter().map(|&(row, col, value)| {
        let (x, y) = (col as i32, flip(row));
        Rectangle::new(
            [(SegmentValue::Exact(x), SegmentValue::Exact(y)), (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1))],
            viridis(scale_position(value, &scale)).filled(),
        )
    }))?;

    chart.draw_series(grid.cells.iter().map(|&(row, col, value)| {
        let base = TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        let style = if scale_position(value, &scale) < 0.6 { base.color(&WHITE) } else { base.color(&BLACK) };
        Text::new(
            format!("{value:.0}"),
            (SegmentValue::CenterOf(col as i32), SegmentValue::CenterOf(flip(row))),
            style,
        )
    }))?;

    draw_color_bar(&legend, &scale)?;
    root.present()?;
    Ok(())
}

fn draw_color_bar<DB: DrawingBackend>(area: &DrawingArea<DB, plotters::coord::Shift>, scale: &Range<f64>) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let mut bar = ChartBuilder::on(area)
        .margin_top(40)
        .margin_bottom(70)
        .margin_right(10)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, scale.clone())?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(6)
        .y_label_formatter(&|v| format!("{v:.0}"))
        .draw()?;

    const STEPS: usize = 100;
    let step = (scale.end - scale.start) / STEPS as f64;
    bar.draw_series((0..STEPS).map(|i| {
        let lo = scale.start + step * i as f64;
        Rectangle::new([(0.0, lo), (1.0, lo + step)], viridis((i as f64 + 0.5) / STEPS as f64).filled())
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_scale_position_clamps() {
        let scale = 0.0..10_000.0;
        assert_eq!(scale_position(5_000.0, &scale), 0.5);
        assert_eq!(scale_position(-1.0, &scale), 0.0);
        assert_eq!(scale_position(20_000.0, &scale), 1.0);
        assert_eq!(scale_position(1.0, &(1.0..1.0)), 0.0);
    }

    #[test]
    fn test_heatmap_annotates_values() {
        let path = env::temp_dir().join("tag_presence_test_heatmap.svg");
        let grid = HeatmapGrid {
            rows: vec!["Sato".to_string(), "Ito".to_string()],
            columns: vec!["2025-09".to_string()],
            cells: vec![(0, 0, 7500.0), (1, 0, 0.0)],
        };

        index_heatmap(&path, "Mobility", &grid, 0.0..10_000.0).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("7500"));
        assert!(svg.contains("Sato"));
        fs::remove_file(&path).unwrap();
    }
}
