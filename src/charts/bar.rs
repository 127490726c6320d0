//! Ranking bars and stacked stay bars.

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

use super::{FONT, canvas, draw_legend, draw_no_data, palette_color};

/// Horizontal bars, first item on top, each labelled with its count.
pub fn ranking_bars(path: &Path, title: &str, x_desc: &str, items: &[(String, usize)]) -> Result<()> {
    let n = items.len().max(1);
    let height = (160 + 34 * n as u32).clamp(400, 4000);
    let root = canvas(path, (1400, height))?;
    let root = root.titled(title, (FONT, 26))?;

    if items.is_empty() {
        draw_no_data(&root, title)?;
        root.present()?;
        return Ok(());
    }

    let max = items.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;
    let row_of = |i: usize| (n - 1 - i) as i32;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(180)
        .build_cartesian_2d(0.0..max * 1.15, (0..n as i32).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(y) => usize::try_from(n as i32 - 1 - *y)
                .ok()
                .and_then(|i| items.get(i))
                .map(|(name, _)| name.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(x_desc)
        .draw()?;

    let color = palette_color(0);
    chart.draw_series(items.iter().enumerate().map(|(i, (_, count))| {
        let y = row_of(i);
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(y)), (*count as f64, SegmentValue::Exact(y + 1))],
            color.filled(),
        );
        bar.set_margin(4, 4, 0, 0);
        bar
    }))?;

    let label_style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    chart.draw_series(items.iter().enumerate().map(|(i, (_, count))| {
        Text::new(
            format!(" {count}"),
            (*count as f64, SegmentValue::CenterOf(row_of(i))),
            label_style.clone(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// One panel of stacked bars: `values[category][segment]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackedPanel {
    pub title: String,
    pub categories: Vec<String>,
    pub segments: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl StackedPanel {
    fn value(&self, category: usize, segment: usize) -> f64 {
        self.values
            .get(category)
            .and_then(|row| row.get(segment))
            .copied()
            .unwrap_or(0.0)
    }

    fn category_total(&self, category: usize) -> f64 {
        (0..self.segments.len()).map(|s| self.value(category, s)).sum()
    }
}

/// Stacked bars, one panel per entry, with a shared legend on the right.
///
/// Percent charts use a fixed 0 to 100 axis; otherwise the axis fits the
/// tallest bar.
pub fn stacked_bars(path: &Path, title: &str, y_desc: &str, percent: bool, panels: &[StackedPanel]) -> Result<()> {
    let mut segments: Vec<&str> = Vec::new();
    for panel in panels {
        for s in &panel.segments {
            if !segments.contains(&s.as_str()) {
                segments.push(s);
            }
        }
    }
    let color_of = |name: &str| palette_color(segments.iter().position(|s| *s == name).unwrap_or(0));

    let widest = panels.iter().map(|p| p.categories.len()).max().unwrap_or(0) as u32;
    let width = (500 + 60 * widest).clamp(1200, 4000);
    let rows = panels.len().max(1);
    let root = canvas(path, (width, 80 + 520 * rows as u32))?;
    let root = root.titled(title, (FONT, 28))?;
    let (plots, legend) = root.split_horizontally(width as i32 - 220);

    let areas = plots.split_evenly((rows, 1));
    for (panel, area) in panels.iter().zip(areas.iter()) {
        if panel.categories.is_empty() || panel.segments.is_empty() {
            draw_no_data(area, &panel.title)?;
            continue;
        }

        let n = panel.categories.len();
        let y_max = if percent {
            100.0
        } else {
            let tallest = (0..n).map(|c| panel.category_total(c)).fold(0.0_f64, f64::max);
            (tallest * 1.1).max(1.0)
        };

        let categories = &panel.categories;
        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, (FONT, 20))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(70)
            .build_cartesian_2d((0..n as i32).into_segmented(), 0.0..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(c) => categories.get(*c as usize).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .y_label_formatter(&|v| if percent { format!("{v:.0}%") } else { format!("{v:.0}") })
            .y_desc(y_desc)
            .draw()?;

        let mut base = vec![0.0_f64; n];
        for (s, segment) in panel.segments.iter().enumerate() {
            let color = color_of(segment);
            let bars: Vec<Rectangle<(SegmentValue<i32>, f64)>> = (0..n)
                .filter_map(|c| {
                    let value = panel.value(c, s);
                    if value <= 0.0 {
                        return None;
                    }
                    let bottom = base[c];
                    base[c] += value;
                    let x = c as i32;
                    let mut bar = Rectangle::new(
                        [(SegmentValue::Exact(x), bottom), (SegmentValue::Exact(x + 1), bottom + value)],
                        color.filled(),
                    );
                    bar.set_margin(0, 0, 6, 6);
                    Some(bar)
                })
                .collect();
            chart.draw_series(bars)?;
        }
    }

    let entries: Vec<(String, RGBColor)> = segments.iter().map(|s| (s.to_string(), color_of(s))).collect();
    draw_legend(&legend, &entries)?;

    root.present()?;
    Ok(())
}
