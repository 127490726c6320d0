//! Time-series line charts: numeric values over time, and categorical
//! tracks such as "closest place over time".

use anyhow::Result;
use chrono::NaiveDateTime;
use plotters::prelude::*;
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;

use super::{FONT, Series, canvas, draw_no_data, epoch_seconds, format_epoch, padded_range, palette_color};

/// One stacked panel of a numeric line chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePanel {
    pub title: String,
    pub series: Vec<Series<NaiveDateTime>>,
}

/// One stacked panel of a categorical timeline. Each point's category must
/// be listed in `categories`, which also fixes the axis order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPanel {
    pub title: String,
    pub categories: Vec<String>,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub points: Vec<(NaiveDateTime, String)>,
}

const WIDTH: u32 = 1600;
const PANEL_HEIGHT: u32 = 460;

/// Shared x bounds of every point, in epoch seconds.
fn time_bounds<'a, I: IntoIterator<Item = &'a NaiveDateTime>>(times: I) -> Option<Range<i64>> {
    let mut bounds: Option<(i64, i64)> = None;
    for t in times {
        let s = epoch_seconds(t);
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(s), hi.max(s)),
            None => (s, s),
        });
    }
    bounds.map(|(lo, hi)| if lo == hi { (lo - 3600)..(hi + 3600) } else { lo..hi })
}

/// Tick format that still tells days apart on long ranges.
fn time_format(range: &Range<i64>) -> &'static str {
    if range.end - range.start > 3 * 86_400 { "%m/%d" } else { "%m/%d %H:%M" }
}

fn name_index(names: &BTreeSet<&str>, name: &str) -> usize {
    names.iter().position(|n| *n == name).unwrap_or(0)
}

/// Numeric series over time, one panel per entry, sharing the x axis and a
/// per-name color.
///
/// `y_range` fixes the value axis; `None` scales it from 0 to the data.
pub fn value_lines(
    path: &Path,
    title: &str,
    y_desc: &str,
    y_range: Option<Range<f64>>,
    panels: &[ValuePanel],
) -> Result<()> {
    let names: BTreeSet<&str> = panels
        .iter()
        .flat_map(|p| p.series.iter().map(|s| s.name.as_str()))
        .collect();
    let x_range = time_bounds(
        panels
            .iter()
            .flat_map(|p| p.series.iter().flat_map(|s| s.points.iter().map(|(t, _)| t))),
    );

    let rows = panels.len().max(1);
    let root = canvas(path, (WIDTH, 80 + PANEL_HEIGHT * rows as u32))?;
    let root = root.titled(title, (FONT, 28))?;
    let areas = root.split_evenly((rows, 1));

    for (panel, area) in panels.iter().zip(areas.iter()) {
        let Some(x_range) = x_range.clone().filter(|_| panel.series.iter().any(|s| !s.points.is_empty()))
        else {
            draw_no_data(area, &panel.title)?;
            continue;
        };

        let y_range = y_range.clone().unwrap_or_else(|| {
            let max = panel
                .series
                .iter()
                .flat_map(|s| s.points.iter().map(|(_, v)| *v))
                .fold(0.0_f64, f64::max);
            padded_range(0.0, max * 1.1, 1.0)
        });
        let fmt = time_format(&x_range);

        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, (FONT, 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_label_formatter(&|v| format_epoch(*v, fmt))
            .y_desc(y_desc)
            .draw()?;

        for series in &panel.series {
            let color = palette_color(name_index(&names, &series.name));
            let points: Vec<(i64, f64)> = series
                .points
                .iter()
                .map(|(t, v)| (epoch_seconds(t), *v))
                .collect();

            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
                .label(series.name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            chart.draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Categorical tracks over time, e.g. each person's closest place per bucket.
pub fn category_timeline(path: &Path, title: &str, y_desc: &str, panels: &[CategoryPanel]) -> Result<()> {
    let names: BTreeSet<&str> = panels
        .iter()
        .flat_map(|p| p.tracks.iter().map(|t| t.name.as_str()))
        .collect();
    let x_range = time_bounds(
        panels
            .iter()
            .flat_map(|p| p.tracks.iter().flat_map(|t| t.points.iter().map(|(at, _)| at))),
    );

    let rows = panels.len().max(1);
    let root = canvas(path, (WIDTH, 80 + PANEL_HEIGHT * rows as u32))?;
    let root = root.titled(title, (FONT, 28))?;
    let areas = root.split_evenly((rows, 1));

    for (panel, area) in panels.iter().zip(areas.iter()) {
        let has_points = panel.tracks.iter().any(|t| !t.points.is_empty());
        let Some(x_range) = x_range.clone().filter(|_| has_points && !panel.categories.is_empty())
        else {
            draw_no_data(area, &panel.title)?;
            continue;
        };
        let fmt = time_format(&x_range);
        let categories = &panel.categories;

        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, (FONT, 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(180)
            .build_cartesian_2d(x_range, (0..categories.len() as i32).into_segmented())?;

        chart
            .configure_mesh()
            .x_labels(12)
            .y_labels(categories.len())
            .x_label_formatter(&|v| format_epoch(*v, fmt))
            .y_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => categories.get(*i as usize).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .y_desc(y_desc)
            .draw()?;

        for track in &panel.tracks {
            let color = palette_color(name_index(&names, &track.name));
            let points: Vec<(i64, SegmentValue<i32>)> = track
                .points
                .iter()
                .filter_map(|(at, category)| {
                    let idx = categories.iter().position(|c| c == category)?;
                    Some((epoch_seconds(at), SegmentValue::CenterOf(idx as i32)))
                })
                .collect();

            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
                .label(track.name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_datetime;
    use std::env;
    use std::fs;

    fn at(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn test_time_bounds_pads_single_point() {
        let t = at("2025-09-01 08:00:00");
        let range = time_bounds([&t]).unwrap();
        assert_eq!(range.end - range.start, 7200);
        assert!(time_bounds(std::iter::empty()).is_none());
    }

    #[test]
    fn test_value_lines_writes_svg_with_empty_panel() {
        let path = env::temp_dir().join("tag_presence_test_lines.svg");
        let panels = vec![
            ValuePanel {
                title: "giken".to_string(),
                series: vec![Series {
                    name: "Sato".to_string(),
                    points: vec![(at("2025-09-01 00:00:00"), 2500.0), (at("2025-09-02 00:00:00"), 5000.0)],
                }],
            },
            ValuePanel { title: "airtro".to_string(), series: vec![] },
        ];

        value_lines(&path, "Mobility", "index", Some(-500.0..10_500.0), &panels).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("no data"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_category_timeline_writes_svg() {
        let path = env::temp_dir().join("tag_presence_test_timeline.svg");
        let panels = vec![CategoryPanel {
            title: "Sensor".to_string(),
            categories: vec!["Lobby".to_string(), "Desk".to_string()],
            tracks: vec![Track {
                name: "Sato".to_string(),
                points: vec![
                    (at("2025-09-01 08:00:00"), "Lobby".to_string()),
                    (at("2025-09-01 08:05:00"), "Desk".to_string()),
                ],
            }],
        }];

        category_timeline(&path, "Movement", "place", &panels).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Lobby"));
        fs::remove_file(&path).unwrap();
    }
}
