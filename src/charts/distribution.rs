//! Distribution charts for the work-style report: per-person box plots,
//! the daily-versus-monthly scatter map, and the three-point dumbbell.

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeSet;
use std::path::Path;

use super::{FONT, canvas, draw_no_data, padded_range, palette_color};
use crate::analyzers::types::WorkstyleRow;
use crate::analyzers::utility::{mean, quantile};
use crate::analyzers::workstyle::AreaDistribution;

const GREY: RGBColor = RGBColor(0x80, 0x80, 0x80);
const DAILY: RGBColor = RGBColor(0x1f, 0x77, 0xb4);
const WEEKLY: RGBColor = RGBColor(0xff, 0x7f, 0x0e);
const MONTHLY: RGBColor = RGBColor(0x2c, 0xa0, 0x2c);

/// Five-number summary with Tukey whiskers (1.5 × IQR).
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let q1 = quantile(values, 0.25)?;
        let median = quantile(values, 0.5)?;
        let q3 = quantile(values, 0.75)?;
        let reach = 1.5 * (q3 - q1);
        let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);

        let inside = values.iter().copied().filter(|v| (lo_fence..=hi_fence).contains(v));
        let whisker_low = inside.clone().fold(f64::INFINITY, f64::min).min(q1);
        let whisker_high = inside.fold(f64::NEG_INFINITY, f64::max).max(q3);
        let outliers = values
            .iter()
            .copied()
            .filter(|v| !(lo_fence..=hi_fence).contains(v))
            .collect();

        Some(BoxStats { q1, median, q3, whisker_low, whisker_high, outliers })
    }
}

fn department_colors<'a, I: IntoIterator<Item = Option<&'a str>>>(departments: I) -> Vec<String> {
    departments
        .into_iter()
        .map(|d| d.unwrap_or("").to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn color_for(departments: &[String], department: Option<&str>) -> RGBColor {
    let key = department.unwrap_or("");
    palette_color(departments.iter().position(|d| d == key).unwrap_or(0))
}

/// One box per person in the given order, colored by department.
pub fn box_plots(path: &Path, title: &str, y_desc: &str, distributions: &[AreaDistribution]) -> Result<()> {
    let n = distributions.len().max(1);
    let width = (300 + 60 * n as u32).clamp(1200, 4000);
    let root = canvas(path, (width, 800))?;
    let root = root.titled(title, (FONT, 26))?;

    let stats: Vec<Option<BoxStats>> = distributions.iter().map(|d| BoxStats::from_values(&d.values)).collect();
    if stats.iter().all(Option::is_none) {
        draw_no_data(&root, title)?;
        root.present()?;
        return Ok(());
    }

    let y_max = distributions
        .iter()
        .flat_map(|d| d.values.iter().copied())
        .fold(0.0_f64, f64::max);
    let departments = department_colors(distributions.iter().map(|d| d.department.as_deref()));

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n as i32).into_segmented(), padded_range(0.0, y_max * 1.1, 1.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => distributions
                .get(*i as usize)
                .map(|d| d.tag_name.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .y_desc(y_desc)
        .draw()?;

    let segment_px = chart.plotting_area().dim_in_pixel().0 / n as u32;
    let inset = (segment_px / 5).max(1);
    let half = (segment_px as i32 * 3 / 10).max(2);

    for (i, (dist, stat)) in distributions.iter().zip(&stats).enumerate() {
        let Some(stat) = stat else { continue };
        let x = i as i32;
        let color = color_for(&departments, dist.department.as_deref());

        let mut body = Rectangle::new(
            [(SegmentValue::Exact(x), stat.q1), (SegmentValue::Exact(x + 1), stat.q3)],
            color.mix(0.7).filled(),
        );
        body.set_margin(0, 0, inset, inset);
        let mut outline = Rectangle::new(
            [(SegmentValue::Exact(x), stat.q1), (SegmentValue::Exact(x + 1), stat.q3)],
            BLACK.stroke_width(1),
        );
        outline.set_margin(0, 0, inset, inset);
        chart.draw_series([body, outline])?;

        let center = SegmentValue::CenterOf(x);
        chart.draw_series([
            PathElement::new(vec![(center.clone(), stat.whisker_low), (center.clone(), stat.q1)], BLACK.stroke_width(1)),
            PathElement::new(vec![(center.clone(), stat.q3), (center.clone(), stat.whisker_high)], BLACK.stroke_width(1)),
        ])?;

        let bar = |y: f64, w: i32, width: u32| {
            EmptyElement::at((center.clone(), y)) + PathElement::new(vec![(-w, 0), (w, 0)], BLACK.stroke_width(width))
        };
        chart.draw_series([
            bar(stat.median, half, 2),
            bar(stat.whisker_low, half / 2, 1),
            bar(stat.whisker_high, half / 2, 1),
        ])?;

        chart.draw_series(
            stat.outliers
                .iter()
                .map(|&v| Circle::new((center.clone(), v), 3, BLACK.stroke_width(1))),
        )?;
    }

    root.present()?;
    Ok(())
}

/// Daily against monthly average, one point per person, with the mean of
/// each axis as a grey reference line and the person's name beside the point.
pub fn workstyle_scatter(path: &Path, title: &str, rows: &[WorkstyleRow]) -> Result<()> {
    let root = canvas(path, (1200, 1000))?;
    let root = root.titled(title, (FONT, 26))?;

    let points: Vec<(&WorkstyleRow, f64, f64)> = rows
        .iter()
        .filter_map(|r| Some((r, r.daily_avg?, r.monthly_avg?)))
        .collect();
    if points.is_empty() {
        draw_no_data(&root, title)?;
        root.present()?;
        return Ok(());
    }

    let daily_values: Vec<f64> = rows.iter().filter_map(|r| r.daily_avg).collect();
    let monthly_values: Vec<f64> = rows.iter().filter_map(|r| r.monthly_avg).collect();
    let (daily_mean, monthly_mean) = (mean(&daily_values), mean(&monthly_values));

    let bounds = |values: &[f64]| {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let pad = ((hi - lo) * 0.1).max(0.25);
        (lo - pad)..(hi + pad)
    };
    let x_range = bounds(&points.iter().map(|p| p.1).collect::<Vec<_>>());
    let y_range = bounds(&points.iter().map(|p| p.2).collect::<Vec<_>>());

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range.clone(), y_range.clone())?;

    chart
        .configure_mesh()
        .x_desc("Daily_Avg")
        .y_desc("Monthly_Avg")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            vec![(daily_mean, y_range.start), (daily_mean, y_range.end)],
            GREY.stroke_width(1),
        ))?
        .label("daily mean")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREY.stroke_width(1)));
    chart
        .draw_series(LineSeries::new(
            vec![(x_range.start, monthly_mean), (x_range.end, monthly_mean)],
            GREY.stroke_width(1),
        ))?
        .label("monthly mean")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREY.stroke_width(1)));

    let departments = department_colors(points.iter().map(|p| p.0.department.as_deref()));
    for department in &departments {
        let color = color_for(&departments, Some(department.as_str()));
        let members: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p.0.department.as_deref().unwrap_or("") == department)
            .map(|p| (p.1, p.2))
            .collect();
        let label = if department.is_empty() { "(none)".to_string() } else { department.clone() };
        chart
            .draw_series(members.into_iter().map(|p| Circle::new(p, 8, color.mix(0.8).filled())))?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 10, y), 6, color.filled()));
    }

    let name_style = TextStyle::from((FONT, 12).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    chart.draw_series(points.iter().map(|(row, x, y)| {
        EmptyElement::at((*x, *y)) + Text::new(row.tag_name.clone(), (12, 0), name_style.clone())
    }))?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Daily, weekly and monthly averages per person on one line, rows in the
/// given order from the bottom up.
pub fn dumbbell(path: &Path, title: &str, x_desc: &str, rows: &[&WorkstyleRow]) -> Result<()> {
    let n = rows.len().max(1);
    let height = (200 + 32 * n as u32).clamp(600, 4000);
    let root = canvas(path, (1400, height))?;
    let root = root.titled(title, (FONT, 26))?;

    let values = |r: &WorkstyleRow| -> Vec<f64> {
        [r.daily_avg, r.weekly_avg, r.monthly_avg].into_iter().flatten().collect()
    };
    let all: Vec<f64> = rows.iter().flat_map(|r| values(*r)).collect();
    if all.is_empty() {
        draw_no_data(&root, title)?;
        root.present()?;
        return Ok(());
    }

    let lo = all.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let pad = ((hi - lo) * 0.05).max(0.25);

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(180)
        .build_cartesian_2d((lo - pad)..(hi + pad), (0..n as i32).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => rows.get(*i as usize).map(|r| r.tag_name.clone()).unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(x_desc)
        .draw()?;

    chart.draw_series(rows.iter().enumerate().filter_map(|(i, r)| {
        let v = values(*r);
        let min = v.iter().copied().reduce(f64::min)?;
        let max = v.iter().copied().reduce(f64::max)?;
        let y = SegmentValue::CenterOf(i as i32);
        Some(PathElement::new(vec![(min, y.clone()), (max, y)], GREY.mix(0.5).stroke_width(3)))
    }))?;

    let marks: [(&str, RGBColor, fn(&WorkstyleRow) -> Option<f64>); 3] = [
        ("Daily", DAILY, |r| r.daily_avg),
        ("Weekly", WEEKLY, |r| r.weekly_avg),
        ("Monthly", MONTHLY, |r| r.monthly_avg),
    ];
    for (label, color, pick) in marks {
        chart
            .draw_series(rows.iter().enumerate().filter_map(|(i, r)| {
                Some(Circle::new((pick(*r)?, SegmentValue::CenterOf(i as i32)), 7, color.filled()))
            }))?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 10, y), 6, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.9))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_box_stats_flags_outliers() {
        let stats = BoxStats::from_values(&[1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 20.0]).unwrap();
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.outliers, vec![20.0]);
        assert_eq!(stats.whisker_high, 4.0);
        assert_eq!(stats.whisker_low, 1.0);
        assert!(BoxStats::from_values(&[]).is_none());
    }

    fn row(name: &str, dept: &str, d: Option<f64>, w: Option<f64>, m: Option<f64>) -> WorkstyleRow {
        WorkstyleRow {
            tag_name: name.to_string(),
            department: Some(dept.to_string()),
            daily_avg: d,
            weekly_avg: w,
            monthly_avg: m,
        }
    }

    #[test]
    fn test_scatter_and_dumbbell_render() {
        let rows = vec![
            row("Sato", "giken", Some(1.5), Some(2.0), Some(3.0)),
            row("Ito", "airtro", Some(1.0), None, Some(1.2)),
        ];

        let scatter_path = env::temp_dir().join("tag_presence_test_scatter.svg");
        workstyle_scatter(&scatter_path, "Work style", &rows).unwrap();
        assert!(fs::read_to_string(&scatter_path).unwrap().contains("Sato"));
        fs::remove_file(&scatter_path).unwrap();

        let dumbbell_path = env::temp_dir().join("tag_presence_test_dumbbell.svg");
        let ordered: Vec<&WorkstyleRow> = rows.iter().collect();
        dumbbell(&dumbbell_path, "Spread", "areas", &ordered).unwrap();
        assert!(fs::read_to_string(&dumbbell_path).unwrap().contains("Monthly"));
        fs::remove_file(&dumbbell_path).unwrap();
    }

    #[test]
    fn test_box_plots_render_and_empty_placeholder() {
        let path = env::temp_dir().join("tag_presence_test_boxes.svg");
        let dists = vec![AreaDistribution {
            tag_name: "Sato".to_string(),
            department: Some("giken".to_string()),
            values: vec![1.0, 2.0, 3.0],
        }];
        box_plots(&path, "Daily", "areas", &dists).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("Sato"));

        box_plots(&path, "Daily", "areas", &[]).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("no data"));
        fs::remove_file(&path).unwrap();
    }
}
