//! SVG chart rendering.
//!
//! Every renderer takes already aggregated rows and a target path, and
//! returns `anyhow::Result` so plotters' backend errors propagate with `?`.
//! Text goes out as SVG `<text>` elements, so rendering needs no fonts on
//! the host.

pub mod bar;
pub mod distribution;
pub mod heatmap;
pub mod line;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

pub const FONT: &str = "sans-serif";

/// matplotlib's `tab20`, used for per-person and per-place series.
pub const TAB20: [RGBColor; 20] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xae, 0xc7, 0xe8),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0xff, 0xbb, 0x78),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0x98, 0xdf, 0x8a),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0xff, 0x98, 0x96),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0xc5, 0xb0, 0xd5),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xc4, 0x9c, 0x94),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0xf7, 0xb6, 0xd2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xc7, 0xc7, 0xc7),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0xdb, 0xdb, 0x8d),
    RGBColor(0x17, 0xbe, 0xcf),
    RGBColor(0x9e, 0xda, 0xe5),
];

pub fn palette_color(index: usize) -> RGBColor {
    TAB20[index % TAB20.len()]
}

const VIRIDIS_STOPS: [(u8, u8, u8); 5] = [
    (0x44, 0x01, 0x54),
    (0x3b, 0x52, 0x8b),
    (0x21, 0x91, 0x8c),
    (0x5e, 0xc9, 0x62),
    (0xfd, 0xe7, 0x25),
];

/// Viridis approximated by linear interpolation between five stops; `t` is
/// clamped to `[0, 1]`.
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (VIRIDIS_STOPS.len() - 1) as f64;
    let lo = (scaled.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
    let frac = scaled - lo as f64;
    let (a, b) = (VIRIDIS_STOPS[lo], VIRIDIS_STOPS[lo + 1]);
    let mix = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// One named series of `(x, y)` points.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<X> {
    pub name: String,
    pub points: Vec<(X, f64)>,
}

/// Opens an SVG canvas cleared to white.
pub fn canvas(path: &Path, size: (u32, u32)) -> Result<DrawingArea<SVGBackend<'_>, Shift>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    Ok(root)
}

/// Draws a panel title and a centered grey "no data" notice.
pub fn draw_no_data<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, title: &str) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    let title_style = TextStyle::from((FONT, 20).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
    area.draw(&Text::new(title.to_string(), (w / 2, 10), title_style))?;

    let notice_style = TextStyle::from((FONT, 18).into_font())
        .color(&RGBColor(0x80, 0x80, 0x80))
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new("no data".to_string(), (w / 2, h / 2), notice_style))?;
    Ok(())
}

/// Color swatches with names, stacked from the top of `area`.
pub fn draw_legend<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, entries: &[(String, RGBColor)]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    for (i, (name, color)) in entries.iter().enumerate() {
        let y = 60 + 24 * i as i32;
        area.draw(&Rectangle::new([(10, y - 8), (26, y + 8)], color.filled()))?;
        area.draw(&Text::new(name.clone(), (34, y), style.clone()))?;
    }
    Ok(())
}

/// Seconds since the epoch, the x coordinate of every time axis.
pub fn epoch_seconds(at: &NaiveDateTime) -> i64 {
    at.and_utc().timestamp()
}

/// Formats an x coordinate produced by [`epoch_seconds`].
pub fn format_epoch(seconds: i64, fmt: &str) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|d| d.naive_utc().format(fmt).to_string())
        .unwrap_or_default()
}

/// Widens a degenerate range so plotters has something to scale.
pub fn padded_range(min: f64, max: f64, pad: f64) -> std::ops::Range<f64> {
    if (max - min).abs() < f64::EPSILON {
        (min - pad)..(max + pad)
    } else {
        min..max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_datetime;

    #[test]
    fn test_viridis_endpoints_and_clamping() {
        assert_eq!(viridis(0.0), RGBColor(0x44, 0x01, 0x54));
        assert_eq!(viridis(1.0), RGBColor(0xfd, 0xe7, 0x25));
        assert_eq!(viridis(-3.0), viridis(0.0));
        assert_eq!(viridis(7.0), viridis(1.0));
        assert_eq!(viridis(0.5), RGBColor(0x21, 0x91, 0x8c));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(palette_color(0), palette_color(20));
    }

    #[test]
    fn test_epoch_roundtrip() {
        let at = parse_datetime("2025-09-01 08:05:00").unwrap();
        assert_eq!(format_epoch(epoch_seconds(&at), "%m/%d %H:%M"), "09/01 08:05");
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(3.0, 3.0, 1.0), 2.0..4.0);
        assert_eq!(padded_range(0.0, 5.0, 1.0), 0.0..5.0);
    }
}
