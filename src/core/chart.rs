use chrono::NaiveDate;
use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use std::io::Cursor;

use crate::config::ReportSettings;
use crate::domain::model::{DailySeries, DateRange, ReportSeries};
use crate::utils::error::{ReportError, Result};

pub const CHART_WIDTH: u32 = 1200;
pub const CHART_HEIGHT: u32 = 600;

const LEGEND_HEIGHT: u32 = 50;
const BAR_OFFSET: f64 = 0.2;
const BAR_WIDTH: f64 = 0.4;
const BAR_ALPHA: f64 = 0.8;
const AREA_ALPHA: f64 = 0.5;
const X_PADDING: f64 = 0.6;
const FONT: &str = "sans-serif";

const BUCKET_A_FILL: RGBColor = RGBColor(0x32, 0xad, 0xef);
const BUCKET_A_EDGE: RGBColor = RGBColor(0x19, 0x9e, 0xf5);
const BUCKET_B_FILL: RGBColor = RGBColor(0xd4, 0x90, 0xd4);
const BUCKET_B_EDGE: RGBColor = RGBColor(0xa3, 0x39, 0xb6);
const TOTAL_FILL: RGBColor = RGBColor(0x9a, 0xe9, 0xcf);
const TOTAL_LINE: RGBColor = RGBColor(0x04, 0xe3, 0x97);
const SPINE: RGBColor = RGBColor(0xd3, 0xd3, 0xd3);
const GRID: RGBColor = RGBColor(0xb0, 0xb0, 0xb0);

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLabels {
    pub bucket_a: String,
    pub bucket_b: String,
    pub total: String,
}

impl Default for ChartLabels {
    fn default() -> Self {
        Self {
            bucket_a: "Monto 5".to_string(),
            bucket_b: "Monto 10".to_string(),
            total: "Total".to_string(),
        }
    }
}

/// Bars per fee bucket on the primary axis, the daily total as a filled area
/// on a hidden secondary axis, legend underneath.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
    labels: ChartLabels,
}

impl ChartRenderer {
    pub fn new(labels: ChartLabels) -> Self {
        Self {
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
            labels,
        }
    }

    pub fn from_settings(settings: &ReportSettings) -> Self {
        Self::new(ChartLabels {
            bucket_a: settings.bucket_a.label.clone(),
            bucket_b: settings.bucket_b.label.clone(),
            ..ChartLabels::default()
        })
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn file_name(range: &DateRange) -> String {
        format!("report_{}_{}.png", range.start, range.end)
    }

    /// Renders to PNG bytes. The pixel buffer and backend live only for this call.
    pub fn render(&self, series: &ReportSeries) -> Result<Vec<u8>> {
        let origin = series
            .total
            .first_date()
            .ok_or_else(|| ReportError::render("total series is empty"))?;
        if self.height <= LEGEND_HEIGHT {
            return Err(ReportError::render(format!(
                "chart height {} leaves no room for the plot",
                self.height
            )));
        }

        let mut buffer = vec![0u8; (self.width as usize) * (self.height as usize) * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();
            self.draw(&root, series, origin)?;
            root.present().map_err(ReportError::render)?;
        }

        encode_png(buffer, self.width, self.height)
    }

    fn draw(&self, root: &Canvas<'_>, series: &ReportSeries, origin: NaiveDate) -> Result<()> {
        root.fill(&WHITE).map_err(ReportError::render)?;
        let (plot_area, legend_area) =
            root.split_vertically((self.height - LEGEND_HEIGHT) as i32);

        let total = points(&series.total, origin);
        let bucket_a = points(&series.bucket_a, origin);
        let bucket_b = points(&series.bucket_b, origin);

        let last_x = total.last().map(|(x, _)| *x).unwrap_or(0.0);
        let x_range = -X_PADDING..last_x + X_PADDING;
        let bar_top = axis_top(bucket_a.iter().chain(bucket_b.iter()).map(|(_, y)| *y));
        let total_top = axis_top(total.iter().map(|(_, y)| *y));

        let mut chart = ChartBuilder::on(&plot_area)
            .margin_top(20)
            .margin_right(30)
            .margin_left(10)
            .x_label_area_size(90)
            .y_label_area_size(80)
            .build_cartesian_2d(x_range.clone(), 0f64..bar_top)
            .map_err(ReportError::render)?
            .set_secondary_coord(x_range, 0f64..total_top);

        // Only the primary y axis is drawn; x labels are laid out by hand below.
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_x_axis()
            .y_desc("Cobros")
            .y_labels(8)
            .y_label_formatter(&|y| format!("{:.0}", y))
            .axis_style(SPINE.stroke_width(1))
            .bold_line_style(GRID.mix(0.7).stroke_width(1))
            .light_line_style(WHITE.mix(0.0).stroke_width(0))
            .label_style((FONT, 13))
            .axis_desc_style((FONT, 16))
            .draw()
            .map_err(ReportError::render)?;

        let bars = [
            (&bucket_a, BUCKET_A_FILL, BUCKET_A_EDGE, -BAR_OFFSET),
            (&bucket_b, BUCKET_B_FILL, BUCKET_B_EDGE, BAR_OFFSET),
        ];
        for (values, fill, edge, offset) in bars {
            chart
                .draw_series(values.iter().map(|&(x, y)| {
                    Rectangle::new(bar_corners(x + offset, y), fill.mix(BAR_ALPHA).filled())
                }))
                .map_err(ReportError::render)?;
            chart
                .draw_series(
                    values
                        .iter()
                        .map(|&(x, y)| Rectangle::new(bar_corners(x + offset, y), edge.stroke_width(2))),
                )
                .map_err(ReportError::render)?;
        }

        // The total overlays the bars.
        chart
            .draw_secondary_series(
                AreaSeries::new(
                    total.iter().copied(),
                    0.0,
                    TOTAL_FILL.mix(AREA_ALPHA).filled(),
                )
                .border_style(TOTAL_LINE.stroke_width(3)),
            )
            .map_err(ReportError::render)?;

        let label_style = TextStyle::from((FONT, 13).into_font()).color(&BLACK);
        for (x, _) in &total {
            let (px, py) = chart.backend_coord(&(*x, 0.0));
            let date = origin + chrono::Duration::days(*x as i64);
            draw_diagonal_label(root, &date.format("%Y-%m-%d").to_string(), (px, py + 12), &label_style)?;
        }

        self.draw_legend(&legend_area)
    }

    fn draw_legend(&self, area: &Canvas<'_>) -> Result<()> {
        let entries = [
            (BUCKET_A_FILL, self.labels.bucket_a.as_str()),
            (BUCKET_B_FILL, self.labels.bucket_b.as_str()),
            (TOTAL_LINE, self.labels.total.as_str()),
        ];
        let (width, height) = area.dim_in_pixel();
        let slot = 160i32;
        let start = (width as i32 - slot * entries.len() as i32) / 2;
        let cy = height as i32 / 2;

        for (i, (color, label)) in entries.iter().enumerate() {
            let cx = start + slot * i as i32 + 10;
            area.draw(&Circle::new((cx, cy), 6, color.filled()))
                .map_err(ReportError::render)?;
            area.draw(&Text::new(
                label.to_string(),
                (cx + 14, cy - 8),
                (FONT, 14).into_font(),
            ))
            .map_err(ReportError::render)?;
        }
        Ok(())
    }
}

/// Day offsets from `origin` paired with the plotted value.
fn points(series: &DailySeries, origin: NaiveDate) -> Vec<(f64, f64)> {
    series
        .iter()
        .map(|(date, amount)| {
            let x = (date - origin).num_days() as f64;
            (x, amount.to_f64().unwrap_or(0.0))
        })
        .collect()
}

fn axis_top(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn bar_corners(center: f64, height: f64) -> [(f64, f64); 2] {
    [
        (center - BAR_WIDTH / 2.0, 0.0),
        (center + BAR_WIDTH / 2.0, height.max(0.0)),
    ]
}

/// Lays `text` along a 45 degree diagonal that reads upward and ends at
/// `anchor`. Glyphs stay upright; each one is spaced by its own advance.
fn draw_diagonal_label(
    area: &Canvas<'_>,
    text: &str,
    anchor: (i32, i32),
    style: &TextStyle<'_>,
) -> Result<()> {
    let glyphs: Vec<String> = text.chars().map(String::from).collect();
    let advances = glyphs
        .iter()
        .map(|glyph| {
            area.estimate_text_size(glyph, style)
                .map(|(width, _)| width)
                .map_err(ReportError::render)
        })
        .collect::<Result<Vec<_>>>()?;

    for (glyph, offset) in glyphs.iter().zip(diagonal_offsets(&advances)) {
        let position = (anchor.0 - offset, anchor.1 + offset);
        area.draw(&Text::new(glyph.as_str(), position, style.clone()))
            .map_err(ReportError::render)?;
    }
    Ok(())
}

/// Distance of each glyph's origin back along the diagonal from the end of
/// the label, measured on each axis. Consecutive origins sit one advance
/// apart along the diagonal.
fn diagonal_offsets(advances: &[u32]) -> Vec<i32> {
    let steps: Vec<i32> = advances
        .iter()
        .map(|&advance| (f64::from(advance) * std::f64::consts::FRAC_1_SQRT_2).round() as i32)
        .collect();

    let mut remaining: i32 = steps.iter().sum();
    steps
        .iter()
        .map(|step| {
            let offset = remaining;
            remaining -= step;
            offset
        })
        .collect()
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| ReportError::render("pixel buffer does not match the chart size"))?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(ReportError::render)?;
    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_series() -> ReportSeries {
        ReportSeries {
            total: vec![(day(1), dec!(150)), (day(2), dec!(150)), (day(4), dec!(90))]
                .into_iter()
                .collect(),
            bucket_a: vec![(day(1), dec!(100)), (day(2), dec!(80))].into_iter().collect(),
            bucket_b: vec![(day(1), dec!(50)), (day(2), dec!(70)), (day(4), dec!(90))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_render_produces_png_of_configured_size() {
        let png = ChartRenderer::new(ChartLabels::default())
            .render(&sample_series())
            .unwrap();

        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), CHART_WIDTH);
        assert_eq!(decoded.height(), CHART_HEIGHT);
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = ChartRenderer::new(ChartLabels::default()).with_size(640, 360);
        let first = renderer.render(&sample_series()).unwrap();
        let second = renderer.render(&sample_series()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_render_without_bucket_data() {
        let series = ReportSeries {
            total: vec![(day(1), dec!(10)), (day(2), dec!(0))].into_iter().collect(),
            ..ReportSeries::default()
        };

        let png = ChartRenderer::new(ChartLabels::default())
            .with_size(400, 300)
            .render(&series)
            .unwrap();
        assert!(!png.is_empty());
    }

    #[test]
    fn test_total_line_is_drawn_over_bars() {
        // Flat total from day 1 to day 2 crosses the bars between them at
        // well under their height.
        let series = ReportSeries {
            total: vec![(day(1), dec!(40)), (day(2), dec!(40)), (day(3), dec!(100))]
                .into_iter()
                .collect(),
            bucket_a: vec![(day(1), dec!(50)), (day(2), dec!(50))].into_iter().collect(),
            bucket_b: vec![(day(1), dec!(50)), (day(2), dec!(50))].into_iter().collect(),
        };
        let png = ChartRenderer::new(ChartLabels::default())
            .render(&series)
            .unwrap();
        let image = image::load_from_memory(&png).unwrap().to_rgb8();
        let line = [TOTAL_LINE.0, TOTAL_LINE.1, TOTAL_LINE.2];

        let plot_rows = CHART_HEIGHT - LEGEND_HEIGHT;
        let row = (0..plot_rows)
            .max_by_key(|&y| {
                (0..CHART_WIDTH)
                    .filter(|&x| image.get_pixel(x, y).0 == line)
                    .count()
            })
            .unwrap();
        let on_line: Vec<u32> = (0..CHART_WIDTH)
            .filter(|&x| image.get_pixel(x, row).0 == line)
            .collect();

        // The flat stretch spans a full day, so it is far wider than one bar.
        assert!(on_line.len() > 100, "line row has {} pixels", on_line.len());
        let first = on_line[0];
        let last = on_line[on_line.len() - 1];
        assert_eq!(
            on_line.len() as u32,
            last - first + 1,
            "total line is interrupted on row {}",
            row
        );
    }

    #[test]
    fn test_diagonal_offsets_end_at_anchor() {
        let offsets = diagonal_offsets(&[10, 10, 4]);

        assert_eq!(offsets, vec![17, 10, 3]);
        assert!(diagonal_offsets(&[]).is_empty());
    }

    #[test]
    fn test_empty_total_is_render_error() {
        let err = ChartRenderer::new(ChartLabels::default())
            .render(&ReportSeries::default())
            .unwrap_err();
        assert!(matches!(err, ReportError::Render { .. }));
    }

    #[test]
    fn test_file_name_embeds_range() {
        let range = DateRange::new(day(1), day(30)).unwrap();
        assert_eq!(
            ChartRenderer::file_name(&range),
            "report_2024-01-01_2024-01-30.png"
        );
    }

    #[test]
    fn test_axis_top() {
        assert_eq!(axis_top(std::iter::empty()), 1.0);
        assert_eq!(axis_top(vec![0.0, -5.0].into_iter()), 1.0);
        assert!((axis_top(vec![10.0, 100.0].into_iter()) - 110.0).abs() < 1e-9);
    }
}
