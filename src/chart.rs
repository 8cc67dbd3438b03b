use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::models::DailyRate;

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 600;

// Headroom above 1.0 so markers at full attendance are not clipped.
const Y_MAX: f64 = 1.1;
const Y_TICKS: [f64; 7] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0, Y_MAX];

/// Renders the daily attendance rate as an SVG line chart.
pub fn render_daily_rate(module: &str, series: &[DailyRate]) -> anyhow::Result<String> {
    let mut svg = String::new();
    let root = SVGBackend::with_string(&mut svg, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    draw(root, module, series)?;
    Ok(svg)
}

fn draw(root: DrawingArea<SVGBackend, Shift>, module: &str, series: &[DailyRate]) -> anyhow::Result<()> {
    root.fill(&WHITE)?;
    let caption = format!("Daily Attendance Rate for {module}");

    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => {
            let body = root.titled(&caption, ("sans-serif", 24))?;
            body.draw(&Text::new(
                "No attendance recorded for this module",
                (CHART_WIDTH as i32 / 2 - 180, CHART_HEIGHT as i32 / 2 - 40),
                ("sans-serif", 20),
            ))?;
            root.present()?;
            return Ok(());
        }
    };
    let (start, end) = x_range(first, last);

    let mut chart = ChartBuilder::on(&root)
        .caption(&caption, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(start..end, (0f64..Y_MAX).with_key_points(Y_TICKS.to_vec()))?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Average Attendance Rate (0.0 to 1.0)")
        .x_label_formatter(&|date: &NaiveDate| date.format("%Y-%m-%d").to_string())
        .y_label_formatter(&|rate: &f64| format!("{rate:.1}"))
        .draw()?;

    let points: Vec<(NaiveDate, f64)> = series.iter().map(|point| (point.date, point.rate)).collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(date, rate)| Circle::new((date, rate), 4, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// A single date gets a day of padding either side so the axis is not degenerate.
fn x_range(first: NaiveDate, last: NaiveDate) -> (NaiveDate, NaiveDate) {
    if first == last {
        (first - Duration::days(1), last + Duration::days(1))
    } else {
        (first, last)
    }
}
