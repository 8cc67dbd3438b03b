use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{AttendanceRecord, Dashboard, DailyRate, SummaryStats};

pub fn filter<'a>(records: &'a [AttendanceRecord], selection: &str) -> Vec<&'a AttendanceRecord> {
    records
        .iter()
        .filter(|record| record.module == selection)
        .collect()
}

/// Mean and sample standard deviation of `Student Overall Attendance`.
///
/// An empty view has neither; a single row has a mean but no deviation.
pub fn summary_stats(view: &[&AttendanceRecord]) -> SummaryStats {
    let n = view.len();
    if n == 0 {
        return SummaryStats {
            mean: None,
            std_dev: None,
        };
    }

    let mean = view
        .iter()
        .map(|record| record.student_overall_attendance)
        .sum::<f64>()
        / n as f64;

    let std_dev = if n < 2 {
        None
    } else {
        let squared: f64 = view
            .iter()
            .map(|record| (record.student_overall_attendance - mean).powi(2))
            .sum();
        Some((squared / (n - 1) as f64).sqrt())
    };

    SummaryStats {
        mean: Some(mean),
        std_dev,
    }
}

pub fn daily_rate(view: &[&AttendanceRecord]) -> Vec<DailyRate> {
    let mut by_date: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();

    for record in view {
        let entry = by_date.entry(record.date).or_insert((0, 0));
        if record.attended {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    by_date
        .into_iter()
        .map(|(date, (attended, total))| DailyRate {
            date,
            rate: attended as f64 / total as f64,
        })
        .collect()
}

pub fn compute_dashboard(records: &[AttendanceRecord], selection: &str) -> Dashboard {
    let view = filter(records, selection);
    Dashboard {
        selection: selection.to_string(),
        record_count: view.len(),
        stats: summary_stats(&view),
        daily_rate: daily_rate(&view),
    }
}
