use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::DataLoadError;
use crate::models::{AttendanceRecord, Dataset, ModuleCatalog};

pub const MODULE_COLUMN: &str = "Module Name";
pub const DATE_COLUMN: &str = "Date";
pub const OVERALL_ATTENDANCE_COLUMN: &str = "Student Overall Attendance";
pub const ATTENDED_COLUMN: &str = "Attended";

const REQUIRED_COLUMNS: [&str; 4] = [
    MODULE_COLUMN,
    DATE_COLUMN,
    OVERALL_ATTENDANCE_COLUMN,
    ATTENDED_COLUMN,
];

#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "Module Name")]
    module: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Student Overall Attendance")]
    student_overall_attendance: String,
    #[serde(rename = "Attended")]
    attended: String,
}

pub fn load_dataset(path: &Path) -> Result<Dataset, DataLoadError> {
    let file = std::fs::File::open(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = load_from_reader(file)?;
    if dataset.catalog.is_empty() {
        warn!(path = %path.display(), "dataset has no attendance rows");
    }
    info!(
        path = %path.display(),
        records = dataset.records.len(),
        modules = dataset.catalog.len(),
        "loaded attendance dataset"
    );
    Ok(dataset)
}

pub fn load_from_reader<R: Read>(source: R) -> Result<Dataset, DataLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DataLoadError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let row_number = index + 1;

        let date = parse_date(&row.date).ok_or_else(|| DataLoadError::InvalidDate {
            row: row_number,
            value: row.date.clone(),
        })?;
        let student_overall_attendance = parse_overall_attendance(&row.student_overall_attendance)
            .ok_or_else(|| DataLoadError::InvalidAttendance {
                row: row_number,
                value: row.student_overall_attendance.clone(),
            })?;
        let attended = parse_attended(&row.attended).ok_or_else(|| DataLoadError::InvalidAttended {
            row: row_number,
            value: row.attended.clone(),
        })?;

        records.push(AttendanceRecord {
            module: row.module,
            date,
            student_overall_attendance,
            attended,
        });
    }

    let catalog = ModuleCatalog::from_records(&records);
    Ok(Dataset { records, catalog })
}

/// Accepts ISO dates, ISO timestamps (time is dropped) and day-first dates.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ts| ts.date()))
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

/// NaN and infinities are rejected so undefined statistics stay `None`.
fn parse_overall_attendance(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_attended(value: &str) -> Option<bool> {
    match value.parse::<f64>().ok()? {
        v if v == 0.0 => Some(false),
        v if v == 1.0 => Some(true),
        _ => None,
    }
}
