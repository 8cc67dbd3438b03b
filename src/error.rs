use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("cannot read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}: cannot parse date {value:?}")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: Student Overall Attendance must be a finite number, got {value:?}")]
    InvalidAttendance { row: usize, value: String },

    #[error("row {row}: Attended must be 0 or 1, got {value:?}")]
    InvalidAttended { row: usize, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("module {module:?} is not in the dataset")]
pub struct InvalidSelectionError {
    pub module: String,
}
