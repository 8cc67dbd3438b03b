use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub module: String,
    pub date: NaiveDate,
    pub student_overall_attendance: f64,
    pub attended: bool,
}

/// Distinct module labels in the order they first appear in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModuleCatalog {
    modules: Vec<String>,
}

impl ModuleCatalog {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut modules: Vec<String> = Vec::new();
        for record in records {
            if !modules.iter().any(|module| module == &record.module) {
                modules.push(record.module.clone());
            }
        }
        Self { modules }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.iter().any(|candidate| candidate == module)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<AttendanceRecord>,
    pub catalog: ModuleCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyRate {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Everything the presentation layer needs for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub selection: String,
    pub record_count: usize,
    pub stats: SummaryStats,
    pub daily_rate: Vec<DailyRate>,
}
