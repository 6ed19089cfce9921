//! Appends one row per finished session to a CSV log under the project data
//! directory, so progress is reviewable outside the app.

use chrono::Local;
use directories::ProjectDirs;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use crate::metrics;
use crate::session::CompletionRecord;

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    date: String,
    wpm: u32,
    accuracy: u32,
    net_wpm: u32,
    grade: &'a str,
    errors: usize,
    seconds: u64,
    characters: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "retype") {
            pd.data_dir().join("history.csv")
        } else {
            PathBuf::from("retype_history.csv")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &CompletionRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Emit the header only when creating the file
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        let grade = metrics::grade(record.wpm, record.accuracy).to_string();
        writer.serialize(HistoryRow {
            date: Local::now().format("%c").to_string(),
            wpm: record.wpm,
            accuracy: record.accuracy,
            net_wpm: metrics::net_wpm(record.wpm, record.accuracy),
            grade: &grade,
            errors: record.total_errors,
            seconds: record.time_in_seconds,
            characters: record.characters_typed,
        })?;
        writer.flush()
    }
}
