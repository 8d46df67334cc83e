//! JSON-lines record loader.
//!
//! One patient object per line. Blank lines are skipped; a malformed line is
//! collected in [`LoadedRecords::rejected`] without affecting the rest of the file.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::DEFAULT_INPUT_FILE;
use crate::models::PatientRecord;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Patient file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line that could not be parsed into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<PatientRecord>,
    pub rejected: Vec<RejectedLine>,
}

/// `patients.jsonl` next to the running executable, or in the working
/// directory when the executable path is unavailable.
pub fn default_input_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(DEFAULT_INPUT_FILE)
}

/// Load every well-formed record from a JSON-lines file.
pub fn load_patients(path: &Path) -> Result<LoadedRecords, LoaderError> {
    if !path.is_file() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path)?;
    let loaded = parse_lines(BufReader::new(file))?;

    tracing::info!(
        path = %path.display(),
        records = loaded.records.len(),
        rejected = loaded.rejected.len(),
        "Patient file loaded"
    );
    Ok(loaded)
}

/// Parse JSON-lines from any reader.
pub fn parse_lines<R: BufRead>(reader: R) -> Result<LoadedRecords, LoaderError> {
    let mut loaded = LoadedRecords::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<PatientRecord>(trimmed) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                loaded.rejected.push(RejectedLine {
                    line: line_number,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");
        assert!(matches!(load_patients(&path), Err(LoaderError::NotFound(p)) if p == path));
    }

    #[test]
    fn loads_records_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"fname": "An", "lname": "Do"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, r#"{{"fname": "Binh", "lname": "Vo", "problems": [{{"title": "Gout"}}]}}"#)
            .unwrap();

        let loaded = load_patients(file.path()).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.records[1].problems[0].title, "Gout");
    }

    #[test]
    fn malformed_line_does_not_abort_file() {
        let input = concat!(
            "{\"fname\": \"An\"}\n",
            "{not json\n",
            "[1, 2, 3]\n",
            "{\"fname\": \"Chi\"}\n",
        );
        let loaded = parse_lines(input.as_bytes()).unwrap();

        let names: Vec<&str> = loaded
            .records
            .iter()
            .map(|r| r.demographics.fname.as_str())
            .collect();
        assert_eq!(names, vec!["An", "Chi"]);
        let lines: Vec<usize> = loaded.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn null_sections_still_load() {
        let input = concat!(
            "{\"fname\": \"An\", \"lname\": \"Do\", \"problems\": null}\n",
            "{\"fname\": \"Binh\", \"encounters\": null, \"medications\": null}\n",
        );
        let loaded = parse_lines(input.as_bytes()).unwrap();
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.records.len(), 2);
        assert!(loaded.records[0].problems.is_empty());
        assert!(loaded.records[1].encounters.is_empty());
    }

    #[test]
    fn default_path_uses_default_file_name() {
        assert!(default_input_path().ends_with(DEFAULT_INPUT_FILE));
    }
}
