//! Appends failure records for a run to the configured log file.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::error::{Result, error_chain};
use crate::passing::Passing;
use crate::result::ValidationResult;

const FOOTER: &str = "=== end of run ===";

/// One failed file, as written to the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub filename: PathBuf,
    pub severity: Passing,
    pub message: String,
}

impl FailureRecord {
    /// A record for `result`, or `None` when it is valid.
    pub fn from_result(result: &ValidationResult) -> Option<Self> {
        let error = result.error()?;
        Some(FailureRecord {
            filename: result.filename().to_path_buf(),
            severity: result.severity(),
            message: error_chain(error),
        })
    }
}

/// Writes one block per run: header, a line per failure, footer.
///
/// The log is only ever appended to.
#[derive(Debug, Clone)]
pub struct ErrorLogger {
    filename: PathBuf,
}

impl ErrorLogger {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Drains `records` into a new block and returns how many were written.
    ///
    /// Accepts any iterator, including an `mpsc::Receiver` fed by workers.
    pub fn write<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = FailureRecord>,
    {
        let records: Vec<FailureRecord> = records.into_iter().collect();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.filename)?;
        let mut out = BufWriter::new(file);

        writeln!(
            out,
            "=== xml-verdict run {} | failures: {} ===",
            Local::now().to_rfc3339(),
            records.len()
        )?;
        for record in &records {
            writeln!(
                out,
                "[{}] {}: {}",
                record.severity,
                record.filename.display(),
                record.message.replace('\n', " ")
            )?;
        }
        writeln!(out, "{FOOTER}")?;
        out.flush()?;

        tracing::debug!(
            log = %self.filename.display(),
            failures = records.len(),
            "failure log written"
        );
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SchemaViolation, ValidationError};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn record(name: &str, severity: Passing) -> FailureRecord {
        FailureRecord {
            filename: PathBuf::from(name),
            severity,
            message: format!("{name} is broken"),
        }
    }

    #[test]
    fn test_record_from_result() {
        let valid = ValidationResult::passed("ok.xml");
        assert!(FailureRecord::from_result(&valid).is_none());

        let invalid = ValidationResult::failed(
            "bad.xml",
            ValidationError::Schema(SchemaViolation {
                errors: vec!["Element 'dvd': This element is not expected.".to_string()],
            }),
        );
        let record = FailureRecord::from_result(&invalid).unwrap();
        assert_eq!(record.severity, Passing::Schema);
        assert_eq!(record.filename, PathBuf::from("bad.xml"));
        assert!(record.message.starts_with("schema validation failed: "));
        assert!(record.message.contains("dvd"));
    }

    #[test]
    fn test_block_layout() {
        let dir = TempDir::new().unwrap();
        let logger = ErrorLogger::new(dir.path().join("validation.log"));

        let written = logger
            .write(vec![
                record("a.xml", Passing::Syntax),
                record("b.xml", Passing::Rules),
            ])
            .unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(logger.filename()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("=== xml-verdict run "));
        assert!(lines[0].ends_with("| failures: 2 ==="));
        assert_eq!(lines[1], "[SYNTAX] a.xml: a.xml is broken");
        assert_eq!(lines[2], "[RULES] b.xml: b.xml is broken");
        assert_eq!(lines[3], FOOTER);
    }

    #[test]
    fn test_appends_without_truncating() {
        let dir = TempDir::new().unwrap();
        let logger = ErrorLogger::new(dir.path().join("validation.log"));

        logger.write(vec![record("first.xml", Passing::Schema)]).unwrap();
        logger.write(Vec::new()).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        let content = fs::read_to_string(logger.filename()).unwrap();
        assert_eq!(content.matches("=== xml-verdict run").count(), 2);
        assert_eq!(content.matches(FOOTER).count(), 2);
        assert!(content.contains("first.xml"));
        assert!(content.contains("| failures: 0 ==="));
    }

    #[test]
    fn test_listens_on_channel() {
        let dir = TempDir::new().unwrap();
        let logger = ErrorLogger::new(dir.path().join("validation.log"));
        let (tx, rx) = mpsc::channel();

        let producer = std::thread::spawn(move || {
            for i in 0..3 {
                tx.send(record(&format!("{i}.xml"), Passing::Syntax)).unwrap();
            }
        });

        let written = logger.write(rx).unwrap();
        producer.join().unwrap();
        assert_eq!(written, 3);
    }

    #[test]
    fn test_unwritable_log_is_error() {
        let logger = ErrorLogger::new("/no/such/directory/validation.log");
        assert!(matches!(
            logger.write(Vec::new()),
            Err(crate::Error::Io(_))
        ));
    }
}
