use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ValidationError, error_chain};
use crate::passing::Passing;

/// Outcome of running one file through one validation stage.
///
/// The severity is derived from the error once, at construction, and the
/// result is never modified afterwards.
#[derive(Debug)]
pub struct ValidationResult {
    filename: PathBuf,
    error: Option<ValidationError>,
    severity: Passing,
}

impl ValidationResult {
    pub fn new(filename: impl Into<PathBuf>, error: Option<ValidationError>) -> Self {
        let severity = Passing::from_error(error.as_ref());
        ValidationResult {
            filename: filename.into(),
            error,
            severity,
        }
    }

    pub fn passed(filename: impl Into<PathBuf>) -> Self {
        Self::new(filename, None)
    }

    pub fn failed(filename: impl Into<PathBuf>, error: ValidationError) -> Self {
        Self::new(filename, Some(error))
    }

    /// Builds a result from a crate-wide error.
    ///
    /// Only [`Error::Validation`] is accepted. Any other error is returned as
    /// [`Error::UnsuitableError`] wrapping the original.
    pub fn from_error(filename: impl Into<PathBuf>, error: Error) -> Result<Self> {
        match error {
            Error::Validation(validation) => Ok(Self::failed(filename, validation)),
            other => Err(Error::UnsuitableError(Box::new(other))),
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<ValidationError> {
        self.error
    }

    pub fn severity(&self) -> Passing {
        self.severity
    }

    pub fn passed_syntax(&self) -> bool {
        self.severity > Passing::Syntax
    }

    pub fn passed_schema(&self) -> bool {
        self.severity > Passing::Schema
    }

    pub fn passed_rules(&self) -> bool {
        self.severity > Passing::Rules
    }

    /// True only when every stage passed.
    pub fn is_valid(&self) -> bool {
        self.passed_syntax() && self.passed_schema() && self.passed_rules()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "{}: {}", self.filename.display(), self.severity),
            Some(error) => write!(
                f,
                "{}: {} ({})",
                self.filename.display(),
                self.severity,
                error_chain(error)
            ),
        }
    }
}
