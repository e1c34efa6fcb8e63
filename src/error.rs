use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::settings::SettingsError;

/// Crate-wide infrastructure error.
///
/// A stage validator never wraps one of these into a
/// [`ValidationResult`](crate::ValidationResult); they are returned to the
/// caller as `Err`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding check failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("LibXML2 internal error: {0}")]
    LibXml2(#[from] LibXml2Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("ValidationResult only accepts validation errors, got: {0}")]
    UnsuitableError(#[source] Box<Error>),
}

/// The closed family of document-level validation failures.
///
/// Each variant corresponds to exactly one [`Passing`](crate::Passing) rank.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("encoding validation failed")]
    Encoding(#[source] EncodingError),

    #[error("syntax validation failed")]
    Syntax(#[source] SyntaxFailure),

    #[error("schema validation failed")]
    Schema(#[source] SchemaViolation),

    #[error("rules validation failed")]
    Rules(#[source] RuleViolation),

    #[error("validation failed: {details}")]
    Failed { details: String },
}

/// Failures while reading or cross-checking a document's encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("text does not resemble an XML declaration: {text:?}")]
    DeclarationAbsent { text: String },

    #[error("XML declaration has no 'encoding' attribute: {text:?}")]
    DeclarationHasNoEncoding { text: String },

    #[error("XML declaration 'encoding' attribute is an empty string: {text:?}")]
    DeclarationEncodingEmptyString { text: String },

    #[error("XML declaration 'encoding' attribute is badly quoted: {text:?}")]
    DeclarationEncodingBadQuoteSyntax { text: String },

    #[error("cannot read the 'encoding' attribute value: {text:?}")]
    DeclarationUnreadable { text: String },

    #[error("declared encoding '{declared}' does not match detected encoding '{detected}'")]
    Mismatch { detected: String, declared: String },
}

impl EncodingError {
    /// Declaration defects that a non-strict lookup reports as an empty
    /// encoding instead of an error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EncodingError::DeclarationHasNoEncoding { .. }
                | EncodingError::DeclarationEncodingEmptyString { .. }
                | EncodingError::DeclarationEncodingBadQuoteSyntax { .. }
        )
    }
}

/// Diagnostic reported by libxml2 for a document that is not well-formed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (line {line}, column {column}, code {code})")]
pub struct ParseError {
    pub code: i32,
    pub message: String,
    pub line: i32,
    pub column: i32,
}

/// Cause of a syntax-stage failure
#[derive(Error, Debug)]
pub enum SyntaxFailure {
    #[error("document is not well-formed")]
    NotWellFormed(#[source] ParseError),

    #[error("document encoding is inconsistent")]
    Encoding(#[source] EncodingError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", summarize(.errors))]
pub struct SchemaViolation {
    pub errors: Vec<String>,
}

fn summarize(errors: &[String]) -> String {
    match errors {
        [] => "document does not conform to the schema".to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rule '{rule}' violated: {message}")]
pub struct RuleViolation {
    pub rule: String,
    pub message: String,
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: {details}")]
    SchemaParseFailed { details: String },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Schema validation of {file} aborted with code {code}")]
    ValidationFailed { code: i32, file: PathBuf },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Cannot read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document {path} is too large for libxml2")]
    DocumentTooLarge { path: PathBuf },

    #[error("Document is not well-formed: {0}")]
    NotWellFormed(ParseError),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;

/// Joins an error and its `source()` chain into one line.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    causes(error).join(": ")
}

/// Collects the display text of an error and each of its sources.
pub fn causes(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut current = error.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_encoding_error_display() {
        let mismatch = EncodingError::Mismatch {
            detected: "utf-8".to_string(),
            declared: "iso-8859-1".to_string(),
        };
        assert!(mismatch.to_string().contains("iso-8859-1"));
        assert!(mismatch.to_string().contains("utf-8"));

        let absent = EncodingError::DeclarationAbsent {
            text: "<root/>".to_string(),
        };
        assert!(absent.to_string().contains("XML declaration"));
        assert!(absent.to_string().contains("<root/>"));
    }

    #[test]
    fn test_recoverable_encoding_errors() {
        let text = String::from("<?xml ?>");
        assert!(EncodingError::DeclarationHasNoEncoding { text: text.clone() }.is_recoverable());
        assert!(
            EncodingError::DeclarationEncodingEmptyString { text: text.clone() }.is_recoverable()
        );
        assert!(
            EncodingError::DeclarationEncodingBadQuoteSyntax { text: text.clone() }
                .is_recoverable()
        );
        assert!(!EncodingError::DeclarationAbsent { text: text.clone() }.is_recoverable());
        assert!(!EncodingError::DeclarationUnreadable { text }.is_recoverable());
    }

    #[test]
    fn test_schema_violation_summary() {
        let none = SchemaViolation { errors: vec![] };
        assert!(none.to_string().contains("does not conform"));

        let many = SchemaViolation {
            errors: vec![
                "Element 'book': Missing child element(s).".to_string(),
                "Element 'isbn': This element is not expected.".to_string(),
            ],
        };
        assert_eq!(
            many.to_string(),
            "Element 'book': Missing child element(s). (and 1 more)"
        );
    }

    #[test]
    fn test_validation_error_source_chain() {
        let error = ValidationError::Syntax(SyntaxFailure::Encoding(EncodingError::Mismatch {
            detected: "utf-8".to_string(),
            declared: "iso-8859-1".to_string(),
        }));

        let failure = error.source().unwrap();
        assert!(failure.downcast_ref::<SyntaxFailure>().is_some());

        let cause = failure.source().unwrap();
        assert!(matches!(
            cause.downcast_ref::<EncodingError>(),
            Some(EncodingError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_error_chain_formatting() {
        let error = ValidationError::Rules(RuleViolation {
            rule: "root-element".to_string(),
            message: "expected <catalog>, found <inventory>".to_string(),
        });

        assert_eq!(
            error_chain(&error),
            "rules validation failed: rule 'root-element' violated: expected <catalog>, found <inventory>"
        );
        assert_eq!(causes(&error).len(), 2);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Access denied");
        let error: Error = io_error.into();

        match error {
            Error::Io(_) => (),
            _ => panic!("Expected Error::Io"),
        }
    }

    #[test]
    fn test_libxml2_error_display() {
        let parse_failed = LibXml2Error::SchemaParseFailed {
            details: "no root element".to_string(),
        };
        assert!(parse_failed.to_string().contains("Schema parsing failed"));

        let validation_failed = LibXml2Error::ValidationFailed {
            code: -1,
            file: PathBuf::from("test.xml"),
        };
        assert!(validation_failed.to_string().contains("test.xml"));
        assert!(validation_failed.to_string().contains("-1"));

        let error: Error = LibXml2Error::MemoryAllocation.into();
        assert!(error.to_string().contains("Memory allocation failed"));
    }

    #[test]
    fn test_parse_error_display() {
        let error = ParseError {
            code: 76,
            message: "Opening and ending tag mismatch: book line 3 and catalog".to_string(),
            line: 4,
            column: 11,
        };
        let display = error.to_string();
        assert!(display.contains("tag mismatch"));
        assert!(display.contains("line 4"));
        assert!(display.contains("column 11"));
    }
}
