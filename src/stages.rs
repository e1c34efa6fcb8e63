//! Stage validators.
//!
//! Each stage takes an [`XmlInput`] and returns a [`ValidationResult`].
//! Expected document failures are carried inside the result; `Err` is
//! reserved for infrastructure problems such as I/O failures, libxml2
//! internal errors or missing settings.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::encoding::EncodingOperations;
use crate::error::{Error, LibXml2Error, Result, SchemaViolation, SyntaxFailure, ValidationError};
use crate::libxml2::{LibXml2Wrapper, SchemaOutcome, XmlDocument, XmlElement, XmlSchemaPtr};
use crate::result::ValidationResult;
use crate::rules::RuleSet;
use crate::settings;

/// Anything a stage can validate: a file, or a document already parsed from one.
#[derive(Debug, Clone, Copy)]
pub enum XmlInput<'a> {
    Path(&'a Path),
    Document(&'a XmlDocument),
    Element(XmlElement<'a>),
}

impl<'a> XmlInput<'a> {
    /// The file the input came from
    pub fn path(&self) -> &'a Path {
        match *self {
            XmlInput::Path(path) => path,
            XmlInput::Document(document) => document.source(),
            XmlInput::Element(element) => element.document().source(),
        }
    }

    pub fn filename(&self) -> PathBuf {
        self.path().to_path_buf()
    }

    fn document(&self) -> std::result::Result<DocumentRef<'a>, LibXml2Error> {
        match *self {
            XmlInput::Path(path) => LibXml2Wrapper::new()
                .parse_document(path)
                .map(DocumentRef::Owned),
            XmlInput::Document(document) => Ok(DocumentRef::Borrowed(document)),
            XmlInput::Element(element) => Ok(DocumentRef::Borrowed(element.document())),
        }
    }
}

impl<'a> From<&'a Path> for XmlInput<'a> {
    fn from(path: &'a Path) -> Self {
        XmlInput::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for XmlInput<'a> {
    fn from(path: &'a PathBuf) -> Self {
        XmlInput::Path(path.as_path())
    }
}

impl<'a> From<&'a str> for XmlInput<'a> {
    fn from(path: &'a str) -> Self {
        XmlInput::Path(Path::new(path))
    }
}

impl<'a> From<&'a String> for XmlInput<'a> {
    fn from(path: &'a String) -> Self {
        XmlInput::Path(Path::new(path.as_str()))
    }
}

impl<'a> From<&'a XmlDocument> for XmlInput<'a> {
    fn from(document: &'a XmlDocument) -> Self {
        XmlInput::Document(document)
    }
}

impl<'a> From<XmlElement<'a>> for XmlInput<'a> {
    fn from(element: XmlElement<'a>) -> Self {
        XmlInput::Element(element)
    }
}

enum DocumentRef<'a> {
    Owned(XmlDocument),
    Borrowed(&'a XmlDocument),
}

impl Deref for DocumentRef<'_> {
    type Target = XmlDocument;

    fn deref(&self) -> &XmlDocument {
        match self {
            DocumentRef::Owned(document) => document,
            DocumentRef::Borrowed(document) => document,
        }
    }
}

/// Cross-checks the declared encoding against the bytes on disk.
pub fn validate_encoding<'a>(input: impl Into<XmlInput<'a>>) -> Result<ValidationResult> {
    let input = input.into();
    let filename = input.filename();

    match EncodingOperations::ensure_consistent_encoding(input.path()) {
        Ok(_) => Ok(ValidationResult::passed(filename)),
        Err(Error::Encoding(cause)) => Ok(ValidationResult::failed(
            filename,
            ValidationError::Encoding(cause),
        )),
        Err(other) => Err(other),
    }
}

/// Checks well-formedness, then that the declared encoding matches the bytes.
///
/// The parser may accept a document whose declaration contradicts its
/// content, so the encoding cross-check runs even after a clean parse.
pub fn validate_syntax<'a>(input: impl Into<XmlInput<'a>>) -> Result<ValidationResult> {
    let input = input.into();
    let filename = input.filename();

    if let XmlInput::Path(path) = input {
        match LibXml2Wrapper::new().parse_document(path) {
            Ok(_document) => {}
            Err(LibXml2Error::NotWellFormed(cause)) => {
                return Ok(ValidationResult::failed(
                    filename,
                    ValidationError::Syntax(SyntaxFailure::NotWellFormed(cause)),
                ));
            }
            Err(other) => return Err(other.into()),
        }
    }

    match EncodingOperations::ensure_consistent_encoding(input.path()) {
        Ok(_) => Ok(ValidationResult::passed(filename)),
        Err(Error::Encoding(cause)) => Ok(ValidationResult::failed(
            filename,
            ValidationError::Syntax(SyntaxFailure::Encoding(cause)),
        )),
        Err(other) => Err(other),
    }
}

/// Validates against the schema from the process-wide settings.
pub fn validate_schema<'a>(input: impl Into<XmlInput<'a>>) -> Result<ValidationResult> {
    let settings = settings::get()?;
    validate_schema_against(input, settings.schema())
}

/// Validates against an explicit compiled schema.
///
/// A document that does not parse is not reported here; that is the
/// syntax stage's finding.
pub fn validate_schema_against<'a>(
    input: impl Into<XmlInput<'a>>,
    schema: &XmlSchemaPtr,
) -> Result<ValidationResult> {
    let input = input.into();
    let filename = input.filename();

    let document = match input.document() {
        Ok(document) => document,
        Err(LibXml2Error::NotWellFormed(cause)) => {
            debug!(path = %filename.display(), %cause, "schema stage skipped unparsable document");
            return Ok(ValidationResult::passed(filename));
        }
        Err(other) => return Err(other.into()),
    };

    match LibXml2Wrapper::new().validate_document(schema, &document)? {
        SchemaOutcome::Invalid { errors, .. } => Ok(ValidationResult::failed(
            filename,
            ValidationError::Schema(SchemaViolation { errors }),
        )),
        _ => Ok(ValidationResult::passed(filename)),
    }
}

/// Runs the rule set from the process-wide settings.
pub fn validate_rules<'a>(input: impl Into<XmlInput<'a>>) -> Result<ValidationResult> {
    let settings = settings::get()?;
    validate_rules_with(input, settings.rules())
}

/// Runs an explicit rule set. Like the schema stage, an unparsable
/// document is left to the syntax stage.
pub fn validate_rules_with<'a>(
    input: impl Into<XmlInput<'a>>,
    rules: &RuleSet,
) -> Result<ValidationResult> {
    let input = input.into();
    let filename = input.filename();

    if rules.is_empty() {
        return Ok(ValidationResult::passed(filename));
    }

    let document = match input.document() {
        Ok(document) => document,
        Err(LibXml2Error::NotWellFormed(cause)) => {
            debug!(path = %filename.display(), %cause, "rules stage skipped unparsable document");
            return Ok(ValidationResult::passed(filename));
        }
        Err(other) => return Err(other.into()),
    };

    match rules.check(&document) {
        Ok(()) => Ok(ValidationResult::passed(filename)),
        Err(violation) => Ok(ValidationResult::failed(
            filename,
            ValidationError::Rules(violation),
        )),
    }
}
