//! # xml-verdict Library
//!
//! Staged XML validation. A [`Checker`] runs each file through rank-ordered
//! stages (encoding, syntax, schema, rules) and reports the first failure as
//! a [`ValidationResult`] whose [`Passing`] severity says how far the file
//! got. The [`AuditEngine`] does the same for whole batches, concurrently.

pub mod checker;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod error;
pub mod file_discovery;
pub mod libxml2;
pub mod logger;
pub mod logging;
pub mod output;
pub mod passing;
pub mod result;
pub mod rules;
pub mod settings;
pub mod stages;
pub mod validator;

pub use checker::{Checker, Stage};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, Mode};
pub use encoding::{CharsetDetector, ChardetngDetector, EncodingOperations, EncodingProbe};
pub use error::{
    EncodingError, Error, LibXml2Error, ParseError, Result, RuleViolation, SchemaViolation,
    SyntaxFailure, ValidationError,
};
pub use file_discovery::FileDiscovery;
pub use libxml2::{LibXml2Wrapper, XmlDocument, XmlElement, XmlSchemaPtr};
pub use logger::{ErrorLogger, FailureRecord};
pub use output::Output;
pub use passing::Passing;
pub use result::ValidationResult;
pub use rules::{RootElementRule, Rule, RuleSet};
pub use settings::{Settings, SettingsError};
pub use stages::{
    XmlInput, validate_encoding, validate_rules, validate_rules_with, validate_schema,
    validate_schema_against, validate_syntax,
};
pub use validator::{AuditConfig, AuditEngine, AuditReport, FileOutcome, FileVerdict};
