use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{Error, LibXml2Error, Result};
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};
use crate::passing::Passing;
use crate::result::ValidationResult;
use crate::rules::RuleSet;
use crate::stages::{self, XmlInput};

type StageFn = dyn Fn(XmlInput<'_>) -> Result<ValidationResult> + Send + Sync;

/// A validator paired with the severity it reports on failure.
///
/// Stages are ordered by that severity, so a checker always runs the
/// cheapest, most fundamental checks first.
#[derive(Clone)]
pub struct Stage {
    rank: Passing,
    name: &'static str,
    validator: Arc<StageFn>,
}

impl Stage {
    pub fn new<F>(rank: Passing, name: &'static str, validator: F) -> Self
    where
        F: Fn(XmlInput<'_>) -> Result<ValidationResult> + Send + Sync + 'static,
    {
        Stage {
            rank,
            name,
            validator: Arc::new(validator),
        }
    }

    pub fn encoding() -> Self {
        Stage::new(Passing::Encoding, "encoding", |input| {
            stages::validate_encoding(input)
        })
    }

    pub fn syntax() -> Self {
        Stage::new(Passing::Syntax, "syntax", |input| {
            stages::validate_syntax(input)
        })
    }

    /// Schema stage reading the compiled schema from the settings singleton
    pub fn schema() -> Self {
        Stage::new(Passing::Schema, "schema", |input| {
            stages::validate_schema(input)
        })
    }

    pub fn schema_with(schema: XmlSchemaPtr) -> Self {
        Stage::new(Passing::Schema, "schema", move |input| {
            stages::validate_schema_against(input, &schema)
        })
    }

    /// Rules stage reading the rule set from the settings singleton
    pub fn rules() -> Self {
        Stage::new(Passing::Rules, "rules", |input| {
            stages::validate_rules(input)
        })
    }

    pub fn rules_with(rules: RuleSet) -> Self {
        Stage::new(Passing::Rules, "rules", move |input| {
            stages::validate_rules_with(input, &rules)
        })
    }

    pub fn rank(&self) -> Passing {
        self.rank
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, input: XmlInput<'_>) -> Result<ValidationResult> {
        (self.validator)(input)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("rank", &self.rank)
            .field("name", &self.name)
            .finish()
    }
}

/// Runs a file through rank-ordered stages, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct Checker {
    stages: Vec<Stage>,
}

impl Checker {
    /// Syntax, schema and rules, with schema and rules taken from the settings.
    pub fn new() -> Self {
        Self::from_stages(vec![Stage::syntax(), Stage::schema(), Stage::rules()])
    }

    /// Orders `stages` by rank; stages of equal rank keep their given order.
    pub fn from_stages(mut stages: Vec<Stage>) -> Self {
        stages.sort_by_key(Stage::rank);
        Checker { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Validates one file.
    ///
    /// Returns the first failing stage's result, or the last stage's
    /// result when every stage passes. A path that is not an existing file
    /// is an error before any stage runs.
    ///
    /// The file is parsed once and every stage sees that document. When it
    /// does not parse, stages get the path so the syntax stage can report
    /// the parser's diagnostic.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn feed_in(&self, path: impl AsRef<Path>) -> Result<ValidationResult> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let document = match LibXml2Wrapper::new().parse_document(path) {
            Ok(document) => Some(document),
            Err(LibXml2Error::NotWellFormed(cause)) => {
                debug!(%cause, "document did not parse");
                None
            }
            Err(other) => return Err(other.into()),
        };
        let input = match &document {
            Some(document) => XmlInput::Document(document),
            None => XmlInput::Path(path),
        };

        let mut last = ValidationResult::passed(path);
        for stage in &self.stages {
            let result = stage.run(input)?;
            debug!(stage = stage.name(), severity = %result.severity(), "stage finished");
            if !result.is_valid() {
                return Ok(result);
            }
            last = result;
        }
        Ok(last)
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}
