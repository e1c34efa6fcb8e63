//! Severity model: how far a document got through the pipeline.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Ordered severity of a validation outcome.
///
/// Ordering follows [`Passing::rank`]: a higher rank means the document
/// passed more stages. `Passing::Passing` is the only fully valid value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Passing {
    Fails,
    Encoding,
    Syntax,
    Schema,
    Rules,
    Passing,
}

impl Passing {
    /// Every severity, lowest rank first.
    pub const ALL: [Passing; 6] = [
        Passing::Fails,
        Passing::Encoding,
        Passing::Syntax,
        Passing::Schema,
        Passing::Rules,
        Passing::Passing,
    ];

    pub const fn rank(self) -> u8 {
        match self {
            Passing::Fails => 10,
            Passing::Encoding => 15,
            Passing::Syntax => 20,
            Passing::Schema => 30,
            Passing::Rules => 40,
            Passing::Passing => 50,
        }
    }

    /// Severity implied by a terminal validation error, or `Passing` for none.
    pub fn from_error(error: Option<&ValidationError>) -> Self {
        match error {
            None => Passing::Passing,
            Some(ValidationError::Rules(_)) => Passing::Rules,
            Some(ValidationError::Schema(_)) => Passing::Schema,
            Some(ValidationError::Syntax(_)) => Passing::Syntax,
            Some(ValidationError::Encoding(_)) => Passing::Encoding,
            Some(ValidationError::Failed { .. }) => Passing::Fails,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Passing::Fails => "FAILS",
            Passing::Encoding => "ENCODING",
            Passing::Syntax => "SYNTAX",
            Passing::Schema => "SCHEMA",
            Passing::Rules => "RULES",
            Passing::Passing => "PASSING",
        }
    }
}

impl PartialOrd for Passing {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Passing {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Passing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
