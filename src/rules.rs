//! Document-specific rules checked after schema validation.

use std::fmt;
use std::sync::Arc;

use crate::error::RuleViolation;
use crate::libxml2::XmlDocument;

/// A semantic check that a schema cannot express.
#[cfg_attr(test, mockall::automock)]
pub trait Rule: Send + Sync {
    fn name(&self) -> String;

    fn check(&self, document: &XmlDocument) -> Result<(), RuleViolation>;
}

/// Ordered collection of rules; the first violation wins.
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.push(rule);
        self
    }

    pub fn push(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Arc::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn check(&self, document: &XmlDocument) -> Result<(), RuleViolation> {
        for rule in &self.rules {
            tracing::trace!(rule = %rule.name(), source = %document.source().display(), "checking rule");
            rule.check(document)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.name()))
            .finish()
    }
}

/// Requires the document's root element to have a given name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootElementRule {
    expected: String,
}

impl RootElementRule {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Rule for RootElementRule {
    fn name(&self) -> String {
        "root-element".to_string()
    }

    fn check(&self, document: &XmlDocument) -> Result<(), RuleViolation> {
        let found = document
            .root_element()
            .map(|root| root.name())
            .unwrap_or_default();

        if found == self.expected {
            Ok(())
        } else {
            Err(RuleViolation {
                rule: self.name(),
                message: format!("expected root element <{}>, found <{}>", self.expected, found),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parsed(content: &str) -> (NamedTempFile, XmlDocument) {
        let mut file = NamedTempFile::with_suffix(".xml").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        let document = XmlDocument::parse_file(file.path()).unwrap();
        (file, document)
    }

    #[test]
    fn test_empty_rule_set_passes() {
        let (_file, document) = parsed("<?xml version=\"1.0\"?>\n<anything/>");
        let rules = RuleSet::new();
        assert!(rules.is_empty());
        assert!(rules.check(&document).is_ok());
    }

    #[test]
    fn test_root_element_rule() {
        let (_file, document) = parsed("<?xml version=\"1.0\"?>\n<inventory/>");

        assert!(RootElementRule::new("inventory").check(&document).is_ok());

        let violation = RootElementRule::new("catalog").check(&document).unwrap_err();
        assert_eq!(violation.rule, "root-element");
        assert!(violation.message.contains("<catalog>"));
        assert!(violation.message.contains("<inventory>"));
    }

    #[test]
    fn test_first_violation_stops_the_set() {
        let (_file, document) = parsed("<?xml version=\"1.0\"?>\n<catalog/>");

        let mut failing = MockRule::new();
        failing.expect_name().return_const("always-fails".to_string());
        failing.expect_check().times(1).returning(|_| {
            Err(RuleViolation {
                rule: "always-fails".to_string(),
                message: "nope".to_string(),
            })
        });

        let mut never_reached = MockRule::new();
        never_reached.expect_name().return_const("unreached".to_string());
        never_reached.expect_check().times(0);

        let rules = RuleSet::new().with_rule(failing).with_rule(never_reached);
        assert_eq!(rules.len(), 2);

        let violation = rules.check(&document).unwrap_err();
        assert_eq!(violation.rule, "always-fails");
    }
}
