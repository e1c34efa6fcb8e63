//! Byte-level encoding detection and XML declaration scanning.
//!
//! Detection runs a statistical detector over the raw bytes; the declared
//! encoding is pulled out of the first line with a regex rather than a
//! parser, so that broken declarations can still be classified.

use std::path::Path;
use std::sync::OnceLock;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{EncodingError, Result};

/// Encoding an XML document is in when its declaration names none.
pub const XML_DEFAULT_ENCODING: &str = "utf-8";

static ENCODING_VALUE_REGEX: OnceLock<Regex> = OnceLock::new();
static ENCODING_EMPTY_REGEX: OnceLock<Regex> = OnceLock::new();
static ENCODING_OPEN_QUOTE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_encoding_value_regex() -> &'static Regex {
    ENCODING_VALUE_REGEX.get_or_init(|| {
        Regex::new(r#"encoding\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Failed to compile encoding value regex")
    })
}

fn get_encoding_empty_regex() -> &'static Regex {
    ENCODING_EMPTY_REGEX.get_or_init(|| {
        Regex::new(r#"encoding\s*=\s*(?:""|'')"#).expect("Failed to compile empty encoding regex")
    })
}

fn get_encoding_open_quote_regex() -> &'static Regex {
    ENCODING_OPEN_QUOTE_REGEX.get_or_init(|| {
        Regex::new(r#"encoding\s*=\s*["']"#).expect("Failed to compile encoding quote regex")
    })
}

/// Narrow seam over the statistical detector: bytes in, encoding label out.
pub trait CharsetDetector {
    fn detect(&self, raw: &[u8]) -> String;
}

/// Default detector: byte-order mark, then pure ASCII, then `chardetng`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetngDetector;

impl CharsetDetector for ChardetngDetector {
    fn detect(&self, raw: &[u8]) -> String {
        if let Some((encoding, _bom_len)) = Encoding::for_bom(raw) {
            if encoding == UTF_16LE || encoding == UTF_16BE {
                return "utf-16".to_string();
            }
            return encoding.name().to_string();
        }

        if raw.is_ascii() {
            return "ascii".to_string();
        }

        let mut detector = EncodingDetector::new();
        detector.feed(raw, true);
        detector.guess(None, true).name().to_string()
    }
}

/// What was found when probing a file's encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProbe {
    /// Lower-cased label from the detector.
    pub detected: String,
    /// Lower-cased `encoding` attribute, or empty when it is missing or unusable.
    pub declared: String,
    /// First line of the file, decoded with the detected encoding.
    pub first_line: String,
}

impl EncodingProbe {
    /// Declared encoding with the XML default applied when none is named.
    pub fn effective_declared(&self) -> &str {
        if self.declared.is_empty() {
            XML_DEFAULT_ENCODING
        } else {
            &self.declared
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.detected == self.effective_declared()
    }
}

/// Stateless encoding operations
pub struct EncodingOperations;

impl EncodingOperations {
    /// Detects the encoding of a single line or a whole file.
    ///
    /// Pure ASCII input is reported as `utf-8` whenever the bytes decode as
    /// UTF-8, which for ASCII is always.
    pub fn detect_file_encoding(raw: &[u8]) -> String {
        Self::detect_file_encoding_with(&ChardetngDetector, raw)
    }

    pub fn detect_file_encoding_with(detector: &dyn CharsetDetector, raw: &[u8]) -> String {
        let detected = detector.detect(raw).to_lowercase();
        if detected == "ascii" && std::str::from_utf8(raw).is_ok() {
            return "utf-8".to_string();
        }
        detected
    }

    /// Extracts the `encoding` value from an XML declaration line.
    ///
    /// With `strict` false, a missing, empty or badly quoted attribute yields
    /// an empty string. A line without a declaration, or with an attribute
    /// that cannot be read at all, is an error either way.
    pub fn grep_declaration_encoding(
        text: &str,
        strict: bool,
    ) -> std::result::Result<String, EncodingError> {
        let Some(start) = text.find("<?") else {
            return Err(EncodingError::DeclarationAbsent {
                text: text.to_string(),
            });
        };
        let declaration = match text[start..].find("?>") {
            Some(end) => &text[start..start + end + 2],
            None => &text[start..],
        };

        let values: Vec<&str> = get_encoding_value_regex()
            .captures_iter(declaration)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .filter(|value| !value.is_empty())
            .collect();

        if let [value] = values.as_slice() {
            return Ok(value.to_lowercase());
        }

        let error = if !declaration.contains("encoding") {
            EncodingError::DeclarationHasNoEncoding {
                text: text.to_string(),
            }
        } else if get_encoding_empty_regex().is_match(declaration) {
            EncodingError::DeclarationEncodingEmptyString {
                text: text.to_string(),
            }
        } else if get_encoding_open_quote_regex().is_match(declaration) {
            EncodingError::DeclarationEncodingBadQuoteSyntax {
                text: text.to_string(),
            }
        } else {
            EncodingError::DeclarationUnreadable {
                text: text.to_string(),
            }
        };

        if !strict && error.is_recoverable() {
            trace!(%error, "declaration encoding unusable, treating as empty");
            return Ok(String::new());
        }
        Err(error)
    }

    /// Reads `path` once and reports its detected and declared encodings.
    pub fn get_detected_and_declared_encoding(path: &Path) -> Result<EncodingProbe> {
        let raw = std::fs::read(path)?;
        Ok(Self::probe_bytes(&raw)?)
    }

    /// Detected and declared encodings of an in-memory document.
    pub fn probe_bytes(raw: &[u8]) -> std::result::Result<EncodingProbe, EncodingError> {
        let (detected, first_line) = detect_with_first_line(raw);
        let declared = Self::grep_declaration_encoding(&first_line, false)?;

        Ok(EncodingProbe {
            detected,
            declared,
            first_line,
        })
    }

    /// Fails with [`EncodingError::Mismatch`] when the declaration disagrees
    /// with the bytes.
    ///
    /// A document without an XML declaration is held to the XML default,
    /// the same as a declaration without an `encoding` attribute. Labels
    /// are compared as lower-cased strings. No aliases are resolved, so
    /// `iso-8859-1` and `windows-1252` are different encodings here.
    pub fn ensure_consistent_encoding(path: &Path) -> Result<EncodingProbe> {
        let raw = std::fs::read(path)?;
        let (detected, first_line) = detect_with_first_line(&raw);
        let declared = match Self::grep_declaration_encoding(&first_line, false) {
            Ok(declared) => declared,
            Err(EncodingError::DeclarationAbsent { .. }) => String::new(),
            Err(e) => return Err(e.into()),
        };
        let probe = EncodingProbe {
            detected,
            declared,
            first_line,
        };

        if !probe.is_consistent() {
            debug!(
                path = %path.display(),
                detected = %probe.detected,
                declared = %probe.declared,
                "encoding mismatch"
            );
            let declared = probe.effective_declared().to_string();
            return Err(EncodingError::Mismatch {
                detected: probe.detected,
                declared,
            }
            .into());
        }
        Ok(probe)
    }
}

fn detect_with_first_line(raw: &[u8]) -> (String, String) {
    let detected = EncodingOperations::detect_file_encoding(raw);
    let first_line = decode_first_line(raw, &detected);
    (detected, first_line)
}

fn decode_first_line(raw: &[u8], detected: &str) -> String {
    let encoding = Encoding::for_label(detected.as_bytes()).unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(raw);
    if had_errors {
        trace!(encoding = encoding.name(), "lossy decode while locating declaration");
    }
    text.lines().next().unwrap_or_default().to_string()
}
