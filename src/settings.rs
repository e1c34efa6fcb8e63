//! Process-wide settings.
//!
//! Settings are built once from a config file and a [`Mode`], then shared
//! read-only. The first [`init`] wins: later calls get the existing
//! instance back, whatever arguments they pass. [`reset`] exists so tests
//! can start over.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, ConfigManager, Mode};
use crate::error::LibXml2Error;
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};
use crate::rules::{RootElementRule, RuleSet};

static SETTINGS: RwLock<Option<Arc<Settings>>> = RwLock::new(None);

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Schema file not found: {path}")]
    SchemaNotFound { path: PathBuf },

    #[error("Schema setup failed for {path}")]
    SchemaSetupFailed {
        path: PathBuf,
        #[source]
        source: LibXml2Error,
    },

    #[error("Log directory does not exist: {path}")]
    LogDirectoryNotFound { path: PathBuf },

    #[error("Settings have not been initialized")]
    Uninitialized,

    #[error("Settings lock poisoned")]
    LockPoisoned,
}

/// Resolved, mode-specific settings
#[derive(Debug)]
pub struct Settings {
    mode: Mode,
    config_path: PathBuf,
    schema_path: PathBuf,
    schema: XmlSchemaPtr,
    log_filename: PathBuf,
    rules: RuleSet,
}

impl Settings {
    /// Builds settings without touching the process-wide instance.
    ///
    /// Relative paths in the config resolve against the config file's
    /// directory and `~` expands to the home directory.
    pub fn load(config_path: impl AsRef<Path>, mode: Mode) -> Result<Self, SettingsError> {
        let config_path = config_path.as_ref();
        let config = ConfigManager::load_from_file(config_path)?;
        let config_path = std::fs::canonicalize(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        let base_dir = config_path.parent().unwrap_or(Path::new("/"));
        let section = config.section(mode);

        let schema_path = ConfigManager::resolve_path(&section.schema, base_dir);
        if !schema_path.is_file() {
            return Err(SettingsError::SchemaNotFound { path: schema_path });
        }
        let schema = LibXml2Wrapper::new()
            .parse_schema_file(&schema_path)
            .map_err(|source| SettingsError::SchemaSetupFailed {
                path: schema_path.clone(),
                source,
            })?;

        let log_filename = ConfigManager::resolve_path(&section.log_filename, base_dir);
        match log_filename.parent() {
            Some(dir) if dir.is_dir() => {}
            parent => {
                return Err(SettingsError::LogDirectoryNotFound {
                    path: parent.map(Path::to_path_buf).unwrap_or_default(),
                });
            }
        }

        let mut rules = RuleSet::new();
        if let Some(root) = &section.root_element {
            rules.push(RootElementRule::new(root.clone()));
        }

        Ok(Settings {
            mode,
            config_path,
            schema_path,
            schema,
            log_filename,
            rules,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn schema(&self) -> &XmlSchemaPtr {
        &self.schema
    }

    /// Absolute path of the failure log
    pub fn log_filename(&self) -> &Path {
        &self.log_filename
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

/// Builds the process-wide settings, or returns the ones already built.
pub fn init(config_path: impl AsRef<Path>, mode: Mode) -> Result<Arc<Settings>, SettingsError> {
    let config_path = config_path.as_ref();

    if let Some(existing) = SETTINGS
        .read()
        .map_err(|_| SettingsError::LockPoisoned)?
        .as_ref()
    {
        warn_if_different(existing, config_path, mode);
        return Ok(Arc::clone(existing));
    }

    let mut slot = SETTINGS.write().map_err(|_| SettingsError::LockPoisoned)?;
    if let Some(existing) = slot.as_ref() {
        warn_if_different(existing, config_path, mode);
        return Ok(Arc::clone(existing));
    }

    let settings = Arc::new(Settings::load(config_path, mode)?);
    info!(
        mode = %settings.mode(),
        config = %settings.config_path().display(),
        schema = %settings.schema_path().display(),
        "settings initialized"
    );
    *slot = Some(Arc::clone(&settings));
    Ok(settings)
}

/// The process-wide settings, if [`init`] has run.
pub fn get() -> Result<Arc<Settings>, SettingsError> {
    SETTINGS
        .read()
        .map_err(|_| SettingsError::LockPoisoned)?
        .as_ref()
        .map(Arc::clone)
        .ok_or(SettingsError::Uninitialized)
}

/// Drops the process-wide settings so the next [`init`] builds afresh.
#[doc(hidden)]
pub fn reset() {
    match SETTINGS.write() {
        Ok(mut slot) => *slot = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
}

fn warn_if_different(existing: &Settings, config_path: &Path, mode: Mode) {
    let same_config = std::fs::canonicalize(config_path)
        .map(|path| path == existing.config_path())
        .unwrap_or(false);
    if existing.mode() != mode || !same_config {
        warn!(
            existing_mode = %existing.mode(),
            requested_mode = %mode,
            requested_config = %config_path.display(),
            "settings already initialized; keeping existing instance"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="catalog" type="xs:string"/>
</xs:schema>"#;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        fs::write(dir.join("catalog.xsd"), SCHEMA).unwrap();
        let path = dir.join("xml-verdict.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            dir.path(),
            r#"
[live]
schema = "missing.xsd"
log_filename = "live.log"

[test]
schema = "catalog.xsd"
log_filename = "test.log"
root_element = "catalog"
"#,
        );

        let settings = Settings::load(&config, Mode::Test).unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();

        assert_eq!(settings.mode(), Mode::Test);
        assert_eq!(settings.schema_path(), base.join("catalog.xsd"));
        assert_eq!(settings.log_filename(), base.join("test.log"));
        assert!(settings.log_filename().is_absolute());
        assert!(settings.schema().is_valid());
        assert_eq!(settings.rules().len(), 1);
    }

    #[test]
    fn test_load_missing_schema() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            dir.path(),
            r#"
[live]
schema = "missing.xsd"
log_filename = "live.log"

[test]
schema = "catalog.xsd"
log_filename = "test.log"
"#,
        );

        match Settings::load(&config, Mode::Live) {
            Err(SettingsError::SchemaNotFound { path }) => assert!(path.ends_with("missing.xsd")),
            other => panic!("Expected SchemaNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_uncompilable_schema() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            dir.path(),
            r#"
[live]
schema = "broken.xsd"
log_filename = "live.log"

[test]
schema = "catalog.xsd"
log_filename = "test.log"
"#,
        );
        fs::write(dir.path().join("broken.xsd"), "<not-a-schema/>").unwrap();

        assert!(matches!(
            Settings::load(&config, Mode::Live),
            Err(SettingsError::SchemaSetupFailed { .. })
        ));
    }

    #[test]
    fn test_load_missing_log_directory() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            dir.path(),
            r#"
[live]
schema = "catalog.xsd"
log_filename = "no/such/dir/live.log"

[test]
schema = "catalog.xsd"
log_filename = "test.log"
"#,
        );

        match Settings::load(&config, Mode::Live) {
            Err(SettingsError::LogDirectoryNotFound { path }) => {
                assert!(path.ends_with("no/such/dir"));
            }
            other => panic!("Expected LogDirectoryNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_config() {
        assert!(matches!(
            Settings::load("/no/such/xml-verdict.toml", Mode::Live),
            Err(SettingsError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
