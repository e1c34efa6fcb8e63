#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;

static SETTINGS_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that reset the process-wide settings.
pub fn settings_guard() -> MutexGuard<'static, ()> {
    SETTINGS_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn config(&self) -> PathBuf {
        self.fixtures_dir.join("config.toml")
    }

    pub fn schema(&self) -> PathBuf {
        self.fixtures_dir.join("schemas").join("catalog.xsd")
    }

    pub fn xml(&self, name: &str) -> PathBuf {
        self.fixtures_dir.join("xml").join(name)
    }

    pub fn valid(&self) -> PathBuf {
        self.xml("valid.xml")
    }

    pub fn schema_invalid(&self) -> PathBuf {
        self.xml("schema-invalid.xml")
    }

    pub fn malformed(&self) -> PathBuf {
        self.xml("malformed.xml")
    }

    pub fn mislabelled(&self) -> PathBuf {
        self.xml("mislabelled.xml")
    }
}

/// Writes a config whose test section uses the fixture schema and logs
/// into `dir`.
pub fn temp_config(dir: &Path, root_element: Option<&str>) -> PathBuf {
    let schema = TestFixtures::new().schema();
    let root = root_element
        .map(|root| format!("root_element = \"{root}\"\n"))
        .unwrap_or_default();
    let body = format!(
        "[live]\nschema = \"{schema}\"\nlog_filename = \"live.log\"\n\n\
         [test]\nschema = \"{schema}\"\nlog_filename = \"test.log\"\n{root}",
        schema = schema.display(),
    );
    let path = dir.join("xml-verdict.toml");
    std::fs::write(&path, body).unwrap();
    path
}

pub fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}
