use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "XML_VERDICT_CONFIG";
/// Environment variable selecting the mode (`live` or `test`)
pub const MODE_ENV_VAR: &str = "XML_VERDICT_MODE";

const CONFIG_FILE_NAMES: [&str; 4] = [
    "xml-verdict.toml",
    "xml-verdict.json",
    ".xml-verdict.toml",
    ".xml-verdict.json",
];

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("No configuration file found; pass --config or set XML_VERDICT_CONFIG")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which section of the config file is in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Live,
    Test,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Live => f.write_str("LIVE"),
            Mode::Test => f.write_str("TEST"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "test" => Ok(Mode::Test),
            other => Err(ConfigError::Environment(format!(
                "Invalid {MODE_ENV_VAR} value: {other} (expected live or test)"
            ))),
        }
    }
}

/// Config file contents: one section per mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub live: ModeConfig,
    pub test: ModeConfig,
}

impl Config {
    pub fn section(&self, mode: Mode) -> &ModeConfig {
        match mode {
            Mode::Live => &self.live,
            Mode::Test => &self.test,
        }
    }
}

/// Settings for one mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModeConfig {
    /// XSD file used by the schema stage
    pub schema: PathBuf,
    /// File failure records are appended to
    pub log_filename: PathBuf,
    /// Required root element name, checked by the rules stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_element: Option<String>,
}

/// Configuration manager for locating and loading config files
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some(ext) => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(_) => serde_json::from_str(&content)?,
            },
        };

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Locate the config file using the system environment
    pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
        Self::find_config_file_with(&SystemEnvProvider, explicit)
    }

    /// Locate the config file: explicit path, then environment, then the
    /// working directory, then the user config directory
    pub fn find_config_file_with(
        env: &impl EnvProvider,
        explicit: Option<&Path>,
    ) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if let Some(path) = env.get(CONFIG_ENV_VAR) {
            if path.trim().is_empty() {
                return Err(ConfigError::Environment(format!(
                    "{CONFIG_ENV_VAR} is set but empty"
                )));
            }
            return Ok(PathBuf::from(path));
        }

        for name in &CONFIG_FILE_NAMES {
            let path = PathBuf::from(name);
            if path.is_file() {
                return Ok(path);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xml-verdict");
            for name in &CONFIG_FILE_NAMES {
                let path = app_config_dir.join(name);
                if path.is_file() {
                    return Ok(path);
                }
            }
        }

        Err(ConfigError::NotFound)
    }

    /// Resolve the mode: the `--test` flag wins, then the environment
    pub fn resolve_mode_with(env: &impl EnvProvider, test_flag: bool) -> Result<Mode> {
        if test_flag {
            return Ok(Mode::Test);
        }
        match env.get(MODE_ENV_VAR) {
            Some(value) => value.parse(),
            None => Ok(Mode::default()),
        }
    }

    pub fn validate_config(config: &Config) -> Result<()> {
        for (mode, section) in [(Mode::Live, &config.live), (Mode::Test, &config.test)] {
            if section.schema.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "[{mode}] schema must not be empty"
                )));
            }
            if section.log_filename.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "[{mode}] log_filename must not be empty"
                )));
            }
            if section
                .root_element
                .as_deref()
                .is_some_and(|root| root.trim().is_empty())
            {
                return Err(ConfigError::Validation(format!(
                    "[{mode}] root_element must not be empty when set"
                )));
            }
        }
        Ok(())
    }

    /// Expand a leading `~` and anchor relative paths at `base_dir`
    pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
        let expanded = match path.strip_prefix("~") {
            Ok(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => path.to_path_buf(),
            },
            Err(_) => path.to_path_buf(),
        };

        if expanded.is_absolute() {
            expanded
        } else {
            base_dir.join(expanded)
        }
    }
}
