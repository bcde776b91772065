//! Configuration file handling.
//!
//! This module handles loading, discovering and validating the reporter
//! configuration. TOML is the default format; files ending in `.json`
//! are read as JSON with the same structure.

use crate::template::{self, TemplateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "fact-reporter.toml";

/// Locations searched relative to the executable's directory.
const EXE_RELATIVE_SEARCH_PATHS: &[&str] = &[
    CONFIG_FILE_NAME,
    "config/fact-reporter.toml",
    "config.json",
    "config/config.json",
];

/// Fatal configuration problems. Any of these stops the process before
/// the first cycle.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot find a configuration file, tried:\n{}", format_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("target URL '{0}' is not an acceptable URL (must start with http:// or https://)")]
    InvalidTarget(String),

    #[error("gatherer '{}' not found or not readable", .0.display())]
    GathererNotFound(PathBuf),

    #[error("invalid payload template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    #[error("interval must be at least 1 second")]
    InvalidInterval,
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Delivery settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Gatherer settings.
    #[serde(default)]
    pub gathering: GatheringConfig,

    /// Payload template.
    #[serde(default = "default_payload")]
    pub payload: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            delivery: DeliveryConfig::default(),
            gathering: GatheringConfig::default(),
            payload: default_payload(),
        }
    }
}

fn default_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seconds between the end of one cycle and the start of the next.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Print the outgoing payload before sending it.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            verbose: false,
        }
    }
}

fn default_interval() -> u64 {
    10
}

/// Payload delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Target URLs receiving the payload.
    #[serde(default)]
    pub targets: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

/// Gatherer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatheringConfig {
    /// Gatherer executables, in declaration order.
    #[serde(default)]
    pub gatherers: Vec<PathBuf>,

    /// Environment variables applied to every gatherer.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Per-gatherer timeout in seconds; 0 waits indefinitely.
    #[serde(default)]
    pub timeout_seconds: u64,
}

impl GatheringConfig {
    /// Bounded wait per gatherer, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl Config {
    /// Load, resolve and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content, path)?;

        let base_dir = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| path.parent().map(Path::to_path_buf).unwrap_or_default());
        config.resolve_gatherer_paths(&base_dir);

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text; the format is chosen by `path`'s extension.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            toml::from_str(content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Find a configuration file in the default locations.
    ///
    /// The current directory is tried first, then paths relative to the
    /// directory holding the executable.
    pub fn discover(exe_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = exe_dir {
            candidates.extend(EXE_RELATIVE_SEARCH_PATHS.iter().map(|p| dir.join(p)));
        }

        for candidate in &candidates {
            if is_readable_file(candidate) {
                return Ok(candidate.clone());
            }
        }

        Err(ConfigError::NotFound { tried: candidates })
    }

    /// Make relative gatherer paths absolute, based on `base_dir`.
    pub fn resolve_gatherer_paths(&mut self, base_dir: &Path) {
        for gatherer in &mut self.gathering.gatherers {
            if gatherer.is_relative() {
                *gatherer = base_dir.join(&*gatherer);
            }
        }
    }

    /// Validate targets, gatherers, interval and the payload template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for target in &self.delivery.targets {
            if !target.starts_with("https://") && !target.starts_with("http://") {
                return Err(ConfigError::InvalidTarget(target.clone()));
            }
        }

        for gatherer in &self.gathering.gatherers {
            if !is_readable_file(gatherer) {
                return Err(ConfigError::GathererNotFound(gatherer.clone()));
            }
        }

        if self.general.interval_seconds == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        template::validate(&self.payload)?;
        Ok(())
    }

    /// Apply command-line overrides. CLI values take precedence.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(interval) = args.interval {
            self.general.interval_seconds = interval;
        }

        if let Some(timeout) = args.timeout {
            self.delivery.timeout_seconds = timeout;
        }

        // Flags always override
        if args.verbose || args.try_once {
            self.general.verbose = true;
        }
    }

    /// Cycle interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.general.interval_seconds)
    }

    /// Per-request delivery timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery.timeout_seconds)
    }

    /// Content of a commented starter configuration file.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG_TOML
    }
}

/// Whether `path` is an existing regular file that can be opened.
fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

const DEFAULT_CONFIG_TOML: &str = r#"# fact-reporter configuration

[general]
# Seconds between the end of one cycle and the start of the next.
interval_seconds = 10
# Print the outgoing payload before sending it.
verbose = false

[delivery]
# Every target receives the payload as a JSON POST.
targets = ["http://localhost:8080/report"]
# Per-request timeout in seconds.
timeout_seconds = 10

[gathering]
# Executables printing `key = value` lines. Relative paths are resolved
# against the directory of this file.
gatherers = []
# Per-gatherer timeout in seconds, 0 waits indefinitely.
timeout_seconds = 0

[gathering.env]
# Variables visible to every gatherer.
REPORTER = "fact-reporter"

# The payload template. Strings may embed ${expression} markers that are
# evaluated against the gathered facts, e.g. "${mem.used / mem.total * 100}".
[payload]
host = "${HOST}"
message = "Reporting from ${HOST}"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.interval_seconds, 10);
        assert_eq!(config.delivery.timeout_seconds, 10);
        assert!(config.delivery.targets.is_empty());
        assert_eq!(config.gathering.timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
[general]
interval_seconds = 30

[delivery]
targets = ["https://example.com/post", "http://localhost/report"]

[gathering]
gatherers = ["gatherers/machine.sh", "/opt/gatherers/disk.sh"]
timeout_seconds = 5

[gathering.env]
SOME_ENV_VAR = "visible in gatherers"

[payload]
msg = "Reporting from ${HOST}"
count = 3

[[payload.disks]]
name = "root"
"#;

        let config = Config::parse(toml_content, Path::new("fact-reporter.toml")).unwrap();
        assert_eq!(config.general.interval_seconds, 30);
        assert!(!config.general.verbose);
        assert_eq!(config.delivery.targets.len(), 2);
        assert_eq!(config.gathering.gatherers.len(), 2);
        assert_eq!(config.gathering.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(
            config.gathering.env["SOME_ENV_VAR"],
            "visible in gatherers"
        );
        assert_eq!(config.payload["msg"], "Reporting from ${HOST}");
        assert_eq!(config.payload["count"], 3);
        assert_eq!(config.payload["disks"][0]["name"], "root");
    }

    #[test]
    fn test_parse_json_config() {
        let json_content = r#"{
            "delivery": {"targets": ["https://example.com/post"]},
            "gathering": {"gatherers": ["a.sh"], "env": {"X": "1"}},
            "payload": {"load": "${load_1 * 100}"}
        }"#;

        let config = Config::parse(json_content, Path::new("config.json")).unwrap();
        assert_eq!(config.delivery.targets, vec!["https://example.com/post"]);
        assert_eq!(config.gathering.env["X"], "1");
        assert_eq!(config.payload["load"], "${load_1 * 100}");
    }

    #[test]
    fn test_parse_error() {
        let err = Config::parse("[general\n", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_target() {
        let mut config = Config::default();
        config.delivery.targets = vec!["ftp://example.com".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTarget(t)) if t == "ftp://example.com"
        ));
    }

    #[test]
    fn test_validation_rejects_missing_gatherer() {
        let mut config = Config::default();
        config.gathering.gatherers = vec![PathBuf::from("/nonexistent/gatherer.sh")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GathererNotFound(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_template() {
        let mut config = Config::default();
        config.payload = serde_json::json!({"items": ["not a mapping"]});
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTemplate(
                TemplateError::NonMappingListItem { .. }
            ))
        ));
    }

    #[test]
    fn test_load_resolves_relative_gatherers() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("gatherers")).unwrap();
        std::fs::write(dir.path().join("gatherers/machine.sh"), "echo a=1\n").unwrap();

        let config_path = dir.path().join("fact-reporter.toml");
        std::fs::write(
            &config_path,
            "[gathering]\ngatherers = [\"gatherers/machine.sh\"]\n",
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        let gatherer = &config.gathering.gatherers[0];
        assert!(gatherer.is_absolute());
        assert!(gatherer.ends_with("gatherers/machine.sh"));
    }

    #[test]
    fn test_discover_reports_tried_paths() {
        let dir = TempDir::new().unwrap();
        let exe_dir = dir.path().join("no-such-dir");

        match Config::discover(Some(&exe_dir)) {
            Ok(path) => {
                // A config in the working directory wins; nothing else to check.
                assert_eq!(path, PathBuf::from(CONFIG_FILE_NAME));
            }
            Err(ConfigError::NotFound { tried }) => {
                assert_eq!(tried.len(), 1 + EXE_RELATIVE_SEARCH_PATHS.len());
                assert!(tried.contains(&exe_dir.join("config.json")));
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_discover_finds_exe_relative_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/config.json"), "{}").unwrap();

        let found = Config::discover(Some(dir.path())).unwrap();
        if found != PathBuf::from(CONFIG_FILE_NAME) {
            assert_eq!(found, dir.path().join("config/config.json"));
        }
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::parse_from(["fact-reporter", "--interval", "60", "--timeout", "3", "-t"]);
        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert!(config.general.verbose);
    }

    #[test]
    fn test_default_toml_is_valid() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[delivery]"));
        assert!(toml_str.contains("[payload]"));

        let config = Config::parse(toml_str, Path::new(CONFIG_FILE_NAME)).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.payload["message"], "Reporting from ${HOST}");
    }
}
