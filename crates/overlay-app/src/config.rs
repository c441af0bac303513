//! Application configuration
//!
//! Layers, later wins:
//! 1. built-in defaults
//! 2. TOML file (`--config`)
//! 3. `OVERLAY_*` environment variables
//!
//! The file layer is strict: a malformed file is a [`ConfigError`]. The
//! environment layer is applied field by field after the file is
//! deserialized. An invalid value is reported as an [`EnvIssue`] and the
//! previous value is kept.

use ::config::{Config, Environment, File, FileFormat};
use overlay_registry::{CapabilityKey, DEFAULT_CACHE_CAPACITY};
use overlay_services::{HttpConfig, LogLevel, LoggerConfig, ServicesConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Prefix of every recognized environment variable
pub const ENV_PREFIX: &str = "OVERLAY_";

/// Deployment mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Local development: verbose logging
    #[default]
    #[serde(alias = "dev")]
    Development,
    /// Automated tests
    Test,
    /// Production
    #[serde(alias = "prod")]
    Production,
}

impl Mode {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment mode
    pub mode: Mode,
    /// API base URL; empty selects the HTTP client default
    pub api_base_url: String,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Directory holding extension documents
    pub extensions_dir: PathBuf,
    /// Keys skipped during discovery
    pub disabled_extensions: Vec<CapabilityKey>,
    /// Fall back to the extensions linked into the binary
    pub builtin_extensions: bool,
    /// Number of keys the registry is pre-sized for; must be positive
    pub cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            api_base_url: String::new(),
            log_filter: "info".to_string(),
            log_json: false,
            extensions_dir: PathBuf::from("extensions"),
            disabled_extensions: Vec::new(),
            builtin_extensions: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Environment variable rejected during loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvIssue {
    /// Variable name
    pub var: String,
    /// Rejected value
    pub value: String,
    /// Why it was rejected
    pub reason: String,
}

impl Display for EnvIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}: {}", self.var, self.value, self.reason)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file missing, unreadable or not valid TOML
    #[error("failed to load config file {path}: {source}")]
    File {
        /// File path
        path: PathBuf,
        /// Loader error
        #[source]
        source: ::config::ConfigError,
    },

    /// Config file holds a value of the wrong shape
    #[error("invalid configuration: {0}")]
    Invalid(#[source] ::config::ConfigError),

    /// Environment could not be collected
    #[error("failed to read environment: {0}")]
    Environment(#[source] ::config::ConfigError),
}

impl AppConfig {
    /// Load from an optional file, then apply the process environment
    ///
    /// Returns the config and any rejected environment values.
    ///
    /// # Errors
    /// [`ConfigError`] if the file is given but missing or malformed
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<EnvIssue>), ConfigError> {
        Self::load_with_env(path, env_source())
    }

    /// [`load`](Self::load) with an explicit environment source
    ///
    /// # Errors
    /// [`ConfigError`] if the file is given but missing or malformed
    pub fn load_with_env(
        path: Option<&Path>,
        env: Environment,
    ) -> Result<(Self, Vec<EnvIssue>), ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let env = Config::builder()
            .add_source(env)
            .build()
            .map_err(ConfigError::Environment)?;
        let issues = config.apply_env(&env);
        Ok((config, issues))
    }

    /// Load defaults overlaid with a TOML file
    ///
    /// # Errors
    /// [`ConfigError`] if the file is missing or malformed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let layered = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()
            .map_err(|source| ConfigError::File {
                path: path.to_path_buf(),
                source,
            })?;
        layered.try_deserialize().map_err(ConfigError::Invalid)
    }

    /// Apply an environment layer field by field
    ///
    /// Keys are field names (`mode`, `api_base_url`, ...); absent keys keep
    /// the current value.
    pub fn apply_env(&mut self, env: &Config) -> Vec<EnvIssue> {
        let mut issues = Vec::new();

        if let Some(mode) = env_field(env, "mode", &mut issues, Ok::<Mode, String>) {
            self.mode = mode;
        }
        if let Some(url) = env_field(env, "api_base_url", &mut issues, |url: String| {
            validate_base_url(&url).map(|()| url.trim().to_string())
        }) {
            self.api_base_url = url;
        }
        if let Some(filter) = env_field(env, "log_filter", &mut issues, |f: String| {
            Ok(f.trim().to_string())
        }) {
            self.log_filter = filter;
        }
        if let Some(json) = env_field(env, "log_json", &mut issues, Ok::<bool, String>) {
            self.log_json = json;
        }
        if let Some(dir) = env_field(env, "extensions_dir", &mut issues, |d: String| {
            Ok(PathBuf::from(d.trim()))
        }) {
            self.extensions_dir = dir;
        }
        if let Some(keys) = env_field(env, "disabled_extensions", &mut issues, parse_key_list) {
            self.disabled_extensions = keys;
        }
        if let Some(builtin) = env_field(env, "builtin_extensions", &mut issues, Ok::<bool, String>) {
            self.builtin_extensions = builtin;
        }
        if let Some(capacity) = env_field(env, "cache_capacity", &mut issues, |n: usize| {
            if n == 0 {
                Err("expected a positive integer".to_string())
            } else {
                Ok(n)
            }
        }) {
            self.cache_capacity = capacity;
        }

        issues
    }

    /// Base service settings derived from this config
    #[must_use]
    pub fn services_config(&self) -> ServicesConfig {
        let level = match self.mode {
            Mode::Development => LogLevel::Debug,
            Mode::Test | Mode::Production => LogLevel::Info,
        };
        let mut logger = LoggerConfig {
            level,
            ..LoggerConfig::default()
        };
        logger.context.insert("mode".to_string(), json!(self.mode.as_str()));

        let mut http = HttpConfig::default();
        if !self.api_base_url.is_empty() {
            http = http.with_base_url(self.api_base_url.clone());
        }

        ServicesConfig {
            logger,
            http,
            ..ServicesConfig::default()
        }
    }
}

/// `OVERLAY_*` variables of the running process
#[must_use]
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX.trim_end_matches('_'))
}

/// Typed value of one environment field, validated by `check`
///
/// `None` when the variable is unset or rejected; rejections are recorded.
fn env_field<T, U, F>(env: &Config, field: &str, issues: &mut Vec<EnvIssue>, check: F) -> Option<U>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Result<U, String>,
{
    let raw = match env.get_string(field) {
        Ok(raw) => raw,
        Err(::config::ConfigError::NotFound(_)) => return None,
        Err(err) => {
            issues.push(EnvIssue::rejected(field, String::new(), err.to_string()));
            return None;
        }
    };
    let checked = env
        .get::<T>(field)
        .map_err(|err| err.to_string())
        .and_then(check);
    match checked {
        Ok(value) => Some(value),
        Err(reason) => {
            issues.push(EnvIssue::rejected(field, raw, reason));
            None
        }
    }
}

impl EnvIssue {
    fn rejected(field: &str, value: String, reason: String) -> Self {
        Self {
            var: format!("{ENV_PREFIX}{}", field.to_ascii_uppercase()),
            value,
            reason,
        }
    }
}

fn parse_key_list(raw: String) -> Result<Vec<CapabilityKey>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<CapabilityKey>().map_err(|e| e.to_string()))
        .collect()
}

/// Empty, or an absolute `http(s)` URL with a host
fn validate_base_url(value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| "expected an absolute http(s) URL or an empty value".to_string())?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err("URL has no host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let vars: ::config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        env_source().source(Some(vars))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn defaults() {
        let (config, issues) = AppConfig::load_with_env(None, env(&[])).unwrap();
        assert!(issues.is_empty());
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.extensions_dir, PathBuf::from("extensions"));
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = toml_file(
            "mode = \"production\"\napi_base_url = \"https://api.example.test\"\ndisabled_extensions = [\"core:logger\"]",
        );

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.api_base_url, "https://api.example.test");
        assert_eq!(config.disabled_extensions, vec!["core:logger".parse().unwrap()]);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = toml_file("mode = \"staging\"");
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let file = toml_file("mode = ");
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::File { .. })
        ));

        assert!(matches!(
            AppConfig::from_file(Path::new("/nonexistent/overlay.toml")),
            Err(ConfigError::File { .. })
        ));
    }

    #[test]
    fn env_overrides_file() {
        let file = toml_file("mode = \"production\"\nlog_filter = \"warn\"\ncache_capacity = 8");
        let (config, issues) = AppConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("OVERLAY_MODE", "test"),
                ("OVERLAY_LOG_FILTER", "debug,overlay_registry=trace"),
                ("OVERLAY_LOG_JSON", "true"),
                ("OVERLAY_DISABLED_EXTENSIONS", "core:logger, utils:formatDate"),
                ("OVERLAY_CACHE_CAPACITY", "16"),
                ("OVERLAY_BUILTIN_EXTENSIONS", "off"),
                ("PATH", "/usr/bin"),
            ]),
        )
        .unwrap();

        assert!(issues.is_empty());
        assert_eq!(config.mode, Mode::Test);
        assert_eq!(config.log_filter, "debug,overlay_registry=trace");
        assert!(config.log_json);
        assert_eq!(config.disabled_extensions.len(), 2);
        assert_eq!(config.cache_capacity, 16);
        assert!(!config.builtin_extensions);
    }

    #[test]
    fn invalid_env_values_are_reported_and_ignored() {
        let file = toml_file("mode = \"production\"\ncache_capacity = 8");
        let (config, issues) = AppConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("OVERLAY_MODE", "staging"),
                ("OVERLAY_API_BASE_URL", "not a url"),
                ("OVERLAY_DISABLED_EXTENSIONS", "core:logger,nope"),
                ("OVERLAY_CACHE_CAPACITY", "0"),
            ]),
        )
        .unwrap();

        let names: Vec<_> = issues.iter().map(|i| i.var.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "OVERLAY_MODE",
                "OVERLAY_API_BASE_URL",
                "OVERLAY_DISABLED_EXTENSIONS",
                "OVERLAY_CACHE_CAPACITY"
            ]
        );
        assert_eq!(issues[3].value, "0");
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.cache_capacity, 8);
        assert!(config.disabled_extensions.is_empty());
    }

    #[test]
    fn negative_capacity_is_rejected() {
        let (config, issues) =
            AppConfig::load_with_env(None, env(&[("OVERLAY_CACHE_CAPACITY", "-1")])).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn mode_aliases() {
        let (config, _) = AppConfig::load_with_env(None, env(&[("OVERLAY_MODE", "prod")])).unwrap();
        assert_eq!(config.mode, Mode::Production);
    }

    #[test]
    fn base_url_validation() {
        assert!(validate_base_url("").is_ok());
        assert!(validate_base_url("https://api.example.test/v1").is_ok());
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("/api").is_err());
        assert!(validate_base_url("https://").is_err());
    }

    #[test]
    fn services_config_follows_mode() {
        let config = AppConfig {
            mode: Mode::Production,
            api_base_url: "https://api.example.test".to_string(),
            ..AppConfig::default()
        };
        let services = config.services_config();
        assert_eq!(services.logger.level, LogLevel::Info);
        assert_eq!(services.logger.context.get("mode"), Some(&json!("production")));
        assert_eq!(services.http.base_url, "https://api.example.test");

        let dev = AppConfig::default().services_config();
        assert_eq!(dev.logger.level, LogLevel::Debug);
        assert_eq!(dev.http.base_url, "/api");
    }
}
