//! Configuration module for FeedSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for FeedSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dropbox: DropboxConfig,
    pub miniflux: MinifluxConfig,
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

/// How the PKCE code challenge is derived from the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PkceMethod {
    /// The challenge is the verifier itself.
    #[default]
    Plain,
    /// The challenge is the base64url SHA-256 digest of the verifier.
    S256,
}

/// Dropbox OAuth and API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropboxConfig {
    /// Dropbox app key. `None` until the user configures one.
    pub client_id: Option<String>,
    /// Redirect URI registered for the app.
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    /// Base URL for RPC endpoints (`/2/files/list_folder`, ...).
    pub api_url: String,
    /// Base URL for content endpoints (`/2/files/upload`, `/2/files/download`).
    pub content_url: String,
    pub pkce_method: PkceMethod,
}

/// Miniflux aggregator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinifluxConfig {
    /// Maximum number of entries requested per feed refresh.
    pub request_limit: u32,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between periodic background pushes.
    pub interval_minutes: u64,
    /// Number of feeds refreshed concurrently.
    pub refresh_chunk_size: usize,
    /// Path of the snapshot file on the file-store backend.
    pub snapshot_path: String,
    /// Timestamps further than this many hours in the future are clamped
    /// to the merge time before last-write-wins comparison.
    pub clock_skew_tolerance_hours: i64,
    /// Read, non-bookmarked posts older than this many days are deleted by
    /// the read-post cleanup. `0` keeps them forever.
    pub read_post_retention_days: u32,
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database.
    pub database: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Failure report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether unexpected sync failures are written to `reports_dir`.
    pub enabled: bool,
    pub reports_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/feedsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("feedsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("feedsync")
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: "http://127.0.0.1:8400/oauth".to_string(),
            auth_url: "https://www.dropbox.com/oauth2/authorize".to_string(),
            token_url: "https://api.dropboxapi.com/oauth2/token".to_string(),
            api_url: "https://api.dropboxapi.com".to_string(),
            content_url: "https://content.dropboxapi.com".to_string(),
            pkce_method: PkceMethod::Plain,
        }
    }
}

impl Default for MinifluxConfig {
    fn default() -> Self {
        Self { request_limit: 100 }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            refresh_chunk_size: 6,
            snapshot_path: "/feedsync_sync_data.json".to_string(),
            clock_skew_tolerance_hours: 24,
            read_post_retention_days: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("feedsync.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reports_dir: data_dir().join("reports"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_minutes"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- dropbox ---
        if let Some(client_id) = &self.dropbox.client_id {
            if client_id.trim().is_empty() {
                errors.push(ValidationError {
                    field: "dropbox.client_id".into(),
                    message: "must not be blank".into(),
                });
            }
        }
        if !self.dropbox.redirect_uri.contains("://") {
            errors.push(ValidationError {
                field: "dropbox.redirect_uri".into(),
                message: format!("not a URI: {}", self.dropbox.redirect_uri),
            });
        }
        for (field, value) in [
            ("dropbox.auth_url", &self.dropbox.auth_url),
            ("dropbox.token_url", &self.dropbox.token_url),
            ("dropbox.api_url", &self.dropbox.api_url),
            ("dropbox.content_url", &self.dropbox.content_url),
        ] {
            if !is_http_url(value) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be an http(s) URL: {}", value),
                });
            }
        }

        // --- miniflux ---
        if self.miniflux.request_limit == 0 {
            errors.push(ValidationError {
                field: "miniflux.request_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.interval_minutes == 0 {
            errors.push(ValidationError {
                field: "sync.interval_minutes".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.refresh_chunk_size == 0 || self.sync.refresh_chunk_size > 32 {
            errors.push(ValidationError {
                field: "sync.refresh_chunk_size".into(),
                message: "must be in range 1..=32".into(),
            });
        }
        if !self.sync.snapshot_path.starts_with('/') {
            errors.push(ValidationError {
                field: "sync.snapshot_path".into(),
                message: "must be an absolute path starting with '/'".into(),
            });
        }
        if self.sync.clock_skew_tolerance_hours < 0 {
            errors.push(ValidationError {
                field: "sync.clock_skew_tolerance_hours".into(),
                message: "must not be negative".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use feedsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .dropbox_client_id("my-app-key")
///     .sync_interval_minutes(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- dropbox ---

    pub fn dropbox_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.dropbox.client_id = Some(client_id.into());
        self
    }

    pub fn dropbox_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.dropbox.redirect_uri = uri.into();
        self
    }

    /// Points every Dropbox endpoint at `base_url` (used against mock servers).
    pub fn dropbox_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.config.dropbox.auth_url = format!("{base_url}/oauth2/authorize");
        self.config.dropbox.token_url = format!("{base_url}/oauth2/token");
        self.config.dropbox.api_url = base_url.clone();
        self.config.dropbox.content_url = base_url;
        self
    }

    pub fn dropbox_pkce_method(mut self, method: PkceMethod) -> Self {
        self.config.dropbox.pkce_method = method;
        self
    }

    // --- miniflux ---

    pub fn miniflux_request_limit(mut self, limit: u32) -> Self {
        self.config.miniflux.request_limit = limit;
        self
    }

    // --- sync ---

    pub fn sync_interval_minutes(mut self, minutes: u64) -> Self {
        self.config.sync.interval_minutes = minutes;
        self
    }

    pub fn sync_refresh_chunk_size(mut self, size: usize) -> Self {
        self.config.sync.refresh_chunk_size = size;
        self
    }

    pub fn sync_snapshot_path(mut self, path: impl Into<String>) -> Self {
        self.config.sync.snapshot_path = path.into();
        self
    }

    pub fn sync_read_post_retention_days(mut self, days: u32) -> Self {
        self.config.sync.read_post_retention_days = days;
        self
    }

    pub fn sync_clock_skew_tolerance_hours(mut self, hours: i64) -> Self {
        self.config.sync.clock_skew_tolerance_hours = hours;
        self
    }

    // --- store ---

    pub fn store_database(mut self, path: PathBuf) -> Self {
        self.config.store.database = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- telemetry ---

    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.config.telemetry.enabled = enabled;
        self
    }

    pub fn telemetry_reports_dir(mut self, dir: PathBuf) -> Self {
        self.config.telemetry.reports_dir = dir;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.dropbox.client_id.is_none());
        assert_eq!(cfg.dropbox.auth_url, "https://www.dropbox.com/oauth2/authorize");
        assert_eq!(cfg.dropbox.token_url, "https://api.dropboxapi.com/oauth2/token");
        assert_eq!(cfg.dropbox.pkce_method, PkceMethod::Plain);
        assert_eq!(cfg.miniflux.request_limit, 100);
        assert_eq!(cfg.sync.interval_minutes, 15);
        assert_eq!(cfg.sync.refresh_chunk_size, 6);
        assert_eq!(cfg.sync.snapshot_path, "/feedsync_sync_data.json");
        assert_eq!(cfg.sync.clock_skew_tolerance_hours, 24);
        assert_eq!(cfg.sync.read_post_retention_days, 30);
        assert!(cfg.store.database.to_string_lossy().ends_with("feedsync.db"));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.telemetry.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
dropbox:
  client_id: "app-key-123"
  redirect_uri: "feedsync://oauth"
  pkce_method: s256
miniflux:
  request_limit: 50
sync:
  interval_minutes: 30
  refresh_chunk_size: 4
  snapshot_path: /custom.json
store:
  database: /tmp/feedsync-test.db
logging:
  level: debug
telemetry:
  enabled: false
  reports_dir: /tmp/reports
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.dropbox.client_id, Some("app-key-123".to_string()));
        assert_eq!(cfg.dropbox.redirect_uri, "feedsync://oauth");
        assert_eq!(cfg.dropbox.pkce_method, PkceMethod::S256);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.dropbox.api_url, "https://api.dropboxapi.com");
        assert_eq!(cfg.miniflux.request_limit, 50);
        assert_eq!(cfg.sync.interval_minutes, 30);
        assert_eq!(cfg.sync.refresh_chunk_size, 4);
        assert_eq!(cfg.sync.snapshot_path, "/custom.json");
        assert_eq!(cfg.sync.clock_skew_tolerance_hours, 24);
        assert_eq!(cfg.store.database, PathBuf::from("/tmp/feedsync-test.db"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(!cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.reports_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.interval_minutes, 15);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = ConfigBuilder::new()
            .dropbox_client_id("abc")
            .sync_interval_minutes(45)
            .build();

        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.dropbox.client_id.as_deref(), Some("abc"));
        assert_eq!(loaded.sync.interval_minutes, 45);
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_interval() {
        let mut cfg = Config::default();
        cfg.sync.interval_minutes = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.interval_minutes"));
    }

    #[test]
    fn validate_catches_chunk_size_out_of_range() {
        let mut cfg = Config::default();
        cfg.sync.refresh_chunk_size = 0;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.refresh_chunk_size"));

        cfg.sync.refresh_chunk_size = 64;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.refresh_chunk_size"));
    }

    #[test]
    fn validate_catches_relative_snapshot_path() {
        let mut cfg = Config::default();
        cfg.sync.snapshot_path = "sync.json".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.snapshot_path"));
    }

    #[test]
    fn validate_catches_invalid_endpoints() {
        let mut cfg = Config::default();
        cfg.dropbox.token_url = "ftp://example.com".to_string();
        cfg.dropbox.redirect_uri = "nowhere".to_string();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"dropbox.token_url".to_string()));
        assert!(fields.contains(&"dropbox.redirect_uri".to_string()));
    }

    #[test]
    fn validate_catches_blank_client_id() {
        let cfg = ConfigBuilder::new().dropbox_client_id("  ").build();
        assert!(cfg.validate().iter().any(|e| e.field == "dropbox.client_id"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_catches_zero_request_limit() {
        let cfg = ConfigBuilder::new().miniflux_request_limit(0).build();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "miniflux.request_limit"));
    }

    // -- Builder --

    #[test]
    fn builder_base_url_rewrites_all_endpoints() {
        let cfg = ConfigBuilder::new()
            .dropbox_base_url("http://127.0.0.1:9999")
            .build();
        assert_eq!(cfg.dropbox.auth_url, "http://127.0.0.1:9999/oauth2/authorize");
        assert_eq!(cfg.dropbox.token_url, "http://127.0.0.1:9999/oauth2/token");
        assert_eq!(cfg.dropbox.api_url, "http://127.0.0.1:9999");
        assert_eq!(cfg.dropbox.content_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn build_validated_returns_errors() {
        let result = ConfigBuilder::new().sync_interval_minutes(0).build_validated();
        assert!(result.is_err());

        let result = ConfigBuilder::new()
            .dropbox_pkce_method(PkceMethod::S256)
            .build_validated();
        assert!(result.is_ok());
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "sync.interval_minutes".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "sync.interval_minutes: must be greater than 0");
    }
}
