//! Config command - View and manage FeedSync configuration
//!
//! Provides the `feedsync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Writes a default configuration file

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use feedsync_core::config::Config;

use crate::GlobalOpts;

/// Keys accepted by `config set`
const SETTABLE_KEYS: &[(&str, &str)] = &[
    ("dropbox.client_id", "Dropbox app key"),
    ("dropbox.redirect_uri", "OAuth redirect URI"),
    ("miniflux.request_limit", "Entries fetched per feed request"),
    ("sync.interval_minutes", "Minutes between periodic pulls and pushes"),
    ("sync.refresh_chunk_size", "Feeds refreshed concurrently (1-32)"),
    ("sync.snapshot_path", "Snapshot file path in the file store"),
    ("sync.clock_skew_tolerance_hours", "Future timestamps accepted in a snapshot"),
    ("sync.read_post_retention_days", "Days read posts are kept (0 keeps them)"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("telemetry.enabled", "Save failure reports (true|false)"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.interval_minutes")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(opts),
            ConfigCommand::Set { key, value } => execute_set(opts, key, value),
            ConfigCommand::Validate => execute_validate(opts),
            ConfigCommand::Init { force } => execute_init(opts, *force),
        }
    }
}

fn execute_show(opts: &GlobalOpts) -> Result<()> {
    let fmt = opts.format.formatter();
    let config = Config::load_or_default(&opts.config_path);
    info!(config_path = %opts.config_path.display(), "Showing configuration");

    if opts.format.is_json() {
        let json = serde_json::to_value(&config)
            .context("Failed to serialize configuration to JSON")?;
        fmt.print_json(&json);
    } else {
        fmt.success(&format!("Configuration ({})", opts.config_path.display()));
        fmt.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            fmt.info(line);
        }
    }
    Ok(())
}

fn execute_set(opts: &GlobalOpts, key: &str, value: &str) -> Result<()> {
    let fmt = opts.format.formatter();
    let mut config = Config::load_or_default(&opts.config_path);

    if let Err(e) = apply_config_value(&mut config, key, value) {
        fmt.error(&format!("Failed to set '{key}': {e}"));
        if !opts.format.is_json() {
            fmt.info("");
            fmt.info("Supported keys:");
            for (key, help) in SETTABLE_KEYS {
                fmt.info(&format!("  {key:<34} - {help}"));
            }
        }
        return Ok(());
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        fmt.error(&format!("Invalid value for '{key}': {}", messages.join("; ")));
        return Ok(());
    }

    config
        .save(&opts.config_path)
        .context("Failed to write configuration file")?;
    info!(key, value, "Configuration value set");

    if opts.format.is_json() {
        fmt.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": opts.config_path.display().to_string(),
        }));
    } else {
        fmt.success(&format!("Set {key} = {value}"));
        fmt.info(&format!("Saved to {}", opts.config_path.display()));
    }
    Ok(())
}

fn execute_validate(opts: &GlobalOpts) -> Result<()> {
    let fmt = opts.format.formatter();
    let path = &opts.config_path;

    if !path.exists() {
        fmt.info(&format!("Configuration file not found at {}", path.display()));
        fmt.info("Using default configuration. Run 'feedsync config init' to create one.");
        return Ok(());
    }

    let config = Config::load(path)
        .with_context(|| format!("Failed to parse configuration at {}", path.display()))?;
    let errors = config.validate();

    if opts.format.is_json() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        fmt.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        fmt.success("Configuration is valid");
        fmt.info(&format!("File: {}", path.display()));
    } else {
        fmt.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        for error in &errors {
            fmt.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("invalid configuration")
    }
}

fn execute_init(opts: &GlobalOpts, force: bool) -> Result<()> {
    let fmt = opts.format.formatter();
    if opts.config_path.exists() && !force {
        fmt.error(&format!(
            "{} already exists; use --force to overwrite",
            opts.config_path.display()
        ));
        return Ok(());
    }

    Config::default().save(&opts.config_path)?;
    fmt.success(&format!("Wrote {}", opts.config_path.display()));
    Ok(())
}

/// Applies `value` to the field named by the dotted `key`
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))
    }

    match key {
        "dropbox.client_id" => {
            config.dropbox.client_id = (!value.is_empty()).then(|| value.to_string())
        }
        "dropbox.redirect_uri" => config.dropbox.redirect_uri = value.to_string(),
        "miniflux.request_limit" => config.miniflux.request_limit = parse(key, value)?,
        "sync.interval_minutes" => config.sync.interval_minutes = parse(key, value)?,
        "sync.refresh_chunk_size" => config.sync.refresh_chunk_size = parse(key, value)?,
        "sync.snapshot_path" => config.sync.snapshot_path = value.to_string(),
        "sync.clock_skew_tolerance_hours" => {
            config.sync.clock_skew_tolerance_hours = parse(key, value)?
        }
        "sync.read_post_retention_days" => {
            config.sync.read_post_retention_days = parse(key, value)?
        }
        "logging.level" => config.logging.level = value.to_string(),
        "telemetry.enabled" => config.telemetry.enabled = parse(key, value)?,
        _ => bail!("unknown key"),
    }
    Ok(())
}
