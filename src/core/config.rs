//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.wayfinder/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::PopPolicy;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WayfinderConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NavigationConfig {
    pub pop_policy: Option<PopPolicy>,
    pub handle_back_button: Option<bool>,
    pub multi_pane: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PersistenceConfig {
    pub enabled: Option<bool>,
    pub state_dir: Option<String>,
    pub save_on_publish: Option<bool>,
}

// ============================================================================
// Defaults
// ============================================================================

/// The binary's choice; the library itself has no default pop policy.
pub const DEFAULT_POP_POLICY: PopPolicy = PopPolicy::Ignore;
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
pub const DEFAULT_LOG_FILE: &str = "wayfinder.log";
pub const ENV_POP_POLICY: &str = "WAYFINDER_POP_POLICY";
pub const ENV_STATE_DIR: &str = "WAYFINDER_STATE_DIR";
pub const ENV_LOG_LEVEL: &str = "WAYFINDER_LOG_LEVEL";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
    pub pop_policy: PopPolicy,
    pub handle_back_button: bool,
    pub multi_pane: bool,
    pub persistence_enabled: bool,
    pub state_dir: PathBuf,
    pub save_on_publish: bool,
}

/// Values given on the command line. `None` means not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub pop_policy: Option<PopPolicy>,
    pub state_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub multi_pane: Option<bool>,
    pub no_persistence: bool,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.wayfinder/`.
pub fn wayfinder_home() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".wayfinder"))
}

/// Returns the path to `~/.wayfinder/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    wayfinder_home().map(|h| h.join("config.toml"))
}

/// Load config from `~/.wayfinder/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `WayfinderConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<WayfinderConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(WayfinderConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<WayfinderConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(WayfinderConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: WayfinderConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Wayfinder Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# log_level = "info"                 # "off", "error", "warn", "info", "debug", "trace"
# log_file = "wayfinder.log"

# [navigation]
# pop_policy = "ignore"              # "ignore" or "fail"; or set WAYFINDER_POP_POLICY
# handle_back_button = true
# multi_pane = false

# [persistence]
# enabled = true
# state_dir = "~/.wayfinder/state"   # Or set WAYFINDER_STATE_DIR
# save_on_publish = false            # Write a snapshot after every navigation
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &WayfinderConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |name| std::env::var(name).ok())
}

/// [`resolve`] with an explicit environment lookup.
pub fn resolve_with_env(
    config: &WayfinderConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Pop policy: CLI → env → config → default
    let pop_policy = cli
        .pop_policy
        .or_else(|| env(ENV_POP_POLICY).and_then(|v| parse_pop_policy(&v)))
        .or(config.navigation.pop_policy)
        .unwrap_or(DEFAULT_POP_POLICY);

    // Log level: CLI → env → config → default
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| env(ENV_LOG_LEVEL))
        .or_else(|| config.general.log_level.clone())
        .map(|level| parse_log_level(&level))
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // State dir: CLI → env → config → ~/.wayfinder/state
    let state_dir = cli
        .state_dir
        .clone()
        .or_else(|| env(ENV_STATE_DIR).map(PathBuf::from))
        .or_else(|| config.persistence.state_dir.as_deref().map(expand_home))
        .unwrap_or_else(default_state_dir);

    let log_file = config
        .general
        .log_file
        .as_deref()
        .map(expand_home)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    ResolvedConfig {
        log_level,
        log_file,
        pop_policy,
        handle_back_button: config.navigation.handle_back_button.unwrap_or(true),
        multi_pane: cli
            .multi_pane
            .or(config.navigation.multi_pane)
            .unwrap_or(false),
        persistence_enabled: !cli.no_persistence && config.persistence.enabled.unwrap_or(true),
        state_dir,
        save_on_publish: config.persistence.save_on_publish.unwrap_or(false),
    }
}

/// `~/.wayfinder/state`, or `./.wayfinder/state` without a home directory.
pub fn default_state_dir() -> PathBuf {
    wayfinder_home()
        .unwrap_or_else(|| PathBuf::from(".wayfinder"))
        .join("state")
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn parse_pop_policy(value: &str) -> Option<PopPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "ignore" => Some(PopPolicy::Ignore),
        "fail" => Some(PopPolicy::Fail),
        other => {
            warn!("Unknown pop policy '{}', falling back", other);
            None
        }
    }
}

fn parse_log_level(value: &str) -> LevelFilter {
    value.trim().parse().unwrap_or_else(|_| {
        warn!("Unknown log level '{}', using {}", value, DEFAULT_LOG_LEVEL);
        DEFAULT_LOG_LEVEL
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config_parses() {
        let config = WayfinderConfig::default();
        assert!(config.navigation.pop_policy.is_none());
        assert!(config.persistence.state_dir.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let resolved = resolve_with_env(&WayfinderConfig::default(), &CliOverrides::default(), no_env);
        assert_eq!(resolved.pop_policy, DEFAULT_POP_POLICY);
        assert_eq!(resolved.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(resolved.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert!(resolved.handle_back_button);
        assert!(!resolved.multi_pane);
        assert!(resolved.persistence_enabled);
        assert!(!resolved.save_on_publish);
        assert_eq!(resolved.state_dir, default_state_dir());
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = WayfinderConfig {
            general: GeneralConfig {
                log_level: Some("debug".to_string()),
                log_file: Some("/tmp/wf.log".to_string()),
            },
            navigation: NavigationConfig {
                pop_policy: Some(PopPolicy::Fail),
                handle_back_button: Some(false),
                multi_pane: Some(true),
            },
            persistence: PersistenceConfig {
                enabled: Some(false),
                state_dir: Some("/tmp/wf-state".to_string()),
                save_on_publish: Some(true),
            },
        };
        let resolved = resolve_with_env(&config, &CliOverrides::default(), no_env);
        assert_eq!(resolved.pop_policy, PopPolicy::Fail);
        assert_eq!(resolved.log_level, LevelFilter::Debug);
        assert_eq!(resolved.log_file, PathBuf::from("/tmp/wf.log"));
        assert!(!resolved.handle_back_button);
        assert!(resolved.multi_pane);
        assert!(!resolved.persistence_enabled);
        assert_eq!(resolved.state_dir, PathBuf::from("/tmp/wf-state"));
        assert!(resolved.save_on_publish);
    }

    #[test]
    fn test_env_overrides_config_and_cli_overrides_env() {
        let config = WayfinderConfig {
            navigation: NavigationConfig {
                pop_policy: Some(PopPolicy::Ignore),
                ..Default::default()
            },
            ..Default::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_POP_POLICY, "fail"),
            (ENV_STATE_DIR, "/env/state"),
            (ENV_LOG_LEVEL, "warn"),
        ]);
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());

        let resolved = resolve_with_env(&config, &CliOverrides::default(), lookup);
        assert_eq!(resolved.pop_policy, PopPolicy::Fail);
        assert_eq!(resolved.state_dir, PathBuf::from("/env/state"));
        assert_eq!(resolved.log_level, LevelFilter::Warn);

        let cli = CliOverrides {
            pop_policy: Some(PopPolicy::Ignore),
            state_dir: Some(PathBuf::from("/cli/state")),
            log_level: Some("trace".to_string()),
            multi_pane: Some(true),
            no_persistence: true,
        };
        let resolved = resolve_with_env(&config, &cli, lookup);
        assert_eq!(resolved.pop_policy, PopPolicy::Ignore);
        assert_eq!(resolved.state_dir, PathBuf::from("/cli/state"));
        assert_eq!(resolved.log_level, LevelFilter::Trace);
        assert!(resolved.multi_pane);
        assert!(!resolved.persistence_enabled);
    }

    #[test]
    fn test_garbage_env_values_fall_through() {
        let lookup = |name: &str| match name {
            ENV_POP_POLICY => Some("sometimes".to_string()),
            ENV_LOG_LEVEL => Some("loud".to_string()),
            _ => None,
        };
        let resolved = resolve_with_env(&WayfinderConfig::default(), &CliOverrides::default(), lookup);
        assert_eq!(resolved.pop_policy, DEFAULT_POP_POLICY);
        assert_eq!(resolved.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
log_level = "debug"

[navigation]
pop_policy = "fail"
multi_pane = true

[persistence]
state_dir = "/var/lib/wayfinder"
save_on_publish = true
"#;
        let config: WayfinderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.navigation.pop_policy, Some(PopPolicy::Fail));
        assert_eq!(config.navigation.multi_pane, Some(true));
        assert_eq!(
            config.persistence.state_dir.as_deref(),
            Some("/var/lib/wayfinder")
        );

        let rendered = toml::to_string(&config).unwrap();
        let reparsed: WayfinderConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.navigation.pop_policy, Some(PopPolicy::Fail));
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing, everything else stays default
        let toml_str = r#"
[navigation]
multi_pane = true
"#;
        let config: WayfinderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.navigation.multi_pane, Some(true));
        assert!(config.navigation.pop_policy.is_none());
        assert!(config.general.log_level.is_none());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("wayfinder-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "[navigation\npop_policy = ").unwrap();

        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_generates_commented_default() {
        let dir = std::env::temp_dir().join(format!("wayfinder-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let config = load_config_from(&path).unwrap();

        assert!(config.navigation.pop_policy.is_none());
        let generated = fs::read_to_string(&path).unwrap();
        assert!(generated.starts_with("# Wayfinder Configuration"));
        // Everything is commented out, so it parses to the defaults.
        let reparsed: WayfinderConfig = toml::from_str(&generated).unwrap();
        assert!(reparsed.persistence.enabled.is_none());
        fs::remove_dir_all(&dir).unwrap();
    }
}
