//! Admin Sync
//!
//! Notification plumbing and CRUD state synchronization for the commerce
//! admin console:
//! - Notification bus decoupling "a call settled" from "a screen shows a toast"
//! - Per-screen notification stores with cancellable auto-expiry
//! - A call wrapper announcing the outcome of every remote call
//! - A generic per-resource list cache kept in step with CRUD calls

pub mod events;
pub mod notifications;
pub mod resources;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use events::NotificationKind;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub notifications: NotificationSettings,
}

/// Notification section: toast lifetimes and store limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub success_duration_ms: u64,
    pub error_duration_ms: u64,
    pub warning_duration_ms: u64,
    pub info_duration_ms: u64,
    /// Oldest notifications are evicted beyond this many. None = unbounded.
    pub max_visible: Option<usize>,
    /// Publish an error notification when a list load fails
    pub toast_on_load_error: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            success_duration_ms: 3000,
            error_duration_ms: 5000,
            warning_duration_ms: 4000,
            info_duration_ms: 3000,
            max_visible: None,
            toast_on_load_error: false,
        }
    }
}

impl NotificationSettings {
    /// Auto-expiry for notifications of `kind`
    pub fn duration_for(&self, kind: NotificationKind) -> u64 {
        match kind {
            NotificationKind::Success => self.success_duration_ms,
            NotificationKind::Error => self.error_duration_ms,
            NotificationKind::Warning => self.warning_duration_ms,
            NotificationKind::Info => self.info_duration_ms,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub notifications: NotificationSettings,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        let defaults = yaml.notifications;

        Ok(Self {
            notifications: NotificationSettings {
                success_duration_ms: env_parse("ADMIN_SUCCESS_DURATION_MS")
                    .unwrap_or(defaults.success_duration_ms),
                error_duration_ms: env_parse("ADMIN_ERROR_DURATION_MS")
                    .unwrap_or(defaults.error_duration_ms),
                max_visible: env_parse("ADMIN_MAX_VISIBLE").or(defaults.max_visible),
                toast_on_load_error: env_flag("ADMIN_TOAST_ON_LOAD_ERROR")
                    .unwrap_or(defaults.toast_on_load_error),
                ..defaults
            },
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
notifications:
  success_duration_ms: 2000
  error_duration_ms: 8000
  max_visible: 5
  toast_on_load_error: true
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let n = &config.notifications;
        assert_eq!(n.success_duration_ms, 2000);
        assert_eq!(n.error_duration_ms, 8000);
        assert_eq!(n.max_visible, Some(5));
        assert!(n.toast_on_load_error);
        // Unset fields keep their defaults
        assert_eq!(n.warning_duration_ms, 4000);
        assert_eq!(n.info_duration_ms, 3000);
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        let n = &config.notifications;
        assert_eq!(n.success_duration_ms, 3000);
        assert_eq!(n.error_duration_ms, 5000);
        assert!(n.max_visible.is_none());
        assert!(!n.toast_on_load_error);

        let empty: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(empty.notifications, NotificationSettings::default());
    }

    #[test]
    fn test_duration_for_kind() {
        let n = NotificationSettings::default();
        assert_eq!(n.duration_for(NotificationKind::Success), 3000);
        assert_eq!(n.duration_for(NotificationKind::Error), 5000);
        assert_eq!(n.duration_for(NotificationKind::Warning), 4000);
        assert_eq!(n.duration_for(NotificationKind::Info), 3000);
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "ADMIN_SUCCESS_DURATION_MS",
                "ADMIN_ERROR_DURATION_MS",
                "ADMIN_MAX_VISIBLE",
                "ADMIN_TOAST_ON_LOAD_ERROR",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
notifications:
  success_duration_ms: 1000
  error_duration_ms: 9000
  max_visible: 3
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.notifications.success_duration_ms, 1000);
        assert_eq!(config.notifications.error_duration_ms, 9000);
        assert_eq!(config.notifications.max_visible, Some(3));
        assert!(!config.notifications.toast_on_load_error);

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("ADMIN_ERROR_DURATION_MS", "7000");
        std::env::set_var("ADMIN_TOAST_ON_LOAD_ERROR", "yes");
        std::env::set_var("ADMIN_MAX_VISIBLE", "not-a-number");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.notifications.error_duration_ms, 7000);
        assert!(config.notifications.toast_on_load_error);
        // Invalid env value is ignored, YAML value kept
        assert_eq!(config.notifications.max_visible, Some(3));
        assert_eq!(config.notifications.success_duration_ms, 1000);

        clear_env();

        // --- Phase 3: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-admin-sync-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.notifications, NotificationSettings::default());

        // --- Phase 4: Unparseable YAML → defaults ---
        std::fs::write(&file_path, "notifications: [not, a, map]").unwrap();
        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.notifications, NotificationSettings::default());
    }
}
