use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::EntryCandidate;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the persisted whitelist document
    #[serde(default = "default_whitelist_file")]
    pub whitelist_file: PathBuf,

    /// Path to the append-only audit log
    #[serde(default = "default_audit_log_file")]
    pub audit_log_file: PathBuf,

    /// Fail closed (block) on an internal matching fault instead of the
    /// default fail-open posture
    #[serde(default)]
    pub strict_enforcement: bool,

    /// Back up the whitelist file at startup and before imports
    #[serde(default = "default_true")]
    pub auto_backup: bool,

    /// Entries seeded into a freshly created whitelist
    #[serde(default)]
    pub default_entries: Vec<EntryCandidate>,
}

fn default_whitelist_file() -> PathBuf {
    PathBuf::from("/etc/deauthguard/whitelist.json")
}

fn default_audit_log_file() -> PathBuf {
    PathBuf::from("/var/log/deauthguard/audit.log")
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            whitelist_file: default_whitelist_file(),
            audit_log_file: default_audit_log_file(),
            strict_enforcement: false,
            auto_backup: true,
            default_entries: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/deauthguard/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("deauthguard/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchMode;

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config {
            whitelist_file: PathBuf::from("/tmp/wl.json"),
            strict_enforcement: true,
            default_entries: vec![EntryCandidate {
                ssid: Some("HomeNet".to_string()),
                mode: MatchMode::Wildcard,
                ..Default::default()
            }],
            ..Default::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.whitelist_file, config.whitelist_file);
        assert!(parsed.strict_enforcement);
        assert_eq!(parsed.default_entries.len(), 1);
        assert_eq!(parsed.default_entries[0].mode, MatchMode::Wildcard);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.strict_enforcement);
        assert!(config.auto_backup);
        assert!(config.default_entries.is_empty());
    }
}
