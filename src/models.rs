use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::matcher::SsidMatcher;

/// Schema tag written into every persisted document.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Hardware address of an access point radio (6 bytes).
///
/// Parses from colon, hyphen, or dot separated byte pairs in any letter
/// case; always renders in the canonical uppercase colon form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bssid([u8; 6]);

impl Bssid {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for Bssid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['-', '.'], ":");
        let parts: Vec<&str> = normalized.split(':').collect();
        if parts.len() != 6 {
            return Err(format!("expected 6 byte pairs, got {}", parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(format!("invalid byte pair: {part:?}"));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| format!("invalid hex byte: {part:?}"))?;
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for Bssid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl Serialize for Bssid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bssid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How an entry's SSID is compared against an observed network name.
/// BSSID comparison is always exact regardless of mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Wildcard,
    Regex,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Wildcard => write!(f, "wildcard"),
            MatchMode::Regex => write!(f, "regex"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One protected-network rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub id: u64,
    pub bssid: Option<Bssid>,
    pub ssid: Option<String>,
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default)]
    pub regex_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub added_date: DateTime<Utc>,

    /// Pattern compiled at validation/load time, never at match time.
    #[serde(skip)]
    pub(crate) matcher: Option<SsidMatcher>,
}

impl WhitelistEntry {
    /// Human-readable identity for logs and audit records.
    pub fn display_name(&self) -> String {
        match (&self.ssid, &self.bssid) {
            (Some(ssid), _) => ssid.clone(),
            (None, Some(bssid)) => bssid.to_string(),
            (None, None) => "<empty>".to_string(),
        }
    }
}

/// The persisted whitelist: an ordered sequence of entries plus the
/// document envelope. Insertion order is the match evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    pub networks: Vec<WhitelistEntry>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl Default for WhitelistDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_updated: None,
            networks: Vec::new(),
        }
    }
}

impl WhitelistDocument {
    /// Next entry id: max existing + 1. Ids are never reused after deletion.
    pub fn next_id(&self) -> u64 {
        self.networks.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }
}

/// Unvalidated candidate fields for a new entry, as received from the
/// CLI, the config's default-entries list, or an import payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryCandidate {
    #[serde(default)]
    pub bssid: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default)]
    pub regex_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for EntryCandidate {
    fn default() -> Self {
        Self {
            bssid: None,
            ssid: None,
            mode: MatchMode::Exact,
            regex_pattern: None,
            enabled: true,
            description: String::new(),
            tags: Vec::new(),
        }
    }
}

/// Import payload: a document fragment carrying candidate entries.
/// Extra fields (ids, timestamps from an export) are ignored; ids are
/// re-assigned on import.
#[derive(Debug, Default, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub networks: Vec<EntryCandidate>,
}

/// Whitelist statistics for the stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct WhitelistStats {
    pub total_networks: usize,
    pub enabled_networks: usize,
    pub bssid_entries: usize,
    pub ssid_entries: usize,
    pub wildcard_entries: usize,
    pub regex_entries: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Closed vocabulary of auditable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    NetworkAdded,
    NetworkRemoved,
    NetworkToggled,
    WhitelistImported,
    WhitelistExported,
    AttackBlocked,
    HandshakeCaptured,
    EngineInitialized,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::NetworkAdded => "network_added",
            AuditAction::NetworkRemoved => "network_removed",
            AuditAction::NetworkToggled => "network_toggled",
            AuditAction::WhitelistImported => "whitelist_imported",
            AuditAction::WhitelistExported => "whitelist_exported",
            AuditAction::AttackBlocked => "attack_blocked",
            AuditAction::HandshakeCaptured => "handshake_captured",
            AuditAction::EngineInitialized => "engine_initialized",
        };
        write!(f, "{s}")
    }
}

/// One audit trail record, serialized as a single JSON line on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub details: serde_json::Value,
}
