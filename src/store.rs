//! Whitelist store: the in-memory document plus its persisted JSON file.
//!
//! The store owns the `WhitelistDocument` for the process lifetime. All
//! mutations run through the validator, are applied in memory first, then
//! persisted write-then-rename; a failed save is logged and the in-memory
//! state remains authoritative for the running process.

use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::error::{Result, WhitelistError};
use crate::matcher::SsidMatcher;
use crate::models::{
    AuditAction, Bssid, EntryCandidate, ImportDocument, MatchMode, WhitelistDocument,
    WhitelistStats,
};
use crate::validate::validate_and_normalize;

/// How many timestamped backups are retained per whitelist file.
const BACKUP_KEEP: usize = 5;

/// Identifier accepted by `remove`: a numeric entry id, or a raw
/// bssid/ssid string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveTarget {
    Id(u64),
    Name(String),
}

impl RemoveTarget {
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<u64>() {
            Ok(id) => RemoveTarget::Id(id),
            Err(_) => RemoveTarget::Name(s.trim().to_string()),
        }
    }
}

impl std::fmt::Display for RemoveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoveTarget::Id(id) => write!(f, "{id}"),
            RemoveTarget::Name(name) => write!(f, "{name}"),
        }
    }
}

pub struct WhitelistStore {
    path: PathBuf,
    document: WhitelistDocument,
    audit: Arc<AuditLog>,
}

impl WhitelistStore {
    /// Load the whitelist from `path`, or create a fresh document when the
    /// file is absent (seeded from `defaults`, invalid ones skipped). A
    /// corrupt file degrades to an empty document; startup never fails on
    /// document state.
    pub fn open<P: Into<PathBuf>>(path: P, defaults: &[EntryCandidate], audit: Arc<AuditLog>) -> Self {
        let path = path.into();

        let document = match read_document(&path) {
            Ok(Some(mut document)) => {
                compile_matchers(&mut document);
                info!(
                    "loaded {} whitelisted networks from {}",
                    document.networks.len(),
                    path.display()
                );
                document
            }
            Ok(None) => {
                let mut document = WhitelistDocument::default();
                seed_defaults(&mut document, defaults);
                info!("created new whitelist at {}", path.display());
                let mut store = Self {
                    path,
                    document,
                    audit,
                };
                store.persist();
                return store;
            }
            Err(e) => {
                warn!("{e}; starting with an empty whitelist");
                WhitelistDocument::default()
            }
        };

        Self {
            path,
            document,
            audit,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &WhitelistDocument {
        &self.document
    }

    /// Serialize the document to disk, rewriting `last_updated`. The file
    /// is replaced via a temporary sibling so a racing reader never sees a
    /// partial write.
    pub fn save(&mut self) -> Result<()> {
        self.document.last_updated = Some(Utc::now());

        let content = serde_json::to_string_pretty(&self.document)
            .map_err(|e| WhitelistError::Persistence(std::io::Error::other(e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "whitelist.json".to_string());
        let tmp = self.path.with_file_name(format!("{file_name}.tmp"));

        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("whitelist saved to {}", self.path.display());
        Ok(())
    }

    /// Best-effort save after a mutation. The in-memory state stands even
    /// when durability fails.
    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(
                "whitelist mutation applied in memory but not persisted: {e}"
            );
        }
    }

    /// Validate and add a new entry. Rejects duplicates: same normalized
    /// bssid as any existing entry, or same ssid as an existing exact-mode
    /// entry.
    pub fn add(&mut self, candidate: &EntryCandidate) -> Result<u64> {
        let normalized = validate_and_normalize(candidate)?;

        for entry in &self.document.networks {
            if let (Some(new), Some(existing)) = (normalized.bssid.as_ref(), entry.bssid.as_ref())
            {
                if new == existing {
                    return Err(WhitelistError::Duplicate(format!(
                        "bssid {new} already covered by entry {}",
                        entry.id
                    )));
                }
            }
            if let (Some(new), Some(existing)) = (normalized.ssid.as_deref(), entry.ssid.as_deref())
            {
                if entry.mode == MatchMode::Exact && new == existing {
                    return Err(WhitelistError::Duplicate(format!(
                        "ssid {new:?} already covered by entry {}",
                        entry.id
                    )));
                }
            }
        }

        let id = self.document.next_id();
        let entry = normalized.into_entry(id);

        self.audit.append(
            AuditAction::NetworkAdded,
            json!({
                "id": entry.id,
                "bssid": entry.bssid.map(|b| b.to_string()),
                "ssid": entry.ssid,
                "mode": entry.mode.to_string(),
                "description": entry.description,
            }),
        );
        info!("whitelisted network: {}", entry.display_name());

        self.document.networks.push(entry);
        self.persist();
        Ok(id)
    }

    /// Remove entries by id or by bssid/ssid string. The string form
    /// removes every entry whose normalized bssid or ssid matches,
    /// case-insensitively. Returns whether anything was removed.
    pub fn remove(&mut self, target: &RemoveTarget) -> bool {
        let before = self.document.networks.len();

        match target {
            RemoveTarget::Id(id) => {
                self.document.networks.retain(|e| e.id != *id);
            }
            RemoveTarget::Name(name) => {
                let as_bssid: Option<Bssid> = name.parse().ok();
                let lowered = name.trim().to_lowercase();
                self.document.networks.retain(|entry| {
                    let bssid_hit = match (as_bssid.as_ref(), entry.bssid.as_ref()) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    };
                    let ssid_hit = entry
                        .ssid
                        .as_deref()
                        .map(|s| s.to_lowercase() == lowered)
                        .unwrap_or(false);
                    !(bssid_hit || ssid_hit)
                });
            }
        }

        let removed = before - self.document.networks.len();
        if removed == 0 {
            return false;
        }

        self.audit.append(
            AuditAction::NetworkRemoved,
            json!({ "identifier": target.to_string(), "removed": removed }),
        );
        info!("removed {removed} whitelist entries matching {target}");
        self.persist();
        true
    }

    /// Flip `enabled` on the entry with the given id. Disabled entries are
    /// retained but never match.
    pub fn toggle(&mut self, id: u64, enabled: bool) -> bool {
        let Some(entry) = self.document.networks.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.enabled = enabled;

        self.audit.append(
            AuditAction::NetworkToggled,
            json!({ "id": id, "enabled": enabled }),
        );
        info!(
            "whitelist entry {id} {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.persist();
        true
    }

    /// Import candidate entries from a document fragment. Every candidate
    /// is validated independently; invalid ones are skipped, ids are
    /// re-assigned. Returns the count actually imported.
    pub fn import_entries(&mut self, fragment: &ImportDocument) -> usize {
        let mut imported = 0;

        for candidate in &fragment.networks {
            match validate_and_normalize(candidate) {
                Ok(normalized) => {
                    let id = self.document.next_id();
                    self.document.networks.push(normalized.into_entry(id));
                    imported += 1;
                }
                Err(e) => warn!("skipping invalid imported entry: {e}"),
            }
        }

        if imported > 0 {
            self.audit.append(
                AuditAction::WhitelistImported,
                json!({
                    "imported_count": imported,
                    "total_count": self.document.networks.len(),
                }),
            );
            info!("imported {imported} whitelist entries");
            self.persist();
        }

        imported
    }

    /// Read-only snapshot of the document. Does not touch the live
    /// `last_updated`.
    pub fn export(&self) -> WhitelistDocument {
        self.audit.append(
            AuditAction::WhitelistExported,
            json!({ "network_count": self.document.networks.len() }),
        );
        self.document.clone()
    }

    /// Copy the live file to a timestamp-suffixed sibling, retaining the
    /// `BACKUP_KEEP` most recent backups. Failures are logged, never fatal.
    pub fn backup(&self) -> Option<PathBuf> {
        if !self.path.exists() {
            return None;
        }

        let file_name = self.path.file_name()?.to_string_lossy().into_owned();
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = self
            .path
            .with_file_name(format!("{file_name}.backup.{stamp}"));

        if let Err(e) = std::fs::copy(&self.path, &backup_path) {
            warn!("failed to back up whitelist: {e}");
            return None;
        }
        info!("whitelist backed up to {}", backup_path.display());

        self.prune_backups(&file_name);
        Some(backup_path)
    }

    fn prune_backups(&self, file_name: &str) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let prefix = format!("{file_name}.backup.");

        let mut backups: Vec<PathBuf> = match std::fs::read_dir(parent) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with(&prefix))
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                warn!("failed to scan backups: {e}");
                return;
            }
        };

        // Timestamp suffixes sort lexicographically.
        backups.sort();
        while backups.len() > BACKUP_KEEP {
            let old = backups.remove(0);
            match std::fs::remove_file(&old) {
                Ok(()) => debug!("pruned old backup {}", old.display()),
                Err(e) => warn!("failed to prune backup {}: {e}", old.display()),
            }
        }
    }

    pub fn stats(&self) -> WhitelistStats {
        let networks = &self.document.networks;
        WhitelistStats {
            total_networks: networks.len(),
            enabled_networks: networks.iter().filter(|e| e.enabled).count(),
            bssid_entries: networks.iter().filter(|e| e.bssid.is_some()).count(),
            ssid_entries: networks.iter().filter(|e| e.ssid.is_some()).count(),
            wildcard_entries: networks
                .iter()
                .filter(|e| e.mode == MatchMode::Wildcard)
                .count(),
            regex_entries: networks
                .iter()
                .filter(|e| e.mode == MatchMode::Regex)
                .count(),
            last_updated: self.document.last_updated,
        }
    }
}

/// Read and parse the document. `Ok(None)` when the file is absent; a
/// structurally invalid file is a `CorruptDocument`.
fn read_document(path: &Path) -> Result<Option<WhitelistDocument>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let document: WhitelistDocument = serde_json::from_str(&content)
        .map_err(|e| WhitelistError::CorruptDocument(format!("{}: {e}", path.display())))?;
    Ok(Some(document))
}

/// Recompile cached matchers after a load. An entry whose pattern no
/// longer compiles keeps `None` and is handled by the match engine's
/// fault posture.
fn compile_matchers(document: &mut WhitelistDocument) {
    for entry in &mut document.networks {
        match SsidMatcher::compile(entry.mode, entry.ssid.as_deref(), entry.regex_pattern.as_deref())
        {
            Ok(matcher) => entry.matcher = Some(matcher),
            Err(e) => {
                warn!("entry {} has an invalid pattern: {e}", entry.id);
                entry.matcher = None;
            }
        }
    }
}

fn seed_defaults(document: &mut WhitelistDocument, defaults: &[EntryCandidate]) {
    for candidate in defaults {
        match validate_and_normalize(candidate) {
            Ok(normalized) => {
                let id = document.next_id();
                let entry = normalized.into_entry(id);
                info!("seeded default whitelist entry: {}", entry.display_name());
                document.networks.push(entry);
            }
            Err(e) => warn!("skipping invalid default entry: {e}"),
        }
    }
}
