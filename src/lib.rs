pub mod audit;
pub mod config;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod models;
pub mod store;
pub mod validate;

use anyhow::Result;
use parking_lot::RwLock;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use audit::AuditLog;
use config::Config;
use gate::Verdict;
use models::{
    AuditAction, AuditRecord, EntryCandidate, ImportDocument, WhitelistDocument, WhitelistEntry,
    WhitelistStats,
};
use store::{RemoveTarget, WhitelistStore};

/// Core deauthguard engine handle.
///
/// Created once at startup and threaded through every host-agent callback
/// and CRUD call; there is no ambient global state. Lookups take the read
/// lock, mutations the write lock, so a lookup racing a save never
/// observes a partially written document.
pub struct DeauthGuard {
    config: Config,
    store: RwLock<WhitelistStore>,
    audit: Arc<AuditLog>,
}

impl DeauthGuard {
    /// Start the engine: load or create the whitelist, open the audit
    /// log, and record initialization. Document problems degrade to an
    /// empty whitelist; startup only fails on unusable configuration.
    pub fn new(config: Config) -> Result<Self> {
        let audit = Arc::new(AuditLog::open(&config.audit_log_file));
        let store = WhitelistStore::open(
            config.whitelist_file.clone(),
            &config.default_entries,
            audit.clone(),
        );

        audit.append(
            AuditAction::EngineInitialized,
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "network_count": store.document().networks.len(),
                "strict_enforcement": config.strict_enforcement,
            }),
        );
        info!(
            "deauthguard ready with {} whitelisted networks",
            store.document().networks.len()
        );

        let engine = Self {
            config,
            store: RwLock::new(store),
            audit,
        };

        if engine.config.auto_backup {
            engine.backup();
        }

        Ok(engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decision gate: called per observed access point before a deauth
    /// attack. `Block` means the network is protected.
    pub fn check_access_point(&self, bssid: Option<&str>, ssid: Option<&str>) -> Verdict {
        let store = self.store.read();
        gate::should_block_action(
            store.document(),
            &self.audit,
            self.config.strict_enforcement,
            bssid,
            ssid,
        )
    }

    /// Audit-only hook for a captured credential handshake.
    pub fn record_handshake(&self, bssid: Option<&str>, ssid: Option<&str>, filename: &str) {
        let store = self.store.read();
        gate::record_handshake(store.document(), &self.audit, bssid, ssid, filename);
    }

    /// Validate and add a new whitelist entry, returning its id.
    pub fn add_network(&self, candidate: &EntryCandidate) -> error::Result<u64> {
        self.store.write().add(candidate)
    }

    /// Remove entries by id or bssid/ssid string. Returns whether
    /// anything was removed.
    pub fn remove_network(&self, target: &RemoveTarget) -> bool {
        self.store.write().remove(target)
    }

    /// Enable or disable the entry with the given id.
    pub fn toggle_network(&self, id: u64, enabled: bool) -> bool {
        self.store.write().toggle(id, enabled)
    }

    /// Snapshot of all entries, in stored (evaluation) order.
    pub fn list_networks(&self) -> Vec<WhitelistEntry> {
        self.store.read().document().networks.clone()
    }

    pub fn stats(&self) -> WhitelistStats {
        self.store.read().stats()
    }

    /// Import candidate entries; returns the count actually imported.
    pub fn import_networks(&self, fragment: &ImportDocument) -> usize {
        self.store.write().import_entries(fragment)
    }

    /// Read-only snapshot of the whitelist document.
    pub fn export_networks(&self) -> WhitelistDocument {
        self.store.read().export()
    }

    /// In-memory audit tail, oldest first.
    pub fn audit_tail(&self) -> Vec<AuditRecord> {
        self.audit.tail()
    }

    /// Back up the whitelist file, pruning old backups. Best effort.
    pub fn backup(&self) -> Option<PathBuf> {
        self.store.read().backup()
    }
}
