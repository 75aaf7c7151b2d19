//! Append-only audit trail.
//!
//! Every security-relevant decision and mutation lands here: one JSON
//! object per line on disk (unbounded), plus a capped in-memory tail for
//! the stats/inspection surface. Appends are the only operation other
//! components may perform.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{AuditAction, AuditRecord};

/// Maximum records retained in memory; oldest are dropped first.
pub const AUDIT_TAIL_CAP: usize = 1000;

pub struct AuditLog {
    inner: Mutex<AuditInner>,
}

struct AuditInner {
    /// Append handle; `None` when the log file could not be opened, in
    /// which case records are kept in memory only.
    file: Option<File>,
    tail: VecDeque<AuditRecord>,
}

impl AuditLog {
    /// Open (or create) the audit log at `path`. Failure to open is
    /// logged and degrades to memory-only operation, never fatal.
    pub fn open(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("failed to create audit log directory {}: {e}", parent.display());
            }
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("failed to open audit log {}: {e}", path.display());
                None
            }
        };

        Self {
            inner: Mutex::new(AuditInner {
                file,
                tail: VecDeque::new(),
            }),
        }
    }

    /// Memory-only log, used where no audit path is configured.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(AuditInner {
                file: None,
                tail: VecDeque::new(),
            }),
        }
    }

    /// Append one record. Write failures are logged and swallowed; the
    /// in-memory tail always receives the record.
    pub fn append(&self, action: AuditAction, details: Value) {
        let record = AuditRecord {
            timestamp: Utc::now(),
            action,
            details,
        };

        let mut inner = self.inner.lock();

        if let Some(file) = inner.file.as_mut() {
            match serde_json::to_string(&record) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{line}") {
                        warn!("failed to append audit record: {e}");
                    }
                }
                Err(e) => warn!("failed to serialize audit record: {e}"),
            }
        }

        if inner.tail.len() == AUDIT_TAIL_CAP {
            inner.tail.pop_front();
        }
        inner.tail.push_back(record);
        debug!("audit: {action}");
    }

    /// Snapshot of the in-memory tail, oldest first.
    pub fn tail(&self) -> Vec<AuditRecord> {
        self.inner.lock().tail.iter().cloned().collect()
    }
}

/// Read the last `limit` records from an on-disk audit log. Lines that
/// fail to parse are skipped.
pub fn read_records(path: &Path, limit: usize) -> std::io::Result<Vec<AuditRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records: VecDeque<AuditRecord> = VecDeque::new();

    for line in reader.lines() {
        let line = line?;
        match serde_json::from_str(&line) {
            Ok(record) => {
                if records.len() == limit {
                    records.pop_front();
                }
                records.push_back(record);
            }
            Err(e) => debug!("skipping unparseable audit line: {e}"),
        }
    }

    Ok(records.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_one_json_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::open(&path);

        log.append(AuditAction::NetworkAdded, json!({"id": 1}));
        log.append(AuditAction::AttackBlocked, json!({"ssid": "HomeNet"}));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let records = read_records(&path, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, AuditAction::NetworkAdded);
        assert_eq!(records[1].details["ssid"], "HomeNet");
    }

    #[test]
    fn memory_tail_is_capped_oldest_first_out() {
        let log = AuditLog::in_memory();
        for i in 0..(AUDIT_TAIL_CAP + 5) {
            log.append(AuditAction::NetworkAdded, json!({"i": i}));
        }

        let tail = log.tail();
        assert_eq!(tail.len(), AUDIT_TAIL_CAP);
        assert_eq!(tail[0].details["i"], 5);
    }

    #[test]
    fn read_records_respects_limit_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::open(&path);
        for i in 0..4 {
            log.append(AuditAction::NetworkToggled, json!({"i": i}));
        }

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();

        let records = read_records(&path, 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].details["i"], 2);
        assert_eq!(records[1].details["i"], 3);
    }
}
