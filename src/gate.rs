//! Decision gate: the single entry point the host agent calls before it
//! would disrupt a network.
//!
//! Matching faults never propagate past this boundary. The default
//! posture is fail-open (allow the action) so a defect in matching can
//! never block normal host operation; `strict` flips that to fail-closed
//! for environments that prefer to over-protect.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::matcher::find_match;
use crate::models::{AuditAction, Bssid, WhitelistDocument};

/// Outcome of a decision gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not whitelisted: the host agent may proceed.
    Allow,
    /// Whitelisted (or strict-mode fault): veto the action.
    Block,
}

impl Verdict {
    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Block => write!(f, "block"),
        }
    }
}

/// Normalize a raw observed address the same way the validator normalizes
/// a stored one. An unparseable address can never equal a stored
/// canonical bssid, so it degrades to "not observed".
fn normalize_observed(bssid: Option<&str>, ssid: Option<&str>) -> (Option<Bssid>, Option<String>) {
    let bssid = bssid.and_then(|raw| match raw.trim() {
        "" => None,
        trimmed => match trimmed.parse::<Bssid>() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("ignoring unparseable observed address {trimmed:?}: {e}");
                None
            }
        },
    });
    let ssid = ssid
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    (bssid, ssid)
}

/// Should a deauthentication attack against the observed access point be
/// blocked? Appends an `attack_blocked` audit record on a block; the
/// allow path leaves no audit trace. Never panics.
pub fn should_block_action(
    document: &WhitelistDocument,
    audit: &AuditLog,
    strict: bool,
    bssid: Option<&str>,
    ssid: Option<&str>,
) -> Verdict {
    let (observed_bssid, observed_ssid) = normalize_observed(bssid, ssid);

    match find_match(document, observed_bssid.as_ref(), observed_ssid.as_deref()) {
        Ok(Some(entry)) => {
            info!(
                "blocking deauth attack on whitelisted network: {} ({})",
                entry.display_name(),
                observed_bssid
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "unknown bssid".to_string()),
            );
            audit.append(
                AuditAction::AttackBlocked,
                json!({
                    "bssid": observed_bssid.map(|b| b.to_string()),
                    "ssid": observed_ssid,
                    "matched_id": entry.id,
                    "matched_network": entry.display_name(),
                    "reason": "network is whitelisted",
                }),
            );
            Verdict::Block
        }
        Ok(None) => Verdict::Allow,
        Err(fault) if strict => {
            warn!("whitelist evaluation fault, strict mode blocks: {fault}");
            audit.append(
                AuditAction::AttackBlocked,
                json!({
                    "bssid": observed_bssid.map(|b| b.to_string()),
                    "ssid": observed_ssid,
                    "reason": format!("evaluation fault in strict mode: {fault}"),
                }),
            );
            Verdict::Block
        }
        Err(fault) => {
            warn!("whitelist evaluation fault, failing open: {fault}");
            Verdict::Allow
        }
    }
}

/// Audit-only hook: a credential handshake was captured. Whitelisted
/// networks get an audit record; nothing is ever blocked here.
pub fn record_handshake(
    document: &WhitelistDocument,
    audit: &AuditLog,
    bssid: Option<&str>,
    ssid: Option<&str>,
    filename: &str,
) {
    let (observed_bssid, observed_ssid) = normalize_observed(bssid, ssid);

    match find_match(document, observed_bssid.as_ref(), observed_ssid.as_deref()) {
        Ok(Some(entry)) => {
            audit.append(
                AuditAction::HandshakeCaptured,
                json!({
                    "bssid": observed_bssid.map(|b| b.to_string()),
                    "ssid": observed_ssid,
                    "matched_id": entry.id,
                    "filename": filename,
                }),
            );
        }
        Ok(None) => {}
        Err(fault) => warn!("whitelist evaluation fault in handshake hook: {fault}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryCandidate, MatchMode};
    use crate::validate::validate_and_normalize;

    fn doc_with(candidate: EntryCandidate) -> WhitelistDocument {
        let mut document = WhitelistDocument::default();
        document
            .networks
            .push(validate_and_normalize(&candidate).unwrap().into_entry(1));
        document
    }

    #[test]
    fn blocks_and_audits_whitelisted_network() {
        let document = doc_with(EntryCandidate {
            ssid: Some("HomeNet".to_string()),
            ..Default::default()
        });
        let audit = AuditLog::in_memory();

        let verdict = should_block_action(
            &document,
            &audit,
            false,
            Some("00:11:22:33:44:55"),
            Some("HomeNet"),
        );
        assert_eq!(verdict, Verdict::Block);

        let tail = audit.tail();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].action, AuditAction::AttackBlocked);
        assert_eq!(tail[0].details["matched_id"], 1);
        assert_eq!(tail[0].details["bssid"], "00:11:22:33:44:55");
    }

    #[test]
    fn allow_path_leaves_no_audit_trace() {
        let document = WhitelistDocument::default();
        let audit = AuditLog::in_memory();

        let verdict = should_block_action(
            &document,
            &audit,
            false,
            Some("00:11:22:33:44:55"),
            Some("HomeNet"),
        );
        assert_eq!(verdict, Verdict::Allow);
        assert!(audit.tail().is_empty());
    }

    #[test]
    fn unparseable_observed_address_degrades_to_name_only() {
        let document = doc_with(EntryCandidate {
            ssid: Some("HomeNet".to_string()),
            ..Default::default()
        });
        let audit = AuditLog::in_memory();

        let verdict =
            should_block_action(&document, &audit, false, Some("junk"), Some("HomeNet"));
        assert_eq!(verdict, Verdict::Block);
        assert_eq!(audit.tail()[0].details["bssid"], serde_json::Value::Null);
    }

    #[test]
    fn evaluation_fault_honors_posture() {
        let mut document = doc_with(EntryCandidate {
            ssid: Some("Guest".to_string()),
            mode: MatchMode::Regex,
            regex_pattern: Some("^Guest".to_string()),
            ..Default::default()
        });
        document.networks[0].matcher = None;
        let audit = AuditLog::in_memory();

        let open = should_block_action(&document, &audit, false, None, Some("Guest-1"));
        assert_eq!(open, Verdict::Allow);
        assert!(audit.tail().is_empty());

        let closed = should_block_action(&document, &audit, true, None, Some("Guest-1"));
        assert_eq!(closed, Verdict::Block);
        assert_eq!(audit.tail().len(), 1);
    }

    #[test]
    fn handshake_hook_audits_only_whitelisted_networks() {
        let document = doc_with(EntryCandidate {
            bssid: Some("aa:bb:cc:dd:ee:ff".to_string()),
            ..Default::default()
        });
        let audit = AuditLog::in_memory();

        record_handshake(&document, &audit, Some("other"), Some("Elsewhere"), "x.pcap");
        assert!(audit.tail().is_empty());

        record_handshake(
            &document,
            &audit,
            Some("AA-BB-CC-DD-EE-FF"),
            None,
            "capture.pcap",
        );
        let tail = audit.tail();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].action, AuditAction::HandshakeCaptured);
        assert_eq!(tail[0].details["filename"], "capture.pcap");
    }
}
