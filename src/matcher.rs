//! Whitelist match engine.
//!
//! Evaluates an observed (BSSID, SSID) pair against every enabled entry in
//! stored order. First match wins; insertion order is the documented
//! tie-break, there is no priority field.

use glob::Pattern;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::{Result, WhitelistError};
use crate::models::{Bssid, MatchMode, WhitelistDocument, WhitelistEntry};

/// SSID comparison compiled once per entry.
#[derive(Debug, Clone)]
pub enum SsidMatcher {
    /// Byte-for-byte string equality.
    Exact,
    /// Shell-glob pattern over the full observed name (`*`, `?`, classes).
    Wildcard(Pattern),
    /// Case-insensitive regex anchored at the start of the observed name.
    Regex(Regex),
}

impl SsidMatcher {
    /// Compile the matcher for an entry's mode. Pattern errors surface
    /// here, never at match time.
    pub fn compile(mode: MatchMode, ssid: Option<&str>, pattern: Option<&str>) -> Result<Self> {
        match mode {
            MatchMode::Exact => Ok(SsidMatcher::Exact),
            MatchMode::Wildcard => {
                let ssid = ssid.ok_or_else(|| {
                    WhitelistError::InvalidRule("wildcard mode requires an ssid".into())
                })?;
                let glob = Pattern::new(ssid)
                    .map_err(|e| WhitelistError::InvalidPattern(format!("{ssid:?}: {e}")))?;
                Ok(SsidMatcher::Wildcard(glob))
            }
            MatchMode::Regex => {
                let pattern = pattern.filter(|p| !p.is_empty()).ok_or_else(|| {
                    WhitelistError::InvalidRule("regex mode requires a pattern".into())
                })?;
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| WhitelistError::InvalidPattern(format!("{pattern:?}: {e}")))?;
                Ok(SsidMatcher::Regex(regex))
            }
        }
    }

    /// Whether the observed name satisfies this matcher for the given
    /// stored ssid.
    fn matches(&self, stored_ssid: &str, observed: &str) -> bool {
        match self {
            SsidMatcher::Exact => observed == stored_ssid,
            SsidMatcher::Wildcard(glob) => glob.matches(observed),
            // re.match semantics: the match must begin at the start of
            // the name but need not span it.
            SsidMatcher::Regex(regex) => {
                regex.find(observed).map(|m| m.start() == 0).unwrap_or(false)
            }
        }
    }
}

/// Internal evaluation fault: an enabled pattern entry whose compiled
/// matcher is missing. Only reachable when a loaded document bypassed
/// validation; the caller applies the strict/fail-open posture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFault {
    pub entry_id: u64,
}

impl std::fmt::Display for MatchFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry {} has no compiled matcher", self.entry_id)
    }
}

/// Find the first enabled entry matching the observed pair, in stored
/// order. An observation with neither address nor name never matches.
pub fn find_match<'a>(
    document: &'a WhitelistDocument,
    bssid: Option<&Bssid>,
    ssid: Option<&str>,
) -> std::result::Result<Option<&'a WhitelistEntry>, MatchFault> {
    if bssid.is_none() && ssid.is_none() {
        return Ok(None);
    }

    for entry in &document.networks {
        if !entry.enabled {
            continue;
        }

        // BSSID comparison is always exact; both sides are canonical.
        if let (Some(observed), Some(stored)) = (bssid, entry.bssid.as_ref()) {
            if observed == stored {
                return Ok(Some(entry));
            }
        }

        if let (Some(observed), Some(stored)) = (ssid, entry.ssid.as_deref()) {
            let matched = match entry.mode {
                MatchMode::Exact => observed == stored,
                MatchMode::Wildcard | MatchMode::Regex => match &entry.matcher {
                    Some(matcher) => matcher.matches(stored, observed),
                    None => return Err(MatchFault { entry_id: entry.id }),
                },
            };
            if matched {
                return Ok(Some(entry));
            }
        }
    }

    Ok(None)
}

/// Boolean verdict with the strict/fail-open posture applied on fault.
pub fn is_whitelisted(
    document: &WhitelistDocument,
    bssid: Option<&Bssid>,
    ssid: Option<&str>,
    strict: bool,
) -> bool {
    match find_match(document, bssid, ssid) {
        Ok(matched) => matched.is_some(),
        Err(fault) => {
            warn!("whitelist evaluation fault: {fault}");
            strict
        }
    }
}
