//! Entry validation and normalization.
//!
//! Every candidate record passes through here before it is allowed into
//! the whitelist: hardware addresses are normalized to the canonical
//! uppercase colon form, names are length-checked, and wildcard/regex
//! patterns are compiled eagerly so pattern errors can never surface at
//! match time. Pure functions, no side effects.

use chrono::Utc;

use crate::error::{Result, WhitelistError};
use crate::matcher::SsidMatcher;
use crate::models::{Bssid, EntryCandidate, MatchMode, WhitelistEntry};

/// SSIDs are at most 32 characters per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// A candidate that passed validation, ready to become a stored entry
/// once the store assigns it an id.
#[derive(Debug, Clone)]
pub struct NormalizedEntry {
    pub bssid: Option<Bssid>,
    pub ssid: Option<String>,
    pub mode: MatchMode,
    pub regex_pattern: Option<String>,
    pub enabled: bool,
    pub description: String,
    pub tags: Vec<String>,
    matcher: SsidMatcher,
}

impl NormalizedEntry {
    pub fn into_entry(self, id: u64) -> WhitelistEntry {
        WhitelistEntry {
            id,
            bssid: self.bssid,
            ssid: self.ssid,
            mode: self.mode,
            regex_pattern: self.regex_pattern,
            enabled: self.enabled,
            description: self.description,
            tags: self.tags,
            added_date: Utc::now(),
            matcher: Some(self.matcher),
        }
    }
}

/// Validate and normalize a candidate entry.
pub fn validate_and_normalize(candidate: &EntryCandidate) -> Result<NormalizedEntry> {
    let bssid = match candidate.bssid.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(raw) => Some(
            raw.parse::<Bssid>()
                .map_err(|e| WhitelistError::InvalidAddress(format!("{raw:?}: {e}")))?,
        ),
    };

    let ssid = match candidate.ssid.as_deref().map(str::trim) {
        Some("") => return Err(WhitelistError::InvalidName("name is empty".into())),
        None => None,
        Some(name) => {
            let len = name.chars().count();
            if len > MAX_SSID_LEN {
                return Err(WhitelistError::InvalidName(format!(
                    "name is {len} characters, maximum is {MAX_SSID_LEN}"
                )));
            }
            Some(name.to_string())
        }
    };

    if bssid.is_none() && ssid.is_none() {
        return Err(WhitelistError::EmptyRule);
    }

    if candidate.mode != MatchMode::Exact && ssid.is_none() {
        return Err(WhitelistError::InvalidRule(format!(
            "{} mode requires an ssid",
            candidate.mode
        )));
    }

    let regex_pattern = match candidate.mode {
        MatchMode::Regex => candidate
            .regex_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        // A pattern on a non-regex entry has no matching effect; drop it.
        _ => None,
    };

    let matcher =
        SsidMatcher::compile(candidate.mode, ssid.as_deref(), regex_pattern.as_deref())?;

    Ok(NormalizedEntry {
        bssid,
        ssid,
        mode: candidate.mode,
        regex_pattern,
        enabled: candidate.enabled,
        description: candidate.description.trim().to_string(),
        tags: candidate.tags.clone(),
        matcher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bssid_to_canonical_form() {
        let normalized = validate_and_normalize(&EntryCandidate {
            bssid: Some("aa-bb-cc-dd-ee-ff".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            normalized.bssid.unwrap().to_string(),
            "AA:BB:CC:DD:EE:FF"
        );
    }

    #[test]
    fn rejects_malformed_bssid() {
        let err = validate_and_normalize(&EntryCandidate {
            bssid: Some("not-a-mac".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, WhitelistError::InvalidAddress(_)));
    }

    #[test]
    fn rejects_empty_and_overlong_ssid() {
        let err = validate_and_normalize(&EntryCandidate {
            ssid: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, WhitelistError::InvalidName(_)));

        let err = validate_and_normalize(&EntryCandidate {
            ssid: Some("x".repeat(33)),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, WhitelistError::InvalidName(_)));

        // 32 characters is the inclusive maximum.
        assert!(validate_and_normalize(&EntryCandidate {
            ssid: Some("x".repeat(32)),
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn rejects_entry_with_neither_identifier() {
        let err = validate_and_normalize(&EntryCandidate::default()).unwrap_err();
        assert!(matches!(err, WhitelistError::EmptyRule));
    }

    #[test]
    fn rejects_pattern_modes_without_ssid() {
        for mode in [MatchMode::Wildcard, MatchMode::Regex] {
            let err = validate_and_normalize(&EntryCandidate {
                bssid: Some("00:11:22:33:44:55".to_string()),
                mode,
                regex_pattern: Some(".*".to_string()),
                ..Default::default()
            })
            .unwrap_err();
            assert!(matches!(err, WhitelistError::InvalidRule(_)), "{mode}");
        }
    }

    #[test]
    fn regex_mode_compiles_eagerly() {
        let err = validate_and_normalize(&EntryCandidate {
            ssid: Some("Guest".to_string()),
            mode: MatchMode::Regex,
            regex_pattern: Some("[unclosed".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, WhitelistError::InvalidPattern(_)));

        let err = validate_and_normalize(&EntryCandidate {
            ssid: Some("Guest".to_string()),
            mode: MatchMode::Regex,
            regex_pattern: None,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, WhitelistError::InvalidRule(_)));
    }

    #[test]
    fn drops_pattern_on_non_regex_modes() {
        let normalized = validate_and_normalize(&EntryCandidate {
            ssid: Some("HomeNet".to_string()),
            regex_pattern: Some("^ignored$".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(normalized.regex_pattern.is_none());
    }
}
