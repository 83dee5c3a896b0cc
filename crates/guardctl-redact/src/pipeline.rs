//! Scan → token-map → redact → leak-check → detoken (component F).

use crate::scan::scan;
use crate::token_map::TokenMap;
use std::collections::HashMap;
use thiserror::Error;

/// Errors the redaction pipeline can return.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedactError {
    /// Post-validation found a raw sensitive value in the response; the
    /// caller must hard-reject and not use the response (spec §4.F).
    #[error("redaction leak detected: raw value for token {token} present in response")]
    Leak { token: String },
}

/// Replace every sensitive value found by [`scan`] with a token from
/// `token_map`, substituting longest values first so that a longer path
/// is replaced before any of its own prefixes.
pub fn redact(text: &str, token_map: &mut TokenMap) -> String {
    let matches = scan(text);

    let mut by_value: HashMap<String, crate::scan::Match> = HashMap::new();
    for m in matches {
        by_value.entry(m.value.clone()).or_insert(m);
    }
    let mut ordered: Vec<_> = by_value.into_values().collect();
    ordered.sort_by(|a, b| b.value.len().cmp(&a.value.len()));

    let mut out = text.to_string();
    for m in ordered {
        let token = token_map.token(m.kind, &m.value);
        out = out.replace(&m.value, &token);
    }
    out
}

/// After an LLM round-trip, scan `response` for any raw value present in
/// `token_map`. Any literal hit is a leak: the caller must hard-reject and
/// must not use the response.
///
/// # Errors
///
/// Returns [`RedactError::Leak`] naming the offending token if a raw
/// value reappears.
pub fn leak_check(response: &str, token_map: &TokenMap) -> Result<(), RedactError> {
    for value in token_map.values() {
        if response.contains(value) {
            let token = token_map
                .pairs()
                .find(|(_, v)| *v == value)
                .map(|(t, _)| t.to_string())
                .unwrap_or_default();
            return Err(RedactError::Leak { token });
        }
    }
    Ok(())
}

/// Replace every token in `text` with its original value. Because tokens
/// are unique and textually distinct (`<<TYPE_N>>`), substitution order
/// does not matter.
#[must_use]
pub fn detoken(text: &str, token_map: &TokenMap) -> String {
    let mut out = text.to_string();
    for (token, value) in token_map.pairs() {
        out = out.replace(token, value);
    }
    out
}

/// Operator override for redaction mode resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeOverride {
    #[default]
    Unset,
    Always,
    Never,
}

impl ModeOverride {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "always" => ModeOverride::Always,
            "never" => ModeOverride::Never,
            _ => ModeOverride::Unset,
        }
    }
}

/// Whether sensitive values are tokenised before leaving the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionMode {
    Local,
    Cloud,
}

/// Resolve the redaction mode given the prompt endpoint URL and an
/// operator override: `always` → cloud; `never` → local; unset → cloud
/// iff the URL host is neither `localhost` nor `127.0.0.1` (spec §4.F).
#[must_use]
pub fn resolve_mode(endpoint: &str, override_mode: ModeOverride) -> RedactionMode {
    match override_mode {
        ModeOverride::Always => RedactionMode::Cloud,
        ModeOverride::Never => RedactionMode::Local,
        ModeOverride::Unset => {
            let is_local_host = url::Url::parse(endpoint)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .is_some_and(|host| host == "localhost" || host == "127.0.0.1");
            if is_local_host {
                RedactionMode::Local
            } else {
                RedactionMode::Cloud
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_map::TokenType;

    #[test]
    fn redact_then_detoken_round_trips() {
        let text = "Server 10.99.88.77 compromised /var/www/site/wp-config.php";
        let mut tm = TokenMap::new();
        let redacted = redact(text, &mut tm);
        assert!(!redacted.contains("10.99.88.77"));
        assert!(!redacted.contains("/var/www/site"));
        let restored = detoken(&redacted, &tm);
        assert_eq!(restored, text);
    }

    #[test]
    fn longer_path_replaced_before_its_prefix() {
        let text = "/var/www/site/wp-config.php and also /var/www/site";
        let mut tm = TokenMap::new();
        let redacted = redact(text, &mut tm);
        assert!(!redacted.contains("/var/www/site"));
    }

    #[test]
    fn leak_check_flags_raw_value_in_response() {
        let mut tm = TokenMap::new();
        tm.token(TokenType::Ip, "10.99.88.77");
        let err = leak_check("the server is at 10.99.88.77", &tm).unwrap_err();
        assert!(matches!(err, RedactError::Leak { .. }));
    }

    #[test]
    fn leak_check_passes_clean_response() {
        let mut tm = TokenMap::new();
        tm.token(TokenType::Ip, "10.99.88.77");
        assert!(leak_check("the server is at <<IP_1>>", &tm).is_ok());
    }

    #[test]
    fn mode_resolution_matches_spec() {
        assert_eq!(resolve_mode("http://localhost:8080", ModeOverride::Unset), RedactionMode::Local);
        assert_eq!(resolve_mode("http://127.0.0.1:8080", ModeOverride::Unset), RedactionMode::Local);
        assert_eq!(resolve_mode("https://api.openai.com", ModeOverride::Unset), RedactionMode::Cloud);
        assert_eq!(resolve_mode("http://localhost:8080", ModeOverride::Always), RedactionMode::Cloud);
        assert_eq!(resolve_mode("https://api.openai.com", ModeOverride::Never), RedactionMode::Local);
    }
}
