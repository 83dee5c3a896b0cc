//! Fixed pattern bank run over text before it leaves the host (component
//! F, "scan" stage).

use crate::token_map::TokenType;
use regex::Regex;
use std::sync::OnceLock;

/// A single scan hit: position, classification and the exact substring
/// matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub kind: TokenType,
    pub value: String,
}

const SAFE_HOSTS: &[&str] = &["example.com", "github.com", "amazonaws.com"];
const EXCLUDED_IPS: &[&str] = &["127.0.0.1", "0.0.0.0", "255.255.255.255"];
const EXCLUDED_USERS: &[&str] = &["root"];
const ROOTED_PREFIXES: &[&str] = &["/home", "/var", "/etc", "/root", "/usr", "/tmp", "/opt"];

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alt = ROOTED_PREFIXES
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?:{alt})(?:/\S*)?")).expect("static path regex compiles")
    })
}

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b")
            .expect("static ipv4 regex compiles")
    })
}

fn hostname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[a-zA-Z0-9][a-zA-Z0-9-]*\.[a-zA-Z0-9][a-zA-Z0-9-]*\.[a-zA-Z]{2,}\b")
            .expect("static hostname regex compiles")
    })
}

fn kv_secret_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:password|passwd|secret|token|api_key|auth)\s*=\s*\S+")
            .expect("static kv regex compiles")
    })
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
            .expect("static email regex compiles")
    })
}

fn passwd_row_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([A-Za-z_][A-Za-z0-9_-]*):[^:\n]*:\d+:\d+:[^:\n]*:[^:\n]*:[^:\n]*$")
            .expect("static passwd-row regex compiles")
    })
}

fn tilde_user_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"~[a-zA-Z_][a-zA-Z0-9_-]*").expect("static tilde regex compiles"))
}

/// Scan `text` for sensitive values, returning deduplicated matches sorted
/// by position.
#[must_use]
pub fn scan(text: &str) -> Vec<Match> {
    let mut matches = Vec::new();

    for m in path_regex().find_iter(text) {
        matches.push(Match { start: m.start(), end: m.end(), kind: TokenType::Path, value: m.as_str().to_string() });
    }

    for m in ipv4_regex().find_iter(text) {
        let value = m.as_str();
        if EXCLUDED_IPS.contains(&value) {
            continue;
        }
        matches.push(Match { start: m.start(), end: m.end(), kind: TokenType::Ip, value: value.to_string() });
    }

    for m in hostname_regex().find_iter(text) {
        let value = m.as_str();
        if SAFE_HOSTS.iter().any(|safe| value == *safe || value.ends_with(&format!(".{safe}"))) {
            continue;
        }
        matches.push(Match { start: m.start(), end: m.end(), kind: TokenType::Host, value: value.to_string() });
    }

    for m in kv_secret_regex().find_iter(text) {
        matches.push(Match { start: m.start(), end: m.end(), kind: TokenType::Cred, value: m.as_str().to_string() });
    }

    for m in email_regex().find_iter(text) {
        matches.push(Match { start: m.start(), end: m.end(), kind: TokenType::Email, value: m.as_str().to_string() });
    }

    for caps in passwd_row_regex().captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        let user = caps.get(1).expect("group 1 present on match");
        if EXCLUDED_USERS.contains(&user.as_str()) {
            continue;
        }
        matches.push(Match {
            start: user.start(),
            end: user.end(),
            kind: TokenType::User,
            value: user.as_str().to_string(),
        });
        let _ = whole;
    }

    for m in tilde_user_regex().find_iter(text) {
        matches.push(Match { start: m.start(), end: m.end(), kind: TokenType::User, value: m.as_str().to_string() });
    }

    matches.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    matches.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.value == b.value);
    matches
}
