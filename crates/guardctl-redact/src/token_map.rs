//! Bidirectional `value ↔ <<TYPE_N>>` table for a single job (component F).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Recognised token types, matching the `<<TYPE_N>>` format in spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Path,
    Ip,
    Host,
    Cred,
    Email,
    User,
    Literal,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Path => "PATH",
            TokenType::Ip => "IP",
            TokenType::Host => "HOST",
            TokenType::Cred => "CRED",
            TokenType::Email => "EMAIL",
            TokenType::User => "USER",
            TokenType::Literal => "LITERAL",
        };
        f.write_str(s)
    }
}

/// A bidirectional, idempotent `value <-> token` table.
///
/// Invariants (spec §3):
/// - `token(type, value)` is idempotent: the same value always yields the
///   same token.
/// - Tokens are unique: distinct values map to distinct tokens.
/// - On deserialization, per-type counters are reconstructed so that new
///   allocations never collide with an existing token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenMap {
    value_to_token: HashMap<String, String>,
    token_to_value: HashMap<String, String>,
    #[serde(default)]
    counters: HashMap<TokenTypeKey, u64>,
}

/// `HashMap` keys must implement `Eq + Hash`; `serde` derives those for
/// `TokenType` already, so this is a thin string-keyed mirror used only at
/// the serialization boundary to keep the map's JSON shape simple.
type TokenTypeKey = String;

impl TokenMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate or reuse a token for `value` under `token_type`.
    pub fn token(&mut self, token_type: TokenType, value: &str) -> String {
        if let Some(existing) = self.value_to_token.get(value) {
            return existing.clone();
        }
        let key = token_type.to_string();
        let counter = self.counters.entry(key.clone()).or_insert(0);
        *counter += 1;
        let token = format!("<<{key}_{counter}>>");
        self.value_to_token.insert(value.to_string(), token.clone());
        self.token_to_value.insert(token.clone(), value.to_string());
        token
    }

    /// Look up the original value for a token, if any.
    #[must_use]
    pub fn value_of(&self, token: &str) -> Option<&str> {
        self.token_to_value.get(token).map(String::as_str)
    }

    /// All distinct original values currently tracked, used by the
    /// leak-check stage.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.value_to_token.keys().map(String::as_str)
    }

    /// All `(token, value)` pairs, used by detokenisation.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.token_to_value
            .iter()
            .map(|(t, v)| (t.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.value_to_token.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value_to_token.is_empty()
    }
}
