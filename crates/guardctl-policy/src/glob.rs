//! Shared glob-to-regex conversion: `**` → `.*`, remaining `*` →
//! `[^/.]*` (one path or purpose segment), regex metacharacters escaped,
//! matched case-insensitively and anchored to the full string.
//!
//! Used by rule `purpose`/`resource_pattern` matching (component D), which
//! needs a full-string match rather than the denylist's substring search.
//! `purpose` values are dot-separated (`payments.charge`), so `.` is a
//! segment boundary here alongside `/`.

use regex::Regex;

/// Compile `pattern` into a fully-anchored, case-insensitive regex.
/// Returns `None` if the pattern fails to compile; callers must treat a
/// `None` as "never matches", never as "matches everything".
#[must_use]
pub fn compile_anchored(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '*' {
            if i + 1 < chars.len() && chars[i + 1] == '*' {
                out.push_str(".*");
                i += 2;
            } else {
                out.push_str("[^/.]*");
                i += 1;
            }
        } else {
            out.push_str(&regex::escape(&chars[i].to_string()));
            i += 1;
        }
    }
    out.push('$');
    Regex::new(&format!("(?i){out}")).ok()
}

/// Full-string glob match, dropping an uncompilable pattern to
/// "never matches" rather than "matches everything".
#[must_use]
pub fn full_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }
    compile_anchored(pattern).is_some_and(|re| re.is_match(value))
}
