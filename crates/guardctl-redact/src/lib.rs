//! Token-map based redaction pipeline: scan, redact, leak-check, detoken
//! (component F).

pub mod pipeline;
pub mod scan;
pub mod token_map;

pub use pipeline::{detoken, leak_check, redact, resolve_mode, ModeOverride, RedactError, RedactionMode};
pub use scan::{scan as scan_text, Match};
pub use token_map::{TokenMap, TokenType};
