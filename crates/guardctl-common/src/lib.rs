//! Shared error taxonomy, id validation and time helpers used across the
//! guardctl workspace.

pub mod error;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
