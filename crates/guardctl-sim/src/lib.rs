//! Audit-log replay/diff simulator and scenario certification suite
//! runner — components O and P.

pub mod cert;
pub mod replay;

pub use cert::{CertError, CertReport, Scenario, ScenarioResult, Suite};
pub use replay::{replay, Divergence, RecordedEntry, ReplayReport, ReplaySummary};
