//! Action/Decision model, denylist, profile composition, the policy
//! evaluator, and the approval store — components A through E.

pub mod approval;
pub mod denylist;
pub mod evaluator;
pub mod glob;
pub mod model;
pub mod profile;
pub mod rule;

pub use approval::{ApprovalRecord, ApprovalStatus, ApprovalStore};
pub use denylist::{Denylist, DenylistSpec};
pub use evaluator::{evaluate, policy_hash, Budget, EvaluatorConfig};
pub use model::{Action, Decision, Metadata, PolicyResult, Sensitivity, Tier, TraceState};
pub use profile::{compose, AuthorityBoundary, Profile};
pub use rule::{Policy, Rule};
