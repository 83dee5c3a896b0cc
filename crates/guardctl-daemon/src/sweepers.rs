//! Background sweepers: work-order expiration and cached-evidence
//! retry (spec §4.L).

use crate::cache::{CachedObservation, ObservationCache};
use crate::gateway::Gateway;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const EXPIRATION_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const CACHE_RETRY_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Outcome of attempting to classify one cached observation.
pub enum ClassifyOutcome {
    /// Classification succeeded; the caller should build and enqueue a
    /// work order from the returned observation.
    Classified(CachedObservation),
    /// The response leaked a raw sensitive value; keep the entry
    /// cached with its retry count bumped.
    Leaked,
}

/// The LLM classifier is an external collaborator (see Non-goals); the
/// daemon only consumes this narrow interface. Blocking is expected to
/// happen on a dedicated executor thread the caller manages — kept
/// synchronous here to avoid pulling in an async-trait dependency for
/// a single boundary method.
pub trait Classifier: Send + Sync {
    fn classify(&self, observation: &CachedObservation) -> ClassifyOutcome;
}

/// Runs the expiration sweeper every [`EXPIRATION_INTERVAL`] until
/// `cancel` fires.
pub async fn run_expiration_sweeper(gateway: &Gateway, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(EXPIRATION_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match gateway.sweep_expired() {
                    Ok(expired) if !expired.is_empty() => {
                        tracing::info!(count = expired.len(), "expired pending work orders");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "expiration sweep failed"),
                }
            }
        }
    }
}

/// Runs the cache-retry sweeper every [`CACHE_RETRY_INTERVAL`] when an
/// LLM endpoint is configured, re-running `classifier` against each
/// cached evidence blob.
pub async fn run_cache_retry_sweeper(
    cache: &ObservationCache,
    classifier: &dyn Classifier,
    cancel: CancellationToken,
    mut on_classified: impl FnMut(CachedObservation),
) {
    let mut ticker = tokio::time::interval(CACHE_RETRY_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let entries = match cache.list() {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to list observation cache");
                        continue;
                    }
                };
                for mut observation in entries {
                    match classifier.classify(&observation) {
                        ClassifyOutcome::Classified(result) => {
                            if let Err(e) = cache.remove(&result.job_id, &result.step) {
                                tracing::warn!(error = %e, "failed to evict classified observation");
                            }
                            on_classified(result);
                        }
                        ClassifyOutcome::Leaked => {
                            if let Err(e) = cache.bump_retry(&mut observation) {
                                tracing::warn!(error = %e, "failed to persist retry count");
                            }
                        }
                    }
                }
            }
        }
    }
}
