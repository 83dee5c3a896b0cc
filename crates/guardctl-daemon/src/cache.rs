//! Observation cache: crash-durable queue of unclassified evidence
//! (component K).

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single cached evidence blob awaiting classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedObservation {
    pub job_id: String,
    pub step: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub retry_count: u32,
}

/// Errors from the observation cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed cache entry at {path}: {source}")]
    Malformed { path: PathBuf, source: serde_json::Error },
    #[error("failed to serialise cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A directory-backed queue of [`CachedObservation`]s, one file per
/// observation, written atomically via a temp-file rename.
pub struct ObservationCache {
    root: PathBuf,
}

impl ObservationCache {
    /// Open (creating if absent) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn entry_path(&self, job_id: &str, step: &str) -> PathBuf {
        self.root.join(format!("{job_id}__{step}.json"))
    }

    /// Persist a new observation, or overwrite the retry-count of an
    /// existing one for the same `(job_id, step)`.
    pub fn put(&self, observation: &CachedObservation) -> Result<(), CacheError> {
        let path = self.entry_path(&observation.job_id, &observation.step);
        let tmp = path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        let bytes = serde_json::to_vec(observation)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove an observation once it has been successfully classified.
    pub fn remove(&self, job_id: &str, step: &str) -> Result<(), CacheError> {
        let path = self.entry_path(job_id, step);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List all cached observations currently on disk.
    pub fn list(&self) -> Result<Vec<CachedObservation>, CacheError> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let observation: CachedObservation = serde_json::from_slice(&bytes)
                .map_err(|source| CacheError::Malformed { path: path.clone(), source })?;
            out.push(observation);
        }
        out.sort_by(|a, b| (a.job_id.as_str(), a.step.as_str()).cmp(&(b.job_id.as_str(), b.step.as_str())));
        Ok(out)
    }

    /// Increment the retry count for an observation that failed
    /// classification again (e.g. leaked a raw sensitive value).
    pub fn bump_retry(&self, observation: &mut CachedObservation) -> Result<(), CacheError> {
        observation.retry_count += 1;
        self.put(observation)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(job: &str, step: &str) -> CachedObservation {
        CachedObservation {
            job_id: job.to_string(),
            step: step.to_string(),
            payload: serde_json::json!({"raw": "text"}),
            retry_count: 0,
        }
    }

    #[test]
    fn put_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::open(dir.path()).unwrap();
        cache.put(&obs("job-1", "scan")).unwrap();
        let listed = cache.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].job_id, "job-1");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::open(dir.path()).unwrap();
        cache.put(&obs("job-1", "scan")).unwrap();
        cache.remove("job-1", "scan").unwrap();
        cache.remove("job-1", "scan").unwrap();
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn bump_retry_increments_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::open(dir.path()).unwrap();
        let mut observation = obs("job-1", "scan");
        cache.put(&observation).unwrap();
        cache.bump_retry(&mut observation).unwrap();
        let listed = cache.list().unwrap();
        assert_eq!(listed[0].retry_count, 1);
    }

    #[test]
    fn no_leftover_tmp_file_after_put() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::open(dir.path()).unwrap();
        cache.put(&obs("job-1", "scan")).unwrap();
        let tmp_count = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().and_then(|e| e.to_str()) == Some("tmp"))
            .count();
        assert_eq!(tmp_count, 0);
    }
}
