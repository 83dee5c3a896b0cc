//! Inbox watcher: a single `notify` watcher feeding a bounded queue
//! consumed by a fixed worker pool, debounced per path via one shared
//! timer (never one timer per file — burst arrivals would exhaust the
//! pool).

use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_QUEUE_DEPTH: usize = 200;
pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to start filesystem watcher: {0}")]
    Notify(#[from] notify::Error),
}

/// Debounce loop: a single task owns the pending-path deadlines and
/// wakes once on whichever deadline is soonest, rather than spawning a
/// sleeper per event. A burst of events for the same path just bumps
/// its entry in `pending`; only the last one within the window survives
/// to dispatch.
async fn debounce_loop(
    mut incoming: mpsc::Receiver<PathBuf>,
    dispatch_tx: mpsc::Sender<PathBuf>,
    cancel: CancellationToken,
) {
    let mut pending: HashMap<PathBuf, tokio::time::Instant> = HashMap::new();
    loop {
        let next_deadline = pending.values().min().copied();
        let timer = async {
            match next_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            () = timer => {
                let now = tokio::time::Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    let _ = dispatch_tx.send(path).await;
                }
            }
            received = incoming.recv() => {
                match received {
                    Some(path) => {
                        pending.insert(path, tokio::time::Instant::now() + DEBOUNCE_INTERVAL);
                    }
                    None => break,
                }
            }
        }
    }
}

/// Filters `notify` events down to `create`-shaped events on
/// `*.json` files that are not still being written (`.tmp`).
fn is_admissible_create(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && path.extension().and_then(|e| e.to_str()) == Some("json")
        && !path.to_string_lossy().ends_with(".tmp")
}

/// Start watching `inbox_dir`, sending debounced, admissible file
/// names (not full paths) on an internal channel to `dispatch`, a
/// fixed-size pool of `worker_count` concurrent handlers. Returns once
/// `cancel` is triggered.
pub async fn run<F, Fut>(
    inbox_dir: PathBuf,
    worker_count: usize,
    queue_depth: usize,
    cancel: CancellationToken,
    dispatch: F,
) -> Result<(), WatcherError>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let dispatch = Arc::new(dispatch);
    let (raw_tx, mut raw_rx) = mpsc::channel::<notify::Result<Event>>(queue_depth);
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = raw_tx.blocking_send(res);
    })?;
    watcher.watch(&inbox_dir, RecursiveMode::NonRecursive)?;

    let (event_tx, event_rx) = mpsc::channel::<PathBuf>(queue_depth);
    let (path_tx, path_rx) = mpsc::channel::<PathBuf>(queue_depth);
    let debounce = tokio::spawn(debounce_loop(event_rx, path_tx.clone(), cancel.clone()));

    let (work_tx, work_rx) = mpsc::channel::<String>(queue_depth);
    let work_rx = Arc::new(Mutex::new(work_rx));

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let work_rx = Arc::clone(&work_rx);
        let dispatch = Arc::clone(&dispatch);
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => None,
                    item = async { work_rx.lock().await.recv().await } => item,
                };
                match next {
                    Some(name) => dispatch(name).await,
                    None => break,
                }
            }
        }));
    }

    let fan_in = tokio::spawn(fan_in_loop(path_rx, work_tx));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = raw_rx.recv() => {
                match received {
                    Some(Ok(event)) => {
                        for path in event.paths.clone() {
                            if is_admissible_create(&event, &path) {
                                let _ = event_tx.send(path).await;
                            }
                        }
                    }
                    Some(Err(e)) => tracing::warn!(error = %e, "watcher event error"),
                    None => break,
                }
            }
        }
    }

    drop(event_tx);
    drop(path_tx);
    let _ = debounce.await;
    let _ = fan_in.await;
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}

async fn fan_in_loop(mut path_rx: mpsc::Receiver<PathBuf>, work_tx: mpsc::Sender<String>) {
    while let Some(path) = path_rx.recv().await {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let _ = work_tx.send(name.to_string()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_plain_json_and_rejects_tmp() {
        let event = Event::new(EventKind::Create(notify::event::CreateKind::File));
        assert!(is_admissible_create(&event, Path::new("/inbox/a.json")));
        assert!(!is_admissible_create(&event, Path::new("/inbox/a.json.tmp")));
        assert!(!is_admissible_create(&event, Path::new("/inbox/a.txt")));
    }

    #[tokio::test]
    async fn dispatches_a_single_admitted_file() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().to_path_buf();
        let cancel = CancellationToken::new();
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let dispatched_clone = Arc::clone(&dispatched);

        let cancel_for_run = cancel.clone();
        let handle = tokio::spawn(async move {
            run(inbox, 2, 20, cancel_for_run, move |name| {
                let dispatched = Arc::clone(&dispatched_clone);
                async move {
                    dispatched.lock().await.push(name);
                }
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(dir.path().join("job-1.json"), b"{}").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        let _ = handle.await;

        let seen = dispatched.lock().await;
        assert!(seen.contains(&"job-1.json".to_string()));
    }
}
