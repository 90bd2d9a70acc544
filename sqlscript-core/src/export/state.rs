//! Run-scoped memo of cleared export directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

/// What [`ExportDestinationState::clear_once`] did for a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// First sighting; the directory was cleared.
    Cleared { removed: usize },
    /// First sighting; clearing failed for at least one file.
    Failed { removed: usize },
    /// Seen before in this run; nothing was touched.
    AlreadyHandled { succeeded: bool },
}

/// Which export directories have been cleared in this run.
///
/// Keys are absolute directory paths. Each directory owns a cell holding
/// whether its clear succeeded; the map lock is only taken to find the cell.
/// Exporters racing on one fresh directory wait on its cell and clear it
/// once, while clears of different directories run side by side.
#[derive(Debug, Default)]
pub struct ExportDestinationState {
    cleared: Mutex<HashMap<PathBuf, Arc<OnceCell<bool>>>>,
}

impl ExportDestinationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the files directly inside `dir` the first time it is seen.
    ///
    /// Sub-directories are left alone. A failed first attempt is remembered
    /// and never retried.
    pub async fn clear_once(&self, dir: &Path) -> ClearOutcome {
        let key = memo_key(dir);
        let cell = self.cell(key.clone()).await;

        let mut removed = None;
        let slot = &mut removed;
        let succeeded = *cell
            .get_or_init(move || async move {
                let (count, succeeded) = clear_files(&key).await;
                *slot = Some(count);
                succeeded
            })
            .await;

        match removed {
            Some(removed) if succeeded => ClearOutcome::Cleared { removed },
            Some(removed) => ClearOutcome::Failed { removed },
            None => ClearOutcome::AlreadyHandled { succeeded },
        }
    }

    /// Recorded outcome for `dir`, if its clear has finished.
    pub async fn outcome(&self, dir: &Path) -> Option<bool> {
        let cell = self.cleared.lock().await.get(&memo_key(dir)).cloned()?;
        cell.get().copied()
    }

    async fn cell(&self, key: PathBuf) -> Arc<OnceCell<bool>> {
        let mut cleared = self.cleared.lock().await;
        Arc::clone(cleared.entry(key).or_default())
    }

    /// Number of directories handled so far.
    pub async fn len(&self) -> usize {
        self.cleared.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cleared.lock().await.is_empty()
    }
}

fn memo_key(dir: &Path) -> PathBuf {
    std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Deletes regular files in `dir`, continuing past individual failures.
async fn clear_files(dir: &Path) -> (usize, bool) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list {} for clearing: {}", dir.display(), e);
            return (0, false);
        }
    };

    let mut removed = 0usize;
    let mut succeeded = true;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", dir.display(), e);
                succeeded = false;
                break;
            }
        };

        let is_dir = match entry.file_type().await {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                warn!("Failed to inspect {}: {}", entry.path().display(), e);
                succeeded = false;
                continue;
            }
        };
        if is_dir {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed = removed.saturating_add(1),
            Err(e) => {
                warn!("Failed to delete {}: {}", entry.path().display(), e);
                succeeded = false;
            }
        }
    }

    debug!("Cleared {} file(s) from {}", removed, dir.display());
    (removed, succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clear_once_removes_files_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("old.sql"), "stale").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "stale").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested").join("keep.sql"), "keep").unwrap();

        let state = ExportDestinationState::new();
        assert_eq!(
            state.clear_once(temp.path()).await,
            ClearOutcome::Cleared { removed: 2 }
        );
        assert!(!temp.path().join("old.sql").exists());
        assert!(temp.path().join("nested").join("keep.sql").exists());
        assert_eq!(state.outcome(temp.path()).await, Some(true));
    }

    #[tokio::test]
    async fn test_second_call_does_not_clear() {
        let temp = TempDir::new().unwrap();
        let state = ExportDestinationState::new();
        state.clear_once(temp.path()).await;

        std::fs::write(temp.path().join("new.sql"), "fresh").unwrap();
        assert_eq!(
            state.clear_once(temp.path()).await,
            ClearOutcome::AlreadyHandled { succeeded: true }
        );
        assert!(temp.path().join("new.sql").exists());
    }

    #[tokio::test]
    async fn test_failed_clear_is_remembered() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let state = ExportDestinationState::new();

        assert_eq!(state.clear_once(&missing).await, ClearOutcome::Failed { removed: 0 });
        assert_eq!(
            state.clear_once(&missing).await,
            ClearOutcome::AlreadyHandled { succeeded: false }
        );
        assert_eq!(state.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_writes_clear_once() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("old.sql"), "stale").unwrap();
        let state = Arc::new(ExportDestinationState::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            let dir = temp.path().to_path_buf();
            handles.push(tokio::spawn(async move { state.clear_once(&dir).await }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }
        let first_sightings = outcomes
            .iter()
            .filter(|o| matches!(o, ClearOutcome::Cleared { .. }))
            .count();
        assert_eq!(first_sightings, 1);
        assert_eq!(state.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_in_flight_does_not_block_other_directories() {
        let slow = TempDir::new().unwrap();
        let fast = TempDir::new().unwrap();
        std::fs::write(fast.path().join("old.sql"), "stale").unwrap();
        let state = Arc::new(ExportDestinationState::new());

        // Hold the first directory's cell mid-initialisation
        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let cell = state.cell(memo_key(slow.path())).await;
        let in_flight = tokio::spawn(async move {
            *cell
                .get_or_init(|| async move {
                    let _ = wait.await;
                    true
                })
                .await
        });
        tokio::task::yield_now().await;

        let outcome = tokio::time::timeout(Duration::from_secs(5), state.clear_once(fast.path()))
            .await
            .unwrap();
        assert_eq!(outcome, ClearOutcome::Cleared { removed: 1 });
        assert_eq!(state.outcome(slow.path()).await, None);

        release.send(()).unwrap();
        assert!(in_flight.await.unwrap());
        assert_eq!(
            state.clear_once(slow.path()).await,
            ClearOutcome::AlreadyHandled { succeeded: true }
        );
    }
}
