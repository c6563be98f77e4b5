use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report file not found")]
    NotFound,
    #[error("report read failed: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(err)
        }
    }
}

/// Blocking access to the report file. Call through the worker pool.
pub trait ReportStore: Send + Sync + 'static {
    fn stat(&self) -> Result<SystemTime, StoreError>;
    fn read(&self) -> Result<String, StoreError>;
}

pub struct FsReportStore {
    path: PathBuf,
}

impl FsReportStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportStore for FsReportStore {
    fn stat(&self) -> Result<SystemTime, StoreError> {
        Ok(std::fs::metadata(&self.path)?.modified()?)
    }

    fn read(&self) -> Result<String, StoreError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

struct CacheEntry {
    modified: SystemTime,
    content: String,
}

/// Modification-time-gated cache in front of the report store. Content is
/// re-read iff the store's mtime differs from the cached one; failures
/// propagate to the caller without mutating the cached entry.
pub struct ReportCache<S> {
    store: S,
    entry: Mutex<Option<CacheEntry>>,
}

impl<S: ReportStore> ReportCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            entry: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Result<String, StoreError> {
        let modified = self.store.stat()?;
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = entry.as_ref() {
            if cached.modified == modified {
                return Ok(cached.content.clone());
            }
        }

        debug!("report changed on disk, re-reading");
        let content = self.store.read()?;
        *entry = Some(CacheEntry {
            modified,
            content: content.clone(),
        });
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    use assert_matches::assert_matches;

    use super::*;

    struct CountingStore {
        modified: Mutex<SystemTime>,
        content: Mutex<Result<String, ()>>,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn new(content: &str) -> Self {
            Self {
                modified: Mutex::new(UNIX_EPOCH + Duration::from_secs(100)),
                content: Mutex::new(Ok(content.to_string())),
                reads: AtomicUsize::new(0),
            }
        }

        fn touch(&self, content: &str) {
            let mut modified = self.modified.lock().expect("modified lock");
            *modified += Duration::from_secs(1);
            *self.content.lock().expect("content lock") = Ok(content.to_string());
        }

        fn fail_reads(&self) {
            *self.content.lock().expect("content lock") = Err(());
        }
    }

    impl ReportStore for &'static CountingStore {
        fn stat(&self) -> Result<SystemTime, StoreError> {
            Ok(*self.modified.lock().expect("modified lock"))
        }

        fn read(&self) -> Result<String, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.content
                .lock()
                .expect("content lock")
                .clone()
                .map_err(|()| StoreError::Io(std::io::Error::other("injected failure")))
        }
    }

    fn leaked_store(content: &str) -> &'static CountingStore {
        Box::leak(Box::new(CountingStore::new(content)))
    }

    #[test]
    fn unchanged_mtime_reads_the_store_once() {
        let store = leaked_store("# report");
        let cache = ReportCache::new(store);

        assert_eq!(cache.get().expect("first get"), "# report");
        assert_eq!(cache.get().expect("second get"), "# report");
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_mtime_triggers_a_reread() {
        let store = leaked_store("old");
        let cache = ReportCache::new(store);

        assert_eq!(cache.get().expect("first get"), "old");
        store.touch("new");
        assert_eq!(cache.get().expect("after touch"), "new");
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn read_failure_leaves_the_cache_intact() {
        let store = leaked_store("stable");
        let cache = ReportCache::new(store);
        assert_eq!(cache.get().expect("warm the cache"), "stable");

        store.touch("poisoned");
        store.fail_reads();
        assert_matches!(cache.get(), Err(StoreError::Io(_)));

        // The old entry survived: once the store recovers at the old mtime
        // we still serve without a reread.
        *store.modified.lock().expect("modified lock") = UNIX_EPOCH + Duration::from_secs(100);
        assert_eq!(cache.get().expect("cached entry"), "stable");
    }

    #[test]
    fn missing_file_surfaces_not_found() {
        let cache = ReportCache::new(FsReportStore::new(PathBuf::from(
            "/nonexistent/paneboard-report.md",
        )));
        assert_matches!(cache.get(), Err(StoreError::NotFound));
    }
}
