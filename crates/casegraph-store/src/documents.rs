//! Versioned document backends
//!
//! Committed entities live in JSON documents. Every write creates a new
//! version; nothing is overwritten in place, so rolling back an operation is
//! just removing the versions it wrote.
//!
//! Writers in different processes are serialized by [`WriterLock`], an
//! advisory lock on `<root>/.writers.lock`. Publishing a version is
//! no-clobber on its own: a version number can be claimed exactly once.
//!
//! # Layout (filesystem backend)
//!
//! ```text
//! <root>/
//! ├── .writers.lock
//! ├── classes/
//! │   ├── 00000001.json
//! │   └── 00000002.json
//! └── individuals/
//!     └── case-7/
//!         └── 00000001.json
//! ```

use crate::StoreError;
use casegraph_domain::CaseId;
use std::collections::BTreeMap;
use std::fmt;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

const WRITERS_LOCK: &str = ".writers.lock";
const CLASSES_DIR: &str = "classes";
const INDIVIDUALS_DIR: &str = "individuals";
const CASE_DIR_PREFIX: &str = "case-";
const VERSION_EXT: &str = "json";

/// Identifies one versioned document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKey {
    /// The shared committed-classes document
    Classes,
    /// The committed-individuals document of one case
    Individuals(CaseId),
}

impl DocumentKey {
    /// Relative directory of the document under a backend root
    fn relative_dir(&self) -> PathBuf {
        match self {
            DocumentKey::Classes => PathBuf::from(CLASSES_DIR),
            DocumentKey::Individuals(case_id) => {
                Path::new(INDIVIDUALS_DIR).join(format!("{}{}", CASE_DIR_PREFIX, case_id))
            }
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKey::Classes => f.write_str("classes"),
            DocumentKey::Individuals(case_id) => write!(f, "individuals/case-{}", case_id),
        }
    }
}

/// One stored version of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentVersion {
    /// Version number (starts at 1)
    pub version: u64,
    /// Serialized document
    pub bytes: Vec<u8>,
}

/// Exclusive right to write documents, held until dropped
///
/// The filesystem backend holds an OS file lock, so the exclusion spans
/// processes. In-memory backends are private to one process and hand out
/// a guard with no file behind it.
#[derive(Debug)]
pub struct WriterLock {
    _file: Option<File>,
}

impl WriterLock {
    /// A guard for a backend that no other process can reach
    pub fn in_process() -> Self {
        Self { _file: None }
    }
}

/// Storage for versioned documents
///
/// Implementations must make `write_version` atomic and no-clobber: a
/// version either exists completely or not at all, and an existing version
/// is never replaced.
pub trait DocumentBackend: Send + Sync {
    /// Latest version of a document, if any
    fn head(&self, key: &DocumentKey) -> Result<Option<DocumentVersion>, StoreError>;

    /// All version numbers of a document, ascending
    fn versions(&self, key: &DocumentKey) -> Result<Vec<u64>, StoreError>;

    /// Read a specific version
    fn read_version(&self, key: &DocumentKey, version: u64) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a new version; fails with `VersionConflict` if it already exists
    fn write_version(&self, key: &DocumentKey, version: u64, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove one version; returns `false` if it did not exist
    fn remove_version(&self, key: &DocumentKey, version: u64) -> Result<bool, StoreError>;

    /// Every document that has at least one version
    fn keys(&self) -> Result<Vec<DocumentKey>, StoreError>;

    /// Try to take the writer lock without waiting
    ///
    /// Returns `None` while another holder has it.
    fn try_lock_writers(&self) -> Result<Option<WriterLock>, StoreError>;
}

/// Distinguishes temp files of concurrent writers within one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn conflict(key: &DocumentKey, version: u64, actual: u64) -> StoreError {
    StoreError::VersionConflict {
        document: key.to_string(),
        expected: version.saturating_sub(1),
        actual,
    }
}

/// Filesystem backend: one directory per document, one file per version
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the backend
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, key: &DocumentKey) -> PathBuf {
        self.root.join(key.relative_dir())
    }

    fn version_path(&self, key: &DocumentKey, version: u64) -> PathBuf {
        self.dir(key).join(format!("{:08}.{}", version, VERSION_EXT))
    }

    fn parse_version(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != VERSION_EXT {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }

    /// Flush directory metadata so a rename survives a crash
    ///
    /// Not every platform can open a directory for syncing; failures are logged only.
    fn sync_dir(dir: &Path) {
        match File::open(dir).and_then(|handle| handle.sync_all()) {
            Ok(()) => {}
            Err(e) => tracing::debug!("Directory sync skipped for {}: {}", dir.display(), e),
        }
    }
}

impl DocumentBackend for FsBackend {
    fn head(&self, key: &DocumentKey) -> Result<Option<DocumentVersion>, StoreError> {
        let Some(version) = self.versions(key)?.last().copied() else {
            return Ok(None);
        };
        let bytes = fs::read(self.version_path(key, version))?;
        Ok(Some(DocumentVersion { version, bytes }))
    }

    fn versions(&self, key: &DocumentKey) -> Result<Vec<u64>, StoreError> {
        let dir = self.dir(key);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if let Some(version) = Self::parse_version(&path) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn read_version(&self, key: &DocumentKey, version: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.version_path(key, version);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    fn write_version(&self, key: &DocumentKey, version: u64, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = self.dir(key);
        fs::create_dir_all(&dir)?;

        let target = self.version_path(key, version);
        let temp = dir.join(format!(
            ".{:08}.{}.{}.tmp",
            version,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        // Readers never see a partial version: the bytes are durable before
        // the version name exists
        let written = File::create(&temp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        // hard_link fails if the target exists, unlike rename
        let published = fs::hard_link(&temp, &target);
        let _ = fs::remove_file(&temp);
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let actual = self.versions(key)?.last().copied().unwrap_or(version);
                return Err(conflict(key, version, actual));
            }
            Err(e) => return Err(e.into()),
        }
        Self::sync_dir(&dir);

        Ok(())
    }

    fn remove_version(&self, key: &DocumentKey, version: u64) -> Result<bool, StoreError> {
        match fs::remove_file(self.version_path(key, version)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let dir = self.dir(key);
        if self.versions(key)?.is_empty() {
            // Stray temp files of a crashed writer keep the directory alive
            let _ = fs::remove_dir(&dir);
        }
        Self::sync_dir(&dir);
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<DocumentKey>, StoreError> {
        let mut keys = Vec::new();

        if !self.versions(&DocumentKey::Classes)?.is_empty() {
            keys.push(DocumentKey::Classes);
        }

        let individuals = self.root.join(INDIVIDUALS_DIR);
        if individuals.exists() {
            for entry in fs::read_dir(&individuals)? {
                let entry = entry?;
                let name = entry.file_name();
                let Some(case) = name
                    .to_str()
                    .and_then(|n| n.strip_prefix(CASE_DIR_PREFIX))
                    .and_then(|n| n.parse::<u64>().ok())
                else {
                    continue;
                };

                let key = DocumentKey::Individuals(CaseId::new(case));
                if !self.versions(&key)?.is_empty() {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn try_lock_writers(&self) -> Result<Option<WriterLock>, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.root.join(WRITERS_LOCK))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(WriterLock { _file: Some(file) })),
            Err(e)
                if e.kind() == ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Injected failure behaviour for [`MemoryBackend`]
#[derive(Debug, Default)]
struct FailurePlan {
    /// Writes allowed before every further write fails permanently
    writes_before_failure: Option<usize>,
    /// Upcoming writes that fail with a transient error
    transient_failures: usize,
}

/// In-memory backend, with failure injection for exercising rollback paths
#[derive(Default)]
pub struct MemoryBackend {
    documents: RwLock<BTreeMap<DocumentKey, BTreeMap<u64, Vec<u8>>>>,
    failures: Mutex<FailurePlan>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more writes succeed, then fail every write with an I/O error
    pub fn fail_writes_after(&self, n: usize) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.writes_before_failure = Some(n);
        }
    }

    /// Fail the next `n` writes with a transient (interrupted) I/O error
    pub fn fail_next_writes_transiently(&self, n: usize) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.transient_failures = n;
        }
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        if let Ok(mut plan) = self.failures.lock() {
            *plan = FailurePlan::default();
        }
    }

    fn check_injected_failure(&self) -> Result<(), StoreError> {
        let mut plan = self
            .failures
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;

        if plan.transient_failures > 0 {
            plan.transient_failures -= 1;
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "injected transient write failure",
            )));
        }

        match plan.writes_before_failure {
            Some(0) => Err(StoreError::Io(std::io::Error::other("injected write failure"))),
            Some(n) => {
                plan.writes_before_failure = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn read_docs(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<DocumentKey, BTreeMap<u64, Vec<u8>>>>, StoreError> {
        self.documents
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_docs(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentKey, BTreeMap<u64, Vec<u8>>>>, StoreError> {
        self.documents
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl DocumentBackend for MemoryBackend {
    fn head(&self, key: &DocumentKey) -> Result<Option<DocumentVersion>, StoreError> {
        let docs = self.read_docs()?;
        Ok(docs.get(key).and_then(|versions| {
            versions.iter().next_back().map(|(version, bytes)| DocumentVersion {
                version: *version,
                bytes: bytes.clone(),
            })
        }))
    }

    fn versions(&self, key: &DocumentKey) -> Result<Vec<u64>, StoreError> {
        let docs = self.read_docs()?;
        Ok(docs
            .get(key)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }

    fn read_version(&self, key: &DocumentKey, version: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let docs = self.read_docs()?;
        Ok(docs.get(key).and_then(|versions| versions.get(&version).cloned()))
    }

    fn write_version(&self, key: &DocumentKey, version: u64, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_injected_failure()?;

        let mut docs = self.write_docs()?;
        let versions = docs.entry(*key).or_default();
        if versions.contains_key(&version) {
            let actual = versions.keys().next_back().copied().unwrap_or(version);
            return Err(conflict(key, version, actual));
        }
        versions.insert(version, bytes.to_vec());
        Ok(())
    }

    fn remove_version(&self, key: &DocumentKey, version: u64) -> Result<bool, StoreError> {
        let mut docs = self.write_docs()?;
        let Some(versions) = docs.get_mut(key) else {
            return Ok(false);
        };

        let removed = versions.remove(&version).is_some();
        if versions.is_empty() {
            docs.remove(key);
        }
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<DocumentKey>, StoreError> {
        let docs = self.read_docs()?;
        Ok(docs.keys().copied().collect())
    }

    fn try_lock_writers(&self) -> Result<Option<WriterLock>, StoreError> {
        Ok(Some(WriterLock::in_process()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_backend(backend: &dyn DocumentBackend) {
        let key = DocumentKey::Classes;
        assert!(backend.head(&key).unwrap().is_none());

        backend.write_version(&key, 1, b"one").unwrap();
        backend.write_version(&key, 2, b"two").unwrap();

        let head = backend.head(&key).unwrap().unwrap();
        assert_eq!(head.version, 2);
        assert_eq!(head.bytes, b"two");
        assert_eq!(backend.versions(&key).unwrap(), vec![1, 2]);
        assert_eq!(backend.read_version(&key, 1).unwrap().unwrap(), b"one");

        let conflict = backend.write_version(&key, 2, b"again");
        assert!(matches!(conflict, Err(StoreError::VersionConflict { .. })));

        // The losing write left the winner's bytes alone
        assert_eq!(backend.read_version(&key, 2).unwrap().unwrap(), b"two");

        assert!(backend.remove_version(&key, 2).unwrap());
        assert!(!backend.remove_version(&key, 2).unwrap());
        assert_eq!(backend.head(&key).unwrap().unwrap().bytes, b"one");

        let individuals = DocumentKey::Individuals(CaseId::new(7));
        backend.write_version(&individuals, 1, b"[]").unwrap();
        assert_eq!(backend.keys().unwrap(), vec![DocumentKey::Classes, individuals]);

        assert!(backend.remove_version(&individuals, 1).unwrap());
        assert_eq!(backend.keys().unwrap(), vec![DocumentKey::Classes]);
    }

    #[test]
    fn test_memory_backend() {
        exercise_backend(&MemoryBackend::new());
    }

    #[test]
    fn test_fs_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();
        exercise_backend(&backend);

        // Version files are plain, diffable files
        assert!(dir.path().join("classes").join("00000001.json").exists());

        // No temp files are left behind, even by the conflicting write
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("classes"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
    }

    #[test]
    fn test_fs_writer_lock_excludes_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let first = FsBackend::new(dir.path()).unwrap();
        let second = FsBackend::new(dir.path()).unwrap();

        let held = first.try_lock_writers().unwrap();
        assert!(held.is_some());
        assert!(second.try_lock_writers().unwrap().is_none());

        drop(held);
        assert!(second.try_lock_writers().unwrap().is_some());
    }

    #[test]
    fn test_injected_failures() {
        let backend = MemoryBackend::new();
        let key = DocumentKey::Classes;

        backend.fail_next_writes_transiently(1);
        let err = backend.write_version(&key, 1, b"x").unwrap_err();
        assert!(err.is_transient());
        backend.write_version(&key, 1, b"x").unwrap();

        backend.fail_writes_after(1);
        backend.write_version(&key, 2, b"y").unwrap();
        let err = backend.write_version(&key, 3, b"z").unwrap_err();
        assert!(!err.is_transient());

        backend.clear_failures();
        backend.write_version(&key, 3, b"z").unwrap();
    }

    #[test]
    fn test_document_key_display() {
        assert_eq!(DocumentKey::Classes.to_string(), "classes");
        assert_eq!(DocumentKey::Individuals(CaseId::new(9)).to_string(), "individuals/case-9");
    }
}
