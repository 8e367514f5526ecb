//! Durable snapshot persistence.
//!
//! The whole [`BusinessSnapshot`] lives under one versioned key. Saves are
//! all-or-nothing: the new value is written beside the old one and swapped
//! in, so a failed save leaves the previous snapshot readable. Loads never
//! fail; missing or unreadable data degrades to the fresh-install default.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ginvoice_core::BusinessSnapshot;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Key the web client uses for its cached state.
pub const DEFAULT_STATE_KEY: &str = "ginvoice_v1_state";

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// Stored bytes exist but are not a snapshot.
    #[error("stored snapshot in {origin} is corrupt: {source}")]
    Corrupt {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the device's snapshot.
pub trait LocalStore: Send + Sync {
    /// Read the stored snapshot; `Ok(None)` when nothing has been stored.
    fn read(
        &self,
    ) -> impl Future<Output = Result<Option<BusinessSnapshot>, StorageError>> + Send;

    /// Replace the stored snapshot.
    fn save(
        &self,
        snapshot: &BusinessSnapshot,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Remove the stored snapshot (logout / reset).
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Read the snapshot, or the default state if none is usable.
    fn load(&self) -> impl Future<Output = BusinessSnapshot> + Send {
        async move {
            match self.read().await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    debug!("no stored snapshot, starting fresh");
                    BusinessSnapshot::default()
                }
                Err(e) => {
                    warn!(error = %e, "stored snapshot unusable, starting fresh");
                    BusinessSnapshot::default()
                }
            }
        }
    }
}

fn decode(bytes: &[u8], origin: &str) -> Result<BusinessSnapshot, StorageError> {
    serde_json::from_slice(bytes).map_err(|source| StorageError::Corrupt {
        origin: origin.to_string(),
        source,
    })
}

/// Snapshot stored as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    key: String,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to a temporary file in `dir`, flushed but not yet visible.
fn stage(dir: &Path, bytes: &[u8]) -> Result<tempfile::NamedTempFile, StorageError> {
    std::fs::create_dir_all(dir).map_err(|source| io_err(dir, source))?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|source| io_err(dir, source))?;
    temp.write_all(bytes)
        .map_err(|source| io_err(temp.path(), source))?;
    temp.as_file()
        .sync_all()
        .map_err(|source| io_err(temp.path(), source))?;
    Ok(temp)
}

pub(crate) fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    stage(dir, bytes)?
        .persist(path)
        .map_err(|e| io_err(path, e.error))?;
    Ok(())
}

impl LocalStore for FileStore {
    #[instrument(skip(self), fields(path = %self.path().display()))]
    async fn read(&self) -> Result<Option<BusinessSnapshot>, StorageError> {
        let path = self.path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&bytes, &self.key).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_err(&path, source)),
        }
    }

    #[instrument(skip(self, snapshot), fields(path = %self.path().display()))]
    async fn save(&self, snapshot: &BusinessSnapshot) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let dir = self.dir.clone();
        let path = self.path();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))??;
        debug!("snapshot saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let path = self.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&path, source)),
        }
    }
}

/// In-process store.
///
/// Keeps the serialized JSON so it behaves like durable storage (corrupt
/// payloads, failed writes) without touching disk. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    raw: Mutex<Option<String>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw stored text, exactly as another client left it.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        *store.lock_raw() = Some(raw.into());
        store
    }

    /// Seed with a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Encode` if the snapshot cannot be serialized.
    pub fn with_snapshot(snapshot: &BusinessSnapshot) -> Result<Self, StorageError> {
        Ok(Self::with_raw(serde_json::to_string(snapshot)?))
    }

    /// Make subsequent saves fail with `StorageError::Unavailable`.
    pub fn fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Stored text, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.lock_raw().clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn saves(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    fn lock_raw(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    async fn read(&self) -> Result<Option<BusinessSnapshot>, StorageError> {
        self.raw()
            .map(|raw| decode(raw.as_bytes(), "memory"))
            .transpose()
    }

    async fn save(&self, snapshot: &BusinessSnapshot) -> Result<(), StorageError> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store rejecting writes".into()));
        }
        let raw = serde_json::to_string(snapshot)?;
        *self.lock_raw() = Some(raw);
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.lock_raw() = None;
        Ok(())
    }
}

/// Session token remembered between runs.
///
/// Stored as plain text beside the snapshot. Temporary files are created
/// owner-only, so the persisted file is too.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the remembered token; `Ok(None)` when signed out.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read.
    pub async fn load(&self) -> Result<Option<SecretString>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| SecretString::from(token.to_string())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_err(&self.path, source)),
        }
    }

    /// Remember `token`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written.
    pub async fn save(&self, token: &SecretString) -> Result<(), StorageError> {
        let bytes = token.expose_secret().as_bytes().to_vec();
        let path = self.path.clone();
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }

    /// Forget the token. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&self.path, source)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ginvoice_core::BusinessProfile;

    use super::*;

    fn registered(name: &str) -> BusinessSnapshot {
        BusinessSnapshot {
            business: BusinessProfile::named(name),
            is_registered: true,
            is_logged_in: true,
            ..BusinessSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), DEFAULT_STATE_KEY);
        store.save(&registered("Test Shop")).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded, registered("Test Shop"));
        assert!(store.path().ends_with("ginvoice_v1_state.json"));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_fresh_install() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"), DEFAULT_STATE_KEY);
        assert_eq!(store.load().await, BusinessSnapshot::default());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_degrades_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), DEFAULT_STATE_KEY);
        std::fs::write(store.path(), b"{\"products\": [oops").unwrap();
        assert_eq!(store.load().await, BusinessSnapshot::default());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_failed_save_keeps_previous_value() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), DEFAULT_STATE_KEY);
        store.save(&registered("Before")).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        // No temp file can be created beside the snapshot.
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
        let marker = dir.path().join("writable");
        let writable = std::fs::write(&marker, b"").is_ok();
        let result = store.save(&registered("After")).await;
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users ignore directory permissions.
        if writable {
            return;
        }
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        assert_eq!(store.load().await.business.name, "Before");
    }

    #[tokio::test]
    async fn test_interrupted_save_leaves_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), DEFAULT_STATE_KEY);
        store.save(&registered("Before")).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let bytes = serde_json::to_vec(&registered("After")).unwrap();
        let staged = stage(dir.path(), &bytes).unwrap();
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        drop(staged);

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(store.load().await.business.name, "Before");
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_reads_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), DEFAULT_STATE_KEY);
        assert!(store.read().await.unwrap().is_none());

        std::fs::write(store.path(), b"[1, 2").unwrap();
        assert!(matches!(
            store.read().await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), DEFAULT_STATE_KEY);
        store.save(&registered("Gone")).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.is_unregistered());
    }

    #[tokio::test]
    async fn test_memory_store_failed_save_is_all_or_nothing() {
        let store = MemoryStore::with_snapshot(&registered("Kept")).unwrap();
        store.fail_saves(true);
        assert!(store.save(&registered("Lost")).await.is_err());
        assert_eq!(store.load().await.business.name, "Kept");
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_memory_store_corrupt_raw() {
        let store = MemoryStore::with_raw("not json");
        assert!(store.load().await.is_unregistered());
    }

    #[tokio::test]
    async fn test_session_file_remembers_and_forgets_token() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path().join("nested").join("k.session"));
        assert!(session.load().await.unwrap().is_none());

        session.save(&SecretString::from("tok_first")).await.unwrap();
        session.save(&SecretString::from("tok_second")).await.unwrap();
        let token = session.load().await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "tok_second");

        session.clear().await.unwrap();
        assert!(session.load().await.unwrap().is_none());
        session.clear().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path().join("k.session"));
        session.save(&SecretString::from("tok")).await.unwrap();

        let mode = std::fs::metadata(session.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }
}
