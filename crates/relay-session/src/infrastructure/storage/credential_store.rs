//! Session-directory persistence for transport credentials.
//!
//! Layout on disk:
//!
//! ```text
//! sessions/
//!   creds.json
//!   pre-key-1.json
//!   app-state-sync-key-AAAAAJz1.json
//!   ...
//! ```
//!
//! File names and contents are opaque: they come from the transport and are
//! restored byte-for-byte on the next load.  Dot-prefixed names are reserved
//! for the store's own temporary files and are never loaded.
//!
//! # Atomic writes
//!
//! Each file is written to `.<name>.tmp`, flushed to disk, and renamed over
//! the target.  A rename within one directory is atomic on every supported
//! platform, so readers see either the old contents or the new ones.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use relay_core::domain::credentials::is_valid_file_name;
use relay_core::Credentials;
use thiserror::Error;
use tracing::{debug, warn};

const WRITE_CHECK: &str = ".write-check";

/// Error type for credential persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The session directory exists but files cannot be created in it.
    #[error("session directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file system I/O error occurred.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A credential name cannot be used as a file name.
    #[error("invalid credential file name: {0:?}")]
    InvalidFileName(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Owns one session directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads every credential file, creating the directory if needed.
    ///
    /// Returns the loaded set (empty on first run) and a [`CredentialSaver`]
    /// bound to the same directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotWritable`] if the directory exists but is
    /// read-only, and [`StorageError::Io`] for any other file-system failure.
    pub fn load(&self) -> Result<(Credentials, CredentialSaver), StorageError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        check_writable(&self.dir)?;

        let mut credentials = Credentials::new();
        for entry in fs::read_dir(&self.dir).map_err(io_error(&self.dir))? {
            let entry = entry.map_err(io_error(&self.dir))?;
            let path = entry.path();
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!("skipping non UTF-8 file in session directory: {}", path.display());
                continue;
            };
            if !is_valid_file_name(name) {
                continue;
            }
            if !entry.file_type().map_err(io_error(&path))?.is_file() {
                continue;
            }
            let contents = fs::read(&path).map_err(io_error(&path))?;
            credentials.insert(name, contents);
        }

        debug!(
            "loaded {} credential file(s) from {}",
            credentials.len(),
            self.dir.display()
        );

        Ok((
            credentials,
            CredentialSaver {
                dir: self.dir.clone(),
            },
        ))
    }

    /// Deletes everything inside the session directory, keeping the
    /// directory itself.  A missing or empty directory is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if an entry cannot be removed.
    pub fn clear(&self) -> Result<(), StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(io_error(&self.dir))?;
            let path = entry.path();
            let result = if entry.file_type().map_err(io_error(&path))?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&path)(e)),
            }
        }

        debug!("cleared {removed} entries from {}", self.dir.display());
        Ok(())
    }
}

// ── Saver ─────────────────────────────────────────────────────────────────────

/// Persists the in-memory credential set back to the session directory.
///
/// Handed out by [`CredentialStore::load`] and kept alongside the transport
/// it was loaded for.
#[derive(Debug, Clone)]
pub struct CredentialSaver {
    dir: PathBuf,
}

impl CredentialSaver {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `credentials` as the complete current set: every entry is
    /// written atomically, then files no longer in the set are removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidFileName`] before touching the disk if
    /// any name is unusable, or [`StorageError::Io`] if a write fails.
    /// Files written before a failure keep their new contents; untouched
    /// files keep their old ones.
    pub fn save(&self, credentials: &Credentials) -> Result<(), StorageError> {
        if let Some(bad) = credentials.names().find(|name| !is_valid_file_name(name)) {
            return Err(StorageError::InvalidFileName(bad.to_string()));
        }

        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        for (name, contents) in credentials.iter() {
            write_atomic(&self.dir, name, contents)?;
        }
        self.prune(credentials)?;

        debug!(
            "saved {} credential file(s) to {}",
            credentials.len(),
            self.dir.display()
        );
        Ok(())
    }

    fn prune(&self, keep: &Credentials) -> Result<(), StorageError> {
        for entry in fs::read_dir(&self.dir).map_err(io_error(&self.dir))? {
            let entry = entry.map_err(io_error(&self.dir))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !is_valid_file_name(name) || keep.get(name).is_some() {
                continue;
            }
            let path = entry.path();
            if entry.file_type().map_err(io_error(&path))?.is_file() {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(io_error(&path)(e)),
                }
            }
        }
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn check_writable(dir: &Path) -> Result<(), StorageError> {
    let marker = dir.join(WRITE_CHECK);
    fs::write(&marker, b"").map_err(|source| StorageError::NotWritable {
        path: dir.to_path_buf(),
        source,
    })?;
    let _ = fs::remove_file(&marker);
    Ok(())
}

fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<(), StorageError> {
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.tmp"));

    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StorageError::Io { path: tmp, source });
    }

    fs::rename(&tmp, &target).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StorageError::Io {
            path: target.clone(),
            source,
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credentials() -> Credentials {
        let mut creds = Credentials::new();
        creds.insert("creds.json", br#"{"me":{"id":"1555@s.whatsapp.net"}}"#.to_vec());
        creds.insert("pre-key-1.json", vec![0u8, 1, 2, 255]);
        creds
    }

    #[test]
    fn test_load_creates_missing_directory() {
        // Arrange
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("sessions");
        let store = CredentialStore::new(&dir);

        // Act
        let (creds, _saver) = store.load().expect("load should create the directory");

        // Assert
        assert!(dir.is_dir());
        assert!(creds.is_empty());
    }

    #[test]
    fn test_saved_credentials_load_back_byte_for_byte() {
        // Arrange
        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path());
        let (_, saver) = store.load().unwrap();
        let creds = sample_credentials();

        // Act
        saver.save(&creds).unwrap();
        let (loaded, _) = store.load().unwrap();

        // Assert
        assert_eq!(loaded, creds);
    }

    #[test]
    fn test_save_removes_files_dropped_from_the_set() {
        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path());
        let (_, saver) = store.load().unwrap();
        saver.save(&sample_credentials()).unwrap();

        let mut rotated = sample_credentials();
        rotated.remove("pre-key-1.json");
        saver.save(&rotated).unwrap();

        assert!(!root.path().join("pre-key-1.json").exists());
        assert!(root.path().join("creds.json").exists());
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path());
        let (_, saver) = store.load().unwrap();

        saver.save(&sample_credentials()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "unexpected temp files: {leftovers:?}");
    }

    #[test]
    fn test_load_ignores_stale_temporary_files() {
        // Arrange: simulate a crash between write and rename
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("creds.json"), b"good").unwrap();
        fs::write(root.path().join(".creds.json.tmp"), b"torn").unwrap();
        let store = CredentialStore::new(root.path());

        // Act
        let (creds, _) = store.load().unwrap();

        // Assert: only the committed file is visible
        assert_eq!(creds.len(), 1);
        assert_eq!(creds.get("creds.json"), Some(&b"good"[..]));
    }

    #[test]
    fn test_load_fails_when_path_is_a_regular_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let result = CredentialStore::new(&file).load();

        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_load_reports_read_only_directory_as_not_writable() {
        use std::os::unix::fs::PermissionsExt;

        // Arrange
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("sessions");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores directory permissions; nothing to check then.
        if fs::write(dir.join("privilege-check"), b"").is_ok() {
            return;
        }

        // Act
        let result = CredentialStore::new(&dir).load();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        // Assert
        assert!(
            matches!(result, Err(StorageError::NotWritable { ref path, .. }) if path == &dir),
            "expected NotWritable, got {result:?}"
        );
    }

    #[test]
    fn test_save_accepts_longest_valid_name() {
        use relay_core::domain::credentials::MAX_FILE_NAME_LEN;

        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path());
        let (_, saver) = store.load().unwrap();
        let name = format!("{}.json", "k".repeat(MAX_FILE_NAME_LEN - 5));
        let mut creds = Credentials::new();
        assert!(creds.insert(name.clone(), b"v".to_vec()));

        saver.save(&creds).unwrap();

        assert_eq!(fs::read(root.path().join(&name)).unwrap(), b"v");
    }

    #[test]
    fn test_clear_removes_all_entries_but_keeps_directory() {
        // Arrange
        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path());
        let (_, saver) = store.load().unwrap();
        saver.save(&sample_credentials()).unwrap();
        fs::create_dir(root.path().join("nested")).unwrap();

        // Act
        store.clear().unwrap();

        // Assert
        assert!(root.path().is_dir());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_on_missing_directory_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path().join("never-created"));
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_clear_twice_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(root.path());
        store.clear().unwrap();
        assert!(store.clear().is_ok());
    }
}
