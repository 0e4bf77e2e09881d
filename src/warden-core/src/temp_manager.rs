//! Scoped temp artifacts guarded by a [`TempFileProtector`].
//!
//! Artifacts are owned by handles and removed when the handle drops. The
//! manager also remembers every live artifact and removes survivors in
//! [`TempFileManager::cleanup`], which runs again when the manager drops.
//!
//! Validation is a point-in-time check. Reads and writes therefore open with
//! `O_NOFOLLOW` on Unix so a symlink swapped in after validation is refused by
//! the kernel.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, warn};

use crate::error::{TempFileError, TempFileResult};
use crate::normalize::{absolutize, is_within};
use crate::protector::TempFileProtector;
use crate::validator::NOT_IN_ALLOWED_DIRS;

type Tracked = Arc<Mutex<HashSet<PathBuf>>>;

/// Removes its path from the tracked set when dropped.
#[derive(Debug)]
struct TrackGuard {
    path: PathBuf,
    tracked: Tracked,
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.tracked.lock().remove(&self.path);
    }
}

/// A temp directory removed, with its contents, on drop.
#[derive(Debug)]
pub struct TempDirHandle {
    dir: TempDir,
    _guard: TrackGuard,
}

impl TempDirHandle {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now and report failures.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// A temp file removed on drop.
#[derive(Debug)]
pub struct TempFileHandle {
    file: NamedTempFile,
    _guard: TrackGuard,
}

impl TempFileHandle {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn as_file(&self) -> &File {
        self.file.as_file()
    }

    pub fn as_file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Remove the file now and report failures.
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Creates, reads, writes and removes temp artifacts inside the allowed roots.
pub struct TempFileManager {
    protector: Arc<TempFileProtector>,
    base_dir: PathBuf,
    tracked: Tracked,
}

impl TempFileManager {
    /// Artifacts are created in the first allowed root, or the system temp
    /// directory when the policy lists none.
    pub fn new(protector: Arc<TempFileProtector>) -> Self {
        let base_dir = protector
            .policy()
            .allowed_roots
            .first()
            .cloned()
            .unwrap_or_else(std::env::temp_dir);
        Self {
            protector,
            base_dir,
            tracked: Arc::default(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn protector(&self) -> &TempFileProtector {
        &self.protector
    }

    /// Create a directory named `<prefix><random>`.
    ///
    /// The new directory is validated and removed again if it is rejected.
    pub fn create_temp_dir(&self, prefix: &str) -> TempFileResult<TempDirHandle> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.base_dir)
            .map_err(|e| TempFileError::io(&self.base_dir, e))?;

        self.admit("create_temp_dir", dir.path())?;
        let guard = self.track(dir.path());
        Ok(TempDirHandle { dir, _guard: guard })
    }

    /// Create a file named `<prefix><random><suffix>`.
    pub fn create_temp_file(&self, prefix: &str, suffix: &str) -> TempFileResult<TempFileHandle> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.base_dir)
            .map_err(|e| TempFileError::io(&self.base_dir, e))?;

        self.admit("create_temp_file", file.path())?;
        let guard = self.track(file.path());
        Ok(TempFileHandle { file, _guard: guard })
    }

    /// Validate `path` and write `data` to it, replacing any content.
    pub fn write_temp_file(&self, path: &Path, data: &[u8]) -> TempFileResult<()> {
        self.check_size(data.len() as u64)?;
        self.admit("write_temp_file", path)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = open_no_follow(&mut options, path).map_err(|e| TempFileError::io(path, e))?;
        file.write_all(data).map_err(|e| TempFileError::io(path, e))?;
        debug!(path = %path.display(), bytes = data.len(), "Wrote temp file");
        Ok(())
    }

    /// Validate `path` and read it whole.
    pub fn read_temp_file(&self, path: &Path) -> TempFileResult<Vec<u8>> {
        self.admit("read_temp_file", path)?;

        let mut file =
            open_no_follow(OpenOptions::new().read(true), path).map_err(|e| TempFileError::io(path, e))?;
        let size = file.metadata().map_err(|e| TempFileError::io(path, e))?.len();
        self.check_size(size)?;

        let mut data = Vec::with_capacity(size as usize);
        file.read_to_end(&mut data)
            .map_err(|e| TempFileError::io(path, e))?;
        Ok(data)
    }

    /// Remove a file, directory tree or symlink inside the allowed roots.
    ///
    /// Symlinks are removed themselves, never followed. Returns `false` when
    /// nothing existed.
    pub fn remove_temp_path(&self, path: &Path) -> TempFileResult<bool> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(TempFileError::io(path, e)),
        };

        if !self.parent_in_roots(path) {
            return Err(TempFileError::Blocked {
                path: path.to_path_buf(),
                reason: NOT_IN_ALLOWED_DIRS.to_string(),
            });
        }

        remove_entry(path, &meta).map_err(|e| TempFileError::io(path, e))?;
        self.tracked.lock().remove(path);
        Ok(true)
    }

    /// Paths of artifacts created by this manager that still exist.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.tracked.lock().iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Remove every tracked artifact. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let paths: Vec<PathBuf> = self.tracked.lock().drain().collect();
        let mut removed = 0;

        for path in paths {
            let result = fs::symlink_metadata(&path).and_then(|meta| remove_entry(&path, &meta));
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to clean up temp artifact"),
            }
        }
        removed
    }

    fn admit(&self, operation: &str, path: &Path) -> TempFileResult<()> {
        let subject = path.to_string_lossy();
        if self.protector.protect(operation, &subject, None) {
            return Ok(());
        }
        Err(TempFileError::Blocked {
            path: path.to_path_buf(),
            reason: self.protector.validate(&subject).summary(),
        })
    }

    fn check_size(&self, size: u64) -> TempFileResult<()> {
        let limit = self.protector.policy().max_artifact_size;
        if limit > 0 && size > limit {
            return Err(TempFileError::TooLarge { size, limit });
        }
        Ok(())
    }

    fn parent_in_roots(&self, path: &Path) -> bool {
        let parent = match absolutize(path).parent() {
            Some(parent) => fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf()),
            None => return false,
        };

        self.protector.policy().allowed_roots.iter().any(|root| {
            let root = fs::canonicalize(root).unwrap_or_else(|_| absolutize(root));
            is_within(&parent, &root)
        })
    }

    fn track(&self, path: &Path) -> TrackGuard {
        self.tracked.lock().insert(path.to_path_buf());
        TrackGuard {
            path: path.to_path_buf(),
            tracked: Arc::clone(&self.tracked),
        }
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        let removed = self.cleanup();
        if removed > 0 {
            debug!(removed, "Removed leftover temp artifacts");
        }
    }
}

fn open_no_follow(options: &mut OpenOptions, path: &Path) -> io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NOFOLLOW);
    }
    options.open(path)
}

fn remove_entry(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.file_type().is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
