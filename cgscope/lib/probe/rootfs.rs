use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Component, Path, PathBuf},
};

use tar::{Archive, EntryType};
use tempfile::TempDir;

use crate::{
    config::{EXPORT_DIR_PREFIX, ROOTFS_SUBDIR},
    CgscopeError, CgscopeResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const ARCHIVE_FILE_NAME: &str = "rootfs.tar";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A uniquely named scratch directory holding one exported image filesystem.
///
/// The directory and everything under it is removed when the value is dropped, whatever state the
/// unpacked tree was left in.
#[derive(Debug)]
pub struct ExportDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

/// Counts of what an unpack did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackStats {
    /// Entries written to disk.
    pub unpacked: usize,

    /// Entries skipped as unsafe or unsupported.
    pub skipped: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExportDir {
    /// Creates a fresh export directory under `work_dir`.
    pub fn create(work_dir: &Path) -> CgscopeResult<Self> {
        fs::create_dir_all(work_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(EXPORT_DIR_PREFIX)
            .tempdir_in(work_dir)?;
        fs::create_dir(dir.path().join(ROOTFS_SUBDIR))?;

        tracing::debug!("created export directory {}", dir.path().display());
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    /// The export directory itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the image filesystem is unpacked.
    pub fn rootfs(&self) -> PathBuf {
        self.path.join(ROOTFS_SUBDIR)
    }

    /// Where the runtime writes the exported archive.
    pub fn archive(&self) -> PathBuf {
        self.path.join(ARCHIVE_FILE_NAME)
    }

    /// Removes the directory now, reporting failures.
    pub fn close(mut self) -> CgscopeResult<()> {
        match self.dir.take() {
            Some(dir) => remove(dir),
            None => Ok(()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for ExportDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = remove(dir) {
                tracing::warn!("failed to remove export directory {}: {e}", self.path.display());
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Unpacks `archive` into `dest` on the blocking pool and deletes the archive afterwards.
pub async fn unpack_archive(archive: PathBuf, dest: PathBuf) -> CgscopeResult<UnpackStats> {
    tokio::task::spawn_blocking(move || {
        scopeguard::defer! {
            if let Err(e) = fs::remove_file(&archive) {
                tracing::debug!("could not remove archive {}: {e}", archive.display());
            }
        }

        unpack_archive_blocking(&archive, &dest)
    })
    .await?
}

/// Unpacks `archive` into `dest` entry by entry.
///
/// Entries escaping `dest`, device nodes and FIFOs are skipped. Ownership and extended attributes
/// are not restored, and unpacked directories are kept writable by the current user.
pub fn unpack_archive_blocking(archive: &Path, dest: &Path) -> CgscopeResult<UnpackStats> {
    let file = fs::File::open(archive)?;
    let mut archive = Archive::new(file);
    archive.set_preserve_permissions(false);
    archive.set_unpack_xattrs(false);
    archive.set_overwrite(true);

    let mut stats = UnpackStats::default();
    let entries = archive
        .entries()
        .map_err(|e| CgscopeError::RootfsExtraction(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| CgscopeError::RootfsExtraction(e.to_string()))?;
        let entry_type = entry.header().entry_type();

        if matches!(
            entry_type,
            EntryType::Block | EntryType::Char | EntryType::Fifo
        ) {
            stats.skipped += 1;
            continue;
        }

        let relative = match entry.path() {
            Ok(path) => sanitize(&path),
            Err(_) => None,
        };
        let Some(relative) = relative else {
            tracing::debug!("skipping unsafe archive entry");
            stats.skipped += 1;
            continue;
        };

        match entry.unpack_in(dest) {
            Ok(true) => stats.unpacked += 1,
            Ok(false) => {
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::debug!("skipping {}: {e}", relative.display());
                stats.skipped += 1;
                continue;
            }
        }

        if entry_type.is_dir() {
            make_owner_accessible(&dest.join(&relative));
        }
    }

    tracing::debug!(
        "unpacked {} entries into {} ({} skipped)",
        stats.unpacked,
        dest.display(),
        stats.skipped
    );
    Ok(stats)
}

/// Grants the owner full access to every directory under `root` so the tree can be deleted.
///
/// Symlinks are never followed.
pub fn relax_permissions(root: &Path) {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        make_owner_accessible(&dir);

        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };

        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                pending.push(entry.path());
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn remove(dir: TempDir) -> CgscopeResult<()> {
    relax_permissions(dir.path());
    let path = dir.path().to_path_buf();
    dir.close()?;
    tracing::debug!("removed export directory {}", path.display());
    Ok(())
}

fn make_owner_accessible(path: &Path) {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return;
    };

    if !metadata.is_dir() {
        return;
    }

    let mode = metadata.permissions().mode();
    if mode & 0o700 != 0o700 {
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o700)) {
            tracing::debug!("could not relax {}: {e}", path.display());
        }
    }
}

/// The entry path relative to the destination, or `None` if it would leave it.
fn sanitize(path: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
