use std::{
    fs,
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{cluster::ClusterReader, CgscopeResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Registry credentials handed to the image runtime.
///
/// Either a file supplied by the operator, or the cluster pull secret copied into a private
/// temporary file that is deleted when this value is dropped.
#[derive(Debug)]
pub enum RegistryAuthfile {
    /// An operator supplied file. Never deleted.
    Provided(PathBuf),

    /// A private copy of the cluster pull secret.
    Temporary(NamedTempFile),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RegistryAuthfile {
    /// Resolves the credentials for a run.
    ///
    /// `provided` wins. Otherwise the cluster pull secret is fetched; when it is missing or
    /// unreadable a warning is logged and images are pulled anonymously.
    pub async fn resolve(
        provided: Option<PathBuf>,
        reader: &dyn ClusterReader,
        work_dir: &Path,
    ) -> Option<Self> {
        if let Some(path) = provided {
            tracing::debug!("using registry authfile {}", path.display());
            return Some(RegistryAuthfile::Provided(path));
        }

        let secret = match reader.pull_secret().await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                tracing::warn!("no cluster pull secret available, pulling without credentials");
                return None;
            }
            Err(e) => {
                tracing::warn!("could not read the cluster pull secret: {e}");
                return None;
            }
        };

        match Self::write_private(&secret, work_dir) {
            Ok(authfile) => Some(authfile),
            Err(e) => {
                tracing::warn!("could not store the cluster pull secret: {e}");
                None
            }
        }
    }

    /// Writes `contents` to a temporary file only the current user can read.
    pub fn write_private(contents: &[u8], work_dir: &Path) -> CgscopeResult<Self> {
        fs::create_dir_all(work_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("cgscope-auth-")
            .suffix(".json")
            .tempfile_in(work_dir)?;

        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)?;
        file.flush()?;

        tracing::debug!("stored cluster pull secret at {}", file.path().display());
        Ok(RegistryAuthfile::Temporary(file))
    }

    /// The path to pass to the runtime.
    pub fn path(&self) -> &Path {
        match self {
            RegistryAuthfile::Provided(path) => path,
            RegistryAuthfile::Temporary(file) => file.path(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
