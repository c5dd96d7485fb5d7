use std::path::Path;

use async_trait::async_trait;

use crate::CgscopeResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a process run inside an image printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// The exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A local container engine able to pull, export and run images.
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// Pulls `reference`, skipping certificate verification when `insecure` is set.
    async fn pull(&self, reference: &str, insecure: bool) -> CgscopeResult<()>;

    /// Writes the flattened filesystem of a pulled image as a tar archive to `archive`.
    async fn export_filesystem(&self, reference: &str, archive: &Path) -> CgscopeResult<()>;

    /// Removes a pulled image.
    async fn remove(&self, reference: &str) -> CgscopeResult<()>;

    /// Runs `binary` with `args` in a throwaway container of the pulled image.
    ///
    /// A non-zero exit is not an error; the caller decides what the output means.
    async fn run(
        &self,
        reference: &str,
        binary: &str,
        args: &[&str],
    ) -> CgscopeResult<ProcessOutput>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessOutput {
    /// Standard error followed by standard output.
    ///
    /// Java prints its version banner to standard error, the others to standard output.
    pub fn combined(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (true, _) => self.stdout.clone(),
            (_, true) => self.stderr.clone(),
            _ => format!("{}\n{}", self.stderr.trim_end(), self.stdout),
        }
    }

    /// Returns true if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
