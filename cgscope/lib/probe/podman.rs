use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{CgscopeError, CgscopeResult};

use super::{ImageRuntime, ProcessOutput};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const PODMAN_BINARY: &str = "podman";

/// Isolation applied to every version probe container.
///
/// Root keeps the file capabilities it needs to reach runtimes installed under directories owned
/// by the image's non-root user.
const PROBE_RUN_FLAGS: &[&str] = &[
    "--rm",
    "--pull=never",
    "--network=none",
    "--security-opt=no-new-privileges",
    "--cap-drop=all",
    "--cap-add=chown",
    "--cap-add=dac_override",
    "--cap-add=fowner",
    "--cap-add=setuid",
    "--cap-add=setgid",
    "--user=0:0",
    "--env=PUID=0",
    "--env=GUID=0",
];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An [`ImageRuntime`] driving the `podman` command line.
#[derive(Debug, Clone)]
pub struct PodmanRuntime {
    binary: PathBuf,
    authfile: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PodmanRuntime {
    /// Finds `podman` on the `PATH`.
    pub fn locate(authfile: Option<PathBuf>) -> CgscopeResult<Self> {
        let binary = which::which(PODMAN_BINARY)
            .map_err(|e| CgscopeError::RuntimeNotFound(format!("{PODMAN_BINARY}: {e}")))?;
        tracing::debug!("using container runtime at {}", binary.display());
        Ok(Self::with_binary(binary, authfile))
    }

    /// Uses the given podman binary.
    pub fn with_binary(binary: impl Into<PathBuf>, authfile: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            authfile,
        }
    }

    /// Runs podman with `args` to completion.
    async fn podman<I, S>(&self, args: I) -> std::io::Result<ProcessOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn create_container(&self, reference: &str) -> CgscopeResult<String> {
        let export_error = |reason: String| CgscopeError::ImageExport {
            reference: reference.to_string(),
            reason,
        };

        let output = self
            .podman(["create", "--pull=never", reference])
            .await
            .map_err(|e| export_error(e.to_string()))?;
        if !output.success() {
            return Err(export_error(failure_reason(&output)));
        }

        let container_id = output.stdout.trim().to_string();
        if container_id.is_empty() {
            return Err(export_error("podman create printed no container id".to_string()));
        }

        Ok(container_id)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ImageRuntime for PodmanRuntime {
    async fn pull(&self, reference: &str, insecure: bool) -> CgscopeResult<()> {
        let mut args = vec!["pull".to_string(), "--quiet".to_string()];
        if insecure {
            args.push("--tls-verify=false".to_string());
        }
        if let Some(authfile) = &self.authfile {
            args.push(format!("--authfile={}", authfile.display()));
        }
        args.push(reference.to_string());

        tracing::debug!("podman {}", args.join(" "));
        let output = self.podman(&args).await.map_err(|e| CgscopeError::ImagePull {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

        if !output.success() {
            return Err(CgscopeError::ImagePull {
                reference: reference.to_string(),
                reason: failure_reason(&output),
            });
        }

        Ok(())
    }

    async fn export_filesystem(&self, reference: &str, archive: &Path) -> CgscopeResult<()> {
        let container_id = self.create_container(reference).await?;

        let exported = self
            .podman([
                OsStr::new("export"),
                OsStr::new("--output"),
                archive.as_os_str(),
                OsStr::new(&container_id),
            ])
            .await;

        // The container only exists to be exported.
        match self.podman(["rm", "--force", container_id.as_str()]).await {
            Ok(output) if !output.success() => tracing::warn!(
                "failed to remove export container {container_id}: {}",
                failure_reason(&output)
            ),
            Err(e) => tracing::warn!("failed to remove export container {container_id}: {e}"),
            Ok(_) => {}
        }

        let output = exported.map_err(|e| CgscopeError::ImageExport {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

        if !output.success() {
            return Err(CgscopeError::ImageExport {
                reference: reference.to_string(),
                reason: failure_reason(&output),
            });
        }

        Ok(())
    }

    async fn remove(&self, reference: &str) -> CgscopeResult<()> {
        let output = self
            .podman(["rmi", "--force", reference])
            .await
            .map_err(|e| CgscopeError::ImageRemove {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(CgscopeError::ImageRemove {
                reference: reference.to_string(),
                reason: failure_reason(&output),
            });
        }

        Ok(())
    }

    async fn run(
        &self,
        reference: &str,
        binary: &str,
        args: &[&str],
    ) -> CgscopeResult<ProcessOutput> {
        let mut command = vec!["run"];
        command.extend_from_slice(PROBE_RUN_FLAGS);
        command.extend_from_slice(&["--entrypoint", binary, reference]);
        command.extend_from_slice(args);

        self.podman(&command)
            .await
            .map_err(|e| CgscopeError::ImageExec {
                reference: reference.to_string(),
                binary: binary.to_string(),
                reason: e.to_string(),
            })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn failure_reason(output: &ProcessOutput) -> String {
    let message = output.stderr.trim();
    let message = if message.is_empty() {
        output.stdout.trim()
    } else {
        message
    };

    match output.exit_code {
        Some(code) if message.is_empty() => format!("exit code {code}"),
        Some(code) => format!("exit code {code}: {message}"),
        None => format!("terminated by signal: {message}"),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
