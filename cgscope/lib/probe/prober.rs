use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio_util::task::TaskTracker;

use crate::{
    compat::{classify, parse_version, ParsedVersion},
    config::ProbeConfig,
    models::{AnalysisResult, RuntimeFamily, RuntimeFinding},
    resolve::PullTarget,
    CgscopeError, CgscopeResult,
};

use super::{find_binary, unpack_archive, ExportDir, ImageLease, ImageRuntime};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// How much unrecognized probe output is quoted in an analysis error.
const MAX_QUOTED_OUTPUT: usize = 120;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Pulls one image, looks for language runtimes in it and classifies their versions.
///
/// Every probe owns its pulled image and export directory and releases both before
/// [`RuntimeProbe::analyze`] returns. If the returned future is dropped early the export
/// directory is removed on drop and the image removal is spawned on [`RuntimeProbe::tracker`].
#[derive(Clone)]
pub struct RuntimeProbe {
    runtime: Arc<dyn ImageRuntime>,
    config: ProbeConfig,
    tracker: TaskTracker,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeProbe {
    /// Creates a probe driving `runtime`.
    pub fn new(runtime: Arc<dyn ImageRuntime>, config: ProbeConfig) -> Self {
        Self {
            runtime,
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// The tracker holding image removals of dropped probes.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Analyzes `image_reference`, pulling it through `target`.
    ///
    /// Never fails: every problem ends up in the result's analysis error.
    pub async fn analyze(&self, image_reference: &str, target: &PullTarget) -> AnalysisResult {
        let mut result = AnalysisResult::new(image_reference);

        tracing::info!("analyzing {image_reference}");
        let pulled = timed(
            "pull",
            *self.config.get_pull_timeout(),
            self.runtime.pull(&target.reference, target.insecure),
        )
        .await;

        if let Err(e) = pulled {
            tracing::warn!("{e}");
            result.push_error(e);
            return result;
        }

        let lease = ImageLease::new(
            Arc::clone(&self.runtime),
            target.reference.clone(),
            self.tracker.clone(),
        );

        let inspected = AssertUnwindSafe(self.inspect(&target.reference, &mut result))
            .catch_unwind()
            .await;
        if let Err(panic) = inspected {
            result.push_error(format!("analysis panicked: {}", panic_message(&*panic)));
        }

        if let Err(e) = lease.release().await {
            tracing::warn!("{e}");
        }

        result
    }

    /// Exports the pulled image and probes every runtime family.
    async fn inspect(&self, reference: &str, result: &mut AnalysisResult) {
        let export = match ExportDir::create(self.config.get_work_dir()) {
            Ok(export) => export,
            Err(e) => {
                result.push_error(e);
                return;
            }
        };

        let exported = timed(
            "export",
            *self.config.get_export_timeout(),
            self.runtime.export_filesystem(reference, &export.archive()),
        )
        .await;

        let unpacked = match exported {
            Ok(()) => unpack_archive(export.archive(), export.rootfs()).await,
            Err(e) => Err(e),
        };

        if let Err(e) = unpacked {
            tracing::warn!("{e}");
            result.push_error(e);
            return;
        }

        for family in RuntimeFamily::ALL {
            let rootfs = export.rootfs();
            let names = family.binary_names();
            let binary = match tokio::task::spawn_blocking(move || find_binary(&rootfs, names)).await
            {
                Ok(binary) => binary,
                Err(e) => {
                    result.push_error(format!("{family}: binary search failed: {e}"));
                    continue;
                }
            };

            let Some(binary) = binary else {
                tracing::debug!("no {family} binary in {reference}");
                continue;
            };

            let finding = self.probe_version(reference, family, &binary, result).await;
            result.set_finding(family, finding);
        }

        if let Err(e) = export.close() {
            tracing::warn!("{e}");
        }
    }

    /// Runs the version probe of one found binary.
    async fn probe_version(
        &self,
        reference: &str,
        family: RuntimeFamily,
        binary: &str,
        result: &mut AnalysisResult,
    ) -> RuntimeFinding {
        let output = timed(
            "version probe",
            *self.config.get_probe_timeout(),
            self.runtime.run(reference, binary, family.version_args()),
        )
        .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                result.push_error(format!("{family}: {e}"));
                return RuntimeFinding::unversioned(binary);
            }
        };

        match parse_version(family, &output.combined()) {
            ParsedVersion::Parsed {
                kind,
                version,
                text,
            } => {
                let compatibility = classify(kind, &version);
                tracing::info!(
                    "{reference}: {} {text} at {binary} is cgroup v2 compatible: {compatibility}",
                    kind.display_name()
                );
                RuntimeFinding::classified(binary, text, kind, compatibility)
            }
            ParsedVersion::Unparsed { raw, .. } => {
                let status = match output.exit_code {
                    Some(code) => format!("exit code {code}"),
                    None => "killed".to_string(),
                };
                result.push_error(format!(
                    "{family}: unrecognized version output from {binary} ({status}): {}",
                    quote(&raw)
                ));
                RuntimeFinding::unversioned(binary)
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Bounds `future` by `duration`.
async fn timed<T>(
    operation: &str,
    duration: Duration,
    future: impl Future<Output = CgscopeResult<T>>,
) -> CgscopeResult<T> {
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| CgscopeError::Timeout {
            operation: operation.to_string(),
            duration,
        })?
}

fn quote(raw: &str) -> String {
    let line = raw.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return "<empty>".to_string();
    }

    match line.char_indices().nth(MAX_QUOTED_OUTPUT) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_keeps_first_line_only() {
        assert_eq!(quote("bash: java: not found\nmore"), "bash: java: not found");
        assert_eq!(quote("   "), "<empty>");
        let long = "x".repeat(200);
        assert_eq!(quote(&long).len(), MAX_QUOTED_OUTPUT + 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_timed_reports_the_operation() {
        let error = timed("pull", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(error, CgscopeError::Timeout { .. }));
        assert!(error.to_string().starts_with("pull timed out"));
    }

    #[test]
    fn test_panic_message() {
        let panic: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*panic), "boom");
        let panic: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*panic), "bang");
        let panic: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*panic), "unknown panic");
    }
}
