use std::{collections::HashMap, sync::Arc};

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{
    cluster::ClusterReader,
    config::ScanConfig,
    models::AnalysisResult,
    probe::{ImageRuntime, RuntimeProbe},
    resolve::{rewrite, ImageResolver},
    CgscopeError, CgscopeResult,
};

use super::{Report, ReportRow, ScanSummary};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runs one scan: resolves the cluster's images, optionally analyzes each distinct image once and
/// joins the results back onto every container that runs it.
pub struct AnalysisOrchestrator {
    /// The cluster being scanned.
    reader: Arc<dyn ClusterReader>,

    /// The engine images are pulled with. Required only when analysis is enabled.
    runtime: Option<Arc<dyn ImageRuntime>>,

    /// The scan settings.
    config: ScanConfig,

    /// Cancels the scan.
    cancel: CancellationToken,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AnalysisOrchestrator {
    /// Creates an orchestrator over `reader`.
    pub fn new(reader: Arc<dyn ClusterReader>, config: ScanConfig) -> Self {
        Self {
            reader,
            runtime: None,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the image runtime used for analysis.
    pub fn with_runtime(mut self, runtime: Arc<dyn ImageRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Ties the scan to `cancel`.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the scan.
    ///
    /// Fails only on invalid configuration, an unreachable cluster, or cancellation before
    /// resolution finished. Cancellation during analysis still yields a report.
    pub async fn run(&self) -> CgscopeResult<Report> {
        self.config.validate()?;
        let runtime = match (*self.config.get_analyze(), &self.runtime) {
            (true, Some(runtime)) => Some(Arc::clone(runtime)),
            (true, None) => {
                return Err(CgscopeError::InvalidArgument(
                    "analysis requested without an image runtime".to_string(),
                ))
            }
            (false, _) => None,
        };

        let resolver = ImageResolver::new(self.reader.as_ref(), self.config.get_scope());
        let resolution = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CgscopeError::Cancelled),
            resolution = resolver.resolve() => resolution?,
        };

        let list_failures = resolution.get_failures().clone();
        let counts = resolution.get_counts().clone();
        let (records, images) = resolution.into_parts();
        let mut summary = ScanSummary::new(records.len(), images.len(), counts, list_failures);
        tracing::info!(
            "resolved {} containers running {} distinct images",
            records.len(),
            images.len()
        );

        let analyses = match runtime {
            Some(runtime) => self.analyze_images(runtime, &images).await,
            None => HashMap::new(),
        };

        for image in &images {
            if let Some(result) = analyses.get(image) {
                summary.count_analysis(result);
            }
        }

        let rows = records
            .iter()
            .map(|record| ReportRow::new(record, analyses.get(record.get_image_reference())))
            .collect();

        Ok(Report::new(rows, summary))
    }

    /// Analyzes every image once, keyed by the reference as resolved from the cluster.
    ///
    /// At most `concurrency` probes run at a time. On cancellation the in-flight probes are
    /// dropped, their image removals are awaited and every image without a result is marked as
    /// cancelled.
    pub async fn analyze_images(
        &self,
        runtime: Arc<dyn ImageRuntime>,
        images: &[String],
    ) -> HashMap<String, AnalysisResult> {
        let route = self.registry_route().await;
        let probe = RuntimeProbe::new(runtime, self.config.get_probe().clone());
        let internal_registry = self.config.get_internal_registry();
        let total = images.len();
        let mut results = HashMap::with_capacity(total);

        let mut analyses = stream::iter(images.iter().enumerate())
            .map(|(index, image)| {
                let target = rewrite(image, internal_registry, route.as_deref());
                let probe = &probe;
                async move {
                    tracing::info!("[{}/{total}] analyzing {image}", index + 1);
                    probe.analyze(image, &target).await
                }
            })
            .buffer_unordered(*self.config.get_concurrency());

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::warn!("analysis cancelled with {} of {total} images done", results.len());
                    break;
                }
                next = analyses.next() => match next {
                    Some(result) => {
                        results.insert(result.get_image_reference().clone(), result);
                    }
                    None => break,
                },
            }
        }

        drop(analyses);
        probe.tracker().close();
        probe.tracker().wait().await;

        for image in images {
            results
                .entry(image.clone())
                .or_insert_with(|| AnalysisResult::failed(image, CgscopeError::Cancelled));
        }

        results
    }

    /// The external route of the internal registry: the configured override, else the cluster's.
    pub async fn registry_route(&self) -> Option<String> {
        if let Some(route) = self.config.get_registry_route() {
            return Some(route.clone());
        }

        match self.reader.registry_route().await {
            Ok(Some(route)) => {
                tracing::info!("internal registry images are pulled through {route}");
                Some(route)
            }
            Ok(None) => {
                tracing::debug!("cluster exposes no internal registry route");
                None
            }
            Err(e) => {
                tracing::warn!("could not read the internal registry route: {e}");
                None
            }
        }
    }
}
