use std::sync::Arc;

use tokio_util::task::TaskTracker;

use crate::CgscopeResult;

use super::ImageRuntime;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Ownership of one pulled image.
///
/// Call [`ImageLease::release`] on the normal path. A lease that is dropped instead, for example
/// because the probe was cancelled, removes the image on a task spawned on `tracker`.
pub struct ImageLease {
    runtime: Arc<dyn ImageRuntime>,
    reference: Option<String>,
    tracker: TaskTracker,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageLease {
    /// Takes ownership of the pulled image `reference`.
    pub fn new(
        runtime: Arc<dyn ImageRuntime>,
        reference: impl Into<String>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            runtime,
            reference: Some(reference.into()),
            tracker,
        }
    }

    /// Removes the image now.
    pub async fn release(mut self) -> CgscopeResult<()> {
        let Some(reference) = self.reference.take() else {
            return Ok(());
        };

        self.runtime.remove(&reference).await?;
        tracing::debug!("removed image {reference}");
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for ImageLease {
    fn drop(&mut self) {
        let Some(reference) = self.reference.take() else {
            return;
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime left to remove image {reference}");
            return;
        };

        tracing::debug!("removing image {reference} in the background");
        let runtime = Arc::clone(&self.runtime);
        self.tracker.spawn_on(
            async move {
                if let Err(e) = runtime.remove(&reference).await {
                    tracing::warn!("failed to remove image {reference}: {e}");
                }
            },
            &handle,
        );
    }
}
