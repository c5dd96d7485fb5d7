use std::collections::{BTreeMap, HashSet};

use getset::Getters;

use crate::{
    cluster::{ClusterReader, ContainerSpec, PodInfo, Workload},
    filter::NamespaceScope,
    models::{ContainerImageRecord, ObjectType},
    CgscopeResult, ListError,
};

use super::{is_reported_pod, policy_for};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Walks every workload kind and resolves the image each container actually runs.
pub struct ImageResolver<'a> {
    reader: &'a dyn ClusterReader,
    scope: &'a NamespaceScope,
}

/// The outcome of one resolution pass.
#[derive(Debug, Default, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Resolution {
    /// One record per reported container, in collection order.
    records: Vec<ContainerImageRecord>,

    /// Every distinct image reference, in first-seen order.
    distinct_images: Vec<String>,

    /// The workload kinds that could not be listed.
    failures: Vec<ListError>,

    /// The number of records per object type.
    counts: BTreeMap<ObjectType, usize>,

    #[getset(skip)]
    seen: HashSet<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> ImageResolver<'a> {
    /// Creates a resolver over `reader` limited to `scope`.
    pub fn new(reader: &'a dyn ClusterReader, scope: &'a NamespaceScope) -> Self {
        Self { reader, scope }
    }

    /// Resolves every reported container in the cluster.
    ///
    /// Only an unreachable cluster fails the pass. A kind that cannot be listed is recorded in
    /// [`Resolution::get_failures`] and skipped.
    pub async fn resolve(&self) -> CgscopeResult<Resolution> {
        self.reader.check_connectivity().await?;

        let mut resolution = Resolution::default();
        for kind in ObjectType::ALL {
            let outcome = match kind {
                ObjectType::Pod => self.collect_pods(&mut resolution).await,
                _ => self.collect_workloads(kind, &mut resolution).await,
            };

            match outcome {
                Ok(count) => tracing::info!("found {count} container(s) in {kind} objects"),
                Err(error) if error.is_kind_unavailable() => {
                    tracing::info!("skipping {kind}: {error}");
                    resolution.failures.push(error);
                }
                Err(error) => {
                    tracing::warn!("skipping {kind}: {error}");
                    resolution.failures.push(error);
                }
            }
        }

        tracing::info!(
            "resolved {} container(s) using {} distinct image(s)",
            resolution.records.len(),
            resolution.distinct_images.len()
        );

        Ok(resolution)
    }

    async fn collect_workloads(
        &self,
        kind: ObjectType,
        resolution: &mut Resolution,
    ) -> Result<usize, ListError> {
        let Some(policy) = policy_for(kind) else {
            return Ok(0);
        };

        let workloads = self.reader.list_workloads(kind, self.scope.namespace()).await?;

        let mut count = 0;
        for workload in workloads
            .iter()
            .filter(|workload| self.scope.includes(workload.get_namespace()))
        {
            if !policy.is_reported(workload) {
                tracing::debug!(
                    "not reporting {kind} {}/{}",
                    workload.get_namespace(),
                    workload.get_name()
                );
                continue;
            }

            let pod = match policy.pod_selector(workload) {
                Some(selector) => self.first_pod(workload, &selector).await,
                None => None,
            };

            for container in workload.get_containers() {
                count += resolution.push(
                    kind,
                    workload.get_namespace(),
                    workload.get_name(),
                    container,
                    pod.as_ref(),
                );
            }
        }

        Ok(count)
    }

    async fn collect_pods(&self, resolution: &mut Resolution) -> Result<usize, ListError> {
        let pods = self.reader.list_pods(self.scope.namespace(), None).await?;

        let mut count = 0;
        for pod in pods
            .iter()
            .filter(|pod| self.scope.includes(pod.get_namespace()))
        {
            if !is_reported_pod(pod) {
                continue;
            }

            for container in pod.get_containers() {
                count += resolution.push(
                    ObjectType::Pod,
                    pod.get_namespace(),
                    pod.get_name(),
                    container,
                    Some(pod),
                );
            }
        }

        Ok(count)
    }

    /// The first pod matching `selector`, in listing order.
    async fn first_pod(&self, workload: &Workload, selector: &str) -> Option<PodInfo> {
        match self
            .reader
            .list_pods(Some(workload.get_namespace()), Some(selector))
            .await
        {
            Ok(pods) => {
                let pod = pods.into_iter().next();
                if pod.is_none() {
                    tracing::debug!(
                        "no pod of {} {}/{} matches {selector}, using template images",
                        workload.get_kind(),
                        workload.get_namespace(),
                        workload.get_name()
                    );
                }
                pod
            }
            Err(error) => {
                tracing::warn!(
                    "pod lookup for {} {}/{} failed, using template images: {error}",
                    workload.get_kind(),
                    workload.get_namespace(),
                    workload.get_name()
                );
                None
            }
        }
    }
}

impl Resolution {
    /// Consumes the resolution, returning the records and the distinct images.
    pub fn into_parts(self) -> (Vec<ContainerImageRecord>, Vec<String>) {
        (self.records, self.distinct_images)
    }

    /// Records one container, returning how many records were added.
    fn push(
        &mut self,
        kind: ObjectType,
        namespace: &str,
        object_name: &str,
        container: &ContainerSpec,
        pod: Option<&PodInfo>,
    ) -> usize {
        let (image, image_id) = effective_image(container, pod);

        let record = image.and_then(|image| {
            ContainerImageRecord::new(
                container.get_name(),
                namespace,
                kind,
                object_name,
                image,
                image_id,
            )
        });

        let Some(record) = record else {
            tracing::warn!(
                "container {} of {kind} {namespace}/{object_name} has no image",
                container.get_name()
            );
            return 0;
        };

        if self.seen.insert(record.get_image_reference().clone()) {
            self.distinct_images.push(record.get_image_reference().clone());
        }

        *self.counts.entry(kind).or_default() += 1;
        self.records.push(record);
        1
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The image a container actually runs and its image ID.
///
/// The live status wins when the pod has one for the container. Otherwise the declared image is
/// used and there is no image ID.
pub fn effective_image(
    container: &ContainerSpec,
    pod: Option<&PodInfo>,
) -> (Option<String>, Option<String>) {
    match pod.and_then(|pod| pod.status_for(container.get_name())) {
        Some(status) => (
            Some(status.get_image().clone()),
            status.get_image_id().clone(),
        ),
        None => (container.get_image().clone(), None),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
