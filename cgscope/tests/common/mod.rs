#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use cgscope::{
    cluster::{ClusterReader, ContainerSpec, ContainerStatusInfo, PodInfo, Workload},
    models::ObjectType,
    probe::{ImageRuntime, ProcessOutput},
    CgscopeError, CgscopeResult, ListError,
};
use tar::{Builder, EntryType, Header};

//--------------------------------------------------------------------------------------------------
// Types: Cluster
//--------------------------------------------------------------------------------------------------

/// An in-memory cluster.
///
/// Pods registered with a selector are only returned to listings using that exact selector.
/// Pods registered without one are the cluster's standalone pods.
#[derive(Default)]
pub struct FakeClusterReader {
    pub unreachable: bool,
    pub workloads: Vec<Workload>,
    pub unavailable: Vec<ObjectType>,
    pub forbidden: Vec<ObjectType>,
    pub selected_pods: Vec<(String, PodInfo)>,
    pub pods: Vec<PodInfo>,
    pub route: Option<String>,
    pub pull_secret: Option<Vec<u8>>,
    pub pod_queries: Mutex<Vec<String>>,
}

//--------------------------------------------------------------------------------------------------
// Types: Images
//--------------------------------------------------------------------------------------------------

/// What an image in [`FakeImageRuntime`] contains.
#[derive(Clone, Default)]
pub struct FakeImage {
    /// Pull fails with this reason.
    pub pull_error: Option<String>,

    /// Pull takes this long.
    pub pull_delay: Option<Duration>,

    /// Regular files in the image, by in-image path.
    pub files: Vec<&'static str>,

    /// Symlinks in the image, as (path, target).
    pub links: Vec<(&'static str, &'static str)>,

    /// What running a binary prints, by in-image path.
    pub outputs: HashMap<&'static str, ProcessOutput>,

    /// Every run takes this long.
    pub run_delay: Option<Duration>,

    /// Every run panics with this message.
    pub run_panic: Option<&'static str>,
}

/// An image runtime serving [`FakeImage`]s and recording every call.
#[derive(Default)]
pub struct FakeImageRuntime {
    pub images: HashMap<String, FakeImage>,
    pub pulled: Mutex<Vec<(String, bool)>>,
    pub removed: Mutex<Vec<String>>,
    pub runs: Mutex<Vec<(String, String)>>,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ClusterReader for FakeClusterReader {
    async fn check_connectivity(&self) -> CgscopeResult<()> {
        if self.unreachable {
            return Err(CgscopeError::ClusterUnreachable(
                "401 Unauthorized".to_string(),
            ));
        }
        Ok(())
    }

    async fn list_workloads(
        &self,
        kind: ObjectType,
        namespace: Option<&str>,
    ) -> Result<Vec<Workload>, ListError> {
        if self.unavailable.contains(&kind) {
            return Err(ListError::KindUnavailable {
                kind: kind.to_string(),
            });
        }

        if self.forbidden.contains(&kind) {
            return Err(ListError::Forbidden {
                kind: kind.to_string(),
                message: "forbidden".to_string(),
            });
        }

        Ok(self
            .workloads
            .iter()
            .filter(|workload| *workload.get_kind() == kind)
            .filter(|workload| namespace.map_or(true, |ns| workload.get_namespace() == ns))
            .cloned()
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<PodInfo>, ListError> {
        let in_namespace =
            |pod: &&PodInfo| namespace.map_or(true, |ns| pod.get_namespace() == ns);

        match selector {
            Some(selector) => {
                self.pod_queries.lock().unwrap().push(selector.to_string());
                Ok(self
                    .selected_pods
                    .iter()
                    .filter(|(registered, _)| registered == selector)
                    .map(|(_, pod)| pod)
                    .filter(in_namespace)
                    .cloned()
                    .collect())
            }
            None => Ok(self.pods.iter().filter(in_namespace).cloned().collect()),
        }
    }

    async fn registry_route(&self) -> CgscopeResult<Option<String>> {
        Ok(self.route.clone())
    }

    async fn pull_secret(&self) -> CgscopeResult<Option<Vec<u8>>> {
        Ok(self.pull_secret.clone())
    }
}

#[async_trait]
impl ImageRuntime for FakeImageRuntime {
    async fn pull(&self, reference: &str, insecure: bool) -> CgscopeResult<()> {
        self.pulled
            .lock()
            .unwrap()
            .push((reference.to_string(), insecure));

        let image = self.image(reference)?;
        if let Some(delay) = image.pull_delay {
            tokio::time::sleep(delay).await;
        }

        match &image.pull_error {
            Some(reason) => Err(CgscopeError::ImagePull {
                reference: reference.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn export_filesystem(&self, reference: &str, archive: &Path) -> CgscopeResult<()> {
        let image = self.image(reference)?;
        write_image_archive(&image, archive).map_err(|e| CgscopeError::ImageExport {
            reference: reference.to_string(),
            reason: e.to_string(),
        })
    }

    async fn remove(&self, reference: &str) -> CgscopeResult<()> {
        self.removed.lock().unwrap().push(reference.to_string());
        Ok(())
    }

    async fn run(
        &self,
        reference: &str,
        binary: &str,
        _args: &[&str],
    ) -> CgscopeResult<ProcessOutput> {
        self.runs
            .lock()
            .unwrap()
            .push((reference.to_string(), binary.to_string()));

        let image = self.image(reference)?;
        if let Some(delay) = image.run_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = image.run_panic {
            panic!("{message}");
        }

        Ok(image.outputs.get(binary).cloned().unwrap_or(ProcessOutput {
            stderr: format!("exec: {binary}: not found"),
            exit_code: Some(127),
            ..Default::default()
        }))
    }
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeImageRuntime {
    pub fn with_images<S: Into<String>>(
        images: impl IntoIterator<Item = (S, FakeImage)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            images: images
                .into_iter()
                .map(|(reference, image)| (reference.into(), image))
                .collect(),
            ..Default::default()
        })
    }

    pub fn pulled(&self) -> Vec<(String, bool)> {
        self.pulled.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    fn image(&self, reference: &str) -> CgscopeResult<FakeImage> {
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| CgscopeError::ImagePull {
                reference: reference.to_string(),
                reason: "manifest unknown".to_string(),
            })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

pub fn stderr(text: &str) -> ProcessOutput {
    ProcessOutput {
        stderr: text.to_string(),
        exit_code: Some(0),
        ..Default::default()
    }
}

pub fn stdout(text: &str) -> ProcessOutput {
    ProcessOutput {
        stdout: text.to_string(),
        exit_code: Some(0),
        ..Default::default()
    }
}

pub fn container(name: &str, image: &str) -> ContainerSpec {
    ContainerSpec::builder().name(name).image(image).build()
}

pub fn status(name: &str, image: &str, image_id: &str) -> ContainerStatusInfo {
    ContainerStatusInfo::builder()
        .name(name)
        .image(image)
        .image_id(image_id)
        .build()
}

pub fn deployment(namespace: &str, name: &str, selector: &str, image: &str) -> Workload {
    Workload::builder()
        .kind(ObjectType::Deployment)
        .name(name)
        .namespace(namespace)
        .replicas(1)
        .selector(selector)
        .containers(vec![container("app", image)])
        .build()
}

pub fn running_pod(namespace: &str, name: &str, image: &str, image_id: &str) -> PodInfo {
    PodInfo::builder()
        .name(name)
        .namespace(namespace)
        .owner_kinds(vec!["ReplicaSet".to_string()])
        .containers(vec![container("app", image)])
        .statuses(vec![status("app", image, image_id)])
        .build()
}

/// Lists the entries left in `dir`.
pub fn leftovers(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn write_image_archive(image: &FakeImage, archive: &Path) -> std::io::Result<()> {
    let mut builder = Builder::new(fs::File::create(archive)?);

    for path in &image.files {
        let contents = b"#!/bin/sh\n";
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o755);
        header.set_size(contents.len() as u64);
        builder.append_data(&mut header, path.trim_start_matches('/'), &contents[..])?;
    }

    for (path, target) in &image.links {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_mode(0o777);
        header.set_size(0);
        builder.append_link(&mut header, path.trim_start_matches('/'), target)?;
    }

    builder.into_inner()?;
    Ok(())
}
