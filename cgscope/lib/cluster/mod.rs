//! Read access to the cluster API.
//!
//! The resolver only ever sees the [`ClusterReader`] trait and the plain workload types below.
//! [`KubeClusterReader`] implements it on top of `kube`.

mod client;
mod selector;
mod workload;

use async_trait::async_trait;

use crate::{models::ObjectType, CgscopeResult, ListError};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use client::*;
pub use selector::*;
pub use workload::*;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A read-only view of the workloads in a cluster.
///
/// `namespace` limits a listing to one namespace; `None` lists across all namespaces.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Fails if the API server cannot be reached or rejects the credentials.
    async fn check_connectivity(&self) -> CgscopeResult<()>;

    /// Lists the controllers of `kind`. `kind` is never [`ObjectType::Pod`].
    async fn list_workloads(
        &self,
        kind: ObjectType,
        namespace: Option<&str>,
    ) -> Result<Vec<Workload>, ListError>;

    /// Lists pods, optionally restricted to those matching a label selector.
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<PodInfo>, ListError>;

    /// The host of the internal registry's external route, if the cluster exposes one.
    async fn registry_route(&self) -> CgscopeResult<Option<String>>;

    /// The cluster-wide registry pull secret as docker config JSON, if readable.
    async fn pull_secret(&self) -> CgscopeResult<Option<Vec<u8>>>;
}
