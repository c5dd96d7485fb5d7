//! `cgscope` inventories the container images running in a cluster and checks whether the
//! language runtimes inside them read their resource limits from cgroup v2.
//!
//! # Overview
//!
//! A scan runs in two phases:
//!
//! - **Resolution** walks Deployments, DeploymentConfigs, StatefulSets, DaemonSets, CronJobs,
//!   ReplicaSets, Jobs and Pods. For every container it records the image the cluster actually
//!   pulled, taken from a live pod where one exists and from the object's template otherwise.
//! - **Analysis** (optional) pulls every distinct image once, exports its filesystem, looks for
//!   `java`, `node` and `dotnet`, runs each with its version flag inside a throwaway container
//!   and classifies the reported version against the published cgroup v2 minimums.
//!
//! The result is one report row per container, with the analysis of its image joined on.
//!
//! # Modules
//!
//! - [`cli`] - Command line arguments and terminal styling
//! - [`cluster`] - Read access to the cluster API
//! - [`compat`] - Version grammars and the compatibility matrix
//! - [`config`] - Scan settings and constants
//! - [`filter`] - Namespace selection
//! - [`models`] - Inventory records and analysis results
//! - [`orchestration`] - Running a scan and shaping its report
//! - [`probe`] - Pulling images and probing their runtimes
//! - [`resolve`] - Resolving workloads to images
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cgscope::{
//!     cluster::KubeClusterReader,
//!     config::{ClusterConfig, ScanConfig},
//!     orchestration::{AnalysisOrchestrator, ReportFormat},
//!     probe::PodmanRuntime,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = KubeClusterReader::connect(&ClusterConfig::builder().build()).await?;
//!     let runtime = PodmanRuntime::locate(None)?;
//!
//!     let report = AnalysisOrchestrator::new(Arc::new(reader), ScanConfig::builder().analyze(true).build())
//!         .with_runtime(Arc::new(runtime))
//!         .run()
//!         .await?;
//!
//!     report.write(ReportFormat::Csv, std::io::stdout())?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod cluster;
pub mod compat;
pub mod config;
pub mod filter;
pub mod models;
pub mod orchestration;
pub mod probe;
pub mod resolve;

pub use error::*;
