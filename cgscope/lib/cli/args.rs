use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    config::{
        ClusterConfig, ProbeConfig, ScanConfig, DEFAULT_CONCURRENCY, DEFAULT_EXPORT_TIMEOUT,
        DEFAULT_INTERNAL_REGISTRY, DEFAULT_PROBE_TIMEOUT, DEFAULT_PULL_TIMEOUT,
    },
    filter::NamespaceScope,
    orchestration::ReportFormat,
    CgscopeResult,
};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// `cgscope` inventories the container images running in a cluster and checks the Java, Node.js
/// and .NET runtimes inside them for cgroup v2 support
#[derive(Debug, Parser)]
#[command(name = "cgscope", author, about, version, styles=styles::styles())]
pub struct CgscopeArgs {
    /// Only collect from this namespace. Disables --exclude
    #[arg(short, long, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Skip namespaces matching this pattern (`*` matches any run of characters). Repeatable
    #[arg(short = 'x', long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Pull every distinct image and probe its language runtimes
    #[arg(short, long)]
    pub analyze: bool,

    /// How many images are analyzed at the same time
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Seconds allowed for pulling one image
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_PULL_TIMEOUT.as_secs())]
    pub pull_timeout: u64,

    /// Seconds allowed for exporting one image filesystem
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_EXPORT_TIMEOUT.as_secs())]
    pub export_timeout: u64,

    /// Seconds allowed for one version probe
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_PROBE_TIMEOUT.as_secs())]
    pub probe_timeout: u64,

    /// Directory temporary image exports are created in
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Registry credentials for pulling. Defaults to the cluster pull secret
    #[arg(long, value_name = "FILE")]
    pub authfile: Option<PathBuf>,

    /// The internal registry service address, as host:port
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_INTERNAL_REGISTRY)]
    pub internal_registry: String,

    /// External route of the internal registry. Discovered from the cluster when omitted
    #[arg(long, value_name = "HOST")]
    pub registry_route: Option<String>,

    /// The cluster API server URL
    #[arg(long, env = "OPENSHIFT_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// A bearer token for the API server
    #[arg(long, env = "OPENSHIFT_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip verification of the API server certificate
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_name = "BOOL"
    )]
    pub insecure_skip_tls_verify: bool,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Write the report into this directory as <cluster>-<timestamp>.<format>
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// The report format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Csv)]
    pub format: ReportFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl CgscopeArgs {
    /// How to reach the cluster.
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig::builder()
            .api_url(non_blank(&self.api_url))
            .token(non_blank(&self.token))
            .insecure_skip_tls_verify(self.insecure_skip_tls_verify)
            .build()
    }

    /// The scan settings. Fails on an invalid exclusion pattern.
    pub fn scan_config(&self) -> CgscopeResult<ScanConfig> {
        let scope = NamespaceScope::from_parts(self.namespace.clone(), &self.exclude)?;
        if scope.namespace().is_some() && !self.exclude.is_empty() {
            tracing::warn!("--namespace is set, ignoring --exclude");
        }

        let probe = ProbeConfig::builder()
            .pull_timeout(Duration::from_secs(self.pull_timeout))
            .export_timeout(Duration::from_secs(self.export_timeout))
            .probe_timeout(Duration::from_secs(self.probe_timeout))
            .work_dir(self.work_dir.clone().unwrap_or_else(std::env::temp_dir))
            .build();

        Ok(ScanConfig::builder()
            .scope(scope)
            .analyze(self.analyze)
            .concurrency(self.concurrency)
            .probe(probe)
            .internal_registry(self.internal_registry.clone())
            .registry_route(non_blank(&self.registry_route))
            .build())
    }
}

//-------------------------------------------------------------------------------------------------
// Functions: Helpers
//-------------------------------------------------------------------------------------------------

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
