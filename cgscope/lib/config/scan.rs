use std::{path::PathBuf, time::Duration};

use getset::Getters;
use typed_builder::TypedBuilder;

use crate::{filter::NamespaceScope, CgscopeError, CgscopeResult};

use super::{
    DEFAULT_CONCURRENCY, DEFAULT_EXPORT_TIMEOUT, DEFAULT_INTERNAL_REGISTRY, DEFAULT_PROBE_TIMEOUT,
    DEFAULT_PULL_TIMEOUT,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How to reach the cluster API.
///
/// When both `api_url` and `token` are set they are used directly. Otherwise the usual kubeconfig
/// and in-cluster inference applies.
#[derive(Debug, Clone, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ClusterConfig {
    /// The API server URL.
    #[builder(default)]
    api_url: Option<String>,

    /// A bearer token for the API server.
    #[builder(default)]
    token: Option<String>,

    /// Whether verification of the API server certificate is skipped.
    #[builder(default = true)]
    insecure_skip_tls_verify: bool,
}

/// The budgets and scratch space of the runtime probe.
#[derive(Debug, Clone, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ProbeConfig {
    /// The budget for pulling one image.
    #[builder(default = DEFAULT_PULL_TIMEOUT)]
    pull_timeout: Duration,

    /// The budget for exporting one image filesystem.
    #[builder(default = DEFAULT_EXPORT_TIMEOUT)]
    export_timeout: Duration,

    /// The budget for one version probe.
    #[builder(default = DEFAULT_PROBE_TIMEOUT)]
    probe_timeout: Duration,

    /// The directory temporary exports are created under.
    #[builder(default = std::env::temp_dir())]
    work_dir: PathBuf,
}

/// Everything a scan needs besides the cluster and image runtime handles.
#[derive(Debug, Clone, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ScanConfig {
    /// Which namespaces are collected.
    #[builder(default = NamespaceScope::All(Default::default()))]
    scope: NamespaceScope,

    /// Whether images are pulled and analyzed after resolution.
    #[builder(default)]
    analyze: bool,

    /// How many images are analyzed at the same time.
    #[builder(default = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// The probe budgets.
    #[builder(default = ProbeConfig::builder().build())]
    probe: ProbeConfig,

    /// The internal registry service address, as `host:port`.
    #[builder(default = DEFAULT_INTERNAL_REGISTRY.to_string(), setter(into))]
    internal_registry: String,

    /// The external registry route. Discovered from the cluster when unset.
    #[builder(default)]
    registry_route: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ClusterConfig {
    /// Returns true if explicit credentials were supplied.
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.api_url, &self.token),
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty()
        )
    }
}

impl ProbeConfig {
    /// Checks that every budget is usable.
    pub fn validate(&self) -> CgscopeResult<()> {
        for (name, budget) in [
            ("pull timeout", self.pull_timeout),
            ("export timeout", self.export_timeout),
            ("probe timeout", self.probe_timeout),
        ] {
            if budget.is_zero() {
                return Err(CgscopeError::InvalidArgument(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }
}

impl ScanConfig {
    /// Checks the configuration before a run starts.
    pub fn validate(&self) -> CgscopeResult<()> {
        if self.concurrency == 0 {
            return Err(CgscopeError::InvalidArgument(
                "concurrency must be at least 1".to_string(),
            ));
        }

        if self.internal_registry.trim().is_empty() {
            return Err(CgscopeError::InvalidArgument(
                "internal registry address must not be empty".to_string(),
            ));
        }

        self.probe.validate()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_defaults() -> anyhow::Result<()> {
        let config = ScanConfig::builder().build();
        config.validate()?;

        assert!(!*config.get_analyze());
        assert_eq!(*config.get_concurrency(), 1);
        assert_eq!(config.get_internal_registry(), DEFAULT_INTERNAL_REGISTRY);
        assert_eq!(config.get_registry_route(), &None);
        assert_eq!(*config.get_probe().get_pull_timeout(), Duration::from_secs(600));
        assert_eq!(*config.get_probe().get_export_timeout(), Duration::from_secs(600));
        assert_eq!(*config.get_probe().get_probe_timeout(), Duration::from_secs(60));
        assert!(config.get_scope().includes("anything"));
        Ok(())
    }

    #[test]
    fn test_scan_config_rejects_zero_budgets() {
        let config = ScanConfig::builder().concurrency(0).build();
        assert!(matches!(
            config.validate(),
            Err(CgscopeError::InvalidArgument(_))
        ));

        let probe = ProbeConfig::builder().probe_timeout(Duration::ZERO).build();
        let config = ScanConfig::builder().probe(probe).build();
        assert!(matches!(
            config.validate(),
            Err(CgscopeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cluster_config_credentials() {
        let config = ClusterConfig::builder().build();
        assert!(!config.has_credentials());
        assert!(*config.get_insecure_skip_tls_verify());

        let config = ClusterConfig::builder()
            .api_url(Some("https://api.demo.example.com:6443".to_string()))
            .token(Some("sha256~abc".to_string()))
            .build();
        assert!(config.has_credentials());
    }
}
