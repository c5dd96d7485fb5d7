//! Records produced by resolution and analysis.

use std::fmt;

use getset::Getters;
use serde::Serialize;

use crate::{compat::RuntimeKind, config::NOT_FOUND};

//--------------------------------------------------------------------------------------------------
// Types: Inventory
//--------------------------------------------------------------------------------------------------

/// The kind of object a container was inventoried from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ObjectType {
    /// A standalone pod.
    Pod,

    /// An `apps/v1` Deployment.
    Deployment,

    /// An OpenShift `apps.openshift.io/v1` DeploymentConfig.
    DeploymentConfig,

    /// An `apps/v1` StatefulSet.
    StatefulSet,

    /// An `apps/v1` DaemonSet.
    DaemonSet,

    /// A standalone `apps/v1` ReplicaSet.
    ReplicaSet,

    /// A standalone `batch/v1` Job.
    Job,

    /// A `batch/v1` CronJob.
    CronJob,
}

/// One container of one owning object, with the image the cluster actually runs.
///
/// `image_reference` is never empty. When no live pod status is available it holds the image
/// declared in the object's spec.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize)]
#[getset(get = "pub with_prefix")]
pub struct ContainerImageRecord {
    /// The container name.
    container_name: String,

    /// The namespace of the owning object.
    namespace: String,

    /// The kind of the owning object.
    object_type: ObjectType,

    /// The name of the owning object.
    object_name: String,

    /// The resolved image reference.
    image_reference: String,

    /// The image ID reported by the live pod, if one was consulted.
    image_id: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Types: Analysis
//--------------------------------------------------------------------------------------------------

/// A language runtime family probed inside every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RuntimeFamily {
    /// Any Java runtime (OpenJDK, HotSpot, IBM Semeru, IBM Java).
    Java,

    /// Node.js.
    Node,

    /// .NET.
    Dotnet,
}

/// Whether a runtime reads its resource limits from the cgroup v2 hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Compatibility {
    /// The runtime version is at or above its family's minimum.
    Yes,

    /// The runtime version is below its family's minimum.
    No,

    /// No binary was found, or its version could not be determined.
    #[serde(rename = "N/A")]
    NotApplicable,
}

/// What the probe learned about one runtime family inside one image.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct RuntimeFinding {
    /// The in-image path of the binary, if one was found.
    binary_path: Option<String>,

    /// The version text extracted from the probe output, empty if none.
    version: String,

    /// The vendor grammar that parsed the version.
    runtime: Option<RuntimeKind>,

    /// The verdict.
    compatibility: Compatibility,
}

/// The analysis of one distinct image reference.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AnalysisResult {
    /// The image reference as resolved from the cluster (before any registry rewrite).
    image_reference: String,

    /// The Java finding.
    java: RuntimeFinding,

    /// The Node.js finding.
    node: RuntimeFinding,

    /// The .NET finding.
    dotnet: RuntimeFinding,

    /// Every problem met while analyzing, joined with `; `.
    analysis_error: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ObjectType {
    /// Every object type in collection order: top-level controllers first, then standalone
    /// intermediate controllers, then standalone pods.
    pub const ALL: [ObjectType; 8] = [
        ObjectType::Deployment,
        ObjectType::DeploymentConfig,
        ObjectType::StatefulSet,
        ObjectType::DaemonSet,
        ObjectType::CronJob,
        ObjectType::ReplicaSet,
        ObjectType::Job,
        ObjectType::Pod,
    ];

    /// The Kubernetes kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Pod => "Pod",
            ObjectType::Deployment => "Deployment",
            ObjectType::DeploymentConfig => "DeploymentConfig",
            ObjectType::StatefulSet => "StatefulSet",
            ObjectType::DaemonSet => "DaemonSet",
            ObjectType::ReplicaSet => "ReplicaSet",
            ObjectType::Job => "Job",
            ObjectType::CronJob => "CronJob",
        }
    }
}

impl ContainerImageRecord {
    /// Creates a record, returning `None` when there is no image to report.
    pub fn new(
        container_name: impl Into<String>,
        namespace: impl Into<String>,
        object_type: ObjectType,
        object_name: impl Into<String>,
        image_reference: impl Into<String>,
        image_id: Option<String>,
    ) -> Option<Self> {
        let image_reference = image_reference.into();
        if image_reference.trim().is_empty() {
            return None;
        }

        Some(Self {
            container_name: container_name.into(),
            namespace: namespace.into(),
            object_type,
            object_name: object_name.into(),
            image_reference,
            image_id: image_id.filter(|id| !id.is_empty()),
        })
    }
}

impl RuntimeFamily {
    /// Every family, in report column order.
    pub const ALL: [RuntimeFamily; 3] = [
        RuntimeFamily::Java,
        RuntimeFamily::Node,
        RuntimeFamily::Dotnet,
    ];

    /// The executable names searched for in an image.
    pub fn binary_names(&self) -> &'static [&'static str] {
        match self {
            RuntimeFamily::Java => &["java"],
            RuntimeFamily::Node => &["node"],
            RuntimeFamily::Dotnet => &["dotnet"],
        }
    }

    /// The arguments that make the binary print its version.
    pub fn version_args(&self) -> &'static [&'static str] {
        match self {
            RuntimeFamily::Java => &["-version"],
            RuntimeFamily::Node => &["--version"],
            RuntimeFamily::Dotnet => &["--version"],
        }
    }

    /// A human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RuntimeFamily::Java => "Java",
            RuntimeFamily::Node => "Node.js",
            RuntimeFamily::Dotnet => ".NET",
        }
    }
}

impl Compatibility {
    /// The report spelling of the verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compatibility::Yes => "Yes",
            Compatibility::No => "No",
            Compatibility::NotApplicable => "N/A",
        }
    }
}

impl RuntimeFinding {
    /// No binary of the family exists in the image.
    pub fn not_found() -> Self {
        Self {
            binary_path: None,
            version: String::new(),
            runtime: None,
            compatibility: Compatibility::NotApplicable,
        }
    }

    /// A binary exists but its version could not be determined.
    pub fn unversioned(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: Some(binary_path.into()),
            version: String::new(),
            runtime: None,
            compatibility: Compatibility::NotApplicable,
        }
    }

    /// A binary exists and its version was classified.
    pub fn classified(
        binary_path: impl Into<String>,
        version: impl Into<String>,
        runtime: RuntimeKind,
        compatibility: Compatibility,
    ) -> Self {
        Self {
            binary_path: Some(binary_path.into()),
            version: version.into(),
            runtime: Some(runtime),
            compatibility,
        }
    }

    /// The binary path as reported, `None` when absent.
    pub fn binary_display(&self) -> &str {
        self.binary_path.as_deref().unwrap_or(NOT_FOUND)
    }
}

impl AnalysisResult {
    /// A result with no binaries found and no error.
    pub fn new(image_reference: impl Into<String>) -> Self {
        Self {
            image_reference: image_reference.into(),
            java: RuntimeFinding::not_found(),
            node: RuntimeFinding::not_found(),
            dotnet: RuntimeFinding::not_found(),
            analysis_error: None,
        }
    }

    /// A result for an image that could not be analyzed at all.
    pub fn failed(image_reference: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut result = Self::new(image_reference);
        result.push_error(error);
        result
    }

    /// The finding for `family`.
    pub fn finding(&self, family: RuntimeFamily) -> &RuntimeFinding {
        match family {
            RuntimeFamily::Java => &self.java,
            RuntimeFamily::Node => &self.node,
            RuntimeFamily::Dotnet => &self.dotnet,
        }
    }

    /// Replaces the finding for `family`.
    pub fn set_finding(&mut self, family: RuntimeFamily, finding: RuntimeFinding) {
        match family {
            RuntimeFamily::Java => self.java = finding,
            RuntimeFamily::Node => self.node = finding,
            RuntimeFamily::Dotnet => self.dotnet = finding,
        }
    }

    /// Appends a problem to `analysis_error`.
    pub fn push_error(&mut self, error: impl fmt::Display) {
        let error = error.to_string();
        match &mut self.analysis_error {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(&error);
            }
            None => self.analysis_error = Some(error),
        }
    }

    /// Returns true if the analysis recorded any problem.
    pub fn has_error(&self) -> bool {
        self.analysis_error.is_some()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_requires_an_image() {
        assert!(ContainerImageRecord::new("app", "ns", ObjectType::Pod, "p", "  ", None).is_none());

        let record = ContainerImageRecord::new(
            "app",
            "ns",
            ObjectType::Pod,
            "p",
            "quay.io/org/app:1",
            Some(String::new()),
        )
        .unwrap();
        assert_eq!(record.get_image_reference(), "quay.io/org/app:1");
        assert_eq!(record.get_image_id(), &None);
    }

    #[test]
    fn test_failed_result_defaults_every_family() {
        let result = AnalysisResult::failed("quay.io/org/app:1", "pull denied");
        for family in RuntimeFamily::ALL {
            let finding = result.finding(family);
            assert_eq!(finding.binary_display(), "None");
            assert_eq!(finding.get_compatibility(), &Compatibility::NotApplicable);
        }
        assert_eq!(result.get_analysis_error().as_deref(), Some("pull denied"));
    }

    #[test]
    fn test_push_error_joins_messages() {
        let mut result = AnalysisResult::new("img");
        assert!(!result.has_error());
        result.push_error("first");
        result.push_error("second");
        assert_eq!(result.get_analysis_error().as_deref(), Some("first; second"));
    }
}
