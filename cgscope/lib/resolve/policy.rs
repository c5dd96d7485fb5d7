use crate::{
    cluster::{PodInfo, Workload},
    config::{INFRA_POD_NAMESPACES, INFRA_POD_NAME_PATTERNS, JOB_NAME_LABEL, POD_CONTROLLER_KINDS},
    models::ObjectType,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// ReplicaSets owned by a Deployment or scaled to zero are not reported.
struct ReplicaSetPolicy;

/// Controllers resolved through their own label selector.
struct SelectorPolicy;

/// Jobs resolved through the `job-name` label.
struct JobPolicy;

/// CronJobs never resolve; their pods come and go.
struct CronJobPolicy;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// How one workload kind is reported and how its live pod is found.
pub trait WorkloadPolicy: Send + Sync {
    /// Returns true if the workload is a top-level controller worth reporting.
    fn is_reported(&self, _workload: &Workload) -> bool {
        true
    }

    /// The label selector of the pods whose status gives the effective images.
    ///
    /// `None` means no lookup is attempted and the template images are used.
    fn pod_selector(&self, workload: &Workload) -> Option<String>;
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl WorkloadPolicy for SelectorPolicy {
    fn pod_selector(&self, workload: &Workload) -> Option<String> {
        workload.get_selector().clone()
    }
}

impl WorkloadPolicy for ReplicaSetPolicy {
    fn is_reported(&self, workload: &Workload) -> bool {
        !workload.is_owned_by_any(&["Deployment"]) && *workload.get_replicas() != Some(0)
    }

    fn pod_selector(&self, workload: &Workload) -> Option<String> {
        workload.get_selector().clone()
    }
}

impl WorkloadPolicy for JobPolicy {
    fn is_reported(&self, workload: &Workload) -> bool {
        !workload.is_owned_by_any(&["CronJob"])
    }

    fn pod_selector(&self, workload: &Workload) -> Option<String> {
        Some(format!("{JOB_NAME_LABEL}={}", workload.get_name()))
    }
}

impl WorkloadPolicy for CronJobPolicy {
    fn pod_selector(&self, _workload: &Workload) -> Option<String> {
        None
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The policy of a controller kind. Pods have no policy; see [`is_reported_pod`].
pub fn policy_for(kind: ObjectType) -> Option<&'static dyn WorkloadPolicy> {
    match kind {
        ObjectType::Deployment
        | ObjectType::DeploymentConfig
        | ObjectType::StatefulSet
        | ObjectType::DaemonSet => Some(&SelectorPolicy),
        ObjectType::ReplicaSet => Some(&ReplicaSetPolicy),
        ObjectType::Job => Some(&JobPolicy),
        ObjectType::CronJob => Some(&CronJobPolicy),
        ObjectType::Pod => None,
    }
}

/// Returns true for standalone pods that no controller reports and that are not cluster
/// infrastructure.
pub fn is_reported_pod(pod: &PodInfo) -> bool {
    if INFRA_POD_NAMESPACES.contains(&pod.get_namespace().as_str()) {
        return false;
    }

    if pod.is_owned_by_any(POD_CONTROLLER_KINDS) || pod.is_mirror() {
        return false;
    }

    !INFRA_POD_NAME_PATTERNS
        .iter()
        .any(|pattern| pod.get_name().contains(pattern))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
