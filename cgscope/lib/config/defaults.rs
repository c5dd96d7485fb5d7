use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants: Cluster
//--------------------------------------------------------------------------------------------------

/// The in-cluster address of the OpenShift internal image registry service.
pub const DEFAULT_INTERNAL_REGISTRY: &str = "image-registry.openshift-image-registry.svc:5000";

/// The namespace holding the internal registry's external route.
pub const REGISTRY_ROUTE_NAMESPACE: &str = "openshift-image-registry";

/// The name of the internal registry's external route.
pub const REGISTRY_ROUTE_NAME: &str = "default-route";

/// The namespace holding the cluster-wide pull secret.
pub const PULL_SECRET_NAMESPACE: &str = "openshift-config";

/// The name of the cluster-wide pull secret.
pub const PULL_SECRET_NAME: &str = "pull-secret";

/// The data key of a docker config secret.
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// The page size used when listing objects.
pub const LIST_PAGE_SIZE: u32 = 500;

/// The label the Job controller stamps on the pods it creates.
pub const JOB_NAME_LABEL: &str = "job-name";

/// Annotation marking a static (mirror) pod managed by the kubelet.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// Owner kinds whose pods are reported through the owner instead.
pub const POD_CONTROLLER_KINDS: &[&str] = &[
    "ReplicaSet",
    "StatefulSet",
    "DaemonSet",
    "Job",
    "Deployment",
    "ReplicationController",
    "Node",
    "CatalogSource",
    "ConfigMap",
];

/// Control-plane namespaces whose standalone pods are never reported.
pub const INFRA_POD_NAMESPACES: &[&str] = &[
    "openshift-etcd",
    "openshift-kube-apiserver",
    "openshift-kube-controller-manager",
    "openshift-kube-scheduler",
];

/// Name fragments of installer and guard pods that are never reported.
pub const INFRA_POD_NAME_PATTERNS: &[&str] = &[
    "installer-",
    "revision-pruner-",
    "guard-",
    "kube-rbac-proxy-crio-",
];

//--------------------------------------------------------------------------------------------------
// Constants: Analysis
//--------------------------------------------------------------------------------------------------

/// The default number of images analyzed at the same time.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// The default budget for pulling one image.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// The default budget for exporting one image filesystem.
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(600);

/// The default budget for one version probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// The prefix of every temporary export directory.
pub const EXPORT_DIR_PREFIX: &str = "cgscope-rootfs-";

/// The sub directory of an export directory that receives the image filesystem.
pub const ROOTFS_SUBDIR: &str = "rootfs";

/// In-image path prefixes that never hold a runtime binary worth probing.
pub const EXCLUDED_PATH_PREFIXES: &[&str] = &[
    "/var/lib/alternatives/",
    "/var/lib/dpkg/alternatives/",
    "/etc/alternatives/",
    "/usr/share/bash-completion/",
    "/etc/bash_completion.d/",
];

/// In-image path fragments that never hold a runtime binary worth probing.
pub const EXCLUDED_PATH_FRAGMENTS: &[&str] = &["/.dotnet/optimizationdata/"];

/// The maximum number of symlink hops followed while resolving a candidate binary.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// The value reported for a binary that was not found.
pub const NOT_FOUND: &str = "None";
