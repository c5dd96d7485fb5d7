use std::collections::BTreeMap;

use getset::Getters;
use typed_builder::TypedBuilder;

use crate::{config::MIRROR_POD_ANNOTATION, models::ObjectType};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A container as declared in a pod spec or pod template.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ContainerSpec {
    /// The container name.
    #[builder(setter(into))]
    pub(super) name: String,

    /// The declared image, possibly a short name.
    #[builder(default, setter(strip_option, into))]
    pub(super) image: Option<String>,
}

/// The live status of one container of a running pod.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ContainerStatusInfo {
    /// The container name.
    #[builder(setter(into))]
    pub(super) name: String,

    /// The image the kubelet actually started.
    #[builder(setter(into))]
    pub(super) image: String,

    /// The image ID reported by the container runtime.
    #[builder(default, setter(strip_option, into))]
    pub(super) image_id: Option<String>,
}

/// A workload controller with its pod template containers.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Workload {
    /// The controller kind.
    pub(super) kind: ObjectType,

    /// The controller name.
    #[builder(setter(into))]
    pub(super) name: String,

    /// The controller namespace.
    #[builder(setter(into))]
    pub(super) namespace: String,

    /// The kinds of the controller's owners.
    #[builder(default)]
    pub(super) owner_kinds: Vec<String>,

    /// The desired replica count, where the kind has one.
    #[builder(default, setter(strip_option))]
    pub(super) replicas: Option<i32>,

    /// The pod label selector in string form, empty selectors excluded.
    #[builder(default, setter(strip_option, into))]
    pub(super) selector: Option<String>,

    /// Template containers followed by template init containers.
    #[builder(default)]
    pub(super) containers: Vec<ContainerSpec>,
}

/// A pod with its declared containers and live container statuses.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct PodInfo {
    /// The pod name.
    #[builder(setter(into))]
    pub(super) name: String,

    /// The pod namespace.
    #[builder(setter(into))]
    pub(super) namespace: String,

    /// The pod annotations.
    #[builder(default)]
    pub(super) annotations: BTreeMap<String, String>,

    /// The kinds of the pod's owners.
    #[builder(default)]
    pub(super) owner_kinds: Vec<String>,

    /// Spec containers followed by spec init containers.
    #[builder(default)]
    pub(super) containers: Vec<ContainerSpec>,

    /// Container statuses followed by init container statuses.
    #[builder(default)]
    pub(super) statuses: Vec<ContainerStatusInfo>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Workload {
    /// Returns true if any owner is of one of `kinds`.
    pub fn is_owned_by_any(&self, kinds: &[&str]) -> bool {
        owned_by_any(&self.owner_kinds, kinds)
    }
}

impl PodInfo {
    /// Returns true if any owner is of one of `kinds`.
    pub fn is_owned_by_any(&self, kinds: &[&str]) -> bool {
        owned_by_any(&self.owner_kinds, kinds)
    }

    /// Returns true for static pods mirrored into the API by the kubelet.
    pub fn is_mirror(&self) -> bool {
        self.annotations.contains_key(MIRROR_POD_ANNOTATION)
    }

    /// The live status of the named container, if it has started with a known image.
    pub fn status_for(&self, container_name: &str) -> Option<&ContainerStatusInfo> {
        self.statuses
            .iter()
            .find(|status| status.name == container_name && !status.image.trim().is_empty())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn owned_by_any(owner_kinds: &[String], kinds: &[&str]) -> bool {
    owner_kinds
        .iter()
        .any(|owner| kinds.contains(&owner.as_str()))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
