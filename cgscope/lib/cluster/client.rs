use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        batch::v1::{CronJob, Job},
        core::v1::{ContainerStatus, Pod, PodSpec, PodStatus, Secret},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
    NamespaceResourceScope,
};
use kube::{
    api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config, Resource,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::{
        ClusterConfig, DOCKER_CONFIG_JSON_KEY, LIST_PAGE_SIZE, PULL_SECRET_NAME,
        PULL_SECRET_NAMESPACE, REGISTRY_ROUTE_NAME, REGISTRY_ROUTE_NAMESPACE,
    },
    models::ObjectType,
    CgscopeError, CgscopeResult, ListError,
};

use super::{
    match_labels_string, selector_string, ClusterReader, ContainerSpec, ContainerStatusInfo,
    PodInfo, Workload,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const KUBECONFIG_ENTRY_NAME: &str = "cgscope";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`ClusterReader`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterReader {
    client: Client,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl KubeClusterReader {
    /// Creates a reader from an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from explicit credentials, falling back to kubeconfig inference.
    pub async fn connect(config: &ClusterConfig) -> CgscopeResult<Self> {
        let insecure = *config.get_insecure_skip_tls_verify();
        let mut kube_config = match (config.get_api_url(), config.get_token()) {
            (Some(api_url), Some(token)) if config.has_credentials() => {
                tracing::debug!("using explicit credentials for {api_url}");
                let kubeconfig = token_kubeconfig(api_url, token, insecure)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| CgscopeError::ClusterUnreachable(e.to_string()))?
            }
            _ => {
                tracing::debug!("inferring cluster configuration");
                Config::infer()
                    .await
                    .map_err(|e| CgscopeError::ClusterUnreachable(e.to_string()))?
            }
        };

        if insecure {
            kube_config.accept_invalid_certs = true;
        }

        let client = Client::try_from(kube_config)?;
        Ok(Self::new(client))
    }

    fn api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    fn dynamic_api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    async fn list_typed<K>(
        &self,
        namespace: Option<&str>,
        kind: ObjectType,
    ) -> Result<Vec<K>, ListError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        list_pages(&self.api::<K>(namespace), kind.as_str(), None).await
    }

    async fn list_deployment_configs(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Workload>, ListError> {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "apps.openshift.io",
            "v1",
            "DeploymentConfig",
        ));

        let api = self.dynamic_api(&resource, namespace);
        let objects = list_pages(&api, ObjectType::DeploymentConfig.as_str(), None).await?;
        Ok(objects.into_iter().map(deployment_config_workload).collect())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn check_connectivity(&self) -> CgscopeResult<()> {
        let version = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| CgscopeError::ClusterUnreachable(e.to_string()))?;
        tracing::info!("connected to API server {}", version.git_version);

        // The version endpoint is often anonymous; a list call proves the credentials.
        let probe = self
            .api::<Pod>(None)
            .list_metadata(&ListParams::default().limit(1))
            .await;
        match probe {
            Err(kube::Error::Api(response)) if response.code == 401 => Err(
                CgscopeError::ClusterUnreachable(format!("unauthenticated: {}", response.message)),
            ),
            Err(e) => {
                tracing::warn!("credential check did not complete: {e}");
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }

    async fn list_workloads(
        &self,
        kind: ObjectType,
        namespace: Option<&str>,
    ) -> Result<Vec<Workload>, ListError> {
        let workloads = match kind {
            ObjectType::Deployment => self
                .list_typed::<Deployment>(namespace, kind)
                .await?
                .into_iter()
                .map(deployment_workload)
                .collect(),
            ObjectType::DeploymentConfig => self.list_deployment_configs(namespace).await?,
            ObjectType::StatefulSet => self
                .list_typed::<StatefulSet>(namespace, kind)
                .await?
                .into_iter()
                .map(stateful_set_workload)
                .collect(),
            ObjectType::DaemonSet => self
                .list_typed::<DaemonSet>(namespace, kind)
                .await?
                .into_iter()
                .map(daemon_set_workload)
                .collect(),
            ObjectType::ReplicaSet => self
                .list_typed::<ReplicaSet>(namespace, kind)
                .await?
                .into_iter()
                .map(replica_set_workload)
                .collect(),
            ObjectType::Job => self
                .list_typed::<Job>(namespace, kind)
                .await?
                .into_iter()
                .map(job_workload)
                .collect(),
            ObjectType::CronJob => self
                .list_typed::<CronJob>(namespace, kind)
                .await?
                .into_iter()
                .map(cron_job_workload)
                .collect(),
            ObjectType::Pod => {
                return Err(ListError::Transport {
                    kind: kind.to_string(),
                    message: "pods are listed with list_pods".to_string(),
                })
            }
        };

        Ok(workloads)
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<PodInfo>, ListError> {
        let api = self.api::<Pod>(namespace);
        let pods = list_pages(&api, ObjectType::Pod.as_str(), selector).await?;
        Ok(pods.into_iter().map(pod_info).collect())
    }

    async fn registry_route(&self) -> CgscopeResult<Option<String>> {
        let resource =
            ApiResource::from_gvk(&GroupVersionKind::gvk("route.openshift.io", "v1", "Route"));
        let api = self.dynamic_api(&resource, Some(REGISTRY_ROUTE_NAMESPACE));

        let Some(route) = api.get_opt(REGISTRY_ROUTE_NAME).await? else {
            return Ok(None);
        };

        Ok(route
            .data
            .pointer("/spec/host")
            .and_then(Value::as_str)
            .filter(|host| !host.is_empty())
            .map(str::to_string))
    }

    async fn pull_secret(&self) -> CgscopeResult<Option<Vec<u8>>> {
        let api = self.api::<Secret>(Some(PULL_SECRET_NAMESPACE));
        let Some(secret) = api.get_opt(PULL_SECRET_NAME).await? else {
            return Ok(None);
        };

        Ok(secret
            .data
            .and_then(|mut data| data.remove(DOCKER_CONFIG_JSON_KEY))
            .map(|bytes| bytes.0))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Lists every object, following continue tokens.
async fn list_pages<K>(
    api: &Api<K>,
    kind: &str,
    selector: Option<&str>,
) -> Result<Vec<K>, ListError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut items = Vec::new();
    let mut continue_token: Option<String> = None;

    loop {
        let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
        if let Some(selector) = selector {
            params = params.labels(selector);
        }
        if let Some(token) = &continue_token {
            params = params.continue_token(token);
        }

        let page = api
            .list(&params)
            .await
            .map_err(|e| ListError::from_kube(kind, &e))?;
        items.extend(page.items);

        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => continue_token = Some(token),
            _ => break,
        }
    }

    tracing::debug!("listed {} {kind} object(s)", items.len());
    Ok(items)
}

fn token_kubeconfig(api_url: &str, token: &str, insecure: bool) -> CgscopeResult<Kubeconfig> {
    let document = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": KUBECONFIG_ENTRY_NAME,
            "cluster": { "server": api_url, "insecure-skip-tls-verify": insecure },
        }],
        "users": [{
            "name": KUBECONFIG_ENTRY_NAME,
            "user": { "token": token },
        }],
        "contexts": [{
            "name": KUBECONFIG_ENTRY_NAME,
            "context": { "cluster": KUBECONFIG_ENTRY_NAME, "user": KUBECONFIG_ENTRY_NAME },
        }],
        "current-context": KUBECONFIG_ENTRY_NAME,
    });

    Ok(serde_json::from_value(document)?)
}

fn owner_kinds(metadata: &ObjectMeta) -> Vec<String> {
    metadata
        .owner_references
        .iter()
        .flatten()
        .map(|owner| owner.kind.clone())
        .collect()
}

fn containers(spec: Option<&PodSpec>) -> Vec<ContainerSpec> {
    let Some(spec) = spec else {
        return Vec::new();
    };

    spec.containers
        .iter()
        .chain(spec.init_containers.iter().flatten())
        .map(|container| ContainerSpec {
            name: container.name.clone(),
            image: container.image.clone(),
        })
        .collect()
}

fn statuses(status: Option<&PodStatus>) -> Vec<ContainerStatusInfo> {
    let Some(status) = status else {
        return Vec::new();
    };

    status
        .container_statuses
        .iter()
        .flatten()
        .chain(status.init_container_statuses.iter().flatten())
        .map(|container: &ContainerStatus| ContainerStatusInfo {
            name: container.name.clone(),
            image: container.image.clone(),
            image_id: Some(container.image_id.clone()).filter(|id| !id.is_empty()),
        })
        .collect()
}

fn workload(kind: ObjectType, metadata: &ObjectMeta) -> Workload {
    Workload {
        kind,
        name: metadata.name.clone().unwrap_or_default(),
        namespace: metadata.namespace.clone().unwrap_or_default(),
        owner_kinds: owner_kinds(metadata),
        replicas: None,
        selector: None,
        containers: Vec::new(),
    }
}

fn pod_info(pod: Pod) -> PodInfo {
    PodInfo {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        annotations: pod.metadata.annotations.clone().unwrap_or_default(),
        owner_kinds: owner_kinds(&pod.metadata),
        containers: containers(pod.spec.as_ref()),
        statuses: statuses(pod.status.as_ref()),
    }
}

fn deployment_workload(deployment: Deployment) -> Workload {
    let mut workload = workload(ObjectType::Deployment, &deployment.metadata);
    if let Some(spec) = deployment.spec {
        workload.replicas = spec.replicas;
        workload.selector = selector_string(Some(&spec.selector));
        workload.containers = containers(spec.template.spec.as_ref());
    }
    workload
}

fn stateful_set_workload(stateful_set: StatefulSet) -> Workload {
    let mut workload = workload(ObjectType::StatefulSet, &stateful_set.metadata);
    if let Some(spec) = stateful_set.spec {
        workload.replicas = spec.replicas;
        workload.selector = selector_string(Some(&spec.selector));
        workload.containers = containers(spec.template.spec.as_ref());
    }
    workload
}

fn daemon_set_workload(daemon_set: DaemonSet) -> Workload {
    let mut workload = workload(ObjectType::DaemonSet, &daemon_set.metadata);
    if let Some(spec) = daemon_set.spec {
        workload.selector = selector_string(Some(&spec.selector));
        workload.containers = containers(spec.template.spec.as_ref());
    }
    workload
}

fn replica_set_workload(replica_set: ReplicaSet) -> Workload {
    let mut workload = workload(ObjectType::ReplicaSet, &replica_set.metadata);
    if let Some(spec) = replica_set.spec {
        workload.replicas = spec.replicas;
        workload.selector = selector_string(Some(&spec.selector));
        workload.containers = containers(spec.template.as_ref().and_then(|t| t.spec.as_ref()));
    }
    workload
}

fn job_workload(job: Job) -> Workload {
    let mut workload = workload(ObjectType::Job, &job.metadata);
    if let Some(spec) = job.spec {
        workload.selector = selector_string(spec.selector.as_ref());
        workload.containers = containers(spec.template.spec.as_ref());
    }
    workload
}

fn cron_job_workload(cron_job: CronJob) -> Workload {
    let mut workload = workload(ObjectType::CronJob, &cron_job.metadata);
    if let Some(spec) = cron_job.spec {
        let pod_spec = spec
            .job_template
            .spec
            .as_ref()
            .and_then(|job| job.template.spec.as_ref());
        workload.containers = containers(pod_spec);
    }
    workload
}

fn deployment_config_workload(object: DynamicObject) -> Workload {
    let mut workload = workload(ObjectType::DeploymentConfig, &object.metadata);
    let Some(spec) = object.data.get("spec") else {
        return workload;
    };

    workload.replicas = spec
        .get("replicas")
        .and_then(Value::as_i64)
        .and_then(|replicas| i32::try_from(replicas).ok());

    workload.selector = spec
        .get("selector")
        .and_then(|selector| serde_json::from_value::<BTreeMap<String, String>>(selector.clone()).ok())
        .and_then(|labels| match_labels_string(Some(&labels)));

    match spec.pointer("/template/spec").cloned().map(serde_json::from_value::<PodSpec>) {
        Some(Ok(pod_spec)) => workload.containers = containers(Some(&pod_spec)),
        Some(Err(e)) => tracing::warn!(
            "unreadable pod template in DeploymentConfig {}/{}: {e}",
            workload.namespace,
            workload.name
        ),
        None => {}
    }

    workload
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        api::{
            apps::v1::DeploymentSpec,
            core::v1::{Container, PodTemplateSpec},
        },
        apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
    };

    use super::*;

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_deployment_conversion_keeps_init_containers_last() {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("shop".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(0),
                selector: LabelSelector {
                    match_labels: Some([("app".to_string(), "web".to_string())].into()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![container("app", "quay.io/org/web:2")],
                        init_containers: Some(vec![container("migrate", "quay.io/org/db:1")]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        };

        let workload = deployment_workload(deployment);
        assert_eq!(workload.get_name(), "web");
        assert_eq!(workload.get_replicas(), &Some(0));
        assert_eq!(workload.get_selector().as_deref(), Some("app=web"));
        let names: Vec<_> = workload
            .get_containers()
            .iter()
            .map(|c| c.get_name().as_str())
            .collect();
        assert_eq!(names, ["app", "migrate"]);
    }

    #[test]
    fn test_pod_conversion_reads_owners_and_statuses() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-abc".to_string()),
                namespace: Some("shop".to_string()),
                owner_references: Some(vec![OwnerReference {
                    kind: "ReplicaSet".to_string(),
                    name: "web-6d4".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container("app", "web:2")],
                ..Default::default()
            }),
            status: Some(PodStatus {
                container_statuses: Some(vec![ContainerStatus {
                    name: "app".to_string(),
                    image: "quay.io/org/web:2".to_string(),
                    image_id: "quay.io/org/web@sha256:01".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        };

        let info = pod_info(pod);
        assert!(info.is_owned_by_any(&["ReplicaSet"]));
        let status = info.status_for("app").unwrap();
        assert_eq!(status.get_image(), "quay.io/org/web:2");
        assert_eq!(status.get_image_id().as_deref(), Some("quay.io/org/web@sha256:01"));
    }

    #[test]
    fn test_deployment_config_conversion() -> anyhow::Result<()> {
        let object: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": { "name": "api", "namespace": "legacy" },
            "spec": {
                "replicas": 2,
                "selector": { "deploymentconfig": "api" },
                "template": {
                    "spec": {
                        "containers": [{ "name": "api", "image": "api:latest" }]
                    }
                }
            }
        }))?;

        let workload = deployment_config_workload(object);
        assert_eq!(workload.get_kind(), &ObjectType::DeploymentConfig);
        assert_eq!(workload.get_replicas(), &Some(2));
        assert_eq!(workload.get_selector().as_deref(), Some("deploymentconfig=api"));
        assert_eq!(workload.get_containers().len(), 1);
        Ok(())
    }

    #[test]
    fn test_token_kubeconfig_selects_its_context() -> anyhow::Result<()> {
        let kubeconfig = token_kubeconfig("https://api.demo.example.com:6443", "sha256~t", true)?;
        assert_eq!(kubeconfig.current_context.as_deref(), Some(KUBECONFIG_ENTRY_NAME));
        assert_eq!(kubeconfig.clusters.len(), 1);
        assert_eq!(kubeconfig.auth_infos.len(), 1);
        Ok(())
    }
}
