//! Kubernetes workload and service documents embedded in the deploy stage.
//!
//! Documents are built as typed values and serialized to YAML so that
//! user-supplied values (image reference, environment variables) are quoted
//! by the serializer rather than spliced into template text.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::project::ProjectType;

/// Port the service listens on; the port-forward targets it.
pub const SERVICE_PORT: u16 = 8080;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: DeploymentSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: ServiceSpec,
}

#[derive(Debug, Default, Serialize)]
struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct DeploymentSpec {
    replicas: u32,
    selector: LabelSelector,
    template: PodTemplate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelSelector {
    match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct PodTemplate {
    metadata: ObjectMeta,
    spec: PodSpec,
}

#[derive(Debug, Serialize)]
struct PodSpec {
    containers: Vec<Container>,
}

#[derive(Debug, Serialize)]
struct Container {
    name: String,
    image: String,
    ports: Vec<ContainerPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVar>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerPort {
    container_port: u16,
}

#[derive(Debug, Serialize)]
struct EnvVar {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ServiceSpec {
    selector: BTreeMap<String, String>,
    ports: Vec<ServicePort>,
    #[serde(rename = "type")]
    service_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServicePort {
    name: &'static str,
    protocol: &'static str,
    port: u16,
    target_port: u16,
}

fn app_labels(project: ProjectType) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), project.app_name())])
}

/// Single-replica deployment running `image` in `namespace`.
pub fn deployment(
    project: ProjectType,
    namespace: &str,
    image: &str,
    env: &BTreeMap<String, String>,
) -> Deployment {
    Deployment {
        api_version: "apps/v1",
        kind: "Deployment",
        metadata: ObjectMeta {
            name: Some(project.app_name()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: DeploymentSpec {
            replicas: 1,
            selector: LabelSelector {
                match_labels: app_labels(project),
            },
            template: PodTemplate {
                metadata: ObjectMeta {
                    labels: app_labels(project),
                    ..Default::default()
                },
                spec: PodSpec {
                    containers: vec![Container {
                        name: project.container_name(),
                        image: image.to_string(),
                        ports: vec![ContainerPort {
                            container_port: project.container_port(),
                        }],
                        env: env
                            .iter()
                            .map(|(name, value)| EnvVar {
                                name: name.clone(),
                                value: value.clone(),
                            })
                            .collect(),
                    }],
                },
            },
        },
    }
}

/// NodePort service in front of the deployment. The node port itself is
/// left for the cluster to allocate.
pub fn service(project: ProjectType, namespace: &str) -> Service {
    Service {
        api_version: "v1",
        kind: "Service",
        metadata: ObjectMeta {
            name: Some(project.service_name()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: ServiceSpec {
            selector: app_labels(project),
            ports: vec![ServicePort {
                name: "http",
                protocol: "TCP",
                port: SERVICE_PORT,
                target_port: project.container_port(),
            }],
            service_type: "NodePort",
        },
    }
}

pub fn to_yaml<T: Serialize>(document: &'static str, value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| PipelineError::Manifest {
        document,
        message: e.to_string(),
    })
}
