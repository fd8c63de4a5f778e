//! # Receive Adapter
//!
//! The Knative Service running `gitlab-receive-adapter` for one source.
//!
//! Adapter names are generated, so the adapter of a source is found by
//! listing labelled services and filtering on the controller owner
//! reference, never by name.

use crate::config::ControllerConfig;
use crate::constants::{
    ADAPTER_METRICS_DOMAIN, DEFAULT_ADAPTER_METRICS_PORT, RECEIVE_ADAPTER_LABEL_KEY,
    RECEIVE_ADAPTER_LABEL_VALUE,
};
use crate::crd::GitLabSource;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

/// Observed state of a receive adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub name: String,
    /// UIDs of controller owner references
    pub controller_uids: Vec<String>,
    pub ready: bool,
    pub address: Option<String>,
}

impl Receiver {
    #[must_use]
    pub fn is_controlled_by(&self, uid: &str) -> bool {
        self.controller_uids.iter().any(|u| u == uid)
    }
}

/// Desired receive adapter
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverSpec {
    pub generate_name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub owner: OwnerReference,
    pub service_account_name: Option<String>,
    pub image: String,
    pub env: Vec<EnvVar>,
}

/// Where receive adapters run
#[async_trait]
pub trait ReceiverPlatform: Send + Sync {
    /// All receive adapters in a namespace, whoever owns them
    async fn list(&self, namespace: &str) -> Result<Vec<Receiver>>;

    async fn create(&self, spec: &ReceiverSpec) -> Result<Receiver>;
}

/// Build the adapter for `source`, delivering to `sink_uri`
///
/// # Errors
/// Fails when the source has no UID or namespace yet.
pub fn receiver_spec(
    source: &GitLabSource,
    sink_uri: &str,
    config: &ControllerConfig,
) -> Result<ReceiverSpec> {
    let owner = source
        .controller_owner_ref(&())
        .context("GitLabSource has no uid")?;
    let namespace = source.namespace().context("GitLabSource has no namespace")?;

    let mut env = Vec::new();
    if let Some(secret_token) = &source.spec.secret_token {
        env.push(EnvVar {
            name: "GITLAB_SECRET_TOKEN".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret_token.secret_key_ref.name.clone(),
                    key: secret_token.secret_key_ref.key.clone(),
                    optional: None,
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        });
    }
    env.extend(
        [
            ("GITLAB_EVENT_SOURCE", source.event_source()),
            ("K_SINK", sink_uri.to_string()),
            ("NAMESPACE", namespace.clone()),
            ("METRICS_DOMAIN", ADAPTER_METRICS_DOMAIN.to_string()),
            (
                "METRICS_PROMETHEUS_PORT",
                DEFAULT_ADAPTER_METRICS_PORT.to_string(),
            ),
            ("RUST_LOG", config.adapter_log_level.clone()),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_string(),
            value: Some(value),
            value_from: None,
        }),
    );

    Ok(ReceiverSpec {
        generate_name: format!("{}-", source.name_any()),
        namespace,
        labels: BTreeMap::from([(
            RECEIVE_ADAPTER_LABEL_KEY.to_string(),
            RECEIVE_ADAPTER_LABEL_VALUE.to_string(),
        )]),
        owner,
        service_account_name: source.spec.service_account_name.clone(),
        image: config.receive_adapter_image.clone(),
        env,
    })
}

/// `serving.knative.dev/v1` Service
#[must_use]
pub fn knative_service_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("serving.knative.dev", "v1", "Service"))
}

/// Receive adapters as Knative Services
#[derive(Clone)]
pub struct KnativeReceiverPlatform {
    client: Client,
    resource: ApiResource,
}

impl std::fmt::Debug for KnativeReceiverPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnativeReceiverPlatform")
            .field("resource", &self.resource.api_version)
            .finish_non_exhaustive()
    }
}

impl KnativeReceiverPlatform {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: knative_service_resource(),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }
}

#[async_trait]
impl ReceiverPlatform for KnativeReceiverPlatform {
    async fn list(&self, namespace: &str) -> Result<Vec<Receiver>> {
        let selector = format!("{RECEIVE_ADAPTER_LABEL_KEY}={RECEIVE_ADAPTER_LABEL_VALUE}");
        let services = self
            .api(namespace)
            .list(&ListParams::default().labels(&selector))
            .await
            .context("Failed to list receive adapters")?;
        Ok(services.items.iter().map(receiver_from_object).collect())
    }

    async fn create(&self, spec: &ReceiverSpec) -> Result<Receiver> {
        let object = knative_service(spec, &self.resource)?;
        let created = self
            .api(&spec.namespace)
            .create(&PostParams::default(), &object)
            .await
            .context("Failed to create receive adapter")?;
        info!(
            receiver.name = %created.name_any(),
            receiver.namespace = %spec.namespace,
            "Created receive adapter"
        );
        Ok(receiver_from_object(&created))
    }
}

fn knative_service(spec: &ReceiverSpec, resource: &ApiResource) -> Result<DynamicObject> {
    let value = json!({
        "apiVersion": resource.api_version,
        "kind": resource.kind,
        "metadata": {
            "generateName": spec.generate_name,
            "namespace": spec.namespace,
            "labels": spec.labels,
            "ownerReferences": [spec.owner],
        },
        "spec": {
            "template": {
                "metadata": { "labels": spec.labels },
                "spec": {
                    "serviceAccountName": spec.service_account_name,
                    "containers": [{
                        "image": spec.image,
                        "env": spec.env,
                    }],
                },
            },
        },
    });
    serde_json::from_value(value).context("Failed to build Knative Service")
}

/// Read readiness and address off a Knative Service
pub(crate) fn receiver_from_object(object: &DynamicObject) -> Receiver {
    let status = object.data.get("status");
    let ready = status
        .and_then(|s| s.get("conditions"))
        .and_then(serde_json::Value::as_array)
        .is_some_and(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(serde_json::Value::as_str) == Some("Ready")
                    && c.get("status").and_then(serde_json::Value::as_str) == Some("True")
            })
        });
    let address = status
        .and_then(|s| s.get("url").or_else(|| s.pointer("/address/url")))
        .and_then(serde_json::Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string);
    let controller_uids = object
        .metadata
        .owner_references
        .iter()
        .flatten()
        .filter(|owner| owner.controller == Some(true))
        .map(|owner| owner.uid.clone())
        .collect();

    Receiver {
        name: object.name_any(),
        controller_uids,
        ready,
        address,
    }
}
