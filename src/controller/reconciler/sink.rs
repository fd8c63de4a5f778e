//! # Sink Resolution
//!
//! Turns a `Destination` into the URI the receive adapter delivers to.
//!
//! A `ref` must point at an Addressable: an object publishing
//! `status.address.url`. Core `v1` Services are addressed through cluster
//! DNS. A `uri` next to a `ref` is resolved relative to the ref's address.

use crate::crd::{Destination, KReference};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink has neither a ref nor a uri")]
    Missing,
    #[error("sink {kind} \"{namespace}/{name}\" not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("sink {kind} \"{namespace}/{name}\" does not expose an address")]
    NoAddress {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("sink URI {uri:?} is invalid: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("failed to read sink: {0}")]
    Kube(#[from] kube::Error),
}

impl SinkError {
    /// Kubernetes API failures are worth an immediate retry; the rest waits
    /// for the sink or the source to change
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Kube(_))
    }
}

/// Resolves a sink declaration to a URI
#[async_trait]
pub trait SinkResolver: Send + Sync {
    /// `namespace` is the source's namespace, the default for refs
    async fn resolve(&self, namespace: &str, destination: &Destination) -> Result<String, SinkError>;
}

/// Resolves refs against the Kubernetes API
#[derive(Clone)]
pub struct KubeSinkResolver {
    client: Client,
}

impl std::fmt::Debug for KubeSinkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSinkResolver").finish_non_exhaustive()
    }
}

impl KubeSinkResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn address_of(&self, namespace: &str, reference: &KReference) -> Result<Url, SinkError> {
        let namespace = reference.namespace.as_deref().unwrap_or(namespace);
        let not_found = || SinkError::NotFound {
            kind: reference.kind.clone(),
            namespace: namespace.to_string(),
            name: reference.name.clone(),
        };

        if is_core_service(reference) {
            let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
            services.get_opt(&reference.name).await?.ok_or_else(not_found)?;
            return parse_uri(&service_address(&reference.name, namespace));
        }

        let (group, version) = split_api_version(&reference.api_version);
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, &reference.kind));
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &resource);
        let object = api.get_opt(&reference.name).await?.ok_or_else(not_found)?;
        let address = address_from_status(&object.data).ok_or_else(|| SinkError::NoAddress {
            kind: reference.kind.clone(),
            namespace: namespace.to_string(),
            name: reference.name.clone(),
        })?;
        debug!(sink.kind = %reference.kind, sink.name = %reference.name, sink.address = address, "Resolved sink ref");
        parse_uri(address)
    }
}

#[async_trait]
impl SinkResolver for KubeSinkResolver {
    async fn resolve(&self, namespace: &str, destination: &Destination) -> Result<String, SinkError> {
        let base = match &destination.reference {
            Some(reference) => Some(self.address_of(namespace, reference).await?),
            None => None,
        };
        join_destination(base, destination.uri.as_deref())
    }
}

fn is_core_service(reference: &KReference) -> bool {
    reference.api_version == "v1" && reference.kind == "Service"
}

fn service_address(name: &str, namespace: &str) -> String {
    format!("http://{name}.{namespace}.svc.cluster.local/")
}

/// `eventing.knative.dev/v1` to `("eventing.knative.dev", "v1")`, `v1` to `("", "v1")`
fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

/// Addressable contract: `status.address.url`
pub(crate) fn address_from_status(data: &serde_json::Value) -> Option<&str> {
    data.pointer("/status/address/url")
        .and_then(serde_json::Value::as_str)
        .filter(|url| !url.is_empty())
}

/// Combine a ref's address with an optional `uri`
pub(crate) fn join_destination(base: Option<Url>, uri: Option<&str>) -> Result<String, SinkError> {
    let uri = uri.map(str::trim).filter(|u| !u.is_empty());
    match (base, uri) {
        (Some(base), Some(uri)) => base
            .join(uri)
            .map(String::from)
            .map_err(|e| SinkError::InvalidUri {
                uri: uri.to_string(),
                reason: e.to_string(),
            }),
        (Some(base), None) => Ok(base.into()),
        (None, Some(uri)) => parse_uri(uri).map(String::from),
        (None, None) => Err(SinkError::Missing),
    }
}

fn parse_uri(raw: &str) -> Result<Url, SinkError> {
    let invalid = |reason: String| SinkError::InvalidUri {
        uri: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https".to_string()));
    }
    Ok(url)
}
