//! # GitLabSource Spec
//!
//! Main CRD spec types and scope resolution.

use crate::crd::ValidationError;
use serde::{Deserialize, Serialize};

/// GitLabSource Custom Resource Definition
///
/// Declares that a GitLab project or group webhook should exist and deliver
/// the selected event categories to a receive adapter, which forwards them as
/// CloudEvents to `sink`.
///
/// # Example
///
/// ```yaml
/// apiVersion: sources.knative.dev/v1alpha1
/// kind: GitLabSource
/// metadata:
///   name: my-project
///   namespace: default
/// spec:
///   projectUrl: https://gitlab.example.com/myuser/myproject
///   eventTypes:
///     - push_events
///     - merge_requests_events
///   accessToken:
///     secretKeyRef:
///       name: gitlab-secret
///       key: accessToken
///   secretToken:
///     secretKeyRef:
///       name: gitlab-secret
///       key: secretToken
///   sslverify: true
///   sink:
///     ref:
///       apiVersion: eventing.knative.dev/v1
///       kind: Broker
///       name: default
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GitLabSource",
    group = "sources.knative.dev",
    version = "v1alpha1",
    plural = "gitlabsources",
    namespaced,
    status = "crate::crd::GitLabSourceStatus",
    shortname = "gls",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}, {"name":"Sink", "type":"string", "jsonPath":".status.sinkUri"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GitLabSourceSpec {
    /// Service account the receive adapter runs as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// Project to register the webhook on, e.g. `https://gitlab.example.com/group/project`
    /// Mutually exclusive with `groupUrl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    /// Group to register the webhook on, e.g. `https://gitlab.example.com/group`
    /// Mutually exclusive with `projectUrl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_url: Option<String>,
    /// Webhook categories to subscribe to, e.g. `push_events`
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Personal or project access token used to manage the webhook
    pub access_token: SecretValueFromSource,
    /// Secret GitLab sends back in `X-Gitlab-Token` on every delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<SecretValueFromSource>,
    /// Whether GitLab verifies the receiver's TLS certificate
    #[serde(default, rename = "sslverify")]
    pub ssl_verify: bool,
    /// Destination of the translated events
    pub sink: Destination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretValueFromSource {
    pub secret_key_ref: SecretKeySelector,
}

/// Key within a Secret in the source's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}

/// Addressable reference and/or URI, in the Knative duck-type shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct Destination {
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<KReference>,
    /// Absolute URI, or a path relative to the address of `ref` when both are set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// Defaults to the namespace of the GitLabSource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where the webhook lives on the GitLab side
///
/// Resolved once per reconciliation pass. The client talks to
/// `/api/v4/projects/...` or `/api/v4/groups/...` accordingly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Project { base_url: String, path: String },
    Group { base_url: String, path: String },
}

impl Scope {
    /// GitLab instance root, always ending with `/`
    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            Scope::Project { base_url, .. } | Scope::Group { base_url, .. } => base_url,
        }
    }

    /// Full path of the project or group, e.g. `myuser/myproject`
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Scope::Project { path, .. } | Scope::Group { path, .. } => path,
        }
    }

    /// API collection the hooks live under
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            Scope::Project { .. } => "projects",
            Scope::Group { .. } => "groups",
        }
    }
}

impl GitLabSource {
    /// Resolve the project or group this source registers its webhook on
    ///
    /// # Errors
    /// Returns an error when neither or both URLs are set, or when the URL
    /// cannot be split into an instance and a path.
    pub fn scope(&self) -> Result<Scope, ValidationError> {
        match (non_empty(&self.spec.project_url), non_empty(&self.spec.group_url)) {
            (Some(url), None) => {
                let (base_url, path) = split_scope_url(url)?;
                Ok(Scope::Project { base_url, path })
            }
            (None, Some(url)) => {
                let (base_url, path) = split_scope_url(url)?;
                Ok(Scope::Group { base_url, path })
            }
            (Some(_), Some(_)) => Err(ValidationError::ConflictingScope),
            (None, None) => Err(ValidationError::MissingScope),
        }
    }

    /// Canonical CloudEvent source: the configured project or group URL
    #[must_use]
    pub fn event_source(&self) -> String {
        non_empty(&self.spec.project_url)
            .or_else(|| non_empty(&self.spec.group_url))
            .unwrap_or_default()
            .to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Split `https://gitlab.example.com/myuser/myproject` into
/// `https://gitlab.example.com/` and `myuser/myproject`
pub(crate) fn split_scope_url(raw: &str) -> Result<(String, String), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidScopeUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = reqwest::Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return Err(invalid("missing project or group path"));
    }

    let base_url = match url.port() {
        Some(port) => format!("{}://{host}:{port}/", url.scheme()),
        None => format!("{}://{host}/", url.scheme()),
    };
    Ok((base_url, path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(project: Option<&str>, group: Option<&str>) -> GitLabSource {
        GitLabSource::new(
            "test",
            GitLabSourceSpec {
                service_account_name: None,
                project_url: project.map(str::to_string),
                group_url: group.map(str::to_string),
                event_types: vec!["push_events".to_string()],
                access_token: SecretValueFromSource::default(),
                secret_token: None,
                ssl_verify: false,
                sink: Destination::default(),
            },
        )
    }

    #[test]
    fn test_split_project_url() {
        let (base, path) = split_scope_url("https://gitlab.example.com/myuser/myproject").unwrap();
        assert_eq!(base, "https://gitlab.example.com/");
        assert_eq!(path, "myuser/myproject");
    }

    #[test]
    fn test_split_keeps_port_and_nested_groups() {
        let (base, path) =
            split_scope_url("http://gitlab.local:8929/top/sub/project/").unwrap();
        assert_eq!(base, "http://gitlab.local:8929/");
        assert_eq!(path, "top/sub/project");
    }

    #[test]
    fn test_split_rejects_missing_path() {
        assert!(split_scope_url("https://gitlab.example.com/").is_err());
        assert!(split_scope_url("gitlab.example.com/group").is_err());
    }

    #[test]
    fn test_scope_resolution() {
        let project = source(Some("https://gitlab.com/a/b"), None);
        assert_eq!(
            project.scope().unwrap(),
            Scope::Project {
                base_url: "https://gitlab.com/".to_string(),
                path: "a/b".to_string()
            }
        );
        assert_eq!(project.event_source(), "https://gitlab.com/a/b");

        let group = source(None, Some("https://gitlab.com/a"));
        assert_eq!(group.scope().unwrap().collection(), "groups");

        assert!(matches!(
            source(Some("https://gitlab.com/a/b"), Some("https://gitlab.com/a")).scope(),
            Err(ValidationError::ConflictingScope)
        ));
        assert!(matches!(
            source(None, Some("  ")).scope(),
            Err(ValidationError::MissingScope)
        ));
    }
}
