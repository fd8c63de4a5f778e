//! # Validation
//!
//! Admission rules for [`GitLabSourceSpec`]. The same rules are applied by the
//! `/validate` admission endpoint and at the start of every reconciliation.

use crate::crd::spec::split_scope_url;
use crate::crd::{GitLabSourceSpec, SecretValueFromSource};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("one of projectUrl or groupUrl must be set")]
    MissingScope,
    #[error("projectUrl and groupUrl are mutually exclusive")]
    ConflictingScope,
    #[error("invalid GitLab URL {url:?}: {reason}")]
    InvalidScopeUrl { url: String, reason: String },
    #[error("eventTypes must contain at least one event category")]
    NoEventTypes,
    #[error("{field}.secretKeyRef must set both name and key")]
    IncompleteSecretRef { field: &'static str },
    #[error("sink must set ref or uri")]
    MissingSink,
    #[error("invalid sink uri {uri:?}")]
    InvalidSinkUri { uri: String },
}

/// Validate a `GitLabSourceSpec`
///
/// # Errors
/// Returns the first rule the spec block violates.
pub fn validate(spec: &GitLabSourceSpec) -> Result<(), ValidationError> {
    let project = spec.project_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let group = spec.group_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    match (project, group) {
        (Some(url), None) | (None, Some(url)) => {
            split_scope_url(url)?;
        }
        (Some(_), Some(_)) => return Err(ValidationError::ConflictingScope),
        (None, None) => return Err(ValidationError::MissingScope),
    }

    if spec.event_types.iter().all(|t| t.trim().is_empty()) {
        return Err(ValidationError::NoEventTypes);
    }

    validate_secret_ref("accessToken", &spec.access_token)?;
    if let Some(secret_token) = &spec.secret_token {
        validate_secret_ref("secretToken", secret_token)?;
    }

    match (&spec.sink.reference, spec.sink.uri.as_deref()) {
        (None, None) => return Err(ValidationError::MissingSink),
        (None, Some(uri)) => {
            // Without a ref the uri has nothing to be relative to
            if reqwest::Url::parse(uri).is_err() {
                return Err(ValidationError::InvalidSinkUri {
                    uri: uri.to_string(),
                });
            }
        }
        (Some(_), _) => {}
    }

    Ok(())
}

fn validate_secret_ref(
    field: &'static str,
    source: &SecretValueFromSource,
) -> Result<(), ValidationError> {
    let selector = &source.secret_key_ref;
    if selector.name.trim().is_empty() || selector.key.trim().is_empty() {
        return Err(ValidationError::IncompleteSecretRef { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Destination, KReference, SecretKeySelector};

    fn valid_spec() -> GitLabSourceSpec {
        GitLabSourceSpec {
            service_account_name: None,
            project_url: Some("https://gitlab.example.com/myuser/myproject".to_string()),
            group_url: None,
            event_types: vec!["push_events".to_string()],
            access_token: SecretValueFromSource {
                secret_key_ref: SecretKeySelector {
                    name: "gitlab-secret".to_string(),
                    key: "accessToken".to_string(),
                },
            },
            secret_token: None,
            ssl_verify: true,
            sink: Destination {
                reference: Some(KReference {
                    api_version: "eventing.knative.dev/v1".to_string(),
                    kind: "Broker".to_string(),
                    name: "default".to_string(),
                    namespace: None,
                }),
                uri: None,
            },
        }
    }

    #[test]
    fn test_valid_spec() {
        assert_eq!(validate(&valid_spec()), Ok(()));
    }

    #[test]
    fn test_empty_event_types_rejected() {
        let mut spec = valid_spec();
        spec.event_types.clear();
        assert_eq!(validate(&spec), Err(ValidationError::NoEventTypes));
    }

    #[test]
    fn test_scope_must_be_exclusive() {
        let mut spec = valid_spec();
        spec.group_url = Some("https://gitlab.example.com/myuser".to_string());
        assert_eq!(validate(&spec), Err(ValidationError::ConflictingScope));

        spec.project_url = None;
        assert_eq!(validate(&spec), Ok(()));

        spec.group_url = None;
        assert_eq!(validate(&spec), Err(ValidationError::MissingScope));
    }

    #[test]
    fn test_incomplete_secret_refs_rejected() {
        let mut spec = valid_spec();
        spec.access_token.secret_key_ref.key.clear();
        assert_eq!(
            validate(&spec),
            Err(ValidationError::IncompleteSecretRef {
                field: "accessToken"
            })
        );

        let mut spec = valid_spec();
        spec.secret_token = Some(SecretValueFromSource::default());
        assert_eq!(
            validate(&spec),
            Err(ValidationError::IncompleteSecretRef {
                field: "secretToken"
            })
        );
    }

    #[test]
    fn test_sink_rules() {
        let mut spec = valid_spec();
        spec.sink = Destination::default();
        assert_eq!(validate(&spec), Err(ValidationError::MissingSink));

        spec.sink.uri = Some("/relative".to_string());
        assert!(matches!(
            validate(&spec),
            Err(ValidationError::InvalidSinkUri { .. })
        ));

        spec.sink.uri = Some("http://event-display.default.svc.cluster.local".to_string());
        assert_eq!(validate(&spec), Ok(()));
    }
}
