//! # CRD Validation Tests
//!
//! Tests for the GitLabSource CRD to catch schema drift early.
//! These tests validate that sample resources deserialize into the expected
//! fields and that the admission rules accept and reject what they should.

use gitlab_source_controller::crd::{validate, GitLabSource, Scope, ValidationError};
use kube::CustomResourceExt;

fn parse(yaml: &str) -> GitLabSource {
    serde_yaml::from_str(yaml).expect("Failed to deserialize GitLabSource")
}

/// A project source with every field set
#[test]
fn test_project_source_with_all_fields() {
    let source = parse(
        r#"
apiVersion: sources.knative.dev/v1alpha1
kind: GitLabSource
metadata:
  name: my-project
  namespace: default
spec:
  serviceAccountName: gitlab-adapter
  projectUrl: https://gitlab.example.com/myuser/myproject
  eventTypes:
    - push_events
    - merge_requests_events
  accessToken:
    secretKeyRef:
      name: gitlab-secret
      key: accessToken
  secretToken:
    secretKeyRef:
      name: gitlab-secret
      key: secretToken
  sslverify: true
  sink:
    ref:
      apiVersion: eventing.knative.dev/v1
      kind: Broker
      name: default
"#,
    );

    let spec = &source.spec;
    assert_eq!(spec.service_account_name.as_deref(), Some("gitlab-adapter"));
    assert_eq!(spec.event_types, vec!["push_events", "merge_requests_events"]);
    assert_eq!(spec.access_token.secret_key_ref.key, "accessToken");
    assert_eq!(
        spec.secret_token.as_ref().map(|s| s.secret_key_ref.key.as_str()),
        Some("secretToken")
    );
    assert!(spec.ssl_verify);
    assert_eq!(spec.sink.reference.as_ref().map(|r| r.kind.as_str()), Some("Broker"));
    assert!(validate(spec).is_ok());
    assert_eq!(
        source.scope().unwrap(),
        Scope::Project {
            base_url: "https://gitlab.example.com/".to_string(),
            path: "myuser/myproject".to_string(),
        }
    );
    assert_eq!(source.event_source(), "https://gitlab.example.com/myuser/myproject");
}

/// A group source with a plain uri sink and the optional fields left out
#[test]
fn test_group_source_with_uri_sink() {
    let source = parse(
        r#"
apiVersion: sources.knative.dev/v1alpha1
kind: GitLabSource
metadata:
  name: my-group
spec:
  groupUrl: https://gitlab.example.com/platform/
  eventTypes: [pipeline_events]
  accessToken:
    secretKeyRef:
      name: gitlab-secret
      key: accessToken
  sink:
    uri: http://event-display.default.svc.cluster.local
"#,
    );

    assert!(source.spec.secret_token.is_none());
    assert!(!source.spec.ssl_verify);
    assert!(validate(&source.spec).is_ok());
    assert_eq!(source.scope().unwrap().collection(), "groups");
    assert_eq!(source.scope().unwrap().path(), "platform");
}

#[test]
fn test_status_deserializes() {
    let source = parse(
        r#"
apiVersion: sources.knative.dev/v1alpha1
kind: GitLabSource
metadata:
  name: my-project
spec:
  projectUrl: https://gitlab.example.com/myuser/myproject
  eventTypes: [push_events]
  accessToken:
    secretKeyRef: {name: gitlab-secret, key: accessToken}
  sink:
    uri: http://sink
status:
  observedGeneration: 3
  sinkUri: http://sink
  webhookID: 42
  ceAttributes:
    - type: dev.knative.sources.gitlab.push
      source: https://gitlab.example.com/myuser/myproject
  conditions:
    - type: Ready
      status: "True"
      lastTransitionTime: "2026-01-01T00:00:00Z"
"#,
    );

    let status = source.status.unwrap();
    assert_eq!(status.observed_generation, Some(3));
    assert_eq!(status.webhook_id, Some(42));
    assert_eq!(status.ce_attributes[0].r#type, "dev.knative.sources.gitlab.push");
    assert!(status.is_ready());
}

#[test]
fn test_both_scopes_are_rejected() {
    let source = parse(
        r#"
apiVersion: sources.knative.dev/v1alpha1
kind: GitLabSource
metadata:
  name: ambiguous
spec:
  projectUrl: https://gitlab.example.com/myuser/myproject
  groupUrl: https://gitlab.example.com/myuser
  eventTypes: [push_events]
  accessToken:
    secretKeyRef: {name: gitlab-secret, key: accessToken}
  sink:
    uri: http://sink
"#,
    );

    assert_eq!(validate(&source.spec), Err(ValidationError::ConflictingScope));
}

#[test]
fn test_missing_event_types_are_rejected() {
    let source = parse(
        r#"
apiVersion: sources.knative.dev/v1alpha1
kind: GitLabSource
metadata:
  name: silent
spec:
  projectUrl: https://gitlab.example.com/myuser/myproject
  accessToken:
    secretKeyRef: {name: gitlab-secret, key: accessToken}
  sink:
    uri: http://sink
"#,
    );

    assert_eq!(validate(&source.spec), Err(ValidationError::NoEventTypes));
}

#[test]
fn test_relative_uri_without_ref_is_rejected() {
    let source = parse(
        r#"
apiVersion: sources.knative.dev/v1alpha1
kind: GitLabSource
metadata:
  name: relative
spec:
  projectUrl: https://gitlab.example.com/myuser/myproject
  eventTypes: [push_events]
  accessToken:
    secretKeyRef: {name: gitlab-secret, key: accessToken}
  sink:
    uri: /extra/path
"#,
    );

    assert!(matches!(
        validate(&source.spec),
        Err(ValidationError::InvalidSinkUri { .. })
    ));
}

/// The generated CRD keeps the group, names and status subresource
#[test]
fn test_generated_crd_shape() {
    let crd = GitLabSource::crd();
    assert_eq!(crd.spec.group, "sources.knative.dev");
    assert_eq!(crd.spec.names.plural, "gitlabsources");
    assert_eq!(crd.spec.names.kind, "GitLabSource");
    assert_eq!(crd.spec.scope, "Namespaced");

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha1");
    assert!(version
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some());
}
