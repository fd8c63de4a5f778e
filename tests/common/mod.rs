//! Common test utilities for reconciler integration tests
//!
//! In-memory stand-ins for every collaborator of a reconciliation pass, so a
//! pass can run without a cluster or a GitLab instance.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use gitlab_source_controller::controller::reconciler::{
    Context, EventPublisher, Receiver, ReceiverPlatform, ReceiverSpec, SinkError, SinkResolver,
};
use gitlab_source_controller::crd::{
    Destination, GitLabSource, GitLabSourceSpec, KReference, Scope, SecretKeySelector,
    SecretValueFromSource,
};
use gitlab_source_controller::provider::{
    Hook, HookOptions, ProviderError, WebhookApi, WebhookClientFactory,
};
use gitlab_source_controller::secret::{SecretData, SecretStore};
use gitlab_source_controller::config::ControllerConfig;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::ObjectMeta;
use kube::runtime::events::EventType;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "default";
pub const SOURCE_NAME: &str = "my-project";
pub const SOURCE_UID: &str = "4c0f9a52-1d1e-4be5-9d36-0d6f2a8d7b11";
pub const SECRET_NAME: &str = "gitlab-secret";
pub const ACCESS_TOKEN: &str = "glpat-access";
pub const SECRET_TOKEN: &str = "shared-secret";
pub const PROJECT_URL: &str = "https://gitlab.example.com/myuser/myproject";
pub const SINK_URI: &str = "http://default-broker.default.svc.cluster.local/";
pub const ADAPTER_URL: &str = "http://my-project-abcde.default.svc.cluster.local";

/// A GitLabSource as the API server would hand it to the controller
pub fn source() -> GitLabSource {
    let mut source = GitLabSource::new(
        SOURCE_NAME,
        GitLabSourceSpec {
            service_account_name: None,
            project_url: Some(PROJECT_URL.to_string()),
            group_url: None,
            event_types: vec!["push_events".to_string(), "merge_requests_events".to_string()],
            access_token: secret_value("accessToken"),
            secret_token: Some(secret_value("secretToken")),
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
        },
    );
    source.metadata = ObjectMeta {
        name: Some(SOURCE_NAME.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        uid: Some(SOURCE_UID.to_string()),
        generation: Some(1),
        ..ObjectMeta::default()
    };
    source
}

fn secret_value(key: &str) -> SecretValueFromSource {
    SecretValueFromSource {
        secret_key_ref: SecretKeySelector {
            name: SECRET_NAME.to_string(),
            key: key.to_string(),
        },
    }
}

/// Secrets keyed by namespace and name
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<(String, String), SecretData>>,
    reads: Mutex<usize>,
}

impl InMemorySecretStore {
    pub fn insert(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data: SecretData = data
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }

    /// Store values as given, including bytes that are not UTF-8
    pub fn insert_raw(&self, namespace: &str, name: &str, data: SecretData) {
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> anyhow::Result<Option<SecretData>> {
        *self.reads.lock().unwrap() += 1;
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// How the fake GitLab answers every hook call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GitLabMode {
    #[default]
    Healthy,
    /// 401 on every call
    Unauthorized,
    /// 500 on every call
    Failing,
}

/// One call made against the fake GitLab
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Get(i64),
    Create,
    Edit(i64),
    Delete(i64),
}

#[derive(Debug, Default)]
struct GitLabState {
    mode: GitLabMode,
    hooks: BTreeMap<i64, HookOptions>,
    next_id: i64,
    calls: Vec<HookCall>,
    access_tokens: Vec<String>,
    scopes: Vec<Scope>,
}

/// A GitLab hooks API shared by the factory and every client it hands out
#[derive(Debug, Clone, Default)]
pub struct FakeGitLab {
    state: Arc<Mutex<GitLabState>>,
}

impl FakeGitLab {
    pub fn set_mode(&self, mode: GitLabMode) {
        self.state.lock().unwrap().mode = mode;
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn hook(&self, id: i64) -> Option<HookOptions> {
        self.state.lock().unwrap().hooks.get(&id).cloned()
    }

    pub fn hook_count(&self) -> usize {
        self.state.lock().unwrap().hooks.len()
    }

    /// Simulate someone deleting the hook in the GitLab UI
    pub fn delete_out_of_band(&self, id: i64) {
        self.state.lock().unwrap().hooks.remove(&id);
    }

    pub fn access_tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().access_tokens.clone()
    }

    pub fn scopes(&self) -> Vec<Scope> {
        self.state.lock().unwrap().scopes.clone()
    }

    fn check(state: &GitLabState) -> Result<(), ProviderError> {
        match state.mode {
            GitLabMode::Healthy => Ok(()),
            GitLabMode::Unauthorized => Err(ProviderError::Unauthorized {
                status: 401,
                message: "401 Unauthorized".to_string(),
            }),
            GitLabMode::Failing => Err(ProviderError::Api {
                status: 500,
                message: "Internal Server Error".to_string(),
            }),
        }
    }
}

#[async_trait]
impl WebhookApi for FakeGitLab {
    async fn get(&self, id: i64) -> Result<Hook, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HookCall::Get(id));
        Self::check(&state)?;
        state
            .hooks
            .get(&id)
            .map(|options| Hook {
                id,
                url: options.url.clone(),
            })
            .ok_or(ProviderError::NotFound { id })
    }

    async fn create(&self, options: &HookOptions) -> Result<Hook, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HookCall::Create);
        Self::check(&state)?;
        state.next_id += 1;
        let id = state.next_id;
        state.hooks.insert(id, options.clone());
        Ok(Hook {
            id,
            url: options.url.clone(),
        })
    }

    async fn edit(&self, id: i64, options: &HookOptions) -> Result<Hook, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HookCall::Edit(id));
        Self::check(&state)?;
        let hook = state.hooks.get_mut(&id).ok_or(ProviderError::NotFound { id })?;
        *hook = options.clone();
        Ok(Hook {
            id,
            url: options.url.clone(),
        })
    }

    async fn delete(&self, id: i64) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HookCall::Delete(id));
        Self::check(&state)?;
        state
            .hooks
            .remove(&id)
            .map(|_| ())
            .ok_or(ProviderError::NotFound { id })
    }
}

impl WebhookClientFactory for FakeGitLab {
    fn client(&self, scope: &Scope, access_token: &str) -> Result<Box<dyn WebhookApi>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.access_tokens.push(access_token.to_string());
        state.scopes.push(scope.clone());
        drop(state);
        Ok(Box::new(self.clone()))
    }
}

#[derive(Debug, Default)]
struct ReceiverState {
    receivers: Vec<(String, Receiver)>,
    created: Vec<ReceiverSpec>,
    ready_on_create: bool,
    fail_create: bool,
    lists: usize,
}

/// Receive adapters living in memory
#[derive(Debug, Clone, Default)]
pub struct FakeReceivers {
    state: Arc<Mutex<ReceiverState>>,
}

impl FakeReceivers {
    /// Created adapters come up ready with [`ADAPTER_URL`]
    pub fn ready_on_create(&self) {
        self.state.lock().unwrap().ready_on_create = true;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    /// Flip readiness of every adapter, dropping the address when not ready
    pub fn set_ready(&self, ready: bool) {
        let mut state = self.state.lock().unwrap();
        for (_, receiver) in &mut state.receivers {
            receiver.ready = ready;
            receiver.address = ready.then(|| ADAPTER_URL.to_string());
        }
    }

    /// Ready but not yet routable
    pub fn set_ready_without_address(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, receiver) in &mut state.receivers {
            receiver.ready = true;
            receiver.address = None;
        }
    }

    pub fn created(&self) -> Vec<ReceiverSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn lists(&self) -> usize {
        self.state.lock().unwrap().lists
    }

    /// Add an adapter owned by somebody else
    pub fn insert_foreign(&self, namespace: &str, name: &str) {
        self.state.lock().unwrap().receivers.push((
            namespace.to_string(),
            Receiver {
                name: name.to_string(),
                controller_uids: vec!["someone-else".to_string()],
                ready: true,
                address: Some(format!("http://{name}.{namespace}.svc.cluster.local")),
            },
        ));
    }
}

#[async_trait]
impl ReceiverPlatform for FakeReceivers {
    async fn list(&self, namespace: &str) -> anyhow::Result<Vec<Receiver>> {
        let mut state = self.state.lock().unwrap();
        state.lists += 1;
        Ok(state
            .receivers
            .iter()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create(&self, spec: &ReceiverSpec) -> anyhow::Result<Receiver> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            anyhow::bail!("admission webhook denied the request");
        }
        let ready = state.ready_on_create;
        let receiver = Receiver {
            name: format!("{}abcde", spec.generate_name),
            controller_uids: vec![spec.owner.uid.clone()],
            ready,
            address: ready.then(|| ADAPTER_URL.to_string()),
        };
        state.created.push(spec.clone());
        state
            .receivers
            .push((spec.namespace.clone(), receiver.clone()));
        Ok(receiver)
    }
}

/// Resolves every destination to [`SINK_URI`] unless told the sink is gone
#[derive(Debug, Default)]
pub struct FakeSinks {
    missing: Mutex<bool>,
}

impl FakeSinks {
    pub fn set_missing(&self, missing: bool) {
        *self.missing.lock().unwrap() = missing;
    }
}

#[async_trait]
impl SinkResolver for FakeSinks {
    async fn resolve(&self, namespace: &str, destination: &Destination) -> Result<String, SinkError> {
        if *self.missing.lock().unwrap() {
            let reference = destination.reference.clone().unwrap_or_default();
            return Err(SinkError::NotFound {
                kind: reference.kind,
                namespace: namespace.to_string(),
                name: reference.name,
            });
        }
        Ok(destination
            .uri
            .clone()
            .unwrap_or_else(|| SINK_URI.to_string()))
    }
}

/// A published Kubernetes Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn all(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, reason: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.reason == reason)
            .count()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            action: action.to_string(),
            note,
        });
    }
}

/// Every fake wired into one [`Context`]
#[derive(Debug)]
pub struct World {
    pub secrets: Arc<InMemorySecretStore>,
    pub gitlab: FakeGitLab,
    pub receivers: FakeReceivers,
    pub sinks: Arc<FakeSinks>,
    pub events: Arc<RecordingEvents>,
    pub config: ControllerConfig,
}

impl World {
    /// Secret present, sink resolvable, adapters not ready on creation
    pub fn new() -> Self {
        let secrets = Arc::new(InMemorySecretStore::default());
        secrets.insert(
            NAMESPACE,
            SECRET_NAME,
            &[("accessToken", ACCESS_TOKEN), ("secretToken", SECRET_TOKEN)],
        );
        Self {
            secrets,
            gitlab: FakeGitLab::default(),
            receivers: FakeReceivers::default(),
            sinks: Arc::new(FakeSinks::default()),
            events: Arc::new(RecordingEvents::default()),
            config: ControllerConfig::default(),
        }
    }

    /// Adapters come up ready, so a pass goes all the way to GitLab
    pub fn ready() -> Self {
        let world = Self::new();
        world.receivers.ready_on_create();
        world
    }

    pub fn context(&self) -> Context {
        Context {
            secrets: Arc::clone(&self.secrets) as Arc<dyn SecretStore>,
            webhooks: Arc::new(self.gitlab.clone()),
            receivers: Arc::new(self.receivers.clone()),
            sinks: Arc::clone(&self.sinks) as Arc<dyn SinkResolver>,
            events: Arc::clone(&self.events) as Arc<dyn EventPublisher>,
            config: self.config.clone(),
        }
    }
}
