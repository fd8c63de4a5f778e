//! Kubernetes-backed [`SecretStore`].

use super::{SecretData, SecretStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> anyhow::Result<Option<SecretData>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets.get_opt(name).await?;
        Ok(secret.map(|s| {
            let mut data: SecretData = s
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect();
            // stringData is write-only on the API server, but fakes and dry runs return it
            for (key, value) in s.string_data.unwrap_or_default() {
                data.entry(key).or_insert_with(|| value.into_bytes());
            }
            data
        }))
    }
}
