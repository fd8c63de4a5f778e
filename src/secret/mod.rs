//! # Credential Resolver
//!
//! Resolves `secretKeyRef`s to plaintext for one reconciliation pass.
//!
//! A [`CredentialResolver`] is created per pass and remembers every Secret it
//! fetched, so two refs into the same Secret cost one API read. Nothing is
//! kept across passes.

mod kubernetes;

pub use kubernetes::KubeSecretStore;

use crate::crd::SecretKeySelector;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroizing;

/// Raw Secret data, key to bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("secret \"{name}\" not found")]
    SecretNotFound { name: String },
    #[error("key \"{key}\" not found in secret \"{name}\"")]
    KeyNotFound { name: String, key: String },
    #[error("key \"{key}\" in secret \"{name}\" is not valid UTF-8")]
    InvalidEncoding { name: String, key: String },
    #[error("failed to read secret \"{name}\": {source}")]
    Store {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CredentialError {
    /// Missing secrets and keys may appear later; store errors are transient
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::SecretNotFound { .. } | Self::KeyNotFound { .. })
    }
}

/// Read access to Secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a Secret's data, `None` when the Secret does not exist
    async fn get(&self, namespace: &str, name: &str) -> anyhow::Result<Option<SecretData>>;
}

/// Pass-scoped secret lookup with a per-Secret cache
pub struct CredentialResolver {
    store: Arc<dyn SecretStore>,
    namespace: String,
    cache: HashMap<String, Option<Arc<SecretData>>>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("namespace", &self.namespace)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn SecretStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            cache: HashMap::new(),
        }
    }

    /// Resolve one reference
    ///
    /// # Errors
    /// Fails when the Secret or key is missing, the value is not UTF-8, or the
    /// store cannot be read.
    pub async fn resolve(
        &mut self,
        selector: &SecretKeySelector,
    ) -> Result<Zeroizing<String>, CredentialError> {
        let data = self.secret(&selector.name).await?;
        let bytes = data
            .get(&selector.key)
            .ok_or_else(|| CredentialError::KeyNotFound {
                name: selector.name.clone(),
                key: selector.key.clone(),
            })?;
        let value = std::str::from_utf8(bytes).map_err(|_| CredentialError::InvalidEncoding {
            name: selector.name.clone(),
            key: selector.key.clone(),
        })?;
        Ok(Zeroizing::new(value.to_string()))
    }

    /// Resolve several optional references, in order
    ///
    /// An absent reference resolves to an empty value.
    ///
    /// # Errors
    /// Fails on the first reference that cannot be resolved.
    pub async fn resolve_all(
        &mut self,
        selectors: &[Option<&SecretKeySelector>],
    ) -> Result<Vec<Zeroizing<String>>, CredentialError> {
        let mut values = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let value = match selector {
                Some(selector) => self.resolve(selector).await?,
                None => Zeroizing::new(String::new()),
            };
            values.push(value);
        }
        Ok(values)
    }

    async fn secret(&mut self, name: &str) -> Result<Arc<SecretData>, CredentialError> {
        if !self.cache.contains_key(name) {
            let fetched = self
                .store
                .get(&self.namespace, name)
                .await
                .map_err(|source| CredentialError::Store {
                    name: name.to_string(),
                    source,
                })?;
            self.cache.insert(name.to_string(), fetched.map(Arc::new));
        }
        match self.cache.get(name) {
            Some(Some(data)) => Ok(Arc::clone(data)),
            _ => Err(CredentialError::SecretNotFound {
                name: name.to_string(),
            }),
        }
    }
}
