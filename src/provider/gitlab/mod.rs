//! # GitLab Hooks Client
//!
//! Client for the hooks endpoints of the GitLab REST API v4.
//!
//! - Project scope: `/api/v4/projects/:id/hooks[/:hook_id]`
//! - Group scope: `/api/v4/groups/:id/hooks[/:hook_id]`
//!
//! `:id` is the URL-encoded full path (`myuser%2Fmyproject`). Requests are
//! authenticated with the `PRIVATE-TOKEN` header.

mod requests;
mod responses;

use crate::crd::Scope;
use crate::provider::{Hook, HookOptions, ProviderError, WebhookApi, WebhookClientFactory};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};
use zeroize::Zeroizing;

use requests::HookRequest;
use responses::{ErrorResponse, HookResponse};

const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// GitLab hooks REST client bound to one project or group
pub struct GitLabClient {
    http_client: Client,
    hooks_url: Url,
    scope_path: String,
    access_token: Zeroizing<String>,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("hooks_url", &self.hooks_url.as_str())
            .field("access_token", &"***")
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    /// Create a client for the hooks of `scope`
    ///
    /// # Errors
    /// Returns an error if the scope's base URL cannot carry a path.
    pub fn new(
        http_client: Client,
        scope: &Scope,
        access_token: &str,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client,
            hooks_url: hooks_url(scope)?,
            scope_path: scope.path().to_string(),
            access_token: Zeroizing::new(access_token.to_string()),
        })
    }

    fn hook_url(&self, id: i64) -> Url {
        let mut url = self.hooks_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&id.to_string());
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header(PRIVATE_TOKEN_HEADER, self.access_token.as_str())
    }

    /// Map non-success statuses onto [`ProviderError`]
    async fn check(response: Response, id: Option<i64>) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = ErrorResponse::message_from(&body);
        Err(match (status, id) {
            (StatusCode::NOT_FOUND, Some(id)) => ProviderError::NotFound { id },
            (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => ProviderError::Unauthorized {
                status: status.as_u16(),
                message,
            },
            _ => ProviderError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn hook_from(response: Response, id: Option<i64>) -> Result<Hook, ProviderError> {
        let response = Self::check(response, id).await?;
        let hook: HookResponse = response.json().await?;
        Ok(hook.into())
    }
}

/// `<base>/api/v4/<projects|groups>/<encoded path>/hooks`
fn hooks_url(scope: &Scope) -> Result<Url, ProviderError> {
    let mut url = Url::parse(scope.base_url())
        .map_err(|e| ProviderError::InvalidUrl(format!("{}: {e}", scope.base_url())))?;
    url.path_segments_mut()
        .map_err(|()| ProviderError::InvalidUrl(scope.base_url().to_string()))?
        .pop_if_empty()
        .extend(["api", "v4", scope.collection()])
        // push encodes '/', giving the URL-encoded full path GitLab expects as :id
        .push(scope.path())
        .push("hooks");
    Ok(url)
}

#[async_trait]
impl WebhookApi for GitLabClient {
    async fn get(&self, id: i64) -> Result<Hook, ProviderError> {
        let span = info_span!("gitlab.hook.get", scope.path = %self.scope_path, hook.id = id);
        async move {
            let response = self.request(Method::GET, self.hook_url(id)).send().await?;
            Self::hook_from(response, Some(id)).await
        }
        .instrument(span)
        .await
    }

    async fn create(&self, options: &HookOptions) -> Result<Hook, ProviderError> {
        let span = info_span!("gitlab.hook.create", scope.path = %self.scope_path);
        async move {
            debug!(hook.url = %options.url, "Creating hook");
            let response = self
                .request(Method::POST, self.hooks_url.clone())
                .json(&HookRequest::from(options))
                .send()
                .await?;
            Self::hook_from(response, None).await
        }
        .instrument(span)
        .await
    }

    async fn edit(&self, id: i64, options: &HookOptions) -> Result<Hook, ProviderError> {
        let span = info_span!("gitlab.hook.edit", scope.path = %self.scope_path, hook.id = id);
        async move {
            let response = self
                .request(Method::PUT, self.hook_url(id))
                .json(&HookRequest::from(options))
                .send()
                .await?;
            Self::hook_from(response, Some(id)).await
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), ProviderError> {
        let span = info_span!("gitlab.hook.delete", scope.path = %self.scope_path, hook.id = id);
        async move {
            let response = self.request(Method::DELETE, self.hook_url(id)).send().await?;
            Self::check(response, Some(id)).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

/// Builds [`GitLabClient`]s that share one connection pool
#[derive(Debug, Clone)]
pub struct GitLabClientFactory {
    http_client: Client,
}

impl GitLabClientFactory {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gitlab-source-controller/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http_client })
    }
}

impl WebhookClientFactory for GitLabClientFactory {
    fn client(&self, scope: &Scope, access_token: &str) -> Result<Box<dyn WebhookApi>, ProviderError> {
        Ok(Box::new(GitLabClient::new(
            self.http_client.clone(),
            scope,
            access_token,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_hooks_url_encodes_path() {
        let scope = Scope::Project {
            base_url: "https://gitlab.example.com/".to_string(),
            path: "myuser/myproject".to_string(),
        };
        assert_eq!(
            hooks_url(&scope).unwrap().as_str(),
            "https://gitlab.example.com/api/v4/projects/myuser%2Fmyproject/hooks"
        );
    }

    #[test]
    fn test_group_hook_url() {
        let scope = Scope::Group {
            base_url: "http://gitlab.local:8929/".to_string(),
            path: "top/sub".to_string(),
        };
        let client = GitLabClient::new(Client::new(), &scope, "token").unwrap();
        assert_eq!(
            client.hook_url(7).as_str(),
            "http://gitlab.local:8929/api/v4/groups/top%2Fsub/hooks/7"
        );
    }
}
