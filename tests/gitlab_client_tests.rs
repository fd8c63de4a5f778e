//! # GitLab Client Tests
//!
//! The REST client against a local stand-in for the GitLab hooks API, so the
//! status code mapping and request bodies are checked on the wire.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use gitlab_source_controller::crd::Scope;
use gitlab_source_controller::provider::gitlab::GitLabClient;
use gitlab_source_controller::provider::{HookOptions, ProviderError, WebhookApi};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use zeroize::Zeroizing;

const VALID_TOKEN: &str = "glpat-valid";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    body: Option<Value>,
}

type Requests = Arc<Mutex<Vec<Recorded>>>;

/// Hooks API stand-in: hook 404 is missing, hook 500 breaks the server
async fn hooks_api(
    State(requests): State<Requests>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        body: body.clone(),
    });

    if headers.get("PRIVATE-TOKEN").and_then(|v| v.to_str().ok()) != Some(VALID_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "401 Unauthorized"})),
        )
            .into_response();
    }

    let hook_id = uri
        .path()
        .rsplit_once("/hooks/")
        .and_then(|(_, id)| id.parse::<i64>().ok());
    let url = body
        .as_ref()
        .and_then(|b| b["url"].as_str())
        .unwrap_or("http://adapter")
        .to_string();

    match (method, hook_id) {
        (_, Some(404)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "404 Not found"})),
        )
            .into_response(),
        (_, Some(500)) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        (Method::POST, None) => (StatusCode::CREATED, Json(json!({"id": 11, "url": url}))).into_response(),
        (Method::GET | Method::PUT, Some(id)) => Json(json!({"id": id, "url": url})).into_response(),
        (Method::DELETE, Some(_)) => StatusCode::NO_CONTENT.into_response(),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn start_gitlab() -> (SocketAddr, Requests) {
    let requests = Requests::default();
    let app = Router::new()
        .fallback(hooks_api)
        .with_state(Arc::clone(&requests));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, requests)
}

fn client(addr: SocketAddr, token: &str) -> GitLabClient {
    let scope = Scope::Project {
        base_url: format!("http://{addr}/"),
        path: "myuser/myproject".to_string(),
    };
    GitLabClient::new(reqwest::Client::new(), &scope, token).unwrap()
}

fn options(token: &str) -> HookOptions {
    HookOptions::new(
        "http://my-project-abcde.default.svc.cluster.local",
        Zeroizing::new(token.to_string()),
        true,
        &["push_events"],
    )
}

#[tokio::test]
async fn test_get_returns_hook() {
    let (addr, requests) = start_gitlab().await;

    let hook = client(addr, VALID_TOKEN).get(3).await.unwrap();

    assert_eq!(hook.id, 3);
    assert_eq!(hook.url, "http://adapter");
    let recorded = requests.lock().unwrap();
    assert_eq!(recorded[0].method, Method::GET);
    assert_eq!(recorded[0].path, "/api/v4/projects/myuser%2Fmyproject/hooks/3");
}

#[tokio::test]
async fn test_missing_hook_is_not_found() {
    let (addr, _) = start_gitlab().await;

    let err = client(addr, VALID_TOKEN).get(404).await.unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
    assert!(matches!(err, ProviderError::NotFound { id: 404 }));
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let (addr, _) = start_gitlab().await;
    let gitlab = client(addr, "glpat-revoked");

    let err = gitlab.get(3).await.unwrap_err();
    assert!(err.is_unauthorized(), "{err:?}");
    assert!(matches!(
        &err,
        ProviderError::Unauthorized { status: 401, message } if message == "401 Unauthorized"
    ));

    let err = gitlab.delete(3).await.unwrap_err();
    assert!(err.is_unauthorized(), "{err:?}");
}

#[tokio::test]
async fn test_server_error_is_not_classified_as_missing() {
    let (addr, _) = start_gitlab().await;

    let err = client(addr, VALID_TOKEN).delete(500).await.unwrap_err();

    assert!(!err.is_not_found());
    assert!(!err.is_unauthorized());
    assert!(matches!(
        &err,
        ProviderError::Api { status: 500, message } if message == "Internal Server Error"
    ));
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let (addr, requests) = start_gitlab().await;

    client(addr, VALID_TOKEN).delete(8).await.unwrap();

    assert_eq!(requests.lock().unwrap()[0].method, Method::DELETE);
}

#[tokio::test]
async fn test_create_posts_desired_fields() {
    let (addr, requests) = start_gitlab().await;

    let hook = client(addr, VALID_TOKEN)
        .create(&options("shared-secret"))
        .await
        .unwrap();

    assert_eq!(hook.id, 11);
    let recorded = requests.lock().unwrap();
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].path, "/api/v4/projects/myuser%2Fmyproject/hooks");
    let body = recorded[0].body.as_ref().unwrap();
    assert_eq!(body["url"], "http://my-project-abcde.default.svc.cluster.local");
    assert_eq!(body["token"], "shared-secret");
    assert_eq!(body["enable_ssl_verification"], true);
    assert_eq!(body["push_events"], true);
    assert_eq!(body["tag_push_events"], false);
}

/// An edit without a configured secret sends an empty token so GitLab drops the old one
#[tokio::test]
async fn test_edit_clears_token() {
    let (addr, requests) = start_gitlab().await;

    let hook = client(addr, VALID_TOKEN).edit(4, &options("")).await.unwrap();

    assert_eq!(hook.id, 4);
    let recorded = requests.lock().unwrap();
    assert_eq!(recorded[0].method, Method::PUT);
    assert_eq!(recorded[0].path, "/api/v4/projects/myuser%2Fmyproject/hooks/4");
    assert_eq!(recorded[0].body.as_ref().unwrap()["token"], "");
}
