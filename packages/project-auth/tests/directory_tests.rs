//! End-to-end behaviour of the directory client over mock collaborators.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use project_auth::test_dependencies::{
    token_param, MockCredentialSource, MockTransport, StaticMetadataLookup,
};
use project_auth::{
    ApprovalStatus, AuthConfig, AuthError, ProjectDirectoryClient, ProjectFilter,
    RawResponse, RemoteCallExecutor, ServiceIdentity, TokenStore,
};
use serde_json::json;

fn directory(
    source: &Arc<MockCredentialSource>,
    transport: &Arc<MockTransport>,
) -> ProjectDirectoryClient {
    let config = AuthConfig::new("http://auth.local/api").unwrap();
    let tokens = TokenStore::new(source.clone());
    ProjectDirectoryClient::new(RemoteCallExecutor::new(config, transport.clone(), tokens))
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_retried() {
    let source = Arc::new(MockCredentialSource::new().with_tokens(["old", "new"]));
    let transport = Arc::new(
        MockTransport::new()
            .with_json("/api/projects/demo/users", json!({"code": 403, "message": "expired"}))
            .with_json("/api/projects/demo/users", json!({"code": 0, "data": ["alice"]})),
    );
    let client = directory(&source, &transport);

    let users = client
        .list_project_users(&ServiceIdentity::pipeline(), "demo", None)
        .await
        .unwrap();

    assert_eq!(users, vec!["alice"]);
    assert_eq!(source.fetch_count(), 2);
    assert_eq!(transport.tokens_seen(), vec!["old", "new"]);

    // Subsequent calls reuse the refreshed token.
    let cached = client
        .executor()
        .tokens()
        .cached(&ServiceIdentity::pipeline())
        .await
        .unwrap();
    assert_eq!(cached.as_str(), "new");
}

#[tokio::test]
async fn token_is_fetched_once_across_calls() {
    let source = Arc::new(MockCredentialSource::new());
    let transport = Arc::new(
        MockTransport::new().with_handler(|_| Ok(RawResponse::new(200, r#"{"code":0,"data":[]}"#))),
    );
    let client = directory(&source, &transport);
    let identity = ServiceIdentity::pipeline();

    for project in ["a", "b", "c"] {
        client.list_project_users(&identity, project, None).await.unwrap();
    }
    client.list_user_project_codes(&identity, "alice").await.unwrap();

    assert_eq!(source.fetch_count(), 1);
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn zero_projects_is_empty_not_error() {
    let source = Arc::new(MockCredentialSource::new());
    let transport =
        Arc::new(MockTransport::new().with_json("/api/projects", json!({"code": 0, "data": null})));
    let client = directory(&source, &transport);

    let codes = client
        .list_user_project_codes(&ServiceIdentity::pipeline(), "newcomer")
        .await
        .unwrap();

    assert!(codes.is_empty());
}

#[tokio::test]
async fn available_projects_skip_missing_metadata() {
    let source = Arc::new(MockCredentialSource::new());
    let transport = Arc::new(MockTransport::new().with_json(
        "/api/projects",
        json!({"code": 0, "data": [
            {"project_code": "A", "project_id": "1"},
            {"project_code": "B", "project_id": "2"},
            {"project_code": "C", "project_id": "3"}
        ]}),
    ));
    let lookup = Arc::new(
        StaticMetadataLookup::new()
            .with_project("A", "Project A", ApprovalStatus::Approved, false)
            .with_project("B", "Project B", ApprovalStatus::Approved, true),
    );
    let client = directory(&source, &transport).with_filter(ProjectFilter::new(lookup.clone()));

    let available = client
        .list_user_available_projects(&ServiceIdentity::pipeline(), "alice")
        .await
        .unwrap();

    assert_eq!(available.len(), 1);
    assert_eq!(available["A"], "Project A");
    assert_eq!(lookup.lookups()[0].len(), 3);
}

#[tokio::test]
async fn metadata_failure_returns_no_partial_result() {
    let source = Arc::new(MockCredentialSource::new());
    let transport = Arc::new(MockTransport::new().with_json(
        "/api/projects",
        json!({"code": 0, "data": [{"project_code": "A", "project_id": "1"}]}),
    ));
    let lookup = StaticMetadataLookup::new().failing("project service unavailable");
    let client = directory(&source, &transport).with_filter(ProjectFilter::new(Arc::new(lookup)));

    let err = client
        .list_user_available_projects(&ServiceIdentity::pipeline(), "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::MetadataLookup(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_callers_share_one_refresh() {
    let source = Arc::new(
        MockCredentialSource::new()
            .with_tokens(["expired", "fresh"])
            .with_delay(Duration::from_millis(20)),
    );
    let transport = Arc::new(MockTransport::new().with_handler(|url| {
        let body = match token_param(url).as_deref() {
            Some("fresh") => r#"{"code":0,"data":["alice"]}"#,
            _ => r#"{"code":403,"message":"token expired"}"#,
        };
        Ok(RawResponse::new(200, body))
    }));
    let client = directory(&source, &transport);
    let identity = ServiceIdentity::pipeline();

    // Warm the cache with the token the upstream will reject.
    client.executor().tokens().get_token(&identity).await.unwrap();

    let calls = (0..50).map(|_| {
        let client = client.clone();
        let identity = identity.clone();
        tokio::spawn(async move { client.list_project_users(&identity, "demo", None).await })
    });

    for result in join_all(calls).await {
        let users = result.unwrap().unwrap();
        assert_eq!(users, vec!["alice"]);
    }

    // One warm-up fetch plus exactly one refresh.
    assert_eq!(source.fetch_count(), 2);
    assert!(transport.tokens_seen().iter().all(|token| !token.is_empty()));
    assert_eq!(
        client.executor().tokens().cached(&identity).await.unwrap().as_str(),
        "fresh"
    );
}

#[tokio::test]
async fn identities_refresh_independently() {
    let source = Arc::new(MockCredentialSource::new().with_tokens(["p1", "t1", "p2"]));
    let transport = Arc::new(
        MockTransport::new()
            .with_json("/api/projects/demo/users", json!({"code": 403}))
            .with_json("/api/projects/demo/users", json!({"code": 0, "data": ["alice"]}))
            .with_json("/api/projects/demo/users", json!({"code": 0, "data": ["bob"]})),
    );
    let client = directory(&source, &transport);
    let tokens = client.executor().tokens();
    let pipeline = ServiceIdentity::pipeline();
    let ticket = ServiceIdentity::ticket();

    tokens.get_token(&pipeline).await.unwrap();
    tokens.get_token(&ticket).await.unwrap();

    client.list_project_users(&pipeline, "demo", None).await.unwrap();
    client.list_project_users(&ticket, "demo", None).await.unwrap();

    assert_eq!(tokens.cached(&pipeline).await.unwrap().as_str(), "p2");
    assert_eq!(tokens.cached(&ticket).await.unwrap().as_str(), "t1");
}
