use btcmap_sync::{ApiClient, ApiClientConfig, PageQuery, SyncError};
use btcmap_types::{Timestamp, User};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_config(server: &MockServer) -> ApiClientConfig {
    ApiClientConfig {
        base_url: server.uri(),
        max_retries: 2,
        base_backoff_ms: 1,
        max_backoff_ms: 5,
        ..Default::default()
    }
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(mock_config(server)).unwrap()
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn api_client_config_default() {
    let cfg = ApiClientConfig::default();
    assert_eq!(cfg.base_url, "https://api.btcmap.org");
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.max_retries, 3);
    assert!(cfg.user_agent.starts_with("btcmap-sync/"));
}

#[test]
fn api_client_config_partial_json_uses_defaults() {
    let cfg: ApiClientConfig =
        serde_json::from_str(r#"{"base_url":"http://localhost:9000","max_retries":0}"#).unwrap();
    assert_eq!(cfg.base_url, "http://localhost:9000");
    assert_eq!(cfg.max_retries, 0);
    assert_eq!(cfg.base_backoff_ms, 250);
}

#[test]
fn endpoint_url_joins_base_and_path() {
    let api = ApiClient::new(ApiClientConfig {
        base_url: "https://api.example.com/".to_string(),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(api.endpoint_url("/v3/users"), "https://api.example.com/v3/users");
    assert_eq!(api.endpoint_url("v3/users"), "https://api.example.com/v3/users");
    assert_eq!(
        api.endpoint_url("https://static.example.com/places.json"),
        "https://static.example.com/places.json"
    );
}

// ── Page fetch ──────────────────────────────────────────────────

#[tokio::test]
async fn fetch_page_sends_cursor_limit_and_extra_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .and(query_param("updated_since", "2024-03-01T12:00:00Z"))
        .and(query_param("limit", "500"))
        .and(query_param("fields", "id,name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "name": "satoshi", "updated_at": "2024-03-02T00:00:00Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = Timestamp::parse("2024-03-01T12:00:00Z").unwrap();
    let extra = vec![("fields".to_string(), "id,name".to_string())];
    let query = PageQuery {
        updated_since: &cursor,
        limit: 500,
        extra: &extra,
    };

    let page: Vec<User> = client(&server).fetch_page("v3/users", &query).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, 7);
    assert_eq!(page[0].name.as_deref(), Some("satoshi"));
}

#[tokio::test]
async fn fetch_page_rejects_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let cursor = Timestamp::sync_epoch();
    let query = PageQuery {
        updated_since: &cursor,
        limit: 10,
        extra: &[],
    };

    let result: Result<Vec<User>, _> = client(&server).fetch_page("v3/users", &query).await;
    assert!(matches!(result, Err(SyncError::Serialization(_))));
}

// ── Retries ─────────────────────────────────────────────────────

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = Timestamp::sync_epoch();
    let query = PageQuery {
        updated_since: &cursor,
        limit: 10,
        extra: &[],
    };

    let page: Vec<User> = client(&server).fetch_page("v3/users", &query).await.unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn retries_exhausted_returns_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let cursor = Timestamp::sync_epoch();
    let query = PageQuery {
        updated_since: &cursor,
        limit: 10,
        extra: &[],
    };

    let result: Result<Vec<User>, _> = client(&server).fetch_page("v3/users", &query).await;
    match result {
        Err(SyncError::Http { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.contains("/v3/users"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = Timestamp::sync_epoch();
    let query = PageQuery {
        updated_since: &cursor,
        limit: 10,
        extra: &[],
    };

    let result: Result<Vec<User>, _> = client(&server).fetch_page("v3/users", &query).await;
    assert!(matches!(result, Err(SyncError::Http { status: 404, .. })));
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let api = ApiClient::new(ApiClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        max_retries: 0,
        ..Default::default()
    })
    .unwrap();

    let cursor = Timestamp::sync_epoch();
    let query = PageQuery {
        updated_since: &cursor,
        limit: 10,
        extra: &[],
    };

    let err = api.fetch_page::<User>("v3/users", &query).await.unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
    assert!(err.is_transport());
}

// ── Static resources ────────────────────────────────────────────

#[tokio::test]
async fn head_last_modified_parses_http_date() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/static/places.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/static/places.json", server.uri());
    let last_modified = client(&server).head_last_modified(&url).await.unwrap();
    assert_eq!(
        last_modified,
        Some(Timestamp::parse("2015-10-21T07:28:00Z").unwrap())
    );
}

#[tokio::test]
async fn head_without_last_modified_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/static/places.json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = format!("{}/static/places.json", server.uri());
    assert_eq!(client(&server).head_last_modified(&url).await.unwrap(), None);
}

#[tokio::test]
async fn get_json_decodes_document() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/static/users.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "updated_at": "2024-01-01T00:00:00Z"},
            {"id": 2, "updated_at": "2024-01-02T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let url = format!("{}/static/users.json", server.uri());
    let users: Vec<User> = client(&server).get_json(&url).await.unwrap();
    assert_eq!(users.len(), 2);
}
