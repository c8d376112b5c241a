use btcmap_sync::{ApiClient, ApiClientConfig, Merge, PageFetcher, SyncError, live_only};
use btcmap_types::{Timestamp, User};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EPOCH: &str = "2022-01-01T00:00:00Z";

fn mock_client(server: &MockServer) -> ApiClient {
    ApiClient::new(ApiClientConfig {
        base_url: server.uri(),
        max_retries: 0,
        ..Default::default()
    })
    .unwrap()
}

fn fetcher<'a>(api: &'a ApiClient, page_size: usize) -> PageFetcher<'a> {
    PageFetcher {
        api,
        collection: "users",
        endpoint: "v3/users",
        page_size,
        extra_query: &[],
    }
}

fn user_json(id: i64, updated_at: &str) -> Value {
    json!({"id": id, "updated_at": updated_at, "name": format!("user-{id}")})
}

fn user(id: i64, updated_at: &str) -> User {
    serde_json::from_value(user_json(id, updated_at)).unwrap()
}

async fn mount_page(server: &MockServer, since: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .and(query_param("updated_since", since))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

// ── Full fetch ──────────────────────────────────────────────────

#[tokio::test]
async fn fetch_all_stops_after_short_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        EPOCH,
        json!([user_json(1, "2024-01-01T00:00:00Z"), user_json(2, "2024-01-02T00:00:00Z")]),
    )
    .await;
    mount_page(
        &server,
        "2024-01-02T00:00:00Z",
        json!([user_json(3, "2024-01-03T00:00:00Z"), user_json(4, "2024-01-04T00:00:00Z")]),
    )
    .await;
    mount_page(
        &server,
        "2024-01-04T00:00:00Z",
        json!([user_json(5, "2024-01-05T00:00:00Z")]),
    )
    .await;

    let api = mock_client(&server);
    let set = fetcher(&api, 2)
        .fetch_all::<User>(Timestamp::sync_epoch())
        .await
        .unwrap();

    // two full pages plus a short one
    assert_eq!(set.len(), 2 * 2 + 1);
}

#[tokio::test]
async fn fetch_all_last_write_wins_across_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        EPOCH,
        json!([{"id": 1, "updated_at": "2024-01-01T00:00:00Z", "name": "A"}]),
    )
    .await;
    mount_page(
        &server,
        "2024-01-01T00:00:00Z",
        json!([{"id": 1, "updated_at": "2024-01-02T00:00:00Z", "name": "B"}]),
    )
    .await;
    mount_page(&server, "2024-01-02T00:00:00Z", json!([])).await;

    let api = mock_client(&server);
    let users = fetcher(&api, 1)
        .fetch_all::<User>(Timestamp::sync_epoch())
        .await
        .unwrap()
        .into_vec();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name.as_deref(), Some("B"));
}

#[tokio::test]
async fn fetch_all_empty_first_page_is_error() {
    let server = MockServer::start().await;
    mount_page(&server, EPOCH, json!([])).await;

    let api = mock_client(&server);
    let result = fetcher(&api, 10).fetch_all::<User>(Timestamp::sync_epoch()).await;

    match result {
        Err(SyncError::EmptyResult { collection }) => assert_eq!(collection, "users"),
        other => panic!("expected empty result error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_all_detects_stalled_cursor() {
    let server = MockServer::start().await;
    let same = json!([user_json(1, "2024-01-01T00:00:00Z"), user_json(2, "2024-01-01T00:00:00Z")]);
    mount_page(&server, EPOCH, same.clone()).await;
    mount_page(&server, "2024-01-01T00:00:00Z", same).await;

    let api = mock_client(&server);
    let result = fetcher(&api, 2).fetch_all::<User>(Timestamp::sync_epoch()).await;

    assert!(matches!(result, Err(SyncError::CursorStalled { .. })));
}

// ── Incremental merge ───────────────────────────────────────────

#[tokio::test]
async fn merge_since_empty_page_is_unchanged() {
    let server = MockServer::start().await;
    mount_page(&server, "2024-02-01T00:00:00Z", json!([])).await;

    let snapshot = vec![user(1, "2024-02-01T00:00:00Z")];
    let api = mock_client(&server);
    let keep = live_only::<User>();
    let merge = fetcher(&api, 10)
        .merge_since(
            &snapshot,
            Timestamp::parse("2024-02-01T00:00:00Z").unwrap(),
            |u| keep(u),
        )
        .await
        .unwrap();

    assert_eq!(merge, Merge::Unchanged);
}

#[tokio::test]
async fn merge_since_removes_tombstones_and_adds_new_records() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "2023-06-01T00:00:00Z",
        json!([
            {"id": 1, "updated_at": "2024-01-01T00:00:00Z", "deleted_at": "2024-01-01"},
            user_json(3, "2024-01-02T00:00:00Z")
        ]),
    )
    .await;

    let snapshot = vec![user(1, "2023-06-01T00:00:00Z"), user(2, "2023-06-01T00:00:00Z")];
    let api = mock_client(&server);
    let keep = live_only::<User>();
    let merge = fetcher(&api, 10)
        .merge_since(
            &snapshot,
            Timestamp::parse("2023-06-01T00:00:00Z").unwrap(),
            |u| keep(u),
        )
        .await
        .unwrap();

    assert_eq!(
        merge,
        Merge::Merged(vec![user(2, "2023-06-01T00:00:00Z"), user(3, "2024-01-02T00:00:00Z")])
    );
}

#[tokio::test]
async fn merge_since_failure_discards_partial_progress() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "2023-06-01T00:00:00Z",
        json!([user_json(3, "2024-01-01T00:00:00Z")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v3/users"))
        .and(query_param("updated_since", "2024-01-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let snapshot = vec![user(1, "2023-06-01T00:00:00Z")];
    let api = mock_client(&server);
    let keep = live_only::<User>();
    let result = fetcher(&api, 1)
        .merge_since(
            &snapshot,
            Timestamp::parse("2023-06-01T00:00:00Z").unwrap(),
            |u| keep(u),
        )
        .await;

    assert!(matches!(result, Err(SyncError::Http { status: 502, .. })));
}
