//! Integration tests for the roster service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{Mutex, RwLock};
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{init_database, SqliteStore};
use crate::errors::AppError;
use crate::models::{Member, NewMember};
use crate::preferences::{Theme, ThemePreference};
use crate::roster::{RosterController, RosterFeatures, SharedPassphrase};
use crate::store::{HttpStore, RecordStore};
use crate::{create_router, AppState};

const PASSPHRASE: &str = "12345";

fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        db_path: temp_dir.path().join("test.sqlite"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        store_url: None,
        store_timeout: Duration::from_secs(5),
        passphrase: PASSPHRASE.to_string(),
        features: RosterFeatures::default(),
        prefs_path: temp_dir.path().join("preferences.json"),
        system_theme: Theme::Light,
    }
}

/// Local collection whose inserts take a while to answer.
struct SlowStore {
    inner: Arc<SqliteStore>,
    delay: Duration,
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn list(&self) -> Result<Vec<Member>, AppError> {
        self.inner.list().await
    }

    async fn insert(&self, member: &NewMember) -> Result<Member, AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(member).await
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.inner.remove(id).await
    }
}

async fn build_state(
    temp_dir: &TempDir,
    controller_store: impl FnOnce(Arc<SqliteStore>) -> Arc<dyn RecordStore>,
) -> AppState {
    let config = test_config(temp_dir);
    let pool = init_database(&config.db_path)
        .await
        .expect("Failed to init DB");
    let collection = Arc::new(SqliteStore::new(pool));

    let controller = RosterController::new(
        controller_store(collection.clone()),
        Arc::new(SharedPassphrase::new(PASSPHRASE)),
        config.features.clone(),
    );
    let preferences = ThemePreference::load(&config.prefs_path, config.system_theme);

    AppState {
        collection,
        view: controller.subscribe(),
        roster: Arc::new(Mutex::new(controller)),
        preferences: Arc::new(RwLock::new(preferences)),
    }
}

fn local_store(collection: Arc<SqliteStore>) -> Arc<dyn RecordStore> {
    collection
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_store(local_store).await
    }

    async fn with_store(
        controller_store: impl FnOnce(Arc<SqliteStore>) -> Arc<dyn RecordStore>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = build_state(&temp_dir, controller_store).await;
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn intent(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/roster/intents"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn view(&self) -> Value {
        let resp = self
            .client
            .get(self.url("/api/roster/view"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn add(&self, name: &str) -> Value {
        let resp = self
            .intent(json!({
                "type": "submitDraft",
                "draft": { "fullName": name, "phone": "555-0100", "address": "1 Bridge St" }
            }))
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_router_serves_view_without_network() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_router(build_state(&temp_dir, local_store).await);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/roster/view")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["emptyMessage"], "No members found.");
    assert_eq!(body["data"]["saving"], false);
}

#[tokio::test]
async fn test_member_collection_crud() {
    let fixture = TestFixture::new().await;

    let create_resp = fixture
        .client
        .post(fixture.url("/api/members"))
        .json(&json!({
            "fullName": "Test User",
            "phone": "555-0100",
            "address": "1 Bridge St",
            "role": "Usher"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(create_resp.status(), 200);
    let create_body: Value = create_resp.json().await.unwrap();
    assert_eq!(create_body["success"], true);
    let member_id = create_body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(create_body["data"]["fullName"], "Test User");
    assert_eq!(create_body["data"]["isTeamMember"], false);
    assert!(create_body["data"].get("role").is_none());
    assert!(create_body["data"]["createdAt"].is_string());

    let get_resp = fixture
        .client
        .get(fixture.url(&format!("/api/members/{}", member_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 200);

    let list_resp = fixture
        .client
        .get(fixture.url("/api/members"))
        .send()
        .await
        .unwrap();
    let list_body: Value = list_resp.json().await.unwrap();
    assert_eq!(list_body["data"].as_array().unwrap().len(), 1);

    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/members/{}", member_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    let get_deleted_resp = fixture
        .client
        .get(fixture.url(&format!("/api/members/{}", member_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_deleted_resp.status(), 404);
}

#[tokio::test]
async fn test_member_collection_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/members"))
        .json(&json!({ "fullName": "", "phone": "555", "address": " " }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["missing"], json!(["full_name", "address"]));
}

#[tokio::test]
async fn test_roster_add_search_and_delete() {
    let fixture = TestFixture::new().await;

    fixture.add("Jane Doe").await;
    let view = fixture.add("John Smith").await;
    assert_eq!(view["totalCount"], 2);
    assert_eq!(view["rows"][0]["fullName"], "John Smith");
    assert_eq!(view["draft"]["fullName"], "");

    let resp = fixture
        .intent(json!({ "type": "setQuery", "query": "JANE" }))
        .await;
    let body: Value = resp.json().await.unwrap();
    let rows = body["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    let jane_id = rows[0]["id"].as_str().unwrap().to_string();

    fixture
        .intent(json!({ "type": "requestDelete", "id": jane_id }))
        .await;
    let view = fixture.view().await;
    assert_eq!(view["deleteModal"]["targetName"], "Jane Doe");

    let resp = fixture
        .intent(json!({ "type": "confirmDelete", "passphrase": "1234" }))
        .await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "AUTHORIZATION_ERROR");

    let view = fixture.view().await;
    assert_eq!(view["totalCount"], 2);
    assert_eq!(view["deleteModal"]["attempts"], 1);
    assert_eq!(view["notice"]["message"], "Incorrect passphrase");

    let resp = fixture
        .intent(json!({ "type": "confirmDelete", "passphrase": PASSPHRASE }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["totalCount"], 1);
    assert!(body["data"].get("deleteModal").is_none());
    assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_roster_invalid_draft_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .intent(json!({
            "type": "submitDraft",
            "draft": { "fullName": "Jane Doe", "phone": "", "address": "" }
        }))
        .await;
    assert_eq!(resp.status(), 400);

    let view = fixture.view().await;
    assert_eq!(view["totalCount"], 0);
    assert_eq!(view["draft"]["fullName"], "Jane Doe");
    assert_eq!(view["saving"], false);

    let list: Value = fixture
        .client
        .get(fixture.url("/api/members"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_roster_export_downloads() {
    let fixture = TestFixture::new().await;
    fixture.add("Jane Doe").await;
    fixture.add("John Smith").await;
    fixture
        .intent(json!({ "type": "setQuery", "query": "smith" }))
        .await;

    let resp = fixture
        .intent(json!({ "type": "requestExport", "format": "spreadsheet" }))
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"member_list.csv\""
    );
    let text = resp.text().await.unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("John Smith"));
    assert!(!text.contains("Jane Doe"));

    // Document export waits for the passphrase
    let resp = fixture
        .intent(json!({ "type": "requestExport", "format": "document" }))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["exportModal"]["format"], "document");

    let resp = fixture
        .intent(json!({ "type": "confirmExport", "passphrase": PASSPHRASE }))
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
}

#[tokio::test]
async fn test_theme_preference_persists() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/preferences/theme"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["theme"], "light");

    let resp = fixture
        .client
        .put(fixture.url("/api/preferences/theme"))
        .json(&json!({ "theme": "dark" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let stored = std::fs::read_to_string(fixture._temp_dir.path().join("preferences.json"))
        .unwrap();
    assert!(stored.contains("dark"));
}

#[tokio::test]
async fn test_http_store_against_collection() {
    let fixture = TestFixture::new().await;
    let store = HttpStore::new(fixture.base_url.clone(), Duration::from_secs(5)).unwrap();

    let controller_store: Arc<dyn RecordStore> = Arc::new(store.clone());
    let mut controller = RosterController::new(
        controller_store,
        Arc::new(SharedPassphrase::new(PASSPHRASE)),
        RosterFeatures::default(),
    );

    let created = controller
        .submit_draft(crate::models::FormDraft {
            full_name: "Remote Person".to_string(),
            phone: "555-0100".to_string(),
            address: "1 Bridge St".to_string(),
            is_team_member: true,
            role: "Choir".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.role.as_deref(), Some("Choir"));
    assert_eq!(controller.cache().members().len(), 1);

    controller.request_delete(&created.id).await.unwrap();
    controller
        .confirm_delete(Some(PASSPHRASE.to_string()))
        .await
        .unwrap();
    assert!(controller.cache().members().is_empty());

    // Deleting again surfaces the collection's failure as a store error
    let err = store.remove(&created.id).await.unwrap_err();
    assert_eq!(err.error_code(), crate::errors::codes::STORE_ERROR);
}

#[tokio::test]
async fn test_view_answers_while_insert_in_flight() {
    let fixture = TestFixture::with_store(|collection| -> Arc<dyn RecordStore> {
        Arc::new(SlowStore {
            inner: collection,
            delay: Duration::from_millis(500),
        })
    })
    .await;

    let client = fixture.client.clone();
    let url = fixture.url("/api/roster/intents");
    let submit = tokio::spawn(async move {
        client
            .post(url)
            .json(&json!({
                "type": "submitDraft",
                "draft": { "fullName": "Jane Doe", "phone": "555-0100", "address": "1 Bridge St" }
            }))
            .send()
            .await
            .unwrap()
            .status()
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    let view = tokio::time::timeout(Duration::from_millis(250), fixture.view())
        .await
        .expect("view blocked behind the in-flight intent");
    assert_eq!(view["saving"], true);
    assert_eq!(view["totalCount"], 0);

    assert_eq!(submit.await.unwrap(), 200);
    let view = fixture.view().await;
    assert_eq!(view["saving"], false);
    assert_eq!(view["totalCount"], 1);
}

#[tokio::test]
async fn test_abandoned_intent_still_completes() {
    let fixture = TestFixture::with_store(|collection| -> Arc<dyn RecordStore> {
        Arc::new(SlowStore {
            inner: collection,
            delay: Duration::from_millis(300),
        })
    })
    .await;

    // The client gives up long before the insert answers
    let result = Client::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap()
        .post(fixture.url("/api/roster/intents"))
        .json(&json!({
            "type": "submitDraft",
            "draft": { "fullName": "Jane Doe", "phone": "555-0100", "address": "1 Bridge St" }
        }))
        .send()
        .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;
    let view = fixture.view().await;
    assert_eq!(view["saving"], false);
    assert_eq!(view["totalCount"], 1);
    assert_eq!(view["draft"]["fullName"], "");
}
