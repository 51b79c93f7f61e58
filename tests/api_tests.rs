use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;

use friendplay::api::{create_router, AppState};
use friendplay::db::CacheStore;
use friendplay::error::{AppError, AppResult};
use friendplay::models::{CacheSnapshot, Item, ItemId, MemberId};
use friendplay::services::aggregation::AggregationLimits;
use friendplay::services::providers::DataSource;
use friendplay::services::RecommendationService;

const OWNER: &str = "76561197960287930";

/// Libraries keyed by friend id; the primary user owns game 10
struct FakeSource {
    members: Vec<MemberId>,
    libraries: HashMap<String, (Vec<Item>, Vec<Item>)>,
    owned_calls: Mutex<Vec<Option<String>>>,
}

impl FakeSource {
    fn new(friends: Vec<(&str, Vec<Item>, Vec<Item>)>) -> Self {
        Self {
            members: friends.iter().map(|(id, _, _)| MemberId::new(*id)).collect(),
            libraries: friends
                .into_iter()
                .map(|(id, owned, recent)| (id.to_string(), (owned, recent)))
                .collect(),
            owned_calls: Mutex::new(Vec::new()),
        }
    }

    fn friend_calls(&self) -> usize {
        self.owned_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_some())
            .count()
    }
}

#[async_trait::async_trait]
impl DataSource for FakeSource {
    async fn list_members(&self) -> AppResult<Vec<MemberId>> {
        Ok(self.members.clone())
    }

    async fn list_owned_items(&self, member: Option<MemberId>) -> AppResult<Vec<Item>> {
        self.owned_calls
            .lock()
            .unwrap()
            .push(member.as_ref().map(|m| m.to_string()));
        match member {
            None => Ok(vec![game(10, 0)]),
            Some(m) => self
                .libraries
                .get(m.as_str())
                .map(|(owned, _)| owned.clone())
                .ok_or_else(|| AppError::Authorization(format!("{} is private", m))),
        }
    }

    async fn list_recent_items(&self, member: Option<MemberId>) -> AppResult<Vec<Item>> {
        let member = member.ok_or_else(|| AppError::Internal("unexpected".to_string()))?;
        self.libraries
            .get(member.as_str())
            .map(|(_, recent)| recent.clone())
            .ok_or_else(|| AppError::Authorization(format!("{} is private", member)))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
struct MemoryStore {
    snapshot: Mutex<Option<CacheSnapshot>>,
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self) -> AppResult<Option<CacheSnapshot>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> AppResult<()> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        *self.snapshot.lock().unwrap() = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn game(id: u32, minutes: u64) -> Item {
    Item {
        id: ItemId(id),
        name: Some(format!("Game #{}", id)),
        playtime_minutes: minutes,
    }
}

fn create_test_server(source: Arc<FakeSource>, store: Arc<MemoryStore>) -> TestServer {
    let service = RecommendationService::new(
        source,
        store,
        AggregationLimits::default(),
        OWNER.to_string(),
        Duration::from_secs(3600),
    );
    let app = create_router(AppState::new(
        service,
        "https://store.steampowered.com".to_string(),
    ));
    TestServer::new(app).unwrap()
}

fn default_friends() -> Vec<(&'static str, Vec<Item>, Vec<Item>)> {
    vec![
        ("a", vec![game(10, 60), game(20, 600)], vec![game(20, 600)]),
        ("b", vec![game(20, 1200), game(30, 60)], vec![]),
    ]
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(
        Arc::new(FakeSource::new(vec![])),
        Arc::new(MemoryStore::default()),
    );
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_recommendations_ranked() {
    let source = Arc::new(FakeSource::new(default_friends()));
    let server = create_test_server(source, Arc::new(MemoryStore::default()));

    let response = server.get("/api/v1/recommendations").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let recs = body["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 2);

    // 2 owners + 1 recent + 15h average
    assert_eq!(recs[0]["id"], 20);
    assert_eq!(recs[0]["score"], 55.0);
    assert_eq!(recs[0]["friends_who_own"], serde_json::json!(["a", "b"]));
    assert_eq!(recs[0]["average_playtime_hours"], 15);
    assert_eq!(
        recs[0]["store_url"],
        "https://store.steampowered.com/app/20"
    );
    assert_eq!(recs[1]["id"], 30);

    assert_eq!(body["summary"]["succeeded"], 2);
    assert!(body["empty_reason"].is_null());
}

#[tokio::test]
async fn test_second_run_resumes_from_cache() {
    let source = Arc::new(FakeSource::new(default_friends()));
    let store = Arc::new(MemoryStore::default());
    let server = create_test_server(source.clone(), store.clone());

    server.get("/api/v1/recommendations").await.assert_status_ok();
    assert_eq!(source.friend_calls(), 2);

    let response = server.get("/api/v1/recommendations").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["summary"]["from_cache"], 2);
    assert_eq!(source.friend_calls(), 2);

    server
        .get("/api/v1/recommendations")
        .add_query_param("fresh", "true")
        .await
        .assert_status_ok();
    assert_eq!(source.friend_calls(), 4);
}

#[tokio::test]
async fn test_private_friends_are_skipped() {
    let mut friends = default_friends();
    friends.push(("private", vec![], vec![]));
    let mut source = FakeSource::new(friends);
    source.libraries.remove("private");

    let server = create_test_server(Arc::new(source), Arc::new(MemoryStore::default()));
    let body: serde_json::Value = server.get("/api/v1/recommendations").await.json();

    assert_eq!(body["summary"]["failed"], 1);
    assert_eq!(body["summary"]["succeeded"], 2);
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_friends_reports_reason() {
    let server = create_test_server(
        Arc::new(FakeSource::new(vec![])),
        Arc::new(MemoryStore::default()),
    );

    let body: serde_json::Value = server.get("/api/v1/recommendations").await.json();
    assert!(body["recommendations"].as_array().unwrap().is_empty());
    assert_eq!(body["empty_reason"]["kind"], "no_members");
}

#[tokio::test]
async fn test_clear_cache() {
    let source = Arc::new(FakeSource::new(default_friends()));
    let store = Arc::new(MemoryStore::default());
    let server = create_test_server(source.clone(), store.clone());

    server.get("/api/v1/recommendations").await.assert_status_ok();
    assert!(store.snapshot.lock().unwrap().is_some());

    server
        .delete("/api/v1/cache")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(store.snapshot.lock().unwrap().is_none());

    server.get("/api/v1/recommendations").await.assert_status_ok();
    assert_eq!(source.friend_calls(), 4);
}
