use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use relist_api::auth::CustomerClaims;
use relist_api::state::{AppState, AuthSettings};
use relist_api::app;
use relist_core::models::{ConfirmOutcome, ExpiredItem, MigrationPlan, WizardSession};
use relist_core::repository::{
    CatalogStore, ListLockStore, ListWriter, RateLimiter, SearchEngine, SessionStore,
};
use relist_core::search::{SearchHit, SearchQuery};
use relist_core::WizardResult;
use relist_wizard::{ConfirmationEngine, WizardOrchestrator, WizardRules};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret";

// ---------------------------------------------------------------------------
// Stub backends: just enough behavior to drive the handlers end to end.
// ---------------------------------------------------------------------------

struct StubCatalog {
    list_id: Uuid,
    items: Vec<ExpiredItem>,
}

#[async_trait]
impl CatalogStore for StubCatalog {
    async fn expired_items(&self, list_id: Uuid) -> WizardResult<Vec<ExpiredItem>> {
        if list_id == self.list_id {
            Ok(self.items.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn offer_is_valid(&self, _: Uuid, _: Uuid, _: i64) -> WizardResult<bool> {
        Ok(true)
    }
}

struct StubEngine {
    hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchEngine for StubEngine {
    async fn find_similar(&self, _query: &SearchQuery) -> WizardResult<Vec<SearchHit>> {
        Ok(self.hits.clone())
    }
}

#[derive(Default)]
struct MemorySessions {
    sessions: Mutex<HashMap<Uuid, WizardSession>>,
    ledger: Mutex<HashMap<(Uuid, String), ConfirmOutcome>>,
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn create(&self, session: &WizardSession) -> WizardResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> WizardResult<Option<WizardSession>> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn save(&self, session: &WizardSession) -> WizardResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> WizardResult<()> {
        self.sessions.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn ledger_get(&self, session_id: Uuid, key: &str) -> WizardResult<Option<ConfirmOutcome>> {
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .get(&(session_id, key.to_string()))
            .cloned())
    }

    async fn ledger_put(
        &self,
        session_id: Uuid,
        key: &str,
        outcome: &ConfirmOutcome,
    ) -> WizardResult<()> {
        self.ledger
            .lock()
            .unwrap()
            .insert((session_id, key.to_string()), outcome.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryLocks {
    locked: Mutex<HashMap<Uuid, Uuid>>,
}

#[async_trait]
impl ListLockStore for MemoryLocks {
    async fn holder(&self, list_id: Uuid) -> WizardResult<Option<Uuid>> {
        Ok(self.locked.lock().unwrap().get(&list_id).copied())
    }

    async fn try_lock(&self, list_id: Uuid, session_id: Uuid) -> WizardResult<bool> {
        let mut locked = self.locked.lock().unwrap();
        if locked.contains_key(&list_id) {
            return Ok(false);
        }
        locked.insert(list_id, session_id);
        Ok(true)
    }

    async fn unlock(&self, list_id: Uuid) -> WizardResult<()> {
        self.locked.lock().unwrap().remove(&list_id);
        Ok(())
    }
}

struct AllowAll;

#[async_trait]
impl RateLimiter for AllowAll {
    async fn try_acquire(&self, _user_id: &str) -> WizardResult<bool> {
        Ok(true)
    }
}

struct NoopWriter;

#[async_trait]
impl ListWriter for NoopWriter {
    async fn apply_migration(&self, _plan: &MigrationPlan) -> WizardResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixture: a router with one list carrying one expired Barilla item.
// ---------------------------------------------------------------------------

fn test_state(list_id: Uuid) -> AppState {
    let store_id = Uuid::new_v4();
    let catalog = Arc::new(StubCatalog {
        list_id,
        items: vec![ExpiredItem {
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Barilla Spaghetti 500g".to_string(),
            brand: Some("Barilla".to_string()),
            store_id,
            price_cents: 199,
        }],
    });
    let engine = Arc::new(StubEngine {
        hits: vec![
            SearchHit {
                product_id: Uuid::new_v4(),
                store_id,
                name: "Barilla Spaghetti N5".to_string(),
                brand: Some("Barilla".to_string()),
                price_cents: 209,
                similarity: 0.92,
            },
            SearchHit {
                product_id: Uuid::new_v4(),
                store_id,
                name: "Barilla Spaghetti 1kg".to_string(),
                brand: Some("Barilla".to_string()),
                price_cents: 349,
                similarity: 0.74,
            },
        ],
    });
    let sessions = Arc::new(MemorySessions::default());
    let locks = Arc::new(MemoryLocks::default());

    let orchestrator = Arc::new(WizardOrchestrator::new(
        catalog.clone(),
        engine,
        sessions.clone(),
        locks.clone(),
        Arc::new(AllowAll),
        WizardRules::default(),
    ));
    let confirmation = Arc::new(ConfirmationEngine::new(
        catalog,
        Arc::new(NoopWriter),
        sessions,
        locks,
    ));

    AppState {
        orchestrator,
        confirmation,
        auth: AuthSettings {
            secret: SECRET.to_string(),
        },
    }
}

fn token_for(sub: &str) -> String {
    let claims = CustomerClaims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn start_request(list_id: Uuid, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/wizard/sessions")
        .header("Authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "list_id": list_id }).to_string(),
        ))
        .unwrap()
}

fn get_request(session_id: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(format!("/v1/wizard/sessions/{session_id}"))
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let list_id = Uuid::new_v4();
    let router = app(test_state(list_id));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/v1/wizard/sessions/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(get_request(&Uuid::new_v4().to_string(), "not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_start_then_fetch_session_roundtrip() {
    let list_id = Uuid::new_v4();
    let router = app(test_state(list_id));
    let token = token_for("alice");

    let response = router
        .clone()
        .oneshot(start_request(list_id, &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let session = body_json(response).await;
    assert_eq!(session["status"], "ACTIVE");
    assert_eq!(session["items"].as_array().unwrap().len(), 1);
    assert!(!session["items"][0]["candidates"]
        .as_array()
        .unwrap()
        .is_empty());
    let session_id = session["id"].as_str().unwrap().to_string();

    let response = router
        .oneshot(get_request(&session_id, &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["id"].as_str().unwrap(), session_id);
}

#[tokio::test]
async fn test_foreign_session_is_forbidden() {
    let list_id = Uuid::new_v4();
    let router = app(test_state(list_id));

    let response = router
        .clone()
        .oneshot(start_request(list_id, &token_for("alice")))
        .await
        .unwrap();
    let session = body_json(response).await;
    let session_id = session["id"].as_str().unwrap().to_string();

    let response = router
        .oneshot(get_request(&session_id, &token_for("mallory")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_session_maps_to_not_found_json() {
    let list_id = Uuid::new_v4();
    let router = app(test_state(list_id));

    let response = router
        .oneshot(get_request(
            &Uuid::new_v4().to_string(),
            &token_for("alice"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("session"));
}
