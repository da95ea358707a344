//! Integration tests for hr-client
//!
//! Happy paths run against the real hr-server on an ephemeral port. Failure
//! injection (500 on join, slow responses, refresh counting) uses small axum
//! stub servers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hr_client::store::orgs::{JoinState, OrgParams};
use hr_client::store::reviews::ReviewParams;
use hr_client::{Actions, ApiClient, ClientError, MemoryStorage, PersonalityRef, SharedStore};
use hr_common::api::query::{ReviewListQuery, ReviewSort};
use hr_common::api::requests::{NamedCreate, RegisterRequest, ReviewCreate};
use hr_common::api::types::{MemberRole, TokenResponse};
use hr_common::Aggregate;
use hr_server::config::{AuthConfig, HttpConfig, PasswordCost, ServerConfig};
use hr_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use uuid::Uuid;

const PASSWORD: &str = "correct-horse-battery";

/// Serve `router` on 127.0.0.1 and return the API base URL
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base_url: &str) -> Actions {
    let api = ApiClient::new(base_url, Arc::new(MemoryStorage::new())).unwrap();
    Actions::new(api, SharedStore::default())
}

struct RealServer {
    base_url: String,
    _dir: TempDir,
}

impl RealServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let database_path = dir.path().join("honest_reviews.db");
        let db = hr_common::db::init_database(&database_path).await.unwrap();

        let mut auth = AuthConfig::new("client-test-secret", "client-test-pepper");
        auth.password_cost = PasswordCost::minimal();
        auth.recovery_code_count = 2;
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path,
            auth,
            http: HttpConfig::default(),
        };

        let base_url = serve(build_router(AppState::new(db, config))).await;
        Self {
            base_url,
            _dir: dir,
        }
    }

    async fn user(&self, username: &str) -> Actions {
        let actions = client(&self.base_url);
        actions
            .api()
            .register(&RegisterRequest {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        actions.login(username, PASSWORD).await.unwrap();
        actions
    }
}

fn tokens(access: &str, refresh: &str) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_in: 900,
        token_type: "bearer".to_string(),
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

// ========================================
// Real server
// ========================================

#[tokio::test]
async fn test_review_lifecycle_keeps_stats_in_step() {
    let server = RealServer::start().await;
    let alice = server.user("alice").await;

    let org = alice
        .create_org(&NamedCreate {
            name: "Acme Widgets".into(),
            description: None,
        })
        .await
        .unwrap();
    let personality = alice
        .create_personality(
            &org.slug,
            &NamedCreate {
                name: "The Boss".into(),
                description: None,
            },
        )
        .await
        .unwrap();
    let target = PersonalityRef::new(&org.slug, &personality);

    alice.load_reviews(&target, ReviewParams::default()).await.unwrap();
    let stats = |a: &Actions| a.store().read(|s| s.reviews.stats(&target.id));
    assert_eq!(stats(&alice), Some(Aggregate::new(0, 0.0)));

    let mut ids = Vec::new();
    for rating in [5, 2] {
        let review = alice
            .create_review(
                &target,
                &ReviewCreate {
                    title: format!("Rated {}", rating),
                    body: "Fair and specific.".into(),
                    rating,
                },
            )
            .await
            .unwrap();
        ids.push(review.id);
    }
    assert_eq!(stats(&alice), Some(Aggregate::new(2, 3.5)));

    // Local math agrees with the server
    alice.reload_reviews(&target).await.unwrap();
    assert_eq!(stats(&alice), Some(Aggregate::new(2, 3.5)));
    assert_eq!(alice.store().read(|s| s.reviews.items(&target.id).len()), 2);

    for id in ids {
        alice.delete_review(target.id, id).await.unwrap();
    }
    assert_eq!(stats(&alice), Some(Aggregate::new(0, 0.0)));
    assert!(alice.store().read(|s| s.reviews.items(&target.id).is_empty()));
}

#[tokio::test]
async fn test_second_user_joins_through_store() {
    let server = RealServer::start().await;
    let alice = server.user("alice").await;
    alice
        .create_org(&NamedCreate {
            name: "Acme".into(),
            description: None,
        })
        .await
        .unwrap();

    let bob = server.user("bob").await;
    bob.load_orgs(OrgParams::default()).await.unwrap();
    let before = bob.store().read(|s| s.orgs.get("acme").cloned()).unwrap();
    assert!(!before.is_member);
    assert_eq!(before.org.members_count, 1);

    bob.join_org("acme").await.unwrap();

    bob.store().read(|s| {
        let entry = s.orgs.get("acme").unwrap();
        assert!(entry.is_member);
        assert_eq!(entry.role, Some(MemberRole::Member));
        assert_eq!(entry.org.members_count, 2);
        assert_eq!(s.orgs.join_state("acme"), Some(&JoinState::Committed));
    });

    // Server agrees after a fresh load
    bob.load_orgs(OrgParams::default()).await.unwrap();
    let after = bob.store().read(|s| s.orgs.get("acme").cloned()).unwrap();
    assert!(after.is_member);
    assert_eq!(after.org.members_count, 2);
}

#[tokio::test]
async fn test_session_claims_and_logout() {
    let server = RealServer::start().await;
    let alice = server.user("alice").await;

    let claims = alice.api().session().claims().unwrap();
    assert_eq!(claims.username.as_deref(), Some("alice"));
    assert!(claims.exp.unwrap() > claims.iat.unwrap());
    assert_eq!(alice.api().me().await.unwrap().username, "alice");

    alice.logout().await.unwrap();

    assert!(!alice.api().session().is_logged_in());
    assert_eq!(alice.api().me().await.unwrap_err(), ClientError::SessionExpired);
}

#[tokio::test]
async fn test_missing_personality_is_not_found() {
    let server = RealServer::start().await;
    let alice = server.user("alice").await;

    let err = alice.load_personality("nope", "nobody").await.unwrap_err();

    assert!(err.is_not_found());
    alice.store().read(|s| {
        let key = hr_client::store::detail::personality_key("nope", "nobody");
        assert_eq!(
            s.details.personalities.get(&key),
            Some(&hr_client::store::detail::Detail::NotFound)
        );
    });
}

// ========================================
// Client-side validation
// ========================================

#[tokio::test]
async fn test_out_of_range_ratings_never_sent() {
    // Nothing listens on the discard port
    let actions = client("http://127.0.0.1:9/api");
    let target = PersonalityRef {
        id: Uuid::new_v4(),
        org_slug: "acme".into(),
        slug: "boss".into(),
    };

    for rating in [0, 6] {
        let err = actions
            .create_review(
                &target,
                &ReviewCreate {
                    title: "Title".into(),
                    body: "Body".into(),
                    rating,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(ref v) if v.field == "rating"));
    }

    let err = actions
        .api()
        .list_reviews(
            "acme",
            "boss",
            &ReviewListQuery {
                rating_min: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

// ========================================
// Stub servers
// ========================================

fn org_json(slug: &str, members: i64) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "slug": slug,
        "name": "Acme",
        "description": null,
        "created_by": null,
        "members_count": members,
        "personalities_count": 0,
        "reviews_count": 0,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "is_member": false,
        "member_role": null
    })
}

#[tokio::test]
async fn test_failed_join_restores_membership_fields() {
    let router = Router::new()
        .route(
            "/api/orgs/with-membership",
            get(|| async { Json(json!([org_json("acme", 7)])) }),
        )
        .route(
            "/api/orgs/:slug/join",
            post(|| async { detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error") }),
        );
    let actions = client(&serve(router).await);
    actions
        .api()
        .session()
        .store(&tokens("access", "refresh"))
        .unwrap();

    actions.load_orgs(OrgParams::default()).await.unwrap();
    let before = actions.store().read(|s| s.orgs.get("acme").cloned()).unwrap();

    let err = actions.join_org("acme").await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    actions.store().read(|s| {
        let entry = s.orgs.get("acme").unwrap();
        assert_eq!(entry, &before);
        assert!(!entry.is_member);
        assert_eq!(entry.role, None);
        assert_eq!(entry.org.members_count, 7);
        assert!(matches!(
            s.orgs.join_state("acme"),
            Some(JoinState::RolledBack { .. })
        ));
    });
}

fn review_page(personality_id: Uuid, title: &str) -> Value {
    json!({
        "items": [{
            "id": Uuid::new_v4(),
            "title": title,
            "rating": 4,
            "snippet": "text",
            "author": null,
            "created_at": "2024-01-01T00:00:00Z"
        }],
        "next_cursor": null,
        "stats": {
            "personality_id": personality_id,
            "total_reviews": 1,
            "average_review": 4.0
        }
    })
}

#[tokio::test]
async fn test_sort_switch_discards_late_response() {
    let personality_id = Uuid::new_v4();
    let router = Router::new().route(
        "/api/orgs/:org/personalities/:slug/reviews",
        get(move |Query(query): Query<HashMap<String, String>>| async move {
            if query.get("sort").map(String::as_str) == Some("newest") {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Json(review_page(personality_id, "late newest"))
            } else {
                Json(review_page(personality_id, "oldest"))
            }
        }),
    );
    let actions = client(&serve(router).await);
    let target = PersonalityRef {
        id: personality_id,
        org_slug: "acme".into(),
        slug: "boss".into(),
    };

    let newest = ReviewParams::default();
    let oldest = ReviewParams {
        sort: ReviewSort::Oldest,
        ..Default::default()
    };
    let (first, second) = tokio::join!(actions.load_reviews(&target, newest), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        actions.load_reviews(&target, oldest).await
    });
    first.unwrap();
    second.unwrap();

    let titles: Vec<String> = actions.store().read(|s| {
        s.reviews
            .items(&personality_id)
            .into_iter()
            .map(|r| r.title.clone())
            .collect()
    });
    assert_eq!(titles, vec!["oldest".to_string()]);
    let params = actions
        .store()
        .read(|s| s.reviews.scope(&personality_id).map(|scope| scope.params));
    assert_eq!(params, Some(oldest));
}

#[derive(Clone, Default)]
struct RefreshStub {
    refreshes: Arc<AtomicUsize>,
    reject_refresh: bool,
}

fn profile_json() -> Value {
    json!({
        "id": Uuid::new_v4(),
        "username": "alice",
        "display_name": null,
        "bio": null,
        "avatar_url": null,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

async fn stub_me(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer fresh-access");
    if authorized {
        Json(profile_json()).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Invalid token")
    }
}

async fn stub_refresh(State(stub): State<RefreshStub>) -> Response {
    stub.refreshes.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    if stub.reject_refresh {
        return detail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    Json(tokens("fresh-access", "fresh-refresh")).into_response()
}

async fn refresh_stub(reject_refresh: bool) -> (Actions, RefreshStub) {
    let stub = RefreshStub {
        refreshes: Arc::new(AtomicUsize::new(0)),
        reject_refresh,
    };
    let router = Router::new()
        .route("/api/profile/me", get(stub_me).patch(stub_me))
        .route("/api/auth/refresh", post(stub_refresh))
        .with_state(stub.clone());
    let actions = client(&serve(router).await);
    actions
        .api()
        .session()
        .store(&tokens("stale-access", "old-refresh"))
        .unwrap();
    (actions, stub)
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let (actions, stub) = refresh_stub(false).await;
    let api = actions.api();

    let (a, b, c, d) = tokio::join!(api.me(), api.me(), api.me(), api.me());

    for result in [a, b, c, d] {
        assert_eq!(result.unwrap().username, "alice");
    }
    assert_eq!(stub.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(
        api.session().refresh_token().unwrap().as_deref(),
        Some("fresh-refresh")
    );
}

#[tokio::test]
async fn test_rejected_refresh_purges_tokens() {
    let (actions, stub) = refresh_stub(true).await;
    let mut events = actions.store().subscribe();

    let err = actions
        .update_profile(&hr_common::api::requests::ProfileUpdate {
            display_name: Some("Alice".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::SessionExpired);
    assert_eq!(stub.refreshes.load(Ordering::SeqCst), 1);
    assert!(actions.api().session().tokens().unwrap().is_none());

    let mut saw_session = false;
    while let Ok(event) = events.try_recv() {
        saw_session |= event == hr_client::StoreEvent::Session;
    }
    assert!(saw_session);
}
