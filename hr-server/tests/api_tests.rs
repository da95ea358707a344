//! Integration tests for hr-server API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Registration, login, refresh rotation, logout and recovery
//! - Organizations, memberships and roles
//! - Personalities
//! - Reviews: keyset pagination and stored aggregates
//! - List parameter validation

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{reviews_uri, TestApp, PASSWORD};
use serde_json::{json, Value};
use uuid::Uuid;

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hr-server");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_root_reports_api_only_without_frontend() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "api-only");
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_register_returns_recovery_codes_once() {
    let app = TestApp::new().await;

    let body = app.register("alice").await;

    assert_eq!(body["username"], "alice");
    assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());
    let codes = body["codes"].as_array().unwrap();
    assert_eq!(codes.len(), 3);
    assert!(codes.iter().all(|c| !c.as_str().unwrap().is_empty()));
}

#[tokio::test]
async fn test_register_duplicate_username_case_insensitive() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"username": "ALICE", "password": PASSWORD}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Username already exists");
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"username": "bob", "password": "short"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("password"));
}

#[tokio::test]
async fn test_login_wrong_password_is_generic() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (wrong_pw, body_a) = app
        .post(
            "/api/auth/login",
            None,
            json!({"username": "alice", "password": "not-the-password"}),
        )
        .await;
    let (no_user, body_b) = app
        .post(
            "/api/auth/login",
            None,
            json!({"username": "nobody", "password": PASSWORD}),
        )
        .await;

    assert_eq!(wrong_pw, StatusCode::UNAUTHORIZED);
    assert_eq!(no_user, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["detail"], "Invalid credentials");
    assert_eq!(body_a, body_b);
}

#[tokio::test]
async fn test_login_issues_bearer_tokens() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let tokens = app.login("alice").await;

    assert_eq!(tokens["token_type"], "bearer");
    assert_eq!(tokens["expires_in"], 15 * 60);
    assert!(tokens["access_token"].as_str().unwrap().split('.').count() == 3);
    assert!(!tokens["refresh_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let first = app.login("alice").await;
    let old_refresh = first["refresh_token"].as_str().unwrap();

    let (status, second) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({"refresh_token": old_refresh}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(second["refresh_token"], first["refresh_token"]);

    // The presented token stops working after rotation
    let (status, body) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({"refresh_token": old_refresh}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid or revoked refresh token");

    // The rotated one still does
    let (status, _) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({"refresh_token": second["refresh_token"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let tokens = app.login("alice").await;

    let (status, _) = app
        .post(
            "/api/auth/logout",
            None,
            json!({"refresh_token": tokens["refresh_token"]}),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({"refresh_token": tokens["refresh_token"]}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_recovery_code_resets_password_once() {
    let app = TestApp::new().await;
    let registered = app.register("alice").await;
    let tokens = app.login("alice").await;
    let code = registered["codes"][0].as_str().unwrap();

    let (status, body) = app
        .post(
            "/api/auth/recover",
            None,
            json!({"recovery_code": code, "new_password": "brand-new-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["detail"].as_str().unwrap().starts_with("Password updated"));

    // New password works, old one does not
    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({"username": "alice", "password": "brand-new-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({"username": "alice", "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Sessions from before the reset are revoked
    let (status, _) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({"refresh_token": tokens["refresh_token"]}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A code is single use
    let (status, body) = app
        .post(
            "/api/auth/recover",
            None,
            json!({"recovery_code": code, "new_password": "another-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid or already used recovery code");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/profile/me", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/profile/me", Some("not.a.jwt")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token");
}

#[tokio::test]
async fn test_expired_token_reports_times() {
    let app = TestApp::new().await;
    let registered = app.register("alice").await;
    let id = Uuid::parse_str(registered["id"].as_str().unwrap()).unwrap();

    let two_hours_ago = Utc::now().timestamp() - 7200;
    let expired = app
        .state
        .tokens
        .issue_access_token_at(id, "alice", two_hours_ago)
        .unwrap();

    let (status, body) = app.get("/api/profile/me", Some(&expired)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"]["message"], "Token has expired");
    assert!(body["detail"]["token_exp"].is_string());
    assert!(body["detail"]["server_time"].is_string());
}

// =============================================================================
// Profile Tests
// =============================================================================

#[tokio::test]
async fn test_profile_me_update_trims_and_ignores_empty() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice").await;

    let (status, body) = app
        .patch(
            "/api/profile/me",
            Some(&token),
            json!({"display_name": "  Alice A.  ", "bio": "hi"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Alice A.");
    assert_eq!(body["bio"], "hi");

    let (status, body) = app.patch("/api/profile/me", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Alice A.");
}

#[tokio::test]
async fn test_profile_update_rejects_username_change() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice").await;

    let (status, _) = app
        .patch("/api/profile/me", Some(&token), json!({"username": "mallory"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_profile_lookup() {
    let app = TestApp::new().await;
    app.register("Alice").await;

    let (status, body) = app.get("/api/profiles/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "Alice");
    assert!(body.get("password_hash").is_none());

    let (status, _) = app.get("/api/profiles/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Organization Tests
// =============================================================================

#[tokio::test]
async fn test_create_org_makes_creator_member() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice").await;

    let (status, body) = app
        .post("/api/orgs", Some(&token), json!({"name": "Acme Widgets!"}))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "acme-widgets");
    assert_eq!(body["members_count"], 1);
    assert_eq!(body["personalities_count"], 0);

    let (_, listed) = app.get("/api/orgs/with-membership", Some(&token)).await;
    assert_eq!(listed[0]["is_member"], true);
    assert_eq!(listed[0]["member_role"], "creator");
}

#[tokio::test]
async fn test_duplicate_org_name_gets_suffixed_slug() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice").await;

    let first = app.org(&token, "Acme").await;
    let second = app.org(&token, "Acme").await;

    assert_eq!(first, "acme");
    assert_eq!(second, "acme-2");
}

#[tokio::test]
async fn test_join_is_idempotent() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let slug = app.org(&alice, "Acme").await;

    let (status, body) = app
        .post(&format!("/api/orgs/{}/join", slug), Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Joined");

    let (_, body) = app
        .post(&format!("/api/orgs/{}/join", slug), Some(&bob), json!({}))
        .await;
    assert_eq!(body["detail"], "Already a member");

    let (_, org) = app.get(&format!("/api/orgs/{}", slug), None).await;
    assert_eq!(org["members_count"], 2);
}

#[tokio::test]
async fn test_members_list_requires_membership() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let slug = app.org(&alice, "Acme").await;
    let uri = format!("/api/orgs/{}/members", slug);

    let (status, _) = app.get(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, members) = app.get(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 1);
    assert_eq!(members[0]["role"], "creator");
    assert_eq!(members[0]["username"], "alice");
}

#[tokio::test]
async fn test_promote_member_rules() {
    let app = TestApp::new().await;
    let (alice_id, alice) = app.user("alice").await;
    let (bob_id, bob) = app.user("bob").await;
    let (carol_id, _) = app.user("carol").await;
    let slug = app.org(&alice, "Acme").await;
    app.post(&format!("/api/orgs/{}/join", slug), Some(&bob), json!({}))
        .await;
    let promote = |id: &str| format!("/api/orgs/{}/promote/{}", slug, id);

    let (status, _) = app.post(&promote(&alice_id), Some(&bob), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&promote(&bob_id), Some(&alice), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Promoted to moderator");

    let (_, body) = app.post(&promote(&bob_id), Some(&alice), json!({})).await;
    assert_eq!(body["detail"], "Already a moderator");

    let (status, body) = app.post(&promote(&alice_id), Some(&alice), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "The creator's role cannot be changed");

    let (status, body) = app.post(&promote(&carol_id), Some(&alice), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Member not found");
}

#[tokio::test]
async fn test_only_creator_deletes_org() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let slug = app.org(&alice, "Acme").await;
    let uri = format!("/api/orgs/{}", slug);

    let (status, _) = app.delete(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Organization not found");
}

#[tokio::test]
async fn test_org_list_search_and_sort() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice").await;
    app.org(&token, "Zeta Corp").await;
    app.org(&token, "Alpha 100%").await;

    let (status, body) = app.get("/api/orgs?sort=name&order=asc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Alpha 100%");

    // LIKE wildcards in the search term are literal
    let (_, body) = app.get("/api/orgs?search=100%25", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/orgs?sort=password", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid sort field");

    let (status, body) = app.get("/api/orgs?order=sideways", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid order");

    let (status, _) = app.get("/api/orgs?page=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Personality Tests
// =============================================================================

#[tokio::test]
async fn test_personality_crud_requires_moderator() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let org = app.org(&alice, "Acme").await;
    app.post(&format!("/api/orgs/{}/join", org), Some(&bob), json!({}))
        .await;
    let uri = format!("/api/orgs/{}/personalities", org);

    let (status, body) = app
        .post(&uri, Some(&bob), json!({"name": "The Boss"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Insufficient permissions");

    let slug = app.personality(&alice, &org, "The Boss").await;
    assert_eq!(slug, "the-boss");

    let (status, body) = app
        .post(&uri, Some(&alice), json!({"name": "the boss"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "A personality with this name already exists");

    let (_, org_body) = app.get(&format!("/api/orgs/{}", org), None).await;
    assert_eq!(org_body["personalities_count"], 1);

    let item = format!("{}/{}", uri, slug);
    let (status, body) = app
        .patch(&item, Some(&alice), json!({"description": "Runs the place"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Runs the place");
    assert_eq!(body["total_reviews"], 0);

    let (status, _) = app.delete(&item, Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&item, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Review Tests
// =============================================================================

#[tokio::test]
async fn test_review_requires_membership() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let org = app.org(&alice, "Acme").await;
    let p = app.personality(&alice, &org, "Boss").await;

    let (status, body) = app
        .post(
            &reviews_uri(&org, &p),
            Some(&bob),
            json!({"title": "t", "body": "b", "rating": 3}),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only members of the organization can create reviews");
}

#[tokio::test]
async fn test_review_rating_out_of_range() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let org = app.org(&alice, "Acme").await;
    let p = app.personality(&alice, &org, "Boss").await;

    for rating in [0, 6] {
        let (status, body) = app
            .post(
                &reviews_uri(&org, &p),
                Some(&alice),
                json!({"title": "t", "body": "b", "rating": rating}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("rating"));
    }
}

#[tokio::test]
async fn test_review_aggregates_follow_mutations() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let org = app.org(&alice, "Acme").await;
    app.post(&format!("/api/orgs/{}/join", org), Some(&bob), json!({}))
        .await;
    let p = app.personality(&alice, &org, "Boss").await;
    let personality_uri = format!("/api/orgs/{}/personalities/{}", org, p);

    let five = app.review(&alice, &org, &p, 5).await;
    let four = app.review(&bob, &org, &p, 4).await;
    assert_eq!(four["personality"]["total_reviews"], 2);
    assert_eq!(four["personality"]["average_review"], 4.5);

    // Bob lowers his rating; Alice may not edit Bob's review
    let bob_review = format!("/api/reviews/{}", four["id"].as_str().unwrap());
    let (status, _) = app
        .patch(&bob_review, Some(&alice), json!({"rating": 1}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, updated) = app.patch(&bob_review, Some(&bob), json!({"rating": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["rating"], 1);
    assert_eq!(updated["personality"]["average_review"], 3.0);

    let (_, stats) = app.get(&personality_uri, None).await;
    assert_eq!(stats["total_reviews"], 2);
    assert_eq!(stats["average_review"], 3.0);

    // The creator moderates Bob's review away
    let (status, _) = app.delete(&bob_review, Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, stats) = app.get(&personality_uri, None).await;
    assert_eq!(stats["total_reviews"], 1);
    assert_eq!(stats["average_review"], 5.0);

    // Deleting the last review resets the average
    let alice_review = format!("/api/reviews/{}", five["id"].as_str().unwrap());
    app.delete(&alice_review, Some(&alice)).await;
    let (_, stats) = app.get(&personality_uri, None).await;
    assert_eq!(stats["total_reviews"], 0);
    assert_eq!(stats["average_review"], 0.0);

    let (_, org_body) = app.get(&format!("/api/orgs/{}", org), None).await;
    assert_eq!(org_body["reviews_count"], 0);
}

#[tokio::test]
async fn test_member_cannot_delete_others_review() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let (_, bob) = app.user("bob").await;
    let org = app.org(&alice, "Acme").await;
    app.post(&format!("/api/orgs/{}/join", org), Some(&bob), json!({}))
        .await;
    let p = app.personality(&alice, &org, "Boss").await;
    let review = app.review(&alice, &org, &p, 2).await;

    let (status, body) = app
        .delete(&format!("/api/reviews/{}", review["id"].as_str().unwrap()), Some(&bob))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Not authorized");
}

#[tokio::test]
async fn test_review_cursor_pages_are_disjoint() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let org = app.org(&alice, "Acme").await;
    let p = app.personality(&alice, &org, "Boss").await;
    for rating in [1, 2, 3, 4, 5] {
        app.review(&alice, &org, &p, rating).await;
    }
    let base = reviews_uri(&org, &p);

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let uri = match &cursor {
            Some(c) => format!("{}?limit=2&cursor={}", base, c),
            None => format!("{}?limit=2", base),
        };
        let (status, page) = app.get(&uri, None).await;
        assert_eq!(status, StatusCode::OK);
        pages += 1;
        for item in page["items"].as_array().unwrap() {
            seen.push(item["id"].as_str().unwrap().to_string());
        }
        assert_eq!(page["stats"]["total_reviews"], 5);
        match page["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 5);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
}

#[tokio::test]
async fn test_review_cursor_walks_every_sort_with_ties() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let org = app.org(&alice, "Acme").await;
    let p = app.personality(&alice, &org, "Boss").await;
    for rating in [5, 3, 5, 1, 3, 5, 3] {
        app.review(&alice, &org, &p, rating).await;
    }
    let base = reviews_uri(&org, &p);

    let mut walks = Vec::new();
    for sort in ["newest", "oldest", "rating_desc", "rating_asc"] {
        let mut items: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let uri = match &cursor {
                Some(c) => format!("{}?sort={}&limit=2&cursor={}", base, sort, c),
                None => format!("{}?sort={}&limit=2", base, sort),
            };
            let (status, page) = app.get(&uri, None).await;
            assert_eq!(status, StatusCode::OK, "sort {}", sort);
            let batch = page["items"].as_array().unwrap();
            assert!(batch.len() <= 2);
            items.extend(batch.iter().cloned());
            match page["next_cursor"].as_str() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        let mut ids: Vec<&str> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7, "sort {} lost or repeated rows", sort);

        let ratings: Vec<i64> = items.iter().map(|i| i["rating"].as_i64().unwrap()).collect();
        let created: Vec<chrono::DateTime<Utc>> = items
            .iter()
            .map(|i| i["created_at"].as_str().unwrap().parse().unwrap())
            .collect();
        match sort {
            "rating_desc" => assert_eq!(ratings, vec![5, 5, 5, 3, 3, 3, 1]),
            "rating_asc" => assert_eq!(ratings, vec![1, 3, 3, 3, 5, 5, 5]),
            "newest" => assert!(created.windows(2).all(|w| w[0] >= w[1])),
            _ => assert!(created.windows(2).all(|w| w[0] <= w[1])),
        }
        walks.push(items);
    }

    let newest: Vec<&Value> = walks[0].iter().map(|i| &i["id"]).collect();
    let mut oldest: Vec<&Value> = walks[1].iter().map(|i| &i["id"]).collect();
    oldest.reverse();
    assert_eq!(newest, oldest);
}

#[tokio::test]
async fn test_review_sort_and_rating_filter() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice").await;
    let org = app.org(&alice, "Acme").await;
    let p = app.personality(&alice, &org, "Boss").await;
    for rating in [3, 5, 1, 4] {
        app.review(&alice, &org, &p, rating).await;
    }
    let base = reviews_uri(&org, &p);

    let (_, page) = app.get(&format!("{}?sort=rating_desc", base), None).await;
    let ratings: Vec<i64> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["rating"].as_i64().unwrap())
        .collect();
    assert_eq!(ratings, vec![5, 4, 3, 1]);

    let (_, page) = app
        .get(&format!("{}?rating_min=3&rating_max=4", base), None)
        .await;
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let (status, body) = app.get(&format!("{}?sort=loudest", base), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid sort field");

    let (status, body) = app.get(&format!("{}?cursor=!!!", base), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid cursor");

    let (status, body) = app.get(&format!("{}?cursor=bm9wZQ", base), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid cursor");
}

#[tokio::test]
async fn test_reviews_of_unknown_personality() {
    let app = TestApp::new().await;

    let (status, body) = app.get(&reviews_uri("nope", "nobody"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Personality not found");
}
