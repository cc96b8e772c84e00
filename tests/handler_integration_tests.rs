mod common;

use axum::http::{Method, StatusCode};
use common::*;
use learnhub::{
    identity::IdentityProvider,
    models::Role,
    repository::{InMemoryRepository, Repository},
};
use serde_json::json;
use std::sync::Arc;

// --- GET/PUT /api/user ---

#[tokio::test]
async fn test_get_user_requires_session() {
    let response = send(app(repo_with(&[])), request(Method::GET, "/api/user", None, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "error": "Not authenticated" }));
}

#[tokio::test]
async fn test_get_user_returns_profile_view() {
    let repo = repo_with(&[("u1", Role::Premium)]);
    let credential = session_for(repo.clone(), "u1").await;

    let response = send(app(repo), request(Method::GET, "/api/user", Some(&credential), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["uid"], "u1");
    assert_eq!(body["user"]["email"], "u1@example.com");
    assert_eq!(body["user"]["role"], "premium");
    assert_eq!(body["user"]["premiumAccess"], true);
    assert!(body["user"].get("sessionsValidAfter").is_none());
}

#[tokio::test]
async fn test_get_user_rejects_revoked_session() {
    let repo = repo_with(&[("u1", Role::Free)]);
    let credential = session_for(repo.clone(), "u1").await;
    provider(repo.clone()).revoke_sessions("u1").await.unwrap();

    let response = send(app(repo), request(Method::GET, "/api/user", Some(&credential), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_user_changes_display_name() {
    let repo = repo_with(&[("u1", Role::Free)]);
    let credential = session_for(repo.clone(), "u1").await;
    let before = repo.get_profile("u1").await.unwrap().unwrap();

    let response = send(
        app(repo.clone()),
        request(
            Method::PUT,
            "/api/user",
            Some(&credential),
            Some(json!({ "displayName": "  Ada  " })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true }));
    let after = repo.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(after.display_name.as_deref(), Some("Ada"));
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_update_user_rejects_blank_name() {
    let repo = repo_with(&[("u1", Role::Free)]);
    let credential = session_for(repo.clone(), "u1").await;

    let response = send(
        app(repo),
        request(Method::PUT, "/api/user", Some(&credential), Some(json!({ "displayName": "   " }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreadable_bodies_get_json_errors() {
    let repo = repo_with(&[("u1", Role::Free)]);
    let credential = session_for(repo.clone(), "u1").await;

    let cases = [
        (Method::PUT, "/api/user", json!({ "name": "Ada" })),
        (Method::POST, "/api/subscription", json!({ "plan": "vip" })),
    ];
    for (method, uri, body) in cases {
        let response = send(
            app(repo.clone()),
            request(method, uri, Some(&credential), Some(body)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_json(response).await, json!({ "error": "Invalid request body" }));
    }
}

// --- Subscription ---

#[tokio::test]
async fn test_list_plans_is_public() {
    let response = send(
        app(repo_with(&[])),
        request(Method::GET, "/api/subscription/plans", None, None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["free", "premium", "vip"]);
    assert_eq!(body[1]["highlight"], true);
    assert_eq!(body[1]["monthlyPriceCents"], 999);
}

#[tokio::test]
async fn test_change_plan_unlocks_premium_on_next_navigation() {
    let repo = repo_with(&[("u1", Role::Free)]);
    let credential = session_for(repo.clone(), "u1").await;

    let response = send(app(repo.clone()), request(Method::GET, "/premium/x", Some(&credential), None)).await;
    assert_eq!(location(&response), Some("/subscription"));

    let response = send(
        app(repo.clone()),
        request(
            Method::POST,
            "/api/subscription",
            Some(&credential),
            Some(json!({ "planId": "premium" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true, "role": "premium" }));

    // Same cookie, new role.
    let response = send(app(repo), request(Method::GET, "/premium/x", Some(&credential), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_change_plan_conflict_and_unknown() {
    let repo = repo_with(&[("u1", Role::Vip)]);
    let credential = session_for(repo.clone(), "u1").await;

    let response = send(
        app(repo.clone()),
        request(Method::POST, "/api/subscription", Some(&credential), Some(json!({ "planId": "vip" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    for plan in ["admin", "gold"] {
        let response = send(
            app(repo.clone()),
            request(Method::POST, "/api/subscription", Some(&credential), Some(json!({ "planId": plan }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "plan {plan}");
    }

    assert_eq!(repo.get_profile("u1").await.unwrap().unwrap().role, Role::Vip);
}

#[tokio::test]
async fn test_change_plan_requires_session() {
    let response = send(
        app(repo_with(&[])),
        request(Method::POST, "/api/subscription", None, Some(json!({ "planId": "vip" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Admin ---

#[tokio::test]
async fn test_admin_stats_counts_roles() {
    let repo = repo_with(&[
        ("a", Role::Admin),
        ("f1", Role::Free),
        ("f2", Role::Free),
        ("p", Role::Premium),
        ("v", Role::Vip),
    ]);
    let credential = session_for(repo.clone(), "a").await;

    let response = send(app(repo), request(Method::GET, "/admin/stats", Some(&credential), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "total_users": 5, "free": 2, "premium": 1, "vip": 1, "admin": 1 })
    );
}

#[tokio::test]
async fn test_admin_revoke_logs_target_out() {
    let repo = repo_with(&[("a", Role::Admin), ("u1", Role::Vip)]);
    let admin = session_for(repo.clone(), "a").await;
    let victim = session_for(repo.clone(), "u1").await;

    let response = send(
        app(repo.clone()),
        request(Method::POST, "/admin/users/u1/revoke", Some(&admin), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(app(repo.clone()), request(Method::GET, "/dashboard", Some(&victim), None)).await;
    assert_eq!(location(&response), Some("/login"));

    // The admin's own session is untouched.
    let response = send(app(repo), request(Method::GET, "/admin/stats", Some(&admin), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_revoke_unknown_user() {
    let repo = repo_with(&[("a", Role::Admin)]);
    let admin = session_for(repo.clone(), "a").await;

    let response = send(app(repo), request(Method::POST, "/admin/users/ghost/revoke", Some(&admin), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upstream_failure_on_api_is_generic() {
    let repo = repo_with(&[("u1", Role::Free)]);
    let credential = session_for(repo, "u1").await;

    let response = send(
        app(Arc::new(InMemoryRepository::new_failing())),
        request(Method::GET, "/api/user", Some(&credential), None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({ "error": "Internal server error" }));
}
