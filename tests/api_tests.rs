mod common;

use common::*;
use learnhub::{create_router, models::Role};
use reqwest::{StatusCode, header, redirect::Policy};
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
}

async fn spawn_app(profiles: &[(&str, Role)]) -> TestApp {
    let router = create_router(app_state(repo_with(profiles)));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(&[]).await;
    let response = client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_sign_in_navigate_sign_out() {
    let app = spawn_app(&[("student", Role::Premium)]).await;
    let client = client();

    // Anonymous navigation bounces to the login page.
    let response = client
        .get(format!("{}/premium/annales", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/login");

    // Sign in.
    let response = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "idToken": id_token("student", 3600) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    let session = set_cookie.split(';').next().unwrap().to_string();

    // Premium content is open, the admin area is not.
    let response = client
        .get(format!("{}/premium/annales", app.address))
        .header(header::COOKIE, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{}/admin/stats", app.address))
        .header(header::COOKIE, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/");

    // Sign out clears the cookie.
    let response = client
        .post(format!("{}/api/auth/logout", app.address))
        .header(header::COOKIE, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.starts_with("session=;"));
}
