//! Integration tests for LOCK/UNLOCK and lock enforcement.

mod helpers;

use davgate_auth::permission::Rule;
use davgate_core::config::Permission;
use helpers::{EXCLUSIVE_LOCKINFO, TestApp, TestUser, basic};
use http::StatusCode;

fn open_app() -> TestApp {
    TestApp::single("/", true, vec![Rule::prefix("/", Permission::Allow)])
}

async fn lock(app: &TestApp, path: &str, headers: &[(&str, &str)]) -> (StatusCode, String) {
    let resp = app.request("LOCK", path, headers, EXCLUSIVE_LOCKINFO).await;
    let token = resp.header("Lock-Token").unwrap_or_default().to_string();
    (resp.status, token)
}

#[tokio::test]
async fn test_lock_blocks_writers_without_token() {
    let app = open_app();
    std::fs::write(app.root().join("doc.txt"), "v1").unwrap();

    let (status, token) = lock(&app, "/doc.txt", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(token.starts_with("<opaquelocktoken:"));
    let if_header = format!("({token})");

    let resp = app.request("PUT", "/doc.txt", &[], "v2").await;
    assert_eq!(resp.status, StatusCode::LOCKED);

    let resp = app.send("DELETE", "/doc.txt", &[]).await;
    assert_eq!(resp.status, StatusCode::LOCKED);
    assert!(app.root().join("doc.txt").exists());

    let resp = app
        .request("PUT", "/doc.txt", &[("If", if_header.as_str())], "v2")
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(std::fs::read_to_string(app.root().join("doc.txt")).unwrap(), "v2");

    // Reads are never blocked.
    let resp = app.send("GET", "/doc.txt", &[]).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_conflicting_lock_is_refused() {
    let app = open_app();
    std::fs::write(app.root().join("doc.txt"), "v1").unwrap();

    let (status, _) = lock(&app, "/doc.txt", &[]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, token) = lock(&app, "/doc.txt", &[]).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert!(token.is_empty());
}

#[tokio::test]
async fn test_lock_discovery_and_refresh() {
    let app = open_app();
    std::fs::write(app.root().join("doc.txt"), "v1").unwrap();

    let resp = app
        .request(
            "LOCK",
            "/doc.txt",
            &[("Timeout", "Second-120")],
            EXCLUSIVE_LOCKINFO,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("<D:lockdiscovery>"));
    assert!(resp.body.contains("Second-120"));
    let token = resp.header("Lock-Token").unwrap().to_string();

    let resp = app
        .send(
            "PROPFIND",
            "/doc.txt",
            &[("Depth", "0")],
        )
        .await;
    assert!(resp.body.contains(token.trim_matches(|c| c == '<' || c == '>')));

    let if_header = format!("({token})");
    let resp = app
        .send(
            "LOCK",
            "/doc.txt",
            &[("If", if_header.as_str()), ("Timeout", "Second-600")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Second-600"));

    let resp = app
        .send(
            "LOCK",
            "/doc.txt",
            &[("If", "(<opaquelocktoken:unknown>)")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_unlock() {
    let app = open_app();
    std::fs::write(app.root().join("doc.txt"), "v1").unwrap();
    let (_, token) = lock(&app, "/doc.txt", &[]).await;

    let resp = app.send("UNLOCK", "/doc.txt", &[]).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .send(
            "UNLOCK",
            "/doc.txt",
            &[("Lock-Token", "<opaquelocktoken:not-mine>")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .send("UNLOCK", "/doc.txt", &[("Lock-Token", token.as_str())])
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.request("PUT", "/doc.txt", &[], "free").await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_lock_null_creates_empty_file() {
    let app = open_app();

    let (status, token) = lock(&app, "/reserved.txt", &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!token.is_empty());
    assert_eq!(
        std::fs::metadata(app.root().join("reserved.txt")).unwrap().len(),
        0
    );

    let (status, _) = lock(&app, "/missing/reserved.txt", &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_depth_infinity_lock_covers_members() {
    let app = open_app();
    std::fs::create_dir(app.root().join("project")).unwrap();
    std::fs::write(app.root().join("project/a.txt"), "a").unwrap();

    let (status, token) = lock(&app, "/project", &[("Depth", "infinity")]).await;
    assert_eq!(status, StatusCode::OK);

    let resp = app.request("PUT", "/project/b.txt", &[], "b").await;
    assert_eq!(resp.status, StatusCode::LOCKED);

    let resp = app.send("MKCOL", "/project/sub", &[]).await;
    assert_eq!(resp.status, StatusCode::LOCKED);

    let if_header = format!("({token})");
    let resp = app
        .request("PUT", "/project/b.txt", &[("If", if_header.as_str())], "b")
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .send("MOVE", "/project", &[("Destination", "/moved")])
        .await;
    assert_eq!(resp.status, StatusCode::LOCKED);
}

#[tokio::test]
async fn test_lock_rejects_depth_one() {
    let app = open_app();
    std::fs::create_dir(app.root().join("dir")).unwrap();

    let (status, _) = lock(&app, "/dir", &[("Depth", "1")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_read_only_tenant_cannot_lock() {
    let app = TestApp::multi(
        "/",
        vec![TestUser {
            username: "viewer",
            password: "pw",
            rules: vec![Rule::prefix("/", Permission::ReadOnly)],
        }],
    );
    std::fs::write(app.scope("viewer").join("doc.txt"), "v").unwrap();

    let auth = basic("viewer", "pw");
    let (status, _) = lock(&app, "/doc.txt", &[("Authorization", auth.as_str())]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_huge_timeout_is_clamped() {
    let app = open_app();
    std::fs::write(app.root().join("doc.txt"), "v1").unwrap();

    let resp = app
        .request(
            "LOCK",
            "/doc.txt",
            &[("Timeout", "Second-18446744073709551615")],
            EXCLUSIVE_LOCKINFO,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Second-4294967295"));

    // The lock is still enforced afterwards.
    let resp = app.request("PUT", "/doc.txt", &[], "v2").await;
    assert_eq!(resp.status, StatusCode::LOCKED);
}

#[tokio::test]
async fn test_refresh_through_other_resource_keeps_timeout() {
    let app = open_app();
    std::fs::write(app.root().join("a.txt"), "a").unwrap();
    std::fs::write(app.root().join("b.txt"), "b").unwrap();

    let (status, token) = lock(&app, "/a.txt", &[("Timeout", "Second-120")]).await;
    assert_eq!(status, StatusCode::OK);

    let if_header = format!("({token})");
    let resp = app
        .send(
            "LOCK",
            "/b.txt",
            &[("If", if_header.as_str()), ("Timeout", "Infinite")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::PRECONDITION_FAILED);

    let resp = app.send("PROPFIND", "/a.txt", &[("Depth", "0")]).await;
    assert!(resp.body.contains("Second-1"));
    assert!(!resp.body.contains("Infinite"));
}
