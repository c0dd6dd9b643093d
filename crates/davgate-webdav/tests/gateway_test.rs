//! Integration tests for tenant resolution, authentication and
//! authorization.

mod helpers;

use davgate_auth::permission::Rule;
use davgate_core::config::Permission;
use helpers::{TestApp, TestUser, basic};
use http::StatusCode;

fn alice_read_only() -> TestApp {
    TestApp::multi(
        "/dav",
        vec![TestUser {
            username: "alice",
            password: "wonderland",
            rules: vec![Rule::prefix("/", Permission::ReadOnly)],
        }],
    )
}

fn alice_and_bob() -> TestApp {
    TestApp::multi(
        "/dav",
        vec![
            TestUser {
                username: "alice",
                password: "wonderland",
                rules: vec![
                    Rule::prefix("/", Permission::Allow),
                    Rule::prefix("/archive", Permission::ReadOnly),
                    Rule::prefix("/locked", Permission::Deny),
                ],
            },
            TestUser {
                username: "bob",
                password: "builder",
                rules: vec![Rule::prefix("/", Permission::Allow)],
            },
        ],
    )
}

#[tokio::test]
async fn test_read_only_tenant_end_to_end() {
    let app = alice_read_only();
    std::fs::write(app.scope("alice").join("notes.txt"), "hello").unwrap();
    let auth = basic("alice", "wonderland");

    let put = app
        .request(
            "PUT",
            "/dav/file.txt",
            &[("Authorization", auth.as_str())],
            "data",
        )
        .await;
    assert_eq!(put.status, StatusCode::FORBIDDEN);
    assert!(put.body.is_empty());
    assert!(!app.scope("alice").join("file.txt").exists());

    let listing = app
        .send("GET", "/dav/", &[("Authorization", auth.as_str())])
        .await;
    assert_eq!(listing.status, StatusCode::MULTI_STATUS);
    assert!(listing.body.contains("<D:href>/dav/</D:href>"));
    assert!(listing.body.contains("<D:href>/dav/notes.txt</D:href>"));

    let wrong = app
        .send(
            "GET",
            "/dav/",
            &[("Authorization", basic("alice", "nope").as_str())],
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        wrong.header("WWW-Authenticate"),
        Some("Basic realm=\"Restricted\"")
    );
    assert_eq!(wrong.body, "Not authorized");
}

#[tokio::test]
async fn test_authentication_failures_are_indistinguishable() {
    let app = alice_read_only();

    let unknown = app
        .send(
            "PROPFIND",
            "/dav/",
            &[("Authorization", basic("mallory", "wonderland").as_str())],
        )
        .await;
    let wrong_password = app
        .send(
            "PROPFIND",
            "/dav/",
            &[("Authorization", basic("alice", "Wonderland").as_str())],
        )
        .await;
    let missing = app.send("PROPFIND", "/dav/", &[]).await;
    let malformed = app
        .send("PROPFIND", "/dav/", &[("Authorization", "Basic !!!")])
        .await;

    for resp in [&unknown, &wrong_password, &missing, &malformed] {
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.body, "Not authorized");
        assert_eq!(
            resp.header("WWW-Authenticate"),
            Some("Basic realm=\"Restricted\"")
        );
    }
    assert_eq!(unknown.headers, wrong_password.headers);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let app = alice_and_bob();
    std::fs::write(app.scope("bob").join("plans.txt"), "bob only").unwrap();

    let resp = app
        .send(
            "GET",
            "/dav/plans.txt",
            &[("Authorization", basic("alice", "wonderland").as_str())],
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .send(
            "GET",
            "/dav/plans.txt",
            &[("Authorization", basic("bob", "builder").as_str())],
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "bob only");

    // Each tenant's password only opens its own account.
    let resp = app
        .send(
            "GET",
            "/dav/plans.txt",
            &[("Authorization", basic("bob", "wonderland").as_str())],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_longest_rule_wins() {
    let app = alice_and_bob();
    let auth = basic("alice", "wonderland");
    std::fs::create_dir(app.scope("alice").join("archive")).unwrap();
    std::fs::write(app.scope("alice").join("archive/2023.txt"), "old").unwrap();

    let read = app
        .send(
            "GET",
            "/dav/archive/2023.txt",
            &[("Authorization", auth.as_str())],
        )
        .await;
    assert_eq!(read.status, StatusCode::OK);

    let write = app
        .request(
            "PUT",
            "/dav/archive/2024.txt",
            &[("Authorization", auth.as_str())],
            "new",
        )
        .await;
    assert_eq!(write.status, StatusCode::FORBIDDEN);
    assert!(write.body.is_empty());

    let delete = app
        .send(
            "DELETE",
            "/dav/archive/2023.txt",
            &[("Authorization", auth.as_str())],
        )
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    // "/archived" is not under "/archive".
    let sibling = app
        .request(
            "PUT",
            "/dav/archived.txt",
            &[("Authorization", auth.as_str())],
            "ok",
        )
        .await;
    assert_eq!(sibling.status, StatusCode::CREATED);

    let denied = app
        .send("PROPFIND", "/dav/locked", &[("Authorization", auth.as_str())])
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert!(denied.body.is_empty());
}

#[tokio::test]
async fn test_copy_and_move_check_destination() {
    let app = alice_and_bob();
    let auth = basic("alice", "wonderland");
    std::fs::write(app.scope("alice").join("report.txt"), "q3").unwrap();

    let copy = app
        .send(
            "COPY",
            "/dav/report.txt",
            &[
                ("Authorization", auth.as_str()),
                ("Destination", "/dav/locked/report.txt"),
            ],
        )
        .await;
    assert_eq!(copy.status, StatusCode::FORBIDDEN);

    let moved = app
        .send(
            "MOVE",
            "/dav/report.txt",
            &[
                ("Authorization", auth.as_str()),
                ("Destination", "/dav/archive/report.txt"),
            ],
        )
        .await;
    assert_eq!(moved.status, StatusCode::FORBIDDEN);
    assert!(app.scope("alice").join("report.txt").exists());

    let allowed = app
        .send(
            "COPY",
            "/dav/report.txt",
            &[
                ("Authorization", auth.as_str()),
                ("Destination", "/dav/report-copy.txt"),
            ],
        )
        .await;
    assert_eq!(allowed.status, StatusCode::CREATED);
    assert_eq!(
        std::fs::read_to_string(app.scope("alice").join("report-copy.txt")).unwrap(),
        "q3"
    );
}

#[tokio::test]
async fn test_traversal_stays_in_scope() {
    let app = alice_and_bob();
    let auth = basic("alice", "wonderland");
    std::fs::write(app.root().join("secret.txt"), "top secret").unwrap();
    std::fs::write(app.scope("bob").join("secret.txt"), "bob secret").unwrap();

    for uri in [
        "/dav/../secret.txt",
        "/dav/../../secret.txt",
        "/dav/..%2f..%2fsecret.txt",
        "/dav/%2e%2e/%2e%2e/secret.txt",
        "/dav/../bob/secret.txt",
        "/dav/%2e%2e/bob/secret.txt",
    ] {
        let resp = app
            .send("GET", uri, &[("Authorization", auth.as_str())])
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{uri}");
        assert!(!resp.body.contains("secret"), "{uri}");
    }

    let put = app
        .request(
            "PUT",
            "/dav/%2e%2e/%2e%2e/escape.txt",
            &[("Authorization", auth.as_str())],
            "x",
        )
        .await;
    assert_eq!(put.status, StatusCode::CREATED);
    assert!(!app.root().join("escape.txt").exists());
    assert!(app.scope("alice").join("escape.txt").exists());
}

#[tokio::test]
async fn test_single_tenant_needs_no_credentials() {
    let app = TestApp::single("/", true, vec![Rule::prefix("/", Permission::Allow)]);
    std::fs::write(app.root().join("readme.txt"), "hi").unwrap();

    let resp = app.send("GET", "/readme.txt", &[]).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "hi");
    assert!(resp.header("WWW-Authenticate").is_none());

    // Credentials are ignored rather than checked.
    let resp = app
        .send(
            "GET",
            "/readme.txt",
            &[("Authorization", basic("nobody", "nothing").as_str())],
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_no_matching_rule_denies() {
    let app = TestApp::single("/", true, vec![Rule::prefix("/public", Permission::Allow)]);

    let resp = app.send("PROPFIND", "/", &[("Depth", "0")]).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.send("MKCOL", "/public", &[]).await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_regex_rules() {
    let app = TestApp::single(
        "/",
        true,
        vec![
            Rule::prefix("/", Permission::Allow),
            Rule::regex(r"\.key$", Permission::Deny).unwrap(),
        ],
    );

    let resp = app.request("PUT", "/id.key", &[], "k").await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.request("PUT", "/id.pub", &[], "p").await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_gateway_from_configuration() {
    let app = TestApp::from_toml(
        r#"
        [server]
        prefix = "/dav"

        [webdav]
        scope = "{root}"
        rules = [{ path = "/", permission = "read-only" }]

        [[users]]
        username = "carol"
        password = "s3cret"
        scope = "{root}/carol"
        rules = [{ path = "/", permission = "allow" }]

        [[users]]
        username = "dave"
        password = "hunter2"
        scope = "{root}/dave"
        "#,
    );

    let resp = app
        .request(
            "PUT",
            "/dav/todo.txt",
            &[("Authorization", basic("carol", "s3cret").as_str())],
            "milk",
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert!(app.root().join("carol/todo.txt").exists());

    // dave inherits the read-only default rules.
    let resp = app
        .request(
            "PUT",
            "/dav/todo.txt",
            &[("Authorization", basic("dave", "hunter2").as_str())],
            "eggs",
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .send(
            "PROPFIND",
            "/dav/",
            &[
                ("Authorization", basic("dave", "hunter2").as_str()),
                ("Depth", "0"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::MULTI_STATUS);
}
