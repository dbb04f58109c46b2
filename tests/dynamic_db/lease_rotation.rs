use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_agent::Session;

use crate::support;

async fn login(mock_server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": { "client_token": token, "lease_duration": 3600 },
        })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn initial_read_mints_credentials_and_looks_up_expiry() {
    let mock_server = MockServer::start().await;
    login(&mock_server, "t1").await;

    Mock::given(method("GET"))
        .and(path("/v1/app-database/creds/readonly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "lease_id": "lease-A",
            "data": { "username": "u1", "password": "p1" },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/leases/lookup"))
        .and(body_json(serde_json::json!({ "lease_id": "lease-A" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "ttl": 3600 },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cfg = support::config(&mock_server.uri());
    cfg.dynamic_db.enabled = true;
    let session = Session::new(cfg).unwrap();
    session.login().await.unwrap();

    let doc = session.get_dynamic_db().await.unwrap();
    assert_eq!(doc["username"], "u1");
    assert_eq!(session.dynamic_db_snapshot().lease_id, "lease-A");
}

#[tokio::test]
async fn lease_with_headroom_is_a_cache_noop() {
    let mock_server = MockServer::start().await;
    login(&mock_server, "t1").await;

    // First read mints lease-A.
    Mock::given(method("GET"))
        .and(path("/v1/app-database/creds/readonly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "lease_id": "lease-A",
            "data": { "username": "u1", "password": "p1" },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Every lease_lookup reports plenty of headroom: 42s > the 10s floor.
    Mock::given(method("POST"))
        .and(path("/v1/sys/leases/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "ttl": 42 },
        })))
        .mount(&mock_server)
        .await;

    let mut cfg = support::config(&mock_server.uri());
    cfg.dynamic_db.enabled = true;
    let session = Session::new(cfg).unwrap();
    session.login().await.unwrap();

    session.refresh_dynamic_db().await.unwrap();
    assert_eq!(session.dynamic_db_snapshot().lease_id, "lease-A");

    // A second refresh should find headroom and not mint new credentials
    // (the GET /creds mock is `.expect(1)` above; a second call would fail
    // the expectation at mock_server teardown).
    session.refresh_dynamic_db().await.unwrap();
    assert_eq!(session.dynamic_db_snapshot().lease_id, "lease-A");
}

#[tokio::test]
async fn near_expiry_lease_triggers_rotation() {
    let mock_server = MockServer::start().await;
    login(&mock_server, "t1").await;

    Mock::given(method("GET"))
        .and(path("/v1/app-database/creds/readonly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "lease_id": "lease-A",
            "data": { "username": "u1", "password": "p1" },
        })))
        .up_to_n_times(1)
        .priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/app-database/creds/readonly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "lease_id": "lease-B",
            "data": { "username": "u2", "password": "p2" },
        })))
        .priority(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/leases/lookup"))
        .and(body_json(serde_json::json!({ "lease_id": "lease-A" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "ttl": 5 },
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/leases/lookup"))
        .and(body_json(serde_json::json!({ "lease_id": "lease-B" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "ttl": 3600 },
        })))
        .mount(&mock_server)
        .await;

    let mut cfg = support::config(&mock_server.uri());
    cfg.dynamic_db.enabled = true;
    let session = Session::new(cfg).unwrap();
    session.login().await.unwrap();

    session.refresh_dynamic_db().await.unwrap();
    assert_eq!(session.dynamic_db_snapshot().lease_id, "lease-A");

    session.refresh_dynamic_db().await.unwrap();
    let entry = session.dynamic_db_snapshot();
    assert_eq!(entry.lease_id, "lease-B");
    assert!(entry.lease_expiry > 0);
}
