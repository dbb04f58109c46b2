use wiremock::matchers::{method, path};
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
async fn unconditional_read_replaces_data_subobject() {
    let mock_server = MockServer::start().await;
    login(&mock_server, "t1").await;

    Mock::given(method("GET"))
        .and(path("/v1/app-database/static-creds/svc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "username": "svc", "password": "p", "ttl": 86400 },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cfg = support::config(&mock_server.uri());
    cfg.static_db.enabled = true;
    let session = Session::new(cfg).unwrap();
    session.login().await.unwrap();

    let doc = session.get_static_db().await.unwrap();
    assert_eq!(doc["username"], "svc");
    assert_eq!(doc["ttl"], 86400);
}

#[tokio::test]
async fn within_interval_a_second_read_does_not_refetch() {
    let mock_server = MockServer::start().await;
    login(&mock_server, "t1").await;

    Mock::given(method("GET"))
        .and(path("/v1/app-database/static-creds/svc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "username": "svc", "password": "p" },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cfg = support::config(&mock_server.uri());
    cfg.static_db.enabled = true;
    let session = Session::new(cfg).unwrap();
    session.login().await.unwrap();

    let first = session.get_static_db().await.unwrap();
    let second = session.get_static_db().await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
