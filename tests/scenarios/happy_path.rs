use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_agent::Session;

use crate::support;

#[tokio::test]
async fn login_then_first_kv_read() {
    let mock_server = MockServer::start().await;

    let expected_login_body = serde_json::json!({
        "role_id": "test-role",
        "secret_id": "test-secret",
    });

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(body_json(&expected_login_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": { "client_token": "t1", "lease_duration": 60 },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/app-kv/data/db/creds"))
        .and(header("X-Vault-Token", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "data": { "u": "a" }, "metadata": { "version": 3 } },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cfg = support::config(&mock_server.uri());
    cfg.kv.enabled = true;
    cfg.kv.path = "db/creds".to_string();
    let session = Session::new(cfg).unwrap();

    session.login().await.unwrap();

    let token = session.token_snapshot();
    assert_eq!(token.token, "t1");
    assert_eq!(token.expiry - token.issued, 60);

    let doc = session.get_kv().await.unwrap();
    assert_eq!(doc["u"], "a");
    assert_eq!(session.kv_snapshot().version, 3);
}
