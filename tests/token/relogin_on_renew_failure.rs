use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_agent::Session;

use crate::support;

#[tokio::test]
async fn renew_failure_falls_back_to_relogin() {
    let mock_server = MockServer::start().await;

    // Higher priority (lower number), consumed by the initial login only.
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": { "client_token": "t1", "lease_duration": 0 },
        })))
        .up_to_n_times(1)
        .expect(1)
        .priority(1)
        .mount(&mock_server)
        .await;

    // Falls through to this once the first mock is exhausted: the re-login.
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": { "client_token": "t2", "lease_duration": 120 },
        })))
        .expect(1)
        .priority(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = Session::new(support::config(&mock_server.uri())).unwrap();
    session.login().await.unwrap();
    assert_eq!(session.token_snapshot().token, "t1");

    session.tick_token().await.unwrap();

    let after = session.token_snapshot();
    assert_eq!(after.token, "t2");
    assert_eq!(after.total_ttl(), 120);
}

#[tokio::test]
async fn renew_and_relogin_both_failing_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": { "client_token": "t1", "lease_duration": 0 },
        })))
        .up_to_n_times(1)
        .priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(500))
        .priority(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let session = Session::new(support::config(&mock_server.uri())).unwrap();
    session.login().await.unwrap();

    let err = session.tick_token().await.unwrap_err();
    assert!(err.is_fatal());
}
