use std::time::Duration;

use rollcall_core::CandidateId;
use rollcall_core::impls::{TelegramSettings, TelegramTransport};
use rollcall_core::ports::{ProbeAck, ProbeTransport, TransportError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123456:TEST";

fn transport(server: &MockServer) -> TelegramTransport {
    TelegramTransport::new(TelegramSettings::new(TOKEN).with_api_base(server.uri())).unwrap()
}

fn endpoint() -> String {
    format!("/bot{TOKEN}/sendChatAction")
}

#[tokio::test]
async fn successful_chat_action_is_alive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint()))
        .and(query_param("chat_id", "4242"))
        .and(query_param("action", "typing"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"ok":true,"result":true}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let result = transport(&server).probe(CandidateId::new(4242)).await;
    assert_eq!(result, Ok(ProbeAck));
}

#[tokio::test]
async fn blocked_user_is_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(403).set_body_raw(
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let result = transport(&server).probe(CandidateId::new(1)).await;
    assert_eq!(
        result,
        Err(TransportError::Forbidden(
            "Forbidden: bot was blocked by the user".into()
        ))
    );
}

#[tokio::test]
async fn flood_control_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(429).set_body_raw(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 3","parameters":{"retry_after":3}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let result = transport(&server).probe(CandidateId::new(1)).await;
    assert_eq!(
        result,
        Err(TransportError::RateLimited {
            retry_after: Duration::from_secs(3)
        })
    );
}

#[tokio::test]
async fn revoked_token_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let result = transport(&server).probe(CandidateId::new(1)).await;
    assert!(matches!(result, Err(TransportError::Unavailable(_))));
}

#[tokio::test]
async fn unreachable_api_is_unavailable() {
    // ポート 1 には何も listen していない
    let transport = TelegramTransport::new(
        TelegramSettings::new(TOKEN).with_api_base("http://127.0.0.1:1"),
    )
    .unwrap();

    let result = transport.probe(CandidateId::new(1)).await;
    assert!(matches!(result, Err(TransportError::Unavailable(_))), "{result:?}");
}
