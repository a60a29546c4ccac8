//! Telegram Bot API transport.
//!
//! A probe is `sendChatAction(chat_id, action=typing)`: the user sees at most
//! a brief "typing…" indicator, and the Bot API answers with the same errors
//! it would give for a real message.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::domain::CandidateId;
use crate::ports::{ProbeAck, ProbeResult, ProbeTransport, TransportError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    /// Without trailing slash; overridden in tests and for local Bot API servers.
    pub api_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl TelegramSettings {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

// トークンをログに出さない
impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

pub struct TelegramTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramTransport {
    pub fn new(settings: TelegramSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        let endpoint = format!(
            "{}/bot{}/sendChatAction",
            settings.api_base.trim_end_matches('/'),
            settings.bot_token
        );
        Ok(Self { client, endpoint })
    }
}

impl fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl ProbeTransport for TelegramTransport {
    async fn probe(&self, id: CandidateId) -> ProbeResult {
        let chat_id = id.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("chat_id", chat_id.as_str()), ("action", "typing")])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed = serde_json::from_slice::<ApiResponse>(&body).ok();
        map_response(status, parsed)
    }
}

/// Bot API envelope: `{"ok": false, "error_code": 429, "description": "...",
/// "parameters": {"retry_after": 5}}`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

fn map_response(status: StatusCode, body: Option<ApiResponse>) -> ProbeResult {
    if status.is_success() && body.as_ref().is_some_and(|body| body.ok) {
        return Ok(ProbeAck);
    }

    let description = body
        .as_ref()
        .and_then(|body| body.description.clone())
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = body
                .and_then(|body| body.parameters)
                .and_then(|parameters| parameters.retry_after)
                .map_or(Duration::ZERO, Duration::from_secs);
            Err(TransportError::RateLimited { retry_after })
        }
        StatusCode::FORBIDDEN => Err(TransportError::Forbidden(description)),
        StatusCode::BAD_REQUEST if description.to_ascii_lowercase().contains("not found") => {
            Err(TransportError::NotFound(description))
        }
        // 401 / 404 はトークン不正（どのユーザーでも同じ結果になる）
        StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
            Err(TransportError::Unavailable(description))
        }
        _ => Err(TransportError::Other(description)),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() {
        return TransportError::Unavailable(err.to_string());
    }
    TransportError::Other(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn api(json: &str) -> Option<ApiResponse> {
        serde_json::from_str(json).ok()
    }

    #[rstest]
    #[case(200, r#"{"ok":true,"result":true}"#, Ok(ProbeAck))]
    #[case(
        403,
        r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
        Err(TransportError::Forbidden("Forbidden: bot was blocked by the user".into()))
    )]
    #[case(
        400,
        r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        Err(TransportError::NotFound("Bad Request: chat not found".into()))
    )]
    #[case(
        400,
        r#"{"ok":false,"error_code":400,"description":"Bad Request: message is too long"}"#,
        Err(TransportError::Other("Bad Request: message is too long".into()))
    )]
    #[case(
        429,
        r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#,
        Err(TransportError::RateLimited { retry_after: Duration::from_secs(7) })
    )]
    #[case(
        401,
        r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        Err(TransportError::Unavailable("Unauthorized".into()))
    )]
    #[case(
        500,
        "<html>bad gateway</html>",
        Err(TransportError::Other("500 Internal Server Error".into()))
    )]
    fn maps_bot_api_answers(#[case] status: u16, #[case] body: &str, #[case] expected: ProbeResult) {
        let status = StatusCode::from_u16(status).unwrap();
        assert_eq!(map_response(status, api(body)), expected);
    }

    #[test]
    fn rate_limit_without_hint_has_zero_retry_after() {
        let result = map_response(
            StatusCode::TOO_MANY_REQUESTS,
            api(r#"{"ok":false,"error_code":429,"description":"Too Many Requests"}"#),
        );
        assert_eq!(
            result,
            Err(TransportError::RateLimited {
                retry_after: Duration::ZERO
            })
        );
    }

    #[test]
    fn debug_output_hides_the_token() {
        let settings = TelegramSettings::new("123456:SECRET").with_api_base("http://localhost/");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("SECRET"));
        assert_eq!(settings.api_base, "http://localhost");
    }
}
