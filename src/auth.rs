//! Sign-in through an external OpenID Connect provider
//!
//! Authorization-code flow with a loopback redirect: the frontend opens the
//! provider's login page, a one-shot local listener receives the callback,
//! and the code is exchanged for tokens and the user's identity claims.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration as StdDuration;
use url::Url;
use uuid::Uuid;

use crate::models::NewUser;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const REDIRECT_PORT: u16 = 8767;
const DEFAULT_SCOPES: &str = "openid email profile";
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;
pub const CALLBACK_TIMEOUT_SECONDS: u64 = 180;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Callback server error: {0}")]
  Server(String),

  #[error("Sign-in callback did not match the pending request")]
  StateMismatch,
}

impl Serialize for AuthError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Provider Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuthConfig {
  pub client_id: String,
  pub client_secret: String,
  pub authorize_url: String,
  pub token_url: String,
  pub userinfo_url: String,
  pub scopes: String,
  pub redirect_uri: String,
}

fn required_env(name: &str) -> Result<String, AuthError> {
  env::var(name).map_err(|_| AuthError::MissingConfig(name.into()))
}

impl AuthConfig {
  pub fn from_env() -> Result<Self, AuthError> {
    Ok(Self {
      client_id: required_env("AUTH_CLIENT_ID")?,
      client_secret: required_env("AUTH_CLIENT_SECRET")?,
      authorize_url: required_env("AUTH_AUTHORIZE_URL")?,
      token_url: required_env("AUTH_TOKEN_URL")?,
      userinfo_url: required_env("AUTH_USERINFO_URL")?,
      scopes: env::var("AUTH_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_string()),
      redirect_uri: format!("http://localhost:{}/callback", REDIRECT_PORT),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Tokens
/// ---------------------------------------------------------------------------

/// Response from the provider's token endpoint
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub refresh_token: Option<String>,
  pub expires_in: Option<i64>,
  pub token_type: String,
  pub id_token: Option<String>,
}

/// Stored token state for the local session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
  pub access_token: String,
  pub refresh_token: Option<String>,
  pub expires_at: Option<DateTime<Utc>>,
}

impl SessionTokens {
  pub fn from_response(resp: TokenResponse) -> Self {
    Self {
      access_token: resp.access_token,
      refresh_token: resp.refresh_token,
      expires_at: resp.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
    }
  }

  /// Past the provider's expiry; tokens without one never expire
  pub fn is_expired(&self) -> bool {
    self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
  }

  /// Tokens without an expiry never need a refresh
  pub fn needs_refresh(&self) -> bool {
    let buffer = Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
    self
      .expires_at
      .is_some_and(|expires_at| Utc::now() + buffer >= expires_at)
  }
}

/// ---------------------------------------------------------------------------
/// Identity Claims
/// ---------------------------------------------------------------------------

/// Standard OIDC userinfo claims
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
  pub sub: String,
  pub email: Option<String>,
  pub given_name: Option<String>,
  pub family_name: Option<String>,
  pub picture: Option<String>,
}

impl From<UserInfo> for NewUser {
  fn from(info: UserInfo) -> Self {
    Self {
      id: info.sub,
      email: info.email,
      first_name: info.given_name,
      last_name: info.family_name,
      profile_image_url: info.picture,
    }
  }
}

/// ---------------------------------------------------------------------------
/// OAuth URL Generation
/// ---------------------------------------------------------------------------

/// Unguessable value binding a callback to the sign-in that started it
pub fn new_login_state() -> String {
  Uuid::new_v4().simple().to_string()
}

pub fn build_auth_url(config: &AuthConfig, state: &str) -> Result<String, AuthError> {
  let mut url = Url::parse(&config.authorize_url).map_err(|e| AuthError::OAuth(e.to_string()))?;

  url
    .query_pairs_mut()
    .append_pair("client_id", &config.client_id)
    .append_pair("redirect_uri", &config.redirect_uri)
    .append_pair("response_type", "code")
    .append_pair("scope", &config.scopes)
    .append_pair("state", state);

  Ok(url.to_string())
}

/// ---------------------------------------------------------------------------
/// Token Exchange (Authorization Code -> Tokens)
/// ---------------------------------------------------------------------------

pub async fn exchange_code_for_tokens(
  config: &AuthConfig,
  code: &str,
) -> Result<SessionTokens, AuthError> {
  let client = Client::new();

  let response = client
    .post(&config.token_url)
    .form(&[
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.as_str()),
      ("code", code),
      ("grant_type", "authorization_code"),
      ("redirect_uri", config.redirect_uri.as_str()),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(AuthError::OAuth(format!("Token exchange failed: {}", error_text)));
  }

  let token_response: TokenResponse = response.json().await?;
  Ok(SessionTokens::from_response(token_response))
}

/// ---------------------------------------------------------------------------
/// Token Refresh
/// ---------------------------------------------------------------------------

pub async fn refresh_tokens(
  config: &AuthConfig,
  refresh_token: &str,
) -> Result<SessionTokens, AuthError> {
  let client = Client::new();

  let response = client
    .post(&config.token_url)
    .form(&[
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.as_str()),
      ("refresh_token", refresh_token),
      ("grant_type", "refresh_token"),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(AuthError::OAuth(format!("Token refresh failed: {}", error_text)));
  }

  let mut tokens = SessionTokens::from_response(response.json().await?);
  // Providers may omit the refresh token when it is not rotated
  if tokens.refresh_token.is_none() {
    tokens.refresh_token = Some(refresh_token.to_string());
  }
  Ok(tokens)
}

/// ---------------------------------------------------------------------------
/// User Info
/// ---------------------------------------------------------------------------

pub async fn fetch_user_info(config: &AuthConfig, access_token: &str) -> Result<UserInfo, AuthError> {
  let client = Client::new();

  let response = client
    .get(&config.userinfo_url)
    .bearer_auth(access_token)
    .send()
    .await?;

  if !response.status().is_success() {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    return Err(AuthError::OAuth(format!(
      "Userinfo request failed ({}): {}",
      status, error_text
    )));
  }

  Ok(response.json().await?)
}

/// ---------------------------------------------------------------------------
/// OAuth Callback Server
/// ---------------------------------------------------------------------------

pub struct CallbackResult {
  pub code: String,
}

/// Accept the provider's redirect on localhost. The callback must echo
/// `expected_state`; any other code is refused and ends the attempt.
pub fn wait_for_callback(
  expected_state: &str,
  timeout_seconds: u64,
) -> Result<CallbackResult, AuthError> {
  let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
    .map_err(|e| AuthError::Server(format!("Failed to bind port {}: {}", REDIRECT_PORT, e)))?;

  listener
    .set_nonblocking(true)
    .map_err(|e| AuthError::Server(e.to_string()))?;

  tracing::info!(port = REDIRECT_PORT, "Listening for sign-in callback");

  let start = std::time::Instant::now();
  let timeout = StdDuration::from_secs(timeout_seconds);

  loop {
    if start.elapsed() > timeout {
      return Err(AuthError::Server("Callback timeout - no response received".into()));
    }

    match listener.accept() {
      Ok((mut stream, _)) => {
        let mut buffer = [0; 4096];
        let bytes_read = stream.read(&mut buffer).unwrap_or(0);
        let request = String::from_utf8_lossy(&buffer[..bytes_read]);

        match parse_callback(&request) {
          Some(CallbackParams::Code { code, state }) => {
            if let Err(e) = check_state(state.as_deref(), expected_state) {
              tracing::warn!("Rejected sign-in callback with mismatched state");
              stream.write_all(build_response("Sign-in failed", &e.to_string()).as_bytes()).ok();
              stream.flush().ok();
              return Err(e);
            }
            stream.write_all(build_response("Signed in", "You can close this window.").as_bytes()).ok();
            stream.flush().ok();
            return Ok(CallbackResult { code });
          }
          Some(CallbackParams::Error(error)) => {
            stream.write_all(build_response("Sign-in failed", &error).as_bytes()).ok();
            stream.flush().ok();
            return Err(AuthError::OAuth(error));
          }
          // Favicon requests and other noise
          None => continue,
        }
      }
      Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
        std::thread::sleep(StdDuration::from_millis(100));
        continue;
      }
      Err(e) => {
        return Err(AuthError::Server(e.to_string()));
      }
    }
  }
}

#[derive(Debug, PartialEq)]
enum CallbackParams {
  Code { code: String, state: Option<String> },
  Error(String),
}

/// Parse "GET /callback?code=XXX&state=YYY HTTP/1.1" (query values are percent-decoded)
fn parse_callback(request: &str) -> Option<CallbackParams> {
  let first_line = request.lines().next()?;
  let path = first_line.split_whitespace().nth(1)?;
  if !path.starts_with("/callback?") {
    return None;
  }

  let url = Url::parse(&format!("http://localhost{}", path)).ok()?;
  let mut code = None;
  let mut state = None;
  let mut error = None;
  for (key, value) in url.query_pairs() {
    match key.as_ref() {
      "code" => code = Some(value.into_owned()),
      "state" => state = Some(value.into_owned()),
      "error_description" => error = Some(value.into_owned()),
      "error" if error.is_none() => error = Some(value.into_owned()),
      _ => {}
    }
  }

  match code {
    Some(code) => Some(CallbackParams::Code { code, state }),
    None => error.map(CallbackParams::Error),
  }
}

fn check_state(returned: Option<&str>, expected: &str) -> Result<(), AuthError> {
  match returned {
    Some(state) if !expected.is_empty() && state == expected => Ok(()),
    _ => Err(AuthError::StateMismatch),
  }
}

fn build_response(title: &str, message: &str) -> String {
  let body = format!(
    "<html><body style=\"font-family: sans-serif; text-align: center; padding-top: 4rem;\">\
     <h1>{}</h1><p>{}</p></body></html>",
    title, message
  );
  format!(
    "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
    body.len(),
    body
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  fn test_config(base_url: &str) -> AuthConfig {
    AuthConfig {
      client_id: "client-123".to_string(),
      client_secret: "secret".to_string(),
      authorize_url: format!("{}/authorize", base_url),
      token_url: format!("{}/token", base_url),
      userinfo_url: format!("{}/userinfo", base_url),
      scopes: DEFAULT_SCOPES.to_string(),
      redirect_uri: "http://localhost:8767/callback".to_string(),
    }
  }

  #[test]
  fn test_build_auth_url_has_required_params() {
    let url = build_auth_url(&test_config("https://id.example.com"), "state-1").unwrap();
    let parsed = Url::parse(&url).unwrap();
    let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

    assert_eq!(parsed.path(), "/authorize");
    assert_eq!(params.get("client_id").map(String::as_str), Some("client-123"));
    assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
    assert_eq!(params.get("scope").map(String::as_str), Some("openid email profile"));
    assert_eq!(
      params.get("redirect_uri").map(String::as_str),
      Some("http://localhost:8767/callback")
    );
    assert_eq!(params.get("state").map(String::as_str), Some("state-1"));
  }

  #[test]
  fn test_login_state_is_fresh_each_time() {
    let first = new_login_state();
    let second = new_login_state();
    assert_eq!(first.len(), 32);
    assert_ne!(first, second);
  }

  #[test]
  fn test_build_auth_url_rejects_bad_base() {
    let mut config = test_config("https://id.example.com");
    config.authorize_url = "not a url".to_string();
    assert!(matches!(build_auth_url(&config, "s"), Err(AuthError::OAuth(_))));
  }

  #[test]
  fn test_parse_callback_code() {
    let request = "GET /callback?code=abc%2F123&state=x HTTP/1.1\r\nHost: localhost\r\n\r\n";
    assert_eq!(
      parse_callback(request),
      Some(CallbackParams::Code {
        code: "abc/123".to_string(),
        state: Some("x".to_string()),
      })
    );
  }

  #[test]
  fn test_callback_with_foreign_state_is_rejected() {
    let request = "GET /callback?code=other-account&state=forged HTTP/1.1\r\n\r\n";
    let Some(CallbackParams::Code { state, .. }) = parse_callback(request) else {
      panic!("expected a code callback");
    };
    assert!(matches!(check_state(state.as_deref(), "expected-state"), Err(AuthError::StateMismatch)));

    let without_state = "GET /callback?code=other-account HTTP/1.1\r\n\r\n";
    let Some(CallbackParams::Code { state, .. }) = parse_callback(without_state) else {
      panic!("expected a code callback");
    };
    assert!(matches!(check_state(state.as_deref(), "expected-state"), Err(AuthError::StateMismatch)));

    assert!(check_state(Some("expected-state"), "expected-state").is_ok());
    assert!(check_state(Some(""), "").is_err());
  }

  #[test]
  fn test_parse_callback_error_prefers_description() {
    let request =
      "GET /callback?error=access_denied&error_description=User+cancelled HTTP/1.1\r\n\r\n";
    assert_eq!(
      parse_callback(request),
      Some(CallbackParams::Error("User cancelled".to_string()))
    );
  }

  #[test]
  fn test_parse_callback_ignores_other_paths() {
    assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1\r\n\r\n"), None);
    assert_eq!(parse_callback(""), None);
  }

  #[test]
  fn test_session_tokens_refresh_window() {
    let fresh = SessionTokens {
      access_token: "a".into(),
      refresh_token: None,
      expires_at: Some(Utc::now() + Duration::hours(1)),
    };
    let expiring = SessionTokens {
      expires_at: Some(Utc::now() + Duration::minutes(2)),
      ..fresh.clone()
    };
    let no_expiry = SessionTokens {
      expires_at: None,
      ..fresh.clone()
    };

    assert!(!fresh.needs_refresh());
    assert!(expiring.needs_refresh());
    assert!(!no_expiry.needs_refresh());

    let expired = SessionTokens {
      expires_at: Some(Utc::now() - Duration::minutes(1)),
      ..fresh.clone()
    };
    assert!(expired.is_expired());
    assert!(!expiring.is_expired());
    assert!(!no_expiry.is_expired());
  }

  #[test]
  fn test_user_info_into_new_user() {
    let info: UserInfo = serde_json::from_str(
      r#"{"sub":"user-42","email":"maya@example.com","given_name":"Maya","picture":"https://img"}"#,
    )
    .unwrap();
    let user: NewUser = info.into();

    assert_eq!(user.id, "user-42");
    assert_eq!(user.first_name.as_deref(), Some("Maya"));
    assert_eq!(user.last_name, None);
    assert_eq!(user.profile_image_url.as_deref(), Some("https://img"));
  }

  #[test]
  fn test_config_from_env_reports_missing_variable() {
    temp_env::with_vars(
      [
        ("AUTH_CLIENT_ID", Some("id")),
        ("AUTH_CLIENT_SECRET", Some("secret")),
        ("AUTH_AUTHORIZE_URL", Some("https://id.example.com/authorize")),
        ("AUTH_TOKEN_URL", None::<&str>),
        ("AUTH_USERINFO_URL", Some("https://id.example.com/userinfo")),
      ],
      || match AuthConfig::from_env() {
        Err(AuthError::MissingConfig(name)) => assert_eq!(name, "AUTH_TOKEN_URL"),
        other => panic!("expected missing config, got {:?}", other),
      },
    );
  }

  #[test]
  fn test_config_from_env_default_scopes() {
    temp_env::with_vars(
      [
        ("AUTH_CLIENT_ID", Some("id")),
        ("AUTH_CLIENT_SECRET", Some("secret")),
        ("AUTH_AUTHORIZE_URL", Some("https://id.example.com/authorize")),
        ("AUTH_TOKEN_URL", Some("https://id.example.com/token")),
        ("AUTH_USERINFO_URL", Some("https://id.example.com/userinfo")),
        ("AUTH_SCOPES", None),
      ],
      || {
        let config = AuthConfig::from_env().unwrap();
        assert_eq!(config.scopes, DEFAULT_SCOPES);
        assert_eq!(config.redirect_uri, "http://localhost:8767/callback");
      },
    );
  }

  #[tokio::test]
  async fn test_exchange_code_for_tokens() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/token")
      .match_body(mockito::Matcher::AllOf(vec![
        mockito::Matcher::UrlEncoded("code".into(), "the-code".into()),
        mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
      ]))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,"token_type":"Bearer"}"#,
      )
      .create_async()
      .await;

    let tokens = exchange_code_for_tokens(&test_config(&server.url()), "the-code")
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(tokens.access_token, "at");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
    assert!(!tokens.needs_refresh());
  }

  #[tokio::test]
  async fn test_exchange_code_failure() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/token")
      .with_status(400)
      .with_body(r#"{"error":"invalid_grant"}"#)
      .create_async()
      .await;

    let result = exchange_code_for_tokens(&test_config(&server.url()), "stale").await;
    match result {
      Err(AuthError::OAuth(message)) => assert!(message.contains("invalid_grant")),
      other => panic!("expected OAuth error, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/token")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"access_token":"new-at","expires_in":600,"token_type":"Bearer"}"#)
      .create_async()
      .await;

    let tokens = refresh_tokens(&test_config(&server.url()), "old-rt").await.unwrap();
    assert_eq!(tokens.access_token, "new-at");
    assert_eq!(tokens.refresh_token.as_deref(), Some("old-rt"));
  }

  #[tokio::test]
  async fn test_fetch_user_info_sends_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/userinfo")
      .match_header("authorization", "Bearer at")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"sub":"user-42","email":"maya@example.com"}"#)
      .create_async()
      .await;

    let info = fetch_user_info(&test_config(&server.url()), "at").await.unwrap();

    mock.assert_async().await;
    assert_eq!(info.sub, "user-42");
    assert_eq!(info.email.as_deref(), Some("maya@example.com"));
  }
}
