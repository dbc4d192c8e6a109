use chrono::NaiveDate;
use std::sync::Arc;
use tauri::State;

use super::auth::require_user;
use super::cycles::cycle_status_for;
use crate::cycle::Phase;
use crate::db::{AppState, DbPool};
use crate::error::{AppError, AppResult};
use crate::llm::{ChatContext, ChatTurn, ClaudeClient};
use crate::models::{ChatMessage, ChatRole, User};
use crate::storage;

/// ---------------------------------------------------------------------------
/// Context Window
/// ---------------------------------------------------------------------------

/// Messages of history sent along with a new message
const HISTORY_WINDOW: i64 = 10;
/// Recent symptom names included in the assistant's context
const SYMPTOM_CONTEXT: i64 = 5;

/// ---------------------------------------------------------------------------
/// History
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_chat_history(
  state: State<'_, Arc<AppState>>,
  limit: Option<i64>,
) -> Result<Vec<ChatMessage>, AppError> {
  let user = require_user(&state.db).await?;
  storage::get_chat_history(&state.db, &user.id, limit).await
}

/// ---------------------------------------------------------------------------
/// Send Message
/// ---------------------------------------------------------------------------

/// Send a message to the wellness assistant and return its stored reply
#[tauri::command]
pub async fn send_chat_message(
  state: State<'_, Arc<AppState>>,
  content: Option<String>,
  cycle_phase: Option<Phase>,
) -> Result<ChatMessage, AppError> {
  let user = require_user(&state.db).await?;
  let client = ClaudeClient::from_env()?;

  exchange_message(
    &state.db,
    &client,
    &user,
    content.as_deref().unwrap_or_default(),
    cycle_phase,
    super::today(),
  )
  .await
}

pub(crate) async fn exchange_message(
  db: &DbPool,
  client: &ClaudeClient,
  user: &User,
  content: &str,
  cycle_phase: Option<Phase>,
  today: NaiveDate,
) -> AppResult<ChatMessage> {
  let content = content.trim();
  if content.is_empty() {
    return Err(AppError::validation("Message content is required"));
  }

  let cycle_phase = match cycle_phase {
    Some(phase) => Some(phase),
    None => cycle_status_for(db, user, today).await?.map(|s| s.phase),
  };

  storage::create_chat_message(db, &user.id, ChatRole::User, content, cycle_phase).await?;

  let history = storage::get_chat_history(db, &user.id, Some(HISTORY_WINDOW)).await?;
  let symptoms = storage::get_symptoms(db, &user.id, Some(SYMPTOM_CONTEXT))
    .await?
    .into_iter()
    .map(|s| s.symptom_type)
    .collect();
  let context = ChatContext { cycle_phase, symptoms };

  let (reply, usage) = client
    .wellness_reply(&context, &ChatTurn::from_messages(&history))
    .await
    .map_err(|e| {
      tracing::error!(user_id = %user.id, error = %e, "Assistant reply failed");
      e
    })?;

  tracing::info!(
    user_id = %user.id,
    model = client.model(),
    input_tokens = usage.input_tokens,
    output_tokens = usage.output_tokens,
    "Assistant replied"
  );

  storage::create_chat_message(db, &user.id, ChatRole::Assistant, &reply, cycle_phase).await
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;
  use mockito::Matcher;

  const REPLY_BODY: &str = r#"{
    "content": [{"type": "text", "text": "Warmth and rest can ease cramps."}],
    "model": "claude-sonnet-4-20250514",
    "stop_reason": "end_turn",
    "usage": {"input_tokens": 200, "output_tokens": 9}
  }"#;

  #[tokio::test]
  async fn test_exchange_message_stores_both_turns() {
    let pool = setup_test_db().await;
    let user = seed_test_user(&pool).await;
    seed_test_cycles(&pool, &user.id, &[date(2025, 3, 1)]).await;
    crate::commands::symptoms::record_symptoms(
      &pool,
      &user.id,
      vec![mock_new_symptom("cramps", Some(4))],
      date(2025, 3, 2),
    )
    .await
    .unwrap();

    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/messages")
      .match_body(Matcher::AllOf(vec![
        Matcher::Regex("Current cycle phase: Menstrual".to_string()),
        Matcher::Regex("Recently logged symptoms: cramps".to_string()),
        Matcher::PartialJsonString(
          r#"{"messages":[{"role":"user","content":"Any tips?"}]}"#.to_string(),
        ),
      ]))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(REPLY_BODY)
      .create_async()
      .await;

    let client = ClaudeClient::for_url(&format!("{}/v1/messages", server.url()));
    let reply = exchange_message(&pool, &client, &user, " Any tips? ", None, date(2025, 3, 2))
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(reply.role, "assistant");
    assert_eq!(reply.content, "Warmth and rest can ease cramps.");
    assert_eq!(reply.cycle_phase.as_deref(), Some("menstrual"));

    let history = storage::get_chat_history(&pool, &user.id, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].content, "Any tips?");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_explicit_phase_wins() {
    let pool = setup_test_db().await;
    let user = seed_test_user(&pool).await;

    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .match_body(Matcher::Regex("Current cycle phase: Luteal".to_string()))
      .with_status(200)
      .with_body(REPLY_BODY)
      .create_async()
      .await;

    let client = ClaudeClient::for_url(&format!("{}/v1/messages", server.url()));
    let reply = exchange_message(&pool, &client, &user, "Hello", Some(Phase::Luteal), date(2025, 3, 2))
      .await
      .unwrap();
    assert_eq!(reply.cycle_phase.as_deref(), Some("luteal"));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_empty_message_rejected() {
    let pool = setup_test_db().await;
    let user = seed_test_user(&pool).await;
    let client = ClaudeClient::for_url("http://127.0.0.1:9/v1/messages");

    let result = exchange_message(&pool, &client, &user, "   ", None, date(2025, 3, 2)).await;
    match result {
      Err(AppError::Validation(message)) => assert_eq!(message, "Message content is required"),
      other => panic!("unexpected: {:?}", other),
    }
    assert!(storage::get_chat_history(&pool, &user.id, None).await.unwrap().is_empty());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_llm_failure_keeps_user_message() {
    let pool = setup_test_db().await;
    let user = seed_test_user(&pool).await;

    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .with_status(500)
      .with_body(r#"{"type":"error","error":{"type":"api_error","message":"Internal error"}}"#)
      .create_async()
      .await;

    let client = ClaudeClient::for_url(&format!("{}/v1/messages", server.url()));
    let result = exchange_message(&pool, &client, &user, "Hello", None, date(2025, 3, 2)).await;
    assert!(matches!(result, Err(AppError::Llm(_))));

    let history = storage::get_chat_history(&pool, &user.id, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].cycle_phase, None);

    teardown_test_db(pool).await;
  }
}
