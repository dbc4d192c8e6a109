//! LLM integration for the wellness chat
//!
//! This module handles communication with the Claude API: stitching the
//! stored conversation into a request and adding cycle context to the
//! system prompt.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cycle::Phase;
use crate::models::{ChatMessage, ChatRole};

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const CHAT_MAX_TOKENS: u32 = 1024;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),

  #[error("Conversation has no user message")]
  EmptyConversation,
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  #[allow(dead_code)]
  model: String,
  #[allow(dead_code)]
  stop_reason: Option<String>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Chat Context
/// ---------------------------------------------------------------------------

/// One turn of stored conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
  pub role: ChatRole,
  pub content: String,
}

impl ChatTurn {
  /// Stored rows with an unknown role are skipped
  pub fn from_messages(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    messages
      .iter()
      .filter_map(|m| {
        m.role.parse::<ChatRole>().ok().map(|role| ChatTurn {
          role,
          content: m.content.clone(),
        })
      })
      .collect()
  }
}

/// What the assistant knows about the user's cycle right now
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
  pub cycle_phase: Option<Phase>,
  pub symptoms: Vec<String>,
}

impl ChatContext {
  pub fn system_prompt(&self) -> String {
    let mut prompt = include_str!("../prompts/wellness_system.txt").trim_end().to_string();

    let mut lines = Vec::new();
    if let Some(phase) = self.cycle_phase {
      lines.push(format!("- Current cycle phase: {}", phase.display_name()));
    }
    if !self.symptoms.is_empty() {
      lines.push(format!("- Recently logged symptoms: {}", self.symptoms.join(", ")));
    }

    if !lines.is_empty() {
      prompt.push_str("\n\nUSER CONTEXT:\n");
      prompt.push_str(&lines.join("\n"));
    }
    prompt
  }
}

/// Shape stored turns into an alternating user/assistant sequence:
/// leading assistant turns are dropped, consecutive same-role turns are
/// joined, and the sequence must end on a user turn.
fn build_messages(history: &[ChatTurn]) -> Result<Vec<ClaudeMessage>, LlmError> {
  let mut messages: Vec<ClaudeMessage> = Vec::new();

  for turn in history.iter().skip_while(|t| t.role != ChatRole::User) {
    let content = turn.content.trim();
    if content.is_empty() {
      continue;
    }
    if let Some(last) = messages.last_mut().filter(|m| m.role == turn.role.as_str()) {
      last.content.push_str("\n\n");
      last.content.push_str(content);
      continue;
    }
    messages.push(ClaudeMessage {
      role: turn.role.as_str().to_string(),
      content: content.to_string(),
    });
  }

  match messages.last() {
    Some(last) if last.role == ChatRole::User.as_str() => Ok(messages),
    _ => Err(LlmError::EmptyConversation),
  }
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: String,
  api_url: String,
  model: String,
}

impl ClaudeClient {
  /// Create a new Claude client, loading API key (and optional overrides) from environment
  pub fn from_env() -> Result<Self, LlmError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
    if api_key.trim().is_empty() {
      return Err(LlmError::MissingApiKey);
    }

    Ok(Self {
      client: Client::new(),
      api_key,
      api_url: std::env::var("ANTHROPIC_API_URL").unwrap_or_else(|_| CLAUDE_API_URL.to_string()),
      model: std::env::var("ARIVAI_LLM_MODEL").unwrap_or_else(|_| CLAUDE_MODEL.to_string()),
    })
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  async fn send(&self, request: &ClaudeRequest) -> Result<(String, Usage), LlmError> {
    let response = self
      .client
      .post(&self.api_url)
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      // Try to parse error response
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    // Concatenate all text blocks
    let text: Vec<String> = claude_response
      .content
      .into_iter()
      .filter(|c| c.content_type == "text")
      .filter_map(|c| c.text)
      .collect();

    if text.is_empty() {
      return Err(LlmError::Parse("No text content in response".to_string()));
    }

    Ok((text.join("\n").trim().to_string(), claude_response.usage))
  }

  /// Reply to the latest user turn in `history`, which must end on a user message
  pub async fn wellness_reply(
    &self,
    context: &ChatContext,
    history: &[ChatTurn],
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: self.model.clone(),
      max_tokens: CHAT_MAX_TOKENS,
      system: context.system_prompt(),
      messages: build_messages(history)?,
    };

    self.send(&request).await
  }
}

#[cfg(test)]
impl ClaudeClient {
  pub fn for_url(api_url: &str) -> Self {
    Self {
      client: Client::new(),
      api_key: "test-key".to_string(),
      api_url: api_url.to_string(),
      model: CLAUDE_MODEL.to_string(),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
