//! Response services: an OpenAI-compatible chat-completions client and an
//! offline scripted tutor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parley_voice::{ContextTurn, ResponseService, Speaker, VoiceError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Connect/read limit for one chat-completions request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// A chat message in the request/response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Build the message list: system prompt, recent turns, then the new transcript.
#[must_use]
pub fn build_messages(system_prompt: &str, transcript: &str, context: &[ContextTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage::new("system", system_prompt));
    }
    messages.extend(context.iter().map(|turn| {
        let role = match turn.speaker {
            Speaker::Learner => "user",
            Speaker::Assistant => "assistant",
        };
        ChatMessage::new(role, &turn.text)
    }));
    messages.push(ChatMessage::new("user", transcript));
    messages
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat-completions client
// ─────────────────────────────────────────────────────────────────────────────

/// [`ResponseService`] backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsResponder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    system_prompt: String,
}

impl ChatCompletionsResponder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        system_prompt: impl Into<String>,
    ) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::ResponseTransport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            system_prompt: system_prompt.into(),
        })
    }
}

fn transport_error(err: &reqwest::Error) -> VoiceError {
    if err.is_timeout() {
        VoiceError::ResponseTimeout
    } else {
        VoiceError::ResponseTransport(err.to_string())
    }
}

/// Pull the assistant text out of a completion body.
fn extract_reply(body: &str) -> Result<String, VoiceError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| VoiceError::ResponseMalformed(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| VoiceError::ResponseMalformed("no reply content".to_string()))
}

#[async_trait::async_trait]
impl ResponseService for ChatCompletionsResponder {
    async fn send(&self, transcript: &str, context: &[ContextTurn]) -> Result<String, VoiceError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(&self.system_prompt, transcript, context),
            temperature: 0.7,
            max_tokens: 150,
            stream: false,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(endpoint = %self.endpoint, context_turns = context.len(), "Requesting reply");
        let response = request.send().await.map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Chat endpoint returned an error status");
            return Err(VoiceError::ResponseStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(|e| transport_error(&e))?;
        extract_reply(&text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline tutor
// ─────────────────────────────────────────────────────────────────────────────

const TUTOR_PROMPTS: &[&str] = &[
    "Hello! What did you do today?",
    "Interesting. Can you tell me a little more about that?",
    "How did that make you feel?",
    "What are you planning to do this weekend?",
    "Who do you usually spend your free time with?",
    "What is your favourite food, and why do you like it?",
];

/// Offline [`ResponseService`] that cycles through canned follow-up questions.
#[derive(Debug, Default)]
pub struct ScriptedTutor {
    next: AtomicUsize,
}

impl ScriptedTutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ResponseService for ScriptedTutor {
    async fn send(&self, transcript: &str, _context: &[ContextTurn]) -> Result<String, VoiceError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst) % TUTOR_PROMPTS.len();
        tracing::debug!(index, words = transcript.split_whitespace().count(), "Scripted reply");
        Ok(TUTOR_PROMPTS[index].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_orders_context() {
        let context = vec![
            ContextTurn {
                speaker: Speaker::Learner,
                text: "I like tea.".into(),
            },
            ContextTurn {
                speaker: Speaker::Assistant,
                text: "What kind?".into(),
            },
        ];
        let messages = build_messages("Be kind.", "Green tea.", &context);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content.as_deref(), Some("Green tea."));
    }

    #[test]
    fn test_build_messages_skips_blank_system_prompt() {
        let messages = build_messages("  ", "Hello", &[]);
        assert_eq!(messages, vec![ChatMessage::new("user", "Hello")]);
    }

    #[test]
    fn test_extract_reply() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" Nice! "}}]}"#;
        assert_eq!(extract_reply(body).unwrap(), "Nice!");
    }

    #[test]
    fn test_extract_reply_rejects_empty_and_invalid() {
        assert!(matches!(
            extract_reply(r#"{"choices":[]}"#),
            Err(VoiceError::ResponseMalformed(_))
        ));
        assert!(matches!(
            extract_reply(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#),
            Err(VoiceError::ResponseMalformed(_))
        ));
        assert!(matches!(
            extract_reply("<html>"),
            Err(VoiceError::ResponseMalformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let responder =
            ChatCompletionsResponder::new("http://127.0.0.1:9/v1/chat/completions", "m", None, "")
                .unwrap();
        let err = responder.send("hello", &[]).await.unwrap_err();
        assert!(
            matches!(err, VoiceError::ResponseTransport(_) | VoiceError::ResponseTimeout),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_scripted_tutor_cycles() {
        let tutor = ScriptedTutor::new();
        let first = tutor.send("hi", &[]).await.unwrap();
        for _ in 1..TUTOR_PROMPTS.len() {
            tutor.send("more", &[]).await.unwrap();
        }
        assert_eq!(tutor.send("again", &[]).await.unwrap(), first);
    }
}
