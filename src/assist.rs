//! AI chat assistant: drafts events from natural language.
//!
//! The transcript lives only as long as the panel. Extraction goes to an
//! OpenRouter-style chat-completion endpoint; the response is scanned for
//! a JSON object and anything malformed or absent simply means "no event
//! intent detected", never an error. Draft confirmation re-fetches the
//! canonical identity and refuses for non-admins before issuing the
//! create; the authenticated gateway (and so the server) remains the real
//! authorization boundary, not the prompt.

use crate::api::EventApi;
use crate::config::AssistantConfig;
use crate::error::ApiError;
use crate::logging;
use crate::model::{Event, EventInput, Role};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub severity: Option<Severity>,
}

impl ChatMessage {
    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            severity: None,
        }
    }

    fn error(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            severity: Some(Severity::Error),
        }
    }
}

/// Ephemeral draft produced by extraction; exists until confirmed
/// (creates an event) or discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Wire types for the chat-completion call
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Extraction {
    #[serde(rename = "hasEvent", default)]
    has_event: bool,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    date: String,
}

/// Pull the first JSON object out of model output that may be wrapped in
/// prose or code fences. Malformed JSON is treated as no event intent.
fn scan_extraction(content: &str) -> Option<Extraction> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

pub struct Assistant {
    api: Arc<dyn EventApi>,
    client: reqwest::Client,
    config: AssistantConfig,
    pub messages: Vec<ChatMessage>,
    pub draft: Option<EventDraft>,
    busy: bool,
}

impl Assistant {
    pub fn new(api: Arc<dyn EventApi>, config: AssistantConfig) -> Self {
        let greeting = ChatMessage::assistant(
            "Hello! I'm your event assistant. Describe an event in plain \
             language and I'll draft it, or ask me about your events.",
        );
        Self {
            api,
            client: reqwest::Client::new(),
            config,
            messages: vec![greeting],
            draft: None,
            busy: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Handle one user turn. `events` is the shell's already-loaded
    /// collection, used to answer listing questions without a network
    /// call.
    pub async fn send(&mut self, input: &str, events: &[Event]) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: input.to_string(),
            severity: None,
        });

        if self.config.api_key.is_none() {
            self.messages.push(ChatMessage::error(
                "The assistant is not configured (set OPENROUTER_API_KEY or \
                 assistant.api_key in config.toml).",
            ));
            return;
        }

        let lowered = input.to_lowercase();
        if lowered.contains("my events") || (lowered.contains("list") && lowered.contains("event"))
        {
            self.messages
                .push(ChatMessage::assistant(summarize_events(events)));
            return;
        }

        self.busy = true;
        match self.extract(input).await {
            Ok(Some(extraction)) if extraction.has_event => {
                let draft = draft_from_extraction(extraction);
                self.messages.push(ChatMessage::assistant(format!(
                    "Here's a draft: \"{}\" at {} on {}. Confirm to create it or discard.",
                    draft.name, draft.location, draft.date
                )));
                self.draft = Some(draft);
            }
            Ok(_) => {
                // No event intent: fall through to a plain chat answer
                match self.chat(input).await {
                    Ok(reply) => self.messages.push(ChatMessage::assistant(reply)),
                    Err(e) => {
                        logging::warn(&format!("Assistant chat failed: {}", e));
                        self.messages
                            .push(ChatMessage::error(format!("Assistant unavailable: {}", e)));
                    }
                }
            }
            Err(e) => {
                logging::warn(&format!("Assistant extraction failed: {}", e));
                self.messages
                    .push(ChatMessage::error(format!("Assistant unavailable: {}", e)));
            }
        }
        self.busy = false;
    }

    /// Create the drafted event. The canonical identity is re-fetched
    /// first: a non-admin gets a refusal locally, and the server enforces
    /// the same rule on the create call itself.
    pub async fn confirm_draft(&mut self) -> Result<Option<Event>, ApiError> {
        let Some(draft) = self.draft.clone() else {
            return Ok(None);
        };

        let me = self.api.me().await?;
        if me.role != Role::Admin {
            let msg = "Only admins can create events".to_string();
            self.messages.push(ChatMessage::error(msg.clone()));
            return Err(ApiError::Auth(msg));
        }

        let date = Utc
            .from_utc_datetime(&draft.date.and_hms_opt(9, 0, 0).unwrap_or_default());
        let input = EventInput {
            name: draft.name.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            date,
        };

        match self.api.create_event(&input).await {
            Ok(event) => {
                self.draft = None;
                self.messages.push(ChatMessage::assistant(format!(
                    "Created \"{}\" on {}.",
                    event.name,
                    event.date.format("%Y-%m-%d %H:%M")
                )));
                Ok(Some(event))
            }
            Err(e) => {
                self.messages
                    .push(ChatMessage::error(format!("Could not create event: {}", e)));
                Err(e)
            }
        }
    }

    pub fn discard_draft(&mut self) {
        if self.draft.take().is_some() {
            self.messages
                .push(ChatMessage::assistant("Draft discarded."));
        }
    }

    async fn extract(&self, input: &str) -> Result<Option<Extraction>, ApiError> {
        let content = self
            .complete(vec![
                WireMessage {
                    role: "system".to_string(),
                    content: extraction_prompt(),
                },
                WireMessage {
                    role: "user".to_string(),
                    content: input.to_string(),
                },
            ])
            .await?;
        Ok(scan_extraction(&content))
    }

    async fn chat(&self, input: &str) -> Result<String, ApiError> {
        let mut messages = vec![WireMessage {
            role: "system".to_string(),
            content: "You are a concise assistant inside an event management \
                      dashboard. Answer briefly."
                .to_string(),
        }];
        for m in self.messages.iter().rev().take(8).rev() {
            messages.push(WireMessage {
                role: match m.role {
                    ChatRole::User => "user".to_string(),
                    ChatRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user".to_string(),
            content: input.to_string(),
        });
        self.complete(messages).await
    }

    async fn complete(&self, messages: Vec<WireMessage>) -> Result<String, ApiError> {
        let key = self.config.api_key.as_deref().unwrap_or_default();
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: 0.1,
        };

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: "Chat completion request failed".to_string(),
            });
        }

        let body: ChatResponse = resp.json().await.map_err(|e| ApiError::Api {
            status: status.as_u16(),
            message: format!("malformed response body: {}", e),
        })?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

fn extraction_prompt() -> String {
    let today = Utc::now().date_naive();
    let tomorrow = today + Duration::days(1);
    format!(
        "You are an event extraction assistant. Extract event details from \
         the user's message and return ONLY a JSON object with this exact \
         structure:\n\
         {{\"hasEvent\": true/false, \"name\": \"...\", \"description\": \
         \"...\", \"location\": \"...\", \"date\": \"YYYY-MM-DD\"}}\n\
         Current date: {today}. Tomorrow: {tomorrow}.\n\
         Set hasEvent=true only if the user wants to create, schedule, or \
         plan an event. If no date is mentioned use tomorrow; if no \
         location is mentioned use \"To be determined\". Return only the \
         JSON object, nothing else."
    )
}

fn draft_from_extraction(extraction: Extraction) -> EventDraft {
    let fallback = Utc::now().date_naive() + Duration::days(1);
    let date = NaiveDate::parse_from_str(&extraction.date, "%Y-%m-%d").unwrap_or(fallback);
    EventDraft {
        name: if extraction.name.trim().is_empty() {
            "Untitled event".to_string()
        } else {
            extraction.name
        },
        description: extraction.description,
        location: if extraction.location.trim().is_empty() {
            "To be determined".to_string()
        } else {
            extraction.location
        },
        date,
    }
}

fn summarize_events(events: &[Event]) -> String {
    if events.is_empty() {
        return "You have no events loaded right now.".to_string();
    }
    let mut lines = vec![format!("You have {} event(s):", events.len())];
    for e in events.iter().take(10) {
        lines.push(format!(
            "- {} — {} at {}",
            e.name,
            e.date.format("%Y-%m-%d %H:%M"),
            e.location
        ));
    }
    if events.len() > 10 {
        lines.push(format!("…and {} more.", events.len() - 10));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_extraction_plain_json() {
        let content = r#"{"hasEvent": true, "name": "Coffee", "description": "Coffee meeting", "location": "Cafe", "date": "2026-09-02"}"#;
        let e = scan_extraction(content).unwrap();
        assert!(e.has_event);
        assert_eq!(e.name, "Coffee");
        assert_eq!(e.date, "2026-09-02");
    }

    #[test]
    fn test_scan_extraction_wrapped_in_prose() {
        let content = "Sure! Here is the extraction:\n```json\n{\"hasEvent\": false}\n```\nLet me know.";
        let e = scan_extraction(content).unwrap();
        assert!(!e.has_event);
    }

    #[test]
    fn test_scan_extraction_malformed_is_none() {
        assert!(scan_extraction("no json here").is_none());
        assert!(scan_extraction("{broken json").is_none());
        assert!(scan_extraction("} inverted {").is_none());
    }

    #[test]
    fn test_draft_defaults() {
        let draft = draft_from_extraction(Extraction {
            has_event: true,
            name: "  ".to_string(),
            description: String::new(),
            location: String::new(),
            date: "not-a-date".to_string(),
        });
        assert_eq!(draft.name, "Untitled event");
        assert_eq!(draft.location, "To be determined");
        // Unparseable date falls back to tomorrow
        assert_eq!(draft.date, Utc::now().date_naive() + Duration::days(1));
    }

    #[test]
    fn test_summarize_events_empty() {
        assert!(summarize_events(&[]).contains("no events"));
    }
}
