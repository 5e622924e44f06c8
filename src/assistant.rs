use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::env;
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::ParsedCommand;
use crate::models::{ChatMessage, ChatRole, Document, ReceiptExtract, TaskStatus};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}

/// Ambient facts handed to the interpreter alongside the free text, so the
/// model can resolve relative dates and fill the default currency.
#[derive(Debug, Clone)]
pub struct InterpretContext {
    pub now: DateTime<Utc>,
    pub timezone: String,
    pub currency: String,
}

/// Turns free text into a schema-validated command. Any service that can
/// satisfy the `ParsedCommand` schema is substitutable here; tests plug in
/// a scripted implementation.
pub trait CommandInterpreter {
    fn interpret(&self, text: &str, ctx: &InterpretContext)
    -> Result<ParsedCommand, AssistantError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Pulls structured data out of a receipt image.
pub trait ReceiptExtractor {
    fn extract_receipt(&self, image: &[u8]) -> Result<ReceiptExtract, AssistantError>;
}

/// One concierge conversation. History is in-memory only and dies with the
/// session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub system_instruction: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Seed a session with the user's current context, the way the concierge
    /// always opens.
    pub fn for_document(doc: &Document) -> Self {
        let active_tasks = doc
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .count();
        let unpaid_bills = doc
            .bills
            .iter()
            .filter(|b| b.status != crate::models::BillStatus::Paid)
            .count();
        let system_instruction = format!(
            "You are the FocusPilot AI Concierge.\n\
             You help users manage tasks, bills, and productivity.\n\
             Current Context:\n\
             - Active Tasks: {active_tasks}\n\
             - Unpaid Bills: {unpaid_bills}\n\
             - Recent Notes: {notes}\n\
             User Timezone: {tz}\n\n\
             Always be helpful, professional, and concise.",
            notes = doc.notes.len(),
            tz = doc.settings.timezone,
        );
        Self {
            system_instruction,
            messages: Vec::new(),
        }
    }
}

/// Multi-turn concierge chat over the same model boundary.
pub trait Concierge {
    fn chat(&self, session: &mut ChatSession, text: &str) -> Result<String, AssistantError>;
}

/// Connection settings for the hosted Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL of the generative language endpoint.
    pub api_url: String,
    /// API key, from the environment only.
    pub api_key: String,
    /// Low-latency model for command parsing and receipt extraction.
    pub fast_model: String,
    /// Stronger model for the concierge chat.
    pub chat_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            fast_model: "gemini-flash-lite-latest".to_string(),
            chat_model: "gemini-3-pro-preview".to_string(),
        }
    }
}

impl GeminiConfig {
    /// Read the API key from `FOCUSPILOT_API_KEY` (or `GEMINI_API_KEY`).
    /// Everything else keeps its default unless overridden by the caller.
    pub fn from_env() -> Result<Self, AssistantError> {
        let api_key = env::var("FOCUSPILOT_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                AssistantError::Configuration(
                    "FOCUSPILOT_API_KEY environment variable is missing".to_string(),
                )
            })?;
        Ok(Self {
            api_key,
            ..Self::default()
        })
    }
}

// Wire types for the generateContent endpoint.

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// Response schema for command parsing, mirrored field-for-field from the
/// `ParsedCommand` contract so the model cannot answer out of shape.
fn parsed_command_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "type": {
                "type": "STRING",
                "enum": [
                    "create_task", "update_task", "complete_task", "create_bill",
                    "mark_bill_paid", "create_event", "create_note", "set_reminder",
                    "query", "daily_summary"
                ]
            },
            "confidence": { "type": "NUMBER" },
            "clarification_question": { "type": "STRING", "nullable": true },
            "missing_fields": { "type": "ARRAY", "items": { "type": "STRING" } },
            "payload": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING", "nullable": true },
                    "notes": { "type": "STRING", "nullable": true },
                    "dueAt": { "type": "STRING", "nullable": true },
                    "priority": { "type": "STRING", "enum": ["P0", "P1", "P2", "P3"], "nullable": true },
                    "tags": { "type": "ARRAY", "items": { "type": "STRING" }, "nullable": true },
                    "payee": { "type": "STRING", "nullable": true },
                    "amount": { "type": "NUMBER", "nullable": true },
                    "currency": { "type": "STRING", "nullable": true },
                    "dueDate": { "type": "STRING", "nullable": true },
                    "autopay": { "type": "BOOLEAN", "nullable": true },
                    "recurrence": { "type": "STRING", "enum": ["none", "monthly", "biweekly", "custom"], "nullable": true },
                    "id": { "type": "STRING", "nullable": true }
                },
                "nullable": true
            }
        },
        "required": ["type", "confidence", "missing_fields"]
    })
}

/// Response schema for receipt extraction.
fn receipt_extract_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "vendorName": { "type": "STRING", "nullable": true },
            "date": { "type": "STRING", "nullable": true },
            "subtotal": { "type": "NUMBER", "nullable": true },
            "tax": { "type": "NUMBER", "nullable": true },
            "total": { "type": "NUMBER", "nullable": true },
            "currency": { "type": "STRING", "nullable": true },
            "category": { "type": "STRING", "nullable": true },
            "paymentMethod": { "type": "STRING", "nullable": true },
            "lineItems": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "description": { "type": "STRING" },
                        "amount": { "type": "NUMBER" }
                    }
                },
                "nullable": true
            }
        }
    })
}

/// Hosted-model implementation of the assistant boundary.
pub struct GeminiAssistant {
    client: reqwest::blocking::Client,
    config: GeminiConfig,
}

impl GeminiAssistant {
    pub fn new(config: GeminiConfig) -> Result<Self, AssistantError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| AssistantError::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, AssistantError> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AssistantError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url, model
        );
        debug!(model, "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .map_err(|e| AssistantError::Network(format!("Failed to send request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            return Err(AssistantError::ExtractionFailed(format!(
                "API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        response
            .json()
            .map_err(|e| AssistantError::ExtractionFailed(format!("Failed to parse response: {e}")))
    }

    fn generate_json<T: serde::de::DeserializeOwned>(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<T, AssistantError> {
        let response = self.generate(model, request)?;
        let text = response
            .text()
            .ok_or_else(|| AssistantError::ExtractionFailed("Empty model response".to_string()))?;
        serde_json::from_str(text)
            .map_err(|e| AssistantError::ExtractionFailed(format!("Malformed model output: {e}")))
    }
}

impl CommandInterpreter for GeminiAssistant {
    fn interpret(
        &self,
        text: &str,
        ctx: &InterpretContext,
    ) -> Result<ParsedCommand, AssistantError> {
        let prompt = format!(
            "You are FocusPilot, a personal assistant.\n\
             Current Time: {now}\n\
             User Timezone: {tz}\n\
             Analyze the user's request: \"{text}\"\n\n\
             Rules:\n\
             1. Map to correct action.\n\
             2. Convert relative dates (tomorrow, Friday) to absolute ISO.\n\
             3. For bills, default currency is {currency}.",
            now = ctx.now.to_rfc3339(),
            tz = ctx.timezone,
            currency = ctx.currency,
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::text(prompt)],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Some(parsed_command_schema()),
            }),
        };

        self.generate_json(&self.config.fast_model, &request)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

impl ReceiptExtractor for GeminiAssistant {
    fn extract_receipt(&self, image: &[u8]) -> Result<ReceiptExtract, AssistantError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![
                    Part::image("image/jpeg", BASE64.encode(image)),
                    Part::text("Extract receipt data with high precision."),
                ],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Some(receipt_extract_schema()),
            }),
        };

        self.generate_json(&self.config.fast_model, &request)
    }
}

impl Concierge for GeminiAssistant {
    fn chat(&self, session: &mut ChatSession, text: &str) -> Result<String, AssistantError> {
        let mut contents: Vec<Content> = session
            .messages
            .iter()
            .map(|m| Content {
                role: Some(match m.role {
                    ChatRole::User => "user".to_string(),
                    ChatRole::Assistant => "model".to_string(),
                }),
                parts: vec![Part::text(m.text.clone())],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        });

        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(session.system_instruction.clone())],
            }),
            generation_config: None,
        };

        let response = self.generate(&self.config.chat_model, &request)?;
        let reply = match response.text() {
            Some(text) => text.to_string(),
            None => {
                warn!("no content in concierge response, using fallback");
                "I couldn't generate a response. Please retry.".to_string()
            }
        };

        let now = Utc::now();
        session.messages.push(ChatMessage {
            role: ChatRole::User,
            text: text.to_string(),
            timestamp: now,
        });
        session.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            text: reply.clone(),
            timestamp: now,
        });
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bill, Note, Task};
    use chrono::NaiveDate;

    /// Scripted stand-in proving the boundary is substitutable.
    struct Scripted(ParsedCommand);

    impl CommandInterpreter for Scripted {
        fn interpret(
            &self,
            _text: &str,
            _ctx: &InterpretContext,
        ) -> Result<ParsedCommand, AssistantError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn interpreter_is_object_safe_and_substitutable() {
        let canned = ParsedCommand {
            action: "create_task".to_string(),
            confidence: 1.0,
            ..ParsedCommand::default()
        };
        let boxed: Box<dyn CommandInterpreter> = Box::new(Scripted(canned));
        let ctx = InterpretContext {
            now: "2024-01-10T08:00:00Z".parse().unwrap(),
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
        };
        let parsed = boxed.interpret("call the bank", &ctx).unwrap();
        assert_eq!(parsed.action, "create_task");
    }

    #[test]
    fn chat_session_seeds_context_counts() {
        let now = "2024-01-10T08:00:00Z".parse().unwrap();
        let mut doc = Document::default();
        doc.tasks.push(Task::new("open".to_string(), now));
        doc.bills.push(Bill::new(
            "Utility Corp".to_string(),
            10.0,
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            now,
        ));
        doc.notes.push(Note::new("hello".to_string(), now));

        let session = ChatSession::for_document(&doc);
        assert!(session.system_instruction.contains("Active Tasks: 1"));
        assert!(session.system_instruction.contains("Unpaid Bills: 1"));
        assert!(session.system_instruction.contains("Recent Notes: 1"));
        assert!(session.messages.is_empty());
    }

    #[test]
    fn command_schema_lists_every_action() {
        let schema = parsed_command_schema();
        let actions = schema["properties"]["type"]["enum"].as_array().unwrap();
        assert_eq!(actions.len(), 10);
        assert!(actions.iter().any(|a| a == "daily_summary"));
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        // Only run when the ambient environment doesn't define the keys.
        if env::var("FOCUSPILOT_API_KEY").is_ok() || env::var("GEMINI_API_KEY").is_ok() {
            return;
        }
        assert!(matches!(
            GeminiConfig::from_env(),
            Err(AssistantError::Configuration(_))
        ));
    }
}
