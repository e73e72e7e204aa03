//! Memory extraction prompt and JSON parser.
//!
//! The extractor turns raw submitted conversation text into zero or more
//! atomic, durable, first-person memory candidates. Each candidate carries an
//! action: `ADD` for new knowledge, `UPDATE` when it supersedes something the
//! user likely stated before, `NONE` for content not worth remembering.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::{ChatMessage, CompletionRequest, SharedBackend};
use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// What the extractor wants done with a candidate memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryAction {
    /// Store as a new memory.
    Add,
    /// Replace an existing memory that states an older version of this fact.
    Update,
    /// Not durable knowledge; discard.
    None,
}

/// One extracted memory candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMemory {
    /// The atomic fact, phrased in first person.
    pub content: String,
    /// What to do with it.
    pub action: MemoryAction,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionEnvelope {
    #[serde(default)]
    memories: Vec<ExtractedMemory>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompt
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the extraction prompt from submitted conversation messages.
pub struct ExtractionPrompt;

impl ExtractionPrompt {
    /// Format a conversation into an extraction prompt.
    pub fn build(messages: &[ChatMessage]) -> String {
        let mut prompt = String::with_capacity(2048);

        prompt.push_str("Extract memories from this conversation:\n\n");
        for message in messages {
            prompt.push_str(&format!("[{}]: {}\n", message.role.as_str(), message.content));
        }
        prompt.push_str("\nRespond with ONLY the JSON object. No markdown, no explanation.\n");

        prompt
    }

    /// The system instruction sent alongside every extraction request.
    pub fn system() -> &'static str {
        SYSTEM_INSTRUCTION
    }
}

const SYSTEM_INSTRUCTION: &str = r#"You are a memory extraction system for a coding assistant. Given a conversation, extract durable facts worth remembering across sessions: preferences, decisions, configurations, code patterns, and project knowledge.

Return a JSON object with this structure:
```json
{
  "memories": [
    {"content": "...", "action": "ADD"}
  ]
}
```

Rules:
- Each memory is ONE atomic fact, phrased as a first-person statement (e.g. "I prefer async/await over callbacks in JavaScript").
- `action` is "ADD" for new knowledge, "UPDATE" if the statement clearly replaces something the user previously believed or preferred, "NONE" for chit-chat or ephemeral content.
- Preserve concrete details: versions, names, paths, flags.
- Do not merge unrelated facts into one memory.
- If nothing durable can be extracted, return {"memories": []}."#;

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse LLM output into extracted memories.
///
/// Handles common failure modes:
/// - JSON wrapped in markdown code fences
/// - Surrounding prose before/after the JSON object
/// - A bare top-level array instead of the envelope
/// - Malformed output (returns empty)
pub fn parse_extraction(raw: &str) -> Vec<ExtractedMemory> {
    let cleaned = strip_code_fences(raw);

    if let Ok(envelope) = serde_json::from_str::<ExtractionEnvelope>(cleaned) {
        return keep_actionable(envelope.memories);
    }

    if let Ok(list) = serde_json::from_str::<Vec<ExtractedMemory>>(cleaned) {
        return keep_actionable(list);
    }

    if let Some(json_str) = extract_json_object(cleaned) {
        if let Ok(envelope) = serde_json::from_str::<ExtractionEnvelope>(json_str) {
            return keep_actionable(envelope.memories);
        }
    }

    warn!("Failed to parse extraction result, returning empty");
    Vec::new()
}

/// Drop `NONE` items and empty contents; the caller never sees them.
fn keep_actionable(memories: Vec<ExtractedMemory>) -> Vec<ExtractedMemory> {
    memories
        .into_iter()
        .filter(|m| m.action != MemoryAction::None && !m.content.trim().is_empty())
        .collect()
}

/// Strip markdown code fences from LLM output.
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = s.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }

    s
}

/// Try to find a top-level JSON object `{...}` in the text.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end > start { Some(&s[start..=end]) } else { None }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extractor
// ─────────────────────────────────────────────────────────────────────────────

/// LLM-driven memory extractor.
pub struct Extractor {
    backend: SharedBackend,
}

impl Extractor {
    /// Create an extractor over the given backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Extract memory candidates from a conversation.
    pub async fn extract(&self, messages: &[ChatMessage]) -> Result<Vec<ExtractedMemory>> {
        let prompt = ExtractionPrompt::build(messages);
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_system(ExtractionPrompt::system());

        let raw = self.backend.complete(request).await?;
        Ok(parse_extraction(&raw))
    }

    /// Name of the underlying backend, for logs and health reporting.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    #[test]
    fn test_build_prompt() {
        let messages = vec![
            ChatMessage::user("I use PostgreSQL 16"),
            ChatMessage::assistant("Noted!"),
        ];
        let prompt = ExtractionPrompt::build(&messages);
        assert!(prompt.contains("[user]: I use PostgreSQL 16"));
        assert!(prompt.contains("[assistant]: Noted!"));
    }

    #[test]
    fn test_parse_valid_envelope() {
        let json = r#"{
            "memories": [
                {"content": "I prefer tabs over spaces", "action": "ADD"},
                {"content": "I now use hooks instead of class components", "action": "UPDATE"}
            ]
        }"#;

        let memories = parse_extraction(json);
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].action, MemoryAction::Add);
        assert_eq!(memories[1].action, MemoryAction::Update);
    }

    #[test]
    fn test_parse_filters_none_actions() {
        let json = r#"{
            "memories": [
                {"content": "I use Rust", "action": "ADD"},
                {"content": "hello there", "action": "NONE"}
            ]
        }"#;

        let memories = parse_extraction(json);
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content, "I use Rust");
    }

    #[test]
    fn test_parse_with_code_fences() {
        let raw = "```json\n{\"memories\": [{\"content\": \"I use vim\", \"action\": \"ADD\"}]}\n```";
        let memories = parse_extraction(raw);
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content, "I use vim");
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let raw = r#"Here is the extraction:

{"memories": [{"content": "I deploy with Docker", "action": "ADD"}]}

Hope that helps!"#;

        let memories = parse_extraction(raw);
        assert_eq!(memories.len(), 1);
    }

    #[test]
    fn test_parse_bare_array() {
        let raw = r#"[{"content": "I use pnpm", "action": "ADD"}]"#;
        let memories = parse_extraction(raw);
        assert_eq!(memories.len(), 1);
    }

    #[test]
    fn test_parse_malformed_returns_empty() {
        assert!(parse_extraction("this is not json at all").is_empty());
    }

    #[test]
    fn test_parse_empty_object() {
        assert!(parse_extraction("{}").is_empty());
    }

    #[tokio::test]
    async fn test_extractor_round_trip() {
        let backend = Arc::new(MockBackend::with_text(
            r#"{"memories": [{"content": "I use PostgreSQL 16", "action": "ADD"}]}"#,
        ));
        let extractor = Extractor::new(backend);

        let memories = extractor
            .extract(&[ChatMessage::user("I use PostgreSQL 16 for everything")])
            .await
            .unwrap();

        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content, "I use PostgreSQL 16");
        assert_eq!(memories[0].action, MemoryAction::Add);
    }
}
