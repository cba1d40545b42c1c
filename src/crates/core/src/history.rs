//! Conversation-history reducer
//!
//! Prior raw turns are replayed to the agent as request-ready messages. A
//! turn that no longer decodes is skipped; losing part of the context is
//! preferable to failing the new request.

use log::debug;
use serde::Serialize;

use crate::protocol::envelope::{decode_envelope, ContentBlock, Envelope};

/// One request-ready content item. The request schema only carries text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<MessageContent>,
}

/// Outbound request body for the streaming run endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub messages: Vec<Message>,
}

/// Reduce stored raw turns into ordered `assistant` messages.
pub fn reduce_for_request(history: &[String]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|raw| match decode_envelope(raw) {
            Ok(envelope) => Some(assistant_message(&envelope)),
            Err(err) => {
                debug!("skipping prior turn that failed to decode: {err}");
                None
            }
        })
        .collect()
}

/// Build one assistant message from an envelope, scanning blocks in order.
/// Thinking, tool-use, and unknown blocks are never replayed to the agent.
fn assistant_message(envelope: &Envelope) -> Message {
    let mut content = Vec::new();

    for block in &envelope.content {
        match block {
            ContentBlock::ToolResult(block) => {
                let json = block
                    .tool_result
                    .content
                    .as_ref()
                    .and_then(|units| units.first())
                    .and_then(|unit| unit.json.as_ref());
                let Some(json) = json else { continue };

                if let Some(text) = json.text.as_deref().filter(|t| !t.is_empty()) {
                    content.push(MessageContent::text(text));
                } else if let Some(sql) = json.sql.as_deref() {
                    content.push(MessageContent::text(format!("Tool result SQL: {sql}")));
                } else if let Some(rows) = json.result_set.as_ref().and_then(|rs| rs.data.as_ref())
                {
                    content.push(MessageContent::text(format!(
                        "Tool result contained {} rows.",
                        rows.len()
                    )));
                }
            }
            ContentBlock::Text(text) => content.push(MessageContent::text(text.text.clone())),
            ContentBlock::Thinking(_) | ContentBlock::ToolUse(_) | ContentBlock::Unknown(_) => {}
        }
    }

    // Keep the request schema well-formed for turns that contributed nothing
    if content.is_empty() {
        content.push(MessageContent::text(""));
    }

    Message {
        role: "assistant".to_string(),
        content,
    }
}

/// Reduced history plus the new user question, in request order.
pub fn build_request_body(question: &str, history: &[String]) -> RequestBody {
    let mut messages = reduce_for_request(history);
    messages.push(Message {
        role: "user".to_string(),
        content: vec![MessageContent::text(question)],
    });
    RequestBody { messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn turn_with_text(text: &str) -> String {
        json!({"content": [{"type": "text", "text": text}]}).to_string()
    }

    #[test]
    fn malformed_turns_are_skipped_without_reordering() {
        let history = vec![
            turn_with_text("first"),
            "not json at all".to_string(),
            turn_with_text("third"),
        ];
        let messages = reduce_for_request(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content[0].text, "first");
        assert_eq!(messages[1].content[0].text, "third");
    }

    #[test]
    fn tool_result_prefers_text_over_sql_over_row_count() {
        let with_text = json!({"content": [{"type": "tool_result", "tool_result": {
            "content": [{"json": {"text": "42 rows matched", "sql": "SELECT 1"}}]
        }}]})
        .to_string();
        let with_sql = json!({"content": [{"type": "tool_result", "tool_result": {
            "content": [{"json": {"text": "", "sql": "SELECT 1"}}]
        }}]})
        .to_string();
        let with_rows = json!({"content": [{"type": "tool_result", "tool_result": {
            "content": [{"json": {"result_set": {"data": [["a"], ["b"], ["c"]]}}}]
        }}]})
        .to_string();

        let messages = reduce_for_request(&[with_text, with_sql, with_rows]);
        assert_eq!(messages[0].content[0].text, "42 rows matched");
        assert_eq!(messages[1].content[0].text, "Tool result SQL: SELECT 1");
        assert_eq!(messages[2].content[0].text, "Tool result contained 3 rows.");
    }

    #[test]
    fn thinking_and_tool_use_are_never_replayed() {
        let raw = json!({"content": [
            {"type": "thinking", "thinking": {"text": "private reasoning"}},
            {"type": "tool_use", "tool_use": {"name": "data_to_answer"}},
            {"type": "text", "text": "public answer"}
        ]})
        .to_string();
        let messages = reduce_for_request(&[raw]);
        assert_eq!(messages[0].content.len(), 1);
        assert_eq!(messages[0].content[0].text, "public answer");
    }

    #[test]
    fn empty_turn_still_produces_a_message() {
        let raw = json!({"content": [
            {"type": "thinking", "thinking": {"text": "nothing visible"}}
        ]})
        .to_string();
        let messages = reduce_for_request(&[raw]);
        assert_eq!(messages[0].content, vec![MessageContent::text("")]);
    }

    #[test]
    fn request_body_ends_with_the_user_question() {
        let body = build_request_body("What changed?", &[turn_with_text("prior answer")]);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "assistant");
        let last = body.messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content[0].text, "What changed?");

        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(
            encoded["messages"][1]["content"][0],
            json!({"type": "text", "text": "What changed?"})
        );
    }
}
