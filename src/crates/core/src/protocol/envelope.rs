//! Response envelope decoding
//!
//! A completed turn arrives as one `response` event whose data is a JSON
//! envelope with a heterogeneous `content` array. Elements dispatch on their
//! `type` discriminator; anything unrecognized degrades to [`ContentBlock::Unknown`]
//! so a single malformed element never invalidates the whole envelope.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Sentinel shown when a turn produced no final text.
pub const NO_DATA: &str = "No data";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("no JSON object found in response payload")]
    MissingJsonObject,
    #[error("failed to decode response envelope: {0}")]
    TopLevelDecode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub content: Vec<ContentBlock>,
    pub metadata: Option<Metadata>,
    pub role: Option<String>,
    pub schema_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub tokens_consumed: Option<Vec<TokenConsumption>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConsumption {
    pub context_window: Option<u64>,
    pub input_tokens: Option<TokenDetail>,
    pub model_name: Option<String>,
    pub output_tokens: Option<TokenOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenDetail {
    pub cache_read: Option<u64>,
    pub cache_write: Option<u64>,
    pub total: Option<u64>,
    pub uncached: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenOutput {
    pub total: Option<u64>,
}

/// One element of the envelope's `content` array.
///
/// Known tags decode into their named variant; an unknown tag, or a shape
/// mismatch under a known tag, falls back to `Unknown` carrying the original
/// field map.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Thinking(ThinkingBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
    Text(TextBlock),
    Unknown(Map<String, Value>),
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(de::Error::custom(format!(
                    "content element is not an object: {other}"
                )))
            }
        };

        let tag = map.get("type").and_then(Value::as_str).unwrap_or_default();
        let decoded = match tag {
            "thinking" => serde_json::from_value(Value::Object(map.clone()))
                .map(ContentBlock::Thinking)
                .ok(),
            "tool_use" => serde_json::from_value(Value::Object(map.clone()))
                .map(ContentBlock::ToolUse)
                .ok(),
            "tool_result" => serde_json::from_value(Value::Object(map.clone()))
                .map(ContentBlock::ToolResult)
                .ok(),
            "text" => serde_json::from_value(Value::Object(map.clone()))
                .map(ContentBlock::Text)
                .ok(),
            _ => None,
        };

        Ok(decoded.unwrap_or(ContentBlock::Unknown(map)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThinkingBlock {
    pub thinking: ThinkingText,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThinkingText {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolUseBlock {
    pub tool_use: ToolUseDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolUseDetail {
    pub client_side_execute: Option<bool>,
    pub input: Option<ToolInput>,
    pub name: Option<String>,
    pub tool_use_id: Option<String>,
    #[serde(rename = "type")]
    pub tool_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolInput {
    pub has_time_column: Option<bool>,
    pub need_future_forecasting_data: Option<bool>,
    pub original_query: Option<String>,
    pub previous_related_tool_result_id: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolResultBlock {
    pub tool_result: ToolResultDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolResultDetail {
    pub content: Option<Vec<ToolContentUnit>>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub tool_use_id: Option<String>,
    #[serde(rename = "type")]
    pub result_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolContentUnit {
    pub json: Option<ToolJsonPayload>,
    #[serde(rename = "type")]
    pub unit_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolJsonPayload {
    pub query_id: Option<String>,
    pub result_set: Option<ResultSet>,
    #[serde(rename = "statementHandle")]
    pub statement_handle: Option<String>,
    pub sql: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    pub data: Option<Vec<Vec<String>>>,
    #[serde(rename = "resultSetMetaData")]
    pub metadata: Option<ResultSetMetaData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSetMetaData {
    pub format: Option<String>,
    #[serde(rename = "numRows")]
    pub num_rows: Option<i64>,
    pub partition: Option<i64>,
    #[serde(rename = "rowType")]
    pub row_type: Option<Vec<ColumnType>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnType {
    pub length: Option<i64>,
    pub name: Option<String>,
    pub nullable: Option<bool>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    #[serde(rename = "type")]
    pub column_type: Option<String>,
}

/// Decode a raw turn payload into an [`Envelope`].
///
/// Stream payloads may carry protocol framing ahead of the JSON body, so
/// decoding starts at the first `{`.
pub fn decode_envelope(raw: &str) -> Result<Envelope, EnvelopeError> {
    let start = raw.find('{').ok_or(EnvelopeError::MissingJsonObject)?;
    Ok(serde_json::from_str(&raw[start..])?)
}

/// The text of the last `Text` block, or [`NO_DATA`] if the envelope has none.
/// Thinking and tool blocks never contribute to the final answer.
pub fn extract_final_text(envelope: &Envelope) -> String {
    envelope
        .content
        .iter()
        .rev()
        .find_map(|block| match block {
            ContentBlock::Text(text) => Some(text.text.clone()),
            _ => None,
        })
        .unwrap_or_else(|| NO_DATA.to_string())
}

/// Decode a raw turn and extract its final text in one step.
/// A malformed envelope yields the [`NO_DATA`] sentinel rather than an error.
pub fn parse_final_text(raw: &str) -> String {
    match decode_envelope(raw) {
        Ok(envelope) => extract_final_text(&envelope),
        Err(err) => {
            log::debug!("response envelope did not decode: {err}");
            NO_DATA.to_string()
        }
    }
}
