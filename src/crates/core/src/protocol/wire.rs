//! Per-event SSE payloads
//!
//! The stream names four events we act on; everything else is ignored.

use serde::Deserialize;

pub const EVENT_RESPONSE: &str = "response";
pub const EVENT_RESPONSE_STATUS: &str = "response.status";
pub const EVENT_THINKING_DELTA: &str = "response.thinking.delta";
pub const EVENT_RESPONSE_CHART: &str = "response.chart";

/// Data of a `response.status` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub message: String,
    pub status: String,
}

/// Data of a `response.thinking.delta` event.
///
/// `content_index` is decoded but not used for reordering; deltas are
/// appended in arrival order.
#[derive(Debug, Clone, Deserialize)]
pub struct ThinkingDeltaPayload {
    pub content_index: i64,
    pub text: String,
}
