//! Transport seam
//!
//! The controller consumes an injected event-stream capability; the
//! production implementation pairs reqwest with eventsource-stream. Tests
//! inject channel-backed fakes.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use log::debug;
use reqwest::header;
use thiserror::Error;

use crate::credentials::Credentials;
use crate::history::RequestBody;

const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
const TOKEN_TYPE_VALUE: &str = "PROGRAMMATIC_ACCESS_TOKEN";

/// One item of an open turn stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Connection established
    Open,
    /// A named SSE event with its data payload
    Message { event: String, data: String },
    /// Server closed the stream
    Closed,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("agent run returned HTTP {status}")]
    Status { status: u16 },
    #[error("event stream error: {0}")]
    Stream(String),
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// A fully built streaming request. URL construction happens at the
/// controller, where failure is fatal to the turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub url: reqwest::Url,
    pub token: String,
    pub body: RequestBody,
}

#[async_trait]
pub trait AgentTransport: Send + Sync + 'static {
    /// Open the streaming run endpoint and return its event stream.
    async fn open_turn(&self, request: TurnRequest) -> Result<EventStream, TransportError>;

    /// Single-shot probe of the agent describe endpoint, reduced to a
    /// human-readable status string.
    async fn check_connection(&self, credentials: &Credentials) -> String;
}

/// Production transport: HTTPS + SSE.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn open_turn(&self, request: TurnRequest) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .post(request.url)
            .header(header::ACCEPT, "text/event-stream")
            .header(TOKEN_TYPE_HEADER, TOKEN_TYPE_VALUE)
            .bearer_auth(&request.token)
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }
        debug!("agent stream opened with HTTP {}", status.as_u16());

        let events = response.bytes_stream().eventsource().map(|item| match item {
            Ok(event) => Ok(StreamEvent::Message {
                event: event.event,
                data: event.data,
            }),
            Err(err) => Err(TransportError::Stream(err.to_string())),
        });

        let stream = futures::stream::once(async { Ok(StreamEvent::Open) })
            .chain(events)
            .chain(futures::stream::once(async { Ok(StreamEvent::Closed) }));
        Ok(stream.boxed())
    }

    async fn check_connection(&self, credentials: &Credentials) -> String {
        let Ok(url) = credentials.agent_url() else {
            return "No agent found".to_string();
        };

        let response = self
            .client
            .get(url)
            .header(TOKEN_TYPE_HEADER, TOKEN_TYPE_VALUE)
            .bearer_auth(&credentials.token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await;

        match response {
            Ok(response) => connection_status(response.status().as_u16()),
            Err(err) => {
                debug!("connectivity check failed: {err}");
                "Connection Unsuccessful".to_string()
            }
        }
    }
}

fn connection_status(code: u16) -> String {
    if code == 200 {
        "Connection Successful".to_string()
    } else {
        format!("Connection Unsuccessful: {code}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_carry_the_code_when_known() {
        assert_eq!(connection_status(200), "Connection Successful");
        assert_eq!(connection_status(401), "Connection Unsuccessful: 401");
        assert_eq!(connection_status(503), "Connection Unsuccessful: 503");
    }
}
