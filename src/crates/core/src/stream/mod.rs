//! Streaming layer
//!
//! Turn lifecycle, SSE event routing, and the injected transport seam

pub mod controller;
pub mod transport;

pub use controller::StreamController;
pub use transport::{
    AgentTransport, EventStream, HttpTransport, StreamEvent, TransportError, TurnRequest,
};
