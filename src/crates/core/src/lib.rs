// AIBI Core Library - Platform-agnostic client for the conversational analytics agent
// Three-layer architecture: Protocol -> Stream -> Presentation seam

pub mod chart;
pub mod credentials;
pub mod history;
pub mod protocol;
pub mod state;
pub mod stream;

// Export main types
pub use chart::{parse_chart_spec, ChartDatum, ChartParseError, ChartSpec, MarkKind};
pub use credentials::{CredentialProvider, Credentials, InvalidEndpoint};
pub use history::{build_request_body, reduce_for_request, Message, MessageContent, RequestBody};
pub use protocol::envelope::{
    decode_envelope, extract_final_text, ContentBlock, Envelope, EnvelopeError,
};
pub use state::{StateUpdate, TurnSnapshot};

// Export streaming layer components
pub use stream::controller::StreamController;
pub use stream::transport::{
    AgentTransport, EventStream, HttpTransport, StreamEvent, TransportError, TurnRequest,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
