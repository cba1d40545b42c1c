//! Wire protocol layer
//!
//! Decoding of completed agent responses and per-event SSE payloads

pub mod envelope;
pub mod wire;

pub use envelope::*;
pub use wire::*;
