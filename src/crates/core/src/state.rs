//! Observable controller state
//!
//! The presentation layer consumes two things: a cloneable snapshot of the
//! controller's current state, and an ordered feed of incremental updates
//! published from the single streaming task.

use crate::chart::ChartSpec;

/// Snapshot of everything the presentation layer may render.
///
/// Turn-scoped fields (status, thinking, final answer, chart) are reset when
/// a new turn starts; the question and raw-turn histories only grow.
#[derive(Debug, Clone, Default)]
pub struct TurnSnapshot {
    /// Latest status line; latest-wins
    pub status: String,
    /// Reasoning trace; append-only within a turn
    pub thinking: String,
    /// Final answer slot, overwritten by each terminal response event
    pub final_answer: Option<String>,
    /// Chart slot; stays empty when no chart event arrived
    pub chart: Option<ChartSpec>,
    /// Questions asked so far, in order
    pub questions: Vec<String>,
    /// Verbatim raw turn payloads, append-only, arrival order
    pub history: Vec<String>,
    /// Transport-level connectivity flag
    pub connected: bool,
    /// A turn is currently in flight
    pub busy: bool,
}

/// Incremental change published over the update feed.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    TurnStarted { question: String },
    Status(String),
    ThinkingDelta(String),
    FinalAnswer(String),
    Chart(ChartSpec),
    Connected(bool),
    TurnEnded,
}
