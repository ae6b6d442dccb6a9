//! Conversation sessions
//!
//! [`ConversationService`] is the entry point used by the outside world: it
//! opens conversations, streams turns from a [`ConversationGraph`] and records
//! them in a [`HistoryStore`](crate::history::HistoryStore).

pub mod clock;
pub mod graph;
pub mod questions;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use graph::{ConversationGraph, GraphInput, GraphStream};
pub use questions::{parse_questions, InitialQuestionsHandler, ModelQuestionsHandler};
pub use service::{
    ChunkStream, ConversationService, ConversationServiceBuilder, Session, TurnState,
};
