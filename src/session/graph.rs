//! The graph seam driven by the conversation service

use futures::stream::BoxStream;
use std::sync::Arc;

use crate::cluster::ClusterClient;
use crate::core::{Result, UserMessage};

/// Incremental graph output, in production order
pub type GraphStream = BoxStream<'static, Result<String>>;

/// Everything one graph run is seeded with
#[derive(Clone)]
pub struct GraphInput {
    pub session_id: String,
    pub message: UserMessage,
    pub client: Arc<dyn ClusterClient>,
}

/// Something that turns a user request into a stream of output chunks
pub trait ConversationGraph: Send + Sync {
    /// Start a run. The run makes progress only while the stream is polled and
    /// is aborted when the stream is dropped.
    fn stream(&self, input: GraphInput) -> GraphStream;
}
