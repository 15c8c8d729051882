//! Language-model clients.
//!
//! The repair loop only needs one capability: turn a conversation into the
//! next assistant message. [`ChatClient`] is that seam; [`OpenAiChatClient`]
//! speaks the OpenAI-compatible chat-completions protocol.

mod openai;

pub use openai::{OpenAiChatClient, OpenAiConfig};

use crate::models::Conversation;
use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain a completion.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Request to language model failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    Malformed(String),

    #[error("Language model returned an empty completion")]
    EmptyCompletion,
}

/// Produces the next assistant message for a conversation.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, conversation: &Conversation) -> Result<String, ChatError>;
}
