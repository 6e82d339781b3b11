//! Core data model types

pub mod openai;
pub mod provider;

pub use openai::{ChatCompletionRequest, ChatMessage, MessageContent, ModelList, ModelObject};
pub use provider::{Provider, ProviderStatus};
