//! OpenAI-compatible adapters for the generative and embedding collaborators.

pub mod agents;
pub mod chat;
pub mod embeddings;
pub mod error;
pub mod http;
pub mod prompts;

pub use agents::{OpenAiBundleGenerator, OpenAiCritic, OpenAiRefiner, DEFAULT_MAX_REPAIRS};
pub use chat::{ChatMessage, OpenAiChatClient};
pub use embeddings::OpenAiEmbeddingProvider;
pub use error::OpenAiApiError;
pub use http::{OpenAiClientConfig, OpenAiHttp};
