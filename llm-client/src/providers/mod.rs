//! Backend client implementations

pub mod anthropic;
pub mod openai_compatible;
mod sse;

pub use anthropic::AnthropicClient;
pub use openai_compatible::OpenAiCompatibleClient;
