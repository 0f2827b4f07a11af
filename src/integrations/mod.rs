//! External integrations module.
//!
//! Provides clients for:
//! - OpenAI (chat completions)

pub mod openai;

pub use openai::OpenAIClient;
