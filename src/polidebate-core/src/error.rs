//! Error types for the debate and categorization system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolidebateError {
    /// Network, timeout or non-2xx failure talking to the completion endpoint.
    #[error("Completion transport error: {0}")]
    Transport(String),

    /// The model response was not valid JSON after fence stripping.
    #[error("Failed to decode model response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The decoded JSON had the wrong type or arity.
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("News API error: {0}")]
    News(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<async_openai::error::OpenAIError> for PolidebateError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        PolidebateError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for PolidebateError {
    fn from(err: reqwest::Error) -> Self {
        PolidebateError::News(err.to_string())
    }
}
