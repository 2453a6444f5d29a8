//! OpenAI-compatible provider (DeepSeek and similar endpoints).

pub mod chat_completions;

pub use chat_completions::{
    API_KEY_ENV, BASE_URL_ENV, ChatCompletionsClient, ChatCompletionsConfig, DEFAULT_BASE_URL,
};
