//! Completion provider and fragment stream plumbing.

pub mod fragments;
pub mod openai;
pub mod shared;

pub use fragments::{FragmentStream, fragment_stream};
pub use shared::{
    ProviderError, ProviderErrorKind, ProviderResult, ProviderStream, StreamEvent, USER_AGENT,
    Usage, resolve_api_key, resolve_base_url,
};

/// Fixed user-facing message shown when a submission fails in transport.
pub const TRANSPORT_ERROR_MESSAGE: &str = "❌ 出现错误，请检查 API 地址或网络连接";
