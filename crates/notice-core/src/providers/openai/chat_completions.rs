//! OpenAI-compatible Chat Completions streaming client.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use eventsource_stream::{EventStream, Eventsource};
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::prompts::NoticePrompt;
use crate::providers::{
    ProviderError, ProviderErrorKind, ProviderResult, ProviderStream, StreamEvent, USER_AGENT,
    Usage, resolve_api_key, resolve_base_url,
};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const API_KEY_ENV: &str = "NOTICE_API_KEY";
pub const BASE_URL_ENV: &str = "NOTICE_BASE_URL";

/// Chat completions configuration.
#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub connect_timeout: Option<Duration>,
}

impl ChatCompletionsConfig {
    /// Builds the client config from the loaded config and environment.
    ///
    /// `model` overrides the configured model when given.
    ///
    /// # Errors
    /// Returns an error if no API key is available or the base URL is invalid.
    pub fn from_config(config: &Config, model: Option<&str>) -> Result<Self> {
        let api_key = resolve_api_key(config.provider.effective_api_key(), API_KEY_ENV)?;
        let base_url = resolve_base_url(
            config.provider.effective_base_url(),
            BASE_URL_ENV,
            DEFAULT_BASE_URL,
        )?;

        Ok(Self {
            api_key,
            base_url,
            model: model.unwrap_or(&config.model).to_string(),
            max_tokens: config.max_tokens,
            connect_timeout: config.provider.request_timeout(),
        })
    }
}

/// Chat completions client.
pub struct ChatCompletionsClient {
    config: ChatCompletionsConfig,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ChatCompletionsConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().context("build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sends the prompt and returns the stream of completion events.
    ///
    /// # Errors
    /// Returns a [`ProviderError`] (wrapped in `anyhow`) when the request
    /// fails or the endpoint answers with a non-success status.
    pub async fn send_stream(&self, prompt: &NoticePrompt, user: &str) -> Result<ProviderStream> {
        let request = ChatCompletionRequest::new(&self.config, prompt, user);

        let url = format!("{}{}", self.config.base_url, CHAT_COMPLETIONS_PATH);
        let headers = build_headers(&self.config.api_key);

        tracing::debug!(url = %url, model = %self.config.model, "sending chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body).into());
        }

        let byte_stream = response.bytes_stream();
        Ok(ChatCompletionsSseParser::new(byte_stream).boxed())
    }
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

fn classify_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::timeout(format!("Connection failed: {e}"))
    } else if e.is_request() {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Request error: {e}"))
    } else {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    stream: bool,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: String,
}

impl ChatCompletionRequest {
    fn new(config: &ChatCompletionsConfig, prompt: &NoticePrompt, user: &str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.trim().is_empty() {
            messages.push(ChatCompletionMessage {
                role: "system",
                content: prompt.system.clone(),
            });
        }
        messages.push(ChatCompletionMessage {
            role: "user",
            content: prompt.user.clone(),
        });

        let user = user.trim();
        Self {
            model: config.model.clone(),
            stream: true,
            messages,
            user: (!user.is_empty()).then(|| user.to_string()),
            max_tokens: config.max_tokens,
        }
    }
}

/// Appends a blank line when the byte stream ends so the last event is
/// flushed even if the server omitted the trailing separator.
struct SseTerminatedStream<S> {
    inner: S,
    emitted_terminator: bool,
}

impl<S> SseTerminatedStream<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            emitted_terminator: false,
        }
    }
}

impl<S, E> Stream for SseTerminatedStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
{
    type Item = std::result::Result<bytes::Bytes, E>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        if self.emitted_terminator {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
            Poll::Ready(None) => {
                self.emitted_terminator = true;
                Poll::Ready(Some(Ok(bytes::Bytes::from_static(b"\n\n"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// SSE parser for OpenAI-compatible chat completions.
pub(crate) struct ChatCompletionsSseParser<S> {
    inner: EventStream<SseTerminatedStream<S>>,
    pending: VecDeque<StreamEvent>,
    final_usage: Option<Usage>,
    final_finish_reason: Option<String>,
    emitted_done: bool,
}

impl<S> ChatCompletionsSseParser<S> {
    pub(crate) fn new<E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    {
        Self {
            inner: SseTerminatedStream::new(stream).eventsource(),
            pending: VecDeque::new(),
            final_usage: None,
            final_finish_reason: None,
            emitted_done: false,
        }
    }

    /// Queues the completion events. Runs once both `finish_reason` and usage
    /// are known, or when the stream ends (`force`).
    fn emit_completion_if_pending(&mut self, force: bool) {
        if self.emitted_done {
            return;
        }

        let reason = match &self.final_finish_reason {
            Some(r) => r.clone(),
            None if force => "stop".to_string(),
            None => return,
        };

        self.emitted_done = true;
        self.pending.push_back(StreamEvent::MessageDelta {
            stop_reason: Some(map_finish_reason(&reason)),
            usage: self.final_usage.clone(),
        });
        self.pending.push_back(StreamEvent::MessageCompleted);
    }

    fn handle_event_data(&mut self, data: &str) -> ProviderResult<()> {
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return Ok(());
        }

        let value = serde_json::from_str::<Value>(trimmed)
            .map_err(|err| ProviderError::parse(format!("Failed to parse SSE JSON: {err}")))?;
        self.handle_chunk(&value);
        Ok(())
    }

    fn handle_chunk(&mut self, value: &Value) {
        // Errors are terminal; nothing else is emitted afterwards.
        if let Some(error) = value.get("error") {
            let error_type = error
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("error")
                .to_string();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            self.pending.push_back(StreamEvent::Error {
                error_type,
                message,
            });
            self.emitted_done = true;
            return;
        }

        let first_choice = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first());

        if let Some(choice) = first_choice {
            if let Some(finish_reason) = choice.get("finish_reason").and_then(Value::as_str) {
                self.final_finish_reason = Some(finish_reason.to_string());
            }
            if let Some(delta) = choice.get("delta") {
                self.process_delta(delta);
            }
        }

        // Usage may arrive in its own chunk after finish_reason.
        if let Some(usage) = value.get("usage").filter(|usage| !usage.is_null()) {
            self.final_usage = Some(parse_usage(usage));
        }

        if self.final_finish_reason.is_some() && self.final_usage.is_some() {
            self.emit_completion_if_pending(false);
        }
    }

    fn process_delta(&mut self, delta: &Value) {
        if let Some(reasoning) = delta
            .get("reasoning_content")
            .or_else(|| delta.get("reasoning"))
            .and_then(Value::as_str)
            && !reasoning.is_empty()
        {
            self.pending.push_back(StreamEvent::ReasoningDelta {
                reasoning: reasoning.to_string(),
            });
        }

        if let Some(text) = delta.get("content").and_then(Value::as_str)
            && !text.is_empty()
        {
            self.pending.push_back(StreamEvent::TextDelta {
                text: text.to_string(),
            });
        }
    }
}

impl<S, E> Stream for ChatCompletionsSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<StreamEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if let Err(err) = self.handle_event_data(&event.data) {
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ProviderError::parse(format!(
                        "SSE stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    // Some endpoints never send finish_reason or usage.
                    self.emit_completion_if_pending(true);
                    if let Some(event) = self.pending.pop_front() {
                        return Poll::Ready(Some(Ok(event)));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn map_finish_reason(reason: &str) -> String {
    match reason {
        "length" => "max_tokens".to_string(),
        "content_filter" => "error".to_string(),
        other => other.to_string(),
    }
}

fn parse_usage(usage: &Value) -> Usage {
    let prompt_tokens = usage
        .get("prompt_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let completion_tokens = usage
        .get("completion_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    // DeepSeek reports `prompt_cache_hit_tokens`; OpenAI nests `cached_tokens`.
    let cached_tokens = usage
        .get("prompt_cache_hit_tokens")
        .and_then(Value::as_u64)
        .or_else(|| {
            usage
                .get("prompt_tokens_details")
                .and_then(|d| d.get("cached_tokens"))
                .and_then(Value::as_u64)
        })
        .unwrap_or(0);

    Usage {
        input_tokens: prompt_tokens,
        output_tokens: completion_tokens,
        cache_read_input_tokens: cached_tokens,
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    async fn collect_events(chunks: Vec<&'static str>) -> Vec<ProviderResult<StreamEvent>> {
        let byte_stream = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, std::io::Error>(bytes::Bytes::from_static(chunk.as_bytes()))),
        );
        ChatCompletionsSseParser::new(byte_stream).collect().await
    }

    fn texts(events: &[ProviderResult<StreamEvent>]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                Ok(StreamEvent::TextDelta { text }) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_parses_content_deltas() {
        let events = collect_events(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"通知\\n\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"关于\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":4}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(texts(&events), vec!["通知\n", "关于"]);
        assert!(events.contains(&Ok(StreamEvent::MessageDelta {
            stop_reason: Some("stop".to_string()),
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 4,
                cache_read_input_tokens: 0,
            }),
        })));
        assert_eq!(events.last(), Some(&Ok(StreamEvent::MessageCompleted)));
    }

    #[tokio::test]
    async fn test_parses_reasoning_content() {
        let events = collect_events(vec![
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"先想\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"正文\"}}]}\n\n",
        ])
        .await;

        assert_eq!(
            events[0],
            Ok(StreamEvent::ReasoningDelta {
                reasoning: "先想".to_string()
            })
        );
        assert_eq!(texts(&events), vec!["正文"]);
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let events = collect_events(vec![
            "data: {\"choices\":[{\"delta\":",
            "{\"content\":\"拼接\"}}]}\n",
            "\n",
        ])
        .await;
        assert_eq!(texts(&events), vec!["拼接"]);
    }

    #[tokio::test]
    async fn test_missing_trailing_separator_still_flushes() {
        let events =
            collect_events(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"尾\"}}]}"]).await;
        assert_eq!(texts(&events), vec!["尾"]);
        assert_eq!(events.last(), Some(&Ok(StreamEvent::MessageCompleted)));
    }

    #[tokio::test]
    async fn test_error_payload_is_terminal() {
        let events = collect_events(vec![
            "data: {\"error\":{\"type\":\"overloaded\",\"message\":\"busy\"}}\n\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![Ok(StreamEvent::Error {
                error_type: "overloaded".to_string(),
                message: "busy".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let events = collect_events(vec!["data: {not json}\n\n"]).await;
        let err = events[0].clone().unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Parse);
    }

    #[test]
    fn test_request_body_shape() {
        let config = ChatCompletionsConfig {
            api_key: "sk".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: None,
            connect_timeout: None,
        };
        let prompt = NoticePrompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };

        let body = serde_json::to_value(ChatCompletionRequest::new(&config, &prompt, "user-001"))
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "deepseek-chat",
                "stream": true,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "usr"}
                ],
                "user": "user-001"
            })
        );
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason("length"), "max_tokens");
        assert_eq!(map_finish_reason("stop"), "stop");
    }
}
