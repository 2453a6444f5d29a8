//! Flattens provider events into the text fragment stream the accumulator
//! consumes.
//!
//! Reasoning deltas are wrapped in `<think>`/`</think>` so that reasoning
//! returned in a dedicated field and reasoning inlined in the content are
//! split the same way downstream.

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::providers::{ProviderError, ProviderResult, ProviderStream, StreamEvent};
use crate::stream::split::{THINK_END, THINK_START};

/// Ordered text fragments of one completion.
pub type FragmentStream = BoxStream<'static, ProviderResult<String>>;

/// Converts a provider event stream into a fragment stream.
///
/// The fragment stream ends after the first error.
pub fn fragment_stream(events: ProviderStream) -> FragmentStream {
    stream::unfold(FragmentAdapter::new(events), |mut adapter| async move {
        let fragment = adapter.next_fragment().await?;
        Some((fragment, adapter))
    })
    .boxed()
}

struct FragmentAdapter {
    events: ProviderStream,
    in_reasoning: bool,
    finished: bool,
}

impl FragmentAdapter {
    fn new(events: ProviderStream) -> Self {
        Self {
            events,
            in_reasoning: false,
            finished: false,
        }
    }

    async fn next_fragment(&mut self) -> Option<ProviderResult<String>> {
        if self.finished {
            return None;
        }

        loop {
            match self.events.next().await {
                Some(Ok(StreamEvent::ReasoningDelta { reasoning })) => {
                    if reasoning.is_empty() {
                        continue;
                    }
                    if self.in_reasoning {
                        return Some(Ok(reasoning));
                    }
                    self.in_reasoning = true;
                    return Some(Ok(format!("{THINK_START}{reasoning}")));
                }
                Some(Ok(StreamEvent::TextDelta { text })) => {
                    if text.is_empty() {
                        continue;
                    }
                    if !self.in_reasoning {
                        return Some(Ok(text));
                    }
                    self.in_reasoning = false;
                    return Some(Ok(format!("{THINK_END}{text}")));
                }
                Some(Ok(StreamEvent::MessageDelta { stop_reason, usage })) => {
                    tracing::debug!(?stop_reason, ?usage, "completion finished");
                }
                Some(Ok(StreamEvent::Error {
                    error_type,
                    message,
                })) => {
                    self.finished = true;
                    return Some(Err(ProviderError::api_error(&error_type, &message)));
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                Some(Ok(StreamEvent::MessageCompleted)) | None => {
                    self.finished = true;
                    if self.in_reasoning {
                        self.in_reasoning = false;
                        return Some(Ok(THINK_END.to_string()));
                    }
                    return None;
                }
            }
        }
    }
}
