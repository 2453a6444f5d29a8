//! Per-submission stream state machine.
//!
//! ```text
//! Idle --start--> Streaming --finish--> Done
//!                     |
//!                     +------fail-----> Failed
//! ```
//!
//! `reasoning` and `final_text` are never mutated directly: they are derived
//! from `raw` after every append.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::split::{Segments, split_reasoning};

/// Lifecycle of one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    #[default]
    Idle,
    Streaming,
    Done,
    Failed,
}

impl StreamStatus {
    /// Returns true once no further fragments will be accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamStatus::Done | StreamStatus::Failed)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Idle => write!(f, "idle"),
            StreamStatus::Streaming => write!(f, "streaming"),
            StreamStatus::Done => write!(f, "done"),
            StreamStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Accumulated text of one in-flight submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    raw: String,
    segments: Segments,
    status: StreamStatus,
    error: Option<String>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fragment received so far, in arrival order.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text of all closed reasoning regions.
    pub fn reasoning(&self) -> &str {
        &self.segments.reasoning
    }

    /// `raw` without closed reasoning regions, trimmed.
    pub fn final_text(&self) -> &str {
        &self.segments.final_text
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    /// Failure message when the status is `Failed`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Discards all text and returns to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Resets the state and starts streaming.
    pub fn start(&mut self) {
        self.reset();
        self.status = StreamStatus::Streaming;
    }

    /// Appends a fragment and re-derives both segments from the full buffer.
    ///
    /// Fragments are ignored unless the state is `Streaming`.
    pub fn append(&mut self, fragment: &str) -> &Self {
        if self.status != StreamStatus::Streaming {
            tracing::debug!(status = %self.status, "dropping fragment outside of streaming");
            return self;
        }

        self.raw.push_str(fragment);
        self.segments = split_reasoning(&self.raw);
        self
    }

    /// Marks the stream as exhausted. Returns false if not streaming.
    pub fn finish(&mut self) -> bool {
        if self.status != StreamStatus::Streaming {
            return false;
        }
        self.status = StreamStatus::Done;
        true
    }

    /// Marks the stream as failed. Returns false if not streaming.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status != StreamStatus::Streaming {
            return false;
        }
        self.status = StreamStatus::Failed;
        self.error = Some(message.into());
        true
    }
}
