//! Generation-aware accumulator driving the stream state machine.

use super::generation::{Generation, GenerationTracker};
use super::split::THINK_START;
use super::state::{StreamState, StreamStatus};
use crate::render::{RenderedMarkup, render};

/// Placeholder shown before any answer text has arrived.
pub const WAITING_PLACEHOLDER: &str = "等待生成...";

/// What the display surface should show for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayContent {
    /// Rendered answer (final segment, or live raw text before any reasoning).
    Markup(RenderedMarkup),
    /// Nothing to show yet.
    Waiting,
}

impl DisplayContent {
    /// Returns the displayable text, falling back to the placeholder.
    pub fn as_str(&self) -> &str {
        match self {
            DisplayContent::Markup(markup) => markup.as_str(),
            DisplayContent::Waiting => WAITING_PLACEHOLDER,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            DisplayContent::Markup(markup) => markup.into_string(),
            DisplayContent::Waiting => WAITING_PLACEHOLDER.to_string(),
        }
    }
}

/// Owns the state of the active submission and drops stale updates.
#[derive(Debug, Default)]
pub struct Accumulator {
    tracker: GenerationTracker,
    state: StreamState,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new submission, discarding all previous state.
    pub fn begin(&mut self) -> Generation {
        let generation = self.tracker.begin();
        self.state.start();
        tracing::debug!(%generation, "submission started");
        generation
    }

    /// Appends a fragment for `generation`.
    ///
    /// Returns `None` when `generation` has been superseded; the fragment is
    /// dropped without touching the current state.
    pub fn append(&mut self, generation: Generation, fragment: &str) -> Option<&StreamState> {
        if !self.tracker.is_active(generation) {
            tracing::debug!(%generation, len = fragment.len(), "dropping stale fragment");
            return None;
        }
        Some(self.state.append(fragment))
    }

    /// Marks the stream of `generation` as exhausted.
    pub fn finish(&mut self, generation: Generation) -> bool {
        self.tracker.finish_if_active(generation) && self.state.finish()
    }

    /// Marks the stream of `generation` as failed.
    pub fn fail(&mut self, generation: Generation, message: impl Into<String>) -> bool {
        self.tracker.finish_if_active(generation) && self.state.fail(message)
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn active_generation(&self) -> Option<Generation> {
        self.tracker.active()
    }

    /// Chooses what to render for the current state.
    ///
    /// The final segment wins once it has text. Before that, raw text is shown
    /// live only while streaming and only if no opening marker has arrived;
    /// a region with blank inner text still counts as reasoning.
    pub fn display(&self) -> DisplayContent {
        let state = &self.state;
        if !state.final_text().is_empty() {
            DisplayContent::Markup(render(state.final_text(), true))
        } else if state.status() == StreamStatus::Streaming
            && !state.raw().is_empty()
            && !state.raw().contains(THINK_START)
        {
            DisplayContent::Markup(render(state.raw(), false))
        } else {
            DisplayContent::Waiting
        }
    }
}
