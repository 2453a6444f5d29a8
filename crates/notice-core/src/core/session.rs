//! One display surface fed by at most one live fragment stream.
//!
//! Each submission's fragment stream is pumped by its own task. Updates are
//! tagged with the submission's [`Generation`] and sent over a single channel,
//! so updates from a superseded submission can be recognized and dropped.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::providers::{FragmentStream, ProviderError};
use crate::stream::split::has_open_region;
use crate::stream::{Accumulator, DisplayContent, Generation, StreamState};

/// A single message from a pump task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Fragment(String),
    Finished,
    Failed(ProviderError),
}

type UpdateTx = mpsc::UnboundedSender<(Generation, StreamUpdate)>;
type UpdateRx = mpsc::UnboundedReceiver<(Generation, StreamUpdate)>;

/// Owns the accumulator and the pump task of the active submission.
pub struct Session {
    accumulator: Accumulator,
    tx: UpdateTx,
    rx: UpdateRx,
    pump: Option<JoinHandle<()>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            accumulator: Accumulator::new(),
            tx,
            rx,
            pump: None,
        }
    }

    /// Starts a submission fed by `fragments`.
    ///
    /// Any previous submission is superseded: its pump is aborted and
    /// updates it already queued are dropped when they are received.
    pub fn submit(&mut self, fragments: FragmentStream) -> Generation {
        self.abort_pump();
        let generation = self.accumulator.begin();
        tracing::info!(%generation, "submission started");
        self.pump = Some(spawn_pump(generation, fragments, self.tx.clone()));
        generation
    }

    /// Waits for the next update of the active submission and applies it.
    ///
    /// Returns `None` when no submission is in flight.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        loop {
            self.accumulator.active_generation()?;
            let (generation, update) = self.rx.recv().await?;
            if self.apply(generation, &update) {
                return Some(update);
            }
        }
    }

    /// Stops the active submission and marks it failed with `reason`.
    pub fn cancel(&mut self, reason: &str) {
        self.abort_pump();
        if let Some(generation) = self.accumulator.active_generation() {
            tracing::info!(%generation, reason, "submission cancelled");
            self.accumulator.fail(generation, reason);
        }
    }

    pub fn state(&self) -> &StreamState {
        self.accumulator.state()
    }

    pub fn display(&self) -> DisplayContent {
        self.accumulator.display()
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Applies `update` to the accumulator. Returns false for stale updates.
    fn apply(&mut self, generation: Generation, update: &StreamUpdate) -> bool {
        match update {
            StreamUpdate::Fragment(fragment) => {
                self.accumulator.append(generation, fragment).is_some()
            }
            StreamUpdate::Finished => {
                let applied = self.accumulator.finish(generation);
                if applied {
                    let state = self.accumulator.state();
                    if has_open_region(state.raw()) {
                        tracing::debug!(%generation, "stream ended inside an open think region");
                    }
                    tracing::info!(
                        %generation,
                        raw_len = state.raw().len(),
                        final_len = state.final_text().len(),
                        "submission finished"
                    );
                }
                applied
            }
            StreamUpdate::Failed(err) => {
                let applied = self.accumulator.fail(generation, err.to_string());
                if applied {
                    tracing::warn!(%generation, kind = %err.kind, error = %err, "submission failed");
                }
                applied
            }
        }
    }

    fn abort_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort_pump();
    }
}

/// Forwards every fragment of `fragments`, then exactly one terminal update.
fn spawn_pump(
    generation: Generation,
    mut fragments: FragmentStream,
    tx: UpdateTx,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut count: usize = 0;
        while let Some(item) = fragments.next().await {
            let update = match item {
                Ok(fragment) => {
                    count += 1;
                    StreamUpdate::Fragment(fragment)
                }
                Err(err) => {
                    let _ = tx.send((generation, StreamUpdate::Failed(err)));
                    return;
                }
            };
            if tx.send((generation, update)).is_err() {
                return;
            }
        }
        tracing::debug!(%generation, fragments = count, "fragment stream exhausted");
        let _ = tx.send((generation, StreamUpdate::Finished));
    })
}
