//! Streaming response processing.
//!
//! - `split`: `<think>` region extraction
//! - `state`: per-submission state machine
//! - `generation`: latest-only submission ids
//! - `accumulator`: ties the three together for one display surface

mod accumulator;
mod generation;
pub mod split;
mod state;

pub use accumulator::{Accumulator, DisplayContent, WAITING_PLACEHOLDER};
pub use generation::{Generation, GenerationTracker};
pub use split::{Segments, split_reasoning};
pub use state::{StreamState, StreamStatus};
