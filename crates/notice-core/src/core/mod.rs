//! Core runtime: submission session and interrupt handling.
//!
//! - `session`: pumps fragment streams into the accumulator, latest-only
//! - `interrupt`: Ctrl+C handling

pub mod interrupt;
pub mod session;

pub use session::{Session, StreamUpdate};
