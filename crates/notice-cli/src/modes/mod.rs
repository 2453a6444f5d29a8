//! Runtime execution modes.
//!
//! - `exec`: Non-interactive streaming mode (stdout/stderr)

pub mod exec;
