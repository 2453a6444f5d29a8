//! Submission generations for latest-only stream updates.

use std::fmt;

/// Opaque id of one submission.
///
/// Generations increase monotonically; an update tagged with anything other
/// than the active generation is stale and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tracks the latest active generation and ignores stale ones.
#[derive(Debug, Default)]
pub struct GenerationTracker {
    next: u64,
    active: Option<Generation>,
}

impl GenerationTracker {
    /// Starts a new generation and marks it as active.
    pub fn begin(&mut self) -> Generation {
        let generation = Generation(self.next);
        self.next += 1;
        self.active = Some(generation);
        generation
    }

    /// Returns true if `generation` is still the active one.
    pub fn is_active(&self, generation: Generation) -> bool {
        self.active == Some(generation)
    }

    pub fn active(&self) -> Option<Generation> {
        self.active
    }

    /// Ends `generation` if it is still active.
    pub fn finish_if_active(&mut self, generation: Generation) -> bool {
        if self.is_active(generation) {
            self.active = None;
            true
        } else {
            false
        }
    }
}
