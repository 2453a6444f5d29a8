//! Separation of `<think>` reasoning regions from the final answer.
//!
//! Reasoning models wrap their intermediate thoughts in `<think>` / `</think>`
//! markers. The split is recomputed from the full buffer on every append, so a
//! marker that arrives across two fragments is picked up by the next scan.
//!
//! Only fully closed regions are extracted. An opening marker without a closing
//! marker stays in the final text until the closing marker arrives:
//!
//! ```text
//! "<think>plan</think>answer"  -> reasoning "plan", final "answer"
//! "<think>plan"                -> reasoning "",     final "<think>plan"
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Opening reasoning marker.
pub const THINK_START: &str = "<think>";
/// Closing reasoning marker.
pub const THINK_END: &str = "</think>";

/// Separator between consecutive reasoning regions.
const REASONING_SEPARATOR: &str = "\n\n";

static THINK_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think region regex"));

/// Result of splitting a raw buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    /// Trimmed inner text of every closed region, joined by a blank line.
    pub reasoning: String,
    /// Buffer with every closed region removed, trimmed.
    pub final_text: String,
}

/// Splits `raw` into reasoning and final segments.
///
/// Regions are matched leftmost-first and never overlap. Nested markers are not
/// tracked: the first `</think>` after an opening marker closes the region.
pub fn split_reasoning(raw: &str) -> Segments {
    let reasoning = THINK_REGION
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|inner| inner.as_str().trim())
        .collect::<Vec<_>>()
        .join(REASONING_SEPARATOR);

    let final_text = THINK_REGION.replace_all(raw, "").trim().to_string();

    Segments {
        reasoning,
        final_text,
    }
}

/// Returns true if `raw` ends inside a reasoning region that has not closed yet.
pub fn has_open_region(raw: &str) -> bool {
    let tail_start = THINK_REGION.find_iter(raw).last().map_or(0, |m| m.end());
    raw[tail_start..].contains(THINK_START)
}
