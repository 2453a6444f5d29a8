//! Content renderer: answer text to display markup.
//!
//! This is not a markdown parser. It runs a short, fixed list of line and
//! pattern rewrites (see [`rules`]) and passes everything else through.

pub mod page;
pub mod rules;

use std::fmt;

pub use rules::{PIPELINE, Rule};

/// Markup produced by [`render`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkup(String);

impl RenderedMarkup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RenderedMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RenderedMarkup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Renders `text` into markup.
///
/// `is_final` enables the positional title/subtitle rules, which only make
/// sense on a finished answer segment. All other rules always run. The
/// function is total: input no rule matches is returned unchanged.
pub fn render(text: &str, is_final: bool) -> RenderedMarkup {
    let mut out = text.to_string();
    for rule in PIPELINE {
        if rule.is_positional() && !is_final {
            continue;
        }
        out = rule.apply(&out).into_owned();
    }
    RenderedMarkup(out)
}
