//! Ordered rewrite rules applied by [`render`](super::render).
//!
//! Each rule rewrites the output of the previous one. The order is part of the
//! contract:
//! - bold runs before italic, so `**x**` is never read as two italic markers;
//! - headings are checked longest prefix first;
//! - inline bold runs before the numbered-line rules, so a bolded list entry
//!   reaches the numbered-bold rule as `1. <strong>x</strong>`;
//! - the numbered-bold rule runs before the plain numbered rule.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Bare title token expected on the first line.
pub const TITLE_TOKEN: &str = "通知";
/// Both substrings must appear on the second line for the subtitle rule.
pub const SUBTITLE_TOKENS: [&str; 2] = ["关于", "通知"];

const TITLE_BLOCK: &str = r#"<div style="text-align: center; font-weight: bold; font-size: 24px; color: red; text-decoration: underline; margin-bottom: 10px;">通知</div>"#;
const SUBTITLE_OPEN: &str = r#"<div style="text-align: center; font-weight: bold; margin: 15px 0;">"#;

static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*(.*?)\*\*"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| compile(r"\*(.*?)\*"));
static HEADING_3: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^### (.*)$"));
static HEADING_2: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^## (.*)$"));
static HEADING_1: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^# (.*)$"));
static NUMBERED_BOLD: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^(\d+\.)[ \t]*<strong>(.*?)</strong>(.*)$"));
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^(\d+\.)[ \t]*(.*)$"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid render pattern {pattern}: {err}"))
}

/// A single rewrite step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// First line equal to `通知` (ignoring surrounding whitespace) becomes the
    /// red, underlined, centered title block.
    Title,
    /// Second line containing both `关于` and `通知` is wrapped in a centered
    /// bold block; its text is kept unchanged.
    Subtitle,
    /// `**x**` becomes `<strong>x</strong>`. Shortest match, never across lines.
    Bold,
    /// `*x*` becomes `<em>x</em>`.
    Italic,
    /// `# `, `## ` and `### ` at line start become `<h1>`..`<h3>`.
    Headings,
    /// `1. <strong>x</strong>rest` becomes a block with number and `x` in one
    /// bold span, followed by `rest`. Only the number and the heading are
    /// bold; `rest` stays outside the span.
    NumberedBold,
    /// `1. rest` becomes a block with a bold number followed by `rest`.
    Numbered,
}

/// Rules in application order.
pub const PIPELINE: [Rule; 7] = [
    Rule::Title,
    Rule::Subtitle,
    Rule::Bold,
    Rule::Italic,
    Rule::Headings,
    Rule::NumberedBold,
    Rule::Numbered,
];

impl Rule {
    /// Positional rules only apply to a finished answer segment.
    pub fn is_positional(self) -> bool {
        matches!(self, Rule::Title | Rule::Subtitle)
    }

    /// Applies this rule to `text`. Text the rule does not match is returned
    /// borrowed and unchanged.
    pub fn apply(self, text: &str) -> Cow<'_, str> {
        match self {
            Rule::Title => rewrite_line(text, 0, |line| {
                (line.trim() == TITLE_TOKEN).then(|| TITLE_BLOCK.to_string())
            }),
            Rule::Subtitle => rewrite_line(text, 1, |line| {
                SUBTITLE_TOKENS
                    .iter()
                    .all(|token| line.contains(token))
                    .then(|| format!("{SUBTITLE_OPEN}{line}</div>"))
            }),
            Rule::Bold => BOLD.replace_all(text, "<strong>${1}</strong>"),
            Rule::Italic => ITALIC.replace_all(text, "<em>${1}</em>"),
            Rule::Headings => {
                let text = HEADING_3.replace_all(text, "<h3>${1}</h3>");
                let text = replace_owned(&HEADING_2, text, "<h2>${1}</h2>");
                replace_owned(&HEADING_1, text, "<h1>${1}</h1>")
            }
            Rule::NumberedBold => NUMBERED_BOLD.replace_all(
                text,
                r#"<div style="margin: 10px 0;"><strong>${1} ${2}</strong>${3}</div>"#,
            ),
            Rule::Numbered => NUMBERED.replace_all(
                text,
                r#"<div style="margin: 5px 0;"><strong>${1}</strong> ${2}</div>"#,
            ),
        }
    }
}

/// Runs `re` over a possibly already rewritten text, keeping the borrow when
/// nothing has matched so far.
fn replace_owned<'a>(re: &Regex, text: Cow<'a, str>, replacement: &str) -> Cow<'a, str> {
    match text {
        Cow::Borrowed(borrowed) => re.replace_all(borrowed, replacement),
        Cow::Owned(owned) => Cow::Owned(re.replace_all(&owned, replacement).into_owned()),
    }
}

/// Replaces line `index` (split on `\n`) when `rewrite` returns a new line.
fn rewrite_line(
    text: &str,
    index: usize,
    rewrite: impl FnOnce(&str) -> Option<String>,
) -> Cow<'_, str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    let Some(&line) = lines.get(index) else {
        return Cow::Borrowed(text);
    };
    let Some(replacement) = rewrite(line) else {
        return Cow::Borrowed(text);
    };
    lines[index] = &replacement;
    Cow::Owned(lines.join("\n"))
}
