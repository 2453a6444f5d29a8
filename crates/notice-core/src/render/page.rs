//! Standalone HTML page for a submission.
//!
//! The page is rewritten while the stream is running; until the submission
//! ends it carries a refresh hint and a progress line.

use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};

use crate::stream::Accumulator;

/// Page heading and document title.
pub const PAGE_HEADING: &str = "铁路通知生成器";
/// Progress line shown until the submission ends.
pub const IN_PROGRESS_LABEL: &str = "生成中...";

const PAGE_TEMPLATE_NAME: &str = "notice_page.html";
const PAGE_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/notice_page.html"
));

/// Renders the page for the accumulator's current state.
///
/// Reasoning and error text are HTML-escaped; the answer markup is inserted
/// as-is.
///
/// # Errors
/// Returns an error if the embedded template fails to render.
pub fn render_page(accumulator: &Accumulator, error: Option<&str>) -> Result<String> {
    let mut env = Environment::new();
    env.add_template(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)
        .context("load page template")?;

    let state = accumulator.state();
    let content = accumulator.display().into_string();
    let reasoning = (!state.reasoning().is_empty()).then(|| state.reasoning().to_string());
    let in_progress = (!state.status().is_terminal()).then_some(IN_PROGRESS_LABEL);

    env.get_template(PAGE_TEMPLATE_NAME)
        .context("get page template")?
        .render(context! {
            heading => PAGE_HEADING,
            reasoning => reasoning,
            error => error,
            in_progress => in_progress,
            content => Value::from_safe_string(content),
        })
        .context("render page template")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_contains_markup_and_escaped_reasoning() {
        let mut acc = Accumulator::new();
        let generation = acc.begin();
        acc.append(generation, "<think>a < b & c</think>**重要**内容");
        acc.finish(generation);

        let page = render_page(&acc, None).unwrap();
        assert!(page.contains("<title>铁路通知生成器</title>"));
        assert!(page.contains("<summary>思考过程</summary>"));
        assert!(page.contains("a &lt; b &amp; c"));
        assert!(page.contains("<strong>重要</strong>内容"));
        assert!(!page.contains("class=\"error\""));
        assert!(!page.contains(IN_PROGRESS_LABEL));
        assert!(!page.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn test_page_marks_running_submission() {
        let mut acc = Accumulator::new();
        let generation = acc.begin();
        acc.append(generation, "通知\n1. **加强值班值守**。");

        let page = render_page(&acc, None).unwrap();
        assert!(page.contains(IN_PROGRESS_LABEL));
        assert!(page.contains("http-equiv=\"refresh\""));
        assert!(page.contains("<strong>1. 加强值班值守</strong>"));
    }

    #[test]
    fn test_page_without_reasoning_omits_details() {
        let mut acc = Accumulator::new();
        let generation = acc.begin();
        acc.append(generation, "正文");

        let page = render_page(&acc, None).unwrap();
        assert!(!page.contains("<details>"));
        assert!(page.contains("正文"));
    }

    #[test]
    fn test_page_shows_error_and_placeholder() {
        let mut acc = Accumulator::new();
        let generation = acc.begin();
        acc.fail(generation, "HTTP 500");

        let page = render_page(&acc, Some("❌ 出现错误")).unwrap();
        assert!(page.contains("❌ 出现错误"));
        assert!(page.contains("等待生成..."));
    }
}
