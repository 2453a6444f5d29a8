//! Request parameters and prompt construction.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};
use serde::{Deserialize, Serialize};

/// System prompt template (`MiniJinja`).
pub const SYSTEM_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/notice_system_prompt.md"
));

/// User prompt template (`MiniJinja`).
pub const USER_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/notice_user_prompt.md"
));

const MIN_SECTIONS: u32 = 5;
const MAX_SECTIONS: u32 = 7;
const MIN_SECTION_CHARS: u32 = 100;
const MAX_SECTION_CHARS: u32 = 350;
const MIN_TOTAL_CHARS: u32 = 1000;

/// Free-text fields collected for one submission.
///
/// Values are interpolated into the prompt verbatim; nothing is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParameters {
    /// Issuing unit (发文单位)
    pub unit: String,
    /// Event or category label, e.g. the weather type (天气类型)
    pub event: String,
    /// Start date (起始日期)
    pub start_date: String,
    /// End date (结束日期)
    pub end_date: String,
    /// Affected lines (涉及线路)
    pub scope: String,
    /// Optional attachment reference (附件)
    pub attachment: String,
    /// Requester identifier, forwarded as the API `user` field
    pub user: String,
}

impl Default for RequestParameters {
    fn default() -> Self {
        Self {
            unit: "赣州车务段".to_string(),
            event: "低温天气".to_string(),
            start_date: "2024年12月14日".to_string(),
            end_date: "2024年12月17日".to_string(),
            scope: "京九线、赣龙线、兴泉线".to_string(),
            attachment: "《低温天气蓝色预警》（2024年第87号）".to_string(),
            user: "user-001".to_string(),
        }
    }
}

/// Rendered system and user messages for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticePrompt {
    pub system: String,
    pub user: String,
}

/// Builds the system and user prompts for `params`.
///
/// # Errors
/// Returns an error if a template fails to render.
pub fn build_prompt(params: &RequestParameters) -> Result<NoticePrompt> {
    let system = render_prompt_template("system_prompt", SYSTEM_PROMPT_TEMPLATE, params)
        .context("render system prompt")?;
    let user = render_prompt_template("user_prompt", USER_PROMPT_TEMPLATE, params)
        .context("render user prompt")?;
    Ok(NoticePrompt { system, user })
}

fn render_prompt_template(
    name: &str,
    template: &str,
    params: &RequestParameters,
) -> std::result::Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template(name, template)?;

    let output = env.get_template(name)?.render(context! {
        unit => &params.unit,
        event => &params.event,
        start_date => &params.start_date,
        end_date => &params.end_date,
        scope => &params.scope,
        attachment => params.attachment.trim(),
        min_sections => MIN_SECTIONS,
        max_sections => MAX_SECTIONS,
        min_section_chars => MIN_SECTION_CHARS,
        max_section_chars => MAX_SECTION_CHARS,
        min_total_chars => MIN_TOTAL_CHARS,
    })?;

    Ok(output.replace("\r\n", "\n").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_interpolates_fields() {
        let prompt = build_prompt(&RequestParameters::default()).unwrap();

        assert!(prompt.system.contains("[赣州车务段]关于积极做好[低温天气]应对工作的通知"));
        assert!(prompt.system.contains("机关各科室、段属各站所："));
        assert!(prompt.system.contains("最少5段，最多7段"));
        assert!(prompt.system.contains("每段100-350字"));
        assert!(prompt.system.contains("全文必须超过1000字"));
        assert!(prompt.system.contains("附件：《低温天气蓝色预警》（2024年第87号）"));
        assert!(prompt.system.contains("- 涉及线路：京九线、赣龙线、兴泉线"));
    }

    #[test]
    fn test_empty_attachment_omits_attachment_line() {
        let params = RequestParameters {
            attachment: "  ".to_string(),
            ..Default::default()
        };
        let prompt = build_prompt(&params).unwrap();
        assert!(!prompt.system.contains("附件："));
        assert!(prompt.user.ends_with("附件信息："));
    }

    #[test]
    fn test_user_prompt_lists_fields() {
        let params = RequestParameters {
            unit: "南昌车务段".to_string(),
            event: "强降雨".to_string(),
            ..Default::default()
        };
        let prompt = build_prompt(&params).unwrap();

        assert!(prompt.user.starts_with("请根据以下参数生成铁路运输恶劣天气应对通知："));
        assert!(prompt.user.contains("发文单位：南昌车务段"));
        assert!(prompt.user.contains("天气类型：强降雨"));
        assert!(!prompt.user.contains("user-001"));
    }

    #[test]
    fn test_fields_are_interpolated_verbatim() {
        let params = RequestParameters {
            unit: "{{ not a template }}".to_string(),
            ..Default::default()
        };
        let prompt = build_prompt(&params).unwrap();
        assert!(prompt.user.contains("发文单位：{{ not a template }}"));
    }
}
