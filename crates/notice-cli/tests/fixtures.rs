//! SSE fixture helpers for integration tests.

#![allow(dead_code)]

use wiremock::ResponseTemplate;

// Load fixture templates at compile time
pub const SSE_CONTENT: &str = include_str!("fixtures/sse_content_response.sse");
pub const SSE_REASONING: &str = include_str!("fixtures/sse_reasoning_response.sse");
pub const SSE_ERROR: &str = include_str!("fixtures/sse_error_response.sse");

/// Create a content-only SSE response.
pub fn content_sse(text: &str) -> String {
    SSE_CONTENT.replace("{{TEXT}}", &escape_json(text))
}

/// Create an SSE response with `reasoning_content` deltas before the answer.
pub fn reasoning_sse(reasoning: &str, text: &str) -> String {
    SSE_REASONING
        .replace("{{REASONING}}", &escape_json(reasoning))
        .replace("{{TEXT}}", &escape_json(text))
}

/// Create an SSE response that fails mid-stream.
pub fn error_sse(text: &str, message: &str) -> String {
    SSE_ERROR
        .replace("{{TEXT}}", &escape_json(text))
        .replace("{{MESSAGE}}", &escape_json(message))
}

/// Wrap SSE body string in a ResponseTemplate.
pub fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

/// Convenience: content SSE wrapped in ResponseTemplate.
pub fn content_response(text: &str) -> ResponseTemplate {
    sse_response(&content_sse(text))
}

/// Escape special characters for JSON string embedding.
fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_sse_substitution() {
        let result = content_sse("通知\n\"引号\"");
        assert!(result.contains(r#""content":"通知\n\"引号\"""#));
        assert!(result.contains("data: [DONE]"));
    }

    #[test]
    fn test_reasoning_sse_substitution() {
        let result = reasoning_sse("思考", "正文");
        assert!(result.contains(r#""reasoning_content":"思考""#));
        assert!(result.contains(r#""content":"正文""#));
    }
}
