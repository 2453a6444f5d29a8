//! Streamed stdout/stderr rendering for `notice generate`.
//!
//! # Output contract
//! - raw fragments → stderr while streaming (unless quiet)
//! - rendered notice markup → stdout once the stream ends
//! - with `--html`, a page re-rendered after every fragment and once at the end
//! - reasoning → stderr under a `思考过程` header (with `--show-reasoning`)
//! - interruption and error details → stderr

use std::fs;
use std::io::{Stderr, Stdout, Write, stderr, stdout};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use futures_util::stream;
use notice_core::core::interrupt::{self, InterruptedError};
use notice_core::core::{Session, StreamUpdate};
use notice_core::prompts::NoticePrompt;
use notice_core::providers::openai::ChatCompletionsClient;
use notice_core::providers::{
    FragmentStream, ProviderError, TRANSPORT_ERROR_MESSAGE, fragment_stream,
};
use notice_core::render::page::render_page;
use notice_core::stream::StreamStatus;

const REASONING_HEADER: &str = "思考过程：";

/// Options for exec execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub show_reasoning: bool,
    pub quiet: bool,
    /// Keep a standalone HTML page here, refreshed as fragments arrive.
    pub html: Option<PathBuf>,
}

/// Sends the prompt and streams the notice to the terminal.
///
/// # Errors
/// Returns the fixed transport error message (with the provider message as
/// detail) when the request or stream fails, and `InterruptedError` on Ctrl+C.
pub async fn run_generate(
    client: &ChatCompletionsClient,
    prompt: &NoticePrompt,
    user: &str,
    options: &ExecOptions,
) -> Result<()> {
    interrupt::reset();

    let fragments = match client.send_stream(prompt, user).await {
        Ok(events) => fragment_stream(events),
        // A failed request fails the submission like a mid-stream error.
        Err(err) => match err.downcast::<ProviderError>() {
            Ok(provider_err) => stream::once(async move { Err(provider_err) }).boxed(),
            Err(other) => return Err(other),
        },
    };

    drive(fragments, options, ExecRenderer::new(options)).await
}

/// Pumps `fragments` through a session until it ends or Ctrl+C is pressed.
async fn drive<O: Write, E: Write>(
    fragments: FragmentStream,
    options: &ExecOptions,
    mut renderer: ExecRenderer<O, E>,
) -> Result<()> {
    let mut session = Session::new();
    session.submit(fragments);

    loop {
        tokio::select! {
            update = session.next_update() => {
                let Some(update) = update else { break };
                renderer.handle_update(&update, &session);
                if let (StreamUpdate::Fragment(_), Some(path)) = (&update, &options.html) {
                    write_html(path, &session, None)?;
                }
            }
            () = interrupt::wait_for_interrupt() => {
                session.cancel("Interrupted");
                renderer.interrupted();
                return Err(InterruptedError.into());
            }
        }
    }

    let state = session.state();
    let failed = state.status() == StreamStatus::Failed;

    if let Some(path) = &options.html {
        let error = failed.then_some(TRANSPORT_ERROR_MESSAGE);
        write_html(path, &session, error)?;
        tracing::info!(path = %path.display(), "HTML page written");
    }

    if failed {
        let detail = state.error().unwrap_or("unknown error").to_string();
        return Err(anyhow::anyhow!(detail).context(TRANSPORT_ERROR_MESSAGE));
    }
    Ok(())
}

/// Renders the page for the current state and swaps it in with a rename.
fn write_html(path: &Path, session: &Session, error: Option<&str>) -> Result<()> {
    let page = render_page(session.accumulator(), error)?;

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    fs::write(&tmp_path, page)
        .with_context(|| format!("write HTML page to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!("rename {} to {}", tmp_path.display(), path.display())
    })?;
    tracing::debug!(path = %path.display(), status = %session.state().status(), "HTML page refreshed");
    Ok(())
}

/// CLI renderer that writes stream updates to stdout/stderr.
pub struct ExecRenderer<O = Stdout, E = Stderr> {
    stdout: O,
    stderr: E,
    show_reasoning: bool,
    quiet: bool,
    /// Whether live fragment output on stderr still needs a trailing newline.
    needs_live_newline: bool,
}

impl ExecRenderer {
    pub fn new(options: &ExecOptions) -> Self {
        Self::with_writers(stdout(), stderr(), options)
    }
}

impl<O: Write, E: Write> ExecRenderer<O, E> {
    pub fn with_writers(stdout: O, stderr: E, options: &ExecOptions) -> Self {
        Self {
            stdout,
            stderr,
            show_reasoning: options.show_reasoning,
            quiet: options.quiet,
            needs_live_newline: false,
        }
    }

    /// Handles a single applied update.
    pub fn handle_update(&mut self, update: &StreamUpdate, session: &Session) {
        match update {
            StreamUpdate::Fragment(text) => {
                if !self.quiet && !text.is_empty() {
                    let _ = write!(self.stderr, "{text}");
                    let _ = self.stderr.flush();
                    self.needs_live_newline = true;
                }
            }
            StreamUpdate::Finished => {
                self.end_live_output();

                let state = session.state();
                if self.show_reasoning && !state.reasoning().is_empty() {
                    let _ = writeln!(self.stderr, "{REASONING_HEADER}");
                    let _ = writeln!(self.stderr, "{}", state.reasoning());
                    let _ = self.stderr.flush();
                }

                let _ = writeln!(self.stdout, "{}", session.display().as_str());
                let _ = self.stdout.flush();
            }
            StreamUpdate::Failed(err) => {
                self.end_live_output();
                if let Some(details) = &err.details {
                    let _ = writeln!(self.stderr, "  Details: {details}");
                    let _ = self.stderr.flush();
                }
            }
        }
    }

    pub fn interrupted(&mut self) {
        let _ = writeln!(self.stderr, "\n^C Interrupted.");
        let _ = self.stderr.flush();
    }

    fn end_live_output(&mut self) {
        if self.needs_live_newline {
            let _ = writeln!(self.stderr);
            self.needs_live_newline = false;
        }
    }

    #[cfg(test)]
    fn into_writers(self) -> (O, E) {
        (self.stdout, self.stderr)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use notice_core::providers::ProviderResult;
    use notice_core::render::page::IN_PROGRESS_LABEL;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use super::*;

    fn fragments(items: Vec<ProviderResult<String>>) -> FragmentStream {
        stream::iter(items).boxed()
    }

    async fn render_all(
        items: Vec<ProviderResult<String>>,
        options: &ExecOptions,
    ) -> (String, String) {
        let mut session = Session::new();
        session.submit(fragments(items));
        let mut renderer = ExecRenderer::with_writers(Vec::new(), Vec::new(), options);
        while let Some(update) = session.next_update().await {
            renderer.handle_update(&update, &session);
        }
        let (out, err) = renderer.into_writers();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_final_markup_on_stdout_live_text_on_stderr() {
        let (out, err) = render_all(
            vec![Ok("**重要**".to_string()), Ok("内容".to_string())],
            &ExecOptions::default(),
        )
        .await;

        assert_eq!(out, "<strong>重要</strong>内容\n");
        assert_eq!(err, "**重要**内容\n");
    }

    #[tokio::test]
    async fn test_quiet_and_show_reasoning() {
        let options = ExecOptions {
            show_reasoning: true,
            quiet: true,
            html: None,
        };
        let (out, err) = render_all(
            vec![Ok("<think>先分析</think>".to_string()), Ok("正文".to_string())],
            &options,
        )
        .await;

        assert_eq!(out, "正文\n");
        assert_eq!(err, "思考过程：\n先分析\n");
    }

    #[tokio::test]
    async fn test_failure_prints_details() {
        let (out, err) = render_all(
            vec![Err(ProviderError::http_status(502, "Bad Gateway"))],
            &ExecOptions::default(),
        )
        .await;

        assert!(out.is_empty());
        assert_eq!(err, "  Details: Bad Gateway\n");
    }

    #[tokio::test]
    async fn test_drive_writes_html_and_reports_failure() {
        let dir = tempdir().unwrap();
        let html = dir.path().join("notice.html");
        let options = ExecOptions {
            html: Some(html.clone()),
            ..Default::default()
        };
        let renderer = ExecRenderer::with_writers(Vec::new(), Vec::new(), &options);

        let err = drive(
            fragments(vec![
                Ok("部分".to_string()),
                Err(ProviderError::timeout("Connection failed")),
            ]),
            &options,
            renderer,
        )
        .await
        .unwrap_err();

        assert_eq!(
            format!("{err:#}"),
            "❌ 出现错误，请检查 API 地址或网络连接: Connection failed"
        );
        let page = fs::read_to_string(&html).unwrap();
        assert!(page.contains(TRANSPORT_ERROR_MESSAGE));
        assert!(page.contains("部分"));
    }

    #[tokio::test]
    async fn test_drive_success_writes_page() {
        let dir = tempdir().unwrap();
        let html = dir.path().join("notice.html");
        let options = ExecOptions {
            html: Some(html.clone()),
            ..Default::default()
        };
        let renderer = ExecRenderer::with_writers(Vec::new(), Vec::new(), &options);

        drive(
            fragments(vec![Ok("通知\n关于做好应对工作的通知".to_string())]),
            &options,
            renderer,
        )
        .await
        .unwrap();

        let page = fs::read_to_string(&html).unwrap();
        assert!(page.contains("text-decoration: underline"));
        assert!(!page.contains(TRANSPORT_ERROR_MESSAGE));
    }

    /// Polls `path` until its contents satisfy `ready`.
    async fn wait_for_page(path: &Path, ready: impl Fn(&str) -> bool) -> String {
        for _ in 0..200 {
            if let Ok(page) = fs::read_to_string(path) {
                if ready(&page) {
                    return page;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("page at {} never became ready", path.display());
    }

    #[tokio::test]
    async fn test_drive_refreshes_html_while_streaming() {
        let dir = tempdir().unwrap();
        let html = dir.path().join("live.html");
        let options = ExecOptions {
            html: Some(html.clone()),
            quiet: true,
            ..Default::default()
        };
        let renderer = ExecRenderer::with_writers(Vec::new(), Vec::new(), &options);

        let (tx, rx) = mpsc::unbounded_channel::<ProviderResult<String>>();
        let fragments = stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })
        .boxed();

        let driver = tokio::spawn(async move { drive(fragments, &options, renderer).await });

        tx.send(Ok("通知\n1. **加强值班值守**。".to_string())).unwrap();
        let page = wait_for_page(&html, |page| page.contains("加强值班值守")).await;
        assert!(page.contains("<strong>1. 加强值班值守</strong>"));
        assert!(page.contains(IN_PROGRESS_LABEL));
        assert!(!driver.is_finished());

        tx.send(Ok("\n2. 做好应急物资准备。".to_string())).unwrap();
        let page = wait_for_page(&html, |page| page.contains("应急物资")).await;
        assert!(page.contains(r#"<div style="margin: 5px 0;"><strong>2.</strong> 做好应急物资准备。</div>"#));
        assert!(page.contains(IN_PROGRESS_LABEL));

        drop(tx);
        driver.await.unwrap().unwrap();

        let page = fs::read_to_string(&html).unwrap();
        assert!(!page.contains(IN_PROGRESS_LABEL));
        assert!(page.contains("<strong>1. 加强值班值守</strong>"));
        assert!(!dir.path().join("live.html.tmp").exists());
    }
}
