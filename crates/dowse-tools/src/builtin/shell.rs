// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::tool::{Tool, ToolError, ToolInput};

/// Hard byte ceiling for combined stdout + stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 20_000;

/// Number of lines kept from each end of oversized output.
const HEAD_LINES: usize = 100;
const TAIL_LINES: usize = 100;

/// Built-in tool that runs a shell command.
///
/// Accepts either the bare command as text input, or a keyed input with
/// `command` and optional `workdir`.
pub struct ShellTool {
    pub timeout_secs: u64,
}

impl Default for ShellTool {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a non-interactive bash one-liner and return its stdout and stderr. \
         Input is the command line."
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        let command = input
            .get_str("command", "command")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::invalid_input(self.name(), "expected a shell command"))?;
        let workdir = input.get_str("workdir", "command");

        debug!(cmd = %command, "executing shell tool");

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command);
        // No controlling terminal input; kill the child if the future is
        // dropped on timeout or run cancellation.
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        if let Some(wd) = workdir {
            cmd.current_dir(wd);
        }

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| ToolError::Timeout { tool: self.name().into(), secs: self.timeout_secs })?
            .map_err(|e| ToolError::execution(self.name(), format!("spawn error: {e}")))?;

        let mut content = String::new();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            content.push_str(&head_tail_truncate(&stdout));
        }
        if !stderr.is_empty() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str("[stderr]\n");
            content.push_str(&head_tail_truncate(&stderr));
        }

        match output.status.code().unwrap_or(-1) {
            0 if content.is_empty() => Ok("[exit 0]".into()),
            0 => Ok(content),
            // Exit code 1 is the Unix convention for "no matches" (grep) and
            // "condition false" (test); report it without failing the tool.
            1 => Ok(format!("[exit 1]\n{content}").trim_end().to_string()),
            code => Err(ToolError::execution(self.name(), format!("[exit {code}]\n{content}"))),
        }
    }
}

/// Truncate `s` to fit within `OUTPUT_LIMIT_BYTES`, keeping the first
/// `HEAD_LINES` and last `TAIL_LINES` with an omission marker in between.
pub(crate) fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }

    let lines: Vec<&str> = s.lines().collect();
    let total = lines.len();

    if total <= HEAD_LINES + TAIL_LINES {
        // Few but very long lines: fall back to a character window at each end.
        let half = OUTPUT_LIMIT_BYTES / 2;
        let head: String = s.chars().take(half).collect();
        let tail: String = {
            let rev: Vec<char> = s.chars().rev().take(half).collect();
            rev.into_iter().rev().collect()
        };
        let omitted = s.len().saturating_sub(head.len() + tail.len());
        return format!("{head}\n...[{omitted} bytes omitted]...\n{tail}");
    }

    let head = lines[..HEAD_LINES].join("\n");
    let tail = lines[total - TAIL_LINES..].join("\n");
    let omitted_lines = total - HEAD_LINES - TAIL_LINES;
    let omitted_bytes = s.len().saturating_sub(head.len() + tail.len());

    format!("{head}\n...[{omitted_lines} lines / ~{omitted_bytes} bytes omitted]...\n{tail}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn keyed(v: serde_json::Value) -> ToolInput {
        serde_json::from_value(v).unwrap()
    }

    // ── Successful execution ──────────────────────────────────────────────────

    #[tokio::test]
    async fn executes_echo_and_returns_stdout() {
        let out = ShellTool::default().run(&ToolInput::from("echo hello")).await.unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn stdout_and_stderr_both_captured() {
        let out = ShellTool::default()
            .run(&ToolInput::from("echo out && echo err >&2"))
            .await
            .unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("[stderr]\nerr"));
    }

    #[tokio::test]
    async fn keyed_input_with_workdir() {
        let out = ShellTool::default()
            .run(&keyed(json!({"command": "pwd", "workdir": "/tmp"})))
            .await
            .unwrap();
        assert!(out.contains("tmp"));
    }

    // ── Failure cases ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn exit_1_is_not_error_but_includes_code() {
        let out = ShellTool::default().run(&ToolInput::from("exit 1")).await.unwrap();
        assert!(out.contains("[exit 1]"));
    }

    #[tokio::test]
    async fn exit_2_is_error() {
        let err = ShellTool::default().run(&ToolInput::from("exit 2")).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
        assert!(err.to_string().contains("[exit 2]"));
    }

    #[tokio::test]
    async fn empty_command_is_invalid_input() {
        let err = ShellTool::default().run(&ToolInput::from("   ")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn timeout_returns_error() {
        let err = ShellTool { timeout_secs: 1 }
            .run(&ToolInput::from("sleep 30"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { secs: 1, .. }));
    }

    // ── Head+tail truncation ──────────────────────────────────────────────────

    #[test]
    fn short_output_passes_through_unchanged() {
        let s = "hello\nworld\n";
        assert_eq!(head_tail_truncate(s), s);
    }

    #[test]
    fn head_and_tail_are_both_preserved() {
        let mut lines: Vec<String> = vec!["BUILD START".to_string()];
        for i in 0..800 {
            lines.push(format!("middle line {i} padding padding padding padding padding"));
        }
        lines.push("BUILD ERROR".to_string());
        let content = lines.join("\n");

        let result = head_tail_truncate(&content);
        assert!(result.contains("BUILD START"));
        assert!(result.contains("BUILD ERROR"));
        assert!(result.contains("omitted"));
        assert!(result.len() < content.len());
    }

    #[test]
    fn long_lines_fall_back_to_char_window() {
        let content = "é".repeat(30_000);
        let result = head_tail_truncate(&content);
        assert!(result.contains("bytes omitted"));
    }
}
