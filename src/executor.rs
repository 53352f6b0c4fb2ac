//! Executor boundary: turns a task into an external process invocation.
//!
//! The queue hands the executor a description, a template type, and a context
//! file list; the executor reports back the exit code and captured output.
//! `CommandExecutor` is the production implementation driving the assistant
//! CLI; tests substitute their own `Executor` impls.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::Result;
use crate::task::TemplateType;
use crate::template;

/// What the queue asks the executor to run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Task description, substituted into the prompt template.
    pub description: String,
    /// Selects the prompt template.
    pub template_type: TemplateType,
    /// Context files handed to the process, default entry first.
    pub context_files: Vec<String>,
}

/// Outcome of one external process invocation.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutcome {
    /// Whether the process exited cleanly.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// External collaborator that carries out a task.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome>;
}

/// Executor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program to invoke for each task.
    pub program: String,
    /// Extra arguments inserted before the prompt.
    pub args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "gptme".to_string(),
            args: Vec::new(),
        }
    }
}

/// Executor that invokes the assistant CLI as a child process.
///
/// The command line is `<program> [args..] <prompt> -c <ctx>...`, built as an
/// argument vector, never through a shell.
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome> {
        let prompt = template::render(request.template_type, &request.description);

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        cmd.arg(&prompt);
        for path in &request.context_files {
            cmd.arg("-c").arg(path);
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        tracing::debug!(
            program = %self.config.program,
            context_files = request.context_files.len(),
            "Invoking executor process"
        );

        let output = cmd.spawn()?.wait_with_output().await?;

        Ok(ExecutionOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Parse file markers out of executor stdout.
///
/// Lines starting with `Created file:` or `Modified file:` contribute the
/// trimmed remainder; everything else is ignored.
pub fn parse_output_markers(stdout: &str) -> Vec<String> {
    let mut files = Vec::new();
    for line in stdout.lines() {
        let rest = line
            .strip_prefix("Created file:")
            .or_else(|| line.strip_prefix("Modified file:"));
        if let Some(path) = rest {
            let path = path.trim();
            if !path.is_empty() {
                files.push(path.to_string());
            }
        }
    }
    files
}
