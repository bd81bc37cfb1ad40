//! The default `ProcessRunner`: spawns real OS processes via
//! `tokio::process::Command`. Batteries-included, the way `FileProvenanceSink`
//! and `InMemoryWorkflowRegistry` are. A caller wanting a different backend
//! (a sandboxed shell, a remote executor) implements `ProcessRunner` itself.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use hyperagent_types::CaptureMode;

use crate::collaborators::{ProcessInvocation, ProcessOutput, ProcessRunner, StdinValue};
use crate::error::WorkflowError;

pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: ProcessInvocation) -> Result<ProcessOutput, WorkflowError> {
        let mut command = Command::new(&invocation.command);
        command.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| WorkflowError::Cli { step_key: String::new(), message: format!("failed to spawn '{}': {e}", invocation.command) })?;

        // CLI stdin must be fully written before stdout is read to
        // completion (SPEC_FULL.md §5's ordering guarantee (d)).
        let mut stdin = child.stdin.take().expect("stdin was piped at spawn");
        match invocation.stdin_value {
            Some(StdinValue::Text(text)) => write_stdin(&mut stdin, text.into_bytes(), &invocation.command).await?,
            Some(StdinValue::Bytes(bytes)) => write_stdin(&mut stdin, bytes, &invocation.command).await?,
            None => {}
        }
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| WorkflowError::Cli { step_key: String::new(), message: format!("failed waiting on '{}': {e}", invocation.command) })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let (stdout, stdout_buffer) = split_capture(&output.stdout, invocation.capture);
        let (stderr, stderr_buffer) = split_capture(&output.stderr, invocation.capture);

        Ok(ProcessOutput { stdout, stderr, stdout_buffer, stderr_buffer, exit_code })
    }
}

async fn write_stdin(stdin: &mut tokio::process::ChildStdin, bytes: Vec<u8>, command: &str) -> Result<(), WorkflowError> {
    stdin
        .write_all(&bytes)
        .await
        .map_err(|e| WorkflowError::Cli { step_key: String::new(), message: format!("failed writing stdin to '{command}': {e}") })
}

fn split_capture(bytes: &[u8], capture: CaptureMode) -> (String, Option<Vec<u8>>) {
    match capture {
        CaptureMode::Text => (String::from_utf8_lossy(bytes).into_owned(), None),
        CaptureMode::Buffer => (String::new(), Some(bytes.to_vec())),
        CaptureMode::Both => (String::from_utf8_lossy(bytes).into_owned(), Some(bytes.to_vec())),
    }
}
