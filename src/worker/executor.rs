use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::scheduler::JobState;

/// Result of one job execution.
#[derive(Debug)]
pub struct ExecutionResult {
    pub job_id: Uuid,
    pub state: JobState,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Executes job commands via the shell.
///
/// Stdout is read line by line so each line can be surfaced as a
/// progress event while the job runs; stderr and the exit status are
/// captured for the terminal report. A failure to even spawn the shell
/// is reported as a failed job, never a worker crash.
#[derive(Debug, Clone, Default)]
pub struct JobExecutor;

impl JobExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `sh -c <command>` to completion.
    ///
    /// Each stdout line is sent to `progress` as it appears; the channel
    /// being closed or full-on-drop is fine, progress is advisory.
    pub async fn execute(
        &self,
        job_id: Uuid,
        command: &str,
        progress: Option<mpsc::Sender<String>>,
    ) -> ExecutionResult {
        tracing::info!(job_id = %job_id, command, "Executing job");

        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to spawn job");
                return ExecutionResult {
                    job_id,
                    state: JobState::Failed,
                    exit_code: None,
                    output: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(tx) = &progress {
                        let _ = tx.send(line.clone()).await;
                    }
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut collected).await;
            }
            collected
        });

        let status = child.wait().await;
        let stdout_text = stdout_task.await.unwrap_or_default();
        let stderr_text = stderr_task.await.unwrap_or_default();

        match status {
            Ok(status) => {
                let exit_code = status.code();
                let (state, error) = if status.success() {
                    (JobState::Completed, None)
                } else {
                    (
                        JobState::Failed,
                        Some(if stderr_text.is_empty() {
                            format!("Exit code: {:?}", exit_code)
                        } else {
                            stderr_text.clone()
                        }),
                    )
                };

                tracing::info!(
                    job_id = %job_id,
                    state = %state,
                    exit_code = ?exit_code,
                    "Job finished"
                );

                ExecutionResult {
                    job_id,
                    state,
                    exit_code,
                    output: if stdout_text.is_empty() {
                        None
                    } else {
                        Some(stdout_text)
                    },
                    error,
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job execution failed");
                ExecutionResult {
                    job_id,
                    state: JobState::Failed,
                    exit_code: None,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
