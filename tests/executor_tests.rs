use lrts::scheduler::JobState;
use lrts::worker::JobExecutor;
use tokio::sync::mpsc;
use uuid::Uuid;

#[tokio::test]
async fn test_execute_simple_command() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor.execute(job_id, "echo hello", None).await;

    assert_eq!(result.job_id, job_id);
    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.output, Some("hello\n".to_string()));
    assert_eq!(result.exit_code, Some(0));
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_execute_empty_output() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor.execute(job_id, "true", None).await;

    assert_eq!(result.state, JobState::Completed);
    assert!(result.output.is_none()); // Empty output should be None
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_execute_large_output() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor.execute(job_id, "seq 1 1000", None).await;

    assert_eq!(result.state, JobState::Completed);
    let output = result.output.unwrap();
    assert_eq!(output.lines().count(), 1000);
}

#[tokio::test]
async fn test_execute_command_failure() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor.execute(job_id, "exit 1", None).await;

    assert_eq!(result.state, JobState::Failed);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_execute_command_with_stderr() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor
        .execute(job_id, "echo 'error message' >&2 && exit 1", None)
        .await;

    assert_eq!(result.state, JobState::Failed);
    assert!(result.error.unwrap().contains("error message"));
}

#[tokio::test]
async fn test_execute_nonexistent_command() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor
        .execute(job_id, "definitely_not_a_real_command_xyz", None)
        .await;

    // The shell itself runs fine and exits non-zero.
    assert_eq!(result.state, JobState::Failed);
    assert!(result.exit_code.is_some());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_stdout_and_stderr_are_kept_separate() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    let result = executor
        .execute(job_id, "echo out; echo err >&2; exit 1", None)
        .await;

    assert_eq!(result.state, JobState::Failed);
    assert_eq!(result.output, Some("out\n".to_string()));
    assert!(result.error.unwrap().contains("err"));
}

#[tokio::test]
async fn test_stdout_lines_stream_to_progress_channel() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(16);

    let result = executor
        .execute(job_id, "echo one; echo two; echo three", Some(tx))
        .await;

    assert_eq!(result.state, JobState::Completed);

    // The sender is dropped once execution finished, so the channel drains.
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_execution_without_progress_channel() {
    let executor = JobExecutor::new();
    let job_id = Uuid::new_v4();

    // No progress channel attached; output is still collected.
    let result = executor.execute(job_id, "echo quiet", None).await;

    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.output, Some("quiet\n".to_string()));
}
