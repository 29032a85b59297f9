use std::time::Duration;

use chrono::Utc;
use lrts::scheduler::{Job, JobQueue, JobState, WorkerRegistry};
use uuid::Uuid;

#[test]
fn test_job_creation() {
    let job = Job::new("echo hello".to_string());
    assert_eq!(job.state, JobState::Submitted);
    assert_eq!(job.command, "echo hello");
    assert!(job.assigned_worker.is_none());
    assert_eq!(job.attempts, 0);
}

#[test]
fn test_queue_submit_and_get() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;

    assert!(queue.submit(job));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.get(&id).unwrap().command, "echo 1");
}

#[test]
fn test_queue_rejects_when_full() {
    let mut queue = JobQueue::with_capacity(2);
    assert!(queue.submit(Job::new("echo 1".to_string())));
    assert!(queue.submit(Job::new("echo 2".to_string())));
    assert!(queue.is_full());
    assert!(!queue.submit(Job::new("echo 3".to_string())));
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_submitted_fifo_order() {
    let mut queue = JobQueue::new();
    let mut ids = Vec::new();
    for i in 0..5 {
        let job = Job::new(format!("echo {}", i));
        ids.push(job.id);
        queue.submit(job);
        std::thread::sleep(Duration::from_millis(2));
    }

    let fifo: Vec<Uuid> = queue.submitted_fifo().iter().map(|j| j.id).collect();
    assert_eq!(fifo, ids);
}

#[test]
fn test_assign_only_from_submitted() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);

    assert!(queue.assign(&id, "worker-a"));
    let job = queue.get(&id).unwrap();
    assert_eq!(job.state, JobState::Assigned);
    assert_eq!(job.assigned_worker.as_deref(), Some("worker-a"));
    assert_eq!(job.attempts, 1);

    // Already assigned: a second dispatch attempt must be refused.
    assert!(!queue.assign(&id, "worker-b"));
    assert_eq!(
        queue.get(&id).unwrap().assigned_worker.as_deref(),
        Some("worker-a")
    );
}

#[test]
fn test_mark_running_requires_assigned() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);

    assert!(!queue.mark_running(&id, "worker-a"));

    queue.assign(&id, "worker-a");
    // Only the assignee's acknowledgement moves the job to Running.
    assert!(!queue.mark_running(&id, "worker-b"));
    assert!(queue.mark_running(&id, "worker-a"));
    assert_eq!(queue.get(&id).unwrap().state, JobState::Running);
}

#[test]
fn test_revert_returns_in_flight_job_to_queue() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);
    queue.assign(&id, "worker-a");
    queue.mark_running(&id, "worker-a");

    assert!(queue.revert_to_submitted(&id, "worker-a"));
    let job = queue.get(&id).unwrap();
    assert_eq!(job.state, JobState::Submitted);
    assert!(job.assigned_worker.is_none());
    assert_eq!(job.attempts, 1);

    // Reassignment bumps the attempt counter.
    assert!(queue.assign(&id, "worker-b"));
    assert_eq!(queue.get(&id).unwrap().attempts, 2);
}

#[test]
fn test_revert_refuses_terminal_job() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);
    queue.assign(&id, "worker-a");
    queue.complete(
        &id,
        "worker-a",
        JobState::Completed,
        Some(0),
        Some("out".into()),
        None,
    );

    assert!(!queue.revert_to_submitted(&id, "worker-a"));
    assert_eq!(queue.get(&id).unwrap().state, JobState::Completed);
}

#[test]
fn test_stale_revert_from_lost_worker_cannot_unseat_replacement() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);

    // Assigned to worker-a, taken away by the liveness sweep, then
    // reassigned to worker-b which acknowledged the dispatch.
    queue.assign(&id, "worker-a");
    assert!(queue.revert_to_submitted(&id, "worker-a"));
    queue.assign(&id, "worker-b");
    assert!(queue.mark_running(&id, "worker-b"));

    // worker-a's dispatch outcome arrives late: it must be ignored.
    assert!(!queue.revert_to_submitted(&id, "worker-a"));
    let job = queue.get(&id).unwrap();
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.assigned_worker.as_deref(), Some("worker-b"));

    // The current assignee can still return it.
    assert!(queue.revert_to_submitted(&id, "worker-b"));
}

#[test]
fn test_complete_requires_current_assignee() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);

    queue.assign(&id, "worker-a");
    queue.revert_to_submitted(&id, "worker-a");
    queue.assign(&id, "worker-b");

    // A result from the worker the job was taken away from is ignored.
    assert!(!queue.complete(&id, "worker-a", JobState::Completed, Some(0), None, None));
    assert_eq!(queue.get(&id).unwrap().state, JobState::Assigned);

    assert!(queue.complete(&id, "worker-b", JobState::Completed, Some(0), None, None));
    assert_eq!(queue.get(&id).unwrap().state, JobState::Completed);
}

#[test]
fn test_complete_ignores_duplicate_result() {
    let mut queue = JobQueue::new();
    let job = Job::new("echo 1".to_string());
    let id = job.id;
    queue.submit(job);
    queue.assign(&id, "worker-a");

    assert!(queue.complete(
        &id,
        "worker-a",
        JobState::Completed,
        Some(0),
        Some("first".into()),
        None
    ));
    // A late duplicate from a resurfaced worker changes nothing.
    assert!(!queue.complete(
        &id,
        "worker-a",
        JobState::Failed,
        Some(1),
        None,
        Some("late".into())
    ));

    let job = queue.get(&id).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.output.as_deref(), Some("first"));
    assert!(job.completed_at.is_some());
}

#[test]
fn test_retirement_drops_old_terminal_jobs_only() {
    let mut queue = JobQueue::new();

    let done = Job::new("echo done".to_string());
    let done_id = done.id;
    queue.submit(done);
    queue.assign(&done_id, "worker-a");
    queue.complete(&done_id, "worker-a", JobState::Completed, Some(0), None, None);

    let pending = Job::new("echo pending".to_string());
    let pending_id = pending.id;
    queue.submit(pending);

    // Nothing retires inside the retention window.
    let now = Utc::now();
    assert_eq!(queue.retire_older_than(Duration::from_secs(300), now), 0);

    // Viewed from far in the future, only the terminal job retires.
    let later = now + chrono::Duration::seconds(600);
    assert_eq!(queue.retire_older_than(Duration::from_secs(300), later), 1);
    assert!(queue.get(&done_id).is_none());
    assert!(queue.get(&pending_id).is_some());
}

#[test]
fn test_register_is_idempotent() {
    let mut registry = WorkerRegistry::new();
    assert!(registry.register("w1", 4, "127.0.0.1:9001"));
    assert!(!registry.register("w1", 8, "127.0.0.1:9002"));
    assert_eq!(registry.len(), 1);

    let entry = registry.get("w1").unwrap();
    assert_eq!(entry.capacity, 8);
    assert_eq!(entry.address, "127.0.0.1:9002");
}

#[test]
fn test_reregister_preserves_in_flight_accounting() {
    let mut registry = WorkerRegistry::new();
    registry.register("w1", 2, "127.0.0.1:9001");
    let job = Uuid::new_v4();
    assert!(registry.charge("w1", job));

    registry.register("w1", 2, "127.0.0.1:9001");
    assert_eq!(registry.get("w1").unwrap().running_jobs.len(), 1);
}

#[test]
fn test_heartbeat_unknown_worker() {
    let mut registry = WorkerRegistry::new();
    assert!(!registry.heartbeat("ghost"));

    registry.register("w1", 1, "127.0.0.1:9001");
    assert!(registry.heartbeat("w1"));
}

#[test]
fn test_charge_respects_capacity_bound() {
    let mut registry = WorkerRegistry::new();
    registry.register("w1", 2, "127.0.0.1:9001");

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    assert!(registry.charge("w1", a));
    assert!(registry.charge("w1", b));
    assert!(!registry.charge("w1", c));

    registry.release("w1", &a);
    assert!(registry.charge("w1", c));
}

#[test]
fn test_pick_worker_prefers_least_loaded() {
    let mut registry = WorkerRegistry::new();
    registry.register("busy", 4, "127.0.0.1:9001");
    registry.register("idle", 4, "127.0.0.1:9002");
    registry.charge("busy", Uuid::new_v4());
    registry.charge("busy", Uuid::new_v4());

    let (picked, addr) = registry.pick_worker(Duration::from_secs(5)).unwrap();
    assert_eq!(picked, "idle");
    assert_eq!(addr, "127.0.0.1:9002");
}

#[test]
fn test_pick_worker_skips_saturated_workers() {
    let mut registry = WorkerRegistry::new();
    registry.register("w1", 1, "127.0.0.1:9001");
    registry.charge("w1", Uuid::new_v4());

    assert!(registry.pick_worker(Duration::from_secs(5)).is_none());
}

#[test]
fn test_expire_dead_returns_in_flight_jobs() {
    let mut registry = WorkerRegistry::new();
    registry.register("w1", 2, "127.0.0.1:9001");
    let job = Uuid::new_v4();
    registry.charge("w1", job);

    std::thread::sleep(Duration::from_millis(30));
    let lost = registry.expire_dead(Duration::from_millis(10));

    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].0, "w1");
    assert_eq!(lost[0].1, vec![job]);
    assert!(registry.is_empty());
}

#[test]
fn test_expire_dead_keeps_fresh_workers() {
    let mut registry = WorkerRegistry::new();
    registry.register("w1", 2, "127.0.0.1:9001");

    let lost = registry.expire_dead(Duration::from_secs(5));
    assert!(lost.is_empty());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_remove_returns_jobs_for_graceful_disconnect() {
    let mut registry = WorkerRegistry::new();
    registry.register("w1", 2, "127.0.0.1:9001");
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    registry.charge("w1", a);
    registry.charge("w1", b);

    let mut jobs = registry.remove("w1");
    jobs.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(jobs, expected);
    assert!(registry.is_empty());

    assert!(registry.remove("w1").is_empty());
}
