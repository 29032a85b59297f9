use std::net::SocketAddr;
use std::time::Duration;

use crate::capacity::CapacityMode;

/// Configuration for the scheduler role.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub listen_addr: SocketAddr,
    /// Bound on any single inter-role exchange; also the heartbeat
    /// staleness threshold after which a worker is considered dead.
    pub timeout: Duration,
    /// How often the assignment pass runs when no event triggers it.
    pub assign_interval: Duration,
    /// How long terminal jobs are kept before retirement.
    pub retention: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070"
                .parse()
                .expect("default listen address is valid"),
            timeout: Duration::from_secs(5),
            assign_interval: Duration::from_millis(100),
            retention: Duration::from_secs(300),
        }
    }
}

impl SchedulerConfig {
    pub fn new(listen_addr: SocketAddr, timeout_secs: u64) -> Self {
        Self {
            listen_addr,
            timeout: Duration::from_secs(timeout_secs),
            ..Default::default()
        }
    }
}

/// Configuration for the worker role.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Unique identifier this worker registers under.
    pub worker_id: String,
    /// Address the worker binds its own job-dispatch service on.
    /// Port 0 picks an ephemeral port; the bound address is what gets
    /// advertised to the scheduler.
    pub listen_addr: SocketAddr,
    pub scheduler_addr: SocketAddr,
    pub progress_addr: SocketAddr,
    pub capacity_mode: CapacityMode,
    pub timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Consecutive registration timeouts tolerated before giving up.
    pub register_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            listen_addr: "127.0.0.1:0"
                .parse()
                .expect("default listen address is valid"),
            scheduler_addr: "127.0.0.1:7070"
                .parse()
                .expect("default scheduler address is valid"),
            progress_addr: "127.0.0.1:7071"
                .parse()
                .expect("default progress address is valid"),
            capacity_mode: CapacityMode::LogicalCores,
            timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(1),
            register_attempts: 5,
        }
    }
}

/// Configuration for the progress server role.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub listen_addr: SocketAddr,
    pub timeout: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7071"
                .parse()
                .expect("default listen address is valid"),
            timeout: Duration::from_secs(5),
        }
    }
}

impl ProgressConfig {
    pub fn new(listen_addr: SocketAddr, timeout_secs: u64) -> Self {
        Self {
            listen_addr,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_default() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:7070");
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.assign_interval, Duration::from_millis(100));
        assert_eq!(cfg.retention, Duration::from_secs(300));
    }

    #[test]
    fn scheduler_config_new() {
        let addr: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let cfg = SchedulerConfig::new(addr, 30);
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn worker_config_default() {
        let cfg = WorkerConfig::default();
        assert!(!cfg.worker_id.is_empty());
        assert_eq!(cfg.listen_addr.port(), 0);
        assert_eq!(cfg.capacity_mode, CapacityMode::LogicalCores);
        assert_eq!(cfg.register_attempts, 5);
    }

    #[test]
    fn worker_config_ids_are_unique() {
        let a = WorkerConfig::default();
        let b = WorkerConfig::default();
        assert_ne!(a.worker_id, b.worker_id);
    }

    #[test]
    fn progress_config_new() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        let cfg = ProgressConfig::new(addr, 10);
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }
}
