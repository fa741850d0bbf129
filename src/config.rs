use std::time::Duration;

/// Settings for a single worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub name: String,
    /// Address the task API binds to.
    pub address: String,
    pub port: u16,
    /// Pause between two runs of the task loop.
    pub poll_interval: Duration,
    /// Pause between two statistics samples.
    pub stats_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "worker-1".to_string(),
            address: "127.0.0.1".to_string(),
            port: 5555,
            poll_interval: Duration::from_secs(5),
            stats_interval: Duration::from_secs(15),
        }
    }
}

impl WorkerConfig {
    pub fn new(name: &str, address: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            port,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}
