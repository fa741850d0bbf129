use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Accepted but not yet placed on a worker.
    #[default]
    Pending,
    /// A worker has been chosen and the task is on its way there.
    Scheduled,
    /// The task's container has been started.
    Running,
    /// The container was stopped and removed.
    Completed,
    /// The container could not be started.
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Pending => "Pending",
            State::Scheduled => "Scheduled",
            State::Running => "Running",
            State::Completed => "Completed",
            State::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// A unit of work realised as a single container.
///
/// Fields missing from an incoming payload take their zero value; unknown
/// fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Task {
    pub id: Uuid,
    pub container_id: Option<String>,
    pub name: String,
    pub state: State,
    pub image: String,
    /// Fraction of a CPU core, e.g. `0.5`.
    pub cpu: f64,
    /// Memory ceiling in bytes.
    pub memory: u64,
    /// Disk requirement in bytes.
    pub disk: u64,
    /// Container ports in `port/proto` form, e.g. `80/tcp`.
    pub exposed_ports: BTreeSet<String>,
    /// Container port (`port/proto`) to host port.
    pub port_bindings: HashMap<String, String>,
    pub restart_policy: String,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(name: &str, image: &str, state: State) -> Self {
        Task {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image: image.to_string(),
            state,
            ..Default::default()
        }
    }
}

/// A client request to move `task` into `state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Event {
    pub id: Uuid,
    pub state: State,
    pub timestamp: DateTime<Utc>,
    pub task: Task,
}

/// Container settings derived from a [`Task`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub name: String,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub exposed_ports: BTreeSet<String>,
    pub port_bindings: HashMap<String, String>,
    pub cmd: Vec<String>,
    pub image: String,
    pub cpu: f64,
    pub memory: i64,
    pub disk: i64,
    pub env: Vec<String>,
    /// One of `""`, `no`, `always`, `unless-stopped`, `on-failure`.
    pub restart_policy: String,
}

impl Config {
    /// CPU share in the runtime's nano-CPU unit.
    pub fn nano_cpus(&self) -> i64 {
        (self.cpu * 1_000_000_000.0) as i64
    }
}

impl From<&Task> for Config {
    fn from(task: &Task) -> Self {
        Config {
            name: task.name.clone(),
            exposed_ports: task.exposed_ports.clone(),
            port_bindings: task.port_bindings.clone(),
            image: task.image.clone(),
            cpu: task.cpu,
            memory: i64::try_from(task.memory).unwrap_or(i64::MAX),
            disk: i64::try_from(task.disk).unwrap_or(i64::MAX),
            env: task.env.clone(),
            restart_policy: task.restart_policy.clone(),
            ..Default::default()
        }
    }
}

/// Runtime step a [`DockerResult`] or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pull,
    Create,
    Start,
    Inspect,
    Stop,
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Pull => "pull",
            Action::Create => "create",
            Action::Start => "start",
            Action::Inspect => "inspect",
            Action::Stop => "stop",
            Action::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful runtime operation on behalf of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerResult {
    pub action: Action,
    pub container_id: Option<String>,
    pub result: String,
}

impl DockerResult {
    pub fn success(container_id: &str, action: Action) -> Self {
        DockerResult {
            action,
            container_id: Some(container_id.to_string()),
            result: "success".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_copies_task_resources() {
        let mut task = Task::new("web", "strm/helloworld-http", State::Scheduled);
        task.cpu = 0.25;
        task.memory = 64 * 1024 * 1024;
        task.restart_policy = "always".to_string();
        task.env = vec!["PORT=80".to_string()];
        task.exposed_ports.insert("80/tcp".to_string());

        let config = Config::from(&task);

        assert_eq!(config.name, "web");
        assert_eq!(config.image, "strm/helloworld-http");
        assert_eq!(config.memory, 64 * 1024 * 1024);
        assert_eq!(config.restart_policy, "always");
        assert_eq!(config.env, vec!["PORT=80".to_string()]);
        assert!(config.exposed_ports.contains("80/tcp"));
        assert_eq!(config.nano_cpus(), 250_000_000);
    }

    #[test]
    fn oversized_memory_saturates() {
        let mut task = Task::default();
        task.memory = u64::MAX;
        assert_eq!(Config::from(&task).memory, i64::MAX);
    }

    #[test]
    fn event_rejects_unknown_fields() {
        let body = r#"{"id":"6f1c0b4e-3a53-4a55-9a8e-0c9d6f1b2a10","state":"Scheduled","bogus":1}"#;
        assert!(serde_json::from_str::<Event>(body).is_err());
    }

    #[test]
    fn event_fills_missing_task_fields() {
        let body = r#"{
            "state": "Scheduled",
            "timestamp": "2024-01-01T00:00:00Z",
            "task": {"name": "hello", "image": "strm/helloworld-http", "state": "Scheduled"}
        }"#;
        let event: Event = serde_json::from_str(body).unwrap();
        assert_eq!(event.task.state, State::Scheduled);
        assert_eq!(event.task.image, "strm/helloworld-http");
        assert!(event.task.container_id.is_none());
        assert!(event.task.port_bindings.is_empty());
    }
}
