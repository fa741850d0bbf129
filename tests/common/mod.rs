#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use r_cube_worker::{
    tasks::{
        docker::ContainerRuntime,
        error::RuntimeError,
        types::{Action, Config, DockerResult, State, Task},
    },
    worker::types::Worker,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopOutcome {
    #[default]
    Ok,
    NotFound,
    RemoveFails,
}

/// In-memory stand-in for the container engine.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub fail_run: AtomicBool,
    pub stop_outcome: Mutex<StopOutcome>,
    pub started: Mutex<Vec<Config>>,
    pub stopped: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl FakeRuntime {
    pub fn failing() -> Self {
        let runtime = FakeRuntime::default();
        runtime.fail_run.store(true, Ordering::SeqCst);
        runtime
    }

    pub fn set_stop_outcome(&self, outcome: StopOutcome) {
        *self.stop_outcome.lock().unwrap() = outcome;
    }

    pub fn started_images(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|config| config.image.clone())
            .collect()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message: message.to_string(),
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run(&self, config: &Config) -> Result<DockerResult, RuntimeError> {
        self.started.lock().unwrap().push(config.clone());

        if self.fail_run.load(Ordering::SeqCst) {
            return Err(RuntimeError::docker(
                Action::Pull,
                &config.image,
                server_error(404, "pull access denied"),
            ));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(DockerResult::success(&format!("container-{n}"), Action::Start))
    }

    async fn stop(&self, container_id: &str) -> Result<DockerResult, RuntimeError> {
        self.stopped.lock().unwrap().push(container_id.to_string());

        let outcome = *self.stop_outcome.lock().unwrap();
        match outcome {
            StopOutcome::Ok => Ok(DockerResult::success(container_id, Action::Stop)),
            StopOutcome::NotFound => Err(RuntimeError::NotFound(container_id.to_string())),
            StopOutcome::RemoveFails => Err(RuntimeError::docker(
                Action::Remove,
                container_id,
                server_error(409, "removal of container is already in progress"),
            )),
        }
    }
}

pub fn test_worker(runtime: Arc<FakeRuntime>) -> Arc<Worker> {
    Arc::new(Worker::new("test-worker", runtime))
}

pub fn scheduled_task(name: &str) -> Task {
    Task::new(name, "strm/helloworld-http", State::Scheduled)
}
