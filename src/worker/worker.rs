use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    stats::{Stats, get_stats},
    types::{Worker, WorkerError, WorkerResult},
};
use crate::{
    node::Node,
    tasks::{
        docker::ContainerRuntime,
        state::valid_state_transition,
        types::{Config, DockerResult, State, Task},
    },
};

impl Worker {
    pub fn new(name: &str, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Worker {
            name: name.to_string(),
            queue: Mutex::new(std::collections::VecDeque::new()),
            db: RwLock::new(HashMap::new()),
            stats: RwLock::new(None),
            runtime,
        }
    }

    pub async fn add_task(&self, task: Task) {
        debug!(task_id = %task.id, state = %task.state, "Task added to queue");
        self.queue.lock().await.push_back(task);
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Processes at most one queued task.
    ///
    /// Returns `Ok(None)` when the queue was empty or the request needed no
    /// runtime action.
    pub async fn run_task(&self) -> WorkerResult<Option<DockerResult>> {
        let Some(task_queued) = self.queue.lock().await.pop_front() else {
            debug!(worker = %self.name, "No tasks in queue");
            return Ok(None);
        };

        // A new task is recorded only when it is about to be started, so an
        // unrecognised first request leaves the database untouched.
        let (persisted_state, first_sighting) = {
            let mut db = self.db.write().await;
            match db.get(&task_queued.id) {
                Some(task) => (task.state, false),
                None => {
                    if task_queued.state == State::Scheduled {
                        db.insert(task_queued.id, task_queued.clone());
                    }
                    (task_queued.state, true)
                }
            }
        };

        if !valid_state_transition(persisted_state, task_queued.state) {
            warn!(
                task_id = %task_queued.id,
                from = %persisted_state,
                to = %task_queued.state,
                "Invalid state transition"
            );
            return Err(WorkerError::InvalidTransition {
                id: task_queued.id,
                from: persisted_state,
                to: task_queued.state,
            });
        }

        // A repeated request for the state the task is already in only
        // matters the first time the worker sees the task.
        if !first_sighting && persisted_state == task_queued.state {
            debug!(task_id = %task_queued.id, state = %persisted_state, "Task already in requested state");
            return Ok(None);
        }

        match task_queued.state {
            State::Scheduled => self.start_task(task_queued).await.map(Some),
            State::Completed => self.stop_task(task_queued).await.map(Some),
            state => {
                error!(task_id = %task_queued.id, %state, "No action for requested state");
                Err(WorkerError::UnsupportedTarget {
                    id: task_queued.id,
                    state,
                })
            }
        }
    }

    pub async fn start_task(&self, mut task: Task) -> WorkerResult<DockerResult> {
        // Only the runtime hands out container ids.
        task.container_id = None;
        task.start_time = Some(Utc::now());
        info!(task_id = %task.id, image = %task.image, "Starting task");

        let config = Config::from(&task);
        let result = match self.runtime.run(&config).await {
            Ok(result) => result,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Error running task");
                task.state = State::Failed;
                self.persist(task).await;
                return Err(e.into());
            }
        };

        let Some(container_id) = result.container_id.clone() else {
            error!(task_id = %task.id, "Runtime returned no container id");
            task.state = State::Failed;
            let id = task.id;
            self.persist(task).await;
            return Err(WorkerError::NoContainer { id });
        };

        info!(task_id = %task.id, %container_id, "Task running");
        task.container_id = Some(container_id);
        task.state = State::Running;
        self.persist(task).await;

        Ok(result)
    }

    /// Stops the task's container and marks the task completed.
    ///
    /// The stored record is the one updated and its container id wins over
    /// the requested copy's. The requested copy is only used for a task the
    /// worker has never recorded. The task is recorded as `Completed` even
    /// when the stop fails; the failure is still returned to the caller.
    pub async fn stop_task(&self, requested: Task) -> WorkerResult<DockerResult> {
        let stored = self.db.read().await.get(&requested.id).cloned();
        let mut task = match stored {
            Some(stored) => stored,
            None => requested,
        };

        info!(task_id = %task.id, container_id = ?task.container_id, "Stopping task");
        let result = match &task.container_id {
            Some(id) => self.runtime.stop(id).await.map_err(WorkerError::from),
            None => Err(WorkerError::NoContainer { id: task.id }),
        };

        match &result {
            Ok(_) => info!(task_id = %task.id, container_id = ?task.container_id, "Stopped and removed container"),
            Err(e) if e.is_soft() => warn!(task_id = %task.id, error = %e, "Container already gone"),
            Err(e) => error!(task_id = %task.id, error = %e, "Error stopping container"),
        }

        task.finish_time = Some(Utc::now());
        task.state = State::Completed;
        self.persist(task).await;

        result
    }

    async fn persist(&self, task: Task) {
        self.db.write().await.insert(task.id, task);
    }

    /// All tracked tasks, ordered by id.
    pub async fn get_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.db.read().await.values().cloned().collect();
        tasks.sort_by_key(|task| task.id);
        tasks
    }

    pub async fn get_task(&self, id: &Uuid) -> Option<Task> {
        self.db.read().await.get(id).cloned()
    }

    pub async fn task_count(&self) -> usize {
        self.db.read().await.len()
    }

    /// Samples host resources and keeps the snapshot for [`Worker::stats`].
    pub async fn collect_statistics(&self) -> Stats {
        let stats = get_stats(self.task_count().await);
        debug!(
            worker = %self.name,
            cpu_usage = stats.cpu.usage(),
            mem_available = stats.memory.available,
            task_count = stats.task_count,
            "Collected statistics"
        );
        *self.stats.write().await = Some(stats.clone());
        stats
    }

    /// Latest host snapshot, sampling one if none was collected yet. The
    /// task count is always read from the database at call time.
    pub async fn stats(&self) -> Stats {
        let cached = self.stats.read().await.clone();
        match cached {
            Some(mut stats) => {
                stats.task_count = self.task_count().await;
                stats
            }
            None => self.collect_statistics().await,
        }
    }

    /// Capacity descriptor for placement. Allocated amounts cover running
    /// tasks only.
    pub async fn node(&self, ip: &str) -> Node {
        let stats = self.stats().await;
        let db = self.db.read().await;
        let running: Vec<&Task> = db
            .values()
            .filter(|task| task.state == State::Running)
            .collect();

        Node {
            name: self.name.clone(),
            ip: ip.to_string(),
            cores: stats.cpu_count as u64,
            memory: stats.memory.total,
            memory_allocated: running.iter().map(|task| task.memory).sum(),
            disk: stats.disk.total,
            disk_allocated: running.iter().map(|task| task.disk).sum(),
            role: "worker".to_string(),
            task_count: db.len() as u64,
        }
    }
}

/// Drains the queue one task per tick until `shutdown` fires.
pub async fn run_tasks(worker: Arc<Worker>, interval: Duration, shutdown: CancellationToken) {
    info!(worker = %worker.name, ?interval, "Task loop started");
    loop {
        match worker.run_task().await {
            Ok(Some(result)) => {
                info!(action = %result.action, container_id = ?result.container_id, "Task processed")
            }
            Ok(None) => {}
            Err(e) if e.is_soft() => warn!(error = %e, "Task processed with warning"),
            Err(e) => error!(error = %e, "Error running task"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!(worker = %worker.name, "Task loop stopped");
}

pub async fn collect_stats(worker: Arc<Worker>, interval: Duration, shutdown: CancellationToken) {
    loop {
        worker.collect_statistics().await;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!(worker = %worker.name, "Stats loop stopped");
}
