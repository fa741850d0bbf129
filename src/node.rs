use serde::{Deserialize, Serialize};

/// Identity and capacity of a machine that runs tasks.
///
/// Memory and disk figures are in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub ip: String,
    pub cores: u64,
    pub memory: u64,
    pub memory_allocated: u64,
    pub disk: u64,
    pub disk_allocated: u64,
    pub role: String,
    pub task_count: u64,
}

impl Node {
    pub fn memory_free(&self) -> u64 {
        self.memory.saturating_sub(self.memory_allocated)
    }

    pub fn disk_free(&self) -> u64 {
        self.disk.saturating_sub(self.disk_allocated)
    }
}
