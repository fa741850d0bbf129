pub mod config;
pub mod node;
pub mod scheduler;
pub mod shutdown;
pub mod tasks;
pub mod worker;
