pub mod docker;
pub mod error;
pub mod state;
pub mod types;
