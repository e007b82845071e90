// Library crate - Monte Carlo equity path simulation and batch orchestration

pub mod types;
pub mod config;
pub mod simulator;
pub mod orchestrator;
pub mod export;
pub mod report;

// Re-export commonly used types
pub use types::*;
pub use config::{RunnerConfig, SimulationConfig};
pub use orchestrator::{expand_tasks, RunError, RunOrchestrator, RunProgress};
pub use simulator::simulate;
