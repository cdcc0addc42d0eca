//! Deadlock Simulator Core
//!
//! Analysis engine for resource-allocation states: Banker's safety check,
//! wait-for graphs, circular-wait detection, termination-based recovery,
//! random scenario generation and single-request compatibility checks.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod strategy;

pub use config::AppConfig;
pub use engine::{AllocationState, RecoveryPlanner, SafetyAnalyzer, ScenarioGenerator};
pub use error::{Error, Result};
pub use strategy::{simulate, solve, Strategy};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
