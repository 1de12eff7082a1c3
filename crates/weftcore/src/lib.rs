//! Core abstractions for the weft orchestration kernel
//!
//! This crate provides the configuration layer and the fundamental value,
//! scope and naming types that the runtime crate builds on. It has no
//! executor dependencies.

pub mod config;
mod error;
mod naming;
mod scope;
mod value;

pub use config::{
    AppliedConfig, Config, DataNodeConfig, GlobalConfig, JobConfig, JobMode, PipelineConfig,
    ScenarioConfig, TaskConfig,
};
pub use error::ConfigError;
pub use naming::protect_name;
pub use scope::{Frequency, Scope};
pub use value::{Comparator, TaskFunction, TaskOutput, Value};
