//! Core domain models for stagerun
//!
//! This module defines the fundamental data structures that represent
//! pipelines, stages, runs, and their configuration.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod state;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use stage::*;
pub use state::*;
