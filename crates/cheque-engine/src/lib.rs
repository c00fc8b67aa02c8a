//! Cheque Engine - milestone scheduling for contracts
//!
//! Ties the workspace together behind [`MilestoneEngine`]:
//! - Dependency validation and deterministic ordering
//! - Critical-path timelines, cached per contract
//! - Completion, risk, delay and trend reports
//! - All-or-nothing batch mutations with cascade deletes and edge admission
//!
//! # Example
//!
//! ```rust,ignore
//! use cheque_engine::{EngineConfig, MilestoneEngine};
//! use cheque_milestone::{ContractId, MemoryStore, Milestone, MilestoneDependency};
//! use chrono::Duration;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MilestoneEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default())?;
//! let contract = ContractId::new();
//!
//! let design = Milestone::new(contract, "Design", 1).with_estimated_duration(Duration::days(5));
//! let build = Milestone::new(contract, "Build", 2).with_estimated_duration(Duration::days(20));
//! let edge = MilestoneDependency::prerequisite(build.id, design.id);
//! engine.create_milestone(design).await?;
//! engine.create_milestone(build).await?;
//! engine.add_dependency(contract, edge).await?;
//!
//! let timeline = engine.timeline_analysis(contract).await?;
//! assert_eq!(timeline.total_duration, Duration::days(25));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod logging;

pub use batch::{BatchOutcome, MilestoneBatch, MilestoneMutation};
pub use cache::{CacheStats, ScheduleCache};
pub use config::EngineConfig;
pub use engine::MilestoneEngine;
pub use error::{BatchError, ConfigError, EngineError};
pub use locks::ContractLocks;
pub use logging::LogFormat;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
