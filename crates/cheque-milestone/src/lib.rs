//! Cheque Milestone - domain model for contract milestones
//!
//! Defines the records the scheduling engine works over:
//! - Milestones and their dependency edges
//! - The milestone status lifecycle
//! - The [`MilestoneStore`] persistence seam and an in-memory
//!   transactional implementation ([`MemoryStore`])
//!
//! # Example
//!
//! ```rust,ignore
//! use cheque_milestone::{ContractId, MemoryStore, Milestone, MilestoneStore};
//! use chrono::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let contract = ContractId::new();
//!
//! let design = Milestone::new(contract, "Design sign-off", 1)
//!     .with_estimated_duration(Duration::days(5));
//! store.create_milestone(design).await?;
//!
//! let loaded = store.load_milestones(contract).await?;
//! assert_eq!(loaded.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod duration_secs;
pub mod error;
pub mod ids;
pub mod status;
pub mod store;
pub mod types;

pub use error::{StoreError, TransitionError};
pub use ids::{ContractId, DependencyId, MilestoneId};
pub use status::{allowed_transitions, validate_transition};
pub use store::{MemoryStore, MilestoneStore, StoreOp};
pub use types::{
    ContractSnapshot, DependencyType, Milestone, MilestoneDependency, MilestoneStatus,
    MilestoneUpdate, ProgressSnapshot, ProgressUpdate, RiskLevel,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
