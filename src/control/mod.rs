//! Control plane: named sets and the command queue that mutates them.
//!
//! # Data Flow
//! ```text
//! config / CLI / embedder
//!     → queue.rs (ControlHandle → ControlPlane actor)
//!     → manager.rs (SetManager: name → Arc<IpSet>)
//!     → ipset::IpSet (add / del / test / list / flush)
//!
//! Packet path:
//!     SetManager::get or test_packet → IpSet::test_packet (lock-free)
//! ```

pub mod error;
pub mod manager;
pub mod queue;

pub use error::ControlError;
pub use manager::{ReloadSummary, SetManager, SetSummary};
pub use queue::{Command, ControlHandle, ControlPlane};
