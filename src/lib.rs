//! ipset-style classification engine for a user-space load-balancer data plane.

pub mod config;
pub mod control;
pub mod ipset;
pub mod lifecycle;
pub mod observability;

pub use config::EngineConfig;
pub use control::{ControlError, ControlHandle, ControlPlane, SetManager};
pub use ipset::{IpSet, SetError, SetRequest, TestResult, TypeRegistry};
pub use lifecycle::Shutdown;
