//! ipset-style hash matching engine.
//!
//! # Data Flow
//! ```text
//! Control plane (add / del / test request, expressed as ranges):
//!     → set.rs (IpSet: family check, writer lock)
//!     → variant.rs (TypeVariant::plan, per shape × family)
//!     → cidr.rs (range → CIDR blocks)
//!     → adt.rs (cartesian product → element ops, sized before mutation)
//!     → hash.rs (mutate a copy of the table)
//!     → atomic publish of the new table
//!
//! Packet path:
//!     packet.rs (PacketView → probe key)
//!     → lookup.rs (multi-length lookup over the mask histogram)
//!     → hash.rs (exact test per mask)
//!     → TestResult { Accept, Reject, NotFound }
//! ```
//!
//! # Design Decisions
//! - Key shape and address family are fixed at set creation
//! - Readers never lock: tables are published through `ArcSwap`
//! - A failing control-plane request leaves the set unchanged
//! - Nomatch entries override any accept found for the same probe

pub mod adt;
pub mod cidr;
pub mod error;
pub mod family;
pub mod hash;
pub mod lookup;
pub mod packet;
pub mod registry;
pub mod request;
pub mod set;
pub mod shape;
pub mod types;
pub mod variant;

pub use adt::AdtOutcome;
pub use error::SetError;
pub use packet::{Packet, PacketView};
pub use registry::TypeRegistry;
pub use request::{AdtOp, NetRange, PortRange, SetRequest};
pub use set::{IpSet, SetOptions};
pub use types::{Family, Member, TestResult};
pub use variant::TypeVariant;
