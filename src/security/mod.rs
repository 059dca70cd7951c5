//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming target:
//!     → target.rs (parse, scheme check)
//!     → guard.rs (resolve, classify every address)
//!         → classifier.rs (private/loopback/link-local ranges)
//!     → headers.rs (strip hop-by-hop, rotate User-Agent)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: resolution errors block the request
//! - Block if ANY resolved address is private
//! - No trust in client input

pub mod classifier;
pub mod guard;
pub mod headers;
pub mod target;

pub use guard::{AddressSet, BlockedAddress, Resolver, SsrfGuard, StaticResolver, SystemResolver};
pub use target::{validate_target, InvalidUrl};
