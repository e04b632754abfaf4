//! # strata-compose
//!
//! Composition engine for infrastructure stacks.
//!
//! Handles:
//! - **Unit**: descriptors and the [`unit::UnitTemplate`] seam.
//! - **Templates**: per-kind declaration templates (network, access
//!   control, cluster, compute, distribution, edge, storage, data tier).
//! - **Registry**: the write-once map of produced resource handles.
//! - **Validator**: dry-run requirement and attachment checks.
//! - **Graph**: dependency graph construction and topological resolution.
//! - **Composition**: registration, ordering, and instantiation.
//! - **Synth**: fingerprinted output for the provisioning engine.
//! - **Net**: IPv4 CIDR and port-range parsing.

pub mod composition;
pub mod graph;
pub mod net;
pub mod registry;
pub mod synth;
pub mod templates;
pub mod unit;
pub mod validator;

pub use composition::{Attachment, Composition, Instantiation};
pub use registry::HandleRegistry;
pub use synth::Synthesis;
pub use unit::{UnitDescriptor, UnitSpec, UnitTemplate};
