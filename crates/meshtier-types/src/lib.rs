//! meshtier-types: Shared data model for meshtier.
//!
//! This crate holds the node configuration schema, the feature flag table,
//! the live status model reported by the engine, and the address parsing
//! primitives they rely on.

pub mod address;
pub mod flags;
pub mod profile;
pub mod status;

pub use address::{Endpoint, FormatError, Transport};
pub use flags::FeatureFlag;
pub use profile::{
    NetworkProfile, NetworkingMethod, PortForwardConfig, PortForwardProto, ProfileSummary,
};
