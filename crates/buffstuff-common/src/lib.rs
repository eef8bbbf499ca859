//! # BuffStuff Common
//!
//! Common types shared by the BuffStuff crates.
//!
//! This crate provides the leaf types every other crate builds on:
//! - ID types (EntityId, PlayerUid)
//! - Version information for the persisted snapshot format
//! - Persistence error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
