//! # BuffStuff Core
//!
//! Timed status effects ("buffs") for a multiplayer game server.
//!
//! This crate provides the buff lifecycle:
//! - The [`Buff`] contract and its hook context
//! - Kind registry used to rebuild buffs from saved records
//! - Buff manager: apply/remove, periodic sweep, player leave/join,
//!   death and despawn handling
//! - Serialized records and the versioned world snapshot
//! - Save stores (memory and directory backed)
//! - Game calendar, host event feed and configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod buff;
pub mod calendar;
pub mod config;
pub mod error;
pub mod events;
pub mod instance;
pub mod manager;
pub mod record;
pub mod registry;
pub mod snapshot;
pub mod store;

mod test_support;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buff::*;
    pub use crate::calendar::*;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::instance::*;
    pub use crate::manager::*;
    pub use crate::record::*;
    pub use crate::registry::*;
    pub use crate::snapshot::*;
    pub use crate::store::*;
}

pub use prelude::*;
