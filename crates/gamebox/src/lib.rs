//! gamebox: the native game launcher core of a desktop game-launching client.
//!
//! Given an installed game, this crate resolves the executable to run
//! (manifest action first, discovery second), prepares a platform-specific
//! sandboxed execution environment when the user asked for isolation,
//! spawns the process, streams its output, and classifies the exit.
//! Everything around it — views, metadata fetch, discovery heuristics,
//! notification dispatch — is injected through the traits in [`external`].

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal types will be documented in future releases.
#![allow(missing_docs)]

pub mod command;
pub mod external;
pub mod launcher;
pub mod model;
pub mod sandbox;
pub mod spawn;

pub use crate::launcher::{host_platform, LaunchError, LaunchResult, Launcher};
pub use crate::model::*;
