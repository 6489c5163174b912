//! Per-platform process isolation behind one three-operation contract.
//!
//! The isolation primitives differ fundamentally per platform: a dedicated
//! low-privilege account with ACL toggling on Windows, a profile-driven
//! sandboxing launcher on Linux, a privilege-dropped working copy of the
//! application bundle on macOS. Each mechanism lives in its own engine;
//! the orchestrator's control flow stays platform-agnostic through
//! `check` / `install` / `within`.

pub mod linux;
pub mod macos;
pub mod windows;

use crate::external::ToolRunner;
use crate::launcher::{LaunchError, LaunchResult};
use crate::model::{GameRecord, Platform};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a non-mutating probe of the isolation mechanism.
///
/// `errors` are fatal-check failures; `needs` enumerate missing
/// prerequisites that [`SandboxEngine::install`] can satisfy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    pub errors: Vec<String>,
    pub needs: Vec<SetupNeed>,
}

/// Result of attempting to install missing prerequisites.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstallSummary {
    pub errors: Vec<String>,
}

/// A missing isolation prerequisite.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "need", rename_all = "snake_case")]
pub enum SetupNeed {
    /// A sandboxing binary that must be present on the system.
    IsolationTool { name: String },
    /// The dedicated low-privilege OS account games run under.
    PlayerAccount { name: String },
}

impl SetupNeed {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::IsolationTool { name } => format!("sandbox tool '{name}'"),
            Self::PlayerAccount { name } => format!("player account '{name}'"),
        }
    }
}

/// Launch-scoped facts an engine may need while installing or staging.
pub struct SandboxContext<'a> {
    pub game: &'a GameRecord,
    pub app_path: &'a Path,
    pub exe_path: &'a Path,
    pub full_exec: &'a Path,
    pub arg_string: &'a str,
    pub is_bundle: bool,
}

/// The uniform isolation contract the orchestrator drives.
pub trait SandboxEngine {
    /// Probe whether the platform's isolation mechanism is present and
    /// correctly configured. Never mutates system state.
    fn check(&self) -> CheckSummary;

    /// Perform the minimum system changes satisfying `needs`. Re-running
    /// when already satisfied is a no-op, not an error.
    fn install(&self, needs: &[SetupNeed]) -> InstallSummary;

    /// Stage a temporary isolated working copy and run `run` against it,
    /// tearing the copy down afterwards no matter how `run` finishes.
    /// Only the macOS engine implements this.
    fn within(
        &self,
        ctx: &SandboxContext<'_>,
        run: &mut dyn FnMut(&Path) -> LaunchResult<()>,
    ) -> LaunchResult<()> {
        let _ = (ctx, run);
        Err(LaunchError::internal(
            "E_INTERNAL",
            "working-copy isolation is only available on macos",
        ))
    }
}

/// Engine implementing the isolation mechanism of `platform`.
#[must_use]
pub fn engine_for(platform: Platform, tools: &dyn ToolRunner) -> Box<dyn SandboxEngine + '_> {
    match platform {
        Platform::Linux => Box::new(linux::LinuxSandbox::new(tools)),
        Platform::Macos => Box::new(macos::MacSandbox::new(tools)),
        Platform::Windows => Box::new(windows::WindowsSandbox::new(tools)),
    }
}
