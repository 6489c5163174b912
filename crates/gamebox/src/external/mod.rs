//! Collaborator interfaces consumed by the launcher core.
//!
//! The surrounding application owns executable discovery, metadata fetch,
//! and user notification; external helper programs own privileged system
//! operations. All of them are injected as trait objects so the launch flow
//! has no ambient dependencies.

use crate::launcher::{LaunchError, LaunchResult};
use crate::model::{Credentials, GameId, GameRecord, LaunchRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Documentation links offered from the sandbox consent prompt.
pub mod urls {
    use crate::model::Platform;

    pub const LINUX_SANDBOX_SETUP: &str = "https://docs.gamebox.dev/sandbox/linux";
    pub const MACOS_SANDBOX_SETUP: &str = "https://docs.gamebox.dev/sandbox/macos";
    pub const WINDOWS_SANDBOX_SETUP: &str = "https://docs.gamebox.dev/sandbox/windows";

    /// Setup guide for the given platform's isolation mechanism.
    #[must_use]
    pub fn sandbox_setup(platform: Platform) -> &'static str {
        match platform {
            Platform::Linux => LINUX_SANDBOX_SETUP,
            Platform::Macos => MACOS_SANDBOX_SETUP,
            Platform::Windows => WINDOWS_SANDBOX_SETUP,
        }
    }
}

/// Executable-discovery heuristic, consulted when no manifest action is
/// given. Scanning and ranking candidates is the collaborator's business.
pub trait ExecutableDiscovery {
    fn discover(
        &self,
        request: &LaunchRequest,
        app_path: &Path,
    ) -> LaunchResult<Option<PathBuf>>;
}

/// Game metadata fetch, with the install's cached record as fallback.
pub trait GameCatalog {
    fn fetch_game(
        &self,
        credentials: &Credentials,
        game_id: GameId,
        fallback: Option<&GameRecord>,
    ) -> LaunchResult<GameRecord>;
}

/// A consent prompt asking the user to approve isolation setup.
///
/// Keys are localization identifiers; the view layer resolves them. The
/// action set is fixed: proceed (re-launch with the blessing), learn more
/// (open the platform's setup guide), cancel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub title_key: String,
    pub message_key: String,
    pub detail_key: String,
    pub game: GameRecord,
    pub actions: Vec<ConsentAction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConsentAction {
    /// Re-issue the launch for this game with `sandbox_blessing` set.
    Proceed { game_id: GameId },
    /// Open the platform's sandbox documentation.
    LearnMore { url: String },
    Cancel,
}

/// Notification dispatch owned by the application shell.
pub trait Notifier {
    fn request_consent(&self, request: &ConsentRequest);
}

/// External helper processes invoked with captured output: the bundle
/// executable resolver, the ACL tool, the privilege-escalation runner, the
/// sandboxing launcher probe.
pub trait ToolRunner {
    fn run_output(&self, program: &str, args: &[&str]) -> LaunchResult<String>;
}

/// [`ToolRunner`] backed by real child processes.
pub struct HostToolRunner;

impl ToolRunner for HostToolRunner {
    fn run_output(&self, program: &str, args: &[&str]) -> LaunchResult<String> {
        debug!(program, ?args, "running external helper");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                LaunchError::io("E_IO", format!("failed to run helper '{program}'"), err)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LaunchError::io(
                "E_IO",
                format!(
                    "helper '{program}' exited with code {}",
                    output.status.code().unwrap_or(-1)
                ),
                stderr.trim(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
