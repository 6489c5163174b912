pub mod ids;
pub mod request;

pub use ids::{GameId, LaunchId};
pub use request::{Credentials, InstalledGame, LaunchRequest, ManifestAction, Preferences};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Game metadata as returned by the catalog collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    pub title: String,
    /// Store page of the game, when known.
    #[serde(default)]
    pub url: Option<String>,
}

/// The executable chosen for a launch attempt.
///
/// `path` is the program that will ultimately be invoked; for archives that
/// need a runtime wrapper it is the wrapper, and the archive moves into
/// `args`. `work_dir` stays anchored at the original target's directory so
/// the child runs next to the game's files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedExecutable {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub work_dir: PathBuf,
}

/// Final result of a launch attempt.
///
/// `ConsentPending` is the explicit consent-pause terminal state: the user
/// was shown a setup prompt and a fresh request carrying the blessing must
/// be issued to resume. It is neither a success nor a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Completed { launch_id: LaunchId },
    ConsentPending { launch_id: LaunchId },
}

/// Serializable mirror of a launch error, for the surrounding application.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub context: Option<Value>,
}

/// Operating systems the launcher knows how to drive.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    Macos,
    Windows,
}

impl Platform {
    /// Platform of the running process, if it is one the launcher supports.
    #[must_use]
    pub fn host() -> Option<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Parse an `std::env::consts::OS`-style name. Unknown names are the
    /// caller's unsupported-platform case.
    #[must_use]
    pub fn from_os_name(name: &str) -> Option<Self> {
        match name {
            "linux" => Some(Self::Linux),
            "macos" | "darwin" => Some(Self::Macos),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Stable lower-case tag used in message keys and documentation URLs.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }
}
