use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::{GameId, GameRecord};

/// Immutable input bundle for one launch attempt.
///
/// Constructed once per launch action by the surrounding application and
/// discarded after the orchestrator returns. The install reference and
/// credentials are always present; their absence is a caller bug, not a
/// runtime condition, so the fields are non-optional.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// The installed game to launch.
    pub install: InstalledGame,
    /// Credentials used for the metadata fetch.
    pub credentials: Credentials,
    /// Environment overlay merged on top of the ambient process environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// User preferences relevant to launching.
    #[serde(default)]
    pub preferences: Preferences,
    /// Pre-selected manifest action overriding executable discovery.
    #[serde(default)]
    pub manifest_action: Option<ManifestAction>,
    /// The user already consented to isolation setup in a previous attempt.
    #[serde(default)]
    pub sandbox_blessing: bool,
}

/// Reference to a game's on-disk install.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstalledGame {
    /// Root of the install location this game was installed under.
    pub install_path: PathBuf,
    /// Folder name of this install below `install_path`.
    pub install_folder: String,
    /// Identifier of the installed game.
    pub game_id: GameId,
    /// Cached record, used as a fetch fallback when the market is unreachable.
    #[serde(default)]
    pub game: Option<GameRecord>,
}

impl InstalledGame {
    /// Root directory holding the game's files.
    #[must_use]
    pub fn app_path(&self) -> PathBuf {
        self.install_path.join(&self.install_folder)
    }
}

/// API credentials of the launching user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
}

/// User preferences consulted by the launcher.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Launch games inside the platform's isolation mechanism.
    #[serde(default)]
    pub isolate_games: bool,
}

/// Developer-declared run target from the install's manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestAction {
    /// Display name of the action.
    pub name: String,
    /// Path of the target, relative to the install folder.
    pub path: String,
}
