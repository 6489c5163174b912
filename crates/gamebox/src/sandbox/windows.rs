//! Low-privilege account isolation for Windows installs.
//!
//! Games run elevated under a dedicated account. The account is granted
//! full rights over the install directory right before the run and the
//! matching deny is issued afterwards; the grant/deny pair belongs to a
//! single launch.

use crate::external::ToolRunner;
use crate::launcher::{LaunchError, LaunchResult};
use crate::sandbox::{CheckSummary, InstallSummary, SandboxEngine, SetupNeed};
use std::path::Path;
use tracing::debug;

/// The dedicated low-privilege account games run under.
pub const PLAYER_ACCOUNT: &str = "gamebox-player";

const PLAYER_PASSWORD: &str = "salt";
const ACL_TOOL: &str = "icacls";
const ELEVATE_TOOL: &str = "elevate";
const ACCOUNT_TOOL: &str = "net";

pub struct WindowsSandbox<'a> {
    tools: &'a dyn ToolRunner,
}

impl<'a> WindowsSandbox<'a> {
    #[must_use]
    pub fn new(tools: &'a dyn ToolRunner) -> Self {
        Self { tools }
    }
}

impl SandboxEngine for WindowsSandbox<'_> {
    fn check(&self) -> CheckSummary {
        let mut summary = CheckSummary::default();
        match self.tools.run_output(ACCOUNT_TOOL, &["user", PLAYER_ACCOUNT]) {
            Ok(output) => debug!(output = %output, "player account present"),
            Err(_) => summary.needs.push(SetupNeed::PlayerAccount {
                name: PLAYER_ACCOUNT.to_string(),
            }),
        }
        summary
    }

    fn install(&self, needs: &[SetupNeed]) -> InstallSummary {
        let mut summary = InstallSummary::default();
        for need in needs {
            match need {
                SetupNeed::PlayerAccount { name } => {
                    let created = self.tools.run_output(
                        ELEVATE_TOOL,
                        &["--", ACCOUNT_TOOL, "user", name, PLAYER_PASSWORD, "/add"],
                    );
                    match created {
                        Ok(output) => debug!(output = %output, "created player account"),
                        // An account that already exists satisfies the need
                        Err(err) if error_text(&err).contains("already exists") => {
                            debug!(account = name, "player account already present");
                        }
                        Err(err) => summary
                            .errors
                            .push(format!("failed to create account {name}: {err}")),
                    }
                }
                other => summary
                    .errors
                    .push(format!("no installer for {} on windows", other.describe())),
            }
        }
        summary
    }
}

/// Grant the player account full rights over the install, recursively.
pub fn grant_access(tools: &dyn ToolRunner, app_path: &Path) -> LaunchResult<String> {
    let target = app_path.display().to_string();
    let grant = format!("{PLAYER_ACCOUNT}:F");
    tools.run_output(ACL_TOOL, &[&target, "/grant", &grant, "/T", "/Q"])
}

/// Issue the deny call pairing with [`grant_access`].
pub fn revoke_access(tools: &dyn ToolRunner, app_path: &Path) -> LaunchResult<String> {
    let target = app_path.display().to_string();
    let deny = format!("{PLAYER_ACCOUNT}:F");
    tools.run_output(ACL_TOOL, &[&target, "/deny", &deny, "/T", "/Q"])
}

/// Wrap a built command so it runs elevated under the player account.
#[must_use]
pub fn elevated_command(cmd: &str) -> String {
    format!("{ELEVATE_TOOL} --runas {PLAYER_ACCOUNT} {PLAYER_PASSWORD} {cmd}")
}

fn error_text(err: &LaunchError) -> String {
    let source = err
        .context
        .as_ref()
        .and_then(|context| context.get("source"))
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    format!("{} {source}", err.message)
}
