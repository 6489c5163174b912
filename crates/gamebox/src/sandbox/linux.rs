//! firejail-based isolation for Linux installs.
//!
//! Isolated launches wrap the game command with the firejail launcher,
//! pointed at a fixed profile rendered into the install's hidden config
//! folder on every launch.

use crate::external::ToolRunner;
use crate::launcher::{LaunchError, LaunchResult};
use crate::sandbox::{CheckSummary, InstallSummary, SandboxEngine, SetupNeed};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The sandboxing launcher wrapped around isolated commands.
pub const SANDBOX_TOOL: &str = "firejail";

/// Hidden config folder inside the install.
pub const PROFILE_DIR: &str = ".gamebox";

/// Profile file name below [`PROFILE_DIR`].
pub const PROFILE_FILE: &str = "isolate-app.profile";

/// Privilege-elevated runner used to install the sandbox tool.
const INSTALL_HELPER: &str = "pkexec";

/// Fixed profile rendered for every isolated launch. Drops capabilities
/// and root, filters the network and syscalls, and hides other users'
/// devices; the install directory itself stays fully accessible.
pub const PROFILE_TEMPLATE: &str = "\
# gamebox isolation profile
caps.drop all
netfilter
nogroups
nonewprivs
noroot
seccomp
shell none
private-dev
private-tmp
";

pub struct LinuxSandbox<'a> {
    tools: &'a dyn ToolRunner,
}

impl<'a> LinuxSandbox<'a> {
    #[must_use]
    pub fn new(tools: &'a dyn ToolRunner) -> Self {
        Self { tools }
    }
}

impl SandboxEngine for LinuxSandbox<'_> {
    fn check(&self) -> CheckSummary {
        let mut summary = CheckSummary::default();
        match self.tools.run_output(SANDBOX_TOOL, &["--version"]) {
            Ok(output) if output.starts_with(SANDBOX_TOOL) => {
                debug!(version = %output, "sandbox tool present");
            }
            Ok(output) => {
                summary
                    .errors
                    .push(format!("unrecognized {SANDBOX_TOOL} version output: {output}"));
            }
            Err(_) => {
                summary.needs.push(SetupNeed::IsolationTool {
                    name: SANDBOX_TOOL.to_string(),
                });
            }
        }
        summary
    }

    fn install(&self, needs: &[SetupNeed]) -> InstallSummary {
        let mut summary = InstallSummary::default();
        for need in needs {
            match need {
                SetupNeed::IsolationTool { name } => {
                    match self
                        .tools
                        .run_output(INSTALL_HELPER, &["apt-get", "install", "-y", name])
                    {
                        Ok(output) => debug!(output = %output, "installed sandbox tool"),
                        Err(err) => summary
                            .errors
                            .push(format!("failed to install {name}: {err}")),
                    }
                }
                other => summary
                    .errors
                    .push(format!("no installer for {} on linux", other.describe())),
            }
        }
        summary
    }
}

/// Location of the profile for an install.
#[must_use]
pub fn profile_path(app_path: &Path) -> PathBuf {
    app_path.join(PROFILE_DIR).join(PROFILE_FILE)
}

/// Render the fixed profile into the install's hidden config folder,
/// overwriting any previous launch's copy.
pub fn write_profile(app_path: &Path) -> LaunchResult<PathBuf> {
    let path = profile_path(app_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| LaunchError::io("E_IO", "failed to create profile directory", err))?;
    }

    // Restrictive permissions (0600) so other users cannot read the rules
    #[cfg(unix)]
    {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|err| LaunchError::io("E_IO", "failed to create sandbox profile", err))?;
        file.write_all(PROFILE_TEMPLATE.as_bytes())
            .map_err(|err| LaunchError::io("E_IO", "failed to write sandbox profile", err))?;
    }

    #[cfg(not(unix))]
    fs::write(&path, PROFILE_TEMPLATE)
        .map_err(|err| LaunchError::io("E_IO", "failed to write sandbox profile", err))?;

    Ok(path)
}

/// Wrap a built command with the sandboxing launcher and profile reference.
#[must_use]
pub fn wrap_command(profile: &Path, cmd: &str) -> String {
    format!("{SANDBOX_TOOL} \"--profile={}\" -- {cmd}", profile.display())
}
