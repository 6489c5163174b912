//! Seatbelt working-copy isolation for macOS.
//!
//! Isolated launches never run the installed bundle directly. A temporary
//! "fake app" is staged: a copy of the bundle (or an ephemeral wrapper app
//! around a bare executable) whose embedded executable is a shim that
//! re-enters the real binary under `sandbox-exec` with a generated
//! profile. The copy lives for exactly one launch.

use crate::command;
use crate::external::ToolRunner;
use crate::launcher::{LaunchError, LaunchResult};
use crate::model::Platform;
use crate::sandbox::{CheckSummary, InstallSummary, SandboxContext, SandboxEngine, SetupNeed};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::debug;

/// System sandbox facility driving the generated profile.
pub const SANDBOX_EXEC: &str = "/usr/bin/sandbox-exec";

/// Helper resolving a bundle's true embedded executable.
pub const BUNDLE_RESOLVER: &str = "bundle-exec";

const PROFILE_FILE: &str = "gamebox.sb";

/// Whether a path names an application bundle (ends in `.app`, optionally
/// followed by `/`, case-insensitive).
#[must_use]
pub fn is_app_bundle(path: &Path) -> bool {
    let text = path.to_string_lossy().to_ascii_lowercase();
    text.trim_end_matches('/').ends_with(".app")
}

/// Resolve the true embedded executable of an application bundle.
pub fn resolve_bundle_executable(
    tools: &dyn ToolRunner,
    bundle: &Path,
) -> LaunchResult<PathBuf> {
    let bundle_arg = bundle.display().to_string();
    let output =
        tools.run_output(BUNDLE_RESOLVER, &["--print-bundle-executable-path", &bundle_arg])?;
    Ok(PathBuf::from(output.trim()))
}

pub struct MacSandbox<'a> {
    tools: &'a dyn ToolRunner,
}

impl<'a> MacSandbox<'a> {
    #[must_use]
    pub fn new(tools: &'a dyn ToolRunner) -> Self {
        Self { tools }
    }
}

impl SandboxEngine for MacSandbox<'_> {
    fn check(&self) -> CheckSummary {
        let mut summary = CheckSummary::default();
        // Probe with a permissive one-line profile; a failure means the
        // system facility itself is unusable.
        let probe = self.tools.run_output(
            SANDBOX_EXEC,
            &["-p", "(version 1)(allow default)", "/usr/bin/true"],
        );
        if let Err(err) = probe {
            summary
                .errors
                .push(format!("sandbox-exec is unavailable: {err}"));
        }
        summary
    }

    fn install(&self, needs: &[SetupNeed]) -> InstallSummary {
        // The facility ships with the OS; nothing is installable here.
        let mut summary = InstallSummary::default();
        for need in needs {
            summary
                .errors
                .push(format!("no installer for {} on macos", need.describe()));
        }
        summary
    }

    fn within(
        &self,
        ctx: &SandboxContext<'_>,
        run: &mut dyn FnMut(&Path) -> LaunchResult<()>,
    ) -> LaunchResult<()> {
        let staging = tempfile::Builder::new()
            .prefix("gamebox-shell-")
            .tempdir()
            .map_err(|err| {
                LaunchError::io("E_IO", "failed to create working-copy staging dir", err)
            })?;

        let fake_app = if ctx.is_bundle {
            stage_bundle_copy(staging.path(), ctx)?
        } else {
            stage_wrapper_app(staging.path(), ctx)?
        };
        debug!(fake_app = %fake_app.display(), "staged sandboxed working copy");

        let result = run(&fake_app);
        // The staging dir scope ends here, tearing the copy down on the
        // success and error paths alike.
        drop(staging);
        result
    }
}

/// Copy the real bundle and swap its embedded executable for the shim.
fn stage_bundle_copy(staging: &Path, ctx: &SandboxContext<'_>) -> LaunchResult<PathBuf> {
    let bundle = ctx.exe_path;
    let name = bundle
        .file_name()
        .ok_or_else(|| LaunchError::internal("E_INTERNAL", "bundle path has no file name"))?;
    let fake_app = staging.join(name);
    copy_tree(bundle, &fake_app)?;

    let profile = fake_app.join(PROFILE_FILE);
    write_seatbelt_profile(&profile, ctx.app_path)?;

    let embedded = ctx.full_exec.strip_prefix(bundle).map_err(|_| {
        LaunchError::internal("E_INTERNAL", "bundle executable is outside the bundle")
    })?;
    write_shim(&fake_app.join(embedded), &profile, ctx)?;
    Ok(fake_app)
}

/// Build an ephemeral wrapper app around a bare executable.
fn stage_wrapper_app(staging: &Path, ctx: &SandboxContext<'_>) -> LaunchResult<PathBuf> {
    let name = ctx
        .full_exec
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LaunchError::internal("E_INTERNAL", "executable path has no file name"))?;
    let fake_app = staging.join(format!("{name}.app"));
    let macos_dir = fake_app.join("Contents").join("MacOS");
    fs::create_dir_all(&macos_dir)
        .map_err(|err| LaunchError::io("E_IO", "failed to create wrapper app", err))?;

    let profile = fake_app.join(PROFILE_FILE);
    write_seatbelt_profile(&profile, ctx.app_path)?;
    write_shim(&macos_dir.join(name), &profile, ctx)?;

    let plist = info_plist(name, &ctx.game.title);
    fs::write(fake_app.join("Contents").join("Info.plist"), plist)
        .map_err(|err| LaunchError::io("E_IO", "failed to write wrapper app plist", err))?;
    Ok(fake_app)
}

/// Shell shim re-entering the real executable under the sandbox facility.
fn write_shim(shim_path: &Path, profile: &Path, ctx: &SandboxContext<'_>) -> LaunchResult<()> {
    let profile_arg = command::escape_path(Platform::Macos, &profile.display().to_string());
    let exec_arg = command::escape_path(Platform::Macos, &ctx.full_exec.display().to_string());
    let mut script = format!("#!/bin/sh\nexec {SANDBOX_EXEC} -f {profile_arg} {exec_arg}");
    if !ctx.arg_string.is_empty() {
        script.push(' ');
        script.push_str(ctx.arg_string);
    }
    script.push('\n');

    fs::write(shim_path, script)
        .map_err(|err| LaunchError::io("E_IO", "failed to write sandbox shim", err))?;

    #[cfg(unix)]
    fs::set_permissions(shim_path, fs::Permissions::from_mode(0o755))
        .map_err(|err| LaunchError::io("E_IO", "failed to mark sandbox shim executable", err))?;

    Ok(())
}

/// Validates that a path is safe to embed in a Seatbelt profile.
/// Rejects characters that could escape the S-expression string literal.
fn validate_profile_path(text: &str) -> LaunchResult<()> {
    if text.contains('"')
        || text.contains('(')
        || text.contains(')')
        || text.contains('\n')
        || text.contains('\r')
        || text.contains('\0')
    {
        return Err(LaunchError {
            code: "E_INTERNAL".to_string(),
            message: "path contains characters unsafe for sandbox profiles".to_string(),
            context: Some(serde_json::json!({ "path": text })),
        });
    }
    Ok(())
}

/// Deny-by-default profile: broad reads, writes confined to the install.
fn write_seatbelt_profile(path: &Path, app_path: &Path) -> LaunchResult<()> {
    let app = app_path.to_string_lossy();
    validate_profile_path(&app)?;

    let mut profile = String::new();
    profile.push_str("(version 1)\n");
    profile.push_str("(deny default)\n");
    profile.push_str("(import \"system.sb\")\n");
    profile.push_str("(import \"bsd.sb\")\n");
    profile.push_str("(allow process-exec)\n");
    profile.push_str("(allow process-fork)\n");
    profile.push_str("(allow file-read*)\n");
    // write! to String is infallible, ignore result
    let _ = writeln!(profile, "(allow file-write* (subpath \"{app}\"))");
    profile.push_str("(allow file-write* (subpath \"/private/tmp\"))\n");

    // Restrictive permissions (0600) so other users cannot read the rules
    #[cfg(unix)]
    {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|err| LaunchError::io("E_IO", "failed to create sandbox profile", err))?;
        file.write_all(profile.as_bytes())
            .map_err(|err| LaunchError::io("E_IO", "failed to write sandbox profile", err))?;
    }

    #[cfg(not(unix))]
    fs::write(path, profile)
        .map_err(|err| LaunchError::io("E_IO", "failed to write sandbox profile", err))?;

    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> LaunchResult<()> {
    fs::create_dir_all(dst)
        .map_err(|err| LaunchError::io("E_IO", "failed to create working-copy dir", err))?;
    let entries = fs::read_dir(src)
        .map_err(|err| LaunchError::io("E_IO", "failed to read bundle dir", err))?;
    for entry in entries {
        let entry =
            entry.map_err(|err| LaunchError::io("E_IO", "failed to read bundle entry", err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| LaunchError::io("E_IO", "failed to stat bundle entry", err))?;
        let target = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|err| LaunchError::io("E_IO", "failed to copy bundle entry", err))?;
        }
    }
    Ok(())
}

fn info_plist(executable: &str, title: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n\
         <dict>\n\
         \t<key>CFBundleExecutable</key>\n\
         \t<string>{executable}</string>\n\
         \t<key>CFBundleIdentifier</key>\n\
         \t<string>dev.gamebox.shell</string>\n\
         \t<key>CFBundleName</key>\n\
         \t<string>{title}</string>\n\
         \t<key>CFBundlePackageType</key>\n\
         \t<string>APPL</string>\n\
         </dict>\n\
         </plist>\n"
    )
}
