//! Launch orchestration: resolve an executable, prepare isolation, spawn,
//! and classify the outcome.
//!
//! One [`Launcher::launch`] call is a single blocking sequence with no
//! internal parallelism. The only non-terminal exit is the consent pause:
//! when isolation setup needs user approval the launcher emits one consent
//! request and finishes with [`LaunchOutcome::ConsentPending`]; a fresh
//! request carrying `sandbox_blessing` resumes the flow.

use crate::command;
use crate::external::{
    urls, ConsentAction, ConsentRequest, ExecutableDiscovery, GameCatalog, Notifier, ToolRunner,
};
use crate::model::{
    GameRecord, LaunchId, LaunchOutcome, LaunchRequest, Platform, ResolvedExecutable,
};
use crate::sandbox::{self, SandboxContext, SetupNeed};
use crate::spawn::ProcessSpawner;
use miette::Diagnostic;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

/// File a developer-provided manifest lives in, relative to the install.
pub const MANIFEST_NAME: &str = ".gamebox.toml";

/// Runtime wrapper used for `.jar` targets.
pub const JAVA_RUNTIME: &str = "java";

pub type LaunchResult<T> = Result<T, LaunchError>;

#[derive(Debug)]
pub struct LaunchError {
    pub code: String,
    pub message: String,
    pub context: Option<Value>,
}

impl LaunchError {
    pub fn no_executables(manifest_present: bool) -> Self {
        let qualifier = if manifest_present { "with" } else { "without" };
        Self {
            code: "E_NO_EXECUTABLES".to_string(),
            message: format!("no executables found ({qualifier} manifest)"),
            context: Some(serde_json::json!({
                "manifest_present": manifest_present,
                "reason": "game.install.no_executables_found",
            })),
        }
    }

    pub fn sandbox_check(errors: &[String]) -> Self {
        Self {
            code: "E_SANDBOX_CHECK".to_string(),
            message: format!("error(s) while checking for sandbox: {}", errors.join(", ")),
            context: Some(serde_json::json!({ "errors": errors })),
        }
    }

    pub fn sandbox_install(errors: &[String]) -> Self {
        Self {
            code: "E_SANDBOX_INSTALL".to_string(),
            message: format!("error(s) while installing sandbox: {}", errors.join(", ")),
            context: Some(serde_json::json!({ "errors": errors })),
        }
    }

    pub fn unsupported_platform(name: &str) -> Self {
        Self {
            code: "E_UNSUPPORTED_PLATFORM".to_string(),
            message: format!("unsupported platform: {name}"),
            context: Some(serde_json::json!({ "platform": name })),
        }
    }

    pub fn crash(exe_path: &Path, exit_code: i32) -> Self {
        Self {
            code: "E_CRASH".to_string(),
            message: format!("process exited with code {exit_code}"),
            context: Some(serde_json::json!({
                "exe_path": exe_path.display().to_string(),
                "exit_code": exit_code,
            })),
        }
    }

    pub fn io(
        code: impl Into<String>,
        message: impl Into<String>,
        err: impl fmt::Display,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: Some(serde_json::json!({ "source": err.to_string() })),
        }
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn to_error_info(&self) -> crate::model::ErrorInfo {
        crate::model::ErrorInfo {
            code: self.code.clone(),
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl Diagnostic for LaunchError {}

/// Platform of the running process, or `E_UNSUPPORTED_PLATFORM`.
pub fn host_platform() -> LaunchResult<Platform> {
    Platform::host().ok_or_else(|| LaunchError::unsupported_platform(std::env::consts::OS))
}

/// The launch orchestrator: a platform tag plus the collaborator seams the
/// core consumes. Collaborators are injected rather than reached through
/// ambient state so callers (and tests) control every side effect.
pub struct Launcher<'a> {
    pub platform: Platform,
    pub discovery: &'a dyn ExecutableDiscovery,
    pub catalog: &'a dyn GameCatalog,
    pub notifier: &'a dyn Notifier,
    pub tools: &'a dyn ToolRunner,
    pub spawner: &'a dyn ProcessSpawner,
}

/// Phases of one launch attempt. The consent pause is an explicit state
/// terminating in `Done(ConsentPending)` instead of falling out of the
/// flow early.
enum Phase {
    Resolve,
    Isolate {
        exec: ResolvedExecutable,
        game: GameRecord,
    },
    AwaitingConsent {
        game: GameRecord,
    },
    Installing {
        exec: ResolvedExecutable,
        game: GameRecord,
        needs: Vec<SetupNeed>,
    },
    Spawn {
        exec: ResolvedExecutable,
        game: GameRecord,
    },
    Done(LaunchOutcome),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Isolate { .. } => "isolate",
            Self::AwaitingConsent { .. } => "awaiting_consent",
            Self::Installing { .. } => "installing",
            Self::Spawn { .. } => "spawn",
            Self::Done(_) => "done",
        }
    }
}

impl Launcher<'_> {
    /// Run one launch attempt to completion.
    pub fn launch(&self, request: &LaunchRequest) -> LaunchResult<LaunchOutcome> {
        let launch_id = LaunchId::new();
        let span = info_span!("launch", %launch_id, game_id = %request.install.game_id);
        let _guard = span.enter();
        info!(
            install_path = %request.install.install_path.display(),
            install_folder = %request.install.install_folder,
            "launching installed game"
        );

        let mut phase = Phase::Resolve;
        loop {
            debug!(phase = phase.name(), "entering phase");
            phase = match phase {
                Phase::Resolve => self.resolve(request)?,
                Phase::Isolate { exec, game } => self.isolate(request, exec, game)?,
                Phase::AwaitingConsent { game } => {
                    self.await_consent(launch_id, &game)
                }
                Phase::Installing { exec, game, needs } => {
                    self.install_prerequisites(exec, game, &needs)?
                }
                Phase::Spawn { exec, game } => {
                    self.run_platform(request, launch_id, &exec, &game)?
                }
                Phase::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn resolve(&self, request: &LaunchRequest) -> LaunchResult<Phase> {
        let game = self.catalog.fetch_game(
            &request.credentials,
            request.install.game_id,
            request.install.game.as_ref(),
        )?;

        let app_path = request.install.app_path();
        let manifest_present = app_path.join(MANIFEST_NAME).exists();

        let picked = match &request.manifest_action {
            Some(action) => {
                debug!(action = %action.name, path = %action.path, "using manifest action");
                Some(app_path.join(&action.path))
            }
            None => {
                debug!("no manifest action picked");
                self.discovery.discover(request, &app_path)?
            }
        };
        let Some(path) = picked else {
            return Err(LaunchError::no_executables(manifest_present));
        };

        let exec = rewrite_for_runtime(path);
        info!(
            exe = %exec.path.display(),
            platform = self.platform.slug(),
            args = %exec.args.join(" "),
            "resolved executable"
        );
        Ok(Phase::Isolate { exec, game })
    }

    fn isolate(
        &self,
        request: &LaunchRequest,
        exec: ResolvedExecutable,
        game: GameRecord,
    ) -> LaunchResult<Phase> {
        if !request.preferences.isolate_games {
            return Ok(Phase::Spawn { exec, game });
        }

        let engine = sandbox::engine_for(self.platform, self.tools);
        let checked = engine.check();
        if !checked.errors.is_empty() {
            return Err(LaunchError::sandbox_check(&checked.errors));
        }

        if checked.needs.is_empty() {
            return Ok(Phase::Spawn { exec, game });
        }
        if !request.sandbox_blessing {
            return Ok(Phase::AwaitingConsent { game });
        }
        Ok(Phase::Installing {
            exec,
            game,
            needs: checked.needs,
        })
    }

    fn await_consent(&self, launch_id: LaunchId, game: &GameRecord) -> Phase {
        info!("sandbox setup needs consent, pausing");
        self.notifier
            .request_consent(&consent_request(self.platform, game));
        Phase::Done(LaunchOutcome::ConsentPending { launch_id })
    }

    fn install_prerequisites(
        &self,
        exec: ResolvedExecutable,
        game: GameRecord,
        needs: &[SetupNeed],
    ) -> LaunchResult<Phase> {
        let engine = sandbox::engine_for(self.platform, self.tools);
        let installed = engine.install(needs);
        if !installed.errors.is_empty() {
            return Err(LaunchError::sandbox_install(&installed.errors));
        }
        Ok(Phase::Spawn { exec, game })
    }

    fn run_platform(
        &self,
        request: &LaunchRequest,
        launch_id: LaunchId,
        exec: &ResolvedExecutable,
        game: &GameRecord,
    ) -> LaunchResult<Phase> {
        let arg_string = command::join_args(self.platform, &exec.args);
        let code = match self.platform {
            Platform::Macos => self.run_macos(request, exec, game, &arg_string)?,
            Platform::Windows => self.run_windows(request, exec, &arg_string)?,
            Platform::Linux => self.run_linux(request, exec, &arg_string)?,
        };

        if code != 0 {
            return Err(LaunchError::crash(&exec.path, code));
        }
        info!("child completed successfully");
        Ok(Phase::Done(LaunchOutcome::Completed { launch_id }))
    }

    fn run_macos(
        &self,
        request: &LaunchRequest,
        exec: &ResolvedExecutable,
        game: &GameRecord,
        arg_string: &str,
    ) -> LaunchResult<i32> {
        let is_bundle = sandbox::macos::is_app_bundle(&exec.path);
        let full_exec = if is_bundle {
            sandbox::macos::resolve_bundle_executable(self.tools, &exec.path)?
        } else {
            exec.path.clone()
        };
        let cwd = if is_bundle {
            parent_dir(&full_exec)
        } else {
            exec.work_dir.clone()
        };

        if request.preferences.isolate_games {
            debug!("app isolation enabled");
            let app_path = request.install.app_path();
            let engine = sandbox::engine_for(self.platform, self.tools);
            let ctx = SandboxContext {
                game,
                app_path: &app_path,
                exe_path: &exec.path,
                full_exec: &full_exec,
                arg_string,
                is_bundle,
            };
            let mut code = 0;
            engine.within(&ctx, &mut |fake_app| {
                let opened = command::escape_path(
                    self.platform,
                    &fake_app.display().to_string(),
                );
                code = self
                    .spawner
                    .spawn(&format!("open -W {opened}"), &request.env, &cwd)?;
                Ok(())
            })?;
            return Ok(code);
        }

        debug!("no app isolation");
        let escaped = command::escape_path(self.platform, &exec.path.display().to_string());
        let cmd = if is_bundle {
            if arg_string.is_empty() {
                format!("open -W {escaped}")
            } else {
                format!("open -W {escaped} --args {arg_string}")
            }
        } else if arg_string.is_empty() {
            escaped
        } else {
            format!("{escaped} {arg_string}")
        };
        self.spawner.spawn(&cmd, &request.env, &cwd)
    }

    fn run_windows(
        &self,
        request: &LaunchRequest,
        exec: &ResolvedExecutable,
        arg_string: &str,
    ) -> LaunchResult<i32> {
        let mut cmd = command::escape_path(self.platform, &exec.path.display().to_string());
        if !arg_string.is_empty() {
            cmd.push(' ');
            cmd.push_str(arg_string);
        }

        if !request.preferences.isolate_games {
            return self.spawner.spawn(&cmd, &request.env, &exec.work_dir);
        }

        let app_path = request.install.app_path();
        let granted = sandbox::windows::grant_access(self.tools, &app_path);
        let ran = match &granted {
            Ok(output) => {
                debug!(output = %output, "grant output");
                self.spawner.spawn(
                    &sandbox::windows::elevated_command(&cmd),
                    &request.env,
                    &exec.work_dir,
                )
            }
            // grant failure is fatal, but the deny below still pairs with it
            Err(_) => Ok(0),
        };

        match sandbox::windows::revoke_access(self.tools, &app_path) {
            Ok(output) => debug!(output = %output, "deny output"),
            Err(err) => warn!(error = %err, "failed to revoke access grant"),
        }

        granted?;
        ran
    }

    fn run_linux(
        &self,
        request: &LaunchRequest,
        exec: &ResolvedExecutable,
        arg_string: &str,
    ) -> LaunchResult<i32> {
        let mut cmd = command::escape_path(self.platform, &exec.path.display().to_string());
        if !arg_string.is_empty() {
            cmd.push(' ');
            cmd.push_str(arg_string);
        }

        if request.preferences.isolate_games {
            debug!("generating sandbox profile");
            let profile = sandbox::linux::write_profile(&request.install.app_path())?;
            cmd = sandbox::linux::wrap_command(&profile, &cmd);
        }

        self.spawner.spawn(&cmd, &request.env, &exec.work_dir)
    }
}

/// Rewrite archive targets to run through their runtime wrapper.
fn rewrite_for_runtime(path: PathBuf) -> ResolvedExecutable {
    let work_dir = parent_dir(&path);
    let is_jar = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
    if is_jar {
        debug!("launching .jar through the java runtime");
        return ResolvedExecutable {
            args: vec!["-jar".to_string(), path.display().to_string()],
            path: PathBuf::from(JAVA_RUNTIME),
            work_dir,
        };
    }
    ResolvedExecutable {
        path,
        args: Vec::new(),
        work_dir,
    }
}

fn consent_request(platform: Platform, game: &GameRecord) -> ConsentRequest {
    let slug = platform.slug();
    ConsentRequest {
        title_key: "sandbox.setup.title".to_string(),
        message_key: format!("sandbox.setup.{slug}.message"),
        detail_key: format!("sandbox.setup.{slug}.detail"),
        game: game.clone(),
        actions: vec![
            ConsentAction::Proceed { game_id: game.id },
            ConsentAction::LearnMore {
                url: urls::sandbox_setup(platform).to_string(),
            },
            ConsentAction::Cancel,
        ],
    }
}

/// Containing directory of a path, falling back to the current directory for
/// bare program names.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
