// Shared fakes for integration tests - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::new_without_default)]
#![allow(clippy::must_use_candidate)]
#![allow(dead_code)]
#![allow(missing_docs)]

use gamebox::external::{ConsentRequest, ExecutableDiscovery, GameCatalog, Notifier, ToolRunner};
use gamebox::launcher::{LaunchError, LaunchResult};
use gamebox::model::{
    Credentials, GameId, GameRecord, InstalledGame, LaunchRequest, Platform, Preferences,
};
use gamebox::spawn::ProcessSpawner;
use gamebox::Launcher;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Ordered trace of tool invocations and spawns, shared by the fakes.
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub struct FakeDiscovery {
    pub result: RefCell<Option<PathBuf>>,
    pub calls: Cell<usize>,
}

impl FakeDiscovery {
    pub fn none() -> Self {
        Self {
            result: RefCell::new(None),
            calls: Cell::new(0),
        }
    }

    pub fn set(&self, result: Option<PathBuf>) {
        *self.result.borrow_mut() = result;
    }
}

impl ExecutableDiscovery for FakeDiscovery {
    fn discover(
        &self,
        _request: &LaunchRequest,
        _app_path: &Path,
    ) -> LaunchResult<Option<PathBuf>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.result.borrow().clone())
    }
}

pub struct FakeCatalog;

impl GameCatalog for FakeCatalog {
    fn fetch_game(
        &self,
        _credentials: &Credentials,
        game_id: GameId,
        fallback: Option<&GameRecord>,
    ) -> LaunchResult<GameRecord> {
        Ok(fallback.cloned().unwrap_or_else(|| GameRecord {
            id: game_id,
            title: "Test Game".to_string(),
            url: None,
        }))
    }
}

pub struct RecordingNotifier {
    pub requests: RefCell<Vec<ConsentRequest>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn request_consent(&self, request: &ConsentRequest) {
        self.requests.borrow_mut().push(request.clone());
    }
}

struct ToolRule {
    needle: String,
    response: Result<String, String>,
}

/// Tool runner answering from substring-matched rules (first match wins);
/// unmatched invocations succeed with empty output.
pub struct ScriptedTools {
    rules: RefCell<Vec<ToolRule>>,
    pub calls: RefCell<Vec<String>>,
    pub events: EventLog,
}

impl ScriptedTools {
    pub fn new(events: EventLog) -> Self {
        Self {
            rules: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            events,
        }
    }

    pub fn add_rule(&self, needle: &str, response: Result<&str, &str>) {
        self.rules.borrow_mut().push(ToolRule {
            needle: needle.to_string(),
            response: response.map(str::to_string).map_err(str::to_string),
        });
    }
}

impl ToolRunner for ScriptedTools {
    fn run_output(&self, program: &str, args: &[&str]) -> LaunchResult<String> {
        let call = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(call.clone());
        self.events.borrow_mut().push(format!("tool {call}"));
        let rules = self.rules.borrow();
        match rules.iter().find(|rule| call.contains(&rule.needle)) {
            Some(rule) => match &rule.response {
                Ok(output) => Ok(output.clone()),
                Err(message) => {
                    Err(LaunchError::io("E_IO", message.clone(), "scripted failure"))
                }
            },
            None => Ok(String::new()),
        }
    }
}

pub struct SpawnCall {
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

pub struct RecordingSpawner {
    pub exit_code: Cell<i32>,
    pub fail: Cell<bool>,
    pub calls: RefCell<Vec<SpawnCall>>,
    pub events: EventLog,
}

impl RecordingSpawner {
    pub fn new(events: EventLog) -> Self {
        Self {
            exit_code: Cell::new(0),
            fail: Cell::new(false),
            calls: RefCell::new(Vec::new()),
            events,
        }
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn(
        &self,
        full_command: &str,
        env: &BTreeMap<String, String>,
        cwd: &Path,
    ) -> LaunchResult<i32> {
        self.calls.borrow_mut().push(SpawnCall {
            command: full_command.to_string(),
            env: env.clone(),
            cwd: cwd.to_path_buf(),
        });
        self.events.borrow_mut().push(format!("spawn {full_command}"));
        if self.fail.get() {
            return Err(LaunchError::io(
                "E_IO",
                "failed to spawn child",
                "scripted failure",
            ));
        }
        Ok(self.exit_code.get())
    }
}

/// All the fakes a launch needs, wired to one shared event log.
pub struct Harness {
    pub discovery: FakeDiscovery,
    pub catalog: FakeCatalog,
    pub notifier: RecordingNotifier,
    pub tools: ScriptedTools,
    pub spawner: RecordingSpawner,
    pub events: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        let events: EventLog = Rc::new(RefCell::new(Vec::new()));
        Self {
            discovery: FakeDiscovery::none(),
            catalog: FakeCatalog,
            notifier: RecordingNotifier::new(),
            tools: ScriptedTools::new(Rc::clone(&events)),
            spawner: RecordingSpawner::new(Rc::clone(&events)),
            events,
        }
    }

    pub fn launcher(&self, platform: Platform) -> Launcher<'_> {
        Launcher {
            platform,
            discovery: &self.discovery,
            catalog: &self.catalog,
            notifier: &self.notifier,
            tools: &self.tools,
            spawner: &self.spawner,
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.spawner.calls.borrow().len()
    }

    pub fn event_position(&self, needle: &str) -> Option<usize> {
        self.events
            .borrow()
            .iter()
            .position(|event| event.contains(needle))
    }
}

/// Request whose install resolves to `dir`, isolation off, no blessing.
pub fn request_for(dir: &Path) -> LaunchRequest {
    let install_path = dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let install_folder = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    LaunchRequest {
        install: InstalledGame {
            install_path,
            install_folder,
            game_id: GameId::new(1842),
            game: None,
        },
        credentials: Credentials {
            api_key: "key-test".to_string(),
        },
        env: BTreeMap::new(),
        preferences: Preferences {
            isolate_games: false,
        },
        manifest_action: None,
        sandbox_blessing: false,
    }
}
