// Test module - relaxed lint rules
#![allow(clippy::default_trait_access)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

mod common;

use common::Harness;
use gamebox::launcher::LaunchError;
use gamebox::model::{GameId, GameRecord, LaunchOutcome, Platform};
use gamebox::sandbox::macos::is_app_bundle;
use gamebox::sandbox::{engine_for, SandboxContext};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

fn test_game() -> GameRecord {
    GameRecord {
        id: GameId::new(1842),
        title: "Test Game".to_string(),
        url: None,
    }
}

/// Lay out `Game.app/Contents/MacOS/game` under `root` and return the
/// bundle and embedded executable paths.
fn fake_bundle(root: &Path) -> (PathBuf, PathBuf) {
    let bundle = root.join("Game.app");
    let macos_dir = bundle.join("Contents").join("MacOS");
    fs::create_dir_all(&macos_dir).unwrap();
    let exec = macos_dir.join("game");
    fs::write(&exec, "#!/bin/sh\n").unwrap();
    (bundle, exec)
}

#[test]
fn bundle_detection_matches_dot_app_suffixes() {
    assert!(is_app_bundle(Path::new("/Games/Foo.app")));
    assert!(is_app_bundle(Path::new("/Games/Foo.APP/")));
    assert!(!is_app_bundle(Path::new("/Games/Foo.application")));
    assert!(!is_app_bundle(Path::new("/Games/foo")));
}

#[test]
fn within_tears_down_on_callback_error() {
    let dir = tempfile::tempdir().unwrap();
    let (bundle, exec) = fake_bundle(dir.path());
    let harness = Harness::new();
    let engine = engine_for(Platform::Macos, &harness.tools);
    let game = test_game();
    let ctx = SandboxContext {
        game: &game,
        app_path: dir.path(),
        exe_path: &bundle,
        full_exec: &exec,
        arg_string: "",
        is_bundle: true,
    };

    let seen: RefCell<Option<PathBuf>> = RefCell::new(None);
    let result = engine.within(&ctx, &mut |fake_app| {
        assert!(fake_app.exists());
        *seen.borrow_mut() = Some(fake_app.to_path_buf());
        Err(LaunchError::internal("E_INTERNAL", "callback boom"))
    });

    assert!(result.is_err());
    let fake_app = seen.borrow().clone().unwrap();
    assert!(!fake_app.exists());
}

#[test]
fn within_stages_shim_and_profile_in_the_copy() {
    let dir = tempfile::tempdir().unwrap();
    let (bundle, exec) = fake_bundle(dir.path());
    let harness = Harness::new();
    let engine = engine_for(Platform::Macos, &harness.tools);
    let game = test_game();
    let ctx = SandboxContext {
        game: &game,
        app_path: dir.path(),
        exe_path: &bundle,
        full_exec: &exec,
        arg_string: "",
        is_bundle: true,
    };

    let seen: RefCell<Option<PathBuf>> = RefCell::new(None);
    engine
        .within(&ctx, &mut |fake_app| {
            let shim = fake_app.join("Contents").join("MacOS").join("game");
            let script = fs::read_to_string(&shim).unwrap();
            assert!(script.starts_with("#!/bin/sh"));
            assert!(script.contains("sandbox-exec"));
            assert!(script.contains(&exec.display().to_string()));

            let profile = fs::read_to_string(fake_app.join("gamebox.sb")).unwrap();
            assert!(profile.contains("(deny default)"));
            assert!(profile.contains(&format!(
                "(allow file-write* (subpath \"{}\"))",
                dir.path().display()
            )));

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = fs::metadata(&shim).unwrap().permissions().mode();
                assert_eq!(mode & 0o777, 0o755);
            }

            *seen.borrow_mut() = Some(fake_app.to_path_buf());
            Ok(())
        })
        .unwrap();

    let fake_app = seen.borrow().clone().unwrap();
    assert!(!fake_app.exists());
}

#[test]
fn within_wraps_bare_executables_in_an_ephemeral_app() {
    let dir = tempfile::tempdir().unwrap();
    let exec = dir.path().join("game-bin");
    fs::write(&exec, "binary").unwrap();
    let harness = Harness::new();
    let engine = engine_for(Platform::Macos, &harness.tools);
    let game = test_game();
    let ctx = SandboxContext {
        game: &game,
        app_path: dir.path(),
        exe_path: &exec,
        full_exec: &exec,
        arg_string: "",
        is_bundle: false,
    };

    engine
        .within(&ctx, &mut |fake_app| {
            assert!(fake_app.ends_with("game-bin.app"));
            let plist =
                fs::read_to_string(fake_app.join("Contents").join("Info.plist")).unwrap();
            assert!(plist.contains("<key>CFBundleExecutable</key>"));
            assert!(plist.contains("<string>game-bin</string>"));
            assert!(fake_app
                .join("Contents")
                .join("MacOS")
                .join("game-bin")
                .exists());
            Ok(())
        })
        .unwrap();
}

#[test]
fn isolated_bundle_launch_opens_the_fake_app() {
    let dir = tempfile::tempdir().unwrap();
    let (bundle, exec) = fake_bundle(dir.path());
    let harness = Harness::new();
    harness.discovery.set(Some(bundle.clone()));
    let exec_str = exec.display().to_string();
    harness.tools.add_rule("bundle-exec", Ok(exec_str.as_str()));

    let mut request = common::request_for(dir.path());
    request.preferences.isolate_games = true;

    let outcome = harness.launcher(Platform::Macos).launch(&request).unwrap();
    assert!(matches!(outcome, LaunchOutcome::Completed { .. }));

    let calls = harness.spawner.calls.borrow();
    assert!(calls[0].command.starts_with("open -W \""));
    assert!(calls[0].command.contains("gamebox-shell-"));
    assert!(calls[0].command.contains("Game.app"));
    assert_eq!(calls[0].cwd, exec.parent().unwrap());
}

#[test]
fn plain_bundle_launch_opens_the_bundle_directly() {
    let dir = tempfile::tempdir().unwrap();
    let (bundle, exec) = fake_bundle(dir.path());
    let harness = Harness::new();
    harness.discovery.set(Some(bundle.clone()));
    let exec_str = exec.display().to_string();
    harness.tools.add_rule("bundle-exec", Ok(exec_str.as_str()));

    let request = common::request_for(dir.path());
    let outcome = harness.launcher(Platform::Macos).launch(&request).unwrap();
    assert!(matches!(outcome, LaunchOutcome::Completed { .. }));

    let calls = harness.spawner.calls.borrow();
    assert_eq!(calls[0].command, format!("open -W \"{}\"", bundle.display()));
    assert_eq!(calls[0].cwd, exec.parent().unwrap());
}

#[test]
fn plain_binary_is_invoked_directly() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("game-bin");
    let harness = Harness::new();
    harness.discovery.set(Some(bin.clone()));

    let request = common::request_for(dir.path());
    let outcome = harness.launcher(Platform::Macos).launch(&request).unwrap();
    assert!(matches!(outcome, LaunchOutcome::Completed { .. }));

    let calls = harness.spawner.calls.borrow();
    assert_eq!(calls[0].command, format!("\"{}\"", bin.display()));
    assert_eq!(calls[0].cwd, dir.path());
    // No bundle, so the resolver helper is never consulted.
    assert!(harness.tools.calls.borrow().is_empty());
}
