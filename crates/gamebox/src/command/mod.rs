//! Shell command assembly and tokenization.
//!
//! Commands are assembled as a single escaped string (the shape the
//! platform launch arms and external wrappers compose over) and parsed back
//! into an argument vector right before spawning, so quoted paths with
//! spaces survive the round trip.

use crate::launcher::{LaunchError, LaunchResult};
use crate::model::Platform;
use std::path::Path;

/// Quote a filesystem path for inclusion in a command line.
///
/// Paths are wrapped in double quotes. Unix escapes embedded quotes and
/// backslashes; Windows escapes quotes only, since backslashes are path
/// separators there.
#[must_use]
pub fn escape_path(platform: Platform, path: &str) -> String {
    let mut escaped = String::with_capacity(path.len() + 2);
    escaped.push('"');
    for ch in path.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' if platform != Platform::Windows => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

/// Escape and space-join an argument list.
#[must_use]
pub fn join_args(platform: Platform, args: &[String]) -> String {
    args.iter()
        .map(|arg| escape_path(platform, arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join an escaped executable path with its escaped arguments.
#[must_use]
pub fn build_command(platform: Platform, exe_path: &Path, args: &[String]) -> String {
    let exe = escape_path(platform, &exe_path.display().to_string());
    let arg_string = join_args(platform, args);
    if arg_string.is_empty() {
        exe
    } else {
        format!("{exe} {arg_string}")
    }
}

/// Split a fully-assembled command line into tokens with shell-quoting rules.
pub fn split_command(full_command: &str) -> LaunchResult<Vec<String>> {
    shell_words::split(full_command).map_err(|err| {
        LaunchError::io(
            "E_INTERNAL",
            format!("failed to parse command line '{full_command}'"),
            err,
        )
    })
}
