//! Process supervision: spawn the assembled command and stream its output.
//!
//! The supervisor reports the raw exit code and leaves interpretation to
//! the orchestrator. Stdout and stderr are drained by dedicated reader
//! threads feeding one [`LogSink`]; interleaving across the two streams is
//! unspecified but ordering within each stream is preserved.

use crate::command;
use crate::launcher::{LaunchError, LaunchResult};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Which of the child's output streams a line arrived on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Destination for the child's output, one line at a time.
pub trait LogSink: Send + Sync {
    fn line(&self, stream: StreamKind, line: &str);
}

/// [`LogSink`] that forwards lines as tracing events.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn line(&self, stream: StreamKind, line: &str) {
        debug!(stream = stream.label(), "{line}");
    }
}

/// Spawns the final command and waits for it to exit.
pub trait ProcessSpawner {
    /// Run `full_command` with `env` overlaid on the ambient environment
    /// (overlay wins) and `cwd` as working directory, returning the raw
    /// exit code.
    fn spawn(
        &self,
        full_command: &str,
        env: &BTreeMap<String, String>,
        cwd: &Path,
    ) -> LaunchResult<i32>;
}

/// [`ProcessSpawner`] backed by real child processes.
pub struct HostSpawner {
    sink: Arc<dyn LogSink>,
}

impl HostSpawner {
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Supervisor that streams child output as tracing events.
    #[must_use]
    pub fn with_tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl ProcessSpawner for HostSpawner {
    fn spawn(
        &self,
        full_command: &str,
        env: &BTreeMap<String, String>,
        cwd: &Path,
    ) -> LaunchResult<i32> {
        let tokens = command::split_command(full_command)?;
        let (program, args) = tokens
            .split_first()
            .ok_or_else(|| LaunchError::internal("E_INTERNAL", "empty command line"))?;
        debug!(command = %program, ?args, cwd = %cwd.display(), "spawning child");

        let mut child = Command::new(program)
            .args(args)
            .envs(env)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                LaunchError::io("E_IO", format!("failed to spawn '{program}'"), err)
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::internal("E_INTERNAL", "child stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LaunchError::internal("E_INTERNAL", "child stderr was not piped"))?;

        let out_reader = spawn_reader(StreamKind::Stdout, stdout, Arc::clone(&self.sink));
        let err_reader = spawn_reader(StreamKind::Stderr, stderr, Arc::clone(&self.sink));

        // Readers run until EOF, which the child's exit produces; join them
        // before wait so no trailing output is dropped.
        let _ = out_reader.join();
        let _ = err_reader.join();

        let status = child
            .wait()
            .map_err(|err| LaunchError::io("E_IO", "failed to wait for child", err))?;

        // Signal-terminated children report no exit code.
        Ok(status.code().unwrap_or(-1))
    }
}

fn spawn_reader(
    stream: StreamKind,
    source: impl Read + Send + 'static,
    sink: Arc<dyn LogSink>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(source);
        for line in reader.lines() {
            match line {
                Ok(line) => sink.line(stream, &line),
                Err(_) => break,
            }
        }
    })
}
