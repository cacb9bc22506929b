//! Purpose: Invoke mdbtools executables and capture their output as lines.
//! Exports: `Toolchain`, `run` result lines.
//! Invariants: The mdbtools install dir is explicit configuration, never global state.
//! Invariants: Output of a failed invocation is never returned to callers.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};

const STDERR_SNIPPET_BYTES: usize = 200;

/// Locates the mdbtools executables. With no `bin_dir` the tools are resolved
/// through `PATH`, matching how the package installs on most systems.
#[derive(Clone, Debug, Default)]
pub struct Toolchain {
    bin_dir: Option<PathBuf>,
}

impl Toolchain {
    pub fn new() -> Self {
        Self { bin_dir: None }
    }

    pub fn with_bin_dir(mut self, bin_dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(bin_dir.into());
        self
    }

    pub fn bin_dir(&self) -> Option<&Path> {
        self.bin_dir.as_deref()
    }

    fn resolve(&self, tool: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    /// Run one tool synchronously and return its stdout split into lines.
    ///
    /// `stdin` is written to the child through a pipe (`mdb-sql` reads its
    /// query that way). A non-zero exit or a spawn failure is a
    /// `ToolFailure`; the captured stdout is discarded in that case.
    pub fn run<I, S>(&self, tool: &str, args: I, stdin: Option<&str>) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.resolve(tool);
        let mut cmd = Command::new(&program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(tool, program = %program.display(), "invoking external tool");

        let mut child = cmd.spawn().map_err(|err| {
            let hint = if err.kind() == std::io::ErrorKind::NotFound {
                "Install the mdbtools package, or point --mdbtools-path at its bin directory."
            } else {
                "Check that the mdbtools executables are present and runnable."
            };
            Error::new(ErrorKind::ToolFailure)
                .with_message("failed to start external tool")
                .with_tool(tool)
                .with_hint(hint)
                .with_source(err)
        })?;

        if let Some(payload) = stdin {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                Error::new(ErrorKind::Internal)
                    .with_message("child stdin pipe missing")
                    .with_tool(tool)
            })?;
            pipe.write_all(payload.as_bytes()).map_err(|err| {
                Error::new(ErrorKind::ToolFailure)
                    .with_message("failed to write tool input")
                    .with_tool(tool)
                    .with_source(err)
            })?;
            // Dropping the pipe closes it so the tool sees EOF.
        }

        let output = child.wait_with_output().map_err(|err| {
            Error::new(ErrorKind::ToolFailure)
                .with_message("failed to collect tool output")
                .with_tool(tool)
                .with_source(err)
        })?;

        debug!(tool, status = ?output.status.code(), "external tool finished");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::new(ErrorKind::ToolFailure)
                .with_message(format!(
                    "exited with status {}: {}",
                    output
                        .status
                        .code()
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    stderr_snippet(&stderr)
                ))
                .with_tool(tool));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

fn stderr_snippet(stderr: &str) -> &str {
    let line = stderr.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "(no diagnostic output)";
    }
    match line.char_indices().find(|(idx, _)| *idx >= STDERR_SNIPPET_BYTES) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
