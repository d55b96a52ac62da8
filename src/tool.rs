//! External-tool invocation.
//!
//! The engine shells out to [exiftool](https://exiftool.org) for everything
//! it cannot do in-process: enumerating preview tags, pulling tag payloads,
//! and copying orientation metadata. The [`ToolInvoker`] trait is the seam —
//! a single `run` operation — so selector/extractor/engine tests can replay
//! canned tool output without a real binary on the host.
//!
//! Invocations never go through a shell. Arguments are passed as an exec
//! vector, so untrusted filenames (spaces, quotes, `$(...)`) are never
//! interpreted. Binary payloads are redirected straight into a temp file via
//! the child's stdout handle instead of piping them through this process.
//!
//! Every call runs under a wall-clock timeout: malformed RAW files can make
//! the tool spin, and a hung thumbnailer must not hang the host request. The
//! child is killed and reaped when the limit passes.

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use std::{env, thread};
use thiserror::Error;
use tracing::debug;

/// Interval between `try_wait` polls while a child runs.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Fatal initialization failure: no usable exiftool on the host.
///
/// Surfaced once, at engine construction. Per-attempt failures never use
/// this type.
#[derive(Error, Debug)]
#[error("no exiftool binary found (set $EXIFTOOL or install exiftool in $PATH); \
         preview extraction is unavailable")]
pub struct SetupError;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch tool: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("tool exceeded {}s timeout and was killed", timeout.as_secs())]
    Timeout { timeout: Duration },
    #[error("tool exited with {code:?}")]
    Failed { code: Option<i32> },
}

/// Result of one tool invocation. `stdout` is empty when the invocation
/// redirected output to a file.
#[derive(Debug, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
}

/// The seam between the engine and the external tool.
pub trait ToolInvoker: Send + Sync {
    /// Run the tool with the given arguments. With `stdout_file` set, the
    /// child's stdout is written to that path instead of being captured.
    /// A non-zero exit is an error.
    fn run(&self, args: &[OsString], stdout_file: Option<&Path>) -> Result<ToolOutput, ToolError>;
}

/// A resolved exiftool binary.
///
/// Resolution runs once, at engine construction; the resolved path is
/// immutable afterwards and safe to share across concurrent attempts.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    timeout: Duration,
}

impl ExifTool {
    /// Locate exiftool. Order: explicit configured path, `$EXIFTOOL`, then
    /// each directory in `$PATH`.
    pub fn resolve(configured: Option<&Path>, timeout: Duration) -> Result<Self, SetupError> {
        if let Some(path) = configured {
            if path.is_file() {
                return Ok(Self::at(path.to_path_buf(), timeout));
            }
            return Err(SetupError);
        }

        if let Some(path) = env::var_os("EXIFTOOL").map(PathBuf::from) {
            if path.is_file() {
                return Ok(Self::at(path, timeout));
            }
        }

        let search = env::var_os("PATH").unwrap_or_default();
        for dir in env::split_paths(&search) {
            let candidate = dir.join("exiftool");
            if candidate.is_file() {
                return Ok(Self::at(candidate, timeout));
            }
        }

        Err(SetupError)
    }

    /// Use a specific binary without any lookup.
    pub fn at(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl ToolInvoker for ExifTool {
    fn run(&self, args: &[OsString], stdout_file: Option<&Path>) -> Result<ToolOutput, ToolError> {
        debug!(program = %self.program.display(), ?args, "invoking exiftool");

        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null()).stderr(Stdio::null());
        match stdout_file {
            Some(path) => {
                cmd.stdout(Stdio::from(File::create(path)?));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        let mut child = cmd.spawn()?;

        // Drain stdout on a separate thread; a full pipe would otherwise
        // deadlock against the wait loop below.
        let reader = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf).ok();
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                child.kill().ok();
                child.wait().ok();
                // Reaping the child closed its end of the pipe, so the
                // drain thread is done; join it rather than abandon it.
                if let Some(handle) = reader {
                    handle.join().ok();
                }
                return Err(ToolError::Timeout {
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(ToolError::Failed {
                code: status.code(),
            });
        }

        Ok(ToolOutput { stdout })
    }
}

/// Build an argument vector from a mix of flags and paths.
pub fn args(parts: &[&dyn AsRef<std::ffi::OsStr>]) -> Vec<OsString> {
    parts.iter().map(|p| p.as_ref().to_os_string()).collect()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Canned reply for one [`MockInvoker::run`] call.
    pub struct MockResponse {
        pub stdout: Vec<u8>,
        pub result: Result<(), ToolError>,
    }

    impl MockResponse {
        pub fn ok(stdout: &[u8]) -> Self {
            Self {
                stdout: stdout.to_vec(),
                result: Ok(()),
            }
        }

        pub fn failed() -> Self {
            Self {
                stdout: Vec::new(),
                result: Err(ToolError::Failed { code: Some(1) }),
            }
        }
    }

    /// Mock invoker that records calls and replays canned responses in
    /// order. Calls beyond the scripted responses succeed with no output.
    #[derive(Default)]
    pub struct MockInvoker {
        pub responses: Mutex<Vec<MockResponse>>,
        pub calls: Mutex<Vec<Vec<OsString>>>,
    }

    impl MockInvoker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn scripted(responses: Vec<MockResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn recorded_calls(&self) -> Vec<Vec<OsString>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolInvoker for MockInvoker {
        fn run(
            &self,
            args: &[OsString],
            stdout_file: Option<&Path>,
        ) -> Result<ToolOutput, ToolError> {
            self.calls.lock().unwrap().push(args.to_vec());

            let mut responses = self.responses.lock().unwrap();
            let response = if responses.is_empty() {
                MockResponse::ok(b"")
            } else {
                responses.remove(0)
            };

            response.result?;
            match stdout_file {
                Some(path) => {
                    std::fs::write(path, &response.stdout)?;
                    Ok(ToolOutput::default())
                }
                None => Ok(ToolOutput {
                    stdout: response.stdout,
                }),
            }
        }
    }

    #[test]
    fn resolve_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = dir.path().join("exiftool");
        std::fs::write(&binary, b"#!/bin/sh\n").unwrap();

        let tool = ExifTool::resolve(Some(&binary), Duration::from_secs(5)).unwrap();
        assert_eq!(tool.program(), binary);
    }

    #[test]
    fn resolve_explicit_path_missing_is_setup_error() {
        let result = ExifTool::resolve(
            Some(Path::new("/nonexistent/exiftool")),
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    #[cfg(unix)]
    fn run_captures_stdout() {
        let tool = ExifTool::at(PathBuf::from("/bin/echo"), Duration::from_secs(5));
        let output = tool.run(&args(&[&"hello"]), None).unwrap();
        assert_eq!(output.stdout, b"hello\n");
    }

    #[test]
    #[cfg(unix)]
    fn run_redirects_stdout_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.txt");

        let tool = ExifTool::at(PathBuf::from("/bin/echo"), Duration::from_secs(5));
        let output = tool.run(&args(&[&"payload"]), Some(&out)).unwrap();

        assert!(output.stdout.is_empty());
        assert_eq!(std::fs::read(&out).unwrap(), b"payload\n");
    }

    #[test]
    #[cfg(unix)]
    fn run_nonzero_exit_is_error() {
        let tool = ExifTool::at(PathBuf::from("/bin/false"), Duration::from_secs(5));
        let result = tool.run(&[], None);
        assert!(matches!(result, Err(ToolError::Failed { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn run_kills_hung_child_on_timeout() {
        let tool = ExifTool::at(PathBuf::from("/bin/sleep"), Duration::from_millis(100));
        let started = Instant::now();
        let result = tool.run(&args(&[&"5"]), None);

        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn mock_records_calls_and_replays_responses() {
        let mock = MockInvoker::scripted(vec![MockResponse::ok(b"first"), MockResponse::failed()]);

        let first = mock.run(&args(&[&"-json"]), None).unwrap();
        assert_eq!(first.stdout, b"first");

        let second = mock.run(&args(&[&"-b"]), None);
        assert!(second.is_err());

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], args(&[&"-json"]));
    }
}
