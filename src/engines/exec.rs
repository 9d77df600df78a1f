//! External process plumbing shared by every backend adapter and tool call.
//!
//! All synthesis engines and transcoding tools are separate executables, so
//! the contracts live here: PATH discovery (absence must be distinguishable
//! from runtime failure), stdin hand-off, and a hard wall-clock timeout that
//! kills the child instead of hanging the pipeline.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};

use crate::engines::Backend;
use crate::error::TtsError;

/// Locate an executable by scanning PATH.
///
/// Names containing a path separator are treated as explicit paths.
pub fn find_binary(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(name);
        return if p.exists() { Some(p) } else { None };
    }
    let paths = std::env::var("PATH").ok()?;
    const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };
    for dir in paths.split(PATH_SEPARATOR) {
        if dir.is_empty() {
            continue;
        }
        let candidate = Path::new(dir).join(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

enum RunOutcome {
    Finished(Output),
    TimedOut,
}

/// Spawn `command`, optionally feed `stdin_payload`, and wait at most
/// `timeout` for it to exit. The child is killed on timeout.
fn run_impl(
    mut command: Command,
    stdin_payload: Option<&str>,
    timeout: Duration,
) -> std::io::Result<RunOutcome> {
    command
        .stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;

    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            // Engines treat stdin as line-oriented input; without a final
            // newline the last token can be under-processed.
            let result = if payload.ends_with('\n') {
                stdin.write_all(payload.as_bytes())
            } else {
                stdin
                    .write_all(payload.as_bytes())
                    .and_then(|_| stdin.write_all(b"\n"))
            };
            match result {
                Ok(()) => {}
                // A child that exits before reading everything closes the
                // pipe; its exit status tells the real story.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
            }
        }
    }

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_handle = std::thread::spawn(move || drain(stdout_pipe));
    let stderr_handle = std::thread::spawn(move || drain(stderr_pipe));

    let deadline = Instant::now() + timeout;
    let status: ExitStatus = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(RunOutcome::TimedOut);
            }
            None => std::thread::sleep(Duration::from_millis(25)),
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(RunOutcome::Finished(Output {
        status,
        stdout,
        stderr,
    }))
}

fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Run a backend engine process to completion.
///
/// Maps a missing executable to [`TtsError::BackendUnavailable`], a timeout
/// to [`TtsError::BackendTimeout`], and a non-zero exit to
/// [`TtsError::BackendFailed`].
pub fn run_backend(
    backend: Backend,
    command: Command,
    stdin_payload: Option<&str>,
    timeout: Duration,
) -> Result<Output, TtsError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let outcome = run_impl(command, stdin_payload, timeout).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TtsError::BackendUnavailable {
                backend,
                detail: format!("`{program}` not found on PATH"),
            }
        } else {
            TtsError::Io(e)
        }
    })?;

    match outcome {
        RunOutcome::TimedOut => Err(TtsError::BackendTimeout {
            backend,
            seconds: timeout.as_secs(),
        }),
        RunOutcome::Finished(output) if !output.status.success() => {
            Err(TtsError::BackendFailed {
                backend,
                detail: stderr_snippet(&output),
            })
        }
        RunOutcome::Finished(output) => Ok(output),
    }
}

/// Run a transcoder/prober tool to completion.
///
/// Same timeout semantics as [`run_backend`], with the tool taxonomy:
/// a missing executable is [`TtsError::ToolUnavailable`], anything else that
/// goes wrong is [`TtsError::ToolFailed`].
pub fn run_tool(
    tool: &str,
    command: Command,
    stdin_payload: Option<&str>,
    timeout: Duration,
) -> Result<Output, TtsError> {
    let outcome = run_impl(command, stdin_payload, timeout).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TtsError::ToolUnavailable { tool: tool.to_string() }
        } else {
            TtsError::Io(e)
        }
    })?;

    match outcome {
        RunOutcome::TimedOut => Err(TtsError::ToolFailed {
            tool: tool.to_string(),
            detail: format!("timed out after {}s", timeout.as_secs()),
        }),
        RunOutcome::Finished(output) if !output.status.success() => Err(TtsError::ToolFailed {
            tool: tool.to_string(),
            detail: stderr_snippet(&output),
        }),
        RunOutcome::Finished(output) => Ok(output),
    }
}

fn stderr_snippet(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    let snippet: String = trimmed.chars().take(300).collect();
    if snippet.is_empty() {
        format!("exited with {:?}", output.status.code())
    } else {
        snippet
    }
}

#[cfg(test)]
mod tests {
    use super::{find_binary, run_backend, run_tool};
    use crate::engines::Backend;
    use crate::error::TtsError;
    use std::process::Command;
    use std::time::Duration;

    #[test]
    fn find_binary_misses_nonexistent_programs() {
        assert!(find_binary("definitely-not-a-real-binary-9f2c").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn find_binary_locates_sh() {
        assert!(find_binary("sh").is_some());
    }

    #[test]
    fn missing_backend_binary_maps_to_unavailable() {
        let cmd = Command::new("definitely-not-a-real-binary-9f2c");
        let err = run_backend(Backend::Espeak, cmd, None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TtsError::BackendUnavailable { backend: Backend::Espeak, .. }));
    }

    #[test]
    fn missing_tool_binary_maps_to_unavailable() {
        let cmd = Command::new("definitely-not-a-real-binary-9f2c");
        let err = run_tool("ffmpeg", cmd, None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TtsError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn hung_process_is_killed_and_reported_as_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30"]);
        let err = run_backend(Backend::Flite, cmd, None, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, TtsError::BackendTimeout { backend: Backend::Flite, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_maps_to_backend_failed_with_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_backend(Backend::Piper, cmd, None, Duration::from_secs(5)).unwrap_err();
        match err {
            TtsError::BackendFailed { backend, detail } => {
                assert_eq!(backend, Backend::Piper);
                assert!(detail.contains("boom"));
            }
            other => panic!("expected BackendFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stdin_payload_reaches_the_child() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "cat"]);
        let output =
            run_backend(Backend::Gtts, cmd, Some("hello"), Duration::from_secs(5)).unwrap();
        // Payloads are newline-terminated on the way in.
        assert_eq!(output.stdout, b"hello\n");
    }
}
