//! Runs one test program through a variant's command.
//!
//! The program text goes to a fresh temporary file that is removed when the
//! run ends, whatever the outcome. Any exit status is a successful run; only
//! failing to start, or running past the timeout, is an error.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use miette::Diagnostic;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\((PROGRAM_PATH|PROGRAM)\)").expect("static regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i64,
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("can't execute an empty command")]
    #[diagnostic(
        code(spectest::run::empty_command),
        help("set `testCommand` on the implementation variant")
    )]
    EmptyCommand,

    #[error("couldn't write the test program to a temporary file")]
    #[diagnostic(code(spectest::run::temp_file))]
    TempFile(#[source] io::Error),

    #[error("couldn't start '{program}'")]
    #[diagnostic(code(spectest::run::spawn))]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("lost track of the running program")]
    #[diagnostic(code(spectest::run::wait))]
    Wait(#[source] io::Error),

    #[error("program did not finish within {}s and was killed", .timeout.as_secs_f64())]
    #[diagnostic(
        code(spectest::run::timeout),
        help("raise the limit with --timeout if the implementation is just slow")
    )]
    TimedOut { timeout: Duration },
}

/// Substitutes `$(PROGRAM)` and `$(PROGRAM_PATH)` in every token. Replacement
/// text is never rescanned, so a program containing `$(PROGRAM_PATH)` is
/// passed through verbatim.
pub fn format_command(command: &[String], program: &str, program_path: &str) -> Vec<String> {
    command
        .iter()
        .map(|token| {
            PLACEHOLDER
                .replace_all(token, |caps: &Captures| match &caps[1] {
                    "PROGRAM" => program.to_string(),
                    _ => program_path.to_string(),
                })
                .into_owned()
        })
        .collect()
}

pub fn run_program(
    command: &[String],
    program: &str,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, RunnerError> {
    let mut file = tempfile::Builder::new()
        .prefix("spec-test")
        .tempfile()
        .map_err(RunnerError::TempFile)?;
    file.write_all(program.as_bytes())
        .and_then(|_| file.flush())
        .map_err(RunnerError::TempFile)?;

    let path = file.path().to_string_lossy().into_owned();
    let argv = format_command(command, program, &path);
    let Some((binary, args)) = argv.split_first() else {
        return Err(RunnerError::EmptyCommand);
    };
    if binary.trim().is_empty() {
        return Err(RunnerError::EmptyCommand);
    }

    debug!(command = ?argv, "running command");
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            program: binary.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait(&mut child, timeout)?;
    let stdout = join(stdout)?;
    let stderr = join(stderr)?;

    // `file` lives until here so the program can read it the whole time.
    drop(file);

    Ok(ProcessOutput {
        stdout,
        stderr,
        exit_code: status.code().map(i64::from).unwrap_or(-1),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut bytes)?;
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
}

fn join(handle: JoinHandle<io::Result<String>>) -> Result<String, RunnerError> {
    handle
        .join()
        .map_err(|_| RunnerError::Wait(io::Error::other("output reader panicked")))?
        .map_err(RunnerError::Wait)
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, RunnerError> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(RunnerError::Wait);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(RunnerError::Wait)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RunnerError::TimedOut { timeout });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn placeholders_are_substituted_once() {
        let command = strings(&["scheme", "--eval=$(PROGRAM)", "$(PROGRAM_PATH)", "x$(PROGRAM)y"]);
        let formatted = format_command(&command, "(display \"$(PROGRAM_PATH)\")", "/tmp/p");
        assert_eq!(
            formatted,
            strings(&[
                "scheme",
                "--eval=(display \"$(PROGRAM_PATH)\")",
                "/tmp/p",
                "x(display \"$(PROGRAM_PATH)\")y",
            ])
        );
    }

    #[test]
    fn empty_command_is_an_error() {
        assert!(matches!(
            run_program(&[], "1", None),
            Err(RunnerError::EmptyCommand)
        ));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let command = strings(&["/definitely/not/a/real/binary", "$(PROGRAM_PATH)"]);
        assert!(matches!(
            run_program(&command, "1", None),
            Err(RunnerError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_code() {
        let command = strings(&["sh", "-c", "cat \"$1\"; echo oops >&2; exit 3", "sh", "$(PROGRAM_PATH)"]);
        let output = run_program(&command, "hello", None).unwrap();
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.exit_code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn temp_file_is_removed_afterwards() {
        let command = strings(&["echo", "$(PROGRAM_PATH)"]);
        let output = run_program(&command, "x", None).unwrap();
        let path = output.stdout.trim();
        assert!(path.contains("spec-test"));
        assert!(!std::path::Path::new(path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn slow_programs_time_out() {
        let command = strings(&["sleep", "5"]);
        let started = Instant::now();
        let err = run_program(&command, "", Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, RunnerError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn temp_file_is_removed_after_a_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("program-path");
        let script = format!("echo \"$1\" > '{}'; sleep 10", marker.display());
        let command = strings(&["sh", "-c", &script, "sh", "$(PROGRAM_PATH)"]);

        let err = run_program(&command, "(loop)", Some(Duration::from_secs(1))).unwrap_err();
        assert!(matches!(err, RunnerError::TimedOut { .. }));

        let recorded = std::fs::read_to_string(&marker).unwrap();
        let program_path = std::path::Path::new(recorded.trim());
        assert!(program_path.to_string_lossy().contains("spec-test"));
        assert!(!program_path.exists());
    }
}
