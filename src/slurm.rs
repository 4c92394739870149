//! Interface to the Slurm command-line tools
//!
//! This module locates `sacct`, `squeue` and `scancel`, builds their command
//! lines from the configuration, runs them with a timeout and turns their
//! fixed-width output into [`Table`]s.

use chrono::NaiveDateTime;
use crate::models::{FormatConfig, SystemConfig, Table};
use crate::parser::{parse_output, ParseError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running command is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How the Slurm binary path was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    /// Explicitly configured via config file or environment variable
    Configured,
    /// Auto-detected via PATH (found sacct in user's PATH)
    AutoDetected,
    /// Fell back to default /usr/bin and sacct was found there
    Fallback,
    /// Fell back to default /usr/bin but sacct was NOT found (likely misconfigured)
    FallbackUnverified,
}

/// Result of finding the Slurm binary path
#[derive(Debug, Clone)]
pub struct SlurmPathResult {
    pub path: PathBuf,
    pub resolution: PathResolution,
}

/// Find the directory containing Slurm binaries.
///
/// Resolution order:
/// 1. Explicit path provided (from config), if it is an existing directory.
/// 2. Auto-detect via PATH using the `which` crate to find `sacct`, then take
///    the parent directory.
/// 3. Fallback to `/usr/bin`.
pub fn find_slurm_bin_path(config_path: Option<&Path>) -> SlurmPathResult {
    if let Some(path) = config_path {
        if path.is_dir() {
            return SlurmPathResult {
                path: path.to_path_buf(),
                resolution: PathResolution::Configured,
            };
        }
        tracing::warn!(
            "configured slurm_bin_path '{}' is not a valid directory, trying auto-detection",
            path.display()
        );
    }

    if let Ok(sacct_path) = which::which("sacct")
        && let Some(parent) = sacct_path.parent()
    {
        return SlurmPathResult {
            path: parent.to_path_buf(),
            resolution: PathResolution::AutoDetected,
        };
    }

    let fallback_path = PathBuf::from("/usr/bin");
    if fallback_path.join("sacct").exists() {
        SlurmPathResult {
            path: fallback_path,
            resolution: PathResolution::Fallback,
        }
    } else {
        tracing::warn!(
            "Slurm binaries not found in PATH or {}, commands may fail",
            fallback_path.display()
        );
        SlurmPathResult {
            path: fallback_path,
            resolution: PathResolution::FallbackUnverified,
        }
    }
}

/// Failure to obtain usable output from an external Slurm command
#[derive(Debug, Error)]
pub enum SlurmError {
    #[error("{program} not found at '{}'", path.display())]
    NotFound { program: String, path: PathBuf },

    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {}: {}", describe_code(*code), stderr.trim())]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} unresponsive: no result after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("could not parse {program} output: {source}")]
    Parse {
        program: String,
        #[source]
        source: ParseError,
    },
}

/// Exit code for messages; `None` means killed by a signal
pub(crate) fn describe_code(code: Option<i32>) -> String {
    code.map_or("unknown".to_string(), |c| c.to_string())
}

/// Everything a finished command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Read a pipe to EOF on its own thread, delivering the bytes once.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Run a pre-built command to completion, killing it after `timeout`.
///
/// Both pipes are drained while waiting so a chatty command cannot block on
/// a full pipe. A non-zero exit is not an error here; callers decide.
pub fn run_command(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, SlurmError> {
    let program = Path::new(cmd.get_program())
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    tracing::debug!("running {:?}", cmd);

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => SlurmError::NotFound {
                program: program.clone(),
                path: PathBuf::from(cmd.get_program()),
            },
            _ => SlurmError::Spawn {
                program: program.clone(),
                source,
            },
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                // Reader threads are left to finish on their own; they end
                // once every process holding the pipes has exited.
                let _ = child.kill();
                let _ = child.wait();
                return Err(SlurmError::Timeout {
                    program,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(SlurmError::Spawn { program, source }),
        }
    };

    // A background grandchild can keep the pipes open after the child exits
    let collect = |rx: mpsc::Receiver<Vec<u8>>| {
        rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .map_err(|_| SlurmError::Timeout {
                program: program.clone(),
                secs: timeout.as_secs(),
            })
    };
    let stdout = collect(stdout)?;
    let stderr = collect(stderr)?;

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Layout `sacct --starttime` accepts unambiguously
const STARTTIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Arguments for `sacct`: every key at `width`, plus optional bounds.
#[must_use]
pub fn sacct_args(
    format: &FormatConfig,
    start: Option<NaiveDateTime>,
    partition: Option<&str>,
) -> Vec<String> {
    let keys = format
        .sacct_keys
        .iter()
        .map(|key| format!("{}%{}", key, format.field_width))
        .collect::<Vec<_>>()
        .join(",");

    let mut args = vec!["--format".to_string(), keys];
    if let Some(start) = start {
        args.extend([
            "--starttime".to_string(),
            start.format(STARTTIME_LAYOUT).to_string(),
        ]);
    }
    if let Some(partition) = partition {
        args.extend(["--partition".to_string(), partition.to_string()]);
    }
    args
}

/// Arguments for `squeue`.
///
/// `squeue` pads each field to exactly the requested size with no separator,
/// so asking for `width + 1` gives the same chunk stride as `sacct`.
#[must_use]
pub fn squeue_args(format: &FormatConfig, partition: Option<&str>) -> Vec<String> {
    let keys = format
        .squeue_keys
        .iter()
        .map(|key| format!("{}:{}", key, format.field_width + 1))
        .collect::<Vec<_>>()
        .join(",");

    let mut args = vec![format!("--Format={keys}")];
    if let Some(partition) = partition {
        args.push(format!("--partition={partition}"));
    }
    args
}

/// Slurm interface for calling sacct/squeue/scancel
#[derive(Debug, Clone)]
pub struct SlurmInterface {
    /// Path to directory containing Slurm binaries
    pub slurm_bin_path: PathBuf,
    /// How the path was resolved (for diagnostics)
    pub resolution: PathResolution,
    /// Upper bound on every external command
    pub timeout: Duration,
}

impl SlurmInterface {
    /// Create a new SlurmInterface using configuration.
    pub fn with_config(config: &SystemConfig) -> Self {
        let result = find_slurm_bin_path(config.slurm_bin_path.as_deref());
        tracing::debug!(
            "using Slurm binaries in '{}' ({:?})",
            result.path.display(),
            result.resolution
        );
        Self {
            slurm_bin_path: result.path,
            resolution: result.resolution,
            timeout: Duration::from_secs(config.command_timeout),
        }
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(self.slurm_bin_path.join(program));
        cmd.args(args);
        cmd
    }

    /// Run a listing command and parse its fixed-width output.
    ///
    /// A non-zero exit or an output without header is an error, so a failed
    /// tool never produces a partial table.
    fn query(
        &self,
        program: &str,
        args: &[String],
        format: &FormatConfig,
    ) -> Result<Table, SlurmError> {
        let output = run_command(self.command(program, args), self.timeout)?;
        if !output.success {
            return Err(SlurmError::NonZeroExit {
                program: program.to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }
        parse_output(&output.stdout, format).map_err(|source| SlurmError::Parse {
            program: program.to_string(),
            source,
        })
    }

    /// Query the accounting database.
    ///
    /// # Arguments
    /// * `start` - Already validated threshold, passed as `--starttime`
    /// * `partition` - Passed through as `--partition` when set
    pub fn sacct(
        &self,
        format: &FormatConfig,
        start: Option<NaiveDateTime>,
        partition: Option<&str>,
    ) -> Result<Table, SlurmError> {
        self.query("sacct", &sacct_args(format, start, partition), format)
    }

    /// Take a snapshot of the queue.
    pub fn squeue(
        &self,
        format: &FormatConfig,
        partition: Option<&str>,
    ) -> Result<Table, SlurmError> {
        self.query("squeue", &squeue_args(format, partition), format)
    }

    /// Cancel one job. The raw output is returned for classification.
    pub fn scancel(&self, job_id: &str) -> Result<CommandOutput, SlurmError> {
        run_command(self.command("scancel", &[job_id.to_string()]), self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_threshold;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn format() -> FormatConfig {
        FormatConfig {
            field_width: 10,
            sacct_keys: vec!["JobID".into(), "State".into()],
            squeue_keys: vec!["JobID".into(), "State".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_sacct_args() {
        assert_eq!(
            sacct_args(&format(), None, None),
            ["--format", "JobID%10,State%10"]
        );
    }

    #[test]
    fn test_sacct_args_start_uses_iso_layout() {
        let start = parse_threshold("2024-01-01 08:30:00");
        assert_eq!(
            sacct_args(&format(), start, Some("gpu")),
            [
                "--format",
                "JobID%10,State%10",
                "--starttime",
                "2024-01-01T08:30:00",
                "--partition",
                "gpu"
            ]
        );
    }

    #[test]
    fn test_sacct_args_skip_unparseable_start() {
        let start = parse_threshold("not-a-date");
        assert_eq!(start, None);
        assert_eq!(
            sacct_args(&format(), start, None),
            ["--format", "JobID%10,State%10"]
        );
    }

    #[test]
    fn test_squeue_args() {
        assert_eq!(squeue_args(&format(), None), ["--Format=JobID:11,State:11"]);
        assert_eq!(
            squeue_args(&format(), Some("cpu")),
            ["--Format=JobID:11,State:11", "--partition=cpu"]
        );
    }

    #[test]
    fn test_run_command_captures_output() {
        let output = run_command(sh("echo out; echo err >&2"), Duration::from_secs(5)).unwrap();
        assert!(output.success);
        assert_eq!(output.code, Some(0));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn test_run_command_reports_exit_code() {
        let output = run_command(sh("exit 3"), Duration::from_secs(5)).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
    }

    #[test]
    fn test_run_command_times_out() {
        let err = run_command(sh("sleep 5"), Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, SlurmError::Timeout { .. }));
        assert!(err.to_string().contains("unresponsive"));
    }

    #[test]
    fn test_run_command_bounded_by_background_pipe_holder() {
        let started = Instant::now();
        let err =
            run_command(sh("sleep 5 & echo started"), Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, SlurmError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_run_command_missing_binary() {
        let cmd = Command::new("/nonexistent/bin/sacct");
        let err = run_command(cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SlurmError::NotFound { .. }));
        assert!(err.to_string().contains("sacct not found"));
    }

    #[test]
    fn test_query_rejects_failed_tool() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sacct");
        std::fs::write(&script, "#!/bin/sh\necho 'sacct: error: boom' >&2\nexit 1\n").unwrap();
        make_executable(&script);

        let slurm = SlurmInterface {
            slurm_bin_path: dir.path().to_path_buf(),
            resolution: PathResolution::Configured,
            timeout: Duration::from_secs(5),
        };
        let err = slurm.sacct(&format(), None, None).unwrap_err();
        assert!(matches!(err, SlurmError::NonZeroExit { code: Some(1), .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_query_parses_tool_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sacct");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo 'JobID      State      '\n\
             echo '---------- ---------- '\n\
             echo '42         RUNNING    '\n\
             echo\n",
        )
        .unwrap();
        make_executable(&script);

        let slurm = SlurmInterface {
            slurm_bin_path: dir.path().to_path_buf(),
            resolution: PathResolution::Configured,
            timeout: Duration::from_secs(5),
        };
        let table = slurm.sacct(&format(), None, None).unwrap();
        assert_eq!(table.header.columns(), ["JobID", "State"]);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].get("State"), Some("RUNNING"));
    }

    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
