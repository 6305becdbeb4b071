//! Run-scoped artefact directory tree
//!
//! ```text
//! <root>/
//! ├── local/                    shared across runs
//! └── runs/<runId>/
//!     ├── logs/runner-output.log
//!     ├── logs/containers.log
//!     ├── reports/
//!     ├── results-e2e/          written by the E2E process
//!     ├── e2e-results/          copied in at collection time
//!     └── summary.json
//! ```

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use itrun_common::RunSummary;

use crate::error::{ConfigSyntaxError, RunnerResult};

pub const DEFAULT_ARTEFACTS_ROOT: &str = "integration-tests";
pub const RUNS_DIR: &str = "runs";
pub const LOCAL_ARTEFACTS_DIR: &str = "local";
pub const DEFAULT_RUN_ID: &str = "local";

/// Default base of the external E2E output, relative to the working directory
pub const DEFAULT_E2E_BASE_DIR: &str = "artefacts";
pub const E2E_OUTPUT_DIR: &str = "e2e-results";

/// Generate a run id sortable by creation time: `YYYYMMDD-HHMMSS-xxxx`
pub fn generate_run_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), suffix)
}

/// A run id is used as a single directory name under `runs/`
pub fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty() && run_id != "." && run_id != ".." && !run_id.contains(['/', '\\'])
}

/// `RUN_ID`, then `E2E_RUN_ID`, else a freshly generated id
pub fn resolve_run_id(env: &HashMap<String, String>) -> Result<String, ConfigSyntaxError> {
    let explicit = ["RUN_ID", "E2E_RUN_ID"]
        .iter()
        .filter_map(|var| env.get(*var).map(|value| (*var, value)))
        .find(|(_, value)| !value.trim().is_empty());

    match explicit {
        Some((_, value)) if is_valid_run_id(value) => Ok(value.clone()),
        Some((var, value)) => Err(ConfigSyntaxError::InvalidRunId {
            var: var.to_string(),
            value: value.clone(),
        }),
        None => Ok(generate_run_id()),
    }
}

/// Where the external E2E process leaves its output for `run_id`:
/// `<cwd>/<E2E_BASE_DIR>/<runId>/e2e-results`
pub fn e2e_output_dir(cwd: &Path, env: &HashMap<String, String>, run_id: &str) -> PathBuf {
    let base = env
        .get("E2E_BASE_DIR")
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or(DEFAULT_E2E_BASE_DIR);

    let mut path = cwd.join(base);
    if !run_id.is_empty() {
        path.push(run_id);
    }
    path.push(E2E_OUTPUT_DIR);
    normalize_path(&path)
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve the artefacts root against the working directory
pub fn resolve_artefacts_root(base: Option<&Path>) -> PathBuf {
    let base = base.unwrap_or_else(|| Path::new(DEFAULT_ARTEFACTS_ROOT));
    normalize_path(&current_dir().join(base))
}

/// Paths and writers for one run's artefacts
#[derive(Debug, Clone)]
pub struct ArtefactsManager {
    run_id: String,
    artefacts_root: PathBuf,
    run_dir: PathBuf,
    local_dir: PathBuf,
    logs_dir: PathBuf,
    runner_log_path: PathBuf,
    e2e_output_dir: PathBuf,
}

impl ArtefactsManager {
    /// Resolve (not create) every path for `run_id` under `base_dir`
    pub fn new(base_dir: Option<&Path>, run_id: &str) -> Self {
        let run_id = if run_id.trim().is_empty() { DEFAULT_RUN_ID } else { run_id };
        let artefacts_root = resolve_artefacts_root(base_dir);
        let run_dir = artefacts_root.join(RUNS_DIR).join(run_id);
        let local_dir = artefacts_root.join(LOCAL_ARTEFACTS_DIR);
        let logs_dir = run_dir.join("logs");
        let runner_log_path = logs_dir.join("runner-output.log");
        let e2e_output_dir = normalize_path(&current_dir().join(DEFAULT_E2E_BASE_DIR).join(E2E_OUTPUT_DIR));

        Self {
            run_id: run_id.to_string(),
            artefacts_root,
            run_dir,
            local_dir,
            logs_dir,
            runner_log_path,
            e2e_output_dir,
        }
    }

    /// Override the external E2E output location copied at collection time
    pub fn with_e2e_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.e2e_output_dir = normalize_path(&current_dir().join(dir.as_ref()));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn artefacts_root(&self) -> &Path {
        &self.artefacts_root
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn runner_log_path(&self) -> &Path {
        &self.runner_log_path
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join("summary.json")
    }

    pub fn e2e_output_dir(&self) -> &Path {
        &self.e2e_output_dir
    }

    /// Create the run tree and the shared local dir. Idempotent.
    pub fn ensure_directories(&self) -> RunnerResult<()> {
        std::fs::create_dir_all(&self.run_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        std::fs::create_dir_all(self.run_dir.join("reports"))?;
        std::fs::create_dir_all(self.run_dir.join("results-e2e"))?;
        std::fs::create_dir_all(&self.local_dir)?;
        Ok(())
    }

    /// Append a timestamped line to the runner log
    pub fn write_log_line(&self, message: &str) -> RunnerResult<()> {
        if let Some(parent) = self.runner_log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.runner_log_path)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        file.write_all(format!("[{}] {}\n", timestamp, message).as_bytes())?;
        Ok(())
    }

    /// Write `summary.json`, replacing any previous content
    pub fn write_summary(&self, summary: &RunSummary) -> RunnerResult<PathBuf> {
        let path = self.summary_path();
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&path, json)?;
        debug!("Summary written to: {}", path.display());
        Ok(path)
    }

    /// Copy the external E2E output into `<runDir>/e2e-results`.
    ///
    /// Returns the number of files copied. Nothing happens when the source is
    /// missing or already is the destination.
    pub fn copy_e2e_results(&self) -> RunnerResult<usize> {
        let source = normalize_path(&self.e2e_output_dir);
        let target = normalize_path(&self.run_dir.join(E2E_OUTPUT_DIR));

        if source == target {
            debug!("E2E output already in run dir: {}", target.display());
            return Ok(0);
        }
        if !source.is_dir() {
            debug!("No E2E output at {}", source.display());
            return Ok(0);
        }

        let mut copied = 0;
        // Skip the destination when it sits inside the source tree
        let walker = WalkDir::new(&source)
            .into_iter()
            .filter_entry(|entry| !entry.path().starts_with(&target));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let relative = match entry.path().strip_prefix(&source) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let dest = target.join(relative);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(entry.path(), &dest)?;
                copied += 1;
            }
        }

        info!("Copied {} E2E result file(s) to {}", copied, target.display());
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itrun_common::{ExitCode, RunMode, RunStatus};
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ArtefactsManager {
        ArtefactsManager::new(Some(dir.path()), "20260101-000000-abcd")
    }

    #[test]
    fn test_paths_are_resolved_not_created() {
        let dir = TempDir::new().unwrap();
        let artefacts = manager(&dir);

        assert_eq!(artefacts.run_dir(), dir.path().join("runs/20260101-000000-abcd"));
        assert_eq!(artefacts.local_dir(), dir.path().join("local"));
        assert_eq!(artefacts.runner_log_path(), artefacts.run_dir().join("logs/runner-output.log"));
        assert!(!artefacts.run_dir().exists());
    }

    #[test]
    fn test_relative_base_joins_cwd() {
        let artefacts = ArtefactsManager::new(Some(Path::new("out/../artefacts")), "r1");
        let expected = std::env::current_dir().unwrap().join("artefacts");
        assert_eq!(artefacts.artefacts_root(), expected);
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let artefacts = manager(&dir);

        artefacts.ensure_directories().unwrap();
        artefacts.ensure_directories().unwrap();

        for sub in ["logs", "reports", "results-e2e"] {
            assert!(artefacts.run_dir().join(sub).is_dir(), "missing {}", sub);
        }
        assert!(artefacts.local_dir().is_dir());
    }

    #[test]
    fn test_write_log_line_appends() {
        let dir = TempDir::new().unwrap();
        let artefacts = manager(&dir);

        artefacts.write_log_line("first").unwrap();
        artefacts.write_log_line("second").unwrap();

        let content = std::fs::read_to_string(artefacts.runner_log_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }

    #[test]
    fn test_write_summary_overwrites() {
        let dir = TempDir::new().unwrap();
        let artefacts = manager(&dir);
        artefacts.ensure_directories().unwrap();

        let now = Utc::now();
        let first = RunSummary::new("r", now, now, ExitCode::E2eFailure, RunStatus::Failure, RunMode::E2e, None);
        let second = RunSummary::new("r", now, now, ExitCode::Success, RunStatus::Success, RunMode::E2e, None);
        artefacts.write_summary(&first).unwrap();
        let path = artefacts.write_summary(&second).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["exitCode"], 0);
        assert_eq!(value["status"], "success");
    }

    #[test]
    fn test_copy_e2e_results() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("external/e2e-results");
        std::fs::create_dir_all(source.join("traces")).unwrap();
        std::fs::write(source.join("report.xml"), "<testsuite/>").unwrap();
        std::fs::write(source.join("traces/t1.zip"), "zip").unwrap();

        let artefacts = manager(&dir).with_e2e_output_dir(&source);
        artefacts.ensure_directories().unwrap();

        assert_eq!(artefacts.copy_e2e_results().unwrap(), 2);
        let target = artefacts.run_dir().join("e2e-results");
        assert_eq!(std::fs::read_to_string(target.join("report.xml")).unwrap(), "<testsuite/>");
        assert!(target.join("traces/t1.zip").is_file());
    }

    #[test]
    fn test_copy_is_noop_when_source_is_destination() {
        let dir = TempDir::new().unwrap();
        let base = manager(&dir);
        let target = base.run_dir().join("e2e-results");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("report.xml"), "x").unwrap();

        let e2e_dir = base.run_dir().join("./e2e-results");
        let artefacts = base.with_e2e_output_dir(e2e_dir);
        assert_eq!(artefacts.copy_e2e_results().unwrap(), 0);
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 1);
    }

    #[test]
    fn test_copy_from_run_dir_skips_destination() {
        let dir = TempDir::new().unwrap();
        let base = manager(&dir);
        base.ensure_directories().unwrap();
        std::fs::write(base.run_dir().join("reports/junit.xml"), "x").unwrap();

        let artefacts = base.clone().with_e2e_output_dir(base.run_dir());
        artefacts.copy_e2e_results().unwrap();

        let target = base.run_dir().join("e2e-results");
        assert!(target.join("reports/junit.xml").is_file());
        assert!(!target.join("e2e-results").exists());
    }

    #[test]
    fn test_missing_source_is_noop() {
        let dir = TempDir::new().unwrap();
        let artefacts = manager(&dir).with_e2e_output_dir(dir.path().join("nope"));
        assert_eq!(artefacts.copy_e2e_results().unwrap(), 0);
        assert!(!artefacts.run_dir().join("e2e-results").exists());
    }

    #[test]
    fn test_run_id_format_and_override() {
        let id = generate_run_id();
        assert_eq!(id.len(), "20260101-000000-abcd".len());
        assert_eq!(id.as_bytes()[8], b'-');
        assert_eq!(id.as_bytes()[15], b'-');

        let env = HashMap::from([
            ("E2E_RUN_ID".to_string(), "from-e2e".to_string()),
            ("RUN_ID".to_string(), String::new()),
        ]);
        assert_eq!(resolve_run_id(&env).unwrap(), "from-e2e");

        let env = HashMap::from([("RUN_ID".to_string(), "explicit".to_string())]);
        assert_eq!(resolve_run_id(&env).unwrap(), "explicit");
    }

    #[test]
    fn test_run_id_cannot_leave_runs_dir() {
        for value in ["../../x", "a/b", "..", "a\\b"] {
            let env = HashMap::from([("RUN_ID".to_string(), value.to_string())]);
            let err = resolve_run_id(&env).unwrap_err();
            assert_eq!(
                err,
                ConfigSyntaxError::InvalidRunId { var: "RUN_ID".to_string(), value: value.to_string() }
            );
        }

        let env = HashMap::from([("E2E_RUN_ID".to_string(), "../escape".to_string())]);
        assert!(resolve_run_id(&env).is_err());
    }

    #[test]
    fn test_e2e_output_dir_uses_resolved_run_id() {
        let cwd = Path::new("/work");
        let env = HashMap::from([("RUN_ID".to_string(), "r1".to_string())]);
        let run_id = resolve_run_id(&env).unwrap();
        assert_eq!(e2e_output_dir(cwd, &env, &run_id), PathBuf::from("/work/artefacts/r1/e2e-results"));

        let env = HashMap::from([("E2E_BASE_DIR".to_string(), "/abs/base".to_string())]);
        assert_eq!(e2e_output_dir(cwd, &env, "r9"), PathBuf::from("/abs/base/r9/e2e-results"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_path(Path::new("/a/../../b")), PathBuf::from("/b"));
    }
}
