//! Explicit run context handed to collaborators

use std::path::{Path, PathBuf};

/// Run-scoped locations shared with the Platform Adapter and any process it
/// spawns. Built once per run by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub artefacts_root: PathBuf,
    pub run_dir: PathBuf,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, artefacts_root: impl Into<PathBuf>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            artefacts_root: artefacts_root.into(),
            run_dir: run_dir.into(),
        }
    }

    /// Directory the delegated test process may write into
    pub fn results_dir(&self) -> PathBuf {
        self.run_dir.join("results-e2e")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.run_dir.join("reports")
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Environment block for child processes targeting this run
    pub fn env_block(&self) -> Vec<(String, String)> {
        let root = self.artefacts_root.to_string_lossy().to_string();
        vec![
            ("ARTEFACTS_ROOT".to_string(), root.clone()),
            ("E2E_BASE_DIR".to_string(), root),
            ("E2E_RUN_ID".to_string(), self.run_id.clone()),
            ("RUN_ID".to_string(), self.run_id.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_block_targets_run() {
        let ctx = RunContext::new("r1", "/tmp/it", "/tmp/it/runs/r1");
        let env = ctx.env_block();
        assert!(env.contains(&("RUN_ID".to_string(), "r1".to_string())));
        assert!(env.contains(&("E2E_RUN_ID".to_string(), "r1".to_string())));
        assert!(env.contains(&("E2E_BASE_DIR".to_string(), "/tmp/it".to_string())));
        assert_eq!(ctx.results_dir(), PathBuf::from("/tmp/it/runs/r1/results-e2e"));
    }
}
