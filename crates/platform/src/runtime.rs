//! Container runtime detection and CLI invocation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use itrun_common::{ContainerSpec, E2eSpec, PlatformError, PlatformResult, RunContext};

/// Container runtime detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Detect available container runtime
    pub fn detect() -> Option<Self> {
        // Check podman first (rootless friendly)
        if Self::responds("podman") {
            return Some(Self::Podman);
        }
        if Self::responds("docker") {
            return Some(Self::Docker);
        }
        None
    }

    fn responds(cmd: &str) -> bool {
        Command::new(cmd)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Get the CLI command name
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    /// Run a CLI command to completion and return trimmed stdout
    pub async fn exec(&self, args: &[String]) -> PlatformResult<String> {
        debug!("{} {}", self.command(), args.join(" "));

        let output = AsyncCommand::new(self.command())
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformError::Runtime(format!(
                "{} {} failed: {}",
                self.command(),
                args.first().map(String::as_str).unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Runtime-level container name for a platform container within a run
pub fn container_name(run_id: &str, name: &str) -> String {
    format!("itrun-{}-{}", run_id, name)
}

/// Arguments for `run -d` of a platform container
pub fn run_args(spec: &ContainerSpec, run_id: &str, network: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        container_name(run_id, &spec.name),
        "--label".to_string(),
        format!("itrun.run-id={}", run_id),
    ];

    if let Some(net) = network {
        args.push("--network".to_string());
        args.push(net.to_string());
        args.push("--network-alias".to_string());
        args.push(spec.name.clone());
    }

    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(port.clone());
    }

    push_env(&mut args, &spec.env);

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Arguments for the foreground E2E container run
pub fn e2e_args(spec: &E2eSpec, ctx: &RunContext, network: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        container_name(&ctx.run_id, "e2e"),
        "--label".to_string(),
        format!("itrun.run-id={}", ctx.run_id),
    ];

    if let Some(net) = network {
        args.push("--network".to_string());
        args.push(net.to_string());
    }

    args.push("-v".to_string());
    args.push(format!("{}:{}", ctx.results_dir().display(), spec.results_path));

    // The run context comes first so a spec can still override individual keys
    let mut env: BTreeMap<String, String> = ctx.env_block().into_iter().collect();
    env.insert("E2E_OUTPUT_DIR".to_string(), spec.results_path.clone());
    env.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    push_env(&mut args, &env);

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

fn push_env(args: &mut Vec<String>, env: &BTreeMap<String, String>) {
    for (key, value) in env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "api".to_string(),
            image: "example/api:1".to_string(),
            env: BTreeMap::from([("MODE".to_string(), "test".to_string())]),
            ports: vec!["8080:8080".to_string()],
            command: vec!["serve".to_string()],
            health: None,
        }
    }

    #[test]
    fn test_runtime_command() {
        assert_eq!(ContainerRuntime::Docker.command(), "docker");
        assert_eq!(ContainerRuntime::Podman.command(), "podman");
    }

    #[test]
    fn test_run_args() {
        let args = run_args(&spec(), "r1", Some("net"));
        let joined = args.join(" ");
        assert!(joined.starts_with("run -d --name itrun-r1-api"));
        assert!(joined.contains("--network net --network-alias api"));
        assert!(joined.contains("-p 8080:8080"));
        assert!(joined.contains("-e MODE=test"));
        assert!(joined.ends_with("example/api:1 serve"));
    }

    #[test]
    fn test_e2e_args_mount_results_and_env() {
        let ctx = RunContext::new("r1", "/art", "/art/runs/r1");
        let e2e = E2eSpec {
            image: "example/e2e".to_string(),
            command: vec![],
            env: BTreeMap::from([("RUN_ID".to_string(), "custom".to_string())]),
            results_path: "/reports".to_string(),
        };

        let args = e2e_args(&e2e, &ctx, None);
        let joined = args.join(" ");
        assert!(joined.contains("-v /art/runs/r1/results-e2e:/reports"));
        assert!(joined.contains("-e E2E_RUN_ID=r1"));
        assert!(joined.contains("-e E2E_OUTPUT_DIR=/reports"));
        assert!(joined.contains("-e RUN_ID=custom"));
        assert!(!joined.contains("-e RUN_ID=r1"));
        assert_eq!(args.last().unwrap(), "example/e2e");
    }
}
