//! Health checks for platform containers

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use itrun_common::{PlatformError, PlatformResult};

use crate::runtime::ContainerRuntime;

/// Poll an HTTP endpoint until it answers with a success status or `deadline` passes
pub async fn wait_for_http(name: &str, url: &str, interval: Duration, deadline: Instant) -> PlatformResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| PlatformError::Http(e.to_string()))?;

    let mut attempts = 0;

    while Instant::now() < deadline {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("{} is healthy ({} attempt(s))", name, attempts);
                return Ok(());
            }
            Ok(resp) => {
                debug!("{} health check returned {}", name, resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to become healthy...", name);
                }
                // Connection refused is expected while the service is starting
                if !e.is_connect() {
                    warn!("{} health check error: {}", name, e);
                }
            }
        }

        sleep(interval).await;
    }

    Err(PlatformError::HealthCheck {
        name: name.to_string(),
        attempts,
    })
}

/// Poll the runtime until the container reports a running state or `deadline` passes
pub async fn wait_for_running(
    runtime: ContainerRuntime,
    name: &str,
    id: &str,
    interval: Duration,
    deadline: Instant,
) -> PlatformResult<()> {
    let args = vec![
        "inspect".to_string(),
        "-f".to_string(),
        "{{.State.Running}}".to_string(),
        id.to_string(),
    ];
    let mut attempts = 0;

    while Instant::now() < deadline {
        attempts += 1;

        match runtime.exec(&args).await {
            Ok(state) if state == "true" => {
                info!("{} is running", name);
                return Ok(());
            }
            Ok(state) => debug!("{} state: running={}", name, state),
            Err(e) => warn!("{} inspect failed: {}", name, e),
        }

        sleep(interval).await;
    }

    Err(PlatformError::HealthCheck {
        name: name.to_string(),
        attempts,
    })
}
