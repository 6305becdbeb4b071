//! it-runner: run the integration-test platform once and report

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use itrun::artefacts::{self, ArtefactsManager};
use itrun::signals::{self, ShutdownSignal};
use itrun::{flags, usage, IntegrationRunner};
use itrun_common::config::DEFAULT_CONFIG_PATH;
use itrun_platform::DockerPlatform;

#[tokio::main]
async fn main() -> anyhow::Result<std::process::ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let env: HashMap<String, String> = std::env::vars().collect();

    let parsed = flags::parse(&args, &env)
        .and_then(|options| artefacts::resolve_run_id(&env).map(|run_id| (options, run_id)));
    let (options, run_id) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            eprintln!();
            eprintln!("{}", usage::build_usage());
            return Ok(itrun_common::ExitCode::ConfigInvalid.into());
        }
    };

    if options.help {
        eprintln!("{}", usage::build_usage());
        return Ok(itrun_common::ExitCode::Success.into());
    }

    // Handlers go in before any file or container is touched
    let shutdown = ShutdownSignal::new();
    let listener = signals::listen(shutdown.clone())?;

    // Initialize logging
    let log_level = if options.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir()?;
    let run_artefacts = ArtefactsManager::new(options.artefacts_dir.as_deref().map(Path::new), &run_id)
        .with_e2e_output_dir(artefacts::e2e_output_dir(&cwd, &env, &run_id));

    let config_path = options
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let platform = DockerPlatform::from_path(&cwd.join(config_path));

    let mut runner = IntegrationRunner::new(options, run_artefacts, Box::new(platform)).with_shutdown(shutdown);
    let code = runner.run().await;
    listener.abort();

    Ok(code.into())
}
