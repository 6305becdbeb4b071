//! Help text, generated from the flag table

use itrun_common::ExitCode;

use crate::flags::{FlagDefinition, FlagKind, FLAG_DEFINITIONS};

fn flag_names(def: &FlagDefinition) -> String {
    let hint = match def.kind {
        FlagKind::Boolean => "",
        FlagKind::String => " <value>",
        FlagKind::Number => " <ms>",
        FlagKind::StringOrBoolean => "[=<path>]",
    };
    match def.alias {
        Some(alias) => format!("-{}, --{}{}", alias, def.name, hint),
        None => format!("--{}{}", def.name, hint),
    }
}

pub fn build_usage() -> String {
    let mut lines: Vec<String> = vec![
        "Integration Tests Runner".to_string(),
        String::new(),
        "Usage:".to_string(),
        "  it-runner [options]".to_string(),
        String::new(),
        "Options:".to_string(),
    ];

    for def in FLAG_DEFINITIONS {
        let example = def.example.map(|e| format!(" (e.g., {})", e)).unwrap_or_default();
        lines.push(format!("  {:<32} {}{}", flag_names(def), def.description, example));
    }

    lines.push(String::new());
    lines.push("Output:".to_string());
    lines.push("  integration-tests/runs/<runId>/{logs,reports,results-e2e,summary.json}".to_string());

    lines.push(String::new());
    lines.push("Exit Codes:".to_string());
    for code in ExitCode::ALL {
        lines.push(format!("  {} - {}", code, code.describe()));
    }

    let env_vars: Vec<&str> = FLAG_DEFINITIONS.iter().filter_map(|def| def.env_var).collect();
    lines.push(String::new());
    lines.push("Environment Overrides:".to_string());
    lines.push(format!("  {}", env_vars.join(", ")));
    lines.push("  RUN_ID, E2E_RUN_ID (run id), E2E_BASE_DIR (E2E output location), RUST_LOG".to_string());

    lines.push(String::new());
    lines.push("Examples:".to_string());
    lines.push("  it-runner --dry-run".to_string());
    lines.push("  it-runner --container-logs logs/containers.log --verbose".to_string());

    lines.join("\n")
}
