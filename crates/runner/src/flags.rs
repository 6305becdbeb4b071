//! Declarative flag registry and parser
//!
//! [`FLAG_DEFINITIONS`] is the single source of truth for what the runner
//! accepts: parsing, defaulting, environment overrides and help text are all
//! derived from it. Values resolve with the precedence
//! CLI argument > environment variable > declared default.

use std::collections::{BTreeMap, HashMap};

use crate::error::ConfigSyntaxError;

/// How a flag's value is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Presence means on; `--flag=false` turns it off
    Boolean,
    /// Requires a value
    String,
    /// Requires a non-negative integer
    Number,
    /// Bare flag means on, or takes an optional value
    StringOrBoolean,
}

/// Declared default of a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagDefault {
    Bool(bool),
    Str(&'static str),
    Number(u64),
}

/// A resolved flag value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    Number(u64),
}

impl From<FlagDefault> for FlagValue {
    fn from(default: FlagDefault) -> Self {
        match default {
            FlagDefault::Bool(b) => FlagValue::Bool(b),
            FlagDefault::Str(s) => FlagValue::Str(s.to_string()),
            FlagDefault::Number(n) => FlagValue::Number(n),
        }
    }
}

/// One entry of the flag table
#[derive(Debug, Clone, Copy)]
pub struct FlagDefinition {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub description: &'static str,
    pub kind: FlagKind,
    pub env_var: Option<&'static str>,
    pub default: Option<FlagDefault>,
    pub example: Option<&'static str>,
}

pub static FLAG_DEFINITIONS: &[FlagDefinition] = &[
    FlagDefinition {
        name: "verbose",
        alias: Some("v"),
        description: "Enable verbose output",
        kind: FlagKind::Boolean,
        env_var: Some("IT_VERBOSE"),
        default: Some(FlagDefault::Bool(false)),
        example: None,
    },
    FlagDefinition {
        name: "capture-logs",
        alias: None,
        description: "Capture runner console output to file",
        kind: FlagKind::Boolean,
        env_var: Some("IT_CAPTURE_LOGS"),
        default: Some(FlagDefault::Bool(false)),
        example: Some("--capture-logs"),
    },
    FlagDefinition {
        name: "container-logs",
        alias: None,
        description: "Capture container logs to file inside the run artefacts dir (optional path or default)",
        kind: FlagKind::StringOrBoolean,
        env_var: Some("IT_CONTAINER_LOGS"),
        default: None,
        example: Some("--container-logs logs/containers.log"),
    },
    FlagDefinition {
        name: "config",
        alias: Some("c"),
        description: "Platform config file (TOML or JSON)",
        kind: FlagKind::String,
        env_var: Some("IT_CONFIG"),
        default: None,
        example: Some("--config integration-tests/platform.toml"),
    },
    FlagDefinition {
        name: "artefacts-dir",
        alias: None,
        description: "Artefacts root directory",
        kind: FlagKind::String,
        env_var: Some("IT_ARTEFACTS_DIR"),
        default: None,
        example: Some("--artefacts-dir ./out"),
    },
    FlagDefinition {
        name: "timeout",
        alias: None,
        description: "How long platform-only runs keep the platform up, in ms",
        kind: FlagKind::Number,
        env_var: Some("IT_TIMEOUT_MS"),
        default: None,
        example: Some("--timeout 60000"),
    },
    FlagDefinition {
        name: "dry-run",
        alias: None,
        description: "Print execution plan without running",
        kind: FlagKind::Boolean,
        env_var: None,
        default: Some(FlagDefault::Bool(false)),
        example: Some("--dry-run"),
    },
    FlagDefinition {
        name: "help",
        alias: Some("h"),
        description: "Show help",
        kind: FlagKind::Boolean,
        env_var: None,
        default: Some(FlagDefault::Bool(false)),
        example: None,
    },
];

/// Where container logs go, as requested on the command line or environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerLogs {
    /// Default location inside the run's `logs/` directory
    Enabled,
    /// Explicitly switched off
    Disabled,
    /// Path relative to the run directory, or absolute
    Path(String),
}

/// Validated runner options, produced once per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub verbose: bool,
    pub dry_run: bool,
    pub capture_logs_to_file: bool,
    pub container_logs: Option<ContainerLogs>,
    pub help: bool,
    pub config: Option<String>,
    pub artefacts_dir: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Look up a definition by long name or short alias
pub fn find_definition(name: &str) -> Option<&'static FlagDefinition> {
    FLAG_DEFINITIONS
        .iter()
        .find(|def| def.name == name || def.alias == Some(name))
}

/// Parse CLI tokens (without the program name) against the flag table
pub fn parse(args: &[String], env: &HashMap<String, String>) -> Result<Options, ConfigSyntaxError> {
    let mut resolved = apply_defaults(FLAG_DEFINITIONS);
    apply_env(FLAG_DEFINITIONS, env, &mut resolved)?;

    let mut i = 0;
    while i < args.len() {
        let raw = &args[i];
        let clean = raw
            .strip_prefix("--")
            .or_else(|| raw.strip_prefix('-'))
            .ok_or_else(|| ConfigSyntaxError::UnexpectedArgument(raw.clone()))?;

        let (name, inline) = match clean.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (clean, None),
        };

        let def = find_definition(name).ok_or_else(|| ConfigSyntaxError::UnknownFlag(raw.clone()))?;

        // Consumes the following token only when it is not itself a flag
        let mut read_next = || -> Option<String> {
            match args.get(i + 1) {
                Some(next) if !next.is_empty() && !next.starts_with('-') => {
                    i += 1;
                    Some(next.clone())
                }
                _ => None,
            }
        };

        let value = match def.kind {
            FlagKind::Boolean => FlagValue::Bool(inline.map(|v| v == "true").unwrap_or(true)),
            FlagKind::Number => {
                let raw_value = match inline {
                    Some(v) => v.to_string(),
                    None => read_next().ok_or_else(|| ConfigSyntaxError::MissingNumber(raw.clone()))?,
                };
                let number = raw_value.parse::<u64>().map_err(|_| ConfigSyntaxError::InvalidNumber {
                    flag: raw.clone(),
                    value: raw_value.clone(),
                })?;
                FlagValue::Number(number)
            }
            FlagKind::String => match inline {
                Some(v) => FlagValue::Str(v.to_string()),
                None => FlagValue::Str(read_next().ok_or_else(|| ConfigSyntaxError::MissingValue(raw.clone()))?),
            },
            FlagKind::StringOrBoolean => match inline {
                Some("") => FlagValue::Bool(true),
                Some(v) => FlagValue::Str(v.to_string()),
                None => read_next().map(FlagValue::Str).unwrap_or(FlagValue::Bool(true)),
            },
        };

        resolved.insert(def.name, value);
        i += 1;
    }

    Ok(into_options(&resolved))
}

fn apply_defaults(definitions: &[FlagDefinition]) -> BTreeMap<&'static str, FlagValue> {
    definitions
        .iter()
        .filter_map(|def| def.default.map(|d| (def.name, FlagValue::from(d))))
        .collect()
}

fn apply_env(
    definitions: &[FlagDefinition],
    env: &HashMap<String, String>,
    resolved: &mut BTreeMap<&'static str, FlagValue>,
) -> Result<(), ConfigSyntaxError> {
    for def in definitions {
        let Some(var) = def.env_var else { continue };
        let Some(raw) = env.get(var) else { continue };
        resolved.insert(def.name, coerce_env_value(def.kind, var, raw)?);
    }
    Ok(())
}

fn coerce_env_value(kind: FlagKind, var: &str, raw: &str) -> Result<FlagValue, ConfigSyntaxError> {
    Ok(match kind {
        FlagKind::Boolean => FlagValue::Bool(raw == "true"),
        FlagKind::Number => FlagValue::Number(raw.parse().map_err(|_| ConfigSyntaxError::InvalidEnvNumber {
            var: var.to_string(),
            value: raw.to_string(),
        })?),
        FlagKind::String => FlagValue::Str(raw.to_string()),
        FlagKind::StringOrBoolean => match raw {
            "true" => FlagValue::Bool(true),
            "false" => FlagValue::Bool(false),
            other => FlagValue::Str(other.to_string()),
        },
    })
}

fn into_options(resolved: &BTreeMap<&'static str, FlagValue>) -> Options {
    let flag = |name: &str| match resolved.get(name) {
        Some(FlagValue::Bool(b)) => *b,
        Some(FlagValue::Str(s)) => !s.is_empty(),
        Some(FlagValue::Number(n)) => *n != 0,
        None => false,
    };
    let text = |name: &str| match resolved.get(name) {
        Some(FlagValue::Str(s)) => Some(s.clone()),
        _ => None,
    };

    Options {
        verbose: flag("verbose"),
        dry_run: flag("dry-run"),
        capture_logs_to_file: flag("capture-logs"),
        container_logs: resolved.get("container-logs").map(|value| match value {
            FlagValue::Bool(true) => ContainerLogs::Enabled,
            FlagValue::Bool(false) => ContainerLogs::Disabled,
            FlagValue::Str(path) => ContainerLogs::Path(path.clone()),
            FlagValue::Number(n) => ContainerLogs::Path(n.to_string()),
        }),
        help: flag("help"),
        config: text("config"),
        artefacts_dir: text("artefacts-dir"),
        timeout_ms: match resolved.get("timeout") {
            Some(FlagValue::Number(n)) => Some(*n),
            _ => None,
        },
    }
}
