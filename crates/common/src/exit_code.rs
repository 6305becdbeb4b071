//! Process exit codes reported by the orchestrator

use serde::{Serialize, Serializer};
use std::fmt;

/// Stable, machine-consumable exit codes.
///
/// `RuntimeTimeout` and `PlatformError` are part of the published contract
/// but the orchestrator never produces them itself; adapter failures surface
/// as `UnexpectedError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    ConfigInvalid = 1,
    RuntimeTimeout = 2,
    PlatformError = 3,
    E2eFailure = 4,
    UnexpectedError = 5,
}

impl ExitCode {
    /// All codes in numeric order
    pub const ALL: [ExitCode; 6] = [
        ExitCode::Success,
        ExitCode::ConfigInvalid,
        ExitCode::RuntimeTimeout,
        ExitCode::PlatformError,
        ExitCode::E2eFailure,
        ExitCode::UnexpectedError,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Short description used in help output
    pub fn describe(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::ConfigInvalid => "Invalid configuration or arguments",
            ExitCode::RuntimeTimeout => "Runtime timeout (reserved)",
            ExitCode::PlatformError => "Docker/container error (reserved)",
            ExitCode::E2eFailure => "E2E/test failure",
            ExitCode::UnexpectedError => "Unexpected error",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for ExitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let codes: Vec<i32> = ExitCode::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&ExitCode::E2eFailure).unwrap();
        assert_eq!(json, "4");
    }
}
