//! Exit code constants for the sidecar CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `ALREADY_RUNNING` | Start requested while the service runs |
//! | 4 | `PORT_UNAVAILABLE` | No free port could be allocated |
//! | 5 | `NOT_READY` | Service exited early or never became ready |
//! | 70 | `LAUNCH_FAILURE` | The service process could not be created |

/// Type-safe process exit code.
///
/// The numeric values are part of the CLI contract.
///
/// ```rust
/// use sidecar_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(70), ExitCode::LAUNCH_FAILURE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    pub const INTERNAL: ExitCode = ExitCode(1);

    pub const CLI_ARGS: ExitCode = ExitCode(2);

    pub const ALREADY_RUNNING: ExitCode = ExitCode(3);

    pub const PORT_UNAVAILABLE: ExitCode = ExitCode(4);

    pub const NOT_READY: ExitCode = ExitCode(5);

    pub const LAUNCH_FAILURE: ExitCode = ExitCode(70);

    /// Numeric value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::ALREADY_RUNNING.as_i32(), 3);
        assert_eq!(ExitCode::PORT_UNAVAILABLE.as_i32(), 4);
        assert_eq!(ExitCode::NOT_READY.as_i32(), 5);
        assert_eq!(ExitCode::LAUNCH_FAILURE.as_i32(), 70);
        assert_eq!(i32::from(ExitCode::CLI_ARGS), 2);
    }
}
