//! Error types used by the gatewayvisor runtime.
//!
//! This module defines two layers:
//!
//! - [`ErrorCode`] and [`StartResult`]: the closed, caller-facing taxonomy. Every
//!   outcome that crosses the supervisor boundary is one of these values.
//! - [`SupervisorError`]: internal host-level failures (spawn, I/O). They are
//!   converted into a [`StartResult`] before reaching the caller.
//!
//! Both provide helper methods (`as_label`, `as_message`) for logging.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// # Closed taxonomy of supervisor outcomes.
///
/// `None` means success. Anything else, once recorded by the supervisor, is
/// sticky until an explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    None,
    ProcessStartFailed,
    VersionNotInstalled,
    RuntimeNotFound,
    RuntimeException,
    LoginFailed,
    ExistingSessionDetected,
    SecurityDialogDetected,
    TwoFactorTimeout,
    InitializationTimeout,
    UnsupportedVersion,
    ApiNotAvailable,
    RestartedProcessNotFound,
    UnknownMessageWindow,
    SoftRestartTimeout,
    LoginBlockedByAccountTask,
}

impl ErrorCode {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use gatewayvisor::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::SoftRestartTimeout.as_label(), "soft_restart_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorCode::None => "none",
            ErrorCode::ProcessStartFailed => "process_start_failed",
            ErrorCode::VersionNotInstalled => "version_not_installed",
            ErrorCode::RuntimeNotFound => "runtime_not_found",
            ErrorCode::RuntimeException => "runtime_exception",
            ErrorCode::LoginFailed => "login_failed",
            ErrorCode::ExistingSessionDetected => "existing_session_detected",
            ErrorCode::SecurityDialogDetected => "security_dialog_detected",
            ErrorCode::TwoFactorTimeout => "two_factor_timeout",
            ErrorCode::InitializationTimeout => "initialization_timeout",
            ErrorCode::UnsupportedVersion => "unsupported_version",
            ErrorCode::ApiNotAvailable => "api_not_available",
            ErrorCode::RestartedProcessNotFound => "restarted_process_not_found",
            ErrorCode::UnknownMessageWindow => "unknown_message_window",
            ErrorCode::SoftRestartTimeout => "soft_restart_timeout",
            ErrorCode::LoginBlockedByAccountTask => "login_blocked_by_account_task",
        }
    }

    /// Message catalog entry for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::None => "",
            ErrorCode::ProcessStartFailed => "The gateway process could not be started.",
            ErrorCode::VersionNotInstalled => "The requested gateway version is not installed.",
            ErrorCode::RuntimeNotFound => "The runtime required by the gateway was not found.",
            ErrorCode::RuntimeException => "The gateway automation reported an exception.",
            ErrorCode::LoginFailed => "Login failed. Please check the validity of your login credentials.",
            ErrorCode::ExistingSessionDetected => {
                "An existing session was detected and will not be automatically disconnected."
            }
            ErrorCode::SecurityDialogDetected => {
                "A security dialog was detected for Code Card Authentication."
            }
            ErrorCode::TwoFactorTimeout => {
                "The two-factor authentication request timed out (maximum attempts reached)."
            }
            ErrorCode::InitializationTimeout => "Timeout waiting for the gateway to initialize.",
            ErrorCode::UnsupportedVersion => "The gateway version is no longer supported.",
            ErrorCode::ApiNotAvailable => "API support is not available for this account.",
            ErrorCode::RestartedProcessNotFound => "The restarted gateway process was not found.",
            ErrorCode::UnknownMessageWindow => "An unknown message window was detected.",
            ErrorCode::SoftRestartTimeout => "Timeout waiting for the gateway soft restart.",
            ErrorCode::LoginBlockedByAccountTask => {
                "Login is blocked until a pending account task is completed."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Outcome of a start (or restart) attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartResult {
    pub code: ErrorCode,
    pub message: String,
}

impl StartResult {
    /// The success value (`code == ErrorCode::None`, empty message).
    pub fn success() -> Self {
        Self::default()
    }

    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds a result carrying the catalog message for `code`.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Builds a result with the catalog message followed by `detail`.
    pub fn with_detail(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::new(code, format!("{} {detail}", code.default_message()))
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.code != ErrorCode::None
    }
}

impl fmt::Display for StartResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_error() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            f.write_str("success")
        }
    }
}

/// # Host-level failures inside the supervisor.
///
/// These never cross the public boundary as-is; see [`SupervisorError::to_start_result`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The gateway launcher does not exist.
    #[error("gateway launcher not found at {path}")]
    LauncherMissing { path: PathBuf },

    /// The configured runtime does not exist.
    #[error("runtime not found at {path}")]
    RuntimeMissing { path: PathBuf },

    /// The OS refused to spawn the process.
    #[error("failed to spawn gateway process: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// Settings failed validation.
    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },

    /// Flag-file or log-file I/O failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::LauncherMissing { .. } => "launcher_missing",
            SupervisorError::RuntimeMissing { .. } => "runtime_missing",
            SupervisorError::Spawn { .. } => "spawn_failed",
            SupervisorError::InvalidSettings { .. } => "invalid_settings",
            SupervisorError::Io { .. } => "io",
        }
    }

    /// Maps the failure onto the caller-facing taxonomy.
    pub fn to_start_result(&self) -> StartResult {
        let code = match self {
            SupervisorError::LauncherMissing { .. } => ErrorCode::VersionNotInstalled,
            SupervisorError::RuntimeMissing { .. } => ErrorCode::RuntimeNotFound,
            SupervisorError::Spawn { .. }
            | SupervisorError::InvalidSettings { .. }
            | SupervisorError::Io { .. } => ErrorCode::ProcessStartFailed,
        };
        StartResult::with_detail(code, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_error() {
        let ok = StartResult::success();
        assert!(!ok.has_error());
        assert_eq!(ok.code, ErrorCode::None);
        assert_eq!(ok.to_string(), "success");
    }

    #[test]
    fn from_code_uses_catalog_message() {
        let r = StartResult::from_code(ErrorCode::ApiNotAvailable);
        assert!(r.has_error());
        assert_eq!(r.message, ErrorCode::ApiNotAvailable.default_message());
    }

    #[test]
    fn host_errors_map_to_taxonomy() {
        let missing = SupervisorError::LauncherMissing {
            path: PathBuf::from("/opt/gw/1030/ibgateway"),
        };
        assert_eq!(missing.to_start_result().code, ErrorCode::VersionNotInstalled);

        let runtime = SupervisorError::RuntimeMissing {
            path: PathBuf::from("/usr/bin/java"),
        };
        assert_eq!(runtime.to_start_result().code, ErrorCode::RuntimeNotFound);

        let spawn = SupervisorError::Spawn {
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let r = spawn.to_start_result();
        assert_eq!(r.code, ErrorCode::ProcessStartFailed);
        assert!(r.message.contains("failed to spawn"));
    }
}
