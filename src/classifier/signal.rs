//! Domain signals extracted from agent log lines.

/// Discrete classification of one agent log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    LoginFailed(String),
    /// Login refused until the account holder completes a pending task.
    AccountTaskRequired(String),
    ExistingSession,
    SecurityDialog,
    UnsupportedVersion,
    RuntimeException(String),
    ApiNotAvailable,
    UnknownWindow(String),
    ConfigurationComplete,
    TwoFactorWindowOpened,
    TwoFactorMaxAttemptsReached,
    RestartInProgress,
    AutoRestartTokenExpired,
    AuthenticatingStateChanged(bool),
}

impl Signal {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Signal::LoginFailed(_) => "login_failed",
            Signal::AccountTaskRequired(_) => "account_task_required",
            Signal::ExistingSession => "existing_session",
            Signal::SecurityDialog => "security_dialog",
            Signal::UnsupportedVersion => "unsupported_version",
            Signal::RuntimeException(_) => "runtime_exception",
            Signal::ApiNotAvailable => "api_not_available",
            Signal::UnknownWindow(_) => "unknown_window",
            Signal::ConfigurationComplete => "configuration_complete",
            Signal::TwoFactorWindowOpened => "two_factor_window_opened",
            Signal::TwoFactorMaxAttemptsReached => "two_factor_max_attempts_reached",
            Signal::RestartInProgress => "restart_in_progress",
            Signal::AutoRestartTokenExpired => "auto_restart_token_expired",
            Signal::AuthenticatingStateChanged(_) => "authenticating_state_changed",
        }
    }
}
