//! # Ordered classification rules.
//!
//! Each [`Rule`] pairs a predicate over the raw line with a [`Signal`] constructor.
//! [`Classifier::classify`] evaluates the rules top-to-bottom and returns the
//! signal of the **first** match.
//!
//! ## Order
//! ```text
//!  1 account_task_required    "Login failed: a user account-task is required"
//!  2 login_failed             "Login failed"
//!  3 too_many_attempts        "Too many failed login attempts"
//!  4 existing_session         "Existing session detected"
//!  5 two_factor_opened        "Second Factor Authentication" + "[WINDOW_OPENED]"
//!  6 two_factor_max_attempts  "2FA maximum attempts reached"
//!  7 security_dialog          "Security Code Card Authentication" | "Enter security code"
//!  8 unsupported_version      "is no longer supported"
//!  9 configuration_complete   "Configuration settings updated"
//! 10 restart_in_progress      "Restart in progress" | "The application will automatically restart in"
//! 11 token_expired            "Auto-restart token expired"
//! 12 runtime_exception        starts with "Exception"
//! 13 api_not_available        "API support is not available"
//! 14 unknown_window           starts with "Unknown message window detected"
//! 15 authenticating           "Window event:" + (ci) "authenticating" | "connecting to server"
//!                             | "server error, will retry"
//! ```
//! Specific window titles (4, 5) run before the generic window-event rule (15);
//! reordering silently changes behavior.

use super::signal::Signal;

const WINDOW_EVENT: &str = "Window event:";
const WINDOW_OPENED: &str = "[WINDOW_OPENED]";
const WINDOW_CLOSED: &str = "[WINDOW_CLOSED]";
const WINDOW_CLOSING: &str = "[WINDOW_CLOSING]";

/// One entry of the classification table.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    matches: fn(&str) -> bool,
    build: fn(&str) -> Signal,
}

impl Rule {
    pub const fn new(
        name: &'static str,
        matches: fn(&str) -> bool,
        build: fn(&str) -> Signal,
    ) -> Self {
        Self {
            name,
            matches,
            build,
        }
    }

    #[inline]
    pub fn apply(&self, line: &str) -> Option<Signal> {
        (self.matches)(line).then(|| (self.build)(line))
    }
}

fn is_authenticating_window(line: &str) -> bool {
    if !line.contains(WINDOW_EVENT) {
        return false;
    }
    let lower = line.to_lowercase();
    lower.contains("authenticating")
        || lower.contains("connecting to server")
        || lower.contains("server error, will retry")
}

fn authenticating_state(line: &str) -> Signal {
    let closed = line.contains(WINDOW_CLOSED) || line.contains(WINDOW_CLOSING);
    Signal::AuthenticatingStateChanged(!closed)
}

/// The production rule table, in evaluation order.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule::new(
        "account_task_required",
        |l| l.contains("Login failed: a user account-task is required"),
        |l| Signal::AccountTaskRequired(l.to_string()),
    ),
    Rule::new(
        "login_failed",
        |l| l.contains("Login failed"),
        |l| Signal::LoginFailed(l.to_string()),
    ),
    Rule::new(
        "too_many_attempts",
        |l| l.contains("Too many failed login attempts"),
        |l| Signal::LoginFailed(l.to_string()),
    ),
    Rule::new(
        "existing_session",
        |l| l.contains("Existing session detected"),
        |_| Signal::ExistingSession,
    ),
    Rule::new(
        "two_factor_opened",
        |l| l.contains("Second Factor Authentication") && l.contains(WINDOW_OPENED),
        |_| Signal::TwoFactorWindowOpened,
    ),
    Rule::new(
        "two_factor_max_attempts",
        |l| l.contains("2FA maximum attempts reached"),
        |_| Signal::TwoFactorMaxAttemptsReached,
    ),
    Rule::new(
        "security_dialog",
        |l| l.contains("Security Code Card Authentication") || l.contains("Enter security code"),
        |_| Signal::SecurityDialog,
    ),
    Rule::new(
        "unsupported_version",
        |l| l.contains("is no longer supported"),
        |_| Signal::UnsupportedVersion,
    ),
    Rule::new(
        "configuration_complete",
        |l| l.contains("Configuration settings updated"),
        |_| Signal::ConfigurationComplete,
    ),
    Rule::new(
        "restart_in_progress",
        |l| {
            l.contains("Restart in progress")
                || l.contains("The application will automatically restart in")
        },
        |_| Signal::RestartInProgress,
    ),
    Rule::new(
        "token_expired",
        |l| l.contains("Auto-restart token expired"),
        |_| Signal::AutoRestartTokenExpired,
    ),
    Rule::new(
        "runtime_exception",
        |l| l.starts_with("Exception"),
        |l| Signal::RuntimeException(l.to_string()),
    ),
    Rule::new(
        "api_not_available",
        |l| l.contains("API support is not available"),
        |_| Signal::ApiNotAvailable,
    ),
    Rule::new(
        "unknown_window",
        |l| l.starts_with("Unknown message window detected"),
        |l| Signal::UnknownWindow(l.to_string()),
    ),
    Rule::new("authenticating", is_authenticating_window, authenticating_state),
];

/// First-match-wins line classifier.
#[derive(Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Returns the signal of the first matching rule, if any.
    pub fn classify(&self, line: &str) -> Option<Signal> {
        self.rules.iter().find_map(|r| r.apply(line))
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }
}
