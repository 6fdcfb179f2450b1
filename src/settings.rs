//! # Gateway login and installation settings.
//!
//! [`Settings`] is immutable for the lifetime of a supervisor. The password is
//! never rendered by `Debug` and is redacted from every line the supervisor emits.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::error::SupervisorError;

/// Default file name of the automation agent's log inside the working directory.
pub const DEFAULT_AGENT_LOG: &str = "gateway-agent.log";

/// Default OS process name of the gateway.
pub const DEFAULT_PROCESS_NAME: &str = "java";

/// Trading mode of the brokerage account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Live,
    Paper,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Live => "live",
            TradingMode::Paper => "paper",
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown trading mode {0:?} (expected \"live\" or \"paper\")")]
pub struct ParseTradingModeError(pub String);

impl FromStr for TradingMode {
    type Err = ParseTradingModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(TradingMode::Live),
            "paper" => Ok(TradingMode::Paper),
            other => Err(ParseTradingModeError(other.to_string())),
        }
    }
}

/// Login credentials and installation layout for one gateway.
#[derive(Clone)]
pub struct Settings {
    pub user_name: String,
    password: String,
    pub trading_mode: TradingMode,
    pub port: u16,
    /// Ask the agent to export gateway logs when it meets an unknown window.
    pub export_logs: bool,
    /// Gateway version, e.g. `"1030"`.
    pub version: String,
    /// Root of the gateway installation.
    pub gateway_dir: PathBuf,
    /// Executable started by the supervisor (starts the gateway with the agent attached).
    pub launcher: PathBuf,
    /// Runtime the launcher depends on; checked before launch when set.
    pub runtime: Option<PathBuf>,
    /// Directory for flag files and the agent log.
    pub working_dir: PathBuf,
    pub agent_log: String,
    /// OS process name used to find a gateway restarted outside our process tree.
    pub process_name: String,
    /// Login server host; read from `jts.ini` when unset.
    pub server_host: Option<String>,
}

impl Settings {
    /// Creates settings with defaults for everything but credentials and layout.
    pub fn new(
        user_name: impl Into<String>,
        password: impl Into<String>,
        trading_mode: TradingMode,
        port: u16,
        gateway_dir: impl Into<PathBuf>,
        launcher: impl Into<PathBuf>,
    ) -> Self {
        let gateway_dir = gateway_dir.into();
        Self {
            user_name: user_name.into(),
            password: password.into(),
            trading_mode,
            port,
            export_logs: false,
            version: String::new(),
            working_dir: gateway_dir.clone(),
            gateway_dir,
            launcher: launcher.into(),
            runtime: None,
            agent_log: DEFAULT_AGENT_LOG.to_string(),
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            server_host: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<PathBuf>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    pub fn with_export_logs(mut self, export: bool) -> Self {
        self.export_logs = export;
        self
    }

    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    pub fn with_server_host(mut self, host: impl Into<String>) -> Self {
        self.server_host = Some(host.into());
        self
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Full path of the agent log tailed by the supervisor.
    pub fn agent_log_path(&self) -> PathBuf {
        self.working_dir.join(&self.agent_log)
    }

    /// Path of the gateway's `jts.ini`.
    pub fn jts_ini_path(&self) -> PathBuf {
        self.gateway_dir.join("jts.ini")
    }

    /// Rejects settings the gateway could never log in with.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.user_name.trim().is_empty() {
            return Err(SupervisorError::InvalidSettings {
                reason: "user name is empty".into(),
            });
        }
        if self.port == 0 {
            return Err(SupervisorError::InvalidSettings {
                reason: "api port must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Arguments passed to the launcher.
    ///
    /// Launches made by the supervisor always log in; only the gateway's own
    /// restart logic starts the agent with `-restarting true`.
    pub(crate) fn launcher_args(&self) -> Vec<String> {
        vec![
            "-ibdir".into(),
            path_arg(&self.gateway_dir),
            "-user".into(),
            self.user_name.clone(),
            "-pwd".into(),
            self.password.clone(),
            "-mode".into(),
            self.trading_mode.to_string(),
            "-port".into(),
            self.port.to_string(),
            "-exportlogs".into(),
            self.export_logs.to_string(),
            "-restarting".into(),
            "false".into(),
            "-log".into(),
            path_arg(&self.agent_log_path()),
        ]
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .field("trading_mode", &self.trading_mode)
            .field("port", &self.port)
            .field("export_logs", &self.export_logs)
            .field("version", &self.version)
            .field("gateway_dir", &self.gateway_dir)
            .field("launcher", &self.launcher)
            .field("runtime", &self.runtime)
            .field("working_dir", &self.working_dir)
            .field("agent_log", &self.agent_log)
            .field("process_name", &self.process_name)
            .field("server_host", &self.server_host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings::new("trader", "s3cret!", TradingMode::Paper, 4002, "/opt/gw", "/opt/gw/run.sh")
    }

    #[test]
    fn trading_mode_parses_case_insensitively() {
        assert_eq!("Live".parse::<TradingMode>(), Ok(TradingMode::Live));
        assert_eq!(" paper ".parse::<TradingMode>(), Ok(TradingMode::Paper));
        assert!("demo".parse::<TradingMode>().is_err());
    }

    #[test]
    fn debug_never_shows_password() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("s3cret!"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn validate_rejects_empty_user_and_zero_port() {
        let mut s = sample();
        s.user_name = "  ".into();
        assert!(s.validate().is_err());

        let mut s = sample();
        s.port = 0;
        assert!(s.validate().is_err());

        assert!(sample().validate().is_ok());
    }

    #[test]
    fn launcher_args_carry_restart_flag_and_log_path() {
        let s = sample().with_working_dir("/var/gw");
        let args = s.launcher_args();
        let pos = args.iter().position(|a| a == "-restarting").unwrap();
        assert_eq!(args[pos + 1], "false");
        assert!(args.iter().any(|a| a.ends_with(DEFAULT_AGENT_LOG)));
        assert!(args.contains(&"paper".to_string()));
    }
}
