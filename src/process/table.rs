//! # OS process table access.
//!
//! The gateway restarts itself outside the supervisor's process tree, so the
//! replacement can only be found by name. [`ProcessTable`] abstracts the lookup;
//! [`SysinfoTable`] is the production implementation.
//!
//! When several processes share the gateway's name, [`select_replacement`]
//! prefers the one whose command line carries the restart marker, then the one
//! carrying the automation-agent marker.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, warn};

use crate::core::DiscoveryConfig;

/// One running process as seen by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub cmdline: String,
}

/// Read/kill access to the OS process table.
pub trait ProcessTable: Send + Sync + 'static {
    /// Processes whose executable name is `name` (case-insensitive, `.exe` ignored).
    fn find_by_name(&self, name: &str) -> Vec<ProcessInfo>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Returns `false` if the process was not found or the signal failed.
    fn kill(&self, pid: u32) -> bool;
}

/// [`ProcessTable`] backed by `sysinfo`.
pub struct SysinfoTable {
    sys: Mutex<System>,
}

impl Default for SysinfoTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoTable {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }

    fn refresh_one(sys: &mut System, pid: Pid) {
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    }
}

impl ProcessTable for SysinfoTable {
    fn find_by_name(&self, name: &str) -> Vec<ProcessInfo> {
        let mut sys = self.sys.lock();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );
        let mut found: Vec<ProcessInfo> = sys
            .processes()
            .iter()
            .filter(|(_, p)| {
                let pname = p.name().to_string_lossy();
                let bare = pname.strip_suffix(".exe").unwrap_or(&pname);
                bare.eq_ignore_ascii_case(name)
            })
            .map(|(pid, p)| ProcessInfo {
                pid: pid.as_u32(),
                cmdline: p
                    .cmd()
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect();
        found.sort_by_key(|p| p.pid);
        found
    }

    fn is_alive(&self, pid: u32) -> bool {
        let mut sys = self.sys.lock();
        let pid = Pid::from_u32(pid);
        Self::refresh_one(&mut sys, pid);
        sys.process(pid).is_some()
    }

    fn kill(&self, pid: u32) -> bool {
        let mut sys = self.sys.lock();
        let pid = Pid::from_u32(pid);
        Self::refresh_one(&mut sys, pid);
        sys.process(pid).is_some_and(|p| p.kill())
    }
}

/// Picks the restarted gateway among `candidates`.
pub fn select_replacement(candidates: &[ProcessInfo], discovery: &DiscoveryConfig) -> Option<u32> {
    match candidates {
        [] => None,
        [only] => Some(only.pid),
        many => {
            let by_marker = |marker: &str| {
                many.iter()
                    .find(|p| !marker.is_empty() && p.cmdline.contains(marker))
                    .map(|p| p.pid)
            };
            let picked = by_marker(&discovery.restart_marker).or_else(|| by_marker(&discovery.agent_marker));
            match picked {
                Some(pid) => debug!(pid, candidates = many.len(), "disambiguated restarted gateway"),
                None => warn!(candidates = many.len(), "several gateway candidates and none carries a known marker"),
            }
            picked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32, cmdline: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            cmdline: cmdline.to_string(),
        }
    }

    #[test]
    fn no_candidates_means_not_found() {
        assert_eq!(select_replacement(&[], &DiscoveryConfig::default()), None);
    }

    #[test]
    fn single_candidate_is_taken_as_is() {
        let c = [info(7, "java -cp jts.jar ibgateway.GWClient")];
        assert_eq!(select_replacement(&c, &DiscoveryConfig::default()), Some(7));
    }

    #[test]
    fn restart_marker_beats_agent_marker() {
        let c = [
            info(10, "java -javaagent:ibautomater.jar ibgateway.GWClient"),
            info(11, "java ibgateway.GWClient -restart /tmp/autorestart"),
            info(12, "java -jar unrelated.jar"),
        ];
        assert_eq!(select_replacement(&c, &DiscoveryConfig::default()), Some(11));
    }

    #[test]
    fn agent_marker_is_the_fallback() {
        let c = [
            info(20, "java -jar unrelated.jar"),
            info(21, "java -javaagent:ibautomater.jar ibgateway.GWClient"),
        ];
        assert_eq!(select_replacement(&c, &DiscoveryConfig::default()), Some(21));
    }

    #[test]
    fn ambiguous_candidates_are_rejected() {
        let c = [info(30, "java -jar a.jar"), info(31, "java -jar b.jar")];
        assert_eq!(select_replacement(&c, &DiscoveryConfig::default()), None);
    }

    #[test]
    fn sysinfo_sees_the_current_process() {
        let table = SysinfoTable::new();
        assert!(table.is_alive(std::process::id()));
    }
}
