//! In-memory [`ProcessTable`] for tests.

use std::collections::HashSet;

use parking_lot::Mutex;

use super::table::{ProcessInfo, ProcessTable};

#[derive(Default)]
pub(crate) struct FakeTable {
    pub(crate) alive: Mutex<HashSet<u32>>,
    pub(crate) listed: Mutex<Vec<ProcessInfo>>,
}

impl FakeTable {
    /// Marks `pid` alive and lists it under `cmdline`.
    pub(crate) fn spawn(&self, pid: u32, cmdline: &str) {
        self.alive.lock().insert(pid);
        self.listed.lock().push(ProcessInfo {
            pid,
            cmdline: cmdline.to_string(),
        });
    }

    pub(crate) fn exit(&self, pid: u32) {
        self.alive.lock().remove(&pid);
        self.listed.lock().retain(|p| p.pid != pid);
    }
}

impl ProcessTable for FakeTable {
    fn find_by_name(&self, _name: &str) -> Vec<ProcessInfo> {
        self.listed.lock().clone()
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().contains(&pid)
    }

    fn kill(&self, pid: u32) -> bool {
        self.alive.lock().remove(&pid)
    }
}
