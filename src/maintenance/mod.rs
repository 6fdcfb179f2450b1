//! Backend maintenance windows.
//!
//! ## Contents
//! - [`ServerRegion`], [`RegionMap`] login host → region lookup
//! - [`MaintenanceSchedule`] weekend + regional reset windows
//!
//! Both tables are plain values handed to the supervisor builder, so tests and
//! deployments can substitute them.

mod region;
mod schedule;

pub use region::{RegionMap, RegionResolution, ServerRegion, parse_peer_host, peer_host_from_jts_ini};
pub use schedule::{DailyWindow, MaintenanceSchedule, WeeklyWindow, dhm, hm};
