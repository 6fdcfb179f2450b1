//! # Server region resolution.
//!
//! The login server host (from settings or the gateway's `jts.ini`) decides which
//! regional reset window applies. Unknown hosts fall back to
//! [`ServerRegion::America`] with a warning.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::warn;

/// Geographic region of the backend servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRegion {
    America,
    Europe,
    Asia,
}

impl fmt::Display for ServerRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerRegion::America => "america",
            ServerRegion::Europe => "europe",
            ServerRegion::Asia => "asia",
        })
    }
}

/// Outcome of a host lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionResolution {
    /// Host is in the map.
    Known(ServerRegion),
    /// Host is unknown; the default region was used.
    Fallback(ServerRegion),
}

impl RegionResolution {
    pub fn region(&self) -> ServerRegion {
        match *self {
            RegionResolution::Known(r) | RegionResolution::Fallback(r) => r,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RegionResolution::Fallback(_))
    }
}

/// Known login hosts and their regions.
#[derive(Debug, Clone)]
pub struct RegionMap {
    hosts: HashMap<String, ServerRegion>,
    fallback: ServerRegion,
}

const KNOWN_HOSTS: &[(&str, ServerRegion)] = &[
    ("cdc1.ibllc.com", ServerRegion::America),
    ("gdc1.ibllc.com", ServerRegion::America),
    ("ndc1.ibllc.com", ServerRegion::America),
    ("ndc1_hb1.ibllc.com", ServerRegion::America),
    ("zdc1.ibllc.com", ServerRegion::Europe),
    ("zdc1_hb1.ibllc.com", ServerRegion::Europe),
    ("hdc1.ibllc.com", ServerRegion::Asia),
    ("hdc1_hb1.ibllc.com", ServerRegion::Asia),
];

impl Default for RegionMap {
    fn default() -> Self {
        Self::new(
            KNOWN_HOSTS.iter().map(|(h, r)| ((*h).to_string(), *r)),
            ServerRegion::America,
        )
    }
}

impl RegionMap {
    pub fn new(hosts: impl IntoIterator<Item = (String, ServerRegion)>, fallback: ServerRegion) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|(h, r)| (normalize_host(&h), r))
                .collect(),
            fallback,
        }
    }

    /// Resolves `host` (optionally with `:port`) to a region.
    pub fn resolve(&self, host: &str) -> RegionResolution {
        match self.hosts.get(&normalize_host(host)) {
            Some(r) => RegionResolution::Known(*r),
            None => {
                warn!(host, fallback = %self.fallback, "unknown gateway server host, using default region");
                RegionResolution::Fallback(self.fallback)
            }
        }
    }

    /// Every host in the map with its region.
    pub fn entries(&self) -> impl Iterator<Item = (&str, ServerRegion)> {
        self.hosts.iter().map(|(h, r)| (h.as_str(), *r))
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let bare = host.split_once(':').map_or(host, |(h, _)| h);
    bare.to_ascii_lowercase()
}

/// Extracts the `Peer=` host from `jts.ini` contents.
pub fn parse_peer_host(ini: &str) -> Option<String> {
    ini.lines()
        .filter_map(|l| l.trim().strip_prefix("Peer="))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(|v| v.split_once(':').map_or(v, |(h, _)| h).to_string())
}

/// Reads the login host from a `jts.ini` file, if present.
pub async fn peer_host_from_jts_ini(path: &Path) -> Option<String> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    parse_peer_host(&text)
}
