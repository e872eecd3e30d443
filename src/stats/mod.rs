//! Raw statistics records as returned by a memcached server.
//!
//! A memcached server reports everything as flat `STAT <key> <value>` lines.
//! The transport groups them into a top-level [`Record`] plus two maps of
//! per-slab-class sub-records; nothing here knows about metric types yet.

pub mod parse;

use std::collections::{BTreeMap, HashMap};

pub use parse::ParseError;

/// Untyped key/value statistics, one entry per `STAT` line.
pub type Record = HashMap<String, String>;

/// Everything a single stats round trip produced for one server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStats {
    /// General statistics (`stats`), merged with the global lines of
    /// `stats slabs` such as `total_malloced`.
    pub stats: Record,
    /// Per slab class item statistics (`stats items`), keyed by class id.
    pub items: BTreeMap<u32, Record>,
    /// Per slab class allocation statistics (`stats slabs`), keyed by class id.
    pub slabs: BTreeMap<u32, Record>,
}

impl ServerStats {
    /// Returns the slab class sub-record for `stats items`, creating it if needed.
    pub fn items_mut(&mut self, slab: u32) -> &mut Record {
        self.items.entry(slab).or_default()
    }

    /// Returns the slab class sub-record for `stats slabs`, creating it if needed.
    pub fn slabs_mut(&mut self, slab: u32) -> &mut Record {
        self.slabs.entry(slab).or_default()
    }
}

/// Builds a [`Record`] from string pairs.
#[cfg(test)]
pub(crate) fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
