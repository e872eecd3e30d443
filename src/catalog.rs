//! Static catalog of every metric the exporter can emit.
//!
//! The catalog is configuration data: each [`MetricDef`] names a Prometheus
//! family, its help text, whether it is a counter or a gauge, and the ordered
//! label schema every observation of it must carry. The translator refers to
//! these statics directly; [`ALL`] lists them for registration.

use std::collections::HashSet;

use anyhow::{bail, Result};
use prometheus::core::Desc;
use prometheus::Opts;

/// Namespace shared by all catalog metrics.
pub const NAMESPACE: &str = "memcached";

const SUBSYSTEM_LRU_CRAWLER: &str = "lru_crawler";
const SUBSYSTEM_SLAB: &str = "slab";

const SERVER: &[&str] = &["server"];
const VERSION_SERVER: &[&str] = &["version", "server"];
const COMMAND_SERVER: &[&str] = &["command", "status", "server"];
const SLAB_SERVER: &[&str] = &["slab", "server"];
const SLAB_LRU_SERVER: &[&str] = &["slab", "lru", "server"];
const SLAB_COMMAND_SERVER: &[&str] = &["slab", "command", "status", "server"];

/// Prometheus value type of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Immutable definition of one metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDef {
    pub subsystem: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

impl MetricDef {
    const fn counter(
        subsystem: &'static str,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            subsystem,
            name,
            help,
            kind: MetricKind::Counter,
            labels,
        }
    }

    const fn gauge(
        subsystem: &'static str,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            subsystem,
            name,
            help,
            kind: MetricKind::Gauge,
            labels,
        }
    }

    /// Prometheus options (namespace, subsystem, name, help) for this family.
    pub fn opts(&self) -> Opts {
        Opts::new(self.name, self.help)
            .namespace(NAMESPACE)
            .subsystem(self.subsystem)
    }

    /// Fully qualified metric name, e.g. `memcached_slab_current_items`.
    pub fn fq_name(&self) -> String {
        self.opts().fq_name()
    }
}

// --- Server level ---

pub static UP: MetricDef = MetricDef::gauge(
    "",
    "up",
    "Could the memcached server be reached.",
    SERVER,
);
pub static UPTIME: MetricDef = MetricDef::counter(
    "",
    "uptime_seconds",
    "Number of seconds since the server started.",
    SERVER,
);
pub static TIME: MetricDef = MetricDef::gauge(
    "",
    "time_seconds",
    "current UNIX time according to the server.",
    SERVER,
);
pub static VERSION: MetricDef = MetricDef::gauge(
    "",
    "version",
    "The version of this memcached server.",
    VERSION_SERVER,
);
pub static RUSAGE_USER: MetricDef = MetricDef::counter(
    "",
    "process_user_cpu_seconds_total",
    "Accumulated user time for this process.",
    SERVER,
);
pub static RUSAGE_SYSTEM: MetricDef = MetricDef::counter(
    "",
    "process_system_cpu_seconds_total",
    "Accumulated system time for this process.",
    SERVER,
);
pub static BYTES_READ: MetricDef = MetricDef::counter(
    "",
    "read_bytes_total",
    "Total number of bytes read by this server from network.",
    SERVER,
);
pub static BYTES_WRITTEN: MetricDef = MetricDef::counter(
    "",
    "written_bytes_total",
    "Total number of bytes sent by this server to network.",
    SERVER,
);
pub static CURRENT_CONNECTIONS: MetricDef = MetricDef::gauge(
    "",
    "current_connections",
    "Current number of open connections.",
    SERVER,
);
pub static MAX_CONNECTIONS: MetricDef = MetricDef::gauge(
    "",
    "max_connections",
    "Maximum number of clients allowed.",
    SERVER,
);
pub static CONNECTIONS_TOTAL: MetricDef = MetricDef::counter(
    "",
    "connections_total",
    "Total number of connections opened since the server started running.",
    SERVER,
);
pub static REJECTED_CONNECTIONS: MetricDef = MetricDef::counter(
    "",
    "connections_rejected_total",
    "Total number of connections rejected due to hitting the memcached's -c limit in maxconns_fast mode.",
    SERVER,
);
pub static CONNS_YIELDED: MetricDef = MetricDef::counter(
    "",
    "connections_yielded_total",
    "Total number of connections yielded running due to hitting the memcached's -R limit.",
    SERVER,
);
pub static LISTENER_DISABLED: MetricDef = MetricDef::counter(
    "",
    "connections_listener_disabled_total",
    "Number of times that memcached has hit its connections limit and disabled its listener.",
    SERVER,
);
pub static ACCEPTING_CONNECTIONS: MetricDef = MetricDef::gauge(
    "",
    "accepting_connections",
    "The Memcached server is currently accepting new connections.",
    SERVER,
);
pub static CURRENT_BYTES: MetricDef = MetricDef::gauge(
    "",
    "current_bytes",
    "Current number of bytes used to store items.",
    SERVER,
);
pub static LIMIT_BYTES: MetricDef = MetricDef::gauge(
    "",
    "limit_bytes",
    "Number of bytes this server is allowed to use for storage.",
    SERVER,
);
pub static COMMANDS: MetricDef = MetricDef::counter(
    "",
    "commands_total",
    "Total number of all requests broken down by command (get, set, etc.) and status.",
    COMMAND_SERVER,
);
pub static ITEMS: MetricDef = MetricDef::gauge(
    "",
    "current_items",
    "Current number of items stored by this instance.",
    SERVER,
);
pub static ITEMS_TOTAL: MetricDef = MetricDef::counter(
    "",
    "items_total",
    "Total number of items stored during the life of this instance.",
    SERVER,
);
pub static EVICTIONS: MetricDef = MetricDef::counter(
    "",
    "items_evicted_total",
    "Total number of valid items removed from cache to free memory for new items.",
    SERVER,
);
pub static RECLAIMED: MetricDef = MetricDef::counter(
    "",
    "items_reclaimed_total",
    "Total number of times an entry was stored using memory from an expired entry.",
    SERVER,
);
pub static MALLOCED: MetricDef = MetricDef::gauge(
    "",
    "malloced_bytes",
    "Number of bytes of memory allocated to slab pages.",
    SERVER,
);

// --- LRU crawler ---

pub static LRU_CRAWLER_ENABLED: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "enabled",
    "Whether the LRU crawler is enabled.",
    SERVER,
);
pub static LRU_CRAWLER_SLEEP: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "sleep",
    "Microseconds to sleep between LRU crawls.",
    SERVER,
);
pub static LRU_CRAWLER_MAX_ITEMS: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "to_crawl",
    "Max items to crawl per slab per run.",
    SERVER,
);
pub static LRU_MAINTAINER_THREAD: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "maintainer_thread",
    "Split LRU mode and background threads.",
    SERVER,
);
pub static LRU_HOT_PERCENT: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "hot_percent",
    "Percent of slab memory reserved for HOT LRU.",
    SERVER,
);
pub static LRU_WARM_PERCENT: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "warm_percent",
    "Percent of slab memory reserved for WARM LRU.",
    SERVER,
);
pub static LRU_HOT_MAX_AGE_FACTOR: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "hot_max_factor",
    "Set idle age of HOT LRU to COLD age * this",
    SERVER,
);
pub static LRU_WARM_MAX_AGE_FACTOR: MetricDef = MetricDef::gauge(
    SUBSYSTEM_LRU_CRAWLER,
    "warm_max_factor",
    "Set idle age of WARM LRU to COLD age * this",
    SERVER,
);
pub static LRU_CRAWLER_STARTS: MetricDef = MetricDef::counter(
    SUBSYSTEM_LRU_CRAWLER,
    "starts_total",
    "Times an LRU crawler was started.",
    SERVER,
);
pub static LRU_CRAWLER_RECLAIMED: MetricDef = MetricDef::counter(
    SUBSYSTEM_LRU_CRAWLER,
    "reclaimed_total",
    "Total items freed by LRU Crawler.",
    SERVER,
);
pub static LRU_CRAWLER_ITEMS_CHECKED: MetricDef = MetricDef::counter(
    SUBSYSTEM_LRU_CRAWLER,
    "items_checked_total",
    "Total items examined by LRU Crawler.",
    SERVER,
);
pub static LRU_CRAWLER_MOVES_TO_COLD: MetricDef = MetricDef::counter(
    SUBSYSTEM_LRU_CRAWLER,
    "moves_to_cold_total",
    "Total number of items moved from HOT/WARM to COLD LRU's.",
    SERVER,
);
pub static LRU_CRAWLER_MOVES_TO_WARM: MetricDef = MetricDef::counter(
    SUBSYSTEM_LRU_CRAWLER,
    "moves_to_warm_total",
    "Total number of items moved from COLD to WARM LRU.",
    SERVER,
);
pub static LRU_CRAWLER_MOVES_WITHIN_LRU: MetricDef = MetricDef::counter(
    SUBSYSTEM_LRU_CRAWLER,
    "moves_within_lru_total",
    "Total number of items reshuffled within HOT or WARM LRU's.",
    SERVER,
);

// --- Slab class items ---

pub static SLAB_ITEMS_NUMBER: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "current_items",
    "Number of items currently stored in this slab class.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_AGE: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "items_age_seconds",
    "Number of seconds the oldest item has been in the slab class.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_CRAWLER_RECLAIMED: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_crawler_reclaimed_total",
    "Number of items freed by the LRU Crawler.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_EVICTED: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_evicted_total",
    "Total number of times an item had to be evicted from the LRU before it expired.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_EVICTED_NONZERO: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_evicted_nonzero_total",
    "Total number of times an item which had an explicit expire time set had to be evicted from the LRU before it expired.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_EVICTED_TIME: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_evicted_time_seconds",
    "Seconds since the last access for the most recent item evicted from this class.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_EVICTED_UNFETCHED: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_evicted_unfetched_total",
    "Total number of items evicted and never fetched.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_EXPIRED_UNFETCHED: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_expired_unfetched_total",
    "Total number of valid items evicted from the LRU which were never touched after being set.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_OUTOFMEMORY: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_outofmemory_total",
    "Total number of items for this slab class that have triggered an out of memory error.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_RECLAIMED: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_reclaimed_total",
    "Total number of items reclaimed.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_TAILREPAIRS: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_tailrepairs_total",
    "Total number of times the entries for a particular ID need repairing.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_MOVES_TO_COLD: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_moves_to_cold",
    "Number of items moved from HOT or WARM into COLD.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_MOVES_TO_WARM: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_moves_to_warm",
    "Number of items moves from COLD into WARM.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_MOVES_WITHIN_LRU: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "items_moves_within_lru",
    "Number of times active items were bumped within HOT or WARM.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_HOT: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "hot_items",
    "Number of items presently stored in the HOT LRU.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_WARM: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "warm_items",
    "Number of items presently stored in the WARM LRU.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_COLD: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "cold_items",
    "Number of items presently stored in the COLD LRU.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_TEMPORARY: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "temporary_items",
    "Number of items presently stored in the TEMPORARY LRU.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_AGE_OLDEST_HOT: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "hot_age_seconds",
    "Age of the oldest item in HOT LRU.",
    SLAB_SERVER,
);
pub static SLAB_ITEMS_AGE_OLDEST_WARM: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "warm_age_seconds",
    "Age of the oldest item in WARM LRU.",
    SLAB_SERVER,
);
pub static SLAB_LRU_HITS: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "lru_hits_total",
    "Number of get_hits to the LRU.",
    SLAB_LRU_SERVER,
);

// --- Slab class allocation ---

pub static SLAB_CHUNK_SIZE: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "chunk_size_bytes",
    "Number of bytes allocated to each chunk within this slab class.",
    SLAB_SERVER,
);
pub static SLAB_CHUNKS_PER_PAGE: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "chunks_per_page",
    "Number of chunks within a single page for this slab class.",
    SLAB_SERVER,
);
pub static SLAB_CURRENT_PAGES: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "current_pages",
    "Number of pages allocated to this slab class.",
    SLAB_SERVER,
);
pub static SLAB_CURRENT_CHUNKS: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "current_chunks",
    "Number of chunks allocated to this slab class.",
    SLAB_SERVER,
);
pub static SLAB_CHUNKS_USED: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "chunks_used",
    "Number of chunks allocated to an item.",
    SLAB_SERVER,
);
pub static SLAB_CHUNKS_FREE: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "chunks_free",
    "Number of chunks not yet allocated items.",
    SLAB_SERVER,
);
pub static SLAB_CHUNKS_FREE_END: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "chunks_free_end",
    "Number of free chunks at the end of the last allocated page.",
    SLAB_SERVER,
);
pub static SLAB_MEM_REQUESTED: MetricDef = MetricDef::gauge(
    SUBSYSTEM_SLAB,
    "mem_requested_bytes",
    "Number of bytes of memory actual items take up within a slab.",
    SLAB_SERVER,
);
pub static SLAB_COMMANDS: MetricDef = MetricDef::counter(
    SUBSYSTEM_SLAB,
    "commands_total",
    "Total number of all requests broken down by command (get, set, etc.) and status per slab.",
    SLAB_COMMAND_SERVER,
);

// --- Extstore ---

pub static EXTSTORE_COMPACT_LOST: MetricDef = MetricDef::counter(
    "",
    "extstore_compact_lost_total",
    "Total number of items lost because they were locked during extstore compaction.",
    SERVER,
);
pub static EXTSTORE_COMPACT_RESCUES: MetricDef = MetricDef::counter(
    "",
    "extstore_compact_rescued_total",
    "Total number of items moved to a new page during extstore compaction,",
    SERVER,
);
pub static EXTSTORE_COMPACT_SKIPPED: MetricDef = MetricDef::counter(
    "",
    "extstore_compact_skipped_total",
    "Total number of items dropped due to inactivity during extstore compaction.",
    SERVER,
);
pub static EXTSTORE_PAGE_ALLOCS: MetricDef = MetricDef::counter(
    "",
    "extstore_pages_allocated_total",
    "Total number of times a page was allocated in extstore.",
    SERVER,
);
pub static EXTSTORE_PAGE_EVICTIONS: MetricDef = MetricDef::counter(
    "",
    "extstore_pages_evicted_total",
    "Total number of times a page was evicted from extstore.",
    SERVER,
);
pub static EXTSTORE_PAGE_RECLAIMS: MetricDef = MetricDef::counter(
    "",
    "extstore_pages_reclaimed_total",
    "Total number of times an empty extstore page was freed.",
    SERVER,
);
pub static EXTSTORE_PAGES_FREE: MetricDef = MetricDef::gauge(
    "",
    "extstore_pages_free",
    "Number of extstore pages not yet containing any items.",
    SERVER,
);
pub static EXTSTORE_PAGES_USED: MetricDef = MetricDef::gauge(
    "",
    "extstore_pages_used",
    "Number of extstore pages containing at least one item.",
    SERVER,
);
pub static EXTSTORE_OBJECTS_EVICTED: MetricDef = MetricDef::counter(
    "",
    "extstore_objects_evicted_total",
    "Total number of items evicted from extstore to free up space.",
    SERVER,
);
pub static EXTSTORE_OBJECTS_READ: MetricDef = MetricDef::counter(
    "",
    "extstore_objects_read_total",
    "Total number of items read from extstore.",
    SERVER,
);
pub static EXTSTORE_OBJECTS_WRITTEN: MetricDef = MetricDef::counter(
    "",
    "extstore_objects_written_total",
    "Total number of items written to extstore.",
    SERVER,
);
pub static EXTSTORE_OBJECTS_USED: MetricDef = MetricDef::gauge(
    "",
    "extstore_objects_used",
    "Number of items stored in extstore.",
    SERVER,
);
pub static EXTSTORE_BYTES_EVICTED: MetricDef = MetricDef::counter(
    "",
    "extstore_bytes_evicted_total",
    "Total number of bytes evicted from extstore to free up space.",
    SERVER,
);
pub static EXTSTORE_BYTES_WRITTEN: MetricDef = MetricDef::counter(
    "",
    "extstore_bytes_written_total",
    "Total number of bytes written to extstore.",
    SERVER,
);
pub static EXTSTORE_BYTES_READ: MetricDef = MetricDef::counter(
    "",
    "extstore_bytes_read_total",
    "Total number of bytes read from extstore.",
    SERVER,
);
pub static EXTSTORE_BYTES_USED: MetricDef = MetricDef::gauge(
    "",
    "extstore_bytes_used",
    "Current number of bytes used to store items in extstore.",
    SERVER,
);
pub static EXTSTORE_BYTES_FRAGMENTED: MetricDef = MetricDef::gauge(
    "",
    "extstore_bytes_fragmented",
    "Current number of bytes in extstore pages allocated but not used to store an object.",
    SERVER,
);
pub static EXTSTORE_BYTES_LIMIT: MetricDef = MetricDef::gauge(
    "",
    "extstore_bytes_limit",
    "Number of bytes of external storage allocated for this server.",
    SERVER,
);
pub static EXTSTORE_IO_QUEUE_DEPTH: MetricDef = MetricDef::gauge(
    "",
    "extstore_io_queue_depth",
    "Number of items in the I/O queue waiting to be processed.",
    SERVER,
);

/// Every family the exporter emits, in registration order.
pub static ALL: &[&MetricDef] = &[
    &UP,
    &UPTIME,
    &TIME,
    &VERSION,
    &RUSAGE_USER,
    &RUSAGE_SYSTEM,
    &BYTES_READ,
    &BYTES_WRITTEN,
    &CURRENT_CONNECTIONS,
    &MAX_CONNECTIONS,
    &CONNECTIONS_TOTAL,
    &REJECTED_CONNECTIONS,
    &CONNS_YIELDED,
    &LISTENER_DISABLED,
    &ACCEPTING_CONNECTIONS,
    &CURRENT_BYTES,
    &LIMIT_BYTES,
    &COMMANDS,
    &ITEMS,
    &ITEMS_TOTAL,
    &EVICTIONS,
    &RECLAIMED,
    &MALLOCED,
    &LRU_CRAWLER_ENABLED,
    &LRU_CRAWLER_SLEEP,
    &LRU_CRAWLER_MAX_ITEMS,
    &LRU_MAINTAINER_THREAD,
    &LRU_HOT_PERCENT,
    &LRU_WARM_PERCENT,
    &LRU_HOT_MAX_AGE_FACTOR,
    &LRU_WARM_MAX_AGE_FACTOR,
    &LRU_CRAWLER_STARTS,
    &LRU_CRAWLER_RECLAIMED,
    &LRU_CRAWLER_ITEMS_CHECKED,
    &LRU_CRAWLER_MOVES_TO_COLD,
    &LRU_CRAWLER_MOVES_TO_WARM,
    &LRU_CRAWLER_MOVES_WITHIN_LRU,
    &SLAB_ITEMS_NUMBER,
    &SLAB_ITEMS_AGE,
    &SLAB_ITEMS_CRAWLER_RECLAIMED,
    &SLAB_ITEMS_EVICTED,
    &SLAB_ITEMS_EVICTED_NONZERO,
    &SLAB_ITEMS_EVICTED_TIME,
    &SLAB_ITEMS_EVICTED_UNFETCHED,
    &SLAB_ITEMS_EXPIRED_UNFETCHED,
    &SLAB_ITEMS_OUTOFMEMORY,
    &SLAB_ITEMS_RECLAIMED,
    &SLAB_ITEMS_TAILREPAIRS,
    &SLAB_ITEMS_MOVES_TO_COLD,
    &SLAB_ITEMS_MOVES_TO_WARM,
    &SLAB_ITEMS_MOVES_WITHIN_LRU,
    &SLAB_ITEMS_HOT,
    &SLAB_ITEMS_WARM,
    &SLAB_ITEMS_COLD,
    &SLAB_ITEMS_TEMPORARY,
    &SLAB_ITEMS_AGE_OLDEST_HOT,
    &SLAB_ITEMS_AGE_OLDEST_WARM,
    &SLAB_LRU_HITS,
    &SLAB_CHUNK_SIZE,
    &SLAB_CHUNKS_PER_PAGE,
    &SLAB_CURRENT_PAGES,
    &SLAB_CURRENT_CHUNKS,
    &SLAB_CHUNKS_USED,
    &SLAB_CHUNKS_FREE,
    &SLAB_CHUNKS_FREE_END,
    &SLAB_MEM_REQUESTED,
    &SLAB_COMMANDS,
    &EXTSTORE_COMPACT_LOST,
    &EXTSTORE_COMPACT_RESCUES,
    &EXTSTORE_COMPACT_SKIPPED,
    &EXTSTORE_PAGE_ALLOCS,
    &EXTSTORE_PAGE_EVICTIONS,
    &EXTSTORE_PAGE_RECLAIMS,
    &EXTSTORE_PAGES_FREE,
    &EXTSTORE_PAGES_USED,
    &EXTSTORE_OBJECTS_EVICTED,
    &EXTSTORE_OBJECTS_READ,
    &EXTSTORE_OBJECTS_WRITTEN,
    &EXTSTORE_OBJECTS_USED,
    &EXTSTORE_BYTES_EVICTED,
    &EXTSTORE_BYTES_WRITTEN,
    &EXTSTORE_BYTES_READ,
    &EXTSTORE_BYTES_USED,
    &EXTSTORE_BYTES_FRAGMENTED,
    &EXTSTORE_BYTES_LIMIT,
    &EXTSTORE_IO_QUEUE_DEPTH,
];

/// Checks every catalog entry once: valid Prometheus names and labels, and
/// no two entries sharing a fully qualified name.
///
/// Called at startup so a broken definition fails the process before the
/// first scrape instead of inside a collection cycle.
pub fn validate() -> Result<()> {
    let mut seen = HashSet::with_capacity(ALL.len());

    for def in ALL {
        let fq_name = def.fq_name();
        let labels = def.labels.iter().map(|l| (*l).to_string()).collect();
        Desc::new(fq_name.clone(), def.help.to_string(), labels, Default::default())?;

        if def.labels.last() != Some(&"server") {
            bail!("metric {fq_name} must carry the server label last");
        }
        if !seen.insert(fq_name.clone()) {
            bail!("metric {fq_name} is defined twice");
        }
    }

    Ok(())
}
