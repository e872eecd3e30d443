//! Per-server translation of raw memcached statistics into observations.
//!
//! [`Translator::stats`] and [`Translator::settings`] walk declarative field
//! tables in a fixed order. A failing field never stops the walk; the last
//! failure is returned so the caller can mark the server unhealthy.

pub mod binder;

use serde::Deserialize;
use tracing::error;

use crate::catalog::{self, MetricDef};
use crate::sink::ObservationSink;
use crate::stats::parse::{parse_number, sum, Grammar};
use crate::stats::{ParseError, Record, ServerStats};

pub use binder::{Binder, Binding, FieldBinding, Outcome};

/// Commands reported as `<verb>_hits`/`<verb>_misses` pairs.
const COMMAND_VERBS: &[&str] = &["get", "delete", "incr", "decr", "cas", "touch"];

/// Presence of this field means extstore is active on the server.
const EXTSTORE_GATE: &str = "extstore_limit_maxbytes";

/// `stats settings` field that switches the crawler cluster on.
const LRU_CRAWLER_SETTING: &str = "lru_crawler";

static EXTSTORE_FIELDS: &[FieldBinding] = &[
    FieldBinding::number("extstore_compact_lost", &catalog::EXTSTORE_COMPACT_LOST),
    FieldBinding::number("extstore_compact_rescues", &catalog::EXTSTORE_COMPACT_RESCUES),
    FieldBinding::number("extstore_compact_skipped", &catalog::EXTSTORE_COMPACT_SKIPPED),
    FieldBinding::number("extstore_page_allocs", &catalog::EXTSTORE_PAGE_ALLOCS),
    FieldBinding::number("extstore_page_evictions", &catalog::EXTSTORE_PAGE_EVICTIONS),
    FieldBinding::number("extstore_page_reclaims", &catalog::EXTSTORE_PAGE_RECLAIMS),
    FieldBinding::number("extstore_pages_free", &catalog::EXTSTORE_PAGES_FREE),
    FieldBinding::number("extstore_pages_used", &catalog::EXTSTORE_PAGES_USED),
    FieldBinding::number("extstore_objects_evicted", &catalog::EXTSTORE_OBJECTS_EVICTED),
    FieldBinding::number("extstore_objects_read", &catalog::EXTSTORE_OBJECTS_READ),
    FieldBinding::number("extstore_objects_written", &catalog::EXTSTORE_OBJECTS_WRITTEN),
    FieldBinding::number("extstore_objects_used", &catalog::EXTSTORE_OBJECTS_USED),
    FieldBinding::number("extstore_bytes_evicted", &catalog::EXTSTORE_BYTES_EVICTED),
    FieldBinding::number("extstore_bytes_written", &catalog::EXTSTORE_BYTES_WRITTEN),
    FieldBinding::number("extstore_bytes_read", &catalog::EXTSTORE_BYTES_READ),
    FieldBinding::number("extstore_bytes_used", &catalog::EXTSTORE_BYTES_USED),
    FieldBinding::number("extstore_bytes_fragmented", &catalog::EXTSTORE_BYTES_FRAGMENTED),
    FieldBinding::number(EXTSTORE_GATE, &catalog::EXTSTORE_BYTES_LIMIT),
    FieldBinding::number("extstore_io_queue", &catalog::EXTSTORE_IO_QUEUE_DEPTH),
];

static SERVER_FIELDS: &[FieldBinding] = &[
    FieldBinding::timeval("rusage_user", &catalog::RUSAGE_USER),
    FieldBinding::timeval("rusage_system", &catalog::RUSAGE_SYSTEM),
    FieldBinding::number("bytes", &catalog::CURRENT_BYTES),
    FieldBinding::number("limit_maxbytes", &catalog::LIMIT_BYTES),
    FieldBinding::number("curr_items", &catalog::ITEMS),
    FieldBinding::number("total_items", &catalog::ITEMS_TOTAL),
    FieldBinding::number("bytes_read", &catalog::BYTES_READ),
    FieldBinding::number("bytes_written", &catalog::BYTES_WRITTEN),
    FieldBinding::number("curr_connections", &catalog::CURRENT_CONNECTIONS),
    FieldBinding::number("total_connections", &catalog::CONNECTIONS_TOTAL),
    FieldBinding::number("rejected_connections", &catalog::REJECTED_CONNECTIONS),
    FieldBinding::number("conn_yields", &catalog::CONNS_YIELDED),
    FieldBinding::number("listen_disabled_num", &catalog::LISTENER_DISABLED),
    FieldBinding::number("evictions", &catalog::EVICTIONS),
    FieldBinding::number("reclaimed", &catalog::RECLAIMED),
    FieldBinding::number("lru_crawler_starts", &catalog::LRU_CRAWLER_STARTS),
    FieldBinding::number("crawler_items_checked", &catalog::LRU_CRAWLER_ITEMS_CHECKED),
    FieldBinding::number("crawler_reclaimed", &catalog::LRU_CRAWLER_RECLAIMED),
    FieldBinding::number("moves_to_cold", &catalog::LRU_CRAWLER_MOVES_TO_COLD),
    FieldBinding::number("moves_to_warm", &catalog::LRU_CRAWLER_MOVES_TO_WARM),
    FieldBinding::number("moves_within_lru", &catalog::LRU_CRAWLER_MOVES_WITHIN_LRU),
    FieldBinding::number("total_malloced", &catalog::MALLOCED),
    FieldBinding::number("accepting_conns", &catalog::ACCEPTING_CONNECTIONS),
];

/// Item fields bound per slab class. Which of them a class reports depends on
/// the server version and LRU mode, so absence is never an error here.
static SLAB_ITEM_FIELDS: &[FieldBinding] = &[
    FieldBinding::number("number", &catalog::SLAB_ITEMS_NUMBER),
    FieldBinding::number("age", &catalog::SLAB_ITEMS_AGE),
    FieldBinding::number("crawler_reclaimed", &catalog::SLAB_ITEMS_CRAWLER_RECLAIMED),
    FieldBinding::number("evicted", &catalog::SLAB_ITEMS_EVICTED),
    FieldBinding::number("evicted_nonzero", &catalog::SLAB_ITEMS_EVICTED_NONZERO),
    FieldBinding::number("evicted_time", &catalog::SLAB_ITEMS_EVICTED_TIME),
    FieldBinding::number("evicted_unfetched", &catalog::SLAB_ITEMS_EVICTED_UNFETCHED),
    FieldBinding::number("expired_unfetched", &catalog::SLAB_ITEMS_EXPIRED_UNFETCHED),
    FieldBinding::number("outofmemory", &catalog::SLAB_ITEMS_OUTOFMEMORY),
    FieldBinding::number("reclaimed", &catalog::SLAB_ITEMS_RECLAIMED),
    FieldBinding::number("tailrepairs", &catalog::SLAB_ITEMS_TAILREPAIRS),
    FieldBinding::number("moves_to_cold", &catalog::SLAB_ITEMS_MOVES_TO_COLD),
    FieldBinding::number("moves_to_warm", &catalog::SLAB_ITEMS_MOVES_TO_WARM),
    FieldBinding::number("moves_within_lru", &catalog::SLAB_ITEMS_MOVES_WITHIN_LRU),
    FieldBinding::number("number_hot", &catalog::SLAB_ITEMS_HOT),
    FieldBinding::number("number_warm", &catalog::SLAB_ITEMS_WARM),
    FieldBinding::number("number_cold", &catalog::SLAB_ITEMS_COLD),
    FieldBinding::number("number_temp", &catalog::SLAB_ITEMS_TEMPORARY),
    FieldBinding::number("age_hot", &catalog::SLAB_ITEMS_AGE_OLDEST_HOT),
    FieldBinding::number("age_warm", &catalog::SLAB_ITEMS_AGE_OLDEST_WARM),
];

/// `hits_to_<tier>` item fields and the `lru` label they map to.
const LRU_TIERS: &[(&str, &str)] = &[
    ("hits_to_hot", "hot"),
    ("hits_to_warm", "warm"),
    ("hits_to_cold", "cold"),
    ("hits_to_temp", "temporary"),
];

static SLAB_ALLOCATION_FIELDS: &[FieldBinding] = &[
    FieldBinding::number("chunk_size", &catalog::SLAB_CHUNK_SIZE),
    FieldBinding::number("chunks_per_page", &catalog::SLAB_CHUNKS_PER_PAGE),
    FieldBinding::number("total_pages", &catalog::SLAB_CURRENT_PAGES),
    FieldBinding::number("total_chunks", &catalog::SLAB_CURRENT_CHUNKS),
    FieldBinding::number("used_chunks", &catalog::SLAB_CHUNKS_USED),
    FieldBinding::number("free_chunks", &catalog::SLAB_CHUNKS_FREE),
    FieldBinding::number("free_chunks_end", &catalog::SLAB_CHUNKS_FREE_END),
    FieldBinding::number("mem_requested", &catalog::SLAB_MEM_REQUESTED),
];

static CRAWLER_SETTINGS: &[FieldBinding] = &[
    FieldBinding::flag(LRU_CRAWLER_SETTING, &catalog::LRU_CRAWLER_ENABLED),
    FieldBinding::number("lru_crawler_sleep", &catalog::LRU_CRAWLER_SLEEP),
    FieldBinding::number("lru_crawler_tocrawl", &catalog::LRU_CRAWLER_MAX_ITEMS),
    FieldBinding::flag("lru_maintainer_thread", &catalog::LRU_MAINTAINER_THREAD),
    FieldBinding::number("hot_lru_pct", &catalog::LRU_HOT_PERCENT),
    FieldBinding::number("warm_lru_pct", &catalog::LRU_WARM_PERCENT),
    FieldBinding::number("hot_max_factor", &catalog::LRU_HOT_MAX_AGE_FACTOR),
    FieldBinding::number("warm_max_factor", &catalog::LRU_WARM_MAX_AGE_FACTOR),
];

/// Which cas outcomes are subtracted from `cmd_set` to get plain sets.
///
/// memcached counts every cas attempt in `cmd_set` as well. Per slab class it
/// reports no `cas_misses`, since a miss has no item and therefore no class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasAccounting {
    /// `cas_hits + cas_misses + cas_badval`.
    All,
    /// `cas_hits + cas_badval`.
    #[default]
    HitsAndBadval,
}

impl CasAccounting {
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::All => &["cas_hits", "cas_misses", "cas_badval"],
            Self::HitsAndBadval => &["cas_hits", "cas_badval"],
        }
    }
}

/// Number of unconditional sets: `cmd_set` minus the selected cas outcomes.
///
/// Any absent or malformed input fails the whole derivation.
pub fn plain_sets(record: &Record, accounting: CasAccounting) -> Result<f64, ParseError> {
    let sets = parse_number(record, "cmd_set")?;
    let cas = sum(record, accounting.fields())?;
    Ok(sets - cas)
}

/// Translates one server's records into observations.
pub struct Translator<'a> {
    binder: Binder<'a>,
    server: &'a str,
    slab_cas: CasAccounting,
}

impl<'a> Translator<'a> {
    pub fn new(sink: &'a dyn ObservationSink, server: &'a str, slab_cas: CasAccounting) -> Self {
        Self {
            binder: Binder::new(sink),
            server,
            slab_cas,
        }
    }

    /// Translates the `stats`, `stats items` and `stats slabs` records.
    pub fn stats(&self, stats: &ServerStats) -> Result<(), ParseError> {
        let s = &stats.stats;
        let server = [self.server];
        let mut outcome = Outcome::new();

        if let Some(version) = s.get("version") {
            let labels = [version.as_str(), self.server];
            self.binder.emit(&catalog::VERSION, 1.0, &labels);
        }

        let commands = &catalog::COMMANDS;
        for &verb in COMMAND_VERBS {
            let hits = format!("{verb}_hits");
            let misses = format!("{verb}_misses");
            outcome.record_all([
                self.bind_number(s, commands, &hits, &[verb, "hit", self.server]),
                self.bind_number(s, commands, &misses, &[verb, "miss", self.server]),
            ]);
        }

        outcome.record_all([
            self.bind_number(s, &catalog::UPTIME, "uptime", &server),
            self.bind_number(s, &catalog::TIME, "time", &server),
            self.bind_number(s, commands, "cas_badval", &["cas", "badval", self.server]),
            self.bind_number(s, commands, "cmd_flush", &["flush", "hit", self.server]),
        ]);

        self.derive_plain_sets(
            &mut outcome,
            s,
            CasAccounting::All,
            commands,
            &["set", "hit", self.server],
        );

        if s.contains_key(EXTSTORE_GATE) {
            outcome.record_all(
                EXTSTORE_FIELDS
                    .iter()
                    .map(|field| self.binder.bind_field(s, field, &server)),
            );
        }

        outcome.record_all(
            SERVER_FIELDS
                .iter()
                .map(|field| self.binder.bind_field(s, field, &server)),
        );

        for (slab, items) in &stats.items {
            self.slab_items(&mut outcome, &slab.to_string(), items);
        }

        for (slab, record) in &stats.slabs {
            self.slab_allocation(&mut outcome, &slab.to_string(), record);
        }

        outcome.into_result()
    }

    /// Translates the `stats settings` record.
    pub fn settings(&self, settings: &Record) -> Result<(), ParseError> {
        let server = [self.server];
        let mut outcome = Outcome::new();

        let maxconns = self.bind_number(settings, &catalog::MAX_CONNECTIONS, "maxconns", &server);
        outcome.record(maxconns);

        if settings.get(LRU_CRAWLER_SETTING).map(String::as_str) == Some("yes") {
            outcome.record_all(
                CRAWLER_SETTINGS
                    .iter()
                    .map(|field| self.binder.bind_field(settings, field, &server)),
            );
        }

        outcome.into_result()
    }

    fn slab_items(&self, outcome: &mut Outcome, slab: &str, items: &Record) {
        let labels = [slab, self.server];

        outcome.record_all(
            SLAB_ITEM_FIELDS
                .iter()
                .map(|field| self.binder.bind_field(items, field, &labels)),
        );

        outcome.record_all(LRU_TIERS.iter().map(|&(key, tier)| {
            let labels = [slab, tier, self.server];
            self.bind_number(items, &catalog::SLAB_LRU_HITS, key, &labels)
        }));
    }

    fn slab_allocation(&self, outcome: &mut Outcome, slab: &str, record: &Record) {
        let labels = [slab, self.server];

        for &verb in COMMAND_VERBS {
            outcome.record(self.bind_number(
                record,
                &catalog::SLAB_COMMANDS,
                &format!("{verb}_hits"),
                &[slab, verb, "hit", self.server],
            ));
        }
        outcome.record(self.bind_number(
            record,
            &catalog::SLAB_COMMANDS,
            "cas_badval",
            &[slab, "cas", "badval", self.server],
        ));

        self.derive_plain_sets(
            outcome,
            record,
            self.slab_cas,
            &catalog::SLAB_COMMANDS,
            &[slab, "set", "hit", self.server],
        );

        outcome.record_all(
            SLAB_ALLOCATION_FIELDS
                .iter()
                .map(|field| self.binder.bind_field(record, field, &labels)),
        );
    }

    fn derive_plain_sets(
        &self,
        outcome: &mut Outcome,
        record: &Record,
        accounting: CasAccounting,
        metric: &'static MetricDef,
        labels: &[&str],
    ) {
        match plain_sets(record, accounting) {
            Ok(value) => self.binder.emit(metric, value, labels),
            Err(e) => {
                error!(server = self.server, error = %e, "failed to derive plain set count");
                outcome.record::<()>(Err(e));
            }
        }
    }

    fn bind_number(
        &self,
        record: &Record,
        metric: &'static MetricDef,
        key: &str,
        labels: &[&str],
    ) -> Result<Binding, ParseError> {
        let grammar = Grammar::Number;
        self.binder.bind(record, metric, grammar, key, labels)
    }
}
