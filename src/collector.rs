//! Collection cycle: one worker per configured server, all writing into the
//! same sink.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{self, JoinSet};
use tracing::{debug, error, warn};

use crate::catalog;
use crate::client::{StatsSession, StatsSource};
use crate::sink::ObservationSink;
use crate::translate::{CasAccounting, Translator};

/// Result of one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub servers: usize,
    pub reachable: usize,
}

/// Scrapes every configured memcached server on demand.
pub struct Collector<S> {
    source: Arc<S>,
    servers: Vec<String>,
    slab_cas: CasAccounting,
}

impl<S: StatsSource> Collector<S> {
    pub fn new(source: S, servers: Vec<String>, slab_cas: CasAccounting) -> Self {
        Self {
            source: Arc::new(source),
            servers,
            slab_cas,
        }
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Runs one cycle. Returns once every worker has finished, so the sink is
    /// complete when this resolves.
    pub async fn collect(&self, sink: Arc<dyn ObservationSink>) -> CycleSummary {
        let mut workers = JoinSet::new();
        let mut pending: HashMap<task::Id, String> = HashMap::with_capacity(self.servers.len());

        for address in &self.servers {
            let source = Arc::clone(&self.source);
            let sink = Arc::clone(&sink);
            let worker_address = address.clone();
            let slab_cas = self.slab_cas;

            let handle = workers.spawn(async move {
                let up = scrape_server(&*source, &worker_address, &*sink, slab_cas).await;
                let value = if up { 1.0 } else { 0.0 };
                sink.emit(&catalog::UP, value, &[worker_address.as_str()]);
                up
            });
            pending.insert(handle.id(), address.clone());
        }

        let mut summary = CycleSummary {
            servers: self.servers.len(),
            reachable: 0,
        };

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((id, up)) => {
                    pending.remove(&id);
                    if up {
                        summary.reachable += 1;
                    }
                }
                Err(e) => {
                    // A worker that died never reported up.
                    let address = pending.remove(&e.id());
                    error!(server = ?address, error = %e, "scrape worker failed");
                    if let Some(address) = address {
                        sink.emit(&catalog::UP, 0.0, &[address.as_str()]);
                    }
                }
            }
        }

        debug!(
            servers = summary.servers,
            reachable = summary.reachable,
            "collection cycle finished"
        );

        summary
    }
}

/// Scrapes one server. Returns whether it counts as up: connected, both
/// fetches succeeded and both records translated without failure.
async fn scrape_server<S: StatsSource>(
    source: &S,
    address: &str,
    sink: &dyn ObservationSink,
    slab_cas: CasAccounting,
) -> bool {
    let mut session = match source.connect(address).await {
        Ok(session) => session,
        Err(e) => {
            error!(server = address, error = %e, "failed to connect to memcached");
            return false;
        }
    };

    let translator = Translator::new(sink, address, slab_cas);
    let mut up = true;

    match session.stats().await {
        Ok(stats) => {
            if let Err(e) = translator.stats(&stats) {
                warn!(server = address, error = %e, "failed to translate stats");
                up = false;
            }
        }
        Err(e) => {
            error!(server = address, error = %e, "failed to fetch stats");
            up = false;
        }
    }

    match session.settings().await {
        Ok(settings) => {
            if let Err(e) = translator.settings(&settings) {
                warn!(server = address, error = %e, "failed to translate settings");
                up = false;
            }
        }
        Err(e) => {
            error!(server = address, error = %e, "failed to fetch settings");
            up = false;
        }
    }

    up
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;

    use super::*;
    use crate::catalog::{COMMANDS, MAX_CONNECTIONS, UP, UPTIME};
    use crate::client::TransportError;
    use crate::sink::Snapshot;
    use crate::stats::{record, Record, ServerStats};

    #[derive(Clone, Default)]
    struct FakeSession {
        stats: Option<ServerStats>,
        settings: Option<Record>,
    }

    impl StatsSession for FakeSession {
        async fn stats(&mut self) -> Result<ServerStats, TransportError> {
            self.stats.clone().ok_or(TransportError::Closed)
        }

        async fn settings(&mut self) -> Result<Record, TransportError> {
            self.settings.clone().ok_or(TransportError::Closed)
        }
    }

    #[derive(Default)]
    struct FakeSource {
        servers: HashMap<String, FakeSession>,
    }

    impl FakeSource {
        fn with(mut self, address: &str, session: FakeSession) -> Self {
            self.servers.insert(address.to_string(), session);
            self
        }
    }

    impl StatsSource for FakeSource {
        type Session = FakeSession;

        async fn connect(&self, address: &str) -> Result<FakeSession, TransportError> {
            if address.starts_with("panic") {
                panic!("worker for {address} crashed");
            }
            self.servers
                .get(address)
                .cloned()
                .ok_or_else(|| TransportError::Connect {
                    address: address.to_string(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                })
        }
    }

    fn healthy() -> FakeSession {
        FakeSession {
            stats: Some(ServerStats {
                stats: record(&[
                    ("version", "1.6.21"),
                    ("uptime", "100"),
                    ("cmd_set", "50"),
                    ("cas_hits", "5"),
                    ("cas_misses", "3"),
                    ("cas_badval", "2"),
                ]),
                ..Default::default()
            }),
            settings: Some(record(&[("maxconns", "1024")])),
        }
    }

    async fn run(source: FakeSource, servers: &[&str]) -> (Arc<Snapshot>, CycleSummary) {
        let collector = Collector::new(
            source,
            servers.iter().map(|s| s.to_string()).collect(),
            CasAccounting::default(),
        );
        let snapshot = Arc::new(Snapshot::new().expect("snapshot"));
        let summary = collector.collect(snapshot.clone()).await;
        (snapshot, summary)
    }

    #[tokio::test]
    async fn test_reachable_and_unreachable_servers() {
        let source = FakeSource::default().with("a:11211", healthy());

        let (snapshot, summary) = run(source, &["a:11211", "b:11211"]).await;

        assert_eq!(summary, CycleSummary { servers: 2, reachable: 1 });
        assert_eq!(snapshot.value(&UP, &["a:11211"]), Some(1.0));
        assert_eq!(snapshot.value(&UP, &["b:11211"]), Some(0.0));
        assert_eq!(snapshot.value(&UPTIME, &["a:11211"]), Some(100.0));
        assert_eq!(snapshot.value(&COMMANDS, &["set", "hit", "a:11211"]), Some(40.0));
        assert_eq!(snapshot.value(&MAX_CONNECTIONS, &["a:11211"]), Some(1024.0));

        // The unreachable server only reports up.
        let b_series: usize = snapshot
            .gather()
            .iter()
            .flat_map(|f| f.get_metric())
            .filter(|m| m.get_label().iter().any(|l| l.get_value() == "b:11211"))
            .count();
        assert_eq!(b_series, 1);
    }

    #[tokio::test]
    async fn test_translation_failure_marks_server_down() {
        let mut session = healthy();
        if let Some(stats) = session.stats.as_mut() {
            stats.stats.insert("uptime".to_string(), "soon".to_string());
        }
        let source = FakeSource::default().with("a:11211", session);

        let (snapshot, summary) = run(source, &["a:11211"]).await;

        assert_eq!(summary.reachable, 0);
        assert_eq!(snapshot.value(&UP, &["a:11211"]), Some(0.0));
        // Siblings of the malformed field are still exported.
        assert_eq!(snapshot.value(&MAX_CONNECTIONS, &["a:11211"]), Some(1024.0));
        assert_eq!(snapshot.series_count(&UPTIME), 0);
    }

    #[tokio::test]
    async fn test_settings_fetch_failure_marks_server_down() {
        let mut session = healthy();
        session.settings = None;
        let source = FakeSource::default().with("a:11211", session);

        let (snapshot, summary) = run(source, &["a:11211"]).await;

        assert_eq!(summary.reachable, 0);
        assert_eq!(snapshot.value(&UP, &["a:11211"]), Some(0.0));
        assert_eq!(snapshot.value(&UPTIME, &["a:11211"]), Some(100.0));
        assert_eq!(snapshot.series_count(&MAX_CONNECTIONS), 0);
    }

    #[tokio::test]
    async fn test_stats_fetch_failure_still_reads_settings() {
        let mut session = healthy();
        session.stats = None;
        let source = FakeSource::default().with("a:11211", session);

        let (snapshot, summary) = run(source, &["a:11211"]).await;

        assert_eq!(summary.reachable, 0);
        assert_eq!(snapshot.value(&UP, &["a:11211"]), Some(0.0));
        assert_eq!(snapshot.value(&MAX_CONNECTIONS, &["a:11211"]), Some(1024.0));
    }

    #[tokio::test]
    async fn test_crashed_worker_reports_down() {
        let source = FakeSource::default().with("a:11211", healthy());

        let (snapshot, summary) = run(source, &["a:11211", "panic:11211"]).await;

        assert_eq!(summary, CycleSummary { servers: 2, reachable: 1 });
        assert_eq!(snapshot.value(&UP, &["a:11211"]), Some(1.0));
        assert_eq!(snapshot.value(&UP, &["panic:11211"]), Some(0.0));
        assert_eq!(snapshot.series_count(&UP), 2);
    }

    #[tokio::test]
    async fn test_no_servers() {
        let (snapshot, summary) = run(FakeSource::default(), &[]).await;

        assert_eq!(summary, CycleSummary::default());
        assert_eq!(snapshot.total_series(), 0);
    }

    #[tokio::test]
    async fn test_many_servers_share_one_sink() {
        let addresses: Vec<String> = (0..16).map(|i| format!("10.0.0.{i}:11211")).collect();
        let source = addresses
            .iter()
            .fold(FakeSource::default(), |source, a| source.with(a, healthy()));
        let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();

        let (snapshot, summary) = run(source, &refs).await;

        assert_eq!(summary.reachable, 16);
        assert_eq!(snapshot.series_count(&UP), 16);
        assert_eq!(snapshot.series_count(&UPTIME), 16);
    }
}
