use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// Prometheus metrics about the exporter itself.
///
/// All metrics use the "memcached_exporter" namespace and live for the whole
/// process, unlike the per-scrape memcached snapshot.
pub struct HealthMetrics {
    registry: Registry,

    /// Total scrapes served on the telemetry path.
    pub scrapes: Counter,
    /// Wall time of one collection cycle across all servers.
    pub scrape_duration: Histogram,
    /// Servers that were up in the most recent cycle.
    pub servers_up: Gauge,
    /// Constant 1, labeled with the exporter version.
    pub build_info: Gauge,
}

impl HealthMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("memcached_exporter".to_string()), None)?;

        let scrapes = Counter::with_opts(Opts::new(
            "scrapes_total",
            "Total number of scrapes of the telemetry path.",
        ))?;
        registry.register(Box::new(scrapes.clone()))?;

        let scrape_duration = Histogram::with_opts(
            HistogramOpts::new(
                "scrape_duration_seconds",
                "Time spent collecting stats from all memcached servers.",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;

        let servers_up = Gauge::with_opts(Opts::new(
            "servers_up",
            "Number of memcached servers up in the last scrape.",
        ))?;
        registry.register(Box::new(servers_up.clone()))?;

        let build_info = Gauge::with_opts(
            Opts::new("build_info", "Build information about the exporter.")
                .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        registry.register(Box::new(build_info.clone()))?;
        build_info.set(1.0);

        Ok(Self {
            registry,
            scrapes,
            scrape_duration,
            servers_up,
            build_info,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
