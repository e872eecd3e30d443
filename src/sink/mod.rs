//! Per-cycle observation sink backed by a Prometheus registry.

use std::collections::HashMap;

use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{CounterVec, GaugeVec, Registry};
use tracing::{error, warn};

use crate::catalog::{self, MetricDef, MetricKind};

/// Sink consumes typed observations produced by the translator.
///
/// Implementations must accept concurrent writers: every server worker of a
/// collection cycle emits into the same sink.
pub trait ObservationSink: Send + Sync {
    /// Record one observation. `labels` follow `metric.labels` order.
    fn emit(&self, metric: &'static MetricDef, value: f64, labels: &[&str]);
}

enum Family {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// Per-cycle Prometheus snapshot of every catalog family.
///
/// A fresh snapshot is built for each collection cycle, so counters hold the
/// server-reported totals rather than accumulating across scrapes.
pub struct Snapshot {
    registry: Registry,
    families: HashMap<(&'static str, &'static str), Family>,
}

impl Snapshot {
    /// Creates a snapshot with every family in [`catalog::ALL`] registered.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let mut families = HashMap::with_capacity(catalog::ALL.len());

        for def in catalog::ALL {
            let family = match def.kind {
                MetricKind::Counter => {
                    let vec = CounterVec::new(def.opts(), def.labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Counter(vec)
                }
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(def.opts(), def.labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Gauge(vec)
                }
            };
            families.insert((def.subsystem, def.name), family);
        }

        Ok(Self { registry, families })
    }

    /// Returns all non-empty families in the snapshot.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Returns the value observed for `metric` with exactly these label values.
    pub fn value(&self, metric: &MetricDef, labels: &[&str]) -> Option<f64> {
        let family = self.find(metric)?;

        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label().len() == labels.len()
                    && m.get_label().iter().all(|pair| {
                        metric
                            .labels
                            .iter()
                            .position(|name| *name == pair.get_name())
                            .and_then(|idx| labels.get(idx))
                            .is_some_and(|v| *v == pair.get_value())
                    })
            })
            .map(|m| match family.get_field_type() {
                MetricType::COUNTER => m.get_counter().get_value(),
                _ => m.get_gauge().get_value(),
            })
    }

    /// Returns the number of series observed for `metric`.
    pub fn series_count(&self, metric: &MetricDef) -> usize {
        self.find(metric).map_or(0, |f| f.get_metric().len())
    }

    /// Returns the total number of series across all families.
    pub fn total_series(&self) -> usize {
        self.gather().iter().map(|f| f.get_metric().len()).sum()
    }

    fn find(&self, metric: &MetricDef) -> Option<MetricFamily> {
        let fq_name = metric.fq_name();
        self.gather().into_iter().find(|f| f.get_name() == fq_name)
    }
}

impl ObservationSink for Snapshot {
    fn emit(&self, metric: &'static MetricDef, value: f64, labels: &[&str]) {
        let Some(family) = self.families.get(&(metric.subsystem, metric.name)) else {
            error!(metric = %metric.fq_name(), "metric missing from snapshot");
            return;
        };

        let result = match family {
            Family::Counter(vec) => {
                if !(value >= 0.0) {
                    warn!(
                        metric = %metric.fq_name(),
                        value,
                        ?labels,
                        "dropping negative counter value"
                    );
                    return;
                }
                vec.get_metric_with_label_values(labels).map(|counter| {
                    counter.reset();
                    counter.inc_by(value);
                })
            }
            Family::Gauge(vec) => vec
                .get_metric_with_label_values(labels)
                .map(|gauge| gauge.set(value)),
        };

        if let Err(e) = result {
            error!(metric = %metric.fq_name(), ?labels, error = %e, "emitting observation");
        }
    }
}
