//! Field-to-metric binding.
//!
//! A binding reads one raw field with a [`Grammar`] and hands the typed value
//! to the sink. Absent fields are skipped silently; malformed fields are
//! reported to the caller and nothing is emitted for them.

use tracing::error;

use crate::catalog::MetricDef;
use crate::sink::ObservationSink;
use crate::stats::parse::Grammar;
use crate::stats::{ParseError, Record};

/// Result of a successful binding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The field was present and an observation was emitted.
    Emitted,
    /// The field does not exist for this server or version.
    Skipped,
}

/// Declarative mapping from a raw field to a catalog metric.
#[derive(Debug)]
pub struct FieldBinding {
    pub key: &'static str,
    pub metric: &'static MetricDef,
    pub grammar: Grammar,
}

impl FieldBinding {
    pub const fn number(key: &'static str, metric: &'static MetricDef) -> Self {
        Self {
            key,
            metric,
            grammar: Grammar::Number,
        }
    }

    pub const fn flag(key: &'static str, metric: &'static MetricDef) -> Self {
        Self {
            key,
            metric,
            grammar: Grammar::Flag,
        }
    }

    pub const fn timeval(key: &'static str, metric: &'static MetricDef) -> Self {
        Self {
            key,
            metric,
            grammar: Grammar::Timeval,
        }
    }
}

/// Emits observations for raw fields into a sink.
#[derive(Clone, Copy)]
pub struct Binder<'a> {
    sink: &'a dyn ObservationSink,
}

impl<'a> Binder<'a> {
    pub fn new(sink: &'a dyn ObservationSink) -> Self {
        Self { sink }
    }

    /// Reads `key` from `record` and emits it as `metric` with `labels`.
    pub fn bind(
        &self,
        record: &Record,
        metric: &'static MetricDef,
        grammar: Grammar,
        key: &str,
        labels: &[&str],
    ) -> Result<Binding, ParseError> {
        match grammar.parse(record, key) {
            Ok(value) => {
                self.emit(metric, value, labels);
                Ok(Binding::Emitted)
            }
            Err(e) if e.is_absent() => Ok(Binding::Skipped),
            Err(e) => Err(e),
        }
    }

    /// Applies a declarative binding.
    pub fn bind_field(
        &self,
        record: &Record,
        field: &FieldBinding,
        labels: &[&str],
    ) -> Result<Binding, ParseError> {
        self.bind(record, field.metric, field.grammar, field.key, labels)
    }

    /// Emits an already computed value.
    pub fn emit(&self, metric: &'static MetricDef, value: f64, labels: &[&str]) {
        debug_assert_eq!(
            labels.len(),
            metric.labels.len(),
            "label arity mismatch for {}",
            metric.fq_name()
        );
        if labels.len() != metric.labels.len() {
            error!(
                metric = %metric.fq_name(),
                expected = metric.labels.len(),
                got = labels.len(),
                "label arity mismatch"
            );
            return;
        }

        self.sink.emit(metric, value, labels);
    }
}

/// Keeps the most recent failure of a sequence of bindings.
///
/// Failures never stop the sequence; only "did anything fail" is surfaced.
#[derive(Debug, Default)]
pub struct Outcome {
    last_failure: Option<ParseError>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one result in, returning the success value if there was one.
    pub fn record<T>(&mut self, result: Result<T, ParseError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.last_failure = Some(e);
                None
            }
        }
    }

    /// Folds a whole batch of bindings in.
    pub fn record_all<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = Result<Binding, ParseError>>,
    {
        for result in results {
            self.record(result);
        }
    }

    pub fn is_ok(&self) -> bool {
        self.last_failure.is_none()
    }

    pub fn into_result(self) -> Result<(), ParseError> {
        match self.last_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
