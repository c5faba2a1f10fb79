use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
};

use conform_common::error::{ConformError, Result};

use crate::types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue};

type LabelValues = Vec<String>;

/// A registered instrument: it can describe its schema and dump every
/// label tuple it has observed so far.
pub trait Collector: Send + Sync {
    fn descriptor(&self) -> MetricDescriptor;
    fn collect(&self) -> Vec<MetricSample>;
}

/// Process-wide collection of instruments eligible for scraping.
///
/// A registry is always constructor-injected; tests use an isolated
/// instance instead of sharing one across the process.
pub struct MetricsRegistry {
    collectors: RwLock<HashMap<String, Arc<dyn Collector>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            collectors: RwLock::new(HashMap::new()),
        }
    }

    /// Register an instrument under its descriptor name. Registering the
    /// same name twice is a programming error and fails with
    /// [`ConformError::DuplicateRegistration`].
    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let name = collector.descriptor().name;
        let mut collectors = self.collectors.write().map_err(|_| {
            ConformError::InternalError("metrics registry lock poisoned".to_string())
        })?;

        if collectors.contains_key(&name) {
            return Err(ConformError::DuplicateRegistration(name));
        }

        collectors.insert(name, collector);
        Ok(())
    }

    pub fn collect_all(&self) -> Vec<CollectedMetric> {
        let collectors = match self.collectors.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut collected = collectors
            .values()
            .map(|collector| CollectedMetric {
                descriptor: collector.descriptor(),
                samples: collector.collect(),
            })
            .collect::<Vec<_>>();

        collected.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        collected
    }

    /// Render all registered instruments in the Prometheus text
    /// exposition format. Label tuples that were never observed do not
    /// appear in the output.
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for metric in self.collect_all() {
            output.push_str("# HELP ");
            output.push_str(&metric.descriptor.name);
            output.push(' ');
            output.push_str(&escape_help(&metric.descriptor.help));
            output.push('\n');

            output.push_str("# TYPE ");
            output.push_str(&metric.descriptor.name);
            output.push(' ');
            output.push_str(metric.descriptor.metric_type.as_prometheus_type());
            output.push('\n');

            for sample in metric.samples {
                let value = match sample.value {
                    MetricValue::Counter(value) => value.to_string(),
                    MetricValue::Gauge(value) => value.to_string(),
                };
                output.push_str(&render_sample_line(
                    &metric.descriptor.name,
                    &sample.labels,
                    &value,
                ));
            }
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A monotonically non-decreasing value per label tuple. Series are
/// created lazily on first increment and live for the process lifetime.
pub struct CounterMetric {
    descriptor: MetricDescriptor,
    series: RwLock<HashMap<LabelValues, Arc<AtomicU64>>>,
}

impl CounterMetric {
    pub fn new(name: &str, help: &str, variable_labels: &[&str]) -> Self {
        Self {
            descriptor: MetricDescriptor {
                name: name.to_string(),
                help: help.to_string(),
                metric_type: MetricType::Counter,
                variable_labels: variable_labels
                    .iter()
                    .map(|label| (*label).to_string())
                    .collect(),
            },
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn inc(&self, labels: &[&str], value: u64) {
        let series = self.get_or_create_series(labels);
        series.fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc_one(&self, labels: &[&str]) {
        self.inc(labels, 1);
    }

    /// Current value for a tuple. Reading never creates the series, so
    /// an unobserved tuple stays invisible to scrapes.
    pub fn value(&self, labels: &[&str]) -> u64 {
        let label_values = normalize_labels(&self.descriptor, labels);
        match self.series.read() {
            Ok(guard) => guard
                .get(&label_values)
                .map(|series| series.load(Ordering::Relaxed))
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn get_or_create_series(&self, labels: &[&str]) -> Arc<AtomicU64> {
        let label_values = normalize_labels(&self.descriptor, labels);
        if let Ok(guard) = self.series.read()
            && let Some(existing) = guard.get(&label_values)
        {
            return existing.clone();
        }

        match self.series.write() {
            Ok(mut guard) => guard
                .entry(label_values)
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone(),
            Err(_) => Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Collector for CounterMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        series
            .iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(&self.descriptor, label_values),
                value: MetricValue::Counter(value.load(Ordering::Relaxed)),
            })
            .collect()
    }
}

/// Last-set value per label tuple; each set overwrites the previous one.
pub struct GaugeMetric {
    descriptor: MetricDescriptor,
    series: RwLock<HashMap<LabelValues, Arc<AtomicI64>>>,
}

impl GaugeMetric {
    pub fn new(name: &str, help: &str, variable_labels: &[&str]) -> Self {
        Self {
            descriptor: MetricDescriptor {
                name: name.to_string(),
                help: help.to_string(),
                metric_type: MetricType::Gauge,
                variable_labels: variable_labels
                    .iter()
                    .map(|label| (*label).to_string())
                    .collect(),
            },
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, labels: &[&str], value: i64) {
        let series = self.get_or_create_series(labels);
        series.store(value, Ordering::Relaxed);
    }

    /// Current value for a tuple. Reading never creates the series, so
    /// an unobserved tuple stays invisible to scrapes.
    pub fn value(&self, labels: &[&str]) -> i64 {
        let label_values = normalize_labels(&self.descriptor, labels);
        match self.series.read() {
            Ok(guard) => guard
                .get(&label_values)
                .map(|series| series.load(Ordering::Relaxed))
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn get_or_create_series(&self, labels: &[&str]) -> Arc<AtomicI64> {
        let label_values = normalize_labels(&self.descriptor, labels);
        if let Ok(guard) = self.series.read()
            && let Some(existing) = guard.get(&label_values)
        {
            return existing.clone();
        }

        match self.series.write() {
            Ok(mut guard) => guard
                .entry(label_values)
                .or_insert_with(|| Arc::new(AtomicI64::new(0)))
                .clone(),
            Err(_) => Arc::new(AtomicI64::new(0)),
        }
    }
}

impl Collector for GaugeMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        series
            .iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(&self.descriptor, label_values),
                value: MetricValue::Gauge(value.load(Ordering::Relaxed)),
            })
            .collect()
    }
}

fn normalize_labels(descriptor: &MetricDescriptor, labels: &[&str]) -> LabelValues {
    let expected = descriptor.variable_labels.len();
    (0..expected)
        .map(|index| labels.get(index).copied().unwrap_or_default().to_string())
        .collect()
}

fn materialize_labels(descriptor: &MetricDescriptor, values: &[String]) -> Vec<(String, String)> {
    descriptor
        .variable_labels
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn render_sample_line(name: &str, labels: &[(String, String)], value: &str) -> String {
    let mut rendered = String::new();
    rendered.push_str(name);

    if !labels.is_empty() {
        rendered.push('{');
        for (index, (key, label_value)) in labels.iter().enumerate() {
            if index > 0 {
                rendered.push(',');
            }
            rendered.push_str(key);
            rendered.push_str("=\"");
            rendered.push_str(&escape_label_value(label_value));
            rendered.push('"');
        }
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(value);
    rendered.push('\n');
    rendered
}

fn escape_help(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_counts_per_label_tuple() {
        let counter = CounterMetric::new("requests_total", "Total requests", &["name", "phase"]);
        for _ in 0..5 {
            counter.inc_one(&["scan-a", "RUNNING"]);
        }
        counter.inc_one(&["scan-b", "RUNNING"]);

        assert_eq!(counter.value(&["scan-a", "RUNNING"]), 5);
        assert_eq!(counter.value(&["scan-b", "RUNNING"]), 1);
    }

    #[test]
    fn concurrent_increments_on_one_tuple_are_lossless() {
        const WORKERS: usize = 8;
        const INCREMENTS: u64 = 1_000;

        let counter = Arc::new(CounterMetric::new(
            "contended_total",
            "Contended tuple",
            &["name"],
        ));

        let workers = (0..WORKERS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..INCREMENTS {
                        counter.inc_one(&["scan-a"]);
                    }
                })
            })
            .collect::<Vec<_>>();

        for worker in workers {
            worker.join().expect("worker");
        }

        assert_eq!(counter.value(&["scan-a"]), WORKERS as u64 * INCREMENTS);
    }

    #[test]
    fn value_reads_do_not_materialize_series() {
        let registry = MetricsRegistry::new();
        let counter = Arc::new(CounterMetric::new("quiet_total", "Never bumped", &["name"]));
        let gauge = Arc::new(GaugeMetric::new("quiet_state", "Never set", &["name"]));
        registry.register(counter.clone()).expect("registration");
        registry.register(gauge.clone()).expect("registration");

        assert_eq!(counter.value(&["scan-a"]), 0);
        assert_eq!(gauge.value(&["suite-a"]), 0);

        let rendered = registry.render_prometheus();
        assert!(!rendered.contains("quiet_total{"));
        assert!(!rendered.contains("quiet_state{"));
    }

    #[test]
    fn gauge_set_overwrites() {
        let gauge = GaugeMetric::new("state", "Current state", &["name"]);
        gauge.set(&["suite-a"], 3);
        gauge.set(&["suite-a"], 1);
        gauge.set(&["suite-a"], 1);

        assert_eq!(gauge.value(&["suite-a"]), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = MetricsRegistry::new();
        let first = Arc::new(CounterMetric::new("dup_total", "Duplicate", &[]));
        let second = Arc::new(CounterMetric::new("dup_total", "Duplicate", &[]));

        registry.register(first).expect("first registration");
        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, ConformError::DuplicateRegistration(name) if name == "dup_total"));
    }

    #[test]
    fn render_skips_unobserved_tuples() {
        let registry = MetricsRegistry::new();
        let counter = Arc::new(CounterMetric::new("empty_total", "Nothing yet", &["name"]));
        registry.register(counter.clone()).expect("registration");

        let rendered = registry.render_prometheus();
        assert!(rendered.contains("# TYPE empty_total counter"));
        assert!(!rendered.contains("empty_total{"));

        counter.inc_one(&["scan-a"]);
        let rendered = registry.render_prometheus();
        assert!(rendered.contains("empty_total{name=\"scan-a\"} 1\n"));
    }

    #[test]
    fn render_keeps_declared_label_order() {
        let registry = MetricsRegistry::new();
        let counter = Arc::new(CounterMetric::new(
            "ordered_total",
            "Label order check",
            &["name", "phase", "result"],
        ));
        registry.register(counter.clone()).expect("registration");

        counter.inc_one(&["scan-a", "DONE", "COMPLIANT"]);
        let rendered = registry.render_prometheus();
        assert!(rendered.contains(
            "ordered_total{name=\"scan-a\",phase=\"DONE\",result=\"COMPLIANT\"} 1\n"
        ));
    }
}
