pub mod backend;
pub mod collectors;
pub mod registry;
pub mod sys;
pub mod types;

pub use backend::{MetricsBackend, RegistryBackend, ServeConfig};
pub use collectors::ControllerMetrics;
pub use registry::{Collector, CounterMetric, GaugeMetric, MetricsRegistry};
pub use sys::MetricsSys;
pub use types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue};
