use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use conform_common::{
    ComplianceState, RemediationStatus, ScanStatus,
    error::{ConformError, Result},
};

use crate::{
    backend::{METRICS_PATH, MetricsBackend, RegistryBackend, ServeConfig},
    collectors::ControllerMetrics,
    registry::MetricsRegistry,
};

/// The metrics reporter of the control plane.
///
/// Owns the fixed instrument set, registers it once at startup and runs
/// the HTTPS scrape listener. Domain controllers hold an `Arc` to this
/// and call the increment/set operations on every observed status
/// transition; those operations never block and are safe from any
/// number of concurrent callers.
pub struct MetricsSys {
    backend: Arc<dyn MetricsBackend>,
    config: ServeConfig,
    metrics: ControllerMetrics,
}

impl MetricsSys {
    pub fn new(backend: Arc<dyn MetricsBackend>, config: ServeConfig) -> Self {
        Self {
            backend,
            config,
            metrics: ControllerMetrics::new(),
        }
    }

    /// Reporter over a fresh [`RegistryBackend`] with the fixed listen
    /// address and keypair locations.
    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Self {
        Self::new(
            Arc::new(RegistryBackend::new(registry)),
            ServeConfig::default(),
        )
    }

    /// Register every instrument with the backend. Must be called
    /// exactly once, before [`MetricsSys::start`]; a second call fails
    /// with a duplicate-registration error on the first instrument.
    pub fn register(&self) -> Result<()> {
        for (name, collector) in self.metrics.collectors() {
            debug!(metric = name, "registering collector");
            self.backend
                .register(collector)
                .map_err(|err| ConformError::for_collector(name, err))?;
        }
        Ok(())
    }

    /// Serve the scrape endpoint until the token is cancelled.
    ///
    /// Always returns `Ok(())`: a failing metrics endpoint must never
    /// take the control plane down with it, so listener errors are
    /// logged and swallowed here. Whoever wants the endpoint back
    /// restarts the process.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        info!(addr = %self.config.listen, path = METRICS_PATH, "serving controller metrics");

        let router = scrape_router(Arc::clone(&self.backend));
        if let Err(err) = self.backend.serve(&self.config, router, shutdown).await {
            error!(error = %err, "metrics service failed");
        }
        Ok(())
    }

    /// Record a scan status transition; also counts an error for the
    /// scan when the transition carried a non-empty error message.
    pub fn inc_scan_status(&self, name: &str, status: &ScanStatus) {
        let phase = status.phase.to_string();
        let result = status.result.to_string();
        self.metrics.scan_status.inc_one(&[name, &phase, &result]);

        if !status.error_message.is_empty() {
            self.metrics.scan_error.inc_one(&[name]);
        }
    }

    /// Record a remediation status transition.
    pub fn inc_remediation_status(&self, name: &str, status: &RemediationStatus) {
        let state = status.application_state.to_string();
        self.metrics.remediation_status.inc_one(&[name, &state]);
    }

    /// Set the compliance gauge for a suite; the last caller wins.
    pub fn set_compliance_state(&self, name: &str, state: ComplianceState) {
        self.metrics.compliance_state.set(&[name], state.ordinal());
    }

    pub fn set_compliance_state_compliant(&self, name: &str) {
        self.set_compliance_state(name, ComplianceState::Compliant);
    }

    pub fn set_compliance_state_non_compliant(&self, name: &str) {
        self.set_compliance_state(name, ComplianceState::NonCompliant);
    }

    pub fn set_compliance_state_inconsistent(&self, name: &str) {
        self.set_compliance_state(name, ComplianceState::Inconsistent);
    }

    pub fn set_compliance_state_error(&self, name: &str) {
        self.set_compliance_state(name, ComplianceState::Error);
    }
}

pub fn scrape_router(backend: Arc<dyn MetricsBackend>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(scrape))
        .with_state(backend)
}

async fn scrape(State(backend): State<Arc<dyn MetricsBackend>>) -> impl IntoResponse {
    let payload = backend.render();

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );

    response
}
