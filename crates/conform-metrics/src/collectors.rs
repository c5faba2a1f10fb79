use std::sync::Arc;

use crate::registry::{Collector, CounterMetric, GaugeMetric};

pub const METRIC_NAME_SCAN_STATUS: &str = "conform_scan_status_total";
pub const METRIC_NAME_SCAN_ERROR: &str = "conform_scan_error_total";
pub const METRIC_NAME_REMEDIATION_STATUS: &str = "conform_remediation_status_total";
pub const METRIC_NAME_COMPLIANCE_STATE: &str = "conform_compliance_state";

const LABEL_NAME: &str = "name";
const LABEL_PHASE: &str = "phase";
const LABEL_RESULT: &str = "result";
const LABEL_STATE: &str = "state";

/// The fixed instrument set of the controller. The schema is closed:
/// metric names and label names are decided at compile time, and label
/// values carry only resource names and enumerated status fields.
pub struct ControllerMetrics {
    pub(crate) scan_status: Arc<CounterMetric>,
    pub(crate) scan_error: Arc<CounterMetric>,
    pub(crate) remediation_status: Arc<CounterMetric>,
    pub(crate) compliance_state: Arc<GaugeMetric>,
}

impl ControllerMetrics {
    /// Build the four instruments. Construction never fails and has no
    /// side effect beyond allocating the empty series maps; nothing is
    /// visible to a scrape until the instruments are registered and a
    /// tuple is observed.
    pub fn new() -> Self {
        let scan_status = Arc::new(CounterMetric::new(
            METRIC_NAME_SCAN_STATUS,
            "Total number of observed status transitions of a compliance scan",
            &[LABEL_NAME, LABEL_PHASE, LABEL_RESULT],
        ));

        let scan_error = Arc::new(CounterMetric::new(
            METRIC_NAME_SCAN_ERROR,
            "Total number of scan status transitions that carried an error message",
            &[LABEL_NAME],
        ));

        let remediation_status = Arc::new(CounterMetric::new(
            METRIC_NAME_REMEDIATION_STATUS,
            "Total number of observed status transitions of a remediation",
            &[LABEL_NAME, LABEL_STATE],
        ));

        let compliance_state = Arc::new(GaugeMetric::new(
            METRIC_NAME_COMPLIANCE_STATE,
            "Compliance state of a suite. 0 when COMPLIANT, 1 when NON-COMPLIANT, \
             2 when INCONSISTENT and 3 when ERROR",
            &[LABEL_NAME],
        ));

        Self {
            scan_status,
            scan_error,
            remediation_status,
            compliance_state,
        }
    }

    /// The instruments paired with their names, in the fixed order used
    /// for registration.
    pub fn collectors(&self) -> [(&'static str, Arc<dyn Collector>); 4] {
        [
            (
                METRIC_NAME_SCAN_STATUS,
                Arc::clone(&self.scan_status) as Arc<dyn Collector>,
            ),
            (
                METRIC_NAME_SCAN_ERROR,
                Arc::clone(&self.scan_error) as Arc<dyn Collector>,
            ),
            (
                METRIC_NAME_REMEDIATION_STATUS,
                Arc::clone(&self.remediation_status) as Arc<dyn Collector>,
            ),
            (
                METRIC_NAME_COMPLIANCE_STATE,
                Arc::clone(&self.compliance_state) as Arc<dyn Collector>,
            ),
        ]
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
