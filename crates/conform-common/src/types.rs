use std::fmt;

/// Phase of a compliance scan as reported in its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Pending,
    Launching,
    Running,
    Aggregating,
    Done,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Pending => "PENDING",
            Self::Launching => "LAUNCHING",
            Self::Running => "RUNNING",
            Self::Aggregating => "AGGREGATING",
            Self::Done => "DONE",
        };
        f.write_str(value)
    }
}

/// Overall result of a compliance scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    NotAvailable,
    Compliant,
    NonCompliant,
    Inconsistent,
    Error,
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::NotAvailable => "NOT-AVAILABLE",
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON-COMPLIANT",
            Self::Inconsistent => "INCONSISTENT",
            Self::Error => "ERROR",
        };
        f.write_str(value)
    }
}

/// Observed status of a scan resource. Fields are passed verbatim to
/// the metrics subsystem whenever a transition is observed.
#[derive(Debug, Clone)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub result: ScanResult,
    pub error_message: String,
}

impl ScanStatus {
    pub fn new(phase: ScanPhase, result: ScanResult) -> Self {
        Self {
            phase,
            result,
            error_message: String::new(),
        }
    }

    pub fn with_error(phase: ScanPhase, result: ScanResult, message: impl Into<String>) -> Self {
        Self {
            phase,
            result,
            error_message: message.into(),
        }
    }
}

/// How far a remediation has been applied to the target nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationApplicationState {
    NotApplied,
    Applied,
    Outdated,
    Error,
}

impl fmt::Display for RemediationApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::NotApplied => "NotApplied",
            Self::Applied => "Applied",
            Self::Outdated => "Outdated",
            Self::Error => "Error",
        };
        f.write_str(value)
    }
}

/// Observed status of a remediation resource.
#[derive(Debug, Clone)]
pub struct RemediationStatus {
    pub application_state: RemediationApplicationState,
}

impl RemediationStatus {
    pub fn new(application_state: RemediationApplicationState) -> Self {
        Self { application_state }
    }
}

/// Aggregate compliance classification of a suite. The gauge value for
/// a suite is always the ordinal of the last state set for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceState {
    Compliant,
    NonCompliant,
    Inconsistent,
    Error,
}

impl ComplianceState {
    pub fn ordinal(self) -> i64 {
        match self {
            Self::Compliant => 0,
            Self::NonCompliant => 1,
            Self::Inconsistent => 2,
            Self::Error => 3,
        }
    }
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON-COMPLIANT",
            Self::Inconsistent => "INCONSISTENT",
            Self::Error => "ERROR",
        };
        f.write_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliance_state_ordinals_are_fixed() {
        assert_eq!(ComplianceState::Compliant.ordinal(), 0);
        assert_eq!(ComplianceState::NonCompliant.ordinal(), 1);
        assert_eq!(ComplianceState::Inconsistent.ordinal(), 2);
        assert_eq!(ComplianceState::Error.ordinal(), 3);
    }

    #[test]
    fn scan_result_wire_forms() {
        assert_eq!(ScanResult::NotAvailable.to_string(), "NOT-AVAILABLE");
        assert_eq!(ScanResult::NonCompliant.to_string(), "NON-COMPLIANT");
        assert_eq!(ScanPhase::Aggregating.to_string(), "AGGREGATING");
    }
}
