pub mod error;
pub mod types;

pub use error::{ConformError, Result};
pub use types::{
    ComplianceState, RemediationApplicationState, RemediationStatus, ScanPhase, ScanResult,
    ScanStatus,
};
