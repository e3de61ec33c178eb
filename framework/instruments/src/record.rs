use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timing record for a single request step.
///
/// One record is created per issued request, whatever its outcome, so that latency and error
/// rate can be aggregated per step label downstream.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    pub started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
    pub attr: HashMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attr.insert(name.into(), value.into());
        self
    }

    /// Stop the clock for this operation. Must be called exactly once, before the record is
    /// handed to a reporter.
    pub fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }

    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// A named boolean result recorded against one scenario step.
///
/// Immutable once recorded. Checks are observations and recording a failed check does not by
/// itself stop anything.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
}

impl CheckOutcome {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}
