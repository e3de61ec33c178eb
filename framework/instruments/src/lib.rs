mod record;
mod report;

pub use record::{CheckOutcome, OperationRecord};
pub use report::{ReportCollector, ReportConfig, Reporter};
