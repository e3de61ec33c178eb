use std::collections::HashMap;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::record::{CheckOutcome, OperationRecord};
use crate::report::ReportCollector;

/// Keeps every record in memory and prints summary tables when the run finishes.
///
/// This is the default reporter and is what you want while developing a scenario. For long,
/// high-rate runs prefer the Influx reporter so that memory use stays flat.
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
    check_outcomes: Vec<CheckOutcome>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self {
            operation_records: Vec::new(),
            check_outcomes: Vec::new(),
        }
    }

    fn print_summary_of_operations(&self) {
        if self.operation_records.is_empty() {
            return;
        }

        println!("\nSummary of operations");
        let mut by_operation: HashMap<String, Vec<&OperationRecord>> = HashMap::new();
        for record in &self.operation_records {
            by_operation
                .entry(record.operation_id.clone())
                .or_default()
                .push(record);
        }

        let mut rows = by_operation
            .into_iter()
            .map(|(operation_id, operations)| {
                let total_operations = operations.len();
                let errors = operations.iter().filter(|op| op.is_error).count();
                let durations = operations
                    .iter()
                    .filter_map(|op| op.duration())
                    .collect::<Vec<_>>();
                let total_duration_micros =
                    durations.iter().map(|d| d.as_micros()).sum::<u128>();

                OperationRow {
                    operation_id,
                    total_operations,
                    errors,
                    avg_time_ms: if durations.is_empty() {
                        0.0
                    } else {
                        (total_duration_micros as f64 / durations.len() as f64) / 1000.0
                    },
                    min_time_ms: durations
                        .iter()
                        .min()
                        .map(|d| d.as_micros() as f64 / 1000.0)
                        .unwrap_or(0.0),
                    max_time_ms: durations
                        .iter()
                        .max()
                        .map(|d| d.as_micros() as f64 / 1000.0)
                        .unwrap_or(0.0),
                }
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));

        let mut table = Table::new(&rows);
        table.with(Style::modern());

        println!("{table}");
    }

    fn print_summary_of_checks(&self) {
        if self.check_outcomes.is_empty() {
            return;
        }

        println!("\nSummary of checks");
        let mut by_name: HashMap<String, (usize, usize)> = HashMap::new();
        for check in &self.check_outcomes {
            let entry = by_name.entry(check.name.clone()).or_default();
            if check.passed {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }

        let mut rows = by_name
            .into_iter()
            .map(|(name, (passes, failures))| CheckRow {
                pass_rate: format!(
                    "{:.1}%",
                    100.0 * passes as f64 / (passes + failures) as f64
                ),
                name,
                passes,
                failures,
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let mut table = Table::new(&rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn add_check(&mut self, check: &CheckOutcome) {
        self.check_outcomes.push(check.clone());
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
        self.print_summary_of_checks();
    }
}

#[derive(Tabled)]
struct OperationRow {
    operation_id: String,
    total_operations: usize,
    errors: usize,
    avg_time_ms: f64,
    min_time_ms: f64,
    max_time_ms: f64,
}

#[derive(Tabled)]
struct CheckRow {
    name: String,
    passes: usize,
    failures: usize,
    pass_rate: String,
}
