mod in_memory_reporter;
mod influx_reporter;

use std::fmt;

use gale_core::prelude::DelegatedShutdownListener;

use crate::record::{CheckOutcome, OperationRecord};
use in_memory_reporter::InMemoryReporter;
use influx_reporter::InfluxReporter;

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn add_check(&mut self, check: &CheckOutcome);

    fn finalize(&self);
}

/// Configuration for the reporting pipeline of one run.
///
/// Enable one or more collectors and then call [ReportConfig::init_reporter] to get the
/// [Reporter] that the run will record into. Enabling nothing is valid and gives a reporter
/// that discards everything.
pub struct ReportConfig {
    scenario_name: String,
    run_id: String,
    in_memory: bool,
    influx: bool,
}

impl ReportConfig {
    pub fn new(scenario_name: String, run_id: String) -> Self {
        Self {
            scenario_name,
            run_id,
            in_memory: false,
            influx: false,
        }
    }

    /// Keep all records in memory and print summary tables when the run finishes.
    pub fn enable_in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Stream records to InfluxDB. Requires the `INFLUX_HOST`, `INFLUX_BUCKET` and
    /// `INFLUX_TOKEN` environment variables.
    pub fn enable_influx(mut self) -> Self {
        self.influx = true;
        self
    }

    pub fn init_reporter(
        self,
        runtime: &tokio::runtime::Handle,
        shutdown_listener: DelegatedShutdownListener,
    ) -> anyhow::Result<Reporter> {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();

        if self.in_memory {
            collectors.push(Box::new(InMemoryReporter::new()));
        }

        if self.influx {
            collectors.push(Box::new(InfluxReporter::new(
                runtime,
                shutdown_listener,
                self.scenario_name.clone(),
                self.run_id.clone(),
            )?));
        }

        Ok(Reporter {
            collectors: parking_lot::Mutex::new(collectors),
        })
    }
}

/// Fans operation records and check outcomes out to every enabled collector.
///
/// Safe to share across all virtual clients; recording takes a short lock and never blocks on
/// network I/O.
pub struct Reporter {
    collectors: parking_lot::Mutex<Vec<Box<dyn ReportCollector + Send>>>,
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        let mut collectors = self.collectors.lock();
        for collector in collectors.iter_mut() {
            collector.add_operation(operation_record);
        }
    }

    pub fn add_check(&self, check: &CheckOutcome) {
        let mut collectors = self.collectors.lock();
        for collector in collectors.iter_mut() {
            collector.add_check(check);
        }
    }

    pub fn finalize(&self) {
        let collectors = self.collectors.lock();
        for collector in collectors.iter() {
            collector.finalize();
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.lock().len())
            .finish()
    }
}
