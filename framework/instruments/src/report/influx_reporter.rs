use std::time::SystemTime;

use anyhow::Context;
use influxdb::{Client, InfluxDbWriteable, Timestamp, WriteQuery};
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::mpsc::UnboundedSender;

use gale_core::prelude::DelegatedShutdownListener;

use crate::record::{CheckOutcome, OperationRecord};
use crate::report::ReportCollector;

/// Streams operation and check records to InfluxDB.
///
/// Records are queued onto a background write task so that recording never blocks a virtual
/// client on network I/O. On shutdown the task drains whatever is still queued before exiting.
pub struct InfluxReporter {
    scenario_name: String,
    run_id: String,
    writer: UnboundedSender<WriteQuery>,
}

impl InfluxReporter {
    pub fn new(
        runtime: &Handle,
        shutdown_listener: DelegatedShutdownListener,
        scenario_name: String,
        run_id: String,
    ) -> anyhow::Result<Self> {
        let client = Client::new(
            std::env::var("INFLUX_HOST").context(
                "Cannot configure the Influx reporter without environment variable `INFLUX_HOST`",
            )?,
            std::env::var("INFLUX_BUCKET").context(
                "Cannot configure the Influx reporter without environment variable `INFLUX_BUCKET`",
            )?,
        )
        .with_token(std::env::var("INFLUX_TOKEN").context(
            "Cannot configure the Influx reporter without environment variable `INFLUX_TOKEN`",
        )?);

        let writer = start_write_task(runtime, shutdown_listener, client);

        Ok(Self {
            scenario_name,
            run_id,
            writer,
        })
    }

    fn timestamp() -> Timestamp {
        Timestamp::Nanoseconds(
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .expect("SystemTime before UNIX_EPOCH")
                .as_nanos(),
        )
    }

    fn try_send(&self, query: WriteQuery) {
        if let Err(e) = self.writer.send(query) {
            // The write task has already shut down, which can happen for records produced
            // during the graceful stop window.
            log::warn!("Failed to queue record for InfluxDB: {e}");
        }
    }
}

impl ReportCollector for InfluxReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        let mut query = Self::timestamp()
            .into_query("gale.operation_duration")
            .add_field(
                "value",
                operation_record
                    .elapsed
                    .expect("OperationRecord must have an elapsed time")
                    .as_micros() as f64
                    / 1000.0,
            )
            .add_tag("operation_id", operation_record.operation_id.to_string())
            .add_tag("is_error", operation_record.is_error.to_string())
            .add_tag("scenario", self.scenario_name.to_string())
            .add_tag("run_id", self.run_id.to_string());

        for (k, v) in &operation_record.attr {
            query = query.add_tag(k.as_str(), v.to_string());
        }

        self.try_send(query);
    }

    fn add_check(&mut self, check: &CheckOutcome) {
        let query = Self::timestamp()
            .into_query("gale.check")
            .add_field("passed", check.passed)
            .add_tag("name", check.name.to_string())
            .add_tag("scenario", self.scenario_name.to_string())
            .add_tag("run_id", self.run_id.to_string());

        self.try_send(query);
    }

    fn finalize(&self) {
        // Nothing to do, the write task drains on shutdown.
    }
}

fn start_write_task(
    runtime: &Handle,
    mut shutdown_listener: DelegatedShutdownListener,
    client: Client,
) -> UnboundedSender<WriteQuery> {
    let (writer, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    runtime.spawn(async move {
        loop {
            select! {
                _ = shutdown_listener.wait_for_shutdown() => {
                    log::debug!("Shutting down the Influx reporter");
                    break;
                }
                query = receiver.recv() => {
                    if let Some(query) = query {
                        if let Err(e) = client.query(query).await {
                            log::warn!("Failed to send record to InfluxDB: {e}");
                        }
                    } else {
                        break;
                    }
                }
            }
        }

        log::trace!("Draining any remaining records before shutting down...");
        let mut drain_count = 0;

        while let Ok(query) = receiver.try_recv() {
            if let Err(e) = client.query(query).await {
                log::warn!("Failed to send record to InfluxDB: {e}");
            }
            drain_count += 1;
        }

        log::debug!("Drained {drain_count} remaining records");
    });
    writer
}
