use clap::{Parser, ValueEnum};

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep all records in memory and print summary tables at the end of the run.
    InMemory,
    /// Stream records to InfluxDB, configured through `INFLUX_HOST`, `INFLUX_BUCKET` and
    /// `INFLUX_TOKEN`.
    Influx,
    /// Discard all records.
    Noop,
}

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct GaleScenarioCli {
    /// An opaque connection/configuration string interpreted by the scenario, for example the
    /// path to its configuration file.
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// The number of virtual clients to run under the constant-concurrency policy.
    #[clap(long)]
    pub clients: Option<usize>,

    /// Assign a behaviour to a number of virtual clients. Specify the behaviour and the number
    /// of clients to assign it to in the format `behaviour:count`, for example `--behaviour=fetch:5`.
    ///
    /// Specifying the count is optional and defaults to 1. The flag can be used multiple times
    /// to assign several behaviours. The total assigned must not exceed the number of clients
    /// for this scenario; any remaining clients are assigned the default behaviour.
    ///
    /// Only available under the constant-concurrency policy.
    #[clap(long, short, value_parser = parse_client_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// The number of seconds to run the scenario for.
    #[clap(long)]
    pub duration: Option<u64>,

    /// Switch to the constant-arrival-rate policy: start this many scenario executions per time
    /// unit, independent of prior executions' completion.
    #[clap(long)]
    pub rate: Option<u32>,

    /// The length of the arrival-rate time unit, in milliseconds.
    #[clap(long, default_value = "1000")]
    pub time_unit_ms: u64,

    /// The number of execution slots to create up front under the arrival-rate policy.
    #[clap(long, default_value = "50")]
    pub pre_allocate: usize,

    /// The maximum number of concurrently in-flight executions under the arrival-rate policy.
    /// An iteration that would exceed it is dropped and counted, not queued.
    #[clap(long, default_value = "2000")]
    pub max_in_flight: usize,

    /// How many seconds to wait for in-flight executions to finish once the run is over.
    #[clap(long, default_value = "5")]
    pub graceful_stop: u64,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run
    /// until stopped.
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at
    /// by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Set the ID of this run.
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,
}

pub fn parse_client_behaviour(s: &str) -> anyhow::Result<(String, usize)> {
    let mut parts = s.split(':');
    let name = parts
        .next()
        .map(|s| s.to_string())
        .ok_or(anyhow::anyhow!("No name specified for behaviour"))?;

    let count = parts.next().and_then(|s| s.parse::<usize>().ok()).unwrap_or(1);

    Ok((name, count))
}
