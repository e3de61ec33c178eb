use std::path::PathBuf;

use clap::Parser;
use gale_runner::parse_client_behaviour;
use gale_runner::prelude::{GaleScenarioCli, ReporterOpt};

/// CLI for pointcloud load scenarios. The generic runner flags are mirrored here so that every
/// scenario binary presents one coherent command line, with the configuration file as a first
/// class flag instead of an opaque connection string.
#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct PointcloudScenarioCli {
    /// Path to the TOML load configuration for this run.
    #[clap(long)]
    pub config: PathBuf,

    /// The number of virtual clients to run under the constant-concurrency policy.
    #[clap(long)]
    pub clients: Option<usize>,

    /// Assign a behaviour to a number of virtual clients, in the format `behaviour:count`.
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

impl From<PointcloudScenarioCli> for GaleScenarioCli {
    fn from(cli: PointcloudScenarioCli) -> Self {
        GaleScenarioCli {
            connection_string: Some(cli.config.display().to_string()),
            clients: cli.clients,
            behaviour: cli.behaviour,
            duration: cli.duration,
            rate: cli.rate,
            time_unit_ms: cli.time_unit_ms,
            pre_allocate: cli.pre_allocate,
            max_in_flight: cli.max_in_flight,
            graceful_stop: cli.graceful_stop,
            soak: cli.soak,
            no_progress: cli.no_progress,
            reporter: cli.reporter,
            run_id: cli.run_id,
        }
    }
}

/// Initialise logging and parse the scenario command line. Call this first in every scenario
/// binary's main.
pub fn init_cli() -> GaleScenarioCli {
    env_logger::init();
    PointcloudScenarioCli::parse().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_the_config_path_to_the_connection_string() {
        let cli = PointcloudScenarioCli::parse_from([
            "pointcloud_upload",
            "--config",
            "./load.toml",
            "--clients",
            "4",
        ]);

        let generic: GaleScenarioCli = cli.into();
        assert_eq!(Some("./load.toml"), generic.connection_string.as_deref());
        assert_eq!(Some(4), generic.clients);
    }

    #[test]
    fn the_config_flag_is_required() {
        assert!(PointcloudScenarioCli::try_parse_from(["pointcloud_upload"]).is_err());
    }
}
