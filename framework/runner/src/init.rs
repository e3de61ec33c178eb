use clap::Parser;

use crate::cli::GaleScenarioCli;

/// Initialise logging and parse the command line for a Gale scenario.
pub fn init() -> GaleScenarioCli {
    env_logger::init();

    GaleScenarioCli::parse()
}
