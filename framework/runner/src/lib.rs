mod arrival;
mod cli;
mod concurrency;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod types;

pub use cli::parse_client_behaviour;

pub mod prelude {
    pub use crate::cli::{GaleScenarioCli, ReporterOpt};
    pub use crate::context::{ClientContext, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder, SchedulingPolicy};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::types::GaleResult;

    pub use gale_core::prelude::{
        ClientBailError, DelegatedShutdownListener, ShutdownSignalError,
    };
    pub use gale_instruments::{CheckOutcome, OperationRecord, Reporter};
}
