pub mod cli;
mod common;
mod config;
mod context;
mod selector;

pub mod prelude {
    /// Common operations for pointcloud load scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::cli::{init_cli, PointcloudScenarioCli};
    pub use crate::config::{EndpointGroup, LoadConfig, Position, ScenarioWeights};
    pub use crate::context::{PointcloudClientContext, PointcloudRunnerContext};
    pub use crate::selector::{derive_user_id, select_geohash, select_group, select_upload};

    /// Re-export of the `gale_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your
    /// scenarios.
    pub use gale_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use pointcloud_client_instrumented::prelude::*;
}
