use bytes::Bytes;
use gale_runner::prelude::UserValuesConstraint;
use pointcloud_client_instrumented::prelude::PointcloudClient;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::LoadConfig;

/// Run-wide values shared by every virtual client, filled in during scenario setup.
#[derive(Debug, Default)]
pub struct PointcloudRunnerContext {
    config: LoadConfig,
    payload: Bytes,
}

impl UserValuesConstraint for PointcloudRunnerContext {}

impl PointcloudRunnerContext {
    pub fn configure(&mut self, config: LoadConfig, payload: Bytes) {
        self.config = config;
        self.payload = payload;
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Cheap to hand out, [Bytes] clones share the underlying buffer.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }
}

/// Per-client values: the instrumented HTTP client and this client's own RNG.
#[derive(Debug, Default)]
pub struct PointcloudClientContext {
    client: Option<PointcloudClient>,
    rng: Option<SmallRng>,
}

impl UserValuesConstraint for PointcloudClientContext {}

impl PointcloudClientContext {
    pub fn set_client(&mut self, client: PointcloudClient) {
        self.client = Some(client);
    }

    pub fn client(&self) -> anyhow::Result<PointcloudClient> {
        self.client
            .clone()
            .ok_or_else(|| anyhow::anyhow!("The client is not connected, call connect_client in client setup"))
    }

    /// Lazily seeded so that clients which never draw pay nothing.
    pub fn rng(&mut self) -> &mut SmallRng {
        self.rng.get_or_insert_with(SmallRng::from_entropy)
    }
}
