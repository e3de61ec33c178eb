use std::{fmt::Debug, sync::Arc};

use gale_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use gale_instruments::Reporter;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// State shared by the whole run: the executor, the reporter, the stop signal and whatever
/// run-wide values the scenario's setup hook produces.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: Option<String>,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: Option<String>,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// The opaque connection string passed on the command line, if any. The scenario decides
    /// what it means.
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// End the run early, as though the configured duration had elapsed.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// Per-virtual-client state: the client's identity, a shutdown listener scoped to it, and the
/// scenario's own per-client values.
pub struct ClientContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    client_index: usize,
    client_name: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ClientContext<RV, V> {
    pub(crate) fn new(
        client_index: usize,
        client_name: String,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            client_index,
            client_name,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// The 0-based index of this virtual client. Stable for the lifetime of an execution slot,
    /// so scenarios can derive deterministic per-client parameters from it.
    pub fn client_index(&self) -> usize {
        self.client_index
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
