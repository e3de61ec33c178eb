use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;

use crate::cli::{GaleScenarioCli, ReporterOpt};
use crate::context::{ClientContext, RunnerContext, UserValuesConstraint};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type ClientHookMut<RV, V> = fn(&mut ClientContext<RV, V>) -> HookResult;

/// How the runner schedules scenario executions, resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// A fixed pool of virtual clients, each looping its behaviour for the whole run.
    ConstantConcurrency { clients: usize },
    /// Start `rate` new scenario executions per `time_unit`, independent of prior executions'
    /// completion, using a pool of execution slots that starts at `pre_allocate` and may grow
    /// to `max_in_flight`.
    ConstantArrivalRate {
        rate: u32,
        time_unit: Duration,
        pre_allocate: usize,
        max_in_flight: usize,
    },
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: GaleScenarioCli,
    /// Fallback run duration in seconds, used when the command line does not set one.
    default_duration_s: Option<u64>,
    /// Global setup hook for this scenario. It will be run once, before any virtual clients
    /// are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual client, run once per execution slot as it starts.
    setup_client_fn: Option<ClientHookMut<RV, V>>,
    /// The client behaviours for this scenario. Register a single behaviour with
    /// [ScenarioDefinitionBuilder::use_client_behaviour], or several named ones with
    /// [ScenarioDefinitionBuilder::use_named_client_behaviour] and assign them on the command
    /// line.
    client_behaviour: HashMap<String, ClientHookMut<RV, V>>,
    /// Teardown hook for a virtual client, run as its execution slot shuts down. Best effort.
    teardown_client_fn: Option<ClientHookMut<RV, V>>,
    /// Global teardown hook, run once after all virtual clients have stopped. Best effort.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub name: String,
    pub run_id: String,
    pub connection_string: Option<String>,
    pub duration_s: Option<u64>,
    pub no_progress: bool,
    pub reporter: ReporterOpt,
    pub policy: SchedulingPolicy,
    pub graceful_stop: Duration,
    /// One behaviour name per virtual client, only for the constant-concurrency policy.
    pub assigned_behaviours: Vec<String>,
    pub setup_fn: Option<GlobalHookMut<RV>>,
    pub setup_client_fn: Option<ClientHookMut<RV, V>>,
    pub client_behaviour: HashMap<String, ClientHookMut<RV, V>>,
    pub teardown_client_fn: Option<ClientHookMut<RV, V>>,
    pub teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) const DEFAULT_BEHAVIOUR_NAME: &str = "default";

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: GaleScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_duration_s: None,
            setup_fn: None,
            setup_client_fn: None,
            client_behaviour: HashMap::new(),
            teardown_client_fn: None,
            teardown_fn: None,
        }
    }

    /// Like [ScenarioDefinitionBuilder::new] but initialises logging and parses the command
    /// line itself. Use this in a scenario's `main`.
    pub fn new_with_init(name: &str) -> Self {
        let cli = crate::init::init();
        Self::new(name, cli)
    }

    /// Set the duration in seconds to use when none is given on the command line.
    pub fn with_default_duration_s(mut self, duration_s: u64) -> Self {
        self.default_duration_s = Some(duration_s);
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the client setup hook [ScenarioDefinitionBuilder::setup_client_fn] for this scenario.
    pub fn use_client_setup(mut self, setup_client_fn: ClientHookMut<RV, V>) -> Self {
        self.setup_client_fn = Some(setup_client_fn);
        self
    }

    /// Set the default client behaviour for this scenario.
    pub fn use_client_behaviour(self, behaviour: ClientHookMut<RV, V>) -> Self {
        self.use_named_client_behaviour(DEFAULT_BEHAVIOUR_NAME, behaviour)
    }

    /// Set a named client behaviour for this scenario.
    pub fn use_named_client_behaviour(
        mut self,
        name: &str,
        behaviour: ClientHookMut<RV, V>,
    ) -> Self {
        let previous = self.client_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            panic!("Behaviour [{}] is already defined", name);
        }

        self
    }

    /// Set the client teardown hook [ScenarioDefinitionBuilder::teardown_client_fn].
    pub fn use_client_teardown(mut self, teardown_client_fn: ClientHookMut<RV, V>) -> Self {
        self.teardown_client_fn = Some(teardown_client_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn].
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let cli = self.cli;

        let duration_s = if cli.soak {
            log::info!("Running as a soak test, ignoring any configured duration");
            None
        } else {
            cli.duration.or(self.default_duration_s)
        };

        let policy = resolve_policy(&cli, &self.client_behaviour)?;

        let assigned_behaviours = match &policy {
            SchedulingPolicy::ConstantConcurrency { clients } => {
                assign_behaviours(*clients, &cli.behaviour, &self.client_behaviour)?
            }
            SchedulingPolicy::ConstantArrivalRate { .. } => Vec::new(),
        };

        Ok(ScenarioDefinition {
            name: self.name,
            run_id: cli.run_id.unwrap_or_else(|| nanoid::nanoid!()),
            connection_string: cli.connection_string,
            duration_s,
            no_progress: cli.no_progress,
            reporter: cli.reporter,
            policy,
            graceful_stop: Duration::from_secs(cli.graceful_stop),
            assigned_behaviours,
            setup_fn: self.setup_fn,
            setup_client_fn: self.setup_client_fn,
            client_behaviour: self.client_behaviour,
            teardown_client_fn: self.teardown_client_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

fn resolve_policy<RV: UserValuesConstraint, V: UserValuesConstraint>(
    cli: &GaleScenarioCli,
    client_behaviour: &HashMap<String, ClientHookMut<RV, V>>,
) -> anyhow::Result<SchedulingPolicy> {
    match cli.rate {
        Some(rate) => {
            if rate == 0 {
                bail!("The arrival rate must be at least 1 per time unit");
            }
            if cli.time_unit_ms == 0 {
                bail!("The arrival-rate time unit must be at least 1ms");
            }
            if cli.pre_allocate == 0 || cli.pre_allocate > cli.max_in_flight {
                bail!(
                    "The pre-allocated slot count must be between 1 and the in-flight maximum ({})",
                    cli.max_in_flight
                );
            }
            if !cli.behaviour.is_empty() {
                bail!("Named behaviour assignment is only supported under the constant-concurrency policy");
            }
            if !client_behaviour.contains_key(DEFAULT_BEHAVIOUR_NAME) {
                bail!("The arrival-rate policy requires a default behaviour");
            }

            Ok(SchedulingPolicy::ConstantArrivalRate {
                rate,
                time_unit: Duration::from_millis(cli.time_unit_ms),
                pre_allocate: cli.pre_allocate,
                max_in_flight: cli.max_in_flight,
            })
        }
        None => {
            let assigned = cli.behaviour.iter().map(|(_, count)| count).sum::<usize>();
            let clients = cli.clients.unwrap_or_else(|| assigned.max(1));
            Ok(SchedulingPolicy::ConstantConcurrency { clients })
        }
    }
}

fn assign_behaviours<RV: UserValuesConstraint, V: UserValuesConstraint>(
    clients: usize,
    requested: &[(String, usize)],
    client_behaviour: &HashMap<String, ClientHookMut<RV, V>>,
) -> anyhow::Result<Vec<String>> {
    let mut assigned = Vec::with_capacity(clients);
    for (name, count) in requested {
        if !client_behaviour.contains_key(name) {
            bail!("Behaviour [{}] is not defined for this scenario", name);
        }
        assigned.extend(std::iter::repeat(name.clone()).take(*count));
    }

    if assigned.len() > clients {
        bail!(
            "{} clients have been assigned behaviours but only {} clients are configured",
            assigned.len(),
            clients
        );
    }

    // A scenario with no behaviours at all is valid, its clients only run setup and teardown.
    if assigned.len() < clients
        && !client_behaviour.is_empty()
        && !client_behaviour.contains_key(DEFAULT_BEHAVIOUR_NAME)
    {
        bail!("Not all clients have an assigned behaviour and no default behaviour is defined");
    }

    assigned.resize(clients, DEFAULT_BEHAVIOUR_NAME.to_string());

    Ok(assigned)
}
