use std::sync::Arc;

use gale_runner::prelude::{
    ClientBailError, ClientContext, GaleScenarioCli, HookResult, ReporterOpt, RunnerContext,
    ScenarioDefinitionBuilder, UserValuesConstraint,
};

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct ClientContextValue {
    value: i32,
}

impl UserValuesConstraint for ClientContextValue {}

fn sample_cli_cfg() -> GaleScenarioCli {
    GaleScenarioCli {
        connection_string: None,
        clients: None,
        behaviour: vec![],
        duration: None,
        rate: None,
        time_unit_ms: 1000,
        pre_allocate: 50,
        max_in_flight: 2000,
        graceful_stop: 5,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
    }
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_cx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "propagate_error_in_setup_hook",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_setup(setup);

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
}

#[test]
fn capture_error_in_client_setup() {
    fn client_setup(
        _ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>,
    ) -> HookResult {
        Err(anyhow::anyhow!("Error in client setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "capture_error_in_client_setup",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_client_setup(client_setup);

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_ok());
    assert_eq!(0, result.unwrap());
}

#[test]
fn capture_error_in_client_behaviour_and_continue() {
    fn client_behaviour(
        ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>,
    ) -> HookResult {
        if ctx.get().value < 5 {
            ctx.get_mut().value += 1;
        } else {
            // Save time running this test by shutting down once this has run a few times.
            ctx.runner_context().force_stop_scenario();
        }

        Err(anyhow::anyhow!("Error in client behaviour hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "capture_error_in_client_behaviour_and_continue",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_client_behaviour(client_behaviour);

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_ok());
}

#[test]
fn bail_error_stops_client_behaviour() {
    fn client_behaviour_1(
        _ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>,
    ) -> HookResult {
        Err(ClientBailError::default().into())
    }

    fn client_behaviour_2(
        _ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>,
    ) -> HookResult {
        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.clients = Some(2);
    cfg.behaviour = vec![("bail".to_string(), 1), ("continue".to_string(), 1)];
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "bail_error_stops_client_behaviour",
        cfg,
    )
    .with_default_duration_s(1)
    .use_named_client_behaviour("bail", client_behaviour_1)
    .use_named_client_behaviour("continue", client_behaviour_2);

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_ok());
    assert_eq!(1, result.unwrap());
}

#[test]
fn reject_unknown_behaviour_assignment() {
    let mut cfg = sample_cli_cfg();
    cfg.clients = Some(1);
    cfg.behaviour = vec![("missing".to_string(), 1)];
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "reject_unknown_behaviour_assignment",
        cfg,
    )
    .with_default_duration_s(1)
    .use_client_behaviour(|_ctx| Ok(()));

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_err());
}

#[test]
fn capture_error_in_client_teardown() {
    fn client_teardown(
        _ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>,
    ) -> HookResult {
        Err(anyhow::anyhow!("Error in client teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "capture_error_in_client_teardown",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_client_teardown(client_teardown);

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "capture_error_in_teardown",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_teardown(teardown);

    let result = gale_runner::prelude::run(scenario);

    assert!(result.is_ok());
}
