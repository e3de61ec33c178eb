use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use gale_runner::prelude::{
    ClientContext, GaleScenarioCli, HookResult, ReporterOpt, ScenarioDefinitionBuilder,
    UserValuesConstraint,
};

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct ClientContextValue {}

impl UserValuesConstraint for ClientContextValue {}

fn cli_cfg(duration: u64, graceful_stop: u64) -> GaleScenarioCli {
    GaleScenarioCli {
        connection_string: None,
        clients: Some(1),
        behaviour: vec![],
        duration: Some(duration),
        rate: None,
        time_unit_ms: 1000,
        pre_allocate: 50,
        max_in_flight: 2000,
        graceful_stop,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
    }
}

#[test]
fn in_flight_step_completes_within_the_graceful_stop_window() {
    static COMPLETED: AtomicUsize = AtomicUsize::new(0);

    fn behaviour(ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>) -> HookResult {
        ctx.runner_context().executor().execute_in_place(async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Ok(())
        })?;
        COMPLETED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // The step spans the end of the 1s duration and needs part of the 5s grace window to
    // finish. It must not be cancelled at the duration boundary.
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
        "in_flight_step_completes_within_the_graceful_stop_window",
        cli_cfg(1, 5),
    )
    .use_client_behaviour(behaviour);

    let start = Instant::now();
    let result = gale_runner::prelude::run(scenario);
    let elapsed = start.elapsed();

    assert!(result.is_ok());
    assert_eq!(1, COMPLETED.load(Ordering::SeqCst));
    assert!(
        elapsed >= Duration::from_millis(1400),
        "the in-flight step should have been allowed to finish, returned after {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(4),
        "the runner should return as soon as the step finishes, took {elapsed:?}"
    );
}

#[test]
fn cancels_in_flight_steps_at_the_end_of_the_window() {
    fn behaviour(ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>) -> HookResult {
        ctx.runner_context().executor().execute_in_place(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
    }

    let start = Instant::now();
    let result = gale_runner::prelude::run(
        ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
            "cancels_in_flight_steps_at_the_end_of_the_window",
            cli_cfg(1, 1),
        )
        .use_client_behaviour(behaviour),
    );
    let elapsed = start.elapsed();

    // Cancellation counts as a clean stop, not a bail.
    assert_eq!(1, result.unwrap());
    assert!(
        elapsed >= Duration::from_millis(1900),
        "the step should have had the full grace window, returned after {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(5),
        "the step should have been cancelled when the window ended, took {elapsed:?}"
    );
}

#[test]
fn a_stuck_behaviour_does_not_hold_the_runner_past_the_window() {
    fn behaviour(_ctx: &mut ClientContext<RunnerContextValue, ClientContextValue>) -> HookResult {
        // Not cancellable, the runner has to abandon this client.
        std::thread::sleep(Duration::from_secs(30));
        Ok(())
    }

    let start = Instant::now();
    let result = gale_runner::prelude::run(
        ScenarioDefinitionBuilder::<RunnerContextValue, ClientContextValue>::new(
            "a_stuck_behaviour_does_not_hold_the_runner_past_the_window",
            cli_cfg(1, 1),
        )
        .use_client_behaviour(behaviour),
    );
    let elapsed = start.elapsed();

    assert_eq!(0, result.unwrap());
    assert!(
        elapsed < Duration::from_secs(5),
        "the runner should abandon stuck clients after the grace window, took {elapsed:?}"
    );
}
