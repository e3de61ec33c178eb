use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use gale_instruments::ReportConfig;

use crate::cli::ReporterOpt;
use crate::concurrency::run_clients;
use crate::context::{RunnerContext, UserValuesConstraint};
use crate::definition::{ScenarioDefinitionBuilder, SchedulingPolicy};
use crate::executor::Executor;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// Run a scenario to completion.
///
/// Returns the number of virtual clients that completed without bailing under the
/// constant-concurrency policy, or the number of scenario executions started under the
/// constant-arrival-rate policy.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<usize> {
    let definition = definition.build()?;

    log::info!(
        "Running scenario {} with run ID {}",
        definition.name,
        definition.run_id
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;

    // Stopping is two-phase. The stop signal only ends admission of new executions; the cancel
    // signal, fired once the graceful stop window has elapsed, cuts in-flight work loose.
    {
        let shutdown_handle = shutdown_handle.clone();
        let graceful_stop = definition.graceful_stop;
        runtime.spawn(async move {
            let mut stop_listener = shutdown_handle.new_listener();
            stop_listener.wait_for_shutdown().await;
            tokio::time::sleep(graceful_stop).await;
            shutdown_handle.cancel();
        });
    }

    let report_config = ReportConfig::new(definition.name.clone(), definition.run_id.clone());
    let report_config = match definition.reporter {
        ReporterOpt::InMemory => report_config.enable_in_memory(),
        ReporterOpt::Influx => report_config.enable_influx(),
        ReporterOpt::Noop => report_config,
    };
    // The reporter listens for the cancel signal so that it keeps streaming records produced
    // during the graceful stop window before draining.
    let reporter = Arc::new(
        report_config.init_reporter(runtime.handle(), shutdown_handle.new_cancel_listener())?,
    );

    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        shutdown_handle.clone(),
        definition.connection_string.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    // After the setup has run, and if this is a time bounded scenario, then we need to take
    // additional actions
    if let Some(duration) = definition.duration_s {
        if !definition.no_progress {
            // If the scenario is time bounded then start the progress monitor to show the user
            // how long is left
            start_progress(
                Duration::from_secs(duration),
                shutdown_handle.new_listener(),
            );
        }

        // Set a timer to stop admitting new executions once the duration has elapsed
        let shutdown_handle = shutdown_handle.clone();
        runner_context.executor().spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_secs(duration)).await;
            shutdown_handle.shutdown();
        });
    }

    let runner_context = Arc::new(runner_context);
    let runner_context_for_teardown = runner_context.clone();

    // Ready to start spawning virtual clients, so start the resource monitor to report high
    // usage by the load generator itself which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener());

    let outcome = match definition.policy {
        SchedulingPolicy::ConstantConcurrency { .. } => {
            run_clients(&definition, runner_context, &shutdown_handle)?
        }
        SchedulingPolicy::ConstantArrivalRate {
            rate,
            time_unit,
            pre_allocate,
            max_in_flight,
        } => crate::arrival::run_arrivals(
            &definition,
            runner_context,
            &shutdown_handle,
            rate,
            time_unit,
            pre_allocate,
            max_in_flight,
        )?,
    };

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context_for_teardown.clone()) {
            log::error!("Teardown failed: {e:?}");
        }
    }

    // Make sure background tasks stop even when the run ended without the duration timer, for
    // example because every client bailed. Nothing is in flight anymore, so cancelling
    // outright is safe.
    shutdown_handle.cancel();

    runner_context_for_teardown.reporter().finalize();

    Ok(outcome)
}
