use std::sync::Arc;
use std::time::{Duration, Instant};

use gale_core::prelude::{ClientBailError, ShutdownHandle, ShutdownSignalError};

use crate::context::{ClientContext, RunnerContext, UserValuesConstraint};
use crate::definition::ScenarioDefinition;

/// Drive the constant-concurrency policy: one thread per virtual client, each looping its
/// behaviour until the stop signal.
///
/// Returns the number of clients that ran to the end of the test without bailing.
pub(crate) fn run_clients<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: &ScenarioDefinition<RV, V>,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_handle: &ShutdownHandle,
) -> anyhow::Result<usize> {
    let mut handles = Vec::new();
    for (client_index, assigned_behaviour) in definition.assigned_behaviours.iter().enumerate() {
        // Read access to the runner context for each virtual client
        let runner_context = runner_context.clone();

        let setup_client_fn = definition.setup_client_fn;
        let behaviour_fn = definition.client_behaviour.get(assigned_behaviour).cloned();
        let teardown_client_fn = definition.teardown_client_fn;

        // For us to check if the client should shut down between behaviour cycles
        let mut cycle_shutdown_receiver = shutdown_handle.new_listener();
        // For the behaviour implementation to listen for shutdown and respond appropriately
        let delegated_shutdown_listener = shutdown_handle.new_listener();

        let client_name = format!("client-{}", client_index);

        handles.push(
            std::thread::Builder::new()
                .name(client_name.clone())
                .spawn(move || -> bool {
                    let mut context = ClientContext::new(
                        client_index,
                        client_name.clone(),
                        runner_context,
                        delegated_shutdown_listener,
                    );
                    if let Some(setup_client_fn) = setup_client_fn {
                        if let Err(e) = setup_client_fn(&mut context) {
                            log::error!("Setup failed for virtual client {client_name}: {e:?}");
                            return false;
                        }
                    }

                    let mut bailed = false;
                    if let Some(behaviour) = behaviour_fn {
                        loop {
                            if cycle_shutdown_receiver.should_shutdown() {
                                log::debug!("Stopping virtual client {client_name}");
                                break;
                            }

                            match behaviour(&mut context) {
                                Ok(()) => {}
                                Err(e) if e.is::<ShutdownSignalError>() => {
                                    // Expected when the run ends while a step is in flight.
                                    // The check at the top of the loop will break out.
                                }
                                Err(e) if e.is::<ClientBailError>() => {
                                    log::debug!("Virtual client {client_name} is bailing");
                                    bailed = true;
                                    break;
                                }
                                Err(e) => {
                                    log::error!("Client behaviour failed: {e:?}");
                                }
                            }
                        }
                    }

                    if let Some(teardown_client_fn) = teardown_client_fn {
                        if let Err(e) = teardown_client_fn(&mut context) {
                            log::error!("Teardown failed for virtual client {client_name}: {e:?}");
                        }
                    }

                    !bailed
                })
                .expect("Failed to spawn thread for virtual client"),
        );
    }

    // Wait for the stop signal, or for every client to finish early (bail, failed setup).
    let mut stop_listener = shutdown_handle.new_listener();
    loop {
        if handles.iter().all(|handle| handle.is_finished()) {
            break;
        }
        if stop_listener.should_shutdown() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // In-flight behaviours get the graceful stop window; the cancel signal fires at its end,
    // so allow a little slack for work cut off right at the deadline to unwind.
    let deadline = Instant::now() + definition.graceful_stop + Duration::from_millis(500);
    let mut completed = 0;
    let mut abandoned = 0;
    for handle in handles {
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if !handle.is_finished() {
            abandoned += 1;
            continue;
        }
        match handle.join() {
            Ok(true) => completed += 1,
            Ok(false) => {}
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Error joining thread for virtual client: {:?}",
                    e
                ))
            }
        }
    }
    if abandoned > 0 {
        log::warn!("{abandoned} virtual clients were still busy after the graceful stop window");
    }

    Ok(completed)
}
