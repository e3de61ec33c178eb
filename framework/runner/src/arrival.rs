use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;

use gale_core::prelude::{ClientBailError, ShutdownHandle, ShutdownSignalError};

use crate::context::{ClientContext, RunnerContext, UserValuesConstraint};
use crate::definition::{ClientHookMut, ScenarioDefinition, DEFAULT_BEHAVIOUR_NAME};

/// One reusable execution slot: a thread that owns a virtual client context and runs one
/// scenario execution per job it receives.
struct ExecutionSlot {
    job_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drive the constant-arrival-rate policy.
///
/// A dispatcher starts `rate` scenario executions per time unit by handing jobs to idle
/// execution slots. The pool starts at `pre_allocate` slots and grows on demand up to
/// `max_in_flight`; when every slot is busy the iteration is dropped and counted, never queued.
///
/// Returns the number of scenario executions that were started.
pub(crate) fn run_arrivals<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: &ScenarioDefinition<RV, V>,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_handle: &ShutdownHandle,
    rate: u32,
    time_unit: Duration,
    pre_allocate: usize,
    max_in_flight: usize,
) -> anyhow::Result<usize> {
    let behaviour = definition
        .client_behaviour
        .get(DEFAULT_BEHAVIOUR_NAME)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("The arrival-rate policy requires a default behaviour"))?;

    // Slots report their index here when an execution finishes, making them idle again.
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel::<usize>();

    let mut slots: Vec<ExecutionSlot> = Vec::with_capacity(pre_allocate);
    let mut idle: Vec<usize> = Vec::with_capacity(pre_allocate);
    for slot_index in 0..pre_allocate {
        slots.push(spawn_slot(
            slot_index,
            behaviour,
            definition.setup_client_fn,
            definition.teardown_client_fn,
            runner_context.clone(),
            shutdown_handle,
            done_tx.clone(),
        )?);
        idle.push(slot_index);
    }

    let period = Duration::from_secs_f64(time_unit.as_secs_f64() / rate as f64);
    let mut started = 0usize;
    let mut dropped = 0usize;
    let mut shutdown_listener = shutdown_handle.new_listener();

    runner_context.executor().run_until(async {
        let mut ticker = tokio::time::interval(period);
        // Catch up after a stall so the total started stays close to rate * duration / time_unit.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                _ = shutdown_listener.wait_for_shutdown() => {
                    log::debug!("Stopping the arrival dispatcher");
                    break;
                }
                Some(slot_index) = done_rx.recv() => {
                    idle.push(slot_index);
                }
                _ = ticker.tick() => {
                    let slot_index = match idle.pop() {
                        Some(slot_index) => Some(slot_index),
                        None if slots.len() < max_in_flight => {
                            let slot_index = slots.len();
                            match spawn_slot(
                                slot_index,
                                behaviour,
                                definition.setup_client_fn,
                                definition.teardown_client_fn,
                                runner_context.clone(),
                                shutdown_handle,
                                done_tx.clone(),
                            ) {
                                Ok(slot) => {
                                    slots.push(slot);
                                    Some(slot_index)
                                }
                                Err(e) => {
                                    log::error!("Failed to grow the execution slot pool: {e:?}");
                                    None
                                }
                            }
                        }
                        None => None,
                    };

                    match slot_index {
                        Some(slot_index) => {
                            if slots[slot_index].job_tx.send(()).is_ok() {
                                started += 1;
                            } else {
                                // The slot retired itself, after a failed setup or a bail.
                                dropped += 1;
                            }
                        }
                        None => {
                            dropped += 1;
                            log::debug!(
                                "All {max_in_flight} execution slots are busy, dropping this iteration"
                            );
                        }
                    }
                }
            }
        }
    });

    log::info!("Started {started} scenario executions, dropped {dropped}");

    // Stop admitting work. Dropping the job senders lets idle slots exit immediately, while
    // busy slots finish their current execution within the graceful stop window.
    let handles = slots
        .into_iter()
        .map(|slot| slot.handle)
        .collect::<Vec<_>>();

    // The cancel signal fires when the graceful stop window ends, so allow a little slack for
    // executions cut off right at the deadline to unwind.
    let deadline = Instant::now() + definition.graceful_stop + Duration::from_millis(500);
    let mut abandoned = 0;
    for handle in handles {
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            if let Err(e) = handle.join() {
                log::error!("Error joining execution slot thread: {e:?}");
            }
        } else {
            abandoned += 1;
        }
    }
    if abandoned > 0 {
        log::warn!(
            "{abandoned} scenario executions were still in flight after the graceful stop window"
        );
    }

    Ok(started)
}

fn spawn_slot<RV: UserValuesConstraint, V: UserValuesConstraint>(
    slot_index: usize,
    behaviour: ClientHookMut<RV, V>,
    setup_client_fn: Option<ClientHookMut<RV, V>>,
    teardown_client_fn: Option<ClientHookMut<RV, V>>,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_handle: &ShutdownHandle,
    done_tx: UnboundedSender<usize>,
) -> anyhow::Result<ExecutionSlot> {
    let (job_tx, job_rx) = mpsc::channel::<()>();
    let delegated_shutdown_listener = shutdown_handle.new_listener();
    let client_name = format!("client-{}", slot_index);

    let handle = std::thread::Builder::new()
        .name(client_name.clone())
        .spawn(move || {
            let mut context = ClientContext::new(
                slot_index,
                client_name.clone(),
                runner_context,
                delegated_shutdown_listener,
            );

            if let Some(setup_client_fn) = setup_client_fn {
                if let Err(e) = setup_client_fn(&mut context) {
                    log::error!("Setup failed for virtual client {client_name}: {e:?}");
                    return;
                }
            }

            while job_rx.recv().is_ok() {
                match behaviour(&mut context) {
                    Ok(()) => {}
                    Err(e) if e.is::<ShutdownSignalError>() => {
                        // Expected when the run ends while a step is in flight.
                    }
                    Err(e) if e.is::<ClientBailError>() => {
                        log::debug!("Virtual client {client_name} is bailing");
                        break;
                    }
                    Err(e) => {
                        log::error!("Client behaviour failed: {e:?}");
                    }
                }

                if done_tx.send(slot_index).is_err() {
                    // The dispatcher is gone, the run is over.
                    break;
                }
            }

            if let Some(teardown_client_fn) = teardown_client_fn {
                if let Err(e) = teardown_client_fn(&mut context) {
                    log::error!("Teardown failed for virtual client {client_name}: {e:?}");
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to spawn thread for execution slot: {e}"))?;

    Ok(ExecutionSlot { job_tx, handle })
}
