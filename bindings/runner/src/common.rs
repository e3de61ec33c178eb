use std::path::PathBuf;

use anyhow::Context;

use gale_runner::prelude::*;
use pointcloud_client_instrumented::prelude::*;

use crate::config::LoadConfig;
use crate::context::{PointcloudClientContext, PointcloudRunnerContext};
use crate::selector::{derive_user_id, select_geohash, select_group, select_upload};

/// Load and validate the run configuration named by the connection string, and read the sample
/// payload it points at. Call this from your scenario's setup hook.
pub fn load_configuration(ctx: &mut RunnerContext<PointcloudRunnerContext>) -> HookResult {
    let path = PathBuf::from(
        ctx.connection_string()
            .context("A configuration file is required, pass one with --config")?,
    );

    let config = LoadConfig::load(&path)?;

    let payload = std::fs::read(&config.payload).with_context(|| {
        format!(
            "Failed to read the sample payload from {}",
            config.payload.display()
        )
    })?;
    if payload.is_empty() {
        anyhow::bail!(
            "The sample payload at {} is empty",
            config.payload.display()
        );
    }

    log::info!(
        "Loaded configuration from {}: {} target(s), {} byte payload",
        path.display(),
        config.targets.len(),
        payload.len()
    );

    ctx.get_mut().configure(config, payload.into());

    Ok(())
}

/// Fail setup early when the fetch flow would have nothing to fetch.
pub fn require_geohash_candidates(ctx: &mut RunnerContext<PointcloudRunnerContext>) -> HookResult {
    if ctx.get().config().geohash_candidates.is_empty() {
        anyhow::bail!("This scenario fetches point clouds, configure geohash_candidates");
    }

    Ok(())
}

/// Create the instrumented HTTP client for one virtual client. Call this from your scenario's
/// client setup hook.
pub fn connect_client(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let client = PointcloudClient::new(
        runner_context.get().config().request_timeout(),
        runner_context.reporter().clone(),
    )?;

    ctx.get_mut().set_client(client);

    Ok(())
}

/// One full upload: reserve a placement with the coordination API, then PUT the sample payload
/// to the storage destination it names.
///
/// A failed or rejected reservation ends the execution after its check is recorded, the PUT is
/// never attempted without a usable reservation. Request failures are check failures, not
/// errors, so the load keeps running.
pub fn upload_flow(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let config = runner_context.get().config();
    let reporter = runner_context.reporter().clone();
    let client = ctx.get().client()?;

    let user_id = derive_user_id(ctx.client_index(), config.users);
    let group = select_group(&config.targets, ctx.get_mut().rng()).clone();

    let request = PrepareUploadRequest {
        user_id,
        lat: config.position.lat,
        lon: config.position.lon,
        geohash_level: config.position.geohash_level,
    };

    let prepare = runner_context
        .executor()
        .execute_in_place(client.prepare_upload(&group.api_base_url, &request))?;

    // The reservation is only usable when the API said yes and the body decodes cleanly, so
    // the check covers both. Without it the PUT is unreachable.
    let reservation = if prepare.is_status(StatusCode::OK) {
        parse_reservation(&prepare.body)
            .map_err(|e| log::warn!("Aborting the upload: {e:?}"))
            .ok()
    } else {
        None
    };
    reporter.add_check(&CheckOutcome::new(
        "upload prepare succeeded",
        reservation.is_some(),
    ));

    let Some(reservation) = reservation else {
        return cooldown(&runner_context, config);
    };

    let put_url = object_put_url(
        &group.storage_base_url,
        &reservation.bucket,
        &reservation.object_key,
    )?;

    let payload = runner_context.get().payload();
    let upload = runner_context
        .executor()
        .execute_in_place(async { Ok(client.upload_object(put_url, payload).await) })?;

    reporter.add_check(&CheckOutcome::new(
        "point cloud upload succeeded",
        upload.is_success(),
    ));

    cooldown(&runner_context, config)
}

/// One fetch: GET the point cloud under a randomly selected geohash candidate. A 404 counts as
/// a pass, probing keys that were never uploaded is part of the workload.
pub fn fetch_flow(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let config = runner_context.get().config();
    let reporter = runner_context.reporter().clone();
    let client = ctx.get().client()?;

    let rng = ctx.get_mut().rng();
    let group = select_group(&config.targets, rng).clone();
    let geohash = select_geohash(&config.geohash_candidates, rng).to_string();

    let fetch = runner_context
        .executor()
        .execute_in_place(client.fetch_pointcloud(&group.api_base_url, &geohash))?;

    reporter.add_check(&CheckOutcome::new(
        "GET pointcloud succeeded or 404",
        fetch.is_status(StatusCode::OK) || fetch.is_status(StatusCode::NOT_FOUND),
    ));

    cooldown(&runner_context, config)
}

/// One mixed iteration: choose the upload or the fetch flow according to the configured
/// weights, then run that flow.
pub fn combined_flow(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    let weights = ctx.runner_context().get().config().weights;

    if select_upload(weights, ctx.get_mut().rng()) {
        upload_flow(ctx)
    } else {
        fetch_flow(ctx)
    }
}

fn cooldown(
    runner_context: &RunnerContext<PointcloudRunnerContext>,
    config: &LoadConfig,
) -> HookResult {
    let pause = config.cooldown();
    if pause.is_zero() {
        return Ok(());
    }

    runner_context.executor().execute_in_place(async move {
        tokio::time::sleep(pause).await;
        Ok(())
    })
}
