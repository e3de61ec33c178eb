use pointcloud_gale_runner::prelude::*;

fn setup(ctx: &mut RunnerContext<PointcloudRunnerContext>) -> HookResult {
    load_configuration(ctx)?;
    require_geohash_candidates(ctx)?;
    Ok(())
}

fn client_setup(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    connect_client(ctx)?;
    Ok(())
}

// By default each iteration draws a flow according to the configured weights. Under the
// constant-concurrency policy, clients can instead be pinned to one flow with
// `--behaviour upload:N` or `--behaviour fetch:N`.
fn mixed(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    combined_flow(ctx)?;
    Ok(())
}

fn upload(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    upload_flow(ctx)?;
    Ok(())
}

fn fetch(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    fetch_flow(ctx)?;
    Ok(())
}

fn main() -> GaleResult<()> {
    let builder = ScenarioDefinitionBuilder::<
        PointcloudRunnerContext,
        PointcloudClientContext,
    >::new(env!("CARGO_PKG_NAME"), init_cli())
    .with_default_duration_s(60)
    .use_setup(setup)
    .use_client_setup(client_setup)
    .use_client_behaviour(mixed)
    .use_named_client_behaviour("upload", upload)
    .use_named_client_behaviour("fetch", fetch);

    run(builder)?;

    Ok(())
}
