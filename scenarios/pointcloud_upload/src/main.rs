use pointcloud_gale_runner::prelude::*;

fn setup(ctx: &mut RunnerContext<PointcloudRunnerContext>) -> HookResult {
    load_configuration(ctx)?;
    Ok(())
}

fn client_setup(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    connect_client(ctx)?;
    Ok(())
}

fn client_behaviour(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    upload_flow(ctx)?;
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
    .use_client_behaviour(client_behaviour);

    run(builder)?;

    Ok(())
}
