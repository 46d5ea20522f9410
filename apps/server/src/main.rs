use fintech_server::{
    api::app_router, build_state, config::Config, controller::SyncStart, init_tracing,
    load_initial_config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config).await?;

    let initial = load_initial_config(&config)?;
    state.controller.initialize(initial).await?;
    if state.controller.begin_sync().await? == SyncStart::Started {
        tracing::info!("Sync scheduler started");
    }

    let router = app_router(state.clone(), &config);
    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.controller.shutdown().await;
    Ok(())
}
