use std::{net::SocketAddr, time::Duration};

use dotenvy::dotenv;
use tracing::info;

use remodely_identity::infra::{
    InfraError,
    app::create_app,
    setup::{init_app_state, init_tracing},
    token_sweeper::spawn_token_sweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    spawn_token_sweeper(
        app_state.token_store.clone(),
        app_state.rate_limiter.clone(),
        Duration::from_secs(app_state.config.token_sweep_interval_secs.max(1)),
    );

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(InfraError::Server)?;

    Ok(())
}
