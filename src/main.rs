use quantedge::config::AppConfig;
use quantedge::server;
use quantedge::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("quantedge starting");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        risk_free_rate = cfg.engine.risk_free_rate,
        mc_simulations = cfg.engine.mc_simulations,
        ev_grid_points = cfg.engine.ev_grid_points,
        max_legs = cfg.engine.max_legs,
        lot_size = cfg.engine.lot_size,
        timeout_secs = cfg.request_timeout_secs,
        "engine configured"
    );

    let port = cfg.server_port;
    let app = server::router(AppState::new(cfg));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
