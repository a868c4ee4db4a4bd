use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use notification_service::{
    handlers::register_websocket, logging, metrics, websocket::ws_connect, Config,
    NotificationHub,
};
use std::io;

async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;

        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(env = %config.app.env, "Starting notification service");

    let mut hub = NotificationHub::new(&config);
    hub.start();

    let registry = web::Data::new(hub.registry().clone());
    let dispatcher = web::Data::new(hub.dispatcher());
    let gateway = web::Data::new(hub.gateway_state());
    let ws_path = config.websocket.path.clone();
    let addr = config.bind_addr();

    tracing::info!(
        addr = %addr,
        ws_path = %ws_path,
        heartbeat_secs = config.websocket.heartbeat_interval_secs,
        "Starting HTTP server"
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .app_data(dispatcher.clone())
            .app_data(gateway.clone())
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route(&ws_path, web::get().to(ws_connect))
            .configure(register_websocket)
    })
    .disable_signals()
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");

        hub.shutdown_with_server(&server_handle).await;
    });

    server.await.context("HTTP server error")?;
    tracing::info!("Notification service stopped");
    Ok(())
}
