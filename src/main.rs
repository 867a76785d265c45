use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use hiring_pipeline::{
    config::{get_config, init_config},
    database::{pool::create_pool, postgres::PgStore, store::Store},
    middleware::cors::webhook_cors,
    services::email_transport::{EmailTransport, ProviderApiTransport, SmtpEmailTransport},
    AppState,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let transport: Arc<dyn EmailTransport> = Arc::new(SmtpEmailTransport::new(
        config.smtp_server.clone(),
        config.smtp_user.clone(),
        config.smtp_pass.clone(),
        config.from_email.clone(),
    ));
    let alternate_transport = config
        .alternate_mail_url
        .clone()
        .map(|url| Arc::new(ProviderApiTransport::new(url)) as Arc<dyn EmailTransport>);

    let app_state = AppState::new(store, transport, alternate_transport);

    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.notification_service.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Email dispatch worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    let app = hiring_pipeline::app_router(app_state)
        .layer(webhook_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
