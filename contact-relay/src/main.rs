use contact_relay::{
    app::router,
    config::Config,
    handler::ContactFormHandler,
    secrets::{AwsSecretsManagerSecretRepository, EnvironmentSecretRepository, SecretRepository},
};
use lambda_http::{run, Error};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

/// Set by the Lambda execution environment.
const LAMBDA_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let on_lambda = std::env::var_os(LAMBDA_RUNTIME_API).is_some();
    let config = if on_lambda {
        Config::load(&AwsSecretsManagerSecretRepository::open().await).await?
    } else {
        Config::load(&EnvironmentSecretRepository::open().await).await?
    };
    info!("Loaded configuration {config:?}");

    let handler = ContactFormHandler::new(&config)?;
    let handler = Arc::new(if on_lambda {
        handler.awaiting_delivery()
    } else {
        handler
    });
    let app = router(handler, config.is_local);

    if on_lambda {
        run(app).await
    } else {
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        info!("Server running at http://localhost:{}", config.port);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(error) = signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {error}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
