use std::net::SocketAddr;
use std::sync::Arc;

use tokengate::demo::{self, DemoConfig};
use tokengate::{JwtConfig, JwtManager};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokengate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let demo_config = match DemoConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let jwt_config = match JwtConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load token configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Loaded configuration: listen_port={}, locations={:?}, algorithm={:?}",
        demo_config.listen_port,
        jwt_config.token_location,
        jwt_config.algorithm
    );

    let manager: JwtManager<String> = match JwtManager::new(jwt_config) {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!("Failed to configure tokens: {e}");
            std::process::exit(1);
        }
    };

    let app = demo::router(Arc::new(manager));

    let addr = SocketAddr::from(([127, 0, 0, 1], demo_config.listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
