use api::{build_router, init_database, init_services};
use config::{ApiConfig, LoggingConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load configuration first to get logging settings
    let config = ApiConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let config = Arc::new(config);
    let database = init_database(&config.database).await;
    let state = init_services(database, config.clone());

    let app = build_router(state);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        });

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("API Endpoints:");
    tracing::info!("  - GET/POST   /v1/organizations");
    tracing::info!("  - GET/PATCH/DELETE /v1/organizations/:id");
    tracing::info!("  - POST       /v1/organizations/switch");
    tracing::info!("  - POST       /v1/organizations/leave");
    tracing::info!("  - GET/POST/PATCH/DELETE /v1/organizations/:id/members");
    tracing::info!("  - GET/DELETE /v1/organizations/:id/invitations");
    tracing::info!("  - GET        /v1/invitations/lookup");
    tracing::info!("  - POST       /v1/invitations/accept");
    tracing::info!("  - GET        /v1/invitations/user");
    tracing::info!("  - GET/PATCH  /v1/users/me");

    axum::serve(listener, app).await.unwrap();
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Build the filter string from the logging configuration
    let mut filter = logging_config.level.clone();

    for (module, level) in &logging_config.modules {
        filter.push_str(&format!(",{}={}", module, level));
    }

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
