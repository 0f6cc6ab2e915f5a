use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, HeaderIdentityResolver, router};
use medtrip_core::config::{max_trip_entries_from_env_value, path_from_env_value};
use medtrip_core::{CoreConfig, TransportService};

/// Main entry point for the MedTrip service
///
/// Loads configuration from the environment, opens the store and serves the REST API with
/// Swagger UI until Ctrl-C.
///
/// # Environment Variables
/// - `MEDTRIP_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MEDTRIP_DATA_FILE`: JSON data file; unset keeps everything in memory
/// - `MEDTRIP_AUDIT_LOG`: JSON-lines audit log; unset logs audit records via tracing
/// - `MEDTRIP_MAX_TRIP_ENTRIES`: per-trip data entry cap
/// - `API_KEY`: shared key expected in the `x-api-key` header
///
/// # Errors
/// Returns an error if configuration is invalid, the data file cannot be loaded, or the
/// server cannot bind or fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medtrip_run=info".parse()?)
                .add_directive("medtrip_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("MEDTRIP_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("API_KEY must be set"))?;

    let cfg = Arc::new(CoreConfig::new(
        path_from_env_value(std::env::var("MEDTRIP_DATA_FILE").ok()),
        path_from_env_value(std::env::var("MEDTRIP_AUDIT_LOG").ok()),
        max_trip_entries_from_env_value(std::env::var("MEDTRIP_MAX_TRIP_ENTRIES").ok())?,
    )?);
    match cfg.data_file() {
        Some(path) => tracing::info!("++ Using data file {}", path.display()),
        None => tracing::warn!("MEDTRIP_DATA_FILE not set; state will not survive a restart"),
    }

    let service = TransportService::open(cfg)?;
    let app = router(AppState::new(
        service,
        Arc::new(HeaderIdentityResolver::new(api_key)),
    ));

    tracing::info!("++ Starting MedTrip REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
