//! Shopmind - boots the core services and the background price-monitoring
//! scheduler. The HTTP transport layer is deliberately out of scope here
//! (SPEC_FULL.md §B); this binary exists to run the scheduler as a
//! long-lived process against a real database and catalog.

use shopmind::Services;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .json()
        .init();

    let services = Services::builder().build().await?;
    services.initialize().await?;

    let mut scheduler = services.build_scheduler().await?;
    scheduler.start().await?;

    tracing::info!("shopmind running");
    tokio::signal::ctrl_c().await?;

    scheduler.stop().await?;
    tracing::info!("shopmind shutting down");

    Ok(())
}
