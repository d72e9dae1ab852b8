//! Patient service binary.
//!
//! The upstream clients are blocking `reqwest` clients, which must not be
//! created or dropped on an async runtime thread, so the runtime is built by
//! hand after the state is ready.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dental_core::Database;
use patient_service::{upstream, AppState, ServiceConfig};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patient_service=info".parse()?)
                .add_directive("dental_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let upstreams = upstream::connect(&config).context("building upstream clients")?;

    if config.clinic_directory_url.is_none() {
        tracing::warn!("CLINIC_DIRECTORY_URL not set; consultation fees default to 0");
    }
    if config.notification_url.is_none() {
        tracing::warn!("NOTIFICATION_SERVICE_URL not set; recall notifications are dropped");
    }

    let state = AppState::new(
        db,
        upstreams.fees,
        upstreams.directory,
        upstreams.notifications,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(patient_service::serve(config.addr, state.clone()))?;
    drop(runtime);
    drop(state);
    Ok(())
}
