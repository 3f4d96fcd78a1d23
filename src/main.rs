//! Student registry server.
//!
//! Reads its configuration from the environment (see [`AppConfig`]),
//! applies pending migrations and serves the registration form and the
//! admin dashboard.

use std::sync::Arc;

use sea_orm::Database;
use student_registry::{web, AppConfig, SeaOrmSessionStore, SeaOrmStudentStore};
use tower_sessions::ExpiredDeletion;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = AppConfig::from_env()?;

    info!(bind = %config.bind_addr, "connecting to database");
    let db = Database::connect(config.connect_options()).await?;
    info!("connected to database");

    #[cfg(feature = "migration")]
    {
        use student_registry::migration::{Migrator, MigratorTrait};
        Migrator::up(&db, None).await?;
        info!("migrations applied");
    }

    let sessions = SeaOrmSessionStore::new(db.clone());
    let deletion_task = tokio::task::spawn({
        let sessions = sessions.clone();
        let period = config.session_cleanup_interval;
        async move {
            if let Err(e) = sessions.continuously_delete_expired(period).await {
                error!(error = %e, "expired session cleanup stopped");
            }
        }
    });

    let store = Arc::new(SeaOrmStudentStore::new(db));
    let state = web::AppState::from_config(store, &config);
    let app = web::app(state, sessions, config.secure_cookies);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("server listening on http://{}", config.bind_addr);
    let served = axum::serve(listener, app.into_make_service()).await;

    deletion_task.abort();
    served?;
    Ok(())
}
