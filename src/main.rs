use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use squareone_api::api::router;
use squareone_api::api::types::ApiContext;
use squareone_api::config::{Config, APP_NAME, APP_VERSION};
use squareone_api::db::DbPool;
use squareone_api::invoicing::InvoiceClient;
use squareone_api::mailer::Mailer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    squareone_api::init_tracing();
    info!("{APP_NAME} v{APP_VERSION} starting");

    let config = Arc::new(Config::from_env()?);

    std::fs::create_dir_all(&config.upload_dir)?;
    let db = DbPool::open(Path::new(&config.database_path), config.db_pool_size)?;

    let mailer = match &config.smtp {
        Some(smtp) => Some(Arc::new(Mailer::new(
            smtp,
            &config.clinic_name,
            &config.clinic_tz,
            &config.org_domain,
        )?)),
        None => {
            warn!("SMTP_HOST unset, outbound email disabled");
            None
        }
    };
    let invoicing = match &config.invoicing {
        Some(cfg) => Some(Arc::new(InvoiceClient::new(cfg))),
        None => {
            warn!("STRIPE_SECRET_KEY unset, invoicing disabled");
            None
        }
    };

    let app = router::build(ApiContext {
        db,
        config: config.clone(),
        mailer,
        invoicing,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
