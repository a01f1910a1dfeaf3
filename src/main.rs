use listing_moderation::{
    adapters::{LocalAssetStore, LogNotifier},
    config::{AppConfig, database, load_config},
    core::{ModerationService, establishment::list_pending},
    errors::Result,
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();

    // 3. Load and validate configuration, from CONFIG_PATH if given
    let app_config = match env::var("CONFIG_PATH") {
        Ok(path) => load_config(&path).inspect(|_| info!(%path, "Loaded configuration file")),
        Err(_) => AppConfig::from_env(),
    }
    .inspect_err(|e| error!("Invalid configuration: {}", e))?;
    info!(admin = ?app_config.admin, "Configuration validated");

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Wire the moderation service
    let assets = Arc::new(LocalAssetStore::new(
        app_config.assets_root.clone(),
        app_config.upload_dir.clone(),
    ));
    let notifier = Arc::new(LogNotifier::new(app_config.mail.clone()));
    let service = ModerationService::new(
        Arc::new(db),
        assets,
        notifier,
        app_config.mail.sender_name.clone(),
    );

    let queue = list_pending(service.db()).await?;
    info!(pending = queue.len(), "Moderation core ready");
    for record in &queue {
        info!(
            establishment_id = record.id,
            status = %record.status,
            trade_name = %record.trade_name,
            "Awaiting decision"
        );
    }

    Ok(())
}
