use std::sync::Arc;

use tracing::info;

use tanysu_core::{
    config::Config,
    pairing::{JsonFileStateStore, MemoryStateStore, PairingEngine, StateStore},
    profile::{JsonFileProfileStore, MemoryProfileStore, ProfileStore},
};

#[tokio::main]
async fn main() -> Result<(), tanysu_core::Error> {
    tanysu_core::logging::init("tanysu")?;

    let cfg = Arc::new(Config::load()?);

    let state_store: Arc<dyn StateStore> = match &cfg.state_file {
        Some(path) => {
            info!(path = %path.display(), "pairing state persisted to file");
            Arc::new(JsonFileStateStore::new(path))
        }
        None => {
            info!("pairing state kept in memory");
            Arc::new(MemoryStateStore::new())
        }
    };
    let engine = Arc::new(PairingEngine::open(state_store).await?);

    let profiles: Arc<dyn ProfileStore> = match &cfg.profile_file {
        Some(path) => Arc::new(JsonFileProfileStore::open(path).await?),
        None => Arc::new(MemoryProfileStore::new()),
    };

    tanysu_telegram::router::run_polling(cfg, engine, profiles)
        .await
        .map_err(|e| tanysu_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
