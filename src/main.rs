use anyhow::{Context, Result};
use random_image_server::{config::Config, image_server::ImageServer, store::DirStore};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::get();
    let store = DirStore::new(&config.images_dir);

    store
        .init()
        .with_context(|| format!("Could not create {}", config.images_dir.display()))?;

    ImageServer::new(config, store).start()
}
