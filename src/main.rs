use anyhow::Result;
use tracing_subscriber::EnvFilter;

use companion::config::{self, BackendConfig};
use companion::services::Database;
use companion::{ui, ChatStore, StoreOptions};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let db_path = config::db_path()?;
    let db = Database::open(&db_path)?;

    let backend = BackendConfig::from_env().build();
    tracing::info!(backend = backend.name(), path = %db_path.display(), "Starting");

    let store = ChatStore::load(db, backend, StoreOptions::default());
    ui::console::run(store).await
}
