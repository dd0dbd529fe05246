// filestash terminal client.
// Signs in, wires the sync coordinator to the hosted store, and runs the TUI.

mod app;
mod state;
mod ui;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use filestash::cache::{FileStore, KeyValueStore, ListingCache, paths};
use filestash::config::Config;
use filestash::connectivity::NetworkMonitor;
use filestash::error::{Result, StashError};
use filestash::storage::auth::restore_or_sign_in;
use filestash::storage::{AuthClient, RemoteStore, SessionManager, SessionStore, StorageClient};
use filestash::sync::{Coordinator, CoordinatorSettings, TokioScheduler};
use filestash::transfer::Transfers;

use app::App;

/// Send logs to a file; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let Some(path) = paths::log_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filestash=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| StashError::Other(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let config = Config::from_env()?;

    let store_dir = paths::store_dir()
        .ok_or_else(|| StashError::Config("no cache directory on this platform".to_string()))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(store_dir)?);

    let auth = AuthClient::new(&config)?;
    let sessions = SessionStore::new(Arc::clone(&store));
    let session = restore_or_sign_in(&auth, &sessions).await?;
    info!(user = %session.user.id, bucket = %config.bucket, "Signed in");

    let user = session.user.clone();
    let session = Arc::new(SessionManager::new(session, Arc::new(auth), sessions));
    let remote: Arc<dyn RemoteStore> = Arc::new(StorageClient::new(&config, session)?);
    let monitor = NetworkMonitor::spawn(config.probe_url.clone(), config.probe_interval);

    let (coordinator, events) = Coordinator::new(
        Arc::clone(&remote),
        Arc::new(monitor.connectivity()),
        Arc::new(TokioScheduler),
        ListingCache::new(store, config.cache_ttl),
        CoordinatorSettings::from_config(&config, user.id.clone()),
    );
    coordinator.watch_connectivity();

    let transfers = Transfers::new(remote, user.id.clone(), config.signed_url_ttl);
    let download_dir = paths::download_dir()
        .ok_or_else(|| StashError::Config("no download directory on this platform".to_string()))?;
    let user_label = user.email.unwrap_or(user.id);

    let mut app = App::new(
        Arc::new(coordinator),
        Arc::new(transfers),
        events,
        download_dir,
        user_label,
    );

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();

    drop(app);
    drop(monitor);
    info!("Exiting");
    result?;
    Ok(())
}
