use minecraft_session_proxy::{
    auth, config::Config, listener::DownstreamListener, profile::InMemoryProfileStore,
    session::SessionManager,
};
use std::path::Path;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "proxy.toml".to_owned());
    let config = if Path::new(&config_path).exists() {
        Config::load(Path::new(&config_path))?
    } else {
        tracing::warn!("{config_path} not found, using defaults");
        Config::default()
    };

    let profiles = InMemoryProfileStore::new(config.profiles.clone());
    let manager = SessionManager::new(config, profiles, auth::no_refresh());

    let listener = DownstreamListener::bind(manager.clone()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    listener.run().await
}
