mod errors;
mod identity;
mod nav;
mod settings;
mod web;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::identity::HttpIdentityProvider;
use crate::nav::guard::NavigationGuard;
use crate::nav::session::FileSessionStore;

#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Navigation gateway for a permission-driven admin console"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // the static route forest, authored declaratively
    let forest = nav::loader::load_routes(&settings.routes.path)?;

    // session mirror, read once here and on every mutation afterwards
    let store = FileSessionStore::new(settings.storage.session_path.clone());

    // upstream identity API
    let provider = HttpIdentityProvider::new(
        &settings.upstream.base_url,
        Duration::from_secs(settings.upstream.timeout_secs),
    )?;

    let guard = Arc::new(NavigationGuard::new(
        settings.auth.clone(),
        forest,
        Arc::new(provider),
        Box::new(store),
    ));

    web::serve(settings, guard).await?;
    Ok(())
}
