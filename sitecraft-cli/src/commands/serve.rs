use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use sitecraft_core::SiteConfig;
use tracing::info;

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides [server].bind_addr)
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Allow any origin instead of localhost only
    #[arg(long)]
    pub cors_permissive: bool,

    /// Postgres URL; versions are kept in memory when unset
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = SiteConfig::load()?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if args.cors_permissive {
        config.server.cors_permissive = true;
    }
    if let Some(url) = args.database_url {
        config.server.database_url = url;
    }

    info!(addr = %config.server.bind_addr, "starting sitecraft server");
    sitecraft_server::serve(&config).await?;
    Ok(())
}
