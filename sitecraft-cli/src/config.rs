use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sitecraft_core::config::default_providers;
use sitecraft_core::SiteConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show config file path
    Path,
    /// Print the effective configuration with secrets masked
    Show,
    /// Write a default config file
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", SiteConfig::config_path().display());
            Ok(())
        }
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init(args) => run_init(args),
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

fn run_show() -> Result<()> {
    let mut config = SiteConfig::load()?;
    config.providers = config.provider_descriptors();
    for provider in &mut config.providers {
        provider.api_key = mask(&provider.api_key);
    }
    config.assets.api_key = mask(&config.assets.api_key);
    if !config.server.database_url.is_empty() {
        config.server.database_url = mask(&config.server.database_url);
    }

    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("# {}", SiteConfig::config_path().display());
    print!("{}", rendered);
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    let path = SiteConfig::config_path();
    if path.exists() && !args.force {
        bail!("Config already exists at {} (use --force to overwrite)", path.display());
    }

    let config = SiteConfig {
        providers: default_providers(),
        ..SiteConfig::default()
    };
    config.save(&path)?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}
