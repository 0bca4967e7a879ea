//! sitecraft CLI - generate, sanitize and preview single-file websites
//!
//! - `generate`: run the provider chain, resolve image anchors, write the artifact
//! - `normalize` / `sanitize` / `render`: offline pipeline stages over a file or stdin
//! - `serve`: HTTP service with generation, artifact lookup and previews (`server` feature)
//! - `config`: inspect or initialize ~/.sitecraft/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;
mod ui;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "sitecraft",
    author,
    version,
    about = "Generate single-file websites with LLM fallback chains and safe previews",
    long_about = "Turn a natural-language request into a self-contained HTML document. \
                  Providers are tried in priority order, image anchors are filled in the \
                  background, and every preview is sanitized and wrapped in a protection harness."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces via OTLP (requires the `telemetry` feature)
    #[arg(long, global = true)]
    otel: bool,

    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a website from a prompt
    Generate(commands::GenerateArgs),
    /// Extract the code payload from a raw model response
    Normalize(commands::TransformArgs),
    /// Remove secrets, credentials and internal hosts from an artifact
    Sanitize(commands::TransformArgs),
    /// Sanitize an artifact and wrap it in the preview harness
    Render(commands::RenderArgs),
    /// Run the HTTP service
    #[cfg(feature = "server")]
    Serve(commands::ServeArgs),
    /// Inspect or initialize configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    sitecraft_core::config::load_dotenv();
    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        quiet: cli.quiet,
        otel: cli.otel,
    })
    .ok();
    ui::init_quiet_mode(cli.quiet);

    let result = match cli.command {
        Commands::Generate(args) => commands::run_generate(args).await,
        Commands::Normalize(args) => commands::run_normalize(args),
        Commands::Sanitize(args) => commands::run_sanitize(args),
        Commands::Render(args) => commands::run_render(args),
        #[cfg(feature = "server")]
        Commands::Serve(args) => commands::run_serve(args).await,
        Commands::Config(args) => config::run_config(args),
    };

    tracing_setup::shutdown_otel();
    result
}
