//! Offline pipeline stages over a file or stdin

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sitecraft_core::harness::{HarnessInjector, HarnessOptions};
use sitecraft_core::normalize::normalize;
use sitecraft_core::sanitize::Sanitizer;
use sitecraft_core::SiteConfig;
use tracing::debug;

#[derive(Parser, Debug)]
pub struct TransformArgs {
    /// Input file, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Output file (default: stdout)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub io: TransformArgs,

    /// Artifact id embedded in the harness and watermark
    #[arg(long, default_value = "local")]
    pub id: String,
}

pub(crate) fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub(crate) fn write_output(out: Option<&Path>, content: &str) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}

pub fn run_normalize(args: TransformArgs) -> Result<()> {
    let raw = read_input(&args.input)?;
    let code = normalize(&raw);
    debug!(raw_len = raw.len(), code_len = code.len(), "normalized");
    write_output(args.out.as_deref(), &code)
}

pub fn run_sanitize(args: TransformArgs) -> Result<()> {
    let config = SiteConfig::load()?;
    let code = read_input(&args.input)?;
    let sanitized = Sanitizer::new(&config.sanitizer).sanitize(&code);
    write_output(args.out.as_deref(), &sanitized)
}

pub fn run_render(args: RenderArgs) -> Result<()> {
    let config = SiteConfig::load()?;
    let code = read_input(&args.io.input)?;
    let sanitized = Sanitizer::new(&config.sanitizer).sanitize(&code);
    let (document, insertion) = HarnessInjector::new(HarnessOptions::from(&config.harness))
        .inject_with_position(&sanitized, &args.id);
    debug!(id = %args.id, ?insertion, "harness injected");
    write_output(args.io.out.as_deref(), &document)
}
