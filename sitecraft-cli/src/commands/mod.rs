//! Subcommand implementations

mod generate;
#[cfg(feature = "server")]
mod serve;
mod transform;

pub use generate::{run_generate, GenerateArgs};
#[cfg(feature = "server")]
pub use serve::{run_serve, ServeArgs};
pub use transform::{run_normalize, run_render, run_sanitize, RenderArgs, TransformArgs};
