//! Route handlers organized by resource

pub mod artifacts;
pub mod generate;
pub mod health;
pub mod preview;
