//! evoapi library
//!
//! Exposes modules shared by the CLI and daemon binaries.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial library structure

pub mod daemon;
pub mod output;
