//! Shared utilities used across the engine and the CLI binary.

pub mod logger;
pub mod time;
