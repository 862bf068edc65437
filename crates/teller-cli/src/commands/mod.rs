//! CLI commands

pub mod ask;
pub mod bench;
pub mod config;
pub mod render;
pub mod serve;
