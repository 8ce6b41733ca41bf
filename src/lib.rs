//! Cross-cluster endpoint resolution for stretch clusters
//!
//! See [`stretch`] for the engine and [`config`] for its configuration.

pub mod cli;
pub mod config;
pub mod stretch;
