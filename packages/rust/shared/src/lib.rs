//! Shared types, error model, and configuration for TopicDoc.
//!
//! This crate is the foundation depended on by all other TopicDoc crates.
//! It provides:
//! - [`TopicDocError`], the unified error type
//! - Domain types ([`TopicContext`], [`SourceSet`], [`Artifact`], [`TopicOutline`], [`RunId`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, OpenRouterConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_key,
};
pub use error::{Result, TopicDocError};
pub use types::{Artifact, RunId, SourceSet, TopicContext, TopicOutline};
