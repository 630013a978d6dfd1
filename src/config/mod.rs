//! Engine Configuration Module
//!
//! Operator-tunable settings for the grid simulator, the standards search
//! and the model loader, read from TOML.
//!
//! ## Loading Order
//!
//! 1. `CASTLINE_CONFIG` environment variable (path to TOML file)
//! 2. `castline.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! ```ignore
//! let config = EngineConfig::load();
//! let engine = Engine::new(Arc::new(artifact), config);
//! ```
//!
//! Unlike a process-wide singleton, the config is owned by the [`Engine`]
//! it was handed to, so tests can run several engines side by side.
//!
//! [`Engine`]: crate::engine::Engine

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
