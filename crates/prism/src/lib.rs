//! Prism is a data-driven settings synchronization and live-preview engine.
//!
//! # Features
//!
//! - Declarative option catalog with typed validation
//! - Extension points (actions and filters) with priorities and telemetry
//! - Security-hardened, all-or-nothing sanitization of every change
//! - Versioned settings snapshots with lock-free reads
//! - Live preview of edits with debounced commits
//! - Two-tier caching of derived artifacts such as the generated stylesheet

// Re-export shared types and collaborator traits from prism-types
pub use prism_types::cache_adapter;
pub use prism_types::error;
pub use prism_types::hasher;
pub use prism_types::permission;
pub use prism_types::render_adapter;
pub use prism_types::settings_adapter;
pub use prism_types::types;

// Engine components
pub use prism_core::cache;
pub use prism_core::config;
pub use prism_core::hooks;
pub use prism_core::memory;
pub use prism_core::options;
pub use prism_core::preview;
pub use prism_core::sanitize;
pub use prism_core::store;
pub use prism_core::stylesheet;

// Local modules
pub mod app;
pub mod prelude;

pub use app::{Engine, EngineBuilder, EngineStats};

// vim: ts=4
