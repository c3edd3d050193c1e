//! Core of the Prism settings engine.
//!
//! Option catalog, extension points, sanitization, two-tier caching of
//! derived artifacts, the authoritative settings store, and the live preview
//! dispatcher that debounces edits into commits.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod hooks;
pub mod memory;
pub mod options;
pub mod prelude;
pub mod preview;
pub mod sanitize;
pub mod store;
pub mod stylesheet;

pub use cache::{CacheManager, CacheStats};
pub use config::EngineOpts;
pub use hooks::{ExecutionStat, ExtensionRegistry, Handler, PointKind};
pub use options::{FrozenOptionRegistry, OptionDescriptor, OptionRegistry};
pub use preview::{FlushOutcome, PreviewDispatcher};
pub use sanitize::SanitizationPipeline;
pub use store::{CommitState, SettingsStore};
pub use stylesheet::StylesheetGenerator;

// vim: ts=4
