pub use prism_types::prelude::*;

pub use crate::app::{Engine, EngineBuilder};
pub use prism_core::config::EngineOpts;
pub use prism_core::hooks::{DEFAULT_PRIORITY, points};
pub use prism_types::types::{Actor, SettingValue, SettingsSnapshot};

// vim: ts=4
