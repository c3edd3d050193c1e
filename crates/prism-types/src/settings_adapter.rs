//! Adapter that persists the authoritative settings snapshot.
//!
//! The engine never touches storage directly. A failing `save` is a failed
//! commit: the error is returned to the caller and the snapshot is not
//! advanced.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;
use crate::types::SettingsSnapshot;

#[async_trait]
pub trait SettingsAdapter: Debug + Send + Sync {
	/// Reads the last persisted snapshot, `None` on first start
	async fn load(&self) -> PrResult<Option<SettingsSnapshot>>;

	/// Persists a complete snapshot
	async fn save(&self, snapshot: &SettingsSnapshot) -> PrResult<()>;
}

// vim: ts=4
