//! Permission collaborator.
//!
//! Consulted by callers of commit/import before invocation. The engine does
//! not authenticate; it assumes the actor has already been identified.

use crate::types::Actor;

pub trait PermissionCheck: Send + Sync {
	fn can_modify_settings(&self, actor: &Actor) -> bool;
}

/// Grants modification rights to actors carrying a capability role
#[derive(Debug, Clone)]
pub struct RolePermission {
	capability: Box<str>,
}

impl RolePermission {
	pub fn new(capability: impl Into<Box<str>>) -> Self {
		Self { capability: capability.into() }
	}
}

impl PermissionCheck for RolePermission {
	fn can_modify_settings(&self, actor: &Actor) -> bool {
		actor.has_role(&self.capability)
	}
}

/// Allows everyone. Only meant for embedded and test setups.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
	fn can_modify_settings(&self, _actor: &Actor) -> bool {
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_role_permission() {
		let check = RolePermission::new("manage_options");
		assert!(check.can_modify_settings(&Actor::new("admin", &["manage_options"])));
		assert!(!check.can_modify_settings(&Actor::new("editor", &["edit_posts"])));
	}
}

// vim: ts=4
