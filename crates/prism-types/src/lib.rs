//! Shared types, collaborator traits, and core utilities for the Prism engine.
//!
//! This crate contains the foundational types that are shared between the
//! engine crates and all adapter implementations. Keeping them separate lets
//! adapter crates compile without pulling in the engine itself.

#![forbid(unsafe_code)]

pub mod cache_adapter;
pub mod error;
pub mod hasher;
pub mod permission;
pub mod prelude;
pub mod render_adapter;
pub mod settings_adapter;
pub mod types;

// vim: ts=4
