//! Option registry: descriptor types, registry, and the built-in catalog

pub mod builtin;
pub mod registry;
pub mod types;

pub use registry::{FrozenOptionRegistry, OptionRegistry};
pub use types::{
	EffectBinding, EffectKind, OptionDescriptor, OptionDescriptorBuilder, OptionKind, OptionType,
	OptionValidator,
};

// vim: ts=4
