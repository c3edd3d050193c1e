pub use prism_types::prelude::*;

// vim: ts=4
