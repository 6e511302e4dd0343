//! Code generators.
//!
//! Both generators validate their opcode stream up front and then interpret
//! it directly: an in-memory instruction representation stands in for the
//! textual function bodies the stack-based IR was originally designed
//! around. [`build::BuildProgram`] reconstructs the static skeleton;
//! [`hydrate::HydrateProgram`] walks a concrete clone by positional address
//! and emits ordered binding descriptors.

pub mod build;
pub mod hydrate;

pub use build::BuildProgram;
pub use hydrate::{Binding, ContentKind, Expr, HydrateProgram, ProgramPair};
