//! Template syntax tree.
//!
//! The tree is produced by an external parser and consumed exactly once by
//! the compilation pipeline. This module only defines the node shapes plus
//! builder-style constructors so parsers (and tests) can assemble trees
//! without depending on any particular text syntax.

pub mod node;

pub use node::{AttrPart, Attribute, Block, Element, Literal, Mustache, Node, Param, Path};

/// A root sequence of syntax nodes, the input of one compilation.
pub type Program = Vec<node::Node>;
