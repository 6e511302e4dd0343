//! `weft-compiler` turns a template syntax tree into a pair of opcode
//! programs: a *build* program that constructs the template's static DOM
//! skeleton once, and a *hydrate* program that locates every dynamic site
//! inside a fresh clone of that skeleton by positional address and emits
//! binding descriptors for the render layer to resolve.
//!
//! ## Examples
//!
//! ```rust
//! use weft_compiler::ast::{Element, Node};
//! use weft_compiler::{DefaultResolver, Value, compile};
//! use weft_dom::{TreeDom, to_html};
//!
//! # fn main() -> Result<(), weft_compiler::Error> {
//! let program = vec![Node::from(
//!     Element::new("div")
//!         .child(Node::text("Hello "))
//!         .child(Node::mustache("name")),
//! )];
//!
//! let template = compile::<TreeDom>(&program)?;
//! let dom = TreeDom::new();
//! let resolver = DefaultResolver::new();
//!
//! let out = template.render(&dom, &Value::map([("name", "World".into())]), &resolver)?;
//! assert_eq!(to_html(&out), "<div>Hello World</div>");
//!
//! // The skeleton was built once; re-rendering only clones it.
//! template.render(&dom, &Value::map([("name", "Again".into())]), &resolver)?;
//! assert_eq!(dom.elements_created(), 1);
//! # Ok(())
//! # }
//! ```
pub mod ast;
pub mod codegen;
pub mod compiler;
mod error;
pub mod opcode;
pub mod render;
mod template;
mod value;

pub use ast::Program;
pub use codegen::{Binding, BuildProgram, ContentKind, Expr, HydrateProgram, ProgramPair};
pub use compiler::{CompileOptions, KnownHelpers, TemplateCompiler};
pub use error::{CompileError, Error, HydrateError, RenderError};
pub use render::{ContentCall, DefaultResolver, HelperArgs, Programs, Resolver, Scope};
pub use template::CompiledTemplate;
pub use value::Value;

use weft_dom::Dom;

/// Compiles a root sequence of syntax nodes with default options.
pub fn compile<D: Dom>(program: &[ast::Node]) -> Result<CompiledTemplate<D>, CompileError> {
    TemplateCompiler::new().compile(program)
}

/// Compiles with explicit [`CompileOptions`].
pub fn compile_with_options<D: Dom>(
    program: &[ast::Node],
    options: CompileOptions,
) -> Result<CompiledTemplate<D>, CompileError> {
    TemplateCompiler::with_options(options).compile(program)
}
