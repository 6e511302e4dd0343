//! The compiled template artifact.

use std::cell::OnceCell;
use std::fmt;

use smol_str::SmolStr;

use crate::codegen::{Binding, BuildProgram, HydrateProgram};
use crate::error::{CompileError, HydrateError, RenderError};
use crate::render::{Resolver, Scope, render_template};
use crate::value::Value;
use weft_dom::Dom;

/// A compiled template: its build and hydrate programs, the compiled
/// templates of any nested block branches, and a lazily-built skeleton.
///
/// The skeleton is constructed through the node-creation capability exactly
/// once, on first instantiation; every later instantiation deep-clones it.
/// Each block branch is its own `CompiledTemplate` and caches its own
/// skeleton, so a branch that is never taken is never built.
pub struct CompiledTemplate<D: Dom> {
    build: BuildProgram,
    hydrate: HydrateProgram,
    children: Vec<CompiledTemplate<D>>,
    block_params: Vec<SmolStr>,
    yield_names: Vec<SmolStr>,
    arg_names: Vec<SmolStr>,
    skeleton: OnceCell<D::Node>,
}

impl<D: Dom> CompiledTemplate<D> {
    pub(crate) fn new(
        build: BuildProgram,
        hydrate: HydrateProgram,
        children: Vec<CompiledTemplate<D>>,
        block_params: Vec<SmolStr>,
    ) -> Self {
        CompiledTemplate {
            build,
            hydrate,
            children,
            block_params,
            yield_names: Vec::new(),
            arg_names: Vec::new(),
            skeleton: OnceCell::new(),
        }
    }

    pub(crate) fn with_interface(mut self, yield_names: Vec<SmolStr>, arg_names: Vec<SmolStr>) -> Self {
        self.yield_names = yield_names;
        self.arg_names = arg_names;
        self
    }

    pub fn build_program(&self) -> &BuildProgram {
        &self.build
    }

    pub fn hydrate_program(&self) -> &HydrateProgram {
        &self.hydrate
    }

    /// Child templates compiled from nested block branches.
    pub fn children(&self) -> &[CompiledTemplate<D>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&CompiledTemplate<D>> {
        self.children.get(index)
    }

    /// Local names a block helper binds for this template's body, in
    /// positional order.
    pub fn block_params(&self) -> &[SmolStr] {
        &self.block_params
    }

    /// Yield names declared at compile time, carried for the component
    /// layer. The compiler records them without consulting them.
    pub fn yield_names(&self) -> &[SmolStr] {
        &self.yield_names
    }

    /// Named argument names declared at compile time.
    pub fn arg_names(&self) -> &[SmolStr] {
        &self.arg_names
    }

    /// The cached skeleton, building it on first call.
    pub fn skeleton(&self, dom: &D) -> Result<&D::Node, CompileError> {
        if let Some(node) = self.skeleton.get() {
            return Ok(node);
        }
        let built = self.build.run(dom)?;
        Ok(self.skeleton.get_or_init(|| built))
    }

    /// Whether the skeleton has been built yet.
    pub fn skeleton_built(&self) -> bool {
        self.skeleton.get().is_some()
    }

    /// A fresh instance: a deep clone of the cached skeleton, sharing no
    /// nodes with the skeleton or with any other instance.
    pub fn instantiate(&self, dom: &D) -> Result<D::Node, CompileError> {
        Ok(dom.clone_tree(self.skeleton(dom)?))
    }

    /// Runs the hydrate program against an instance fragment, yielding the
    /// ordered binding descriptors for exactly that instance's nodes.
    pub fn hydrate(&self, dom: &D, fragment: &D::Node) -> Result<Vec<Binding<D::Node>>, HydrateError> {
        self.hydrate.run(dom, fragment)
    }

    /// Instantiates, hydrates and resolves every binding against `context`.
    pub fn render<R>(&self, dom: &D, context: &Value, resolver: &R) -> Result<D::Node, RenderError>
    where
        R: Resolver<D>,
    {
        render_template(self, dom, &Scope::root(context.clone()), resolver)
    }
}

impl<D: Dom> fmt::Debug for CompiledTemplate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("build", &self.build)
            .field("hydrate", &self.hydrate)
            .field("children", &self.children)
            .field("block_params", &self.block_params)
            .finish_non_exhaustive()
    }
}

/// Equality over the compiled programs; the skeleton cache is a derived
/// artifact and never participates.
impl<D: Dom> PartialEq for CompiledTemplate<D> {
    fn eq(&self, other: &Self) -> bool {
        self.build == other.build
            && self.hydrate == other.hydrate
            && self.children == other.children
            && self.block_params == other.block_params
            && self.yield_names == other.yield_names
            && self.arg_names == other.arg_names
    }
}
