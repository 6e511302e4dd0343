//! Render-time resolution of binding descriptors.
//!
//! The compiler stops at descriptors; everything context-dependent lives
//! behind the [`Resolver`] trait. [`render_template`] drives one
//! instantiation: clone the cached skeleton, hydrate it, evaluate each
//! descriptor's operand expressions against the current scope and hand the
//! result to the resolver, which mutates the instance in place.

use smol_str::SmolStr;

use crate::ast::Path;
use crate::codegen::{Binding, ContentKind, Expr};
use crate::error::RenderError;
use crate::template::CompiledTemplate;
use crate::value::Value;
use weft_dom::Dom;

pub mod resolver;

pub use resolver::{DefaultResolver, HelperArgs};

/// A lexical scope: the current context value plus block-param locals.
///
/// Locals shadow context properties and later bindings shadow earlier ones.
/// The reserved head segment `this` always denotes the context value.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    this: Value,
    locals: Vec<(SmolStr, Value)>,
}

impl Scope {
    pub fn root(context: Value) -> Self {
        Scope {
            this: context,
            locals: Vec::new(),
        }
    }

    /// A scope with a new context value. Locals stay visible; block params
    /// are lexically scoped across context switches.
    pub fn child(&self, this: Value) -> Self {
        Scope {
            this,
            locals: self.locals.clone(),
        }
    }

    /// A scope extended with one local binding.
    pub fn with_local(&self, name: impl Into<SmolStr>, value: Value) -> Self {
        let mut scope = self.clone();
        scope.locals.push((name.into(), value));
        scope
    }

    pub fn this(&self) -> &Value {
        &self.this
    }

    /// Resolves a path: head segment against locals first, then the context
    /// value, remaining segments as property reads. Missing anything is
    /// `Nil`, never an error.
    pub fn lookup(&self, path: &Path) -> Value {
        let mut parts = path.parts.iter();
        let Some(head) = parts.next() else {
            return self.this.clone();
        };
        let mut value = if head == "this" {
            self.this.clone()
        } else if let Some((_, local)) = self.locals.iter().rev().find(|(name, _)| name == head) {
            local.clone()
        } else {
            self.this.get(head)
        };
        for part in parts {
            value = value.get(part);
        }
        value
    }
}

/// Child-template branches of a block invocation, resolved to the compiled
/// templates themselves. Both absent means the inline (non-block) form.
pub struct Programs<'a, D: Dom> {
    pub primary: Option<&'a CompiledTemplate<D>>,
    pub inverse: Option<&'a CompiledTemplate<D>>,
}

impl<'a, D: Dom> Clone for Programs<'a, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, D: Dom> Copy for Programs<'a, D> {}

impl<'a, D: Dom> Programs<'a, D> {
    pub fn none() -> Self {
        Programs {
            primary: None,
            inverse: None,
        }
    }

    pub fn is_block(&self) -> bool {
        self.primary.is_some() || self.inverse.is_some()
    }
}

/// A content-site invocation, with operands already evaluated.
pub enum ContentCall<'a, D: Dom> {
    /// A bare path, property read or zero-arg helper call. The resolver
    /// decides which, based on what it has registered.
    Ambiguous { path: &'a Path, escaped: bool },
    Helper {
        name: &'a SmolStr,
        params: Vec<Value>,
        hash: Vec<(SmolStr, Value)>,
        escaped: bool,
        programs: Programs<'a, D>,
    },
}

/// The external capability that resolves descriptors against a context.
///
/// The compiler never checks that a helper name exists; an unregistered
/// name surfaces from the resolver as [`RenderError::UnknownHelper`].
pub trait Resolver<D: Dom>: Sized {
    /// Resolves a path operand. The default is a plain scope lookup.
    fn resolve(&self, scope: &Scope, path: &Path) -> Value {
        scope.lookup(path)
    }

    /// Resolves a parenthesized sub-expression to a value.
    fn subexpr(
        &self,
        dom: &D,
        scope: &Scope,
        name: &SmolStr,
        params: Vec<Value>,
        hash: Vec<(SmolStr, Value)>,
    ) -> Result<Value, RenderError>;

    /// Fills a reserved content slot, replacing `placeholder`.
    fn content(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        call: ContentCall<'_, D>,
    ) -> Result<(), RenderError>;

    /// Applies a dynamic attribute; `parts` are the evaluated value parts
    /// in declaration order.
    fn attribute(
        &self,
        dom: &D,
        scope: &Scope,
        element: &D::Node,
        name: &SmolStr,
        parts: Vec<Value>,
    ) -> Result<(), RenderError>;

    /// Invokes an element helper against the element node itself.
    fn element(
        &self,
        dom: &D,
        scope: &Scope,
        element: &D::Node,
        name: &SmolStr,
        params: Vec<Value>,
        hash: Vec<(SmolStr, Value)>,
    ) -> Result<(), RenderError>;
}

/// Renders one instantiation of a compiled template.
pub fn render_template<D, R>(
    template: &CompiledTemplate<D>,
    dom: &D,
    scope: &Scope,
    resolver: &R,
) -> Result<D::Node, RenderError>
where
    D: Dom,
    R: Resolver<D>,
{
    let fragment = template.instantiate(dom)?;
    let bindings = template.hydrate(dom, &fragment)?;

    for binding in bindings {
        match binding {
            Binding::Content {
                placeholder, call, ..
            } => match call {
                ContentKind::Ambiguous { path, escaped } => {
                    resolver.content(dom, scope, &placeholder, ContentCall::Ambiguous {
                        path: &path,
                        escaped,
                    })?;
                }
                ContentKind::Helper {
                    name,
                    params,
                    hash,
                    escaped,
                    programs,
                } => {
                    let params = eval_exprs(&params, dom, scope, resolver)?;
                    let hash = eval_hash(&hash, dom, scope, resolver)?;
                    // Generation-time validation already bounds-checked the
                    // child indices.
                    let programs = match programs {
                        Some(pair) => Programs {
                            primary: pair.primary.and_then(|index| template.child(index)),
                            inverse: pair.inverse.and_then(|index| template.child(index)),
                        },
                        None => Programs::none(),
                    };
                    resolver.content(dom, scope, &placeholder, ContentCall::Helper {
                        name: &name,
                        params,
                        hash,
                        escaped,
                        programs,
                    })?;
                }
            },
            Binding::Attribute {
                element,
                name,
                parts,
            } => {
                let parts = eval_exprs(&parts, dom, scope, resolver)?;
                resolver.attribute(dom, scope, &element, &name, parts)?;
            }
            Binding::ElementHelper {
                element,
                name,
                params,
                hash,
            } => {
                let params = eval_exprs(&params, dom, scope, resolver)?;
                let hash = eval_hash(&hash, dom, scope, resolver)?;
                resolver.element(dom, scope, &element, &name, params, hash)?;
            }
        }
    }

    Ok(fragment)
}

fn eval_expr<D, R>(expr: &Expr, dom: &D, scope: &Scope, resolver: &R) -> Result<Value, RenderError>
where
    D: Dom,
    R: Resolver<D>,
{
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => Ok(resolver.resolve(scope, path)),
        Expr::SubExpr { name, params, hash } => {
            let params = eval_exprs(params, dom, scope, resolver)?;
            let hash = eval_hash(hash, dom, scope, resolver)?;
            resolver.subexpr(dom, scope, name, params, hash)
        }
    }
}

fn eval_exprs<D, R>(
    exprs: &[Expr],
    dom: &D,
    scope: &Scope,
    resolver: &R,
) -> Result<Vec<Value>, RenderError>
where
    D: Dom,
    R: Resolver<D>,
{
    exprs
        .iter()
        .map(|expr| eval_expr(expr, dom, scope, resolver))
        .collect()
}

fn eval_hash<D, R>(
    hash: &[(SmolStr, Expr)],
    dom: &D,
    scope: &Scope,
    resolver: &R,
) -> Result<Vec<(SmolStr, Value)>, RenderError>
where
    D: Dom,
    R: Resolver<D>,
{
    hash.iter()
        .map(|(key, expr)| Ok((key.clone(), eval_expr(expr, dom, scope, resolver)?)))
        .collect()
}
