//! Compiler-internal intermediate representation.
//!
//! Two disjoint opcode vocabularies exist: [`StructureOp`] describes the
//! static DOM skeleton and [`BindingOp`] describes dynamic content. Both are
//! produced from one tree walk and share child-node indices, which is what
//! keeps the skeleton and the binding program in lock-step.

use std::fmt::{self, Display, Formatter};

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ast::{Literal, Path};

/// Generic LIFO container used by every compiler stage to assemble nested
/// instruction lists and operand stacks.
#[derive(Debug, Clone, PartialEq)]
pub struct OpStack<T> {
    items: Vec<T>,
}

impl<T> OpStack<T> {
    pub fn new() -> Self {
        OpStack { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for OpStack<T> {
    fn default() -> Self {
        OpStack::new()
    }
}

impl<T> Extend<T> for OpStack<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

/// An ordered list of child-node indices locating a DOM node relative to
/// the fragment root, valid identically against the statically-built
/// skeleton and any of its clones.
///
/// The address stamped on a dynamic site during the binding pass must match
/// the index the same structural position receives during the structure
/// pass. This index correspondence is the central invariant of the
/// pipeline.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address(SmallVec<[u32; 4]>);

impl Address {
    pub fn new() -> Self {
        Address::default()
    }

    pub fn from_indices(indices: impl IntoIterator<Item = u32>) -> Self {
        Address(indices.into_iter().collect())
    }

    pub fn push(&mut self, index: u32) {
        self.0.push(index);
    }

    pub fn pop(&mut self) -> Option<u32> {
        self.0.pop()
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for index in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", index)?;
            first = false;
        }
        Ok(())
    }
}

/// Static-structure opcodes: how to build the DOM skeleton, in document
/// order. Order within the stream mirrors execution order at build time.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureOp {
    /// Template bracket; `child_count` is the number of nested templates
    /// the matching binding stream references.
    StartTemplate { child_count: usize },
    EndTemplate,
    OpenElement { tag: SmolStr },
    CloseElement,
    /// An attribute whose value is a compile-time-constant string.
    StaticAttribute { name: SmolStr, value: String },
    Text { value: String },
    /// One reserved comment slot for a dynamic content site, so hydration
    /// can locate the insertion point by index.
    Placeholder,
}

/// Dynamic-binding opcodes. Push opcodes net one expression-stack value;
/// `PrepareArray`/`PrepareObject` combine popped values; the statement
/// opcodes (`Helper`, `Ambiguous`, `Attribute`, `NodeHelper`) consume their
/// operands and must leave the stack empty.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingOp {
    StartTemplate { child_count: usize },
    EndTemplate,
    PushLiteral { value: Literal },
    PushString { value: String },
    PushPath { path: Path },
    /// References to already-compiled child templates, by index into the
    /// owning template's children.
    PushProgram {
        primary: Option<usize>,
        inverse: Option<usize>,
    },
    /// Pops a prepared param array and hash object, nets one sub-expression
    /// value resolved at render time.
    PushSubExpr { name: SmolStr, arity: usize },
    /// Pops `len` values pushed in reverse declaration order; popping
    /// restores original order.
    PrepareArray { len: usize },
    /// Pops `pairs` key/value pairs pushed value-then-key in reverse
    /// declaration order.
    PrepareObject { pairs: usize },
    Helper {
        name: SmolStr,
        arity: usize,
        escaped: bool,
        address: Address,
        start: u32,
        end: u32,
    },
    /// A bare path with no arguments: property read or zero-arg helper
    /// call, only resolvable once helper registration is known.
    Ambiguous {
        path: Path,
        escaped: bool,
        address: Address,
        start: u32,
        end: u32,
    },
    Attribute {
        name: SmolStr,
        part_count: usize,
        address: Address,
    },
    /// An element modifier, invoked against the element at `address`.
    NodeHelper {
        name: SmolStr,
        arity: usize,
        address: Address,
    },
}

impl BindingOp {
    /// Short stable name for diagnostics.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            BindingOp::StartTemplate { .. } => "startTemplate",
            BindingOp::EndTemplate => "endTemplate",
            BindingOp::PushLiteral { .. } => "pushLiteral",
            BindingOp::PushString { .. } => "pushString",
            BindingOp::PushPath { .. } => "pushPath",
            BindingOp::PushProgram { .. } => "pushProgram",
            BindingOp::PushSubExpr { .. } => "pushSubExpr",
            BindingOp::PrepareArray { .. } => "prepareArray",
            BindingOp::PrepareObject { .. } => "prepareObject",
            BindingOp::Helper { .. } => "helper",
            BindingOp::Ambiguous { .. } => "ambiguous",
            BindingOp::Attribute { .. } => "attribute",
            BindingOp::NodeHelper { .. } => "nodeHelper",
        }
    }
}
