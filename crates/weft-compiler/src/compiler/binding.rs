use smol_str::SmolStr;

use crate::ast::{AttrPart, Attribute, Mustache, Param};
use crate::compiler::known_helpers::KnownHelpers;
use crate::error::CompileError;
use crate::opcode::{Address, BindingOp, OpStack};

/// Emits the dynamic-binding opcode stream for one template.
///
/// Tracks a running child-index counter per nesting level so every dynamic
/// site is stamped with a positional address identical to the index the
/// same structural position receives from the structure pass.
///
/// Parameters and hash pairs are compiled in *reverse* declaration order:
/// the execution model is a pop-based stack, so the compile-time reversal
/// and the runtime pop-reversal cancel out. This is a load-bearing
/// convention, not a style choice.
#[derive(Debug)]
pub struct BindingCompiler<'k> {
    ops: OpStack<BindingOp>,
    address: Address,
    /// Child index at the current nesting level.
    index: u32,
    /// Saved indices of the enclosing levels, one per open element.
    enclosing: Vec<u32>,
    known_helpers: &'k KnownHelpers,
}

impl<'k> BindingCompiler<'k> {
    pub fn new(known_helpers: &'k KnownHelpers) -> Self {
        let mut ops = OpStack::new();
        // Patched with the real child count when the template completes.
        ops.push(BindingOp::StartTemplate { child_count: 0 });
        BindingCompiler {
            ops,
            address: Address::new(),
            index: 0,
            enclosing: Vec::new(),
            known_helpers,
        }
    }

    /// A literal text run occupies one child slot.
    pub fn text(&mut self) {
        self.index += 1;
    }

    /// Descends into an element: its index becomes an address segment and
    /// the child counter starts fresh for its content.
    pub fn enter_element(&mut self) {
        self.address.push(self.index);
        self.enclosing.push(self.index);
        self.index = 0;
    }

    /// `enclosing` and `address` grow and shrink together, so the two pops
    /// succeed or fail as one.
    pub fn leave_element(&mut self) -> Result<(), CompileError> {
        match (self.enclosing.pop(), self.address.pop()) {
            (Some(element_index), Some(_)) => {
                self.index = element_index + 1;
                Ok(())
            }
            _ => Err(CompileError::UnbalancedElement),
        }
    }

    /// A mustache in content position: one reserved slot, classified as
    /// helper (eagerly, when known or argument-bearing) or left ambiguous.
    pub fn mustache(&mut self, mustache: &Mustache) {
        let index = self.index;
        if mustache.is_simple() && !(mustache.path.is_simple() && self.known_helpers.contains(&mustache.path.name())) {
            self.ops.push(BindingOp::Ambiguous {
                path: mustache.path.clone(),
                escaped: mustache.escaped,
                address: self.address.clone(),
                start: index,
                end: index,
            });
        } else {
            self.push_invocation_operands(&mustache.params, &mustache.hash);
            self.ops.push(BindingOp::Helper {
                name: mustache.path.name(),
                arity: mustache.params.len(),
                escaped: mustache.escaped,
                address: self.address.clone(),
                start: index,
                end: index,
            });
        }
        self.index += 1;
    }

    /// A block call site: operands, then the program pair referencing the
    /// already-compiled branches, then the helper statement. The block
    /// occupies one reserved slot like any other content site.
    pub fn block(&mut self, call: &Mustache, primary: Option<usize>, inverse: Option<usize>) {
        let index = self.index;
        self.push_invocation_operands(&call.params, &call.hash);
        self.ops.push(BindingOp::PushProgram { primary, inverse });
        self.ops.push(BindingOp::Helper {
            name: call.path.name(),
            arity: call.params.len(),
            escaped: call.escaped,
            address: self.address.clone(),
            start: index,
            end: index,
        });
        self.index += 1;
    }

    /// An attribute with at least one non-literal part. The address is the
    /// element's own; parts are pushed in reverse order.
    pub fn attribute(&mut self, attribute: &Attribute) {
        for part in attribute.parts.iter().rev() {
            match part {
                AttrPart::Text(text) => self.ops.push(BindingOp::PushString {
                    value: text.clone(),
                }),
                AttrPart::Mustache(mustache) => self.push_attr_part(mustache),
            }
        }
        self.ops.push(BindingOp::Attribute {
            name: attribute.name.clone(),
            part_count: attribute.parts.len(),
            address: self.address.clone(),
        });
    }

    /// An element modifier, targeted at the element's own address.
    pub fn node_helper(&mut self, mustache: &Mustache) {
        self.push_invocation_operands(&mustache.params, &mustache.hash);
        self.ops.push(BindingOp::NodeHelper {
            name: mustache.path.name(),
            arity: mustache.params.len(),
            address: self.address.clone(),
        });
    }

    pub fn finish(mut self, child_count: usize) -> Result<Vec<BindingOp>, CompileError> {
        if !self.enclosing.is_empty() {
            return Err(CompileError::UnclosedElement(self.enclosing.len()));
        }
        self.ops.push(BindingOp::EndTemplate);
        let mut ops = self.ops.into_vec();
        ops[0] = BindingOp::StartTemplate { child_count };
        Ok(ops)
    }

    /// Hash pairs value-then-key in reverse declared order, combined by
    /// `PrepareObject`; then params in reverse order, combined by
    /// `PrepareArray`. Popping restores declaration order on both.
    fn push_invocation_operands(&mut self, params: &[Param], hash: &[(SmolStr, Param)]) {
        for (key, value) in hash.iter().rev() {
            self.push_param(value);
            self.ops.push(BindingOp::PushString {
                value: key.to_string(),
            });
        }
        self.ops.push(BindingOp::PrepareObject { pairs: hash.len() });
        for param in params.iter().rev() {
            self.push_param(param);
        }
        self.ops.push(BindingOp::PrepareArray { len: params.len() });
    }

    fn push_param(&mut self, param: &Param) {
        match param {
            Param::Literal(literal) => self.ops.push(BindingOp::PushLiteral {
                value: literal.clone(),
            }),
            Param::Path(path) => self.ops.push(BindingOp::PushPath { path: path.clone() }),
            Param::SubExpr(mustache) => self.push_subexpr(mustache),
        }
    }

    /// A mustache in expression position nets one stack value.
    fn push_subexpr(&mut self, mustache: &Mustache) {
        self.push_invocation_operands(&mustache.params, &mustache.hash);
        self.ops.push(BindingOp::PushSubExpr {
            name: mustache.path.name(),
            arity: mustache.params.len(),
        });
    }

    /// An attribute value part: a bare path resolves at render time, an
    /// argument-bearing mustache becomes a sub-expression.
    fn push_attr_part(&mut self, mustache: &Mustache) {
        if mustache.is_simple() && !(mustache.path.is_simple() && self.known_helpers.contains(&mustache.path.name())) {
            self.ops.push(BindingOp::PushPath {
                path: mustache.path.clone(),
            });
        } else {
            self.push_subexpr(mustache);
        }
    }
}
