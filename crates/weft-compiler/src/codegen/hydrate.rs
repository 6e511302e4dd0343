use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::ast::{Literal, Path};
use crate::error::{CompileError, HydrateError};
use crate::opcode::{Address, BindingOp, OpStack};
use crate::value::Value;
use weft_dom::Dom;

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(*n),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

/// One pending operand expression, carried unresolved inside a binding
/// descriptor until the renderer evaluates it against a context.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Path),
    SubExpr {
        name: SmolStr,
        params: Vec<Expr>,
        hash: Vec<(SmolStr, Expr)>,
    },
}

/// Child-template references attached to a block invocation, by index into
/// the owning template's children.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramPair {
    pub primary: Option<usize>,
    pub inverse: Option<usize>,
}

/// What to insert at a reserved content slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    /// A bare path: property read or zero-arg helper call, decided by the
    /// resolver once helper registration is known. Registering a helper
    /// whose name collides with a context property changes which one wins;
    /// that ambiguity is by contract, not an oversight.
    Ambiguous { path: Path, escaped: bool },
    Helper {
        name: SmolStr,
        params: Vec<Expr>,
        hash: Vec<(SmolStr, Expr)>,
        escaped: bool,
        programs: Option<ProgramPair>,
    },
}

/// One binding descriptor: a correctly-targeted, correctly-ordered record
/// of what to bind. Resolving it into a live DOM effect is the renderer's
/// job, not the compiler's.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<N> {
    Content {
        parent: N,
        placeholder: N,
        start: u32,
        end: u32,
        call: ContentKind,
    },
    Attribute {
        element: N,
        name: SmolStr,
        parts: Vec<Expr>,
    },
    ElementHelper {
        element: N,
        name: SmolStr,
        params: Vec<Expr>,
        hash: Vec<(SmolStr, Expr)>,
    },
}

/// Expression-stack value kinds, used to simulate execution at generation
/// time. The simulation enforces the per-statement discipline: every
/// statement opcode must leave the stack exactly empty.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SimValue {
    Value,
    Array(usize),
    Object,
    Program,
}

impl SimValue {
    fn name(self) -> &'static str {
        match self {
            SimValue::Value => "value",
            SimValue::Array(_) => "array",
            SimValue::Object => "object",
            SimValue::Program => "program",
        }
    }
}

/// A transient expression-stack value during a hydrate run.
#[derive(Debug, Clone)]
enum StackValue {
    Expr(Expr),
    Array(Vec<Expr>),
    Object(Vec<(SmolStr, Expr)>),
    Program(ProgramPair),
}

/// The hydrate procedure: walks a concrete DOM clone by positional address
/// and emits the ordered binding descriptor list.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrateProgram {
    ops: Vec<BindingOp>,
    child_count: usize,
}

impl HydrateProgram {
    /// Validates the stream by simulating the expression stack, then wraps
    /// it. A stack that fails to return to empty after a statement opcode
    /// is a compiler bug, caught here rather than at render time.
    pub fn generate(ops: Vec<BindingOp>, child_count: usize) -> Result<Self, CompileError> {
        match ops.first() {
            Some(BindingOp::StartTemplate { .. }) => {}
            _ => return Err(CompileError::MissingStartTemplate),
        }
        match ops.last() {
            Some(BindingOp::EndTemplate) => {}
            _ => return Err(CompileError::MissingEndTemplate),
        }

        let mut sim: Vec<SimValue> = Vec::new();
        for op in &ops[1..ops.len() - 1] {
            Self::simulate(op, &mut sim, child_count)?;
        }
        if !sim.is_empty() {
            return Err(CompileError::UnbalancedStack {
                opcode: "endTemplate",
                found: sim.len(),
            });
        }
        Ok(HydrateProgram { ops, child_count })
    }

    fn simulate(op: &BindingOp, sim: &mut Vec<SimValue>, child_count: usize) -> Result<(), CompileError> {
        let opcode = op.name();
        match op {
            BindingOp::StartTemplate { .. } | BindingOp::EndTemplate => {
                return Err(CompileError::MisplacedTemplateBracket);
            }
            BindingOp::PushLiteral { .. } | BindingOp::PushString { .. } | BindingOp::PushPath { .. } => {
                sim.push(SimValue::Value);
            }
            BindingOp::PushProgram { primary, inverse } => {
                for index in [primary, inverse].into_iter().flatten() {
                    if *index >= child_count {
                        return Err(CompileError::UnknownChildTemplate {
                            index: *index,
                            available: child_count,
                        });
                    }
                }
                sim.push(SimValue::Program);
            }
            BindingOp::PushSubExpr { name, arity } => {
                Self::sim_take_args(sim, opcode, name, *arity)?;
                sim.push(SimValue::Value);
            }
            BindingOp::PrepareArray { len } => {
                for _ in 0..*len {
                    Self::sim_pop_value(sim, opcode)?;
                }
                sim.push(SimValue::Array(*len));
            }
            BindingOp::PrepareObject { pairs } => {
                for _ in 0..*pairs * 2 {
                    Self::sim_pop_value(sim, opcode)?;
                }
                sim.push(SimValue::Object);
            }
            BindingOp::Helper { name, arity, .. } => {
                if sim.last() == Some(&SimValue::Program) {
                    sim.pop();
                }
                Self::sim_take_args(sim, opcode, name, *arity)?;
                Self::sim_expect_empty(sim, opcode)?;
            }
            BindingOp::Ambiguous { .. } => {
                Self::sim_expect_empty(sim, opcode)?;
            }
            BindingOp::Attribute { part_count, .. } => {
                for _ in 0..*part_count {
                    Self::sim_pop_value(sim, opcode)?;
                }
                Self::sim_expect_empty(sim, opcode)?;
            }
            BindingOp::NodeHelper { name, arity, .. } => {
                Self::sim_take_args(sim, opcode, name, *arity)?;
                Self::sim_expect_empty(sim, opcode)?;
            }
        }
        Ok(())
    }

    fn sim_pop(sim: &mut Vec<SimValue>, opcode: &'static str) -> Result<SimValue, CompileError> {
        sim.pop().ok_or(CompileError::StackUnderflow(opcode))
    }

    fn sim_pop_value(sim: &mut Vec<SimValue>, opcode: &'static str) -> Result<(), CompileError> {
        match Self::sim_pop(sim, opcode)? {
            SimValue::Value => Ok(()),
            other => Err(CompileError::UnexpectedOperand {
                opcode,
                expected: "value",
                found: other.name(),
            }),
        }
    }

    /// Pops the prepared param array and hash object of an invocation.
    fn sim_take_args(
        sim: &mut Vec<SimValue>,
        opcode: &'static str,
        name: &SmolStr,
        arity: usize,
    ) -> Result<(), CompileError> {
        match Self::sim_pop(sim, opcode)? {
            SimValue::Array(len) if len == arity => {}
            SimValue::Array(len) => {
                return Err(CompileError::ArityMismatch {
                    name: name.clone(),
                    expected: arity,
                    found: len,
                });
            }
            other => {
                return Err(CompileError::UnexpectedOperand {
                    opcode,
                    expected: "array",
                    found: other.name(),
                });
            }
        }
        match Self::sim_pop(sim, opcode)? {
            SimValue::Object => Ok(()),
            other => Err(CompileError::UnexpectedOperand {
                opcode,
                expected: "object",
                found: other.name(),
            }),
        }
    }

    fn sim_expect_empty(sim: &[SimValue], opcode: &'static str) -> Result<(), CompileError> {
        if sim.is_empty() {
            Ok(())
        } else {
            Err(CompileError::UnbalancedStack {
                opcode,
                found: sim.len(),
            })
        }
    }

    /// Runs the program against a concrete fragment clone.
    ///
    /// Addresses resolve from the fragment root by repeated child lookup; a
    /// per-run memo table keeps shared addresses from being re-walked.
    pub fn run<D: Dom>(&self, dom: &D, fragment: &D::Node) -> Result<Vec<Binding<D::Node>>, HydrateError> {
        let mut stack: OpStack<StackValue> = OpStack::new();
        let mut memo: FxHashMap<Address, D::Node> = FxHashMap::default();
        let mut bindings = Vec::new();

        for op in &self.ops {
            let opcode = op.name();
            match op {
                BindingOp::StartTemplate { .. } | BindingOp::EndTemplate => {}
                BindingOp::PushLiteral { value } => {
                    stack.push(StackValue::Expr(Expr::Literal(value.into())));
                }
                BindingOp::PushString { value } => {
                    stack.push(StackValue::Expr(Expr::Literal(Value::String(value.clone()))));
                }
                BindingOp::PushPath { path } => {
                    stack.push(StackValue::Expr(Expr::Path(path.clone())));
                }
                BindingOp::PushProgram { primary, inverse } => {
                    stack.push(StackValue::Program(ProgramPair {
                        primary: *primary,
                        inverse: *inverse,
                    }));
                }
                BindingOp::PushSubExpr { name, arity: _ } => {
                    let params = Self::pop_array(&mut stack, opcode)?;
                    let hash = Self::pop_object(&mut stack, opcode)?;
                    stack.push(StackValue::Expr(Expr::SubExpr {
                        name: name.clone(),
                        params,
                        hash,
                    }));
                }
                BindingOp::PrepareArray { len } => {
                    // Operands were pushed in reverse declaration order;
                    // popping restores the original order.
                    let mut items = Vec::with_capacity(*len);
                    for _ in 0..*len {
                        items.push(Self::pop_expr(&mut stack, opcode)?);
                    }
                    stack.push(StackValue::Array(items));
                }
                BindingOp::PrepareObject { pairs } => {
                    let mut entries = Vec::with_capacity(*pairs);
                    for _ in 0..*pairs {
                        let key = match Self::pop_expr(&mut stack, opcode)? {
                            Expr::Literal(Value::String(key)) => SmolStr::new(key),
                            _ => {
                                return Err(CompileError::UnexpectedOperand {
                                    opcode,
                                    expected: "string key",
                                    found: "value",
                                }
                                .into());
                            }
                        };
                        let value = Self::pop_expr(&mut stack, opcode)?;
                        entries.push((key, value));
                    }
                    stack.push(StackValue::Object(entries));
                }
                BindingOp::Helper {
                    name,
                    arity: _,
                    escaped,
                    address,
                    start,
                    end,
                } => {
                    let programs = match stack.last() {
                        Some(StackValue::Program(_)) => match stack.pop() {
                            Some(StackValue::Program(pair)) => Some(pair),
                            _ => None,
                        },
                        _ => None,
                    };
                    let params = Self::pop_array(&mut stack, opcode)?;
                    let hash = Self::pop_object(&mut stack, opcode)?;
                    let (parent, placeholder) = Self::locate(dom, fragment, &mut memo, address, *start)?;
                    bindings.push(Binding::Content {
                        parent,
                        placeholder,
                        start: *start,
                        end: *end,
                        call: ContentKind::Helper {
                            name: name.clone(),
                            params,
                            hash,
                            escaped: *escaped,
                            programs,
                        },
                    });
                }
                BindingOp::Ambiguous {
                    path,
                    escaped,
                    address,
                    start,
                    end,
                } => {
                    let (parent, placeholder) = Self::locate(dom, fragment, &mut memo, address, *start)?;
                    bindings.push(Binding::Content {
                        parent,
                        placeholder,
                        start: *start,
                        end: *end,
                        call: ContentKind::Ambiguous {
                            path: path.clone(),
                            escaped: *escaped,
                        },
                    });
                }
                BindingOp::Attribute {
                    name,
                    part_count,
                    address,
                } => {
                    let mut parts = Vec::with_capacity(*part_count);
                    for _ in 0..*part_count {
                        parts.push(Self::pop_expr(&mut stack, opcode)?);
                    }
                    let element = Self::node_at(dom, fragment, &mut memo, address)?;
                    bindings.push(Binding::Attribute {
                        element,
                        name: name.clone(),
                        parts,
                    });
                }
                BindingOp::NodeHelper { name, arity: _, address } => {
                    let params = Self::pop_array(&mut stack, opcode)?;
                    let hash = Self::pop_object(&mut stack, opcode)?;
                    let element = Self::node_at(dom, fragment, &mut memo, address)?;
                    bindings.push(Binding::ElementHelper {
                        element,
                        name: name.clone(),
                        params,
                        hash,
                    });
                }
            }
        }

        Ok(bindings)
    }

    pub fn ops(&self) -> &[BindingOp] {
        &self.ops
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    fn pop(stack: &mut OpStack<StackValue>, opcode: &'static str) -> Result<StackValue, HydrateError> {
        stack
            .pop()
            .ok_or_else(|| CompileError::StackUnderflow(opcode).into())
    }

    fn pop_expr(stack: &mut OpStack<StackValue>, opcode: &'static str) -> Result<Expr, HydrateError> {
        match Self::pop(stack, opcode)? {
            StackValue::Expr(expr) => Ok(expr),
            other => Err(Self::operand_error(opcode, "value", &other)),
        }
    }

    fn pop_array(stack: &mut OpStack<StackValue>, opcode: &'static str) -> Result<Vec<Expr>, HydrateError> {
        match Self::pop(stack, opcode)? {
            StackValue::Array(items) => Ok(items),
            other => Err(Self::operand_error(opcode, "array", &other)),
        }
    }

    fn pop_object(
        stack: &mut OpStack<StackValue>,
        opcode: &'static str,
    ) -> Result<Vec<(SmolStr, Expr)>, HydrateError> {
        match Self::pop(stack, opcode)? {
            StackValue::Object(entries) => Ok(entries),
            other => Err(Self::operand_error(opcode, "object", &other)),
        }
    }

    fn operand_error(opcode: &'static str, expected: &'static str, found: &StackValue) -> HydrateError {
        let found = match found {
            StackValue::Expr(_) => "value",
            StackValue::Array(_) => "array",
            StackValue::Object(_) => "object",
            StackValue::Program(_) => "program",
        };
        CompileError::UnexpectedOperand {
            opcode,
            expected,
            found,
        }
        .into()
    }

    /// Resolves a content site: the parent element by address, then the
    /// reserved placeholder at the range start.
    fn locate<D: Dom>(
        dom: &D,
        root: &D::Node,
        memo: &mut FxHashMap<Address, D::Node>,
        address: &Address,
        start: u32,
    ) -> Result<(D::Node, D::Node), HydrateError> {
        let parent = Self::node_at(dom, root, memo, address)?;
        let placeholder = dom
            .child_at(&parent, start as usize)
            .ok_or(HydrateError::MissingPlaceholder { index: start })?;
        Ok((parent, placeholder))
    }

    fn node_at<D: Dom>(
        dom: &D,
        root: &D::Node,
        memo: &mut FxHashMap<Address, D::Node>,
        address: &Address,
    ) -> Result<D::Node, HydrateError> {
        if let Some(node) = memo.get(address) {
            return Ok(node.clone());
        }
        let mut node = root.clone();
        for index in address.indices() {
            node = dom
                .child_at(&node, index as usize)
                .ok_or_else(|| HydrateError::AddressOutOfRange {
                    address: address.to_string(),
                    index,
                })?;
        }
        memo.insert(address.clone(), node.clone());
        Ok(node)
    }
}
