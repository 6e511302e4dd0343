//! Tree walker / orchestrator.
//!
//! One coordinated traversal feeds the static-structure and dynamic-binding
//! compilers per node and recursively compiles nested block branches into
//! child templates. The traversal uses an explicit stack of frames rather
//! than recursion through the visitor, which keeps nested-template
//! boundaries unambiguous: a block's branches are fully compiled before the
//! opcode that references them is emitted in the parent.

use smol_str::SmolStr;

use crate::ast::{Block, Element, Node};
use crate::codegen::build::BuildProgram;
use crate::codegen::hydrate::HydrateProgram;
use crate::error::CompileError;
use crate::template::CompiledTemplate;
use weft_dom::Dom;

pub mod binding;
pub mod known_helpers;
pub mod structure;

pub use binding::BindingCompiler;
pub use known_helpers::KnownHelpers;
pub use structure::StructureCompiler;

/// Compile-time configuration.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Names always classified as helpers, even with zero arguments.
    pub known_helpers: KnownHelpers,
    /// Yield names exposed to the component layer; the compiler carries
    /// them on the root template without consulting them.
    pub yield_names: Vec<SmolStr>,
    /// Named argument names exposed to the component layer.
    pub arg_names: Vec<SmolStr>,
}

/// Pending traversal work. Items are pushed in reverse so popping yields
/// document order; the close/finish markers fire after a node's children.
enum Work<'a> {
    Node(&'a Node),
    CloseElement(&'a Element),
    FinishBlock(&'a Block),
    OpenFrame {
        nodes: &'a [Node],
        block_params: &'a [SmolStr],
    },
}

/// One template under compilation: its work list, both opcode emitters and
/// the child templates completed so far.
struct Frame<'a, D: Dom> {
    work: Vec<Work<'a>>,
    structure: StructureCompiler,
    binding: BindingCompiler<'a>,
    children: Vec<CompiledTemplate<D>>,
    block_params: Vec<SmolStr>,
}

impl<'a, D: Dom> Frame<'a, D> {
    fn new(nodes: &'a [Node], block_params: &'a [SmolStr], known_helpers: &'a KnownHelpers) -> Self {
        let mut work = Vec::with_capacity(nodes.len());
        for node in nodes.iter().rev() {
            work.push(Work::Node(node));
        }
        Frame {
            work,
            structure: StructureCompiler::new(),
            binding: BindingCompiler::new(known_helpers),
            children: Vec::new(),
            block_params: block_params.to_vec(),
        }
    }

    fn finish(self) -> Result<CompiledTemplate<D>, CompileError> {
        let child_count = self.children.len();
        let build = BuildProgram::generate(self.structure.finish(child_count)?)?;
        let hydrate = HydrateProgram::generate(self.binding.finish(child_count)?, child_count)?;
        Ok(CompiledTemplate::new(
            build,
            hydrate,
            self.children,
            self.block_params,
        ))
    }
}

/// The pipeline entry point: drives the traversal and assembles the
/// resulting tree of compiled templates.
///
/// Compilation is a pure function of the syntax tree: no shared state
/// survives between calls, and compiling the same tree twice yields
/// structurally identical programs.
#[derive(Debug, Clone, Default)]
pub struct TemplateCompiler {
    options: CompileOptions,
}

impl TemplateCompiler {
    pub fn new() -> Self {
        TemplateCompiler::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        TemplateCompiler { options }
    }

    /// Compiles a root sequence of syntax nodes into one compiled template.
    pub fn compile<D: Dom>(&self, program: &[Node]) -> Result<CompiledTemplate<D>, CompileError> {
        let mut frames: Vec<Frame<'_, D>> =
            vec![Frame::new(program, &[], &self.options.known_helpers)];

        loop {
            let item = match frames.last_mut() {
                Some(frame) => frame.work.pop(),
                // The loop returns before the root frame is consumed.
                None => return Err(CompileError::MissingEndTemplate),
            };

            match item {
                None => {
                    let frame = match frames.pop() {
                        Some(frame) => frame,
                        None => return Err(CompileError::MissingEndTemplate),
                    };
                    let template = frame.finish()?;
                    match frames.last_mut() {
                        Some(parent) => parent.children.push(template),
                        None => {
                            return Ok(template
                                .with_interface(self.options.yield_names.clone(), self.options.arg_names.clone()));
                        }
                    }
                }
                Some(Work::OpenFrame { nodes, block_params }) => {
                    frames.push(Frame::new(nodes, block_params, &self.options.known_helpers));
                }
                Some(work) => {
                    let frame = match frames.last_mut() {
                        Some(frame) => frame,
                        None => return Err(CompileError::MissingEndTemplate),
                    };
                    Self::step(frame, work)?;
                }
            }
        }
    }

    fn step<'a, D: Dom>(frame: &mut Frame<'a, D>, work: Work<'a>) -> Result<(), CompileError> {
        match work {
            Work::Node(Node::Text(text)) => {
                frame.structure.text(text);
                frame.binding.text();
            }
            Work::Node(Node::Comment(_)) => {
                // Stripped from the output; occupies no child slot in
                // either pass, keeping indices in step.
            }
            Work::Node(Node::Mustache(mustache)) => {
                frame.structure.placeholder();
                frame.binding.mustache(mustache);
            }
            Work::Node(Node::Element(element)) => {
                frame.structure.open_element(&element.tag);
                for attribute in &element.attributes {
                    if attribute.is_static() {
                        frame
                            .structure
                            .static_attribute(&attribute.name, attribute.static_value())?;
                    }
                }
                frame.binding.enter_element();
                frame.work.push(Work::CloseElement(element));
                for child in element.children.iter().rev() {
                    frame.work.push(Work::Node(child));
                }
            }
            Work::CloseElement(element) => {
                // Dynamic attribute and modifier bindings are emitted after
                // the element's children, once its address is settled.
                for attribute in &element.attributes {
                    if !attribute.is_static() {
                        frame.binding.attribute(attribute);
                    }
                }
                for modifier in &element.modifiers {
                    frame.binding.node_helper(modifier);
                }
                frame.structure.close_element()?;
                frame.binding.leave_element()?;
            }
            Work::Node(Node::Block(block)) => {
                frame.work.push(Work::FinishBlock(block));
                frame.work.push(Work::OpenFrame {
                    nodes: &block.children,
                    block_params: &block.block_params,
                });
                // The inverse frame goes on top so it is compiled first;
                // both indices must exist before the call site is emitted.
                if let Some(inverse) = &block.inverse {
                    frame.work.push(Work::OpenFrame {
                        nodes: inverse,
                        block_params: &[],
                    });
                }
            }
            Work::FinishBlock(block) => {
                let available = frame.children.len();
                let primary = available
                    .checked_sub(1)
                    .ok_or(CompileError::UnknownChildTemplate { index: 0, available })?;
                let inverse = if block.inverse.is_some() {
                    Some(primary.checked_sub(1).ok_or(CompileError::UnknownChildTemplate {
                        index: 1,
                        available,
                    })?)
                } else {
                    None
                };
                frame.structure.placeholder();
                frame.binding.block(&block.call, Some(primary), inverse);
            }
            Work::OpenFrame { .. } => {
                // Handled by the caller before dispatching here.
                return Err(CompileError::MissingStartTemplate);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Attribute, Block, Element, Mustache, Param};
    use crate::opcode::{Address, BindingOp, StructureOp};
    use rstest::rstest;
    use weft_dom::TreeDom;

    fn hello_template() -> Vec<Node> {
        vec![
            Element::new("div")
                .child(Node::text("Hello "))
                .child(Node::mustache("name"))
                .into(),
        ]
    }

    fn if_template() -> Vec<Node> {
        vec![
            Block::new(
                Mustache::path("if").param(Param::path("cond")),
                vec![Element::new("b").child(Node::text("Yes")).into()],
            )
            .with_inverse(vec![Element::new("i").child(Node::text("No")).into()])
            .into(),
        ]
    }

    #[rstest]
    fn test_hello_structure_stream() {
        let template = TemplateCompiler::new()
            .compile::<TreeDom>(&hello_template())
            .unwrap();
        assert_eq!(
            template.build_program().ops(),
            &[
                StructureOp::StartTemplate { child_count: 0 },
                StructureOp::OpenElement { tag: "div".into() },
                StructureOp::Text {
                    value: "Hello ".into()
                },
                StructureOp::Placeholder,
                StructureOp::CloseElement,
                StructureOp::EndTemplate,
            ]
        );
    }

    #[rstest]
    fn test_hello_binding_stream() {
        let template = TemplateCompiler::new()
            .compile::<TreeDom>(&hello_template())
            .unwrap();
        assert_eq!(
            template.hydrate_program().ops(),
            &[
                BindingOp::StartTemplate { child_count: 0 },
                BindingOp::Ambiguous {
                    path: crate::ast::Path::parse("name"),
                    escaped: true,
                    address: Address::from_indices([0]),
                    start: 1,
                    end: 1,
                },
                BindingOp::EndTemplate,
            ]
        );
    }

    #[rstest]
    fn test_block_compiles_two_children() {
        let template = TemplateCompiler::new()
            .compile::<TreeDom>(&if_template())
            .unwrap();
        assert_eq!(template.children().len(), 2);

        // The inverse frame is compiled first, so it lands at index 0.
        let ops = template.hydrate_program().ops();
        assert!(ops.iter().any(|op| matches!(
            op,
            BindingOp::PushProgram {
                primary: Some(1),
                inverse: Some(0)
            }
        )));

        // Child addressing starts fresh at index 0 in each branch.
        let primary = template.child(1).unwrap();
        assert_eq!(
            primary.build_program().ops()[1],
            StructureOp::OpenElement { tag: "b".into() }
        );
        let inverse = template.child(0).unwrap();
        assert_eq!(
            inverse.build_program().ops()[1],
            StructureOp::OpenElement { tag: "i".into() }
        );
    }

    #[rstest]
    fn test_comments_reserve_no_slot() {
        let program = vec![
            Node::comment("ignored"),
            Node::text("a"),
            Node::mustache("b"),
        ];
        let template = TemplateCompiler::new().compile::<TreeDom>(&program).unwrap();
        // The mustache sits at child index 1: the comment emitted nothing.
        assert!(matches!(
            &template.hydrate_program().ops()[1],
            BindingOp::Ambiguous { start: 1, end: 1, .. }
        ));
    }

    #[rstest]
    fn test_dynamic_attribute_targets_element_address() {
        let program = vec![
            Element::new("a")
                .attr(Attribute::new(
                    "href",
                    vec![
                        crate::ast::AttrPart::Text("/users/".into()),
                        crate::ast::AttrPart::Mustache(Mustache::path("id")),
                    ],
                ))
                .into(),
        ];
        let template = TemplateCompiler::new().compile::<TreeDom>(&program).unwrap();
        let ops = template.hydrate_program().ops();
        assert!(ops.iter().any(|op| matches!(
            op,
            BindingOp::Attribute { name, part_count: 2, address }
                if name == "href" && *address == Address::from_indices([0])
        )));
    }

    #[rstest]
    fn test_compilation_is_idempotent() {
        let compiler = TemplateCompiler::new();
        let first = compiler.compile::<TreeDom>(&if_template()).unwrap();
        let second = compiler.compile::<TreeDom>(&if_template()).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_known_helper_extension() {
        let mut options = CompileOptions::default();
        options.known_helpers.register("t");
        let template = TemplateCompiler::with_options(options)
            .compile::<TreeDom>(&[Node::mustache("t")])
            .unwrap();
        assert!(template
            .hydrate_program()
            .ops()
            .iter()
            .any(|op| matches!(op, BindingOp::Helper { name, arity: 0, .. } if name == "t")));
    }
}
