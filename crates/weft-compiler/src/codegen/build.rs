use crate::error::CompileError;
use crate::opcode::StructureOp;
use weft_dom::Dom;

/// The build procedure: reconstructs the static skeleton described by a
/// structure opcode stream.
///
/// The stream is validated once at generation time, so a `BuildProgram` in
/// hand is known to be balanced. Running it constructs the exact tree shape
/// the opcodes imply and returns the completed fragment root. The owning
/// template caches the first result and clones it for every later
/// instantiation; the shape is compile-time-invariant, so rebuilding would
/// only repeat work.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildProgram {
    ops: Vec<StructureOp>,
}

impl BuildProgram {
    /// Validates bracket and nesting balance and wraps the stream.
    pub fn generate(ops: Vec<StructureOp>) -> Result<Self, CompileError> {
        match ops.first() {
            Some(StructureOp::StartTemplate { .. }) => {}
            _ => return Err(CompileError::MissingStartTemplate),
        }
        match ops.last() {
            Some(StructureOp::EndTemplate) => {}
            _ => return Err(CompileError::MissingEndTemplate),
        }

        let mut depth = 0usize;
        for op in &ops[1..ops.len() - 1] {
            match op {
                StructureOp::OpenElement { .. } => depth += 1,
                StructureOp::CloseElement => {
                    depth = depth.checked_sub(1).ok_or(CompileError::UnbalancedElement)?;
                }
                StructureOp::StaticAttribute { name, .. } if depth == 0 => {
                    return Err(CompileError::AttributeOutsideElement(name.clone()));
                }
                StructureOp::StartTemplate { .. } | StructureOp::EndTemplate => {
                    return Err(CompileError::MisplacedTemplateBracket);
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(CompileError::UnclosedElement(depth));
        }
        Ok(BuildProgram { ops })
    }

    /// Runs the program against a node-creation capability.
    ///
    /// Nodes are attached to their parent in the reverse order they were
    /// opened: an element receives its children while it is the innermost
    /// open node and joins its own parent when closed.
    pub fn run<D: Dom>(&self, dom: &D) -> Result<D::Node, CompileError> {
        let mut open: Vec<D::Node> = vec![dom.create_fragment()];

        for op in &self.ops {
            match op {
                StructureOp::StartTemplate { .. } | StructureOp::EndTemplate => {}
                StructureOp::OpenElement { tag } => {
                    open.push(dom.create_element(tag));
                }
                StructureOp::CloseElement => {
                    let element = open.pop().ok_or(CompileError::UnbalancedElement)?;
                    let parent = open.last().ok_or(CompileError::UnbalancedElement)?;
                    dom.append_child(parent, &element);
                }
                StructureOp::StaticAttribute { name, value } => {
                    if open.len() < 2 {
                        return Err(CompileError::AttributeOutsideElement(name.clone()));
                    }
                    let element = open.last().ok_or(CompileError::UnbalancedElement)?;
                    dom.set_attribute(element, name, value);
                }
                StructureOp::Text { value } => {
                    let parent = open.last().ok_or(CompileError::UnbalancedElement)?;
                    dom.append_child(parent, &dom.create_text(value));
                }
                StructureOp::Placeholder => {
                    let parent = open.last().ok_or(CompileError::UnbalancedElement)?;
                    dom.append_child(parent, &dom.create_comment(""));
                }
            }
        }

        match (open.pop(), open.is_empty()) {
            (Some(fragment), true) => Ok(fragment),
            _ => Err(CompileError::UnclosedElement(open.len())),
        }
    }

    pub fn ops(&self) -> &[StructureOp] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use weft_dom::{Dom, TreeDom, to_html};

    fn bracketed(body: Vec<StructureOp>) -> Vec<StructureOp> {
        let mut ops = vec![StructureOp::StartTemplate { child_count: 0 }];
        ops.extend(body);
        ops.push(StructureOp::EndTemplate);
        ops
    }

    #[rstest]
    fn test_build_reconstructs_tree_shape() {
        let program = BuildProgram::generate(bracketed(vec![
            StructureOp::OpenElement { tag: "div".into() },
            StructureOp::StaticAttribute {
                name: "class".into(),
                value: "note".into(),
            },
            StructureOp::Text {
                value: "Hello ".into(),
            },
            StructureOp::Placeholder,
            StructureOp::OpenElement { tag: "b".into() },
            StructureOp::Text { value: "!".into() },
            StructureOp::CloseElement,
            StructureOp::CloseElement,
        ]))
        .unwrap();

        let dom = TreeDom::new();
        let fragment = program.run(&dom).unwrap();
        assert_eq!(
            to_html(&fragment),
            "<div class=\"note\">Hello <!----><b>!</b></div>"
        );
    }

    #[rstest]
    fn test_empty_template_builds_empty_fragment() {
        let program = BuildProgram::generate(bracketed(vec![])).unwrap();
        let dom = TreeDom::new();
        let fragment = program.run(&dom).unwrap();
        assert_eq!(to_html(&fragment), "");
        assert_eq!(dom.fragments_created(), 1);
    }

    #[rstest]
    fn test_missing_brackets_are_rejected() {
        assert_eq!(
            BuildProgram::generate(vec![StructureOp::EndTemplate]),
            Err(CompileError::MissingStartTemplate)
        );
        assert_eq!(
            BuildProgram::generate(vec![StructureOp::StartTemplate { child_count: 0 }]),
            Err(CompileError::MissingEndTemplate)
        );
    }

    #[rstest]
    fn test_unbalanced_close_is_rejected() {
        assert_eq!(
            BuildProgram::generate(bracketed(vec![StructureOp::CloseElement])),
            Err(CompileError::UnbalancedElement)
        );
    }

    #[rstest]
    fn test_unclosed_open_is_rejected() {
        assert_eq!(
            BuildProgram::generate(bracketed(vec![StructureOp::OpenElement {
                tag: "div".into()
            }])),
            Err(CompileError::UnclosedElement(1))
        );
    }

    #[rstest]
    fn test_attribute_on_fragment_root_is_rejected() {
        assert_eq!(
            BuildProgram::generate(bracketed(vec![StructureOp::StaticAttribute {
                name: "id".into(),
                value: "x".into(),
            }])),
            Err(CompileError::AttributeOutsideElement("id".into()))
        );
    }

    #[rstest]
    fn test_nested_bracket_is_rejected() {
        assert_eq!(
            BuildProgram::generate(bracketed(vec![StructureOp::StartTemplate {
                child_count: 0
            }])),
            Err(CompileError::MisplacedTemplateBracket)
        );
    }
}
