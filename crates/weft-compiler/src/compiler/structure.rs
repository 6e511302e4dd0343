use smol_str::SmolStr;

use crate::error::CompileError;
use crate::opcode::{OpStack, StructureOp};

/// Emits the static-structure opcode stream for one template: everything
/// about the fragment that is fixed at compile time.
///
/// Attributes with any non-literal part are *not* emitted here; they belong
/// to the dynamic-binding pass. Dynamic content sites reserve exactly one
/// placeholder slot so the binding pass can address them.
#[derive(Debug)]
pub struct StructureCompiler {
    ops: OpStack<StructureOp>,
    depth: usize,
}

impl StructureCompiler {
    pub fn new() -> Self {
        let mut ops = OpStack::new();
        // Patched with the real child count when the template completes.
        ops.push(StructureOp::StartTemplate { child_count: 0 });
        StructureCompiler { ops, depth: 0 }
    }

    pub fn text(&mut self, value: &str) {
        self.ops.push(StructureOp::Text {
            value: value.to_string(),
        });
    }

    pub fn open_element(&mut self, tag: &SmolStr) {
        self.depth += 1;
        self.ops.push(StructureOp::OpenElement { tag: tag.clone() });
    }

    pub fn static_attribute(&mut self, name: &SmolStr, value: String) -> Result<(), CompileError> {
        if self.depth == 0 {
            return Err(CompileError::AttributeOutsideElement(name.clone()));
        }
        self.ops.push(StructureOp::StaticAttribute {
            name: name.clone(),
            value,
        });
        Ok(())
    }

    pub fn close_element(&mut self) -> Result<(), CompileError> {
        if self.depth == 0 {
            return Err(CompileError::UnbalancedElement);
        }
        self.depth -= 1;
        self.ops.push(StructureOp::CloseElement);
        Ok(())
    }

    /// Reserves one comment slot for a mustache or block insertion site.
    pub fn placeholder(&mut self) {
        self.ops.push(StructureOp::Placeholder);
    }

    /// Completes the stream: patches the start bracket with the child
    /// template count and appends the end bracket.
    pub fn finish(mut self, child_count: usize) -> Result<Vec<StructureOp>, CompileError> {
        if self.depth != 0 {
            return Err(CompileError::UnclosedElement(self.depth));
        }
        self.ops.push(StructureOp::EndTemplate);
        let mut ops = self.ops.into_vec();
        ops[0] = StructureOp::StartTemplate { child_count };
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_document_order_emission() {
        let mut compiler = StructureCompiler::new();
        compiler.open_element(&"div".into());
        compiler.static_attribute(&"class".into(), "note".into()).unwrap();
        compiler.text("Hello ");
        compiler.placeholder();
        compiler.close_element().unwrap();

        let ops = compiler.finish(0).unwrap();
        assert_eq!(
            ops,
            vec![
                StructureOp::StartTemplate { child_count: 0 },
                StructureOp::OpenElement { tag: "div".into() },
                StructureOp::StaticAttribute {
                    name: "class".into(),
                    value: "note".into()
                },
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
    fn test_empty_element_still_brackets() {
        let mut compiler = StructureCompiler::new();
        compiler.open_element(&"span".into());
        compiler.close_element().unwrap();
        let ops = compiler.finish(2).unwrap();
        assert_eq!(ops[0], StructureOp::StartTemplate { child_count: 2 });
        assert_eq!(ops[1], StructureOp::OpenElement { tag: "span".into() });
        assert_eq!(ops[2], StructureOp::CloseElement);
    }

    #[rstest]
    fn test_close_without_open_is_fatal() {
        let mut compiler = StructureCompiler::new();
        assert_eq!(compiler.close_element(), Err(CompileError::UnbalancedElement));
    }

    #[rstest]
    fn test_unclosed_element_is_fatal() {
        let mut compiler = StructureCompiler::new();
        compiler.open_element(&"div".into());
        assert_eq!(compiler.finish(0), Err(CompileError::UnclosedElement(1)));
    }

    #[rstest]
    fn test_attribute_outside_element_is_fatal() {
        let mut compiler = StructureCompiler::new();
        assert_eq!(
            compiler.static_attribute(&"id".into(), "x".into()),
            Err(CompileError::AttributeOutsideElement("id".into()))
        );
    }
}
