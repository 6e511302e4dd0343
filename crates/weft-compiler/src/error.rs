use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

type OpcodeName = &'static str;
type HelperName = SmolStr;

/// Structural errors raised while walking the syntax tree or validating the
/// opcode streams. Every one of these is a programming-invariant violation:
/// fatal, never retried, surfaced with the offending construct.
#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("close element without a matching open")]
    UnbalancedElement,
    #[error("template completed with {0} unclosed element(s)")]
    UnclosedElement(usize),
    #[error("static attribute \"{0}\" emitted outside an open element")]
    AttributeOutsideElement(SmolStr),
    #[error("opcode stream is missing its start-template bracket")]
    MissingStartTemplate,
    #[error("opcode stream is missing its end-template bracket")]
    MissingEndTemplate,
    #[error("template bracket in the middle of an opcode stream")]
    MisplacedTemplateBracket,
    #[error("expression stack underflow at \"{0}\"")]
    StackUnderflow(OpcodeName),
    #[error("expression stack holds {found} value(s) after \"{opcode}\", expected none")]
    UnbalancedStack { opcode: OpcodeName, found: usize },
    #[error("\"{opcode}\" popped a {found} operand where {expected} was expected")]
    UnexpectedOperand {
        opcode: OpcodeName,
        expected: OpcodeName,
        found: OpcodeName,
    },
    #[error("helper \"{name}\" declares arity {expected} but {found} param(s) were prepared")]
    ArityMismatch {
        name: HelperName,
        expected: usize,
        found: usize,
    },
    #[error("child template index {index} out of range, {available} available")]
    UnknownChildTemplate { index: usize, available: usize },
}

/// Errors raised while executing a build or hydrate program against a
/// concrete fragment. With generate-time validation in place these indicate
/// a skeleton/binding mismatch, the broken form of index correspondence.
#[derive(Error, Debug, PartialEq)]
pub enum HydrateError {
    #[error("positional address [{address}] walked past index {index}")]
    AddressOutOfRange { address: String, index: u32 },
    #[error("no reserved placeholder at child index {index}")]
    MissingPlaceholder { index: u32 },
    #[error(transparent)]
    Invariant(#[from] CompileError),
}

/// Errors raised while resolving binding descriptors at render time. The
/// compiler never validates that referenced helper names exist; unknown
/// names surface here.
#[derive(Error, Debug, PartialEq)]
pub enum RenderError {
    #[error("\"{0}\" is not defined")]
    UnknownHelper(HelperName),
    #[error("invalid arguments for \"{name}\": {message}")]
    InvalidArguments { name: HelperName, message: String },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Hydrate(#[from] HydrateError),
}

/// Top-level error for the whole pipeline.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Hydrate(#[from] HydrateError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self {
            Error::Compile(_) => "weft::compile",
            Error::Hydrate(_) => "weft::hydrate",
            Error::Render(_) => "weft::render",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            Error::Compile(_) | Error::Hydrate(_) => Some(Box::new(
                "this is a compiler invariant violation; compilation is \
                 deterministic, so re-running will not help. Please report it",
            )),
            Error::Render(RenderError::UnknownHelper(_)) => Some(Box::new(
                "register the helper on the resolver before rendering",
            )),
            Error::Render(_) => None,
        }
    }
}
