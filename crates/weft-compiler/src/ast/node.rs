use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

/// A dot-separated property path, e.g. `user.name`.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub parts: Vec<SmolStr>,
}

impl Path {
    pub fn new(parts: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Path {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a dotted string into a path.
    pub fn parse(path: &str) -> Self {
        Path::new(path.split('.'))
    }

    /// True when the path is a bare, single-segment identifier, the only
    /// shape that can name a helper.
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// The helper name this path denotes when used in call position.
    pub fn name(&self) -> SmolStr {
        match self.parts.as_slice() {
            [single] => single.clone(),
            _ => SmolStr::new(self.to_string()),
        }
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// A compile-time-constant operand.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
}

/// A positional or named argument of a mustache invocation.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(Literal),
    Path(Path),
    /// A parenthesized nested invocation, resolved at render time.
    SubExpr(Box<Mustache>),
}

impl Param {
    pub fn string(value: impl Into<String>) -> Self {
        Param::Literal(Literal::String(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Param::Literal(Literal::Number(value))
    }

    pub fn bool(value: bool) -> Self {
        Param::Literal(Literal::Bool(value))
    }

    pub fn path(path: &str) -> Self {
        Param::Path(Path::parse(path))
    }
}

/// A `{{…}}` insertion: a path plus optional positional params and hash
/// pairs. `escaped` is false for triple-stache (`{{{…}}}`) output.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Mustache {
    pub path: Path,
    pub params: Vec<Param>,
    pub hash: Vec<(SmolStr, Param)>,
    pub escaped: bool,
}

impl Mustache {
    pub fn path(path: &str) -> Self {
        Mustache {
            path: Path::parse(path),
            params: Vec::new(),
            hash: Vec::new(),
            escaped: true,
        }
    }

    /// Marks this mustache as unescaped (`{{{…}}}`).
    pub fn unescaped(mut self) -> Self {
        self.escaped = false;
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn pair(mut self, key: impl Into<SmolStr>, value: Param) -> Self {
        self.hash.push((key.into(), value));
        self
    }

    /// True when the mustache carries no arguments at all; such a mustache
    /// is ambiguous between a property read and a zero-arg helper call.
    pub fn is_simple(&self) -> bool {
        self.params.is_empty() && self.hash.is_empty()
    }
}

/// One attribute of an element. An attribute whose parts are all literal
/// text is fixed at compile time; any mustache part makes it dynamic.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: SmolStr,
    pub parts: Vec<AttrPart>,
}

#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AttrPart {
    Text(String),
    Mustache(Mustache),
}

impl Attribute {
    pub fn new(name: impl Into<SmolStr>, parts: Vec<AttrPart>) -> Self {
        Attribute {
            name: name.into(),
            parts,
        }
    }

    /// A compile-time-constant attribute.
    pub fn text(name: impl Into<SmolStr>, value: impl Into<String>) -> Self {
        Attribute::new(name, vec![AttrPart::Text(value.into())])
    }

    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|part| matches!(part, AttrPart::Text(_)))
    }

    /// Concatenation of the literal parts; the static value when
    /// [`Attribute::is_static`] holds.
    pub fn static_value(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                AttrPart::Text(text) => Some(text.as_str()),
                AttrPart::Mustache(_) => None,
            })
            .collect()
    }
}

#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: SmolStr,
    pub attributes: Vec<Attribute>,
    /// Element helpers (`<div {{bind-attr …}}>`), invoked against the
    /// element node itself at render time.
    pub modifiers: Vec<Mustache>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<SmolStr>) -> Self {
        Element {
            tag: tag.into(),
            attributes: Vec::new(),
            modifiers: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn modifier(mut self, modifier: Mustache) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }
}

/// A block invocation: a helper call carrying a primary branch and an
/// optional inverse (`{{else}}`) branch, each compiled as an independent
/// child template.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub call: Mustache,
    pub children: Vec<Node>,
    pub inverse: Option<Vec<Node>>,
    /// Names bound by the block for its primary branch, e.g.
    /// `{{#each people as |person|}}`.
    pub block_params: Vec<SmolStr>,
}

impl Block {
    pub fn new(call: Mustache, children: Vec<Node>) -> Self {
        Block {
            call,
            children,
            inverse: None,
            block_params: Vec::new(),
        }
    }

    pub fn with_inverse(mut self, inverse: Vec<Node>) -> Self {
        self.inverse = Some(inverse);
        self
    }

    pub fn with_block_params(mut self, params: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.block_params = params.into_iter().map(Into::into).collect();
        self
    }
}

/// One node of the template syntax tree.
#[cfg_attr(feature = "ast-json", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(Element),
    Mustache(Mustache),
    Block(Block),
    Comment(String),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn mustache(path: &str) -> Self {
        Node::Mustache(Mustache::path(path))
    }

    pub fn comment(value: impl Into<String>) -> Self {
        Node::Comment(value.into())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Mustache> for Node {
    fn from(mustache: Mustache) -> Self {
        Node::Mustache(mustache)
    }
}

impl From<Block> for Node {
    fn from(block: Block) -> Self {
        Node::Block(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("name", vec!["name"])]
    #[case("user.name", vec!["user", "name"])]
    fn test_path_parse(#[case] input: &str, #[case] parts: Vec<&str>) {
        let path = Path::parse(input);
        assert_eq!(path.parts, parts);
        assert_eq!(path.to_string(), input);
        assert_eq!(path.is_simple(), parts.len() == 1);
    }

    #[rstest]
    fn test_static_attribute_classification() {
        let fixed = Attribute::new(
            "class",
            vec![AttrPart::Text("btn ".into()), AttrPart::Text("large".into())],
        );
        assert!(fixed.is_static());
        assert_eq!(fixed.static_value(), "btn large");

        let bound = Attribute::new(
            "href",
            vec![
                AttrPart::Text("/users/".into()),
                AttrPart::Mustache(Mustache::path("id")),
            ],
        );
        assert!(!bound.is_static());
    }

    #[rstest]
    fn test_mustache_simplicity() {
        assert!(Mustache::path("name").is_simple());
        assert!(!Mustache::path("join").param(Param::path("a")).is_simple());
        assert!(!Mustache::path("link").pair("target", Param::string("_blank")).is_simple());
    }
}
