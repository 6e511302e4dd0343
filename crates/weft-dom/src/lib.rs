//! # weft-dom: node-creation capability for weft templates
//!
//! This crate defines the [`Dom`] trait, the abstract node-creation
//! capability consumed by compiled weft templates, together with
//! [`TreeDom`], an in-memory reference implementation used by the test
//! suites and by embedders that have no concrete rendering target.
//!
//! A build procedure only ever needs a handful of operations: create an
//! element by tag name, create a text node, create a document fragment,
//! set an attribute and append a child. Hydration additionally walks
//! children by index and deep-clones cached skeletons. Any rendering
//! target that can answer those operations can host weft templates.
//!
//! ## Quick start
//!
//! ```rust
//! use weft_dom::{Dom, TreeDom};
//!
//! let dom = TreeDom::new();
//! let fragment = dom.create_fragment();
//! let div = dom.create_element("div");
//! dom.set_attribute(&div, "class", "greeting");
//! dom.append_child(&div, &dom.create_text("Hello, world!"));
//! dom.append_child(&fragment, &div);
//!
//! assert_eq!(
//!     weft_dom::to_html(&fragment),
//!     "<div class=\"greeting\">Hello, world!</div>"
//! );
//! ```

use std::fmt;

mod node;

pub use node::{NodeHandle, NodeKind, TreeDom};

/// The node-creation capability consumed by build, hydrate and render.
///
/// `Node` is a cheap handle: cloning it yields another handle to the *same*
/// node, and equality is node identity. Structural duplication goes through
/// [`Dom::clone_tree`], which produces an independent tree whose nodes never
/// alias the original's.
pub trait Dom {
    type Node: Clone + PartialEq + fmt::Debug;

    /// Creates an empty document fragment, the root container of a built
    /// (but not yet attached) piece of structure.
    fn create_fragment(&self) -> Self::Node;

    /// Creates an element node with the given tag name.
    fn create_element(&self, tag: &str) -> Self::Node;

    /// Creates a text node. Serializers escape its content.
    fn create_text(&self, text: &str) -> Self::Node;

    /// Creates a raw markup node. Serializers emit its content verbatim;
    /// unescaped mustache output lands here.
    fn create_raw(&self, markup: &str) -> Self::Node;

    /// Creates a comment node. Compiled templates reserve one comment slot
    /// per dynamic content site.
    fn create_comment(&self, text: &str) -> Self::Node;

    /// Sets (or replaces) an attribute on an element node.
    fn set_attribute(&self, element: &Self::Node, name: &str, value: &str);

    /// Appends `child` as the last child of `parent`.
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);

    /// Returns the `index`th child of `parent`, if any.
    fn child_at(&self, parent: &Self::Node, index: usize) -> Option<Self::Node>;

    /// Deep-clones a subtree. The result shares no nodes with the original;
    /// mutating one never affects the other.
    fn clone_tree(&self, node: &Self::Node) -> Self::Node;

    /// Replaces `node` within its parent. Replacing with a fragment splices
    /// the fragment's children into the parent at the node's position.
    fn replace_with(&self, node: &Self::Node, replacement: &Self::Node);

    /// Overwrites the content of a text, raw or comment node.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Concatenated content of every text and raw node in the subtree.
    fn text_content(&self, node: &Self::Node) -> String;
}

/// Serializes a [`TreeDom`] subtree to HTML.
///
/// Text nodes and attribute values are escaped, raw nodes are emitted
/// verbatim, fragments serialize as their children.
pub fn to_html(node: &NodeHandle) -> String {
    let mut out = String::new();
    node.write_html(&mut out);
    out
}

/// Escapes `&`, `<`, `>` and `"` for embedding into markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a & b", "a &amp; b")]
    #[case("<tag>", "&lt;tag&gt;")]
    #[case("say \"hi\"", "say &quot;hi&quot;")]
    #[case("plain", "plain")]
    fn test_escape_html(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_html(input), expected);
    }
}
