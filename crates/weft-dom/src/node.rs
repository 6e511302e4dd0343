//! In-memory reference DOM backed by reference-counted node handles.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::{Dom, escape_html};

/// Tags that serialize without a closing pair.
const VOID_ELEMENTS: [&str; 8] = ["area", "br", "col", "embed", "hr", "img", "input", "meta"];

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Fragment,
    Element {
        tag: SmolStr,
        attributes: Vec<(SmolStr, String)>,
    },
    Text(String),
    Raw(String),
    Comment(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    children: Vec<NodeHandle>,
    parent: Option<Weak<RefCell<NodeData>>>,
}

/// A cheap handle to a [`TreeDom`] node.
///
/// Cloning a handle yields another handle to the same node; equality is
/// node identity, so two structurally identical trees never compare equal.
#[derive(Clone)]
pub struct NodeHandle(Rc<RefCell<NodeData>>);

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        write!(f, "NodeHandle({:?}, {} children)", data.kind, data.children.len())
    }
}

impl NodeHandle {
    fn new(kind: NodeKind) -> Self {
        NodeHandle(Rc::new(RefCell::new(NodeData {
            kind,
            children: Vec::new(),
            parent: None,
        })))
    }

    /// The kind of this node, cloned out of the handle.
    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind.clone()
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// The value of attribute `name`, if this is an element that carries it.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.clone()),
            _ => None,
        }
    }

    /// True for comment nodes, the reserved slots of dynamic content sites.
    pub fn is_comment(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Comment(_))
    }

    fn deep_clone(&self) -> NodeHandle {
        let data = self.0.borrow();
        let clone = NodeHandle::new(data.kind.clone());
        for child in &data.children {
            let child_clone = child.deep_clone();
            child_clone.0.borrow_mut().parent = Some(Rc::downgrade(&clone.0));
            clone.0.borrow_mut().children.push(child_clone);
        }
        clone
    }

    pub(crate) fn write_html(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Fragment => {
                for child in &data.children {
                    child.write_html(out);
                }
            }
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                if !attributes.is_empty() {
                    out.push(' ');
                    let attrs = attributes
                        .iter()
                        .map(|(name, value)| format!("{}=\"{}\"", name, escape_html(value)))
                        .join(" ");
                    out.push_str(&attrs);
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &data.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&escape_html(text)),
            NodeKind::Raw(markup) => out.push_str(markup),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }

    fn collect_text(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) | NodeKind::Raw(text) => out.push_str(text),
            _ => {}
        }
        for child in &data.children {
            child.collect_text(out);
        }
    }
}

/// In-memory [`Dom`] implementation.
///
/// Carries creation counters so callers can observe how often the
/// underlying constructors ran; the build-once contract of compiled
/// templates is asserted against exactly these numbers.
///
/// # Examples
///
/// ```rust
/// use weft_dom::{Dom, TreeDom};
///
/// let dom = TreeDom::new();
/// let el = dom.create_element("p");
/// dom.append_child(&el, &dom.create_text("hi"));
/// assert_eq!(dom.elements_created(), 1);
/// assert_eq!(dom.text_content(&el), "hi");
/// ```
#[derive(Debug, Default)]
pub struct TreeDom {
    elements_created: Cell<usize>,
    fragments_created: Cell<usize>,
    texts_created: Cell<usize>,
}

impl TreeDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements constructed through [`Dom::create_element`]. Deep clones do
    /// not count; only genuine constructor calls do.
    pub fn elements_created(&self) -> usize {
        self.elements_created.get()
    }

    /// Fragments constructed through [`Dom::create_fragment`].
    pub fn fragments_created(&self) -> usize {
        self.fragments_created.get()
    }

    /// Text, raw and comment nodes constructed through this capability.
    pub fn texts_created(&self) -> usize {
        self.texts_created.get()
    }
}

impl Dom for TreeDom {
    type Node = NodeHandle;

    fn create_fragment(&self) -> NodeHandle {
        self.fragments_created.set(self.fragments_created.get() + 1);
        NodeHandle::new(NodeKind::Fragment)
    }

    fn create_element(&self, tag: &str) -> NodeHandle {
        self.elements_created.set(self.elements_created.get() + 1);
        NodeHandle::new(NodeKind::Element {
            tag: SmolStr::new(tag),
            attributes: Vec::new(),
        })
    }

    fn create_text(&self, text: &str) -> NodeHandle {
        self.texts_created.set(self.texts_created.get() + 1);
        NodeHandle::new(NodeKind::Text(text.to_string()))
    }

    fn create_raw(&self, markup: &str) -> NodeHandle {
        self.texts_created.set(self.texts_created.get() + 1);
        NodeHandle::new(NodeKind::Raw(markup.to_string()))
    }

    fn create_comment(&self, text: &str) -> NodeHandle {
        self.texts_created.set(self.texts_created.get() + 1);
        NodeHandle::new(NodeKind::Comment(text.to_string()))
    }

    fn set_attribute(&self, element: &NodeHandle, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut element.0.borrow_mut().kind {
            match attributes.iter_mut().find(|(attr, _)| attr == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((SmolStr::new(name), value.to_string())),
            }
        }
    }

    fn append_child(&self, parent: &NodeHandle, child: &NodeHandle) {
        child.0.borrow_mut().parent = Some(Rc::downgrade(&parent.0));
        parent.0.borrow_mut().children.push(child.clone());
    }

    fn child_at(&self, parent: &NodeHandle, index: usize) -> Option<NodeHandle> {
        parent.0.borrow().children.get(index).cloned()
    }

    fn clone_tree(&self, node: &NodeHandle) -> NodeHandle {
        node.deep_clone()
    }

    fn replace_with(&self, node: &NodeHandle, replacement: &NodeHandle) {
        let Some(parent) = node.0.borrow().parent.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let mut parent_data = parent.borrow_mut();
        let Some(position) = parent_data
            .children
            .iter()
            .position(|child| Rc::ptr_eq(&child.0, &node.0))
        else {
            return;
        };

        let splice = matches!(replacement.0.borrow().kind, NodeKind::Fragment);
        if splice {
            let mut children = std::mem::take(&mut replacement.0.borrow_mut().children);
            for child in &children {
                child.0.borrow_mut().parent = Some(Rc::downgrade(&parent));
            }
            parent_data.children.splice(position..=position, children.drain(..));
        } else {
            replacement.0.borrow_mut().parent = Some(Rc::downgrade(&parent));
            parent_data.children[position] = replacement.clone();
        }
        node.0.borrow_mut().parent = None;
    }

    fn set_text(&self, node: &NodeHandle, text: &str) {
        match &mut node.0.borrow_mut().kind {
            NodeKind::Text(content) | NodeKind::Raw(content) | NodeKind::Comment(content) => {
                *content = text.to_string();
            }
            _ => {}
        }
    }

    fn text_content(&self, node: &NodeHandle) -> String {
        let mut out = String::new();
        node.collect_text(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_html;
    use rstest::{fixture, rstest};

    #[fixture]
    fn dom() -> TreeDom {
        TreeDom::new()
    }

    fn sample_fragment(dom: &TreeDom) -> NodeHandle {
        let fragment = dom.create_fragment();
        let div = dom.create_element("div");
        dom.set_attribute(&div, "id", "main");
        dom.append_child(&div, &dom.create_text("Hello"));
        dom.append_child(&div, &dom.create_comment(""));
        dom.append_child(&fragment, &div);
        fragment
    }

    #[rstest]
    fn test_to_html(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        assert_eq!(to_html(&fragment), "<div id=\"main\">Hello<!----></div>");
    }

    #[rstest]
    fn test_to_html_escapes_text_and_attributes(dom: TreeDom) {
        let el = dom.create_element("span");
        dom.set_attribute(&el, "title", "a \"b\" & c");
        dom.append_child(&el, &dom.create_text("1 < 2"));
        assert_eq!(
            to_html(&el),
            "<span title=\"a &quot;b&quot; &amp; c\">1 &lt; 2</span>"
        );
    }

    #[rstest]
    fn test_raw_nodes_serialize_verbatim(dom: TreeDom) {
        let el = dom.create_element("div");
        dom.append_child(&el, &dom.create_raw("<b>bold</b>"));
        assert_eq!(to_html(&el), "<div><b>bold</b></div>");
    }

    #[rstest]
    fn test_void_elements_have_no_closing_tag(dom: TreeDom) {
        let el = dom.create_element("br");
        assert_eq!(to_html(&el), "<br>");
    }

    #[rstest]
    fn test_clone_tree_is_independent(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        let clone = dom.clone_tree(&fragment);
        assert_ne!(fragment, clone);
        assert_eq!(to_html(&fragment), to_html(&clone));

        let div = dom.child_at(&clone, 0).unwrap();
        dom.set_attribute(&div, "id", "changed");
        assert_eq!(to_html(&fragment), "<div id=\"main\">Hello<!----></div>");
        assert_eq!(to_html(&clone), "<div id=\"changed\">Hello<!----></div>");
    }

    #[rstest]
    fn test_child_at_walks_indices(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        let div = dom.child_at(&fragment, 0).unwrap();
        let comment = dom.child_at(&div, 1).unwrap();
        assert!(comment.is_comment());
        assert_eq!(dom.child_at(&div, 2), None);
    }

    #[rstest]
    fn test_replace_with_single_node(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        let div = dom.child_at(&fragment, 0).unwrap();
        let comment = dom.child_at(&div, 1).unwrap();
        dom.replace_with(&comment, &dom.create_text(" World"));
        assert_eq!(to_html(&fragment), "<div id=\"main\">Hello World</div>");
    }

    #[rstest]
    fn test_replace_with_fragment_splices_children(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        let div = dom.child_at(&fragment, 0).unwrap();
        let comment = dom.child_at(&div, 1).unwrap();

        let replacement = dom.create_fragment();
        dom.append_child(&replacement, &dom.create_text(", "));
        dom.append_child(&replacement, &dom.create_text("World"));
        dom.replace_with(&comment, &replacement);

        assert_eq!(to_html(&fragment), "<div id=\"main\">Hello, World</div>");
        assert_eq!(div.child_count(), 3);
    }

    #[rstest]
    fn test_set_attribute_replaces_existing(dom: TreeDom) {
        let el = dom.create_element("a");
        dom.set_attribute(&el, "href", "/old");
        dom.set_attribute(&el, "href", "/new");
        assert_eq!(el.attribute("href"), Some("/new".to_string()));
        assert_eq!(to_html(&el), "<a href=\"/new\"></a>");
    }

    #[rstest]
    fn test_creation_counters(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        assert_eq!(dom.fragments_created(), 1);
        assert_eq!(dom.elements_created(), 1);
        assert_eq!(dom.texts_created(), 2);

        // Cloning is not construction.
        let _clone = dom.clone_tree(&fragment);
        assert_eq!(dom.elements_created(), 1);
    }

    #[rstest]
    fn test_text_content_spans_subtree(dom: TreeDom) {
        let fragment = sample_fragment(&dom);
        assert_eq!(dom.text_content(&fragment), "Hello");
    }
}
