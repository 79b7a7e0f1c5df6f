//! # SnapKit DOM
//!
//! Document model for the SnapKit capture pipeline.
//! Uses html5ever for HTML parsing and constructs a traversable, mutable DOM tree.
//!
//! ## Design Goals
//!
//! 1. **Standards-compliant parsing**: html5ever implements the HTML5 parsing algorithm
//! 2. **Document order**: every query returns nodes in tree order
//! 3. **Inline style mutation**: style properties are read and written through the `style` attribute
//! 4. **Canvas surfaces**: every `<canvas>` element owns a drawing buffer that can be sampled

pub mod canvas;
pub mod selector;
pub mod style;

pub use canvas::{
    CanvasError, CanvasSurface, ContextAttributes, ContextKind, MAX_CANVAS_AREA, MAX_CANVAS_DIMENSION,
};
pub use selector::{QuerySelector, SelectorList};
pub use style::StyleDeclarations;
pub use snapkit_codecs::RgbaImage;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in DOM operations.
#[derive(Error, Debug)]
pub enum DomError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Unique identifier for a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Create a new NodeId.
    pub fn new(id: usize) -> Self {
        Self(id)
    }
}

/// Type of DOM node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Document,
    DocumentType { name: String },
    Element { tag_name: String, namespace: String },
    Text(String),
    Comment(String),
}

/// A DOM node.
#[derive(Debug)]
pub struct Node {
    /// Unique ID for this node.
    pub id: NodeId,
    /// Node type and associated data.
    pub node_type: NodeType,
    /// Element attributes (empty for non-elements).
    attributes: RefCell<HashMap<String, String>>,
    /// Drawing buffer, present only on `<canvas>` elements.
    canvas: Option<RefCell<CanvasSurface>>,
    /// Parent node (weak reference to avoid cycles).
    parent: RefCell<Option<Weak<Node>>>,
    /// Child nodes.
    children: RefCell<Vec<Rc<Node>>>,
}

impl Node {
    /// Create a new non-element node.
    pub fn new(id: NodeId, node_type: NodeType) -> Rc<Self> {
        Self::build(id, node_type, HashMap::new())
    }

    /// Create a new element node.
    pub fn new_element(
        id: NodeId,
        tag_name: &str,
        attributes: HashMap<String, String>,
    ) -> Rc<Self> {
        let node_type = NodeType::Element {
            tag_name: tag_name.to_ascii_lowercase(),
            namespace: "http://www.w3.org/1999/xhtml".to_string(),
        };
        Self::build(id, node_type, attributes)
    }

    fn build(id: NodeId, node_type: NodeType, attributes: HashMap<String, String>) -> Rc<Self> {
        let canvas = match &node_type {
            NodeType::Element { tag_name, .. } if tag_name == "canvas" => {
                let width = canvas::dimension_attribute(attributes.get("width"), 300);
                let height = canvas::dimension_attribute(attributes.get("height"), 150);
                Some(RefCell::new(CanvasSurface::new(width, height)))
            }
            _ => None,
        };

        Rc::new(Self {
            id,
            node_type,
            attributes: RefCell::new(attributes),
            canvas,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }

    /// Get the tag name for element nodes.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    /// Get an attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    /// Check whether an attribute is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name)
    }

    /// Set an attribute. Canvas `width`/`height` changes resize the drawing buffer.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if !self.is_element() {
            return;
        }
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.sync_canvas_size(name);
    }

    /// Remove an attribute.
    pub fn remove_attribute(&self, name: &str) {
        self.attributes.borrow_mut().remove(name);
        self.sync_canvas_size(name);
    }

    fn sync_canvas_size(&self, name: &str) {
        if name != "width" && name != "height" {
            return;
        }
        if let Some(canvas) = &self.canvas {
            let attrs = self.attributes.borrow();
            let width = canvas::dimension_attribute(attrs.get("width"), 300);
            let height = canvas::dimension_attribute(attrs.get("height"), 150);
            canvas.borrow_mut().resize(width, height);
        }
    }

    /// Check for an exact class name.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attributes
            .borrow()
            .get("class")
            .map(|c| c.split_whitespace().any(|cls| cls == class_name))
            .unwrap_or(false)
    }

    /// Parsed inline style declarations.
    pub fn style(&self) -> StyleDeclarations {
        self.attributes
            .borrow()
            .get("style")
            .map(|css| StyleDeclarations::parse(css))
            .unwrap_or_default()
    }

    /// Inline style value of a property, empty when unset.
    pub fn style_property(&self, name: &str) -> String {
        self.style().get(name).unwrap_or_default().to_string()
    }

    /// Inline style value including a trailing `!important`, empty when unset.
    pub fn style_property_text(&self, name: &str) -> String {
        self.style().get_text(name).unwrap_or_default()
    }

    /// Set an inline style property; an empty value removes it.
    pub fn set_style_property(&self, name: &str, value: &str) {
        if !self.is_element() {
            return;
        }
        let mut style = self.style();
        style.set(name, value);
        self.set_attribute("style", &style.to_css_text());
    }

    /// Get parent node.
    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().as_ref().and_then(|w| w.upgrade())
    }

    /// Get child nodes.
    pub fn children(&self) -> Vec<Rc<Node>> {
        self.children.borrow().clone()
    }

    /// Get element children only.
    pub fn element_children(&self) -> Vec<Rc<Node>> {
        self.children
            .borrow()
            .iter()
            .filter(|n| n.is_element())
            .cloned()
            .collect()
    }

    /// Ancestors from the parent upward, stopping before the document node.
    pub fn ancestors(&self) -> Vec<Rc<Node>> {
        let mut chain = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            if matches!(node.node_type, NodeType::Document) {
                break;
            }
            current = node.parent();
            chain.push(node);
        }
        chain
    }

    /// Inclusive descendant check (a node contains itself).
    pub fn contains(&self, other: &Node) -> bool {
        if self.id == other.id {
            return true;
        }
        let mut current = other.parent();
        while let Some(node) = current {
            if node.id == self.id {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Check if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element { .. })
    }

    /// Check if this is a `<canvas>` element.
    pub fn is_canvas(&self) -> bool {
        self.canvas.is_some()
    }

    /// Borrow the canvas drawing buffer.
    pub fn canvas(&self) -> Option<Ref<'_, CanvasSurface>> {
        self.canvas.as_ref().map(|c| c.borrow())
    }

    /// Mutably borrow the canvas drawing buffer.
    pub fn canvas_mut(&self) -> Option<RefMut<'_, CanvasSurface>> {
        self.canvas.as_ref().map(|c| c.borrow_mut())
    }

    /// Canvas `(width, height)` in pixels.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.canvas().map(|c| (c.width(), c.height()))
    }

    /// Append a child node.
    pub fn append_child(self: &Rc<Self>, child: Rc<Node>) {
        *child.parent.borrow_mut() = Some(Rc::downgrade(self));
        self.children.borrow_mut().push(child);
    }
}

/// A complete DOM document.
pub struct Document {
    /// Root node of the document.
    root: Rc<Node>,
    /// Next node ID.
    next_id: Cell<usize>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        let root = Node::new(NodeId::new(0), NodeType::Document);
        Self {
            root,
            next_id: Cell::new(1),
        }
    }

    /// Parse HTML and create a document.
    pub fn parse_html(html: &str) -> Result<Self, DomError> {
        debug!(len = html.len(), "Parsing HTML");

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(|e| DomError::ParseError(e.to_string()))?;

        let doc = Document::new();
        doc.convert_rcdom(&dom.document, &doc.root.clone());

        debug!(node_count = doc.next_id.get(), "HTML parsed");
        Ok(doc)
    }

    fn convert_rcdom(&self, handle: &Handle, parent: &Rc<Node>) {
        for child_handle in handle.children.borrow().iter() {
            let node = match &child_handle.data {
                NodeData::Document | NodeData::ProcessingInstruction { .. } => continue,
                NodeData::Doctype { name, .. } => self.register(|id| {
                    Node::new(
                        id,
                        NodeType::DocumentType {
                            name: name.to_string(),
                        },
                    )
                }),
                NodeData::Element { name, attrs, .. } => {
                    let attributes = attrs
                        .borrow()
                        .iter()
                        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                        .collect();
                    self.register(|id| Node::new_element(id, &name.local, attributes))
                }
                NodeData::Text { contents } => self.register(|id| {
                    Node::new(id, NodeType::Text(contents.borrow().to_string()))
                }),
                NodeData::Comment { contents } => {
                    self.register(|id| Node::new(id, NodeType::Comment(contents.to_string())))
                }
            };

            parent.append_child(node.clone());

            // Recurse for children
            self.convert_rcdom(child_handle, &node);
        }
    }

    fn register(&self, make: impl FnOnce(NodeId) -> Rc<Node>) -> Rc<Node> {
        let id = NodeId::new(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        make(id)
    }

    /// Create a detached element owned by this document.
    pub fn create_element(&self, tag_name: &str, attributes: &[(&str, &str)]) -> Rc<Node> {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.register(|id| Node::new_element(id, tag_name, attributes))
    }

    /// Get the document root.
    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    /// Get the document element (<html>).
    pub fn document_element(&self) -> Option<Rc<Node>> {
        self.root
            .children()
            .into_iter()
            .find(|n| n.tag_name() == Some("html"))
    }

    /// Get the <body> element.
    pub fn body(&self) -> Option<Rc<Node>> {
        self.document_element()?
            .children()
            .into_iter()
            .find(|n| n.tag_name() == Some("body"))
    }

    /// Traverse all attached nodes depth-first, in document order.
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&Rc<Node>),
    {
        Self::traverse_node(&self.root, &mut callback);
    }

    fn traverse_node<F>(node: &Rc<Node>, callback: &mut F)
    where
        F: FnMut(&Rc<Node>),
    {
        callback(node);
        for child in node.children() {
            Self::traverse_node(&child, callback);
        }
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> Vec<Rc<Node>> {
        let mut out = Vec::new();
        self.traverse(|n| {
            if n.is_element() {
                out.push(n.clone());
            }
        });
        out
    }

    /// Get element by ID attribute (first in document order).
    pub fn get_element_by_id(&self, id: &str) -> Option<Rc<Node>> {
        self.elements()
            .into_iter()
            .find(|n| n.get_attribute("id").as_deref() == Some(id))
    }

    /// Get elements by tag name, in document order.
    pub fn get_elements_by_tag_name(&self, tag_name: &str) -> Vec<Rc<Node>> {
        let tag_name_lower = tag_name.to_lowercase();
        self.elements()
            .into_iter()
            .filter(|n| n.tag_name() == Some(tag_name_lower.as_str()))
            .collect()
    }

    /// Get elements by class name, in document order.
    pub fn get_elements_by_class_name(&self, class_name: &str) -> Vec<Rc<Node>> {
        self.elements()
            .into_iter()
            .filter(|n| n.has_class(class_name))
            .collect()
    }

    /// All `<canvas>` elements, in document order.
    pub fn canvases(&self) -> Vec<Rc<Node>> {
        self.elements()
            .into_iter()
            .filter(|n| n.is_canvas())
            .collect()
    }

    /// Select elements matching a selector list, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Rc<Node>>, DomError> {
        Ok(QuerySelector::select(self, &SelectorList::parse(selector)?))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
