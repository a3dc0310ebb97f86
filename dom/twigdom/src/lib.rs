//! An in-memory emulation of the web's DOM, usable outside a browser.
//!
//! `twigdom` provides the handful of DOM interfaces a UI runtime needs to
//! drive a document: element/text/comment nodes, tree and attribute mutation,
//! expando properties, native-style event dispatch with capture and bubble
//! phases, and (X)HTML serialisation. Mutations under any node can be observed
//! through a channel, which makes "how many operations did that update
//! perform?" a directly testable question.
//!
//! Nodes are cheaply cloneable handles; two handles are equal when they refer
//! to the same underlying node.

#![warn(missing_docs)]

pub mod event;
pub mod testing;

use event::{Event, EventHandle, ListenerEntry, Phase};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event as XmlEvent},
    Reader as XmlReader, Writer as XmlWriter,
};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    io::{Cursor, Write},
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::warn;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// An XML namespace a node can belong to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Namespace {
    /// `http://www.w3.org/1999/xhtml`
    Html,
    /// `http://www.w3.org/2000/svg`
    Svg,
    /// `http://www.w3.org/1998/Math/MathML`
    MathMl,
}

impl Namespace {
    /// The namespace URI string.
    pub fn uri(self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

/// Which kind of node a [`Node`] handle refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// An element with a tag, attributes, and children.
    Element,
    /// A text node.
    Text,
    /// A comment node.
    Comment,
    /// The document itself.
    Document,
    /// A document fragment; appending one splices its children.
    Fragment,
}

/// A structural or attribute change, reported to observers registered with
/// [`Node::observe_mutations`]. Nodes are identified by [`Node::id`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mutation {
    /// A child was appended.
    Append {
        /// The parent's node id.
        parent: u64,
        /// The appended child's node id.
        child: u64,
    },
    /// A child was inserted before a reference node.
    InsertBefore {
        /// The parent's node id.
        parent: u64,
        /// The inserted child's node id.
        child: u64,
        /// The reference node's id.
        reference: u64,
    },
    /// A child was removed.
    Remove {
        /// The parent's node id.
        parent: u64,
        /// The removed child's node id.
        child: u64,
    },
    /// A child was replaced in place.
    Replace {
        /// The parent's node id.
        parent: u64,
        /// The outgoing child's node id.
        old: u64,
        /// The incoming child's node id.
        new: u64,
    },
    /// An attribute was written.
    SetAttribute {
        /// The element's node id.
        node: u64,
        /// Attribute name.
        name: String,
        /// Attribute value.
        value: String,
    },
    /// An attribute was removed.
    RemoveAttribute {
        /// The element's node id.
        node: u64,
        /// Attribute name.
        name: String,
    },
    /// A text or comment node's value changed.
    SetText {
        /// The node id.
        node: u64,
        /// The new contents.
        text: String,
    },
}

pub(crate) enum NodeData {
    Element { tag: String, namespace: Namespace, attrs: RefCell<Vec<(String, String)>> },
    Text(RefCell<String>),
    Comment(RefCell<String>),
    Document { mode: Cell<Option<u32>> },
    Fragment,
}

pub(crate) struct NodeInner {
    id: u64,
    doc: RefCell<Weak<NodeInner>>,
    parent: RefCell<Option<Weak<NodeInner>>>,
    children: RefCell<Vec<Node>>,
    data: NodeData,
    pub(crate) listeners: RefCell<Vec<ListenerEntry>>,
    expandos: RefCell<HashMap<String, Rc<dyn Any>>>,
    observers: RefCell<Vec<UnboundedSender<Mutation>>>,
}

/// A handle to a node in the emulated document.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<NodeInner>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if f.alternate() {
            f.write_str(&self.pretty_outer_html())
        } else {
            f.write_str(&self.outer_html())
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&self.outer_html())
    }
}

impl Node {
    fn new(data: NodeData, doc: Weak<NodeInner>) -> Self {
        Node {
            inner: Rc::new(NodeInner {
                id: next_node_id(),
                doc: RefCell::new(doc),
                parent: RefCell::new(None),
                children: RefCell::new(Vec::new()),
                data,
                listeners: RefCell::new(Vec::new()),
                expandos: RefCell::new(HashMap::new()),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<NodeInner>) -> Self {
        Node { inner }
    }

    /// A process-unique, stable identifier for this node.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Which kind of node this handle refers to.
    pub fn kind(&self) -> NodeKind {
        match &self.inner.data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(..) => NodeKind::Text,
            NodeData::Comment(..) => NodeKind::Comment,
            NodeData::Document { .. } => NodeKind::Document,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }

    /// The element's tag, if this is an element.
    pub fn tag(&self) -> Option<String> {
        match &self.inner.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    /// The element's namespace, if this is an element.
    pub fn namespace(&self) -> Option<Namespace> {
        match &self.inner.data {
            NodeData::Element { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }

    /// The document this node was created by, if it is still alive.
    pub fn owner_document(&self) -> Option<Document> {
        if let NodeData::Document { .. } = self.inner.data {
            return Some(Document { node: self.clone() });
        }
        self.inner.doc.borrow().upgrade().map(|inner| Document { node: Node::from_inner(inner) })
    }

    // ---- tree structure ----

    /// This node's parent, if attached.
    pub fn parent_node(&self) -> Option<Node> {
        self.inner.parent.borrow().as_ref().and_then(|w| w.upgrade()).map(Node::from_inner)
    }

    /// The node's children, in order.
    pub fn child_nodes(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    /// The first child, if any.
    pub fn first_child(&self) -> Option<Node> {
        self.inner.children.borrow().first().cloned()
    }

    /// The last child, if any.
    pub fn last_child(&self) -> Option<Node> {
        self.inner.children.borrow().last().cloned()
    }

    /// The sibling immediately after this node.
    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent_node()?;
        let children = parent.inner.children.borrow();
        let idx = children.iter().position(|c| c == self)?;
        children.get(idx + 1).cloned()
    }

    /// The sibling immediately before this node.
    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent_node()?;
        let children = parent.inner.children.borrow();
        let idx = children.iter().position(|c| c == self)?;
        if idx == 0 { None } else { children.get(idx - 1).cloned() }
    }

    /// Whether `other` is this node or a descendant of it.
    pub fn contains(&self, other: &Node) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(n) = cursor {
            if n == *self {
                return true;
            }
            cursor = n.parent_node();
        }
        false
    }

    fn detach(&self, child: &Node) {
        let mut children = self.inner.children.borrow_mut();
        if let Some(idx) = children.iter().position(|c| c == child) {
            children.remove(idx);
        }
        *child.inner.parent.borrow_mut() = None;
    }

    fn adopt(&self, child: &Node) {
        if let Some(old_parent) = child.parent_node() {
            old_parent.detach(child);
        }
        *child.inner.parent.borrow_mut() = Some(self.downgrade());
    }

    /// Append `new_child` as the last child. Appending a fragment splices the
    /// fragment's children in, leaving the fragment empty.
    pub fn append_child(&self, new_child: &Node) {
        if new_child.kind() == NodeKind::Fragment {
            let spliced: Vec<Node> = new_child.inner.children.borrow_mut().drain(..).collect();
            for child in &spliced {
                *child.inner.parent.borrow_mut() = None;
                self.append_child(child);
            }
            return;
        }
        self.adopt(new_child);
        self.inner.children.borrow_mut().push(new_child.clone());
        self.emit(Mutation::Append { parent: self.id(), child: new_child.id() });
    }

    /// Insert `new_child` before `reference`, or append if `reference` is
    /// `None`. Fragments splice as in [`Node::append_child`].
    pub fn insert_before(&self, new_child: &Node, reference: Option<&Node>) {
        let reference = match reference {
            Some(r) => r,
            None => return self.append_child(new_child),
        };
        if new_child.kind() == NodeKind::Fragment {
            let spliced: Vec<Node> = new_child.inner.children.borrow_mut().drain(..).collect();
            for child in &spliced {
                *child.inner.parent.borrow_mut() = None;
                self.insert_before(child, Some(reference));
            }
            return;
        }
        self.adopt(new_child);
        let mut children = self.inner.children.borrow_mut();
        let idx = children
            .iter()
            .position(|c| c == reference)
            .unwrap_or_else(|| panic!("insert_before: reference node {} is not a child", reference.id()));
        children.insert(idx, new_child.clone());
        drop(children);
        self.emit(Mutation::InsertBefore {
            parent: self.id(),
            child: new_child.id(),
            reference: reference.id(),
        });
    }

    /// Remove `child` from this node's children, returning it if it was one.
    pub fn remove_child(&self, child: &Node) -> Option<Node> {
        let idx = self.inner.children.borrow().iter().position(|c| c == child)?;
        self.inner.children.borrow_mut().remove(idx);
        *child.inner.parent.borrow_mut() = None;
        self.emit(Mutation::Remove { parent: self.id(), child: child.id() });
        Some(child.clone())
    }

    /// Replace `existing` with `new_child` in place.
    pub fn replace_child(&self, new_child: &Node, existing: &Node) {
        let idx = self
            .inner
            .children
            .borrow()
            .iter()
            .position(|c| c == existing)
            .unwrap_or_else(|| panic!("replace_child: node {} is not a child", existing.id()));
        self.adopt(new_child);
        let mut children = self.inner.children.borrow_mut();
        children[idx] = new_child.clone();
        *existing.inner.parent.borrow_mut() = None;
        drop(children);
        self.emit(Mutation::Replace { parent: self.id(), old: existing.id(), new: new_child.id() });
    }

    // ---- attributes ----

    /// Read an attribute's value.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.inner.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find_map(|(n, v)| if n == name { Some(v.clone()) } else { None }),
            _ => None,
        }
    }

    /// Write an attribute, preserving first-write ordering.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let attrs = match &self.inner.data {
            NodeData::Element { attrs, .. } => attrs,
            data => panic!("set_attribute on a non-element node ({:?})", data_kind(data)),
        };
        let mut attrs = attrs.borrow_mut();
        if let Some(existing) = attrs.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.to_string();
        } else {
            attrs.push((name.to_string(), value.to_string()));
        }
        drop(attrs);
        self.emit(Mutation::SetAttribute {
            node: self.id(),
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    /// Remove an attribute if present.
    pub fn remove_attribute(&self, name: &str) {
        if let NodeData::Element { attrs, .. } = &self.inner.data {
            let mut attrs = attrs.borrow_mut();
            let before = attrs.len();
            attrs.retain(|(n, _)| n != name);
            let removed = attrs.len() != before;
            drop(attrs);
            if removed {
                self.emit(Mutation::RemoveAttribute { node: self.id(), name: name.to_string() });
            }
        }
    }

    /// A snapshot of the element's attributes in serialisation order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.inner.data {
            NodeData::Element { attrs, .. } => attrs.borrow().clone(),
            _ => Vec::new(),
        }
    }

    // ---- character data ----

    /// The contents of a text or comment node.
    pub fn node_value(&self) -> Option<String> {
        match &self.inner.data {
            NodeData::Text(contents) | NodeData::Comment(contents) => {
                Some(contents.borrow().clone())
            }
            _ => None,
        }
    }

    /// Overwrite the contents of a text or comment node.
    pub fn set_node_value(&self, value: &str) {
        match &self.inner.data {
            NodeData::Text(contents) | NodeData::Comment(contents) => {
                *contents.borrow_mut() = value.to_string();
                self.emit(Mutation::SetText { node: self.id(), text: value.to_string() });
            }
            data => panic!("set_node_value on a node without character data ({:?})", data_kind(data)),
        }
    }

    /// The concatenated text of this node's text descendants.
    pub fn text_content(&self) -> String {
        match &self.inner.data {
            NodeData::Text(contents) => contents.borrow().clone(),
            NodeData::Comment(..) => String::new(),
            _ => {
                let mut out = String::new();
                for child in self.inner.children.borrow().iter() {
                    out.push_str(&child.text_content());
                }
                out
            }
        }
    }

    /// Replace this node's children with a single text node, or nothing if
    /// `text` is empty.
    pub fn set_text_content(&self, text: &str) {
        let existing: Vec<Node> = self.inner.children.borrow().clone();
        for child in existing {
            self.remove_child(&child);
        }
        if !text.is_empty() {
            let doc = self
                .owner_document()
                .expect("set_text_content requires a live owner document");
            self.append_child(&doc.create_text_node(text));
        }
    }

    // ---- expando properties ----

    /// Attach an arbitrary value under a string key, emulating a JS expando
    /// property. Returns any previous value under the key.
    pub fn set_expando(&self, key: &str, value: Rc<dyn Any>) -> Option<Rc<dyn Any>> {
        self.inner.expandos.borrow_mut().insert(key.to_string(), value)
    }

    /// Read an expando property.
    pub fn expando(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.inner.expandos.borrow().get(key).cloned()
    }

    /// Remove an expando property.
    pub fn remove_expando(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.inner.expandos.borrow_mut().remove(key)
    }

    // ---- events ----

    /// Register a listener for `name` events in the given phase. The listener
    /// stays attached until the returned handle is dropped.
    pub fn add_event_listener(
        &self,
        name: impl Into<String>,
        capture: bool,
        handler: Rc<dyn Fn(&Event)>,
    ) -> EventHandle {
        event::add_listener(self, name.into(), capture, handler)
    }

    /// Dispatch `event` against this node as the target, running the capture,
    /// target, and (for bubbling events) bubble phases. Returns `true` unless
    /// a listener called `prevent_default` on a cancelable event.
    pub fn dispatch(&self, event: &Event) -> bool {
        event.set_target(self.clone());

        let mut path = Vec::new();
        let mut cursor = self.parent_node();
        while let Some(n) = cursor {
            cursor = n.parent_node();
            path.push(n);
        }

        // capture: outermost ancestor toward the target
        for ancestor in path.iter().rev() {
            if event.propagation_stopped() {
                break;
            }
            event::invoke_listeners(ancestor, event, Phase::Capture);
        }

        // target: registration order, both capture and bubble listeners
        if !event.propagation_stopped() {
            event::invoke_listeners(self, event, Phase::Target);
        }

        // bubble: target's parent toward the root
        if event.bubbles() {
            for ancestor in path.iter() {
                if event.propagation_stopped() {
                    break;
                }
                event::invoke_listeners(ancestor, event, Phase::Bubble);
            }
        }

        !(event.cancelable() && event.default_prevented())
    }

    // ---- observation ----

    /// Observe structural and attribute mutations under this node (including
    /// the node itself). Each mutation is delivered to the channel; drain it
    /// with `try_next` in tests.
    pub fn observe_mutations(&self) -> UnboundedReceiver<Mutation> {
        let (sender, receiver) = unbounded();
        self.inner.observers.borrow_mut().push(sender);
        receiver
    }

    fn emit(&self, mutation: Mutation) {
        let mut cursor = Some(self.clone());
        while let Some(n) = cursor {
            n.inner
                .observers
                .borrow_mut()
                .retain(|sender| sender.unbounded_send(mutation.clone()).is_ok());
            cursor = n.parent_node();
        }
    }

    // ---- serialisation ----

    fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) {
        match &self.inner.data {
            NodeData::Element { tag, attrs, .. } => {
                writer
                    .write_event(XmlEvent::Start(
                        BytesStart::borrowed_name(tag.as_bytes()).with_attributes(
                            attrs.borrow().iter().map(|(n, v)| (n.as_str(), v.as_str())),
                        ),
                    ))
                    .expect("writing start of element");

                for child in self.inner.children.borrow().iter() {
                    child.write_xml(writer);
                }

                writer
                    .write_event(XmlEvent::End(BytesEnd::borrowed(tag.as_bytes())))
                    .expect("writing end of element");
            }
            NodeData::Text(contents) => {
                writer
                    .write_event(XmlEvent::Text(BytesText::from_plain_str(&contents.borrow())))
                    .expect("writing text node");
            }
            NodeData::Comment(contents) => {
                writer
                    .write_event(XmlEvent::Comment(BytesText::from_plain_str(&contents.borrow())))
                    .expect("writing comment node");
            }
            NodeData::Document { .. } | NodeData::Fragment => {
                for child in self.inner.children.borrow().iter() {
                    child.write_xml(writer);
                }
            }
        }
    }

    /// Serialise this node and its subtree.
    pub fn outer_html(&self) -> String {
        let mut buf: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        {
            let mut writer = XmlWriter::new(&mut buf);
            self.write_xml(&mut writer);
        }
        String::from_utf8(buf.into_inner()).expect("xml writer produced invalid utf-8")
    }

    /// Serialise this node and its subtree with indentation.
    pub fn pretty_outer_html(&self) -> String {
        let mut buf: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        {
            let mut writer = XmlWriter::new_with_indent(&mut buf, b' ', 4);
            self.write_xml(&mut writer);
        }
        String::from_utf8(buf.into_inner()).expect("xml writer produced invalid utf-8")
    }

    /// Serialise this node's children only.
    pub fn inner_html(&self) -> String {
        let mut buf: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        {
            let mut writer = XmlWriter::new(&mut buf);
            for child in self.inner.children.borrow().iter() {
                child.write_xml(&mut writer);
            }
        }
        String::from_utf8(buf.into_inner()).expect("xml writer produced invalid utf-8")
    }

    /// Replace this node's children with the parse of `html`. Elements, text,
    /// and comments are supported; anything the parser rejects ends the parse
    /// with a warning, keeping whatever was built so far.
    pub fn set_inner_html(&self, html: &str) {
        for child in self.child_nodes() {
            self.remove_child(&child);
        }

        let doc = match self.owner_document() {
            Some(doc) => doc,
            None => {
                warn!("set_inner_html on a node without a live owner document");
                return;
            }
        };
        let namespace = self.namespace().unwrap_or(Namespace::Html);

        let mut reader = XmlReader::from_str(html);
        reader.check_end_names(false);
        let mut buf = Vec::new();
        let mut stack: Vec<Node> = vec![self.clone()];

        loop {
            let parent = stack.last().expect("parse stack never empties below the root").clone();
            match reader.read_event(&mut buf) {
                Ok(XmlEvent::Start(start)) => {
                    let element = parse_element(&doc, namespace, &reader, &start);
                    parent.append_child(&element);
                    stack.push(element);
                }
                Ok(XmlEvent::Empty(start)) => {
                    let element = parse_element(&doc, namespace, &reader, &start);
                    parent.append_child(&element);
                }
                Ok(XmlEvent::End(..)) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Ok(XmlEvent::Text(text)) => {
                    let contents = match text.unescape_and_decode(&reader) {
                        Ok(contents) => contents,
                        Err(e) => {
                            warn!(error = %e, "ignoring undecodable text run");
                            continue;
                        }
                    };
                    if !contents.is_empty() {
                        parent.append_child(&doc.create_text_node(&contents));
                    }
                }
                Ok(XmlEvent::Comment(text)) => {
                    let contents = text.unescape_and_decode(&reader).unwrap_or_default();
                    parent.append_child(&doc.create_comment(&contents));
                }
                Ok(XmlEvent::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "stopping inner-html parse on malformed markup");
                    break;
                }
            }
            buf.clear();
        }
    }
}

fn parse_element(
    doc: &Document,
    namespace: Namespace,
    reader: &XmlReader<&[u8]>,
    start: &BytesStart,
) -> Node {
    let tag = String::from_utf8_lossy(start.name()).into_owned();
    let element = doc.create_element_ns(namespace, &tag);
    for attr in start.attributes().flatten() {
        let name = String::from_utf8_lossy(attr.key).into_owned();
        let value = attr.unescape_and_decode_value(reader).unwrap_or_default();
        element.set_attribute(&name, &value);
    }
    element
}

fn data_kind(data: &NodeData) -> NodeKind {
    match data {
        NodeData::Element { .. } => NodeKind::Element,
        NodeData::Text(..) => NodeKind::Text,
        NodeData::Comment(..) => NodeKind::Comment,
        NodeData::Document { .. } => NodeKind::Document,
        NodeData::Fragment => NodeKind::Fragment,
    }
}

/// The emulated document: the root node, the node factory, and the home of
/// document-wide emulation knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    node: Node,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// Create a fresh, empty document.
    pub fn new() -> Self {
        let node = Node::new(NodeData::Document { mode: Cell::new(None) }, Weak::new());
        *node.inner.doc.borrow_mut() = node.downgrade();
        Document { node }
    }

    /// The document as a plain node handle.
    pub fn as_node(&self) -> &Node {
        &self.node
    }

    /// Create an element in the HTML namespace.
    pub fn create_element(&self, tag: &str) -> Node {
        self.create_element_ns(Namespace::Html, tag)
    }

    /// Create an element in the given namespace.
    pub fn create_element_ns(&self, namespace: Namespace, tag: &str) -> Node {
        Node::new(
            NodeData::Element {
                tag: tag.to_string(),
                namespace,
                attrs: RefCell::new(Vec::new()),
            },
            self.node.downgrade(),
        )
    }

    /// Create a text node.
    pub fn create_text_node(&self, contents: &str) -> Node {
        Node::new(NodeData::Text(RefCell::new(contents.to_string())), self.node.downgrade())
    }

    /// Create a comment node.
    pub fn create_comment(&self, contents: &str) -> Node {
        Node::new(NodeData::Comment(RefCell::new(contents.to_string())), self.node.downgrade())
    }

    /// Create an empty document fragment.
    pub fn create_document_fragment(&self) -> Node {
        Node::new(NodeData::Fragment, self.node.downgrade())
    }

    /// The emulated legacy `documentMode`; `None` on a standards document.
    pub fn document_mode(&self) -> Option<u32> {
        match &self.node.inner.data {
            NodeData::Document { mode } => mode.get(),
            _ => unreachable!("document handle wraps a non-document node"),
        }
    }

    /// Set the emulated `documentMode`, switching consumers onto their
    /// quirks-era code paths.
    pub fn set_document_mode(&self, mode: Option<u32>) {
        match &self.node.inner.data {
            NodeData::Document { mode: cell } => cell.set(mode),
            _ => unreachable!("document handle wraps a non-document node"),
        }
    }
}

impl std::ops::Deref for Document {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}
