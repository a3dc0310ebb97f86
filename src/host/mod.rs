//! The host adapter: materialises host, text, and empty instances into the
//! DOM, applies child operation queues, and owns the container record mount
//! roots hang off.

pub(crate) mod props;
mod tree;

pub use tree::{insert_tree_before, LazyTree};

use crate::{
    cache, children,
    error::Error,
    events::hub,
    instance::{EmptyInstance, HostInstance, Instance, NodeSpan, TextInstance},
    record::Record,
    runtime::Runtime,
    transaction::ReconcileTransaction,
};
use std::{cell::Cell, rc::Rc};
use tracing::trace;
use twigdom::{Document, Namespace, Node as DomNode, NodeKind};

/// Attribute marking the root host node of a mounted tree.
pub const ROOT_ATTRIBUTE: &str = "data-arbor-root";
/// Attribute carrying every host node's per-container id.
pub const ID_ATTRIBUTE: &str = "data-arborid";

pub(crate) fn text_open_marker(dom_id: u32) -> String {
    format!(" arbor-text: {} ", dom_id)
}

pub(crate) const TEXT_CLOSE_MARKER: &str = " /arbor-text ";

pub(crate) fn empty_marker(dom_id: u32) -> String {
    format!(" arbor-empty: {} ", dom_id)
}

struct ContainerInner {
    node: DomNode,
    document: Document,
    id_counter: Cell<u32>,
    namespace: Namespace,
}

/// The record describing where a tree mounts: the container node, its owner
/// document, and the counter issuing per-container host ids.
#[derive(Clone)]
pub struct Container {
    inner: Rc<ContainerInner>,
}

impl Container {
    /// Validate a node as a mount container and wrap it.
    pub fn for_node(node: &DomNode) -> Result<Container, Error> {
        match node.kind() {
            NodeKind::Element | NodeKind::Document | NodeKind::Fragment => {}
            kind => return Err(Error::InvalidContainer { kind }),
        }
        let document = match node.owner_document() {
            Some(document) => document,
            None => return Err(Error::InvalidContainer { kind: node.kind() }),
        };
        Ok(Container {
            inner: Rc::new(ContainerInner {
                node: node.clone(),
                document,
                id_counter: Cell::new(0),
                namespace: node.namespace().unwrap_or(Namespace::Html),
            }),
        })
    }

    /// The container node itself.
    pub fn node(&self) -> &DomNode {
        &self.inner.node
    }

    /// The container's owner document.
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// The container node's identity, keying the root registry.
    pub fn id(&self) -> u64 {
        self.inner.node.id()
    }

    pub(crate) fn next_dom_id(&self) -> u32 {
        let id = self.inner.id_counter.get();
        self.inner.id_counter.set(id + 1);
        id
    }

    pub(crate) fn namespace(&self) -> Namespace {
        self.inner.namespace
    }
}

fn validate_tag(tag: &str) -> Result<(), Error> {
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTag { tag: tag.to_string() })
    }
}

/// The namespace a new element lands in: inherited from the nearest host
/// ancestor (or the container), with the svg/math entry points and the
/// `foreignObject` re-entry into HTML.
fn resolve_namespace(tag: &str, host_parent: Option<&Instance>, container: &Container) -> Namespace {
    let inherited = host_parent.and_then(Instance::as_host).map_or_else(
        || container.namespace(),
        |parent| {
            if parent.namespace.get() == Namespace::Svg && *parent.tag.borrow() == "foreignObject" {
                Namespace::Html
            } else {
                parent.namespace.get()
            }
        },
    );
    match tag {
        "svg" => Namespace::Svg,
        "math" => Namespace::MathMl,
        _ => inherited,
    }
}

/// Materialise a host instance: create its element in the right namespace,
/// apply markers and initial props, mount its children, and hand back the
/// lazy subtree for the caller to attach.
pub(crate) fn mount_component(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    host_parent: Option<&Instance>,
    container: &Container,
    context: &Record,
) -> Result<LazyTree, Error> {
    let element = host.element.borrow().clone();
    let tag = host.tag.borrow().clone();
    validate_tag(&tag)?;
    props::assert_valid_props(&tag, element.props())?;

    let instance = Instance::Host(host.clone());
    host.id.set(rt.next_instance_id());
    instance.set_host_parent(host_parent);
    *host.container.borrow_mut() = Some(container.clone());

    let namespace = resolve_namespace(&tag, host_parent, container);
    host.namespace.set(namespace);

    let document = container.document().clone();
    let node = document.create_element_ns(namespace, &tag);
    host.dom_id.set(container.next_dom_id());
    *host.node.borrow_mut() = Some(node.clone());
    cache::precache_node(rt, &instance, &node);
    trace!(tag = tag.as_str(), dom_id = host.dom_id.get(), "mounting host element");

    if host_parent.is_none() {
        node.set_attribute(ROOT_ATTRIBUTE, "");
    }
    node.set_attribute(ID_ATTRIBUTE, &host.dom_id.get().to_string());

    props::set_initial_properties(rt, host, tx, &node, element.props(), &document)?;

    let enable_lazy = document.document_mode().is_some();
    let mut lazy_tree = LazyTree::new(node, enable_lazy);
    if let Some(html) = props::inner_html_of(element.props())? {
        host.content_is_html.set(true);
        lazy_tree.queue_html(html);
    } else {
        for image in children::mount_children(rt, host, tx, context)? {
            lazy_tree.queue_child(image);
        }
    }
    Ok(lazy_tree)
}

/// Apply a new descriptor to a mounted host instance: diff props, then diff
/// content (raw HTML or reconciled children).
pub(crate) fn update_component(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    next_element: &crate::element::Element,
    context: &Record,
) -> Result<(), Error> {
    let tag = host.tag.borrow().clone();
    props::assert_valid_props(&tag, next_element.props())?;
    let prev_element = host.element.replace(next_element.clone());
    let document = host
        .container
        .borrow()
        .clone()
        .expect("mounted host instance has a container")
        .document()
        .clone();
    let node = host.dom_node();

    props::update_properties(rt, host, tx, prev_element.props(), next_element.props(), &document)?;

    let prev_html = props::inner_html_of(prev_element.props())?;
    let next_html = props::inner_html_of(next_element.props())?;
    match (prev_html, next_html) {
        (prev, Some(next)) => {
            if !host.children.borrow().is_empty() {
                children::unmount_children(rt, host, false);
                node.set_text_content("");
            }
            if prev.as_deref() != Some(next.as_str()) {
                node.set_inner_html(&next);
            }
            host.content_is_html.set(true);
        }
        (Some(..), None) => {
            node.set_text_content("");
            host.content_is_html.set(false);
            children::update_children(rt, host, tx, context, next_element.props().get("children"))?;
        }
        (None, None) => {
            children::update_children(rt, host, tx, context, next_element.props().get("children"))?;
        }
    }
    Ok(())
}

/// Tear down a host instance: children first, then listener-bank entries and
/// the node↔instance back-link. The DOM node's removal is its parent's job.
pub(crate) fn unmount_component(rt: &Runtime, host: &Rc<HostInstance>, safely: bool) {
    children::unmount_children(rt, host, safely);
    let instance = Instance::Host(host.clone());
    hub::delete_all_listeners(rt, &instance);
    cache::uncache_node(rt, &instance);
    *host.node.borrow_mut() = None;
    *host.previous_style.borrow_mut() = None;
    *host.container.borrow_mut() = None;
    *host.host_parent.borrow_mut() = None;
}

/// Materialise a text instance as its comment-delimited span.
pub(crate) fn mount_text(
    rt: &Runtime,
    text: &Rc<TextInstance>,
    host_parent: Option<&Instance>,
    container: &Container,
) -> LazyTree {
    let instance = Instance::Text(text.clone());
    text.id.set(rt.next_instance_id());
    instance.set_host_parent(host_parent);
    text.dom_id.set(container.next_dom_id());

    let document = container.document();
    let open = document.create_comment(&text_open_marker(text.dom_id.get()));
    let close = document.create_comment(TEXT_CLOSE_MARKER);
    *text.open.borrow_mut() = Some(open.clone());
    *text.close.borrow_mut() = Some(close.clone());
    cache::precache_node(rt, &instance, &open);

    let enable_lazy = document.document_mode().is_some();
    let mut lazy_tree = LazyTree::new(document.create_document_fragment(), enable_lazy);
    lazy_tree.queue_child(LazyTree::new(open, enable_lazy));
    let contents = text.text.borrow().clone();
    if !contents.is_empty() {
        lazy_tree.queue_child(LazyTree::new(document.create_text_node(&contents), enable_lazy));
    }
    lazy_tree.queue_child(LazyTree::new(close, enable_lazy));
    lazy_tree
}

/// Swap the text between a mounted span's markers without touching the
/// markers themselves, preserving sibling identity.
pub(crate) fn update_text(text: &Rc<TextInstance>, next_text: &str) {
    if *text.text.borrow() == next_text {
        return;
    }
    text.text.replace(next_text.to_string());

    let open = text.open.borrow().clone().expect("mounted text instance has markers");
    let close = text.close.borrow().clone().expect("mounted text instance has markers");
    let parent = open.parent_node().expect("mounted text markers have a parent");

    let mut cursor = open.next_sibling();
    while let Some(node) = cursor {
        if node == close {
            break;
        }
        cursor = node.next_sibling();
        parent.remove_child(&node);
    }
    if !next_text.is_empty() {
        let document = parent.owner_document().expect("mounted nodes have a document");
        parent.insert_before(&document.create_text_node(next_text), Some(&close));
    }
}

pub(crate) fn unmount_text(rt: &Runtime, text: &Rc<TextInstance>) {
    cache::uncache_node(rt, &Instance::Text(text.clone()));
    *text.open.borrow_mut() = None;
    *text.close.borrow_mut() = None;
    *text.host_parent.borrow_mut() = None;
}

/// Materialise an empty render as its placeholder comment.
pub(crate) fn mount_empty(
    rt: &Runtime,
    empty: &Rc<EmptyInstance>,
    host_parent: Option<&Instance>,
    container: &Container,
) -> LazyTree {
    let instance = Instance::Empty(empty.clone());
    empty.id.set(rt.next_instance_id());
    instance.set_host_parent(host_parent);
    empty.dom_id.set(container.next_dom_id());

    let document = container.document();
    let node = document.create_comment(&empty_marker(empty.dom_id.get()));
    *empty.node.borrow_mut() = Some(node.clone());
    cache::precache_node(rt, &instance, &node);
    LazyTree::new(node, document.document_mode().is_some())
}

pub(crate) fn unmount_empty(rt: &Runtime, empty: &Rc<EmptyInstance>) {
    cache::uncache_node(rt, &Instance::Empty(empty.clone()));
    *empty.node.borrow_mut() = None;
    *empty.host_parent.borrow_mut() = None;
}

/// One operation of a child diff, referencing the sibling span it lands
/// after (`None` means the front of the parent).
pub(crate) enum ChildOp {
    /// Attach a newly-mounted subtree.
    Insert {
        /// The subtree to attach.
        tree: LazyTree,
        /// The node the insertion follows.
        after: Option<DomNode>,
    },
    /// Relocate a preserved child's span.
    Move {
        /// The span to relocate.
        span: NodeSpan,
        /// The node the move lands after.
        after: Option<DomNode>,
    },
    /// Detach a removed child's span.
    Remove {
        /// The span to detach.
        span: NodeSpan,
    },
}

fn insertion_reference(parent: &DomNode, after: &Option<DomNode>) -> Option<DomNode> {
    match after {
        Some(node) => node.next_sibling(),
        None => parent.first_child(),
    }
}

/// Apply a child diff's op queue against the parent node, in order.
pub(crate) fn process_updates(parent: &DomNode, ops: Vec<ChildOp>) {
    for op in ops {
        match op {
            ChildOp::Insert { tree, after } => {
                let reference = insertion_reference(parent, &after);
                insert_tree_before(parent, tree, reference.as_ref());
            }
            ChildOp::Move { span, after } => {
                let reference = insertion_reference(parent, &after);
                for node in span.collect_nodes() {
                    parent.insert_before(&node, reference.as_ref());
                }
            }
            ChildOp::Remove { span } => {
                for node in span.collect_nodes() {
                    parent.remove_child(&node);
                }
            }
        }
    }
}

/// Replace a mounted span with a freshly-built subtree in place; the path a
/// composite takes when its re-render produces an incompatible child.
pub(crate) fn replace_node_with_markup(old: NodeSpan, tree: LazyTree) {
    let parent = old.first_node().parent_node().expect("replaced span has a parent");
    insert_tree_before(&parent, tree, Some(old.first_node()));
    for node in old.collect_nodes() {
        parent.remove_child(&node);
    }
}
