//! Internal instances: the mutable shadow tree the reconciler owns, one node
//! per live descriptor. Handles are cheap clones; parent links are weak and
//! cleared on unmount, so the root of a mounted tree owns all descendants.

use crate::{
    component::{Callback, ComponentCell, ComponentHandle, Public, StatePatch},
    element::{ComponentKind, Element, ElementKind, RefCallback, View},
    host::Container,
    record::Record,
};
use std::{
    cell::{Cell, RefCell},
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::{Rc, Weak},
};
use twigdom::Node as DomNode;

/// The shadow node behind a composite descriptor: owns lifecycle state, the
/// public instance, and the single child produced by `render`.
pub struct CompositeInstance {
    pub(crate) id: Cell<u64>,
    pub(crate) element: RefCell<Element>,
    pub(crate) kind: ComponentKind,
    pub(crate) component: ComponentCell,
    pub(crate) rendered: RefCell<Option<Instance>>,
    pub(crate) state: RefCell<Record>,
    /// The full, unmasked ancestor context this instance mounted or last
    /// updated with.
    pub(crate) context: RefCell<Record>,
    pub(crate) pending_state: RefCell<Option<Vec<StatePatch>>>,
    pub(crate) pending_replace_state: Cell<bool>,
    pub(crate) pending_force_update: Cell<bool>,
    pub(crate) pending_element: RefCell<Option<Element>>,
    pub(crate) pending_callbacks: RefCell<Vec<Callback>>,
    pub(crate) mount_order: Cell<u64>,
    pub(crate) mount_index: Cell<usize>,
    pub(crate) host_parent: RefCell<Option<WeakInstance>>,
    pub(crate) container: RefCell<Option<Container>>,
    pub(crate) top_level_wrapper: Cell<bool>,
}

impl CompositeInstance {
    fn new(element: Element, kind: ComponentKind) -> Rc<Self> {
        Rc::new(CompositeInstance {
            id: Cell::new(0),
            element: RefCell::new(element),
            kind,
            component: Rc::new(RefCell::new(None)),
            rendered: RefCell::new(None),
            state: RefCell::new(Record::new()),
            context: RefCell::new(Record::new()),
            pending_state: RefCell::new(None),
            pending_replace_state: Cell::new(false),
            pending_force_update: Cell::new(false),
            pending_element: RefCell::new(None),
            pending_callbacks: RefCell::new(Vec::new()),
            mount_order: Cell::new(0),
            mount_index: Cell::new(0),
            host_parent: RefCell::new(None),
            container: RefCell::new(None),
            top_level_wrapper: Cell::new(false),
        })
    }

    /// The public handle sharing this instance's component cell.
    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle::new(self.component.clone())
    }

    pub(crate) fn take_pending_callbacks(&self) -> Vec<Callback> {
        std::mem::take(&mut *self.pending_callbacks.borrow_mut())
    }

    pub(crate) fn display_name(&self) -> String {
        self.kind.display_name()
    }
}

/// The shadow node behind a host (tag) descriptor.
pub struct HostInstance {
    pub(crate) id: Cell<u64>,
    pub(crate) element: RefCell<Element>,
    pub(crate) tag: RefCell<String>,
    pub(crate) namespace: Cell<twigdom::Namespace>,
    pub(crate) node: RefCell<Option<DomNode>>,
    pub(crate) dom_id: Cell<u32>,
    pub(crate) children: RefCell<Vec<(String, Instance)>>,
    pub(crate) previous_style: RefCell<Option<Record>>,
    pub(crate) content_is_html: Cell<bool>,
    pub(crate) children_precached: Cell<bool>,
    pub(crate) mount_index: Cell<usize>,
    pub(crate) host_parent: RefCell<Option<WeakInstance>>,
    pub(crate) container: RefCell<Option<Container>>,
}

impl HostInstance {
    fn new(element: Element, tag: String) -> Rc<Self> {
        Rc::new(HostInstance {
            id: Cell::new(0),
            element: RefCell::new(element),
            tag: RefCell::new(tag),
            namespace: Cell::new(twigdom::Namespace::Html),
            node: RefCell::new(None),
            dom_id: Cell::new(0),
            children: RefCell::new(Vec::new()),
            previous_style: RefCell::new(None),
            content_is_html: Cell::new(false),
            children_precached: Cell::new(false),
            mount_index: Cell::new(0),
            host_parent: RefCell::new(None),
            container: RefCell::new(None),
        })
    }

    /// The mounted DOM node. Panics if called before mount or after unmount.
    pub fn dom_node(&self) -> DomNode {
        self.node.borrow().clone().expect("host instance has no mounted node")
    }
}

/// The shadow node behind a text run, realised as a comment-delimited span so
/// the text can be retargeted in place without disturbing sibling identity.
pub struct TextInstance {
    pub(crate) id: Cell<u64>,
    pub(crate) text: RefCell<String>,
    pub(crate) dom_id: Cell<u32>,
    pub(crate) open: RefCell<Option<DomNode>>,
    pub(crate) close: RefCell<Option<DomNode>>,
    pub(crate) mount_index: Cell<usize>,
    pub(crate) host_parent: RefCell<Option<WeakInstance>>,
}

impl TextInstance {
    fn new(text: String) -> Rc<Self> {
        Rc::new(TextInstance {
            id: Cell::new(0),
            text: RefCell::new(text),
            dom_id: Cell::new(0),
            open: RefCell::new(None),
            close: RefCell::new(None),
            mount_index: Cell::new(0),
            host_parent: RefCell::new(None),
        })
    }
}

/// The shadow node behind an empty render: a comment placeholder that keeps
/// the slot's identity.
pub struct EmptyInstance {
    pub(crate) id: Cell<u64>,
    pub(crate) dom_id: Cell<u32>,
    pub(crate) node: RefCell<Option<DomNode>>,
    pub(crate) mount_index: Cell<usize>,
    pub(crate) host_parent: RefCell<Option<WeakInstance>>,
}

impl EmptyInstance {
    fn new() -> Rc<Self> {
        Rc::new(EmptyInstance {
            id: Cell::new(0),
            dom_id: Cell::new(0),
            node: RefCell::new(None),
            mount_index: Cell::new(0),
            host_parent: RefCell::new(None),
        })
    }
}

/// A handle to an internal instance of any variant.
#[derive(Clone)]
pub enum Instance {
    /// A composite instance.
    Composite(Rc<CompositeInstance>),
    /// A host instance.
    Host(Rc<HostInstance>),
    /// A text instance.
    Text(Rc<TextInstance>),
    /// An empty-render placeholder instance.
    Empty(Rc<EmptyInstance>),
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Instance::Composite(c) => write!(f, "Composite({}, id {})", c.display_name(), c.id.get()),
            Instance::Host(h) => write!(f, "Host(<{}>, id {})", h.tag.borrow(), h.id.get()),
            Instance::Text(t) => write!(f, "Text({:?}, id {})", t.text.borrow(), t.id.get()),
            Instance::Empty(e) => write!(f, "Empty(id {})", e.id.get()),
        }
    }
}

/// Decide which variant of internal instance realises `view`, and build it.
pub fn instantiate(view: &View) -> Instance {
    match view {
        View::Empty => Instance::Empty(EmptyInstance::new()),
        View::Text(text) => Instance::Text(TextInstance::new(text.clone())),
        View::Element(element) => match element.kind() {
            ElementKind::Host(tag) => {
                Instance::Host(HostInstance::new(element.clone(), tag.clone()))
            }
            ElementKind::Composite(kind) => {
                Instance::Composite(CompositeInstance::new(element.clone(), kind.clone()))
            }
        },
    }
}

impl Instance {
    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        match (self, other) {
            (Instance::Composite(a), Instance::Composite(b)) => Rc::ptr_eq(a, b),
            (Instance::Host(a), Instance::Host(b)) => Rc::ptr_eq(a, b),
            (Instance::Text(a), Instance::Text(b)) => Rc::ptr_eq(a, b),
            (Instance::Empty(a), Instance::Empty(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The instance's runtime-unique id, assigned at mount. This is the key
    /// the listener bank indexes by.
    pub fn id(&self) -> u64 {
        match self {
            Instance::Composite(c) => c.id.get(),
            Instance::Host(h) => h.id.get(),
            Instance::Text(t) => t.id.get(),
            Instance::Empty(e) => e.id.get(),
        }
    }

    pub(crate) fn set_id(&self, id: u64) {
        match self {
            Instance::Composite(c) => c.id.set(id),
            Instance::Host(h) => h.id.set(id),
            Instance::Text(t) => t.id.set(id),
            Instance::Empty(e) => e.id.set(id),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakInstance {
        match self {
            Instance::Composite(c) => WeakInstance::Composite(Rc::downgrade(c)),
            Instance::Host(h) => WeakInstance::Host(Rc::downgrade(h)),
            Instance::Text(t) => WeakInstance::Text(Rc::downgrade(t)),
            Instance::Empty(e) => WeakInstance::Empty(Rc::downgrade(e)),
        }
    }

    /// The nearest enclosing host ancestor, while mounted.
    pub fn host_parent(&self) -> Option<Instance> {
        let parent = match self {
            Instance::Composite(c) => c.host_parent.borrow().clone(),
            Instance::Host(h) => h.host_parent.borrow().clone(),
            Instance::Text(t) => t.host_parent.borrow().clone(),
            Instance::Empty(e) => e.host_parent.borrow().clone(),
        };
        parent.and_then(|w| w.upgrade())
    }

    pub(crate) fn set_host_parent(&self, parent: Option<&Instance>) {
        let weak = parent.map(Instance::downgrade);
        match self {
            Instance::Composite(c) => *c.host_parent.borrow_mut() = weak,
            Instance::Host(h) => *h.host_parent.borrow_mut() = weak,
            Instance::Text(t) => *t.host_parent.borrow_mut() = weak,
            Instance::Empty(e) => *e.host_parent.borrow_mut() = weak,
        }
    }

    pub(crate) fn mount_index(&self) -> usize {
        match self {
            Instance::Composite(c) => c.mount_index.get(),
            Instance::Host(h) => h.mount_index.get(),
            Instance::Text(t) => t.mount_index.get(),
            Instance::Empty(e) => e.mount_index.get(),
        }
    }

    pub(crate) fn set_mount_index(&self, index: usize) {
        match self {
            Instance::Composite(c) => c.mount_index.set(index),
            Instance::Host(h) => h.mount_index.set(index),
            Instance::Text(t) => t.mount_index.set(index),
            Instance::Empty(e) => e.mount_index.set(index),
        }
    }

    /// The view this instance currently realises, for should-update
    /// comparisons against incoming descriptors.
    pub(crate) fn rendered_view(&self) -> View {
        match self {
            Instance::Composite(c) => View::Element(c.element.borrow().clone()),
            Instance::Host(h) => View::Element(h.element.borrow().clone()),
            Instance::Text(t) => View::Text(t.text.borrow().clone()),
            Instance::Empty(..) => View::Empty,
        }
    }

    /// The descriptor's ref callback, for composites and hosts.
    pub(crate) fn element_ref(&self) -> Option<RefCallback> {
        match self {
            Instance::Composite(c) => c.element.borrow().ref_callback().cloned(),
            Instance::Host(h) => h.element.borrow().ref_callback().cloned(),
            _ => None,
        }
    }

    /// The public value a ref or mount caller sees for this instance.
    pub(crate) fn public(&self) -> Option<Public> {
        match self {
            Instance::Composite(c) => Some(Public::Component(c.handle())),
            Instance::Host(h) => h.node.borrow().clone().map(Public::Node),
            _ => None,
        }
    }

    /// The span of DOM nodes this instance occupies, drilling through
    /// composites to the host level.
    pub fn host_node(&self) -> Option<NodeSpan> {
        match self {
            Instance::Composite(c) => c.rendered.borrow().as_ref().and_then(Instance::host_node),
            Instance::Host(h) => h.node.borrow().clone().map(NodeSpan::Single),
            Instance::Text(t) => {
                let open = t.open.borrow().clone()?;
                let close = t.close.borrow().clone()?;
                Some(NodeSpan::Delimited(open, close))
            }
            Instance::Empty(e) => e.node.borrow().clone().map(NodeSpan::Single),
        }
    }

    pub(crate) fn as_composite(&self) -> Option<&Rc<CompositeInstance>> {
        match self {
            Instance::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn as_host(&self) -> Option<&Rc<HostInstance>> {
        match self {
            Instance::Host(h) => Some(h),
            _ => None,
        }
    }
}

/// A non-owning instance handle; parent links use this so child-to-parent
/// edges never keep a tree alive.
#[derive(Clone)]
pub enum WeakInstance {
    /// Weak composite handle.
    Composite(Weak<CompositeInstance>),
    /// Weak host handle.
    Host(Weak<HostInstance>),
    /// Weak text handle.
    Text(Weak<TextInstance>),
    /// Weak empty handle.
    Empty(Weak<EmptyInstance>),
}

impl WeakInstance {
    /// Upgrade to a strong handle if the instance is still alive.
    pub fn upgrade(&self) -> Option<Instance> {
        match self {
            WeakInstance::Composite(w) => w.upgrade().map(Instance::Composite),
            WeakInstance::Host(w) => w.upgrade().map(Instance::Host),
            WeakInstance::Text(w) => w.upgrade().map(Instance::Text),
            WeakInstance::Empty(w) => w.upgrade().map(Instance::Empty),
        }
    }
}

/// The DOM footprint of one instance: a single node, or a comment-delimited
/// run of siblings for text instances.
#[derive(Clone, Debug)]
pub enum NodeSpan {
    /// One node.
    Single(DomNode),
    /// Every sibling from the opening marker through the closing marker.
    Delimited(DomNode, DomNode),
}

impl NodeSpan {
    /// The first DOM node of the span.
    pub fn first_node(&self) -> &DomNode {
        match self {
            NodeSpan::Single(n) => n,
            NodeSpan::Delimited(open, ..) => open,
        }
    }

    /// The last DOM node of the span; what an insertion "after this child"
    /// must follow.
    pub fn last_node(&self) -> &DomNode {
        match self {
            NodeSpan::Single(n) => n,
            NodeSpan::Delimited(.., close) => close,
        }
    }

    /// Every node of the span in order, collected by walking siblings.
    pub fn collect_nodes(&self) -> Vec<DomNode> {
        match self {
            NodeSpan::Single(n) => vec![n.clone()],
            NodeSpan::Delimited(open, close) => {
                let mut nodes = vec![open.clone()];
                let mut cursor = open.next_sibling();
                while let Some(n) = cursor {
                    let done = n == *close;
                    nodes.push(n.clone());
                    if done {
                        break;
                    }
                    cursor = n.next_sibling();
                }
                nodes
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{create_element, host};
    use crate::record::Record;

    #[test]
    fn instantiate_picks_the_matching_variant() {
        assert!(matches!(instantiate(&View::Empty), Instance::Empty(..)));
        assert!(matches!(instantiate(&View::from("hi")), Instance::Text(..)));

        let div = create_element(host("div"), Record::new(), vec![]);
        assert!(matches!(instantiate(&View::Element(div)), Instance::Host(..)));

        let f = crate::element::ComponentKind::stateless(|_, _| View::Empty);
        let comp = create_element(f, Record::new(), vec![]);
        assert!(matches!(instantiate(&View::Element(comp)), Instance::Composite(..)));
    }
}
