//! Element descriptors: immutable values describing what should exist at a
//! point in time, plus the factory that builds them and the shared
//! should-update predicate that decides whether an existing instance can
//! absorb a new descriptor.

use crate::{
    component::{ComponentClass, Public},
    record::{Record, Value},
};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::Rc,
};

/// A renderable value: what `render` returns and what child slots hold.
#[derive(Clone, PartialEq)]
pub enum View {
    /// Render nothing; realised as a comment placeholder so the slot keeps
    /// its identity.
    Empty,
    /// A text run.
    Text(String),
    /// An element descriptor.
    Element(Element),
}

impl View {
    /// The element's key, when this is a keyed element.
    pub fn key(&self) -> Option<&str> {
        match self {
            View::Element(e) => e.key(),
            _ => None,
        }
    }
}

impl Debug for View {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            View::Empty => f.write_str("<empty>"),
            View::Text(t) => write!(f, "text({:?})", t),
            View::Element(e) => Debug::fmt(e, f),
        }
    }
}

impl From<Element> for View {
    fn from(e: Element) -> Self {
        View::Element(e)
    }
}

impl From<&str> for View {
    fn from(s: &str) -> Self {
        View::Text(s.to_string())
    }
}

impl From<String> for View {
    fn from(s: String) -> Self {
        View::Text(s)
    }
}

impl From<i64> for View {
    fn from(n: i64) -> Self {
        View::Text(n.to_string())
    }
}

impl From<f64> for View {
    fn from(n: f64) -> Self {
        View::Text(n.to_string())
    }
}

/// A function component: props and context in, view out.
pub type StatelessFn = dyn Fn(&Record, &Record) -> View;

/// The callable half of a composite element's type: either a class object
/// carrying the component marker, or a bare stateless function.
#[derive(Clone)]
pub enum ComponentKind {
    /// A full component with lifecycle and state.
    Class(Rc<dyn ComponentClass>),
    /// A bare callable; wrapped in a shim whose only behaviour is rendering.
    Stateless(Rc<StatelessFn>),
}

impl ComponentKind {
    /// Wrap a class object.
    pub fn class(class: impl ComponentClass + 'static) -> Self {
        ComponentKind::Class(Rc::new(class))
    }

    /// Wrap a stateless function.
    pub fn stateless(f: impl Fn(&Record, &Record) -> View + 'static) -> Self {
        ComponentKind::Stateless(Rc::new(f))
    }

    /// Identity comparison; descriptors of the same kind share one allocation.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (ComponentKind::Class(a), ComponentKind::Class(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            (ComponentKind::Stateless(a), ComponentKind::Stateless(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }

    /// A name for diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            ComponentKind::Class(c) => c.display_name().to_string(),
            ComponentKind::Stateless(..) => "StatelessComponent".to_string(),
        }
    }
}

impl Debug for ComponentKind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&self.display_name())
    }
}

/// What an element describes: a host tag or a composite type.
#[derive(Clone, Debug)]
pub enum ElementKind {
    /// A host element, e.g. `"div"`.
    Host(String),
    /// A composite element.
    Composite(ComponentKind),
}

impl ElementKind {
    /// Whether two kinds denote the same type (tag equality for hosts,
    /// identity for composites).
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (ElementKind::Host(a), ElementKind::Host(b)) => a == b,
            (ElementKind::Composite(a), ElementKind::Composite(b)) => a.same(b),
            _ => false,
        }
    }

    /// A name for diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            ElementKind::Host(tag) => tag.clone(),
            ElementKind::Composite(kind) => kind.display_name(),
        }
    }
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        ElementKind::Host(tag.to_string())
    }
}

impl From<ComponentKind> for ElementKind {
    fn from(kind: ComponentKind) -> Self {
        ElementKind::Composite(kind)
    }
}

/// Shorthand for a host element kind.
pub fn host(tag: &str) -> ElementKind {
    ElementKind::Host(tag.to_string())
}

struct ElementInner {
    kind: ElementKind,
    key: Option<String>,
    ref_callback: Option<RefCallback>,
    props: Record,
}

/// An immutable element descriptor. Cloning shares the allocation; equality
/// is reference identity.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    /// What this element describes.
    pub fn kind(&self) -> &ElementKind {
        &self.inner.kind
    }

    /// The reconciliation key, if one was given.
    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    /// The ref callback, if one was given.
    pub fn ref_callback(&self) -> Option<&RefCallback> {
        self.inner.ref_callback.as_ref()
    }

    /// The element's props.
    pub fn props(&self) -> &Record {
        &self.inner.props
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Debug for Element {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let mut s = f.debug_struct("Element");
        s.field("kind", &self.inner.kind.display_name());
        if let Some(key) = self.key() {
            s.field("key", &key);
        }
        s.field("props", &self.inner.props).finish()
    }
}

/// Build an element descriptor.
///
/// `key` and `ref` entries are extracted from `config`; the remaining entries
/// become props, layered over the component's declared default props.
/// `children` are folded into `props["children"]`: a single child as the view
/// itself, several as an ordered list.
pub fn create_element(
    kind: impl Into<ElementKind>,
    config: Record,
    children: Vec<View>,
) -> Element {
    let kind = kind.into();
    let mut config = config;

    let key = match config.remove("key") {
        Some(Value::Str(s)) => Some(s),
        Some(Value::Num(n)) => Some(n.to_string()),
        Some(other) => {
            tracing::warn!(?other, "ignoring non-scalar key");
            None
        }
        None => None,
    };
    let ref_callback = match config.remove("ref") {
        Some(Value::Ref(r)) => Some(r),
        Some(other) => {
            tracing::warn!(?other, "ignoring non-callback ref");
            None
        }
        None => None,
    };

    let mut props = match &kind {
        ElementKind::Composite(ComponentKind::Class(class)) => class.default_props(),
        _ => Record::new(),
    };
    props.merge(&config);

    match children.len() {
        0 => {}
        1 => {
            let mut iter = children.into_iter();
            props.insert("children", Value::Node(iter.next().expect("length checked")));
        }
        _ => props.insert(
            "children",
            Value::List(children.into_iter().map(Value::Node).collect()),
        ),
    }

    Element { inner: Rc::new(ElementInner { kind, key, ref_callback, props }) }
}

/// A callback ref: invoked with `Some(public)` when the element mounts and
/// `None` when it unmounts.
#[derive(Clone)]
pub struct RefCallback {
    callback: Rc<dyn Fn(Option<Public>)>,
}

impl RefCallback {
    /// Wrap a callback.
    pub fn new(f: impl Fn(Option<Public>) + 'static) -> Self {
        RefCallback { callback: Rc::new(f) }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.callback) as *const () == Rc::as_ptr(&other.callback) as *const ()
    }

    pub(crate) fn call(&self, value: Option<Public>) {
        (self.callback)(value);
    }
}

impl Debug for RefCallback {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("<ref>")
    }
}

/// The shared should-update predicate: `true` when an existing instance can
/// absorb `next` in place, `false` when the subtree must be replaced.
///
/// Two views are compatible when both are empty, both are text, or both are
/// elements with the same type and the same key.
pub fn should_update_component(prev: &View, next: &View) -> bool {
    match (prev, next) {
        (View::Empty, View::Empty) => true,
        (View::Text(..), View::Text(..)) => true,
        (View::Element(p), View::Element(n)) => {
            p.kind().same(n.kind()) && p.key() == n.key()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn factory_extracts_key_and_folds_children() {
        let el = create_element(
            "ul",
            record! { "key" => "list", "id" => "x" },
            vec![View::from("one"), View::from("two")],
        );
        assert_eq!(el.key(), Some("list"));
        assert!(el.props().get("key").is_none());
        assert_eq!(el.props().get("id").and_then(Value::as_str), Some("x"));
        match el.props().get("children") {
            Some(Value::List(items)) => assert_eq!(items.len(), 2),
            other => panic!("expected a list of children, got {:?}", other),
        }
    }

    #[test]
    fn single_children_fold_to_a_node() {
        let el = create_element("div", Record::new(), vec![View::from("only")]);
        match el.props().get("children") {
            Some(Value::Node(View::Text(t))) => assert_eq!(t, "only"),
            other => panic!("expected a single node child, got {:?}", other),
        }
    }

    #[test]
    fn declared_defaults_sit_under_explicit_config() {
        use crate::component::{Component, ComponentClass, Cx};

        struct DefaultedClass;
        impl ComponentClass for DefaultedClass {
            fn create(&self) -> Box<dyn Component> {
                Box::new(Defaulted)
            }

            fn default_props(&self) -> Record {
                record! { "size" => "medium", "tone" => "plain" }
            }
        }
        struct Defaulted;
        impl Component for Defaulted {
            fn render(&self, _cx: &Cx) -> View {
                View::Empty
            }
        }

        let el = create_element(
            ComponentKind::class(DefaultedClass),
            record! { "tone" => "loud" },
            vec![],
        );
        assert_eq!(el.props().get("size").and_then(Value::as_str), Some("medium"));
        assert_eq!(el.props().get("tone").and_then(Value::as_str), Some("loud"));
    }

    #[test]
    fn should_update_matches_on_type_and_key() {
        let a = create_element("div", record! { "key" => "a" }, vec![]);
        let a2 = create_element("div", record! { "key" => "a" }, vec![]);
        let b = create_element("div", record! { "key" => "b" }, vec![]);
        let span = create_element("span", record! { "key" => "a" }, vec![]);

        assert!(should_update_component(&View::Element(a.clone()), &View::Element(a2)));
        assert!(!should_update_component(&View::Element(a.clone()), &View::Element(b)));
        assert!(!should_update_component(&View::Element(a), &View::Element(span)));
        assert!(should_update_component(&View::Empty, &View::Empty));
        assert!(should_update_component(&View::from("x"), &View::from("y")));
        assert!(!should_update_component(&View::from("x"), &View::Empty));
    }
}
