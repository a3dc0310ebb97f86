//! Native-style events: records, listeners, and the dispatch plumbing used by
//! [`crate::Node::dispatch`].

use crate::{Node, NodeInner};
use std::{
    cell::{Cell, RefCell},
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Payload carried by pointer events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MouseDetail {
    /// Which button was involved, `0` for the primary button.
    pub button: i16,
    /// Viewport-relative x coordinate.
    pub client_x: f64,
    /// Viewport-relative y coordinate.
    pub client_y: f64,
    /// The node the pointer came from or moves to, for boundary events.
    pub related_target: Option<Node>,
}

/// Payload carried by keyboard events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyDetail {
    /// The logical key value, e.g. `"a"` or `"Enter"`.
    pub key: String,
    /// Whether the key is auto-repeating.
    pub repeat: bool,
    /// Shift modifier state.
    pub shift: bool,
    /// Control modifier state.
    pub ctrl: bool,
    /// Alt modifier state.
    pub alt: bool,
    /// Meta modifier state.
    pub meta: bool,
}

/// Event-class-specific payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Detail {
    /// No extra payload.
    None,
    /// Pointer payload.
    Mouse(MouseDetail),
    /// Keyboard payload.
    Key(KeyDetail),
}

struct EventInner {
    name: String,
    bubbles: bool,
    cancelable: bool,
    detail: Detail,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

/// A native-style event, dispatched through the document tree with capture,
/// target, and bubble phases. Clones share the same underlying event, so
/// flags like `default_prevented` are visible through every handle.
#[derive(Clone)]
pub struct Event {
    inner: Rc<EventInner>,
}

impl Debug for Event {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("bubbles", &self.inner.bubbles)
            .field("detail", &self.inner.detail)
            .finish()
    }
}

impl Event {
    /// Construct an event from scratch. The convenience constructors below
    /// cover the common names with their usual flag combinations.
    pub fn new(name: impl Into<String>, bubbles: bool, cancelable: bool) -> Self {
        Event {
            inner: Rc::new(EventInner {
                name: name.into(),
                bubbles,
                cancelable,
                detail: Detail::None,
                target: RefCell::new(None),
                current_target: RefCell::new(None),
                propagation_stopped: Cell::new(false),
                default_prevented: Cell::new(false),
            }),
        }
    }

    /// A primary-button click.
    pub fn click() -> Self {
        Event::new("click", true, true).with_detail(Detail::Mouse(MouseDetail::default()))
    }

    /// A double click.
    pub fn dblclick() -> Self {
        Event::new("dblclick", true, true).with_detail(Detail::Mouse(MouseDetail::default()))
    }

    /// A mouse-button press.
    pub fn mouse_down() -> Self {
        Event::new("mousedown", true, true).with_detail(Detail::Mouse(MouseDetail::default()))
    }

    /// A mouse-button release.
    pub fn mouse_up() -> Self {
        Event::new("mouseup", true, true).with_detail(Detail::Mouse(MouseDetail::default()))
    }

    /// A pointer crossing into a node, with the node it left.
    pub fn mouse_over(from: Option<Node>) -> Self {
        Event::new("mouseover", true, true).with_detail(Detail::Mouse(MouseDetail {
            related_target: from,
            ..MouseDetail::default()
        }))
    }

    /// A pointer crossing out of a node, with the node it enters.
    pub fn mouse_out(to: Option<Node>) -> Self {
        Event::new("mouseout", true, true).with_detail(Detail::Mouse(MouseDetail {
            related_target: to,
            ..MouseDetail::default()
        }))
    }

    /// A key press.
    pub fn key_down(key: &str) -> Self {
        Event::new("keydown", true, true)
            .with_detail(Detail::Key(KeyDetail { key: key.to_string(), ..KeyDetail::default() }))
    }

    /// A key release.
    pub fn key_up(key: &str) -> Self {
        Event::new("keyup", true, true)
            .with_detail(Detail::Key(KeyDetail { key: key.to_string(), ..KeyDetail::default() }))
    }

    /// A text-input notification.
    pub fn input() -> Self {
        Event::new("input", true, false)
    }

    /// A committed value change.
    pub fn change() -> Self {
        Event::new("change", true, false)
    }

    /// Focus gained; does not bubble.
    pub fn focus() -> Self {
        Event::new("focus", false, false)
    }

    /// Focus lost; does not bubble.
    pub fn blur() -> Self {
        Event::new("blur", false, false)
    }

    /// A form submission.
    pub fn submit() -> Self {
        Event::new("submit", true, true)
    }

    /// A scroll notification; does not bubble.
    pub fn scroll() -> Self {
        Event::new("scroll", false, false)
    }

    /// Attach a payload to the event; only meaningful before dispatch.
    pub fn with_detail(self, detail: Detail) -> Self {
        // events are built then dispatched; the payload is fixed at build time
        let inner = Rc::try_unwrap(self.inner).unwrap_or_else(|shared| {
            panic!("with_detail called on an already-shared event {:?}", shared.name)
        });
        Event { inner: Rc::new(EventInner { detail, ..inner }) }
    }

    /// The event name, e.g. `"click"`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the event runs a bubble phase.
    pub fn bubbles(&self) -> bool {
        self.inner.bubbles
    }

    /// Whether `prevent_default` has any effect.
    pub fn cancelable(&self) -> bool {
        self.inner.cancelable
    }

    /// The event payload.
    pub fn detail(&self) -> &Detail {
        &self.inner.detail
    }

    /// The node the event was dispatched against.
    pub fn target(&self) -> Option<Node> {
        self.inner.target.borrow().clone()
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> Option<Node> {
        self.inner.current_target.borrow().clone()
    }

    /// Stop the event from visiting further nodes.
    pub fn stop_propagation(&self) {
        self.inner.propagation_stopped.set(true);
    }

    /// Whether propagation has been stopped.
    pub fn propagation_stopped(&self) -> bool {
        self.inner.propagation_stopped.get()
    }

    /// Mark the default action as suppressed.
    pub fn prevent_default(&self) {
        if self.inner.cancelable {
            self.inner.default_prevented.set(true);
        }
    }

    /// Whether the default action was suppressed.
    pub fn default_prevented(&self) -> bool {
        self.inner.default_prevented.get()
    }

    pub(crate) fn set_target(&self, target: Node) {
        *self.inner.target.borrow_mut() = Some(target);
    }

    fn set_current_target(&self, target: Node) {
        *self.inner.current_target.borrow_mut() = Some(target);
    }
}

pub(crate) struct ListenerEntry {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) capture: bool,
    pub(crate) handler: Rc<dyn Fn(&Event)>,
}

/// Which leg of dispatch a listener invocation belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    Capture,
    Target,
    Bubble,
}

/// A registered listener. Dropping the handle detaches the listener.
#[must_use = "dropping the handle detaches the listener"]
pub struct EventHandle {
    node: Weak<NodeInner>,
    id: u64,
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.node.upgrade() {
            inner.listeners.borrow_mut().retain(|entry| entry.id != self.id);
        }
    }
}

pub(crate) fn add_listener(
    node: &Node,
    name: String,
    capture: bool,
    handler: Rc<dyn Fn(&Event)>,
) -> EventHandle {
    let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
    node.inner.listeners.borrow_mut().push(ListenerEntry { id, name, capture, handler });
    EventHandle { node: node.downgrade(), id }
}

pub(crate) fn invoke_listeners(node: &Node, event: &Event, phase: Phase) {
    // snapshot so handlers can attach or detach listeners mid-dispatch
    let matching: Vec<Rc<dyn Fn(&Event)>> = node
        .inner
        .listeners
        .borrow()
        .iter()
        .filter(|entry| entry.name == event.name())
        .filter(|entry| match phase {
            Phase::Capture => entry.capture,
            Phase::Bubble => !entry.capture,
            Phase::Target => true,
        })
        .map(|entry| entry.handler.clone())
        .collect();

    if matching.is_empty() {
        return;
    }
    event.set_current_target(node.clone());
    for handler in matching {
        handler(event);
    }
}
