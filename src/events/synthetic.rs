//! Pooled synthetic events: normalised, host-agnostic event values handed to
//! user listeners, recycled after every dispatch unless persisted.

use crate::{instance::Instance, pool::Poolable};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::Rc,
};
use twigdom::event::Detail;

/// A user event listener. Compares by identity.
#[derive(Clone)]
pub struct Handler {
    callback: Rc<dyn Fn(&mut SyntheticEvent)>,
}

impl Handler {
    /// Wrap a listener function.
    pub fn new(f: impl Fn(&mut SyntheticEvent) + 'static) -> Self {
        Handler { callback: Rc::new(f) }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.callback) as *const () == Rc::as_ptr(&other.callback) as *const ()
    }

    pub(crate) fn call(&self, event: &mut SyntheticEvent) {
        (self.callback)(event);
    }
}

impl Debug for Handler {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("<handler>")
    }
}

/// A normalised event synthesised from a native one.
///
/// Synthetic events are pooled: after the dispatch that produced one
/// completes, its fields are nulled and the object is recycled. A listener
/// that wants to read the event after its own frame returns must call
/// [`SyntheticEvent::persist`].
#[derive(Default)]
pub struct SyntheticEvent {
    pub(crate) event_name: String,
    pub(crate) native_name: String,
    pub(crate) bubbles: bool,
    pub(crate) cancelable: bool,
    pub(crate) detail: Option<Detail>,
    pub(crate) native: Option<twigdom::event::Event>,
    pub(crate) target_instance: Option<Instance>,
    pub(crate) target_node: Option<twigdom::Node>,
    pub(crate) current_instance: Option<Instance>,
    pub(crate) dispatch_listeners: Vec<Handler>,
    pub(crate) dispatch_instances: Vec<Instance>,
    propagation_stopped: bool,
    default_prevented: bool,
    persistent: bool,
}

impl SyntheticEvent {
    /// The synthetic event name, e.g. `"click"`.
    pub fn name(&self) -> &str {
        &self.event_name
    }

    /// The native event name this was extracted from.
    pub fn native_name(&self) -> &str {
        &self.native_name
    }

    /// Whether the underlying native event bubbles.
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The normalised payload copied from the native event.
    pub fn detail(&self) -> Option<&Detail> {
        self.detail.as_ref()
    }

    /// The key value, when this is a keyboard event.
    pub fn key(&self) -> Option<&str> {
        match self.detail() {
            Some(Detail::Key(k)) => Some(&k.key),
            _ => None,
        }
    }

    /// The button, when this is a pointer event.
    pub fn button(&self) -> Option<i16> {
        match self.detail() {
            Some(Detail::Mouse(m)) => Some(m.button),
            _ => None,
        }
    }

    /// The internal instance the event targets.
    pub fn target_instance(&self) -> Option<&Instance> {
        self.target_instance.as_ref()
    }

    /// The DOM node the native event targeted.
    pub fn target_node(&self) -> Option<&twigdom::Node> {
        self.target_node.as_ref()
    }

    /// The instance whose listener is currently running.
    pub fn current_instance(&self) -> Option<&Instance> {
        self.current_instance.as_ref()
    }

    /// Halt the remaining dispatches of this event.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether propagation has been stopped.
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// The native event this was synthesised from.
    pub fn native_event(&self) -> Option<&twigdom::event::Event> {
        self.native.as_ref()
    }

    /// Mark the default action suppressed, on this event and on the native
    /// event underneath it.
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
        if let Some(native) = &self.native {
            native.prevent_default();
        }
    }

    /// Whether the default action was suppressed.
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Keep this event's fields intact after dispatch instead of recycling
    /// them into the pool.
    pub fn persist(&mut self) {
        self.persistent = true;
    }

    /// Whether [`SyntheticEvent::persist`] was called.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

impl Poolable for SyntheticEvent {
    fn destructor(&mut self) {
        self.event_name.clear();
        self.native_name.clear();
        self.bubbles = false;
        self.cancelable = false;
        self.detail = None;
        self.native = None;
        self.target_instance = None;
        self.target_node = None;
        self.current_instance = None;
        self.dispatch_listeners.clear();
        self.dispatch_instances.clear();
        self.propagation_stopped = false;
        self.default_prevented = false;
        self.persistent = false;
    }
}

impl Debug for SyntheticEvent {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("SyntheticEvent")
            .field("name", &self.event_name)
            .field("native", &self.native_name)
            .field("dispatches", &self.dispatch_listeners.len())
            .finish()
    }
}
