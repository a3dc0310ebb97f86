//! The top-level listener shim: exactly one native listener per (document,
//! event name), normalising every native dispatch into the plugin hub behind
//! a pooled bookkeeping record and a batched-updates bracket.

use crate::{
    cache,
    events::hub,
    instance::Instance,
    pool::Poolable,
    runtime::Runtime,
};
use std::rc::Rc;
use tracing::trace;

/// Native events that do not bubble; their document-level trap listens in the
/// capture phase instead.
const CAPTURE_TRAPPED: &[&str] = &["focus", "blur", "scroll"];

/// Pooled per-dispatch record: the trapped event name and the chain of target
/// instances across nested roots.
#[derive(Default)]
pub(crate) struct TopLevelBookkeeping {
    pub(crate) top_level_type: String,
    pub(crate) ancestors: Vec<Instance>,
}

impl Poolable for TopLevelBookkeeping {
    fn destructor(&mut self) {
        self.top_level_type.clear();
        self.ancestors.clear();
    }
}

/// Ensure native listeners exist on `document` for every dependency of
/// `registration_name`.
pub(crate) fn listen_to(rt: &Runtime, document: &twigdom::Document, registration_name: &str) {
    let dependencies = match rt.inner.registry.borrow().registration(registration_name) {
        Some(info) => info.dependencies.clone(),
        None => return,
    };
    for dependency in dependencies {
        listen_to_event(rt, document, &dependency);
    }
}

/// Attach the document-level trap for one native event name, once per
/// (document, name) pair for the runtime's lifetime.
pub(crate) fn listen_to_event(rt: &Runtime, document: &twigdom::Document, native_name: &str) {
    if !rt.mark_listening(document.id(), native_name) {
        return;
    }
    trace!(native_name, document = document.id(), "attaching top-level trap");

    let capture = CAPTURE_TRAPPED.contains(&native_name);
    let weak = rt.downgrade();
    let name = native_name.to_string();
    let handle = document.as_node().add_event_listener(
        native_name,
        capture,
        Rc::new(move |native: &twigdom::event::Event| {
            if let Some(rt) = weak.upgrade() {
                dispatch_trapped(&rt, &name, native);
            }
        }),
    );
    rt.store_listener_handle(handle);
}

/// The body of every top-level trap.
fn dispatch_trapped(rt: &Runtime, top_level: &str, native: &twigdom::event::Event) {
    if !rt.events_enabled() {
        return;
    }

    let mut book = rt.acquire_bookkeeping();
    book.top_level_type.push_str(top_level);

    let target_node = native.target();
    let target = target_node.as_ref().and_then(|n| cache::closest_instance_from_node(rt, n));

    // a node may live inside a nested mount; accumulate the target chain
    // across enclosing roots, innermost first
    let mut cursor = target.clone();
    while let Some(instance) = cursor {
        book.ancestors.push(instance.clone());
        cursor = parent_beyond_root(rt, &instance);
    }

    rt.batched_updates(|| {
        if book.ancestors.is_empty() {
            handle_top_level(rt, &book.top_level_type, None, native);
        } else {
            for instance in &book.ancestors {
                handle_top_level(rt, &book.top_level_type, Some(instance), native);
            }
        }
    });

    rt.release_bookkeeping(book);
}

/// From an instance inside one root, the closest instance enclosing that
/// root's container, if the container is itself mounted inside another tree.
fn parent_beyond_root(rt: &Runtime, instance: &Instance) -> Option<Instance> {
    let mut topmost = instance.clone();
    while let Some(parent) = topmost.host_parent() {
        topmost = parent;
    }
    let root_node = cache::node_from_instance(rt, &topmost);
    let container = root_node.parent_node()?;
    cache::closest_instance_from_node(rt, &container)
}

fn handle_top_level(
    rt: &Runtime,
    top_level: &str,
    target: Option<&Instance>,
    native: &twigdom::event::Event,
) {
    let events = hub::extract_events(rt, top_level, target, native);
    hub::enqueue_events(rt, events);
    hub::process_event_queue(rt);
}
