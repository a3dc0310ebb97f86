//! Propagation: walking the internal instance tree (not the DOM) to turn a
//! synthetic event's target into an ordered list of (listener, instance)
//! dispatches, capture phase root-to-target and bubble phase target-to-root.

use crate::{
    events::{
        hub::{self, PhasedNames},
        synthetic::SyntheticEvent,
    },
    instance::Instance,
    runtime::Runtime,
};

/// The instance and every host-tree ancestor of it, target first.
pub(crate) fn instance_path(target: &Instance) -> Vec<Instance> {
    let mut path = vec![target.clone()];
    let mut cursor = target.host_parent();
    while let Some(parent) = cursor {
        cursor = parent.host_parent();
        path.push(parent);
    }
    path
}

/// Accumulate both phases onto the event's dispatch lists: capture listeners
/// outermost-first, then bubble listeners target-first.
pub(crate) fn accumulate_two_phase_dispatches(
    rt: &Runtime,
    event: &mut SyntheticEvent,
    phased: &PhasedNames,
) {
    let target = match event.target_instance() {
        Some(target) => target.clone(),
        None => return,
    };
    let path = instance_path(&target);

    for instance in path.iter().rev() {
        if let Some(listener) = hub::get_listener(rt, instance.id(), &phased.captured) {
            event.dispatch_listeners.push(listener);
            event.dispatch_instances.push(instance.clone());
        }
    }
    for instance in path.iter() {
        if let Some(listener) = hub::get_listener(rt, instance.id(), &phased.bubbled) {
            event.dispatch_listeners.push(listener);
            event.dispatch_instances.push(instance.clone());
        }
    }
}

/// Accumulate dispatches for a boundary crossing from `from` to `to`: leave
/// listeners fire on `from` and its ancestors up to (not including) the
/// lowest common ancestor, child-first; enter listeners fire from just below
/// the common ancestor down to `to`, parent-first.
pub(crate) fn accumulate_enter_leave_dispatches(
    rt: &Runtime,
    leave_event: &mut SyntheticEvent,
    enter_event: &mut SyntheticEvent,
    from: Option<&Instance>,
    to: Option<&Instance>,
    leave_registration: &str,
    enter_registration: &str,
) {
    let from_path = from.map(instance_path).unwrap_or_default();
    let to_path = to.map(instance_path).unwrap_or_default();

    let common = lowest_common_ancestor(&from_path, &to_path);

    for instance in &from_path {
        if let Some(c) = &common {
            if instance.ptr_eq(c) {
                break;
            }
        }
        if let Some(listener) = hub::get_listener(rt, instance.id(), leave_registration) {
            leave_event.dispatch_listeners.push(listener);
            leave_event.dispatch_instances.push(instance.clone());
        }
    }

    let mut entering: Vec<&Instance> = Vec::new();
    for instance in &to_path {
        if let Some(c) = &common {
            if instance.ptr_eq(c) {
                break;
            }
        }
        entering.push(instance);
    }
    for instance in entering.into_iter().rev() {
        if let Some(listener) = hub::get_listener(rt, instance.id(), enter_registration) {
            enter_event.dispatch_listeners.push(listener);
            enter_event.dispatch_instances.push(instance.clone());
        }
    }
}

/// The deepest instance present in both paths, if any. Paths are
/// target-first, so the search walks from the root ends inward.
fn lowest_common_ancestor(from_path: &[Instance], to_path: &[Instance]) -> Option<Instance> {
    let mut common = None;
    let mut from_iter = from_path.iter().rev();
    let mut to_iter = to_path.iter().rev();
    loop {
        match (from_iter.next(), to_iter.next()) {
            (Some(a), Some(b)) if a.ptr_eq(b) => common = Some(a.clone()),
            _ => break,
        }
    }
    common
}
