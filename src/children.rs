//! Keyed child reconciliation: flattening nested child values into a named,
//! ordered map, diffing two such maps in one pass, and emitting the minimal
//! insert/move/remove operations the host applies.
//!
//! The move algorithm is the O(n) forward-scan variant: a running `last_index`
//! over preserved children decides which of them actually need to move. It is
//! stable and not globally minimal, and that approximation is part of the
//! behavioural contract.

use crate::{
    element::{should_update_component, View},
    error::Error,
    host::{self, ChildOp},
    instance::{instantiate, HostInstance, Instance},
    reconciler,
    record::{Record, Value},
    runtime::Runtime,
    transaction::ReconcileTransaction,
};
use std::rc::Rc;
use tracing::warn;

/// Flatten a `children` prop value into `(name, view)` pairs in render order.
///
/// Names derive from keys where present (`.$key`) and positions otherwise
/// (`.0`, `.1`, … in base 36); nested lists contribute a `:`-separated
/// subtree prefix. Null and boolean entries are skipped. Two children
/// arriving at the same name is a conflict: the first wins and the rest are
/// dropped with a warning.
pub(crate) fn flatten_children(children: Option<&Value>) -> Vec<(String, View)> {
    let mut out = Vec::new();
    if let Some(value) = children {
        traverse(value, "", &mut out);
    }
    out
}

fn traverse(value: &Value, name_so_far: &str, out: &mut Vec<(String, View)>) {
    match value {
        Value::Null | Value::Bool(..) => {}
        Value::Node(view) => {
            let name = leaf_name(name_so_far, view.key());
            push_deduped(out, name, view.clone());
        }
        Value::Str(s) => {
            let name = leaf_name(name_so_far, None);
            push_deduped(out, name, View::Text(s.clone()));
        }
        Value::Num(n) => {
            let name = leaf_name(name_so_far, None);
            push_deduped(out, name, View::Text(n.to_string()));
        }
        Value::List(items) => {
            let prefix = if name_so_far.is_empty() {
                ".".to_string()
            } else {
                format!("{}:", name_so_far)
            };
            for (index, item) in items.iter().enumerate() {
                let key = match item {
                    Value::Node(view) => view.key(),
                    _ => None,
                };
                let next = format!("{}{}", prefix, component_key(key, index));
                traverse(item, &next, out);
            }
        }
        other => warn!(?other, "ignoring a child value that is not renderable"),
    }
}

fn leaf_name(name_so_far: &str, key: Option<&str>) -> String {
    if name_so_far.is_empty() {
        format!(".{}", component_key(key, 0))
    } else {
        name_so_far.to_string()
    }
}

fn component_key(key: Option<&str>, index: usize) -> String {
    match key {
        Some(key) => format!("${}", escape_user_key(key)),
        None => base36(index),
    }
}

/// Escape the characters the name syntax reserves.
fn escape_user_key(key: &str) -> String {
    key.replace('=', "=0").replace(':', "=2")
}

pub(crate) fn base36(mut n: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[n % 36]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

fn push_deduped(out: &mut Vec<(String, View)>, name: String, view: View) {
    if out.iter().any(|(existing, _)| *existing == name) {
        warn!(
            name = name.as_str(),
            "encountered two children with the same key; only the first will be used"
        );
        return;
    }
    out.push((name, view));
}

/// Instantiate and mount every child of a freshly-mounting host instance,
/// returning their lazy trees in order for the host to attach.
pub(crate) fn mount_children(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    context: &Record,
) -> Result<Vec<host::LazyTree>, Error> {
    let children_value = host.element.borrow().props().get("children").cloned();
    let flat = flatten_children(children_value.as_ref());
    let parent = Instance::Host(host.clone());
    let container = host
        .container
        .borrow()
        .clone()
        .expect("host instance mounts with a container");

    // the child map is registered before any mount runs, so a failure
    // partway through still leaves every started child reachable by teardown
    let mut children = Vec::with_capacity(flat.len());
    for (index, (name, view)) in flat.into_iter().enumerate() {
        let child = instantiate(&view);
        child.set_mount_index(index);
        children.push((name, child));
    }
    *host.children.borrow_mut() = children.clone();

    let mut images = Vec::with_capacity(children.len());
    for (_, child) in &children {
        images.push(reconciler::mount_component(rt, child, tx, Some(&parent), &container, context)?);
    }
    Ok(images)
}

/// Diff the host's current children against `next_children` in one
/// left-to-right pass, handing the resulting op list to the host.
pub(crate) fn update_children(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    context: &Record,
    next_children: Option<&Value>,
) -> Result<(), Error> {
    let prev_children: Vec<(String, Instance)> = host.children.borrow().clone();
    let next_views = flatten_children(next_children);
    if prev_children.is_empty() && next_views.is_empty() {
        return Ok(());
    }

    let parent = Instance::Host(host.clone());
    let container = host
        .container
        .borrow()
        .clone()
        .expect("host instance updates with a container");

    // first pass: decide, per name, whether the previous instance survives;
    // unmount casualties (recording their spans) and mount newcomers
    enum Origin {
        Preserved,
        New { replaced_index: Option<usize> },
    }
    let mut removed: Vec<crate::instance::NodeSpan> = Vec::new();
    let mut mount_images: Vec<host::LazyTree> = Vec::new();
    let mut next_map: Vec<(String, Instance, Origin)> = Vec::new();

    for (name, next_view) in &next_views {
        let prev = prev_children.iter().find(|(n, _)| n == name).map(|(_, i)| i.clone());
        match prev {
            Some(prev_inst) if should_update_component(&prev_inst.rendered_view(), next_view) => {
                reconciler::receive_component(rt, &prev_inst, next_view, tx, context)?;
                next_map.push((name.clone(), prev_inst, Origin::Preserved));
            }
            prev => {
                let replaced_index = prev.as_ref().map(Instance::mount_index);
                if let Some(prev_inst) = &prev {
                    if let Some(span) = prev_inst.host_node() {
                        removed.push(span);
                    }
                    reconciler::unmount_component(rt, prev_inst, false);
                }
                let child = instantiate(next_view);
                let image =
                    reconciler::mount_component(rt, &child, tx, Some(&parent), &container, context)?;
                mount_images.push(image);
                next_map.push((name.clone(), child, Origin::New { replaced_index }));
            }
        }
    }
    for (name, prev_inst) in &prev_children {
        if !next_views.iter().any(|(n, _)| n == name) {
            if let Some(span) = prev_inst.host_node() {
                removed.push(span);
            }
            reconciler::unmount_component(rt, prev_inst, false);
        }
    }

    // second pass: emit minimal ops; a preserved child moves only when it
    // sits behind the furthest previously-mounted position seen so far
    let mut ops: Vec<ChildOp> = Vec::new();
    let mut last_index = 0usize;
    let mut last_placed: Option<twigdom::Node> = None;
    let mut image_cursor = mount_images.into_iter();

    for (next_index, (_name, child, origin)) in next_map.iter().enumerate() {
        match origin {
            Origin::Preserved => {
                let prev_index = child.mount_index();
                if prev_index < last_index {
                    let span = child.host_node().expect("preserved child has mounted nodes");
                    ops.push(ChildOp::Move { span, after: last_placed.clone() });
                }
                last_index = last_index.max(prev_index);
            }
            Origin::New { replaced_index } => {
                if let Some(replaced_index) = replaced_index {
                    last_index = last_index.max(*replaced_index);
                }
                let image = image_cursor.next().expect("one image per new child");
                ops.push(ChildOp::Insert { tree: image, after: last_placed.clone() });
            }
        }
        child.set_mount_index(next_index);
        last_placed = child.host_node().map(|span| span.last_node().clone());
    }
    for span in removed {
        ops.push(ChildOp::Remove { span });
    }

    let parent_node = host.dom_node();
    host::process_updates(&parent_node, ops);

    *host.children.borrow_mut() =
        next_map.into_iter().map(|(name, child, _)| (name, child)).collect();
    Ok(())
}

/// Unmount every child of a host instance.
pub(crate) fn unmount_children(rt: &Runtime, host: &Rc<HostInstance>, safely: bool) {
    let children = std::mem::take(&mut *host.children.borrow_mut());
    for (_, child) in children {
        reconciler::unmount_component(rt, &child, safely);
    }
}
