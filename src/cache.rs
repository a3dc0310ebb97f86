//! The node↔instance cache: every mounted host-level instance marks its DOM
//! node with a private, per-runtime expando carrying a weak handle back to
//! the instance. Lookups that miss populate whole sibling levels at a time,
//! pairing DOM children with the instance map through the id attribute and
//! comment markers, which keeps repeated sibling lookups linear.

use crate::{
    host::{self, ID_ATTRIBUTE},
    instance::{Instance, WeakInstance},
    runtime::Runtime,
};
use std::rc::Rc;
use twigdom::{Node as DomNode, NodeKind};

/// Write the back-link from a DOM node to its owning instance.
pub(crate) fn precache_node(rt: &Runtime, instance: &Instance, node: &DomNode) {
    node.set_expando(rt.node_key(), Rc::new(instance.downgrade()));
}

/// Drop an instance's back-link; run on unmount.
pub(crate) fn uncache_node(rt: &Runtime, instance: &Instance) {
    let node = match instance {
        Instance::Host(h) => {
            h.children_precached.set(false);
            h.node.borrow().clone()
        }
        Instance::Text(t) => t.open.borrow().clone(),
        Instance::Empty(e) => e.node.borrow().clone(),
        Instance::Composite(..) => None,
    };
    if let Some(node) = node {
        node.remove_expando(rt.node_key());
    }
}

fn cached_instance(rt: &Runtime, node: &DomNode) -> Option<Instance> {
    let any = node.expando(rt.node_key())?;
    any.downcast_ref::<WeakInstance>().and_then(WeakInstance::upgrade)
}

/// The deepest mounted instance at or above `node`: the resolution step that
/// turns a native event target into an internal instance.
pub(crate) fn closest_instance_from_node(rt: &Runtime, node: &DomNode) -> Option<Instance> {
    let mut unmarked: Vec<DomNode> = Vec::new();
    let mut closest: Option<Instance> = None;
    let mut cursor = Some(node.clone());
    while let Some(candidate) = cursor {
        if let Some(instance) = cached_instance(rt, &candidate) {
            closest = Some(instance);
            break;
        }
        cursor = candidate.parent_node();
        unmarked.push(candidate);
    }

    // walk back toward the target, populating one sibling level per step
    let mut closest = closest?;
    for candidate in unmarked.iter().rev() {
        precache_children(rt, &closest);
        match cached_instance(rt, candidate) {
            Some(instance) => closest = instance,
            None => break,
        }
    }
    Some(closest)
}

/// The instance whose span *starts at* `node`, if any.
pub(crate) fn instance_from_node(rt: &Runtime, node: &DomNode) -> Option<Instance> {
    let closest = closest_instance_from_node(rt, node)?;
    let span = closest.host_node()?;
    if span.first_node() == node {
        Some(closest)
    } else {
        None
    }
}

/// The first DOM node of an instance's span, repopulating cache levels on the
/// way down when the direct link is missing.
pub(crate) fn node_from_instance(rt: &Runtime, instance: &Instance) -> DomNode {
    if let Some(span) = instance.host_node() {
        return span.first_node().clone();
    }

    let mut path = vec![instance.clone()];
    let mut cursor = instance.clone();
    loop {
        match cursor.host_parent() {
            Some(parent) => {
                let anchored = parent.host_node().is_some();
                cursor = parent.clone();
                if anchored {
                    break;
                }
                path.push(parent);
            }
            None => panic!("node_from_instance called on an unmounted instance"),
        }
    }
    precache_children(rt, &cursor);
    for ancestor in path.iter().rev() {
        precache_children(rt, ancestor);
    }
    match instance.host_node() {
        Some(span) => span.first_node().clone(),
        None => panic!("unable to resolve a DOM node for {:?}", instance),
    }
}

/// Drill through composites to the instance that actually owns DOM nodes.
fn host_level(instance: &Instance) -> Option<Instance> {
    match instance {
        Instance::Composite(c) => c.rendered.borrow().as_ref().and_then(host_level),
        other => Some(other.clone()),
    }
}

fn marker_matches(child: &Instance, node: &DomNode) -> bool {
    match child {
        Instance::Host(h) => {
            node.kind() == NodeKind::Element
                && node.get_attribute(ID_ATTRIBUTE).as_deref()
                    == Some(h.dom_id.get().to_string().as_str())
        }
        Instance::Text(t) => {
            node.kind() == NodeKind::Comment
                && node.node_value().as_deref() == Some(host::text_open_marker(t.dom_id.get()).as_str())
        }
        Instance::Empty(e) => {
            node.kind() == NodeKind::Comment
                && node.node_value().as_deref() == Some(host::empty_marker(e.dom_id.get()).as_str())
        }
        Instance::Composite(..) => false,
    }
}

/// Pair every logical child of a host instance with its DOM node in one
/// forward scan, caching the whole level.
pub(crate) fn precache_children(rt: &Runtime, instance: &Instance) {
    let target = match host_level(instance) {
        Some(target) => target,
        None => return,
    };
    let h = match &target {
        Instance::Host(h) => h,
        _ => return,
    };
    if h.children_precached.get() || h.content_is_html.get() {
        return;
    }
    let parent_node = h.dom_node();

    let mut dom_cursor = parent_node.first_child();
    for (_, child) in h.children.borrow().iter() {
        let child_target = match host_level(child) {
            Some(target) => target,
            None => continue,
        };
        loop {
            match dom_cursor {
                Some(candidate) => {
                    let matched = marker_matches(&child_target, &candidate);
                    dom_cursor = candidate.next_sibling();
                    if matched {
                        precache_node(rt, &child_target, &candidate);
                        break;
                    }
                }
                None => panic!(
                    "unable to find the DOM child matching {:?} under <{}>",
                    child_target,
                    h.tag.borrow()
                ),
            }
        }
    }
    h.children_precached.set(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_element, element::host, record, testing::Harness};

    #[test]
    fn nodes_resolve_back_to_their_instances() {
        let h = Harness::new();
        h.render(create_element(
            host("div"),
            record! { "id" => "outer" },
            vec![create_element(host("span"), record! { "id" => "s" }, vec!["txt".into()]).into()],
        ))
        .unwrap();

        let span_node = h.node_by_id("s").unwrap();
        let instance = instance_from_node(&h.rt, &span_node).expect("span starts a span");
        assert!(matches!(instance, Instance::Host(..)));
        assert_eq!(node_from_instance(&h.rt, &instance), span_node);
    }

    #[test]
    fn lookups_from_unmarked_descendants_find_the_closest_instance() {
        let h = Harness::new();
        h.render(create_element(host("div"), record! { "id" => "outer" }, vec!["hello".into()]))
            .unwrap();

        // the bare text node between the markers carries no back-link
        let outer = h.node_by_id("outer").unwrap();
        let bare_text = outer
            .child_nodes()
            .into_iter()
            .find(|n| n.kind() == NodeKind::Text)
            .expect("a text node sits between the markers");

        let closest = closest_instance_from_node(&h.rt, &bare_text).expect("resolves upward");
        assert!(
            matches!(closest, Instance::Host(..)),
            "the nearest marked ancestor is the host element"
        );
        assert!(instance_from_node(&h.rt, &bare_text).is_none(), "no span starts at bare text");
    }
}
