//! The public mount surface: wrapping user elements in the top-level wrapper,
//! mounting into containers, idempotent re-render, and unmount.

use crate::{
    component::{Callback, Component, ComponentClass, ComponentHandle, Cx, Public},
    composite,
    element::{
        create_element, should_update_component, ComponentKind, Element, ElementKind, View,
    },
    error::Error,
    host,
    instance::{instantiate, CompositeInstance, Instance},
    reconciler,
    record::{Record, Value},
    runtime::Runtime,
    transaction, updates,
};
use std::rc::Rc;
use tracing::warn;
use twigdom::Node as DomNode;

/// The composite wrapped around every mounted tree: one level above the user
/// element, rendering its `child` prop verbatim. Updating a root swaps the
/// wrapper's descriptor, letting the ordinary composite update path drive the
/// whole tree.
pub(crate) struct TopLevelWrapperClass;

impl ComponentClass for TopLevelWrapperClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(TopLevelWrapper)
    }

    fn display_name(&self) -> &str {
        "TopLevelWrapper"
    }
}

struct TopLevelWrapper;

impl Component for TopLevelWrapper {
    fn render(&self, cx: &Cx) -> View {
        cx.props().get("child").and_then(Value::as_view).cloned().unwrap_or(View::Empty)
    }
}

fn wrapper_element(rt: &Runtime, element: &Element) -> Element {
    create_element(
        ElementKind::Composite(ComponentKind::Class(rt.inner.top_level_class.clone())),
        Record::new().with("child", Value::Node(View::Element(element.clone()))),
        vec![],
    )
}

fn public_root_instance(top: &Rc<CompositeInstance>) -> Option<Public> {
    debug_assert!(top.top_level_wrapper.get(), "roots are always wrapper composites");
    top.rendered.borrow().as_ref().and_then(Instance::public)
}

/// Mount `element` into `container`, or update the tree already mounted
/// there. Returns the root's public instance: the root composite's handle, or
/// the root host node.
pub(crate) fn render(
    rt: &Runtime,
    element: Element,
    container: &DomNode,
    callback: Option<Callback>,
) -> Result<Option<Public>, Error> {
    render_subtree(rt, None, element, container, callback)
}

/// Like [`render`], but propagating the child context of `parent` into the
/// new tree; the path nested mounts take so portalled subtrees observe their
/// owner's context.
pub(crate) fn render_subtree(
    rt: &Runtime,
    parent: Option<&ComponentHandle>,
    element: Element,
    container: &DomNode,
    callback: Option<Callback>,
) -> Result<Option<Public>, Error> {
    let container_record = host::Container::for_node(container)?;

    let context = match parent {
        Some(handle) => {
            let instance = rt
                .instance_for_handle(handle)
                .ok_or(Error::UnknownParentComponent)?;
            let parent_composite = instance
                .as_composite()
                .ok_or(Error::UnknownParentComponent)?
                .clone();
            let parent_context = parent_composite.context.borrow().clone();
            composite::process_child_context(rt, &parent_composite, &parent_context)?
        }
        None => Record::new(),
    };

    let wrapper = wrapper_element(rt, &element);

    let existing = rt.inner.roots.borrow().get(&container_record.id()).cloned();
    if let Some(existing) = existing {
        let top = existing
            .as_composite()
            .expect("the root registry holds top-level wrappers")
            .clone();
        let prev_view = top
            .element
            .borrow()
            .props()
            .get("child")
            .and_then(Value::as_view)
            .cloned()
            .unwrap_or(View::Empty);

        if should_update_component(&prev_view, &View::Element(element)) {
            let public = public_root_instance(&top);
            updates::enqueue_element_internal(rt, &top, wrapper, callback);
            return Ok(public);
        }
        unmount_component_at_node(rt, container)?;
    }

    let instance = instantiate(&View::Element(wrapper));
    let top = instance
        .as_composite()
        .expect("the top-level wrapper instantiates as a composite")
        .clone();
    top.top_level_wrapper.set(true);
    rt.inner.roots.borrow_mut().insert(container_record.id(), instance.clone());

    let mounted = updates::batched_updates(rt, || {
        mount_component_into_node(rt, &instance, &container_record, &context)
    });
    if let Err(e) = mounted {
        rt.inner.roots.borrow_mut().remove(&container_record.id());
        return Err(e);
    }

    if let Some(callback) = callback {
        callback();
    }
    Ok(public_root_instance(&top))
}

fn mount_component_into_node(
    rt: &Runtime,
    instance: &Instance,
    container: &host::Container,
    context: &Record,
) -> Result<(), Error> {
    let mut tx = rt.acquire_reconcile_transaction();
    let result = transaction::perform(&mut tx, |tx| {
        let markup = reconciler::mount_component(rt, instance, tx, None, container, context)?;
        let container_node = container.node();
        for child in container_node.child_nodes() {
            container_node.remove_child(&child);
        }
        host::insert_tree_before(container_node, markup, None);
        Ok(())
    });
    rt.release_reconcile_transaction(tx);
    result
}

/// Tear down whatever is mounted in `container`. Returns `false` (with a
/// warning) when nothing was.
pub(crate) fn unmount_component_at_node(rt: &Runtime, container: &DomNode) -> Result<bool, Error> {
    host::Container::for_node(container)?;

    let existing = rt.inner.roots.borrow_mut().remove(&container.id());
    let instance = match existing {
        Some(instance) => instance,
        None => {
            warn!("unmount_component_at_node called on a container with no mounted tree");
            return Ok(false);
        }
    };

    updates::batched_updates(rt, || {
        reconciler::unmount_component(rt, &instance, false);
        for child in container.child_nodes() {
            container.remove_child(&child);
        }
    });
    Ok(true)
}
