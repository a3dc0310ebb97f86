//! The composite reconciler: drives user components through their lifecycle,
//! folds pending state, re-renders, and delegates the rendered child to the
//! rest of the reconciler.

use crate::{
    component::{CaughtError, Component, Cx, StatelessShim, Updater},
    element::{should_update_component, ComponentKind, Element},
    error::Error,
    host,
    instance::{instantiate, CompositeInstance, Instance},
    reconciler,
    record::Record,
    runtime::Runtime,
    transaction::ReconcileTransaction,
};
use std::{
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
    rc::Rc,
};
use tracing::{error, trace};

fn masked_context(inst: &Rc<CompositeInstance>) -> Record {
    match &inst.kind {
        ComponentKind::Class(class) => inst.context.borrow().masked_by(class.context_keys()),
        ComponentKind::Stateless(..) => Record::new(),
    }
}

fn mask_for(inst: &Rc<CompositeInstance>, context: &Record) -> Record {
    match &inst.kind {
        ComponentKind::Class(class) => context.masked_by(class.context_keys()),
        ComponentKind::Stateless(..) => Record::new(),
    }
}

/// Run `f` with a [`Cx`] assembled from the instance's current records.
fn with_cx<R>(rt: &Runtime, inst: &Rc<CompositeInstance>, f: impl FnOnce(&Cx) -> R) -> R {
    let props = inst.element.borrow().props().clone();
    let state = inst.state.borrow().clone();
    let context = masked_context(inst);
    let cx = Cx::new(&props, &state, &context, Updater::new(rt.downgrade(), inst));
    f(&cx)
}

fn with_component<R>(inst: &Rc<CompositeInstance>, f: impl FnOnce(&dyn Component) -> R) -> R {
    let cell = inst.component.borrow();
    f(cell.as_ref().expect("composite instance has a live component").as_ref())
}

fn with_component_mut<R>(inst: &Rc<CompositeInstance>, f: impl FnOnce(&mut dyn Component) -> R) -> R {
    let mut cell = inst.component.borrow_mut();
    f(cell.as_mut().expect("composite instance has a live component").as_mut())
}

/// Call the user's `render` under the rendering guard that makes state
/// updates during render a contract violation.
fn render_component(rt: &Runtime, inst: &Rc<CompositeInstance>) -> crate::element::View {
    let _guard = rt.rendering_guard();
    with_cx(rt, inst, |cx| with_component(inst, |c| c.render(cx)))
}

/// Mount a composite: record ordering, construct the public instance, run
/// the pre-mount lifecycle, render, and mount the rendered child. Returns the
/// child's host markup.
pub(crate) fn mount_component(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
    host_parent: Option<&Instance>,
    container: &host::Container,
    context: &Record,
) -> Result<host::LazyTree, Error> {
    inst.id.set(rt.next_instance_id());
    inst.mount_order.set(rt.next_mount_order());
    let instance = Instance::Composite(inst.clone());
    instance.set_host_parent(host_parent);
    *inst.container.borrow_mut() = Some(container.clone());
    *inst.context.borrow_mut() = context.clone();
    trace!(component = %inst.display_name(), order = inst.mount_order.get(), "mounting composite");

    let component: Box<dyn Component> = match &inst.kind {
        ComponentKind::Class(class) => class.create(),
        ComponentKind::Stateless(function) => {
            Box::new(StatelessShim { function: function.clone() })
        }
    };
    *inst.component.borrow_mut() = Some(component);
    rt.register_instance(inst);

    let initial = {
        let props = inst.element.borrow().props().clone();
        let masked = masked_context(inst);
        with_component(inst, |c| c.initial_state(&props, &masked))
    };
    *inst.state.borrow_mut() = initial;

    let handles_errors =
        matches!(&inst.kind, ComponentKind::Class(class) if class.handles_errors());
    let markup = if handles_errors {
        mount_with_error_handling(rt, inst, tx, host_parent, container, context)?
    } else {
        perform_initial_mount(rt, inst, tx, host_parent, container, context)?
    };

    let rt_for_ready = rt.clone();
    let inst_for_ready = inst.clone();
    tx.enqueue_mount_ready(move || notify_did_mount(&rt_for_ready, &inst_for_ready));

    Ok(markup)
}

fn perform_initial_mount(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
    host_parent: Option<&Instance>,
    container: &host::Container,
    context: &Record,
) -> Result<host::LazyTree, Error> {
    with_cx(rt, inst, |cx| with_component_mut(inst, |c| c.will_mount(cx)));
    if inst.pending_state.borrow().is_some() {
        let folded = process_pending_state(inst);
        *inst.state.borrow_mut() = folded;
    }

    let view = render_component(rt, inst);
    let child = instantiate(&view);
    *inst.rendered.borrow_mut() = Some(child.clone());
    let child_context = process_child_context(rt, inst, context)?;
    reconciler::mount_component(rt, &child, tx, host_parent, container, &child_context)
}

/// The single-retry recovery path for classes that opt into `handle_error`:
/// roll the mount-ready queue back to its checkpoint, tear down the partial
/// child, let the hook run, fold any state it enqueued, and try again.
fn mount_with_error_handling(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
    host_parent: Option<&Instance>,
    container: &host::Container,
    context: &Record,
) -> Result<host::LazyTree, Error> {
    let checkpoint = tx.checkpoint();
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        perform_initial_mount(rt, inst, tx, host_parent, container, context)
    }));
    match attempt {
        Ok(result) => result,
        Err(payload) => {
            let caught = CaughtError::new(payload);
            error!(component = %inst.display_name(), error = %caught.message(), "initial mount failed");
            let handled =
                with_cx(rt, inst, |cx| with_component_mut(inst, |c| c.handle_error(cx, &caught)));
            if !handled {
                resume_unwind(caught.into_payload());
            }
            tx.rollback(checkpoint);
            if let Some(child) = inst.rendered.borrow_mut().take() {
                reconciler::unmount_component(rt, &child, true);
            }
            if inst.pending_state.borrow().is_some() {
                let folded = process_pending_state(inst);
                *inst.state.borrow_mut() = folded;
            }
            perform_initial_mount(rt, inst, tx, host_parent, container, context)
        }
    }
}

fn notify_did_mount(rt: &Runtime, inst: &Rc<CompositeInstance>) {
    if inst.component.borrow().is_none() {
        return;
    }
    with_cx(rt, inst, |cx| with_component_mut(inst, |c| c.did_mount(cx)));
}

fn notify_did_update(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    prev_props: &Record,
    prev_state: &Record,
) {
    if inst.component.borrow().is_none() {
        return;
    }
    with_cx(rt, inst, |cx| {
        with_component_mut(inst, |c| c.did_update(cx, prev_props, prev_state))
    });
}

/// Apply a new descriptor arriving from the parent. A reference-identical
/// descriptor under an unchanged context is a no-op.
pub(crate) fn receive_component(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
    next_element: &Element,
    next_context: &Record,
) -> Result<(), Error> {
    let prev_element = inst.element.borrow().clone();
    let prev_context = inst.context.borrow().clone();
    if prev_element.ptr_eq(next_element) && prev_context == *next_context {
        return Ok(());
    }
    update_component(rt, inst, tx, &prev_element, next_element, &prev_context, next_context)
}

/// The update queue's entry point for a dirty composite.
pub(crate) fn perform_update_if_necessary(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
) -> Result<(), Error> {
    if inst.component.borrow().is_none() {
        // unmounted by an earlier update in the same flush
        trace!(component = %inst.display_name(), "skipping update for an unmounted composite");
        return Ok(());
    }
    let pending_element = inst.pending_element.borrow_mut().take();
    if let Some(element) = pending_element {
        let context = inst.context.borrow().clone();
        let prev_element = inst.element.borrow().clone();
        return update_component(rt, inst, tx, &prev_element, &element, &context, &context);
    }
    if inst.pending_state.borrow().is_some() || inst.pending_force_update.get() {
        let element = inst.element.borrow().clone();
        let context = inst.context.borrow().clone();
        return update_component(rt, inst, tx, &element, &element, &context, &context);
    }
    trace!(component = %inst.display_name(), "dirty composite had nothing pending");
    Ok(())
}

fn update_component(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
    prev_element: &Element,
    next_element: &Element,
    prev_context: &Record,
    next_context: &Record,
) -> Result<(), Error> {
    let will_receive = !prev_element.ptr_eq(next_element) || prev_context != next_context;
    let next_props = next_element.props().clone();
    let next_masked = mask_for(inst, next_context);

    if will_receive {
        with_cx(rt, inst, |cx| {
            with_component_mut(inst, |c| c.will_receive_props(cx, &next_props, &next_masked))
        });
    }

    let next_state = process_pending_state(inst);
    let should = inst.pending_force_update.get()
        || with_cx(rt, inst, |cx| {
            with_component(inst, |c| {
                c.should_update(cx, &next_props, &next_state, &next_masked)
            })
        });

    if should {
        inst.pending_force_update.set(false);
        with_cx(rt, inst, |cx| {
            with_component_mut(inst, |c| c.will_update(cx, &next_props, &next_state))
        });

        let prev_props = prev_element.props().clone();
        let prev_state = inst.state.borrow().clone();
        *inst.element.borrow_mut() = next_element.clone();
        *inst.state.borrow_mut() = next_state;
        *inst.context.borrow_mut() = next_context.clone();

        update_rendered(rt, inst, tx)?;

        let rt_for_ready = rt.clone();
        let inst_for_ready = inst.clone();
        tx.enqueue_mount_ready(move || {
            notify_did_update(&rt_for_ready, &inst_for_ready, &prev_props, &prev_state)
        });
    } else {
        *inst.element.borrow_mut() = next_element.clone();
        *inst.state.borrow_mut() = next_state;
        *inst.context.borrow_mut() = next_context.clone();
    }
    Ok(())
}

/// Re-render and reconcile the child: compatible views update in place,
/// incompatible ones replace the subtree wholesale.
fn update_rendered(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    tx: &mut ReconcileTransaction,
) -> Result<(), Error> {
    let prev_child = inst
        .rendered
        .borrow()
        .clone()
        .expect("mounted composite has a rendered child");
    let prev_view = prev_child.rendered_view();
    let next_view = render_component(rt, inst);

    let context = inst.context.borrow().clone();
    let child_context = process_child_context(rt, inst, &context)?;

    if should_update_component(&prev_view, &next_view) {
        reconciler::receive_component(rt, &prev_child, &next_view, tx, &child_context)
    } else {
        let old_span = prev_child.host_node();
        reconciler::unmount_component(rt, &prev_child, false);

        let next_child = instantiate(&next_view);
        *inst.rendered.borrow_mut() = Some(next_child.clone());
        let host_parent = Instance::Composite(inst.clone()).host_parent();
        let container = inst
            .container
            .borrow()
            .clone()
            .expect("mounted composite has a container");
        let markup = reconciler::mount_component(
            rt,
            &next_child,
            tx,
            host_parent.as_ref(),
            &container,
            &child_context,
        )?;
        match old_span {
            Some(span) => host::replace_node_with_markup(span, markup),
            None => panic!("replaced a rendered child that owned no DOM nodes"),
        }
        Ok(())
    }
}

/// Tear down: run `will_unmount` (guarded), recurse into the child, clear
/// every field, and drop the public-instance registration.
pub(crate) fn unmount_component(rt: &Runtime, inst: &Rc<CompositeInstance>, safely: bool) {
    if inst.component.borrow().is_none() {
        return;
    }
    trace!(component = %inst.display_name(), "unmounting composite");

    *inst.pending_state.borrow_mut() = None;
    inst.pending_replace_state.set(false);
    inst.pending_force_update.set(false);
    *inst.pending_element.borrow_mut() = None;
    inst.pending_callbacks.borrow_mut().clear();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        with_cx(rt, inst, |cx| with_component_mut(inst, |c| c.will_unmount(cx)));
    }));
    if let Err(payload) = outcome {
        let caught = CaughtError::new(payload);
        if safely {
            error!(
                component = %inst.display_name(),
                error = %caught.message(),
                "will_unmount panicked during guarded unmount"
            );
        } else {
            rt.defer_unmount_panic(caught.into_payload());
        }
    }

    if let Some(child) = inst.rendered.borrow_mut().take() {
        reconciler::unmount_component(rt, &child, safely);
    }

    rt.unregister_instance(inst);
    *inst.component.borrow_mut() = None;
    *inst.context.borrow_mut() = Record::new();
    *inst.state.borrow_mut() = Record::new();
    *inst.container.borrow_mut() = None;
    *inst.host_parent.borrow_mut() = None;
}

/// Fold the pending state queue over the current state, consuming it and the
/// replace flag.
pub(crate) fn process_pending_state(inst: &Rc<CompositeInstance>) -> Record {
    let queue = inst.pending_state.borrow_mut().take();
    let replace = inst.pending_replace_state.get();
    inst.pending_replace_state.set(false);

    let state = inst.state.borrow().clone();
    let queue = match queue {
        Some(queue) if !queue.is_empty() => queue,
        _ => return state,
    };

    let props = inst.element.borrow().props().clone();
    let context = masked_context(inst);
    let resolve = |patch: &crate::component::StatePatch, acc: &Record| match patch {
        crate::component::StatePatch::Record(record) => record.clone(),
        crate::component::StatePatch::With(f) => f(acc, &props, &context),
    };

    if replace && queue.len() == 1 {
        return resolve(&queue[0], &state);
    }

    let mut folded = if replace { resolve(&queue[0], &state) } else { state };
    let rest = if replace { &queue[1..] } else { &queue[..] };
    for patch in rest {
        let partial = resolve(patch, &folded);
        folded.merge(&partial);
    }
    folded
}

/// Merge the component's declared child context over the incoming context,
/// validating every emitted key against the class's declarations.
pub(crate) fn process_child_context(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    context: &Record,
) -> Result<Record, Error> {
    let declared = match &inst.kind {
        ComponentKind::Class(class) => class.child_context_keys(),
        ComponentKind::Stateless(..) => return Ok(context.clone()),
    };

    let child_context = with_cx(rt, inst, |cx| with_component(inst, |c| c.child_context(cx)));
    if child_context.is_empty() {
        return Ok(context.clone());
    }
    for key in child_context.keys() {
        if !declared.contains(&key) {
            return Err(Error::UndeclaredChildContext {
                component: inst.display_name(),
                key: key.to_string(),
            });
        }
    }
    Ok(context.merged(&child_context))
}
