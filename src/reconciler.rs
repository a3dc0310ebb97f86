//! The reconciler facade: uniform mount/receive/unmount entry points that
//! dispatch on the instance variant and weave in ref attachment.

use crate::{
    composite,
    element::View,
    error::Error,
    host,
    instance::Instance,
    record::Record,
    runtime::Runtime,
    transaction::ReconcileTransaction,
};
use tracing::warn;

/// Mount an instance, returning the lazy tree of host markup it produced.
/// A descriptor ref is attached through the mount-ready queue, after the
/// instance's own `did_mount` notification.
pub(crate) fn mount_component(
    rt: &Runtime,
    instance: &Instance,
    tx: &mut ReconcileTransaction,
    host_parent: Option<&Instance>,
    container: &host::Container,
    context: &Record,
) -> Result<host::LazyTree, Error> {
    let markup = match instance {
        Instance::Composite(c) => {
            composite::mount_component(rt, c, tx, host_parent, container, context)?
        }
        Instance::Host(h) => host::mount_component(rt, h, tx, host_parent, container, context)?,
        Instance::Text(t) => host::mount_text(rt, t, host_parent, container),
        Instance::Empty(e) => host::mount_empty(rt, e, host_parent, container),
    };

    if let Some(ref_callback) = instance.element_ref() {
        let attach_to = instance.clone();
        tx.enqueue_mount_ready(move || ref_callback.call(attach_to.public()));
    }
    Ok(markup)
}

/// Route a compatible next view into a mounted instance. Callers guarantee
/// compatibility through the should-update predicate; a mismatch here is a
/// reconciler bug.
pub(crate) fn receive_component(
    rt: &Runtime,
    instance: &Instance,
    next: &View,
    tx: &mut ReconcileTransaction,
    context: &Record,
) -> Result<(), Error> {
    match (instance, next) {
        (Instance::Composite(c), View::Element(element)) => {
            composite::receive_component(rt, c, tx, element, context)
        }
        (Instance::Host(h), View::Element(element)) => {
            host::update_component(rt, h, tx, element, context)
        }
        (Instance::Text(t), View::Text(next_text)) => {
            host::update_text(t, next_text);
            Ok(())
        }
        (Instance::Empty(..), View::Empty) => Ok(()),
        (instance, next) => {
            panic!("incompatible view {:?} received by {:?}", next, instance)
        }
    }
}

/// The update queue's entry point for one dirty instance.
pub(crate) fn perform_update_if_necessary(
    rt: &Runtime,
    instance: &Instance,
    tx: &mut ReconcileTransaction,
) -> Result<(), Error> {
    match instance {
        Instance::Composite(c) => composite::perform_update_if_necessary(rt, c, tx),
        other => {
            warn!(?other, "only composites land in the dirty set");
            Ok(())
        }
    }
}

/// Tear an instance down. Refs detach before the instance's own teardown
/// runs, so user code never sees a half-dead public instance through a ref.
pub(crate) fn unmount_component(rt: &Runtime, instance: &Instance, safely: bool) {
    if let Some(ref_callback) = instance.element_ref() {
        ref_callback.call(None);
    }
    match instance {
        Instance::Composite(c) => composite::unmount_component(rt, c, safely),
        Instance::Host(h) => host::unmount_component(rt, h, safely),
        Instance::Text(t) => host::unmount_text(rt, t),
        Instance::Empty(e) => host::unmount_empty(rt, e),
    }
}
