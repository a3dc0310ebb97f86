//! The transaction framework: a reusable runner that brackets any operation
//! with ordered open/close wrapper pairs, plus the reconcile transaction used
//! around every mount and update.
//!
//! The driver guarantees that every wrapper whose `initialize` completed gets
//! its `close` call even when the wrapped operation or a sibling wrapper
//! panics, and that the first panic is re-raised once the close pass
//! finishes. Nesting works naturally: an outer wrapper's close observes all
//! inner wrappers closed.

use crate::{pool::Poolable, runtime::Runtime};
use std::{
    mem,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};
use tracing::error;

/// Data carried from a wrapper's `initialize` to its `close`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InitData {
    /// Nothing to carry.
    None,
    /// Sentinel written before `initialize` runs; still present afterwards
    /// exactly when the init aborted, in which case `close` is skipped.
    ObservedError,
    /// A snapshot of the dirty set's length.
    DirtyLength(usize),
    /// A snapshot of an enabled/disabled toggle.
    PreviouslyEnabled(bool),
}

/// A transaction: a wrapper table plus the state those wrappers manage.
pub trait Transaction {
    /// The wrapper identifiers, usually a small enum.
    type Wrapper: Copy + 'static;

    /// The wrapper table; `initialize` runs front to back, `close` in the
    /// same order.
    const WRAPPERS: &'static [Self::Wrapper];

    /// Open one wrapper, returning data for its close.
    fn initialize_wrapper(&mut self, wrapper: Self::Wrapper) -> InitData;

    /// Close one wrapper with the data its initialize returned.
    fn close_wrapper(&mut self, wrapper: Self::Wrapper, data: InitData);

    /// Whether a `perform` is currently running on this instance.
    fn in_flight(&self) -> bool;

    /// Record whether a `perform` is running.
    fn set_in_flight(&mut self, in_flight: bool);
}

/// Run `body` inside the transaction: initialize every wrapper, run the body,
/// close every wrapper whose initialize completed, then re-raise the first
/// panic observed anywhere in the sequence.
pub fn perform<T: Transaction, R>(transaction: &mut T, body: impl FnOnce(&mut T) -> R) -> R {
    assert!(!transaction.in_flight(), "transaction is already in progress");
    transaction.set_in_flight(true);

    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    let mut init_data: Vec<InitData> = Vec::with_capacity(T::WRAPPERS.len());

    for &wrapper in T::WRAPPERS {
        init_data.push(InitData::ObservedError);
        match catch_unwind(AssertUnwindSafe(|| transaction.initialize_wrapper(wrapper))) {
            Ok(data) => *init_data.last_mut().expect("just pushed") = data,
            Err(payload) => {
                if first_panic.is_none() {
                    first_panic = Some(payload);
                } else {
                    error!("swallowing a second panic from a wrapper initialize");
                }
            }
        }
    }

    let mut result = None;
    if first_panic.is_none() {
        match catch_unwind(AssertUnwindSafe(|| body(transaction))) {
            Ok(value) => result = Some(value),
            Err(payload) => first_panic = Some(payload),
        }
    }

    for (index, &wrapper) in T::WRAPPERS.iter().enumerate() {
        let data = mem::replace(&mut init_data[index], InitData::None);
        if data == InitData::ObservedError {
            continue;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| transaction.close_wrapper(wrapper, data))) {
            if first_panic.is_none() {
                first_panic = Some(payload);
            } else {
                error!("swallowing a second panic from a wrapper close");
            }
        }
    }

    transaction.set_in_flight(false);
    if let Some(payload) = first_panic {
        resume_unwind(payload);
    }
    result.expect("body ran without panicking")
}

/// Wrappers of the [`ReconcileTransaction`].
#[derive(Clone, Copy, Debug)]
pub enum ReconcileWrapper {
    /// Disables synthetic event dispatch for the duration of the work, so
    /// half-mounted trees never see events; restores the previous setting at
    /// close.
    EventSuppression,
    /// Drains the mount-ready queue at close, firing `did_mount` and
    /// `did_update` notifications in enqueue order.
    MountReady,
}

/// The transaction bracketing reconciliation work. Its central feature is the
/// mount-ready queue: callbacks enqueued during mounts and updates all run
/// after the outermost unit of work completes, in enqueue order.
#[derive(Default)]
pub struct ReconcileTransaction {
    in_flight: bool,
    runtime: Option<Runtime>,
    mount_ready: Vec<Box<dyn FnOnce()>>,
}

impl ReconcileTransaction {
    /// Point the transaction at its runtime; done on every acquire from the
    /// pool.
    pub(crate) fn attach(&mut self, runtime: &Runtime) {
        self.runtime = Some(runtime.clone());
    }

    /// Enqueue a callback to run when the transaction closes.
    pub(crate) fn enqueue_mount_ready(&mut self, callback: impl FnOnce() + 'static) {
        self.mount_ready.push(Box::new(callback));
    }

    /// The current length of the mount-ready queue, for rollback.
    pub(crate) fn checkpoint(&self) -> usize {
        self.mount_ready.len()
    }

    /// Drop callbacks enqueued after `checkpoint`; used by the initial-mount
    /// error recovery path before a retry.
    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        self.mount_ready.truncate(checkpoint);
    }
}

impl Transaction for ReconcileTransaction {
    type Wrapper = ReconcileWrapper;

    const WRAPPERS: &'static [ReconcileWrapper] =
        &[ReconcileWrapper::EventSuppression, ReconcileWrapper::MountReady];

    fn initialize_wrapper(&mut self, wrapper: ReconcileWrapper) -> InitData {
        match wrapper {
            ReconcileWrapper::EventSuppression => {
                let rt = self.runtime.as_ref().expect("transaction not attached to a runtime");
                let previously = rt.events_enabled();
                rt.set_events_enabled(false);
                InitData::PreviouslyEnabled(previously)
            }
            ReconcileWrapper::MountReady => InitData::None,
        }
    }

    fn close_wrapper(&mut self, wrapper: ReconcileWrapper, data: InitData) {
        match wrapper {
            ReconcileWrapper::EventSuppression => {
                let rt = self.runtime.as_ref().expect("transaction not attached to a runtime");
                if let InitData::PreviouslyEnabled(previously) = data {
                    rt.set_events_enabled(previously);
                }
            }
            ReconcileWrapper::MountReady => {
                for callback in mem::take(&mut self.mount_ready) {
                    callback();
                }
            }
        }
    }

    fn in_flight(&self) -> bool {
        self.in_flight
    }

    fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }
}

impl Poolable for ReconcileTransaction {
    fn destructor(&mut self) {
        self.runtime = None;
        self.mount_ready.clear();
        self.in_flight = false;
    }
}
