//! The update queue and the default batching strategy: dirty composites
//! accumulate while a batch is open, then drain in mount order inside the
//! updates-flush transaction, whose wrappers keep nested updates and
//! post-flush callbacks honest.

use crate::{
    component::{Callback, StatePatch},
    element::Element,
    instance::{CompositeInstance, Instance},
    pool::Poolable,
    reconciler,
    record::Record,
    runtime::Runtime,
    transaction::{self, InitData, ReconcileTransaction, Transaction},
};
use std::{mem, rc::Rc};
use tracing::trace;

/// Enqueue a state patch and schedule the instance.
pub(crate) fn enqueue_set_state(rt: &Runtime, inst: &Rc<CompositeInstance>, patch: StatePatch) {
    rt.assert_not_rendering();
    inst.pending_state.borrow_mut().get_or_insert_with(Vec::new).push(patch);
    enqueue_update(rt, Instance::Composite(inst.clone()));
}

/// Replace the queue with a single whole-state patch and schedule.
pub(crate) fn enqueue_replace_state(rt: &Runtime, inst: &Rc<CompositeInstance>, next: Record) {
    rt.assert_not_rendering();
    *inst.pending_state.borrow_mut() = Some(vec![StatePatch::Record(next)]);
    inst.pending_replace_state.set(true);
    enqueue_update(rt, Instance::Composite(inst.clone()));
}

/// Mark the instance for an update that skips `should_update`.
pub(crate) fn enqueue_force_update(rt: &Runtime, inst: &Rc<CompositeInstance>) {
    rt.assert_not_rendering();
    inst.pending_force_update.set(true);
    enqueue_update(rt, Instance::Composite(inst.clone()));
}

/// Attach a callback to the instance's next flush.
pub(crate) fn enqueue_callback(rt: &Runtime, inst: &Rc<CompositeInstance>, callback: Callback) {
    inst.pending_callbacks.borrow_mut().push(callback);
    enqueue_update(rt, Instance::Composite(inst.clone()));
}

/// Point the instance at a replacement descriptor; the top-level re-render
/// path.
pub(crate) fn enqueue_element_internal(
    rt: &Runtime,
    inst: &Rc<CompositeInstance>,
    element: Element,
    callback: Option<Callback>,
) {
    *inst.pending_element.borrow_mut() = Some(element);
    if let Some(callback) = callback {
        inst.pending_callbacks.borrow_mut().push(callback);
    }
    enqueue_update(rt, Instance::Composite(inst.clone()));
}

/// Add an instance to the dirty set, opening a batch around the call when
/// none is open yet.
pub(crate) fn enqueue_update(rt: &Runtime, instance: Instance) {
    if !rt.is_batching() {
        batched_updates(rt, || enqueue_update(rt, instance.clone()));
        return;
    }
    let mut dirty = rt.inner.dirty.borrow_mut();
    if !dirty.iter().any(|existing| existing.ptr_eq(&instance)) {
        dirty.push(instance);
    }
}

/// Run `f` with batching open; the outermost call flushes accumulated
/// updates as it closes. Re-entrant calls run `f` directly.
pub(crate) fn batched_updates<R>(rt: &Runtime, f: impl FnOnce() -> R) -> R {
    if rt.is_batching() {
        return f();
    }
    rt.set_batching(true);
    let mut tx = rt.inner.pools.batching.acquire();
    tx.runtime = Some(rt.clone());
    let result = transaction::perform(&mut tx, |_| f());
    rt.inner.pools.batching.release(tx);
    rt.rethrow_deferred_unmount_panic();
    result
}

/// Drain the dirty set until it stays empty, one flush transaction per
/// round.
pub(crate) fn flush_batched_updates(rt: &Runtime) {
    while !rt.inner.dirty.borrow().is_empty() {
        let mut flush = rt.inner.pools.flush.acquire();
        flush.attach(rt);
        transaction::perform(&mut flush, |flush| run_batched_updates(rt, flush));
        if let Some(reconcile) = flush.reconcile.take() {
            rt.release_reconcile_transaction(reconcile);
        }
        rt.inner.pools.flush.release(flush);
    }
}

fn run_batched_updates(rt: &Runtime, flush: &mut UpdatesFlushTransaction) {
    let count = flush.dirty_started_with;
    trace!(count, "flushing batched updates");

    // parents before children: ascending mount order
    {
        let mut dirty = rt.inner.dirty.borrow_mut();
        dirty[..count].sort_by_key(|instance| match instance {
            Instance::Composite(c) => c.mount_order.get(),
            _ => u64::MAX,
        });
    }

    let mut reconcile = flush.reconcile.take().expect("flush owns a reconcile transaction");
    transaction::perform(&mut reconcile, |reconcile| {
        for index in 0..count {
            let instance = rt.inner.dirty.borrow()[index].clone();
            let callbacks = match &instance {
                Instance::Composite(c) => c.take_pending_callbacks(),
                _ => Vec::new(),
            };
            if let Err(e) = reconciler::perform_update_if_necessary(rt, &instance, reconcile) {
                panic!("update flush failed: {}", e);
            }
            flush.callbacks.extend(callbacks);
        }
    });
    flush.reconcile = Some(reconcile);
}

/// Wrappers of [`UpdatesFlushTransaction`].
#[derive(Clone, Copy)]
pub(crate) enum FlushWrapper {
    /// Snapshots the dirty length at open; at close, either clears the
    /// processed set or splices it off and recursively flushes the updates
    /// that arrived during the drain.
    NestedUpdates,
    /// Resets the callback queue at open and invokes the collected callbacks
    /// at close.
    UpdateQueueing,
}

/// The transaction one flush round runs inside. Owns the pooled reconcile
/// transaction its component updates share, so their mount-ready callbacks
/// fire before nested updates and post-flush callbacks are considered.
#[derive(Default)]
pub(crate) struct UpdatesFlushTransaction {
    in_flight: bool,
    runtime: Option<Runtime>,
    dirty_started_with: usize,
    callbacks: Vec<Callback>,
    reconcile: Option<ReconcileTransaction>,
}

impl UpdatesFlushTransaction {
    fn attach(&mut self, rt: &Runtime) {
        self.runtime = Some(rt.clone());
        self.reconcile = Some(rt.acquire_reconcile_transaction());
    }

    fn runtime(&self) -> Runtime {
        self.runtime.clone().expect("flush transaction attached to a runtime")
    }
}

impl Transaction for UpdatesFlushTransaction {
    type Wrapper = FlushWrapper;

    const WRAPPERS: &'static [FlushWrapper] =
        &[FlushWrapper::NestedUpdates, FlushWrapper::UpdateQueueing];

    fn initialize_wrapper(&mut self, wrapper: FlushWrapper) -> InitData {
        match wrapper {
            FlushWrapper::NestedUpdates => {
                let len = self.runtime().inner.dirty.borrow().len();
                self.dirty_started_with = len;
                InitData::DirtyLength(len)
            }
            FlushWrapper::UpdateQueueing => {
                self.callbacks.clear();
                InitData::None
            }
        }
    }

    fn close_wrapper(&mut self, wrapper: FlushWrapper, data: InitData) {
        match wrapper {
            FlushWrapper::NestedUpdates => {
                let rt = self.runtime();
                let processed = match data {
                    InitData::DirtyLength(len) => len,
                    _ => 0,
                };
                let grew = rt.inner.dirty.borrow().len() > processed;
                if grew {
                    rt.inner.dirty.borrow_mut().drain(..processed);
                    flush_batched_updates(&rt);
                } else {
                    rt.inner.dirty.borrow_mut().clear();
                }
            }
            FlushWrapper::UpdateQueueing => {
                for callback in mem::take(&mut self.callbacks) {
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

impl Poolable for UpdatesFlushTransaction {
    fn destructor(&mut self) {
        self.runtime = None;
        self.dirty_started_with = 0;
        self.callbacks.clear();
        self.reconcile = None;
        self.in_flight = false;
    }
}

/// Wrappers of [`BatchingTransaction`].
#[derive(Clone, Copy)]
pub(crate) enum BatchingWrapper {
    /// Flushes accumulated updates at close, while the batching flag is
    /// still raised so re-entrant enqueues keep accumulating.
    FlushBatched,
    /// Lowers the batching flag after the flush.
    ResetBatching,
}

/// The transaction the default batching strategy wraps an operation in.
#[derive(Default)]
pub(crate) struct BatchingTransaction {
    in_flight: bool,
    pub(crate) runtime: Option<Runtime>,
}

impl Transaction for BatchingTransaction {
    type Wrapper = BatchingWrapper;

    const WRAPPERS: &'static [BatchingWrapper] =
        &[BatchingWrapper::FlushBatched, BatchingWrapper::ResetBatching];

    fn initialize_wrapper(&mut self, _wrapper: BatchingWrapper) -> InitData {
        InitData::None
    }

    fn close_wrapper(&mut self, wrapper: BatchingWrapper, _data: InitData) {
        let rt = self.runtime.clone().expect("batching transaction attached to a runtime");
        match wrapper {
            BatchingWrapper::FlushBatched => flush_batched_updates(&rt),
            BatchingWrapper::ResetBatching => rt.set_batching(false),
        }
    }

    fn in_flight(&self) -> bool {
        self.in_flight
    }

    fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }
}

impl Poolable for BatchingTransaction {
    fn destructor(&mut self) {
        self.runtime = None;
        self.in_flight = false;
    }
}
