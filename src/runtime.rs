//! The runtime record: every process-wide table the reconciler and event
//! system share, gathered into one explicitly-threaded value. Each runtime is
//! independent; two runtimes driving documents side by side cannot collide
//! because the node back-link key carries a per-runtime token.

use crate::{
    children,
    component::{Callback, ComponentClass, ComponentHandle, Public},
    element::Element,
    error::Error,
    events::{
        hub::PluginRegistry,
        shim::TopLevelBookkeeping,
        simple::SimpleEventPlugin,
        EventPlugin, Handler, SyntheticEvent,
    },
    instance::{CompositeInstance, Instance, WeakInstance},
    mount,
    pool::Pool,
    transaction::ReconcileTransaction,
    updates::{BatchingTransaction, UpdatesFlushTransaction},
};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    panic::resume_unwind,
    rc::{Rc, Weak},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;
use twigdom::{event::EventHandle, Node as DomNode};

pub(crate) struct Pools {
    pub(crate) reconcile: Pool<ReconcileTransaction>,
    pub(crate) flush: Pool<UpdatesFlushTransaction>,
    pub(crate) batching: Pool<BatchingTransaction>,
    events: Pool<SyntheticEvent>,
    bookkeeping: Pool<TopLevelBookkeeping>,
}

impl Default for Pools {
    fn default() -> Self {
        Pools {
            reconcile: Pool::default(),
            flush: Pool::default(),
            batching: Pool::default(),
            events: Pool::default(),
            bookkeeping: Pool::default(),
        }
    }
}

pub(crate) struct RuntimeInner {
    mount_order: Cell<u64>,
    instance_ids: Cell<u64>,
    pub(crate) dirty: RefCell<Vec<Instance>>,
    batching: Cell<bool>,
    rendering: Cell<bool>,
    events_enabled: Cell<bool>,
    pub(crate) registry: RefCell<PluginRegistry>,
    pub(crate) listener_bank: RefCell<HashMap<String, HashMap<u64, Handler>>>,
    pub(crate) event_queue: RefCell<Vec<SyntheticEvent>>,
    listening: RefCell<HashMap<u64, HashSet<String>>>,
    listener_handles: RefCell<Vec<EventHandle>>,
    node_key: String,
    pub(crate) roots: RefCell<HashMap<u64, Instance>>,
    instance_map: RefCell<HashMap<usize, WeakInstance>>,
    pub(crate) top_level_class: Rc<dyn ComponentClass>,
    pub(crate) pools: Pools,
    deferred_unmount_panic: RefCell<Option<Box<dyn Any + Send>>>,
}

/// A declarative UI runtime instance: the public mount surface plus the
/// shared state behind it. Cheap to clone; clones share one runtime.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// A non-owning runtime handle, held by updaters and top-level listener
/// closures so a forgotten handler cannot keep the runtime alive.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    /// Upgrade if the runtime still exists.
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Runtime {
    /// Build a runtime with the default event plugin configuration injected.
    pub fn new() -> Self {
        let rt = Runtime {
            inner: Rc::new(RuntimeInner {
                mount_order: Cell::new(0),
                instance_ids: Cell::new(0),
                dirty: RefCell::new(Vec::new()),
                batching: Cell::new(false),
                rendering: Cell::new(false),
                events_enabled: Cell::new(true),
                registry: RefCell::new(PluginRegistry::default()),
                listener_bank: RefCell::new(HashMap::new()),
                event_queue: RefCell::new(Vec::new()),
                listening: RefCell::new(HashMap::new()),
                listener_handles: RefCell::new(Vec::new()),
                node_key: format!("__arborInternalInstance${}", random_token()),
                roots: RefCell::new(HashMap::new()),
                instance_map: RefCell::new(HashMap::new()),
                top_level_class: Rc::new(mount::TopLevelWrapperClass),
                pools: Pools::default(),
                deferred_unmount_panic: RefCell::new(None),
            }),
        };
        rt.inject_event_plugin(Rc::new(SimpleEventPlugin));
        debug!(node_key = rt.inner.node_key.as_str(), "runtime created");
        rt
    }

    /// Register an additional event plugin; injection order is dispatch
    /// order.
    pub fn inject_event_plugin(&self, plugin: Rc<dyn EventPlugin>) {
        self.inner.registry.borrow_mut().inject(plugin);
    }

    // ---- public mount surface ----

    /// Mount `element` into `container`, or update the tree already mounted
    /// there; see the module docs for the idempotency rules.
    pub fn render(
        &self,
        element: Element,
        container: &DomNode,
    ) -> Result<Option<Public>, Error> {
        mount::render(self, element, container, None)
    }

    /// [`Runtime::render`] with a callback run after the mount or update is
    /// committed.
    pub fn render_with_callback(
        &self,
        element: Element,
        container: &DomNode,
        callback: impl FnOnce() + 'static,
    ) -> Result<Option<Public>, Error> {
        mount::render(self, element, container, Some(Box::new(callback) as Callback))
    }

    /// Mount `element` into `container`, propagating `parent`'s child context
    /// into the new tree.
    pub fn render_subtree_into_container(
        &self,
        parent: &ComponentHandle,
        element: Element,
        container: &DomNode,
    ) -> Result<Option<Public>, Error> {
        mount::render_subtree(self, Some(parent), element, container, None)
    }

    /// Tear down whatever is mounted in `container`; `Ok(false)` when
    /// nothing was.
    pub fn unmount_component_at_node(&self, container: &DomNode) -> Result<bool, Error> {
        mount::unmount_component_at_node(self, container)
    }

    /// Run `f` with update batching open, flushing accumulated updates once
    /// as the outermost call returns.
    pub fn batched_updates<R>(&self, f: impl FnOnce() -> R) -> R {
        crate::updates::batched_updates(self, f)
    }

    /// Whether synthetic event dispatch is currently enabled.
    pub fn events_enabled(&self) -> bool {
        self.inner.events_enabled.get()
    }

    /// Globally enable or disable synthetic event dispatch.
    pub fn set_events_enabled(&self, enabled: bool) {
        self.inner.events_enabled.set(enabled);
    }

    // ---- shared-state accessors ----

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime { inner: Rc::downgrade(&self.inner) }
    }

    pub(crate) fn next_mount_order(&self) -> u64 {
        let next = self.inner.mount_order.get() + 1;
        self.inner.mount_order.set(next);
        next
    }

    pub(crate) fn next_instance_id(&self) -> u64 {
        let next = self.inner.instance_ids.get() + 1;
        self.inner.instance_ids.set(next);
        next
    }

    pub(crate) fn is_batching(&self) -> bool {
        self.inner.batching.get()
    }

    pub(crate) fn set_batching(&self, batching: bool) {
        self.inner.batching.set(batching);
    }

    pub(crate) fn assert_not_rendering(&self) {
        assert!(
            !self.inner.rendering.get(),
            "state updates may not be enqueued while rendering"
        );
    }

    /// Raise the rendering flag for the duration of the returned guard.
    pub(crate) fn rendering_guard(&self) -> impl Drop {
        self.inner.rendering.set(true);
        scopeguard::guard(self.clone(), |rt| rt.inner.rendering.set(false))
    }

    pub(crate) fn node_key(&self) -> &str {
        &self.inner.node_key
    }

    pub(crate) fn is_registration_name(&self, name: &str) -> bool {
        self.inner.registry.borrow().is_registration_name(name)
    }

    // ---- instance map ----

    pub(crate) fn register_instance(&self, inst: &Rc<CompositeInstance>) {
        let key = Rc::as_ptr(&inst.component) as *const () as usize;
        self.inner
            .instance_map
            .borrow_mut()
            .insert(key, Instance::Composite(inst.clone()).downgrade());
    }

    pub(crate) fn unregister_instance(&self, inst: &Rc<CompositeInstance>) {
        let key = Rc::as_ptr(&inst.component) as *const () as usize;
        self.inner.instance_map.borrow_mut().remove(&key);
    }

    pub(crate) fn instance_for_handle(&self, handle: &ComponentHandle) -> Option<Instance> {
        self.inner
            .instance_map
            .borrow()
            .get(&handle.cell_key())
            .and_then(WeakInstance::upgrade)
    }

    // ---- event plumbing ----

    /// Record that a (document, native event) pair is trapped; returns `true`
    /// the first time.
    pub(crate) fn mark_listening(&self, document_id: u64, native_name: &str) -> bool {
        self.inner
            .listening
            .borrow_mut()
            .entry(document_id)
            .or_insert_with(HashSet::new)
            .insert(native_name.to_string())
    }

    pub(crate) fn store_listener_handle(&self, handle: EventHandle) {
        let mut handles = self.inner.listener_handles.borrow_mut();
        handles.push(handle);
        tracing::trace!(total = handles.len(), "retaining a top-level listener");
    }

    pub(crate) fn acquire_event(&self) -> SyntheticEvent {
        self.inner.pools.events.acquire()
    }

    pub(crate) fn release_event(&self, event: SyntheticEvent) {
        self.inner.pools.events.release(event);
    }

    pub(crate) fn acquire_bookkeeping(&self) -> TopLevelBookkeeping {
        self.inner.pools.bookkeeping.acquire()
    }

    pub(crate) fn release_bookkeeping(&self, bookkeeping: TopLevelBookkeeping) {
        self.inner.pools.bookkeeping.release(bookkeeping);
    }

    pub(crate) fn acquire_reconcile_transaction(&self) -> ReconcileTransaction {
        let mut tx = self.inner.pools.reconcile.acquire();
        tx.attach(self);
        tx
    }

    pub(crate) fn release_reconcile_transaction(&self, tx: ReconcileTransaction) {
        self.inner.pools.reconcile.release(tx);
    }

    // ---- deferred unmount errors ----

    /// Stash the first panic from an unguarded `will_unmount` so the rest of
    /// the teardown can finish before it surfaces.
    pub(crate) fn defer_unmount_panic(&self, payload: Box<dyn Any + Send>) {
        let mut slot = self.inner.deferred_unmount_panic.borrow_mut();
        if slot.is_none() {
            *slot = Some(payload);
        } else {
            tracing::error!("additional will_unmount panic suppressed during teardown");
        }
    }

    /// Re-raise a stashed teardown panic, if any; run as the outermost batch
    /// closes, after the DOM work is done.
    pub(crate) fn rethrow_deferred_unmount_panic(&self) {
        let payload = self.inner.deferred_unmount_panic.borrow_mut().take();
        if let Some(payload) = payload {
            resume_unwind(payload);
        }
    }
}

fn random_token() -> String {
    let entropy = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::from(elapsed.subsec_nanos()) ^ elapsed.as_secs())
        .unwrap_or(0);
    children::base36(entropy as usize)
}
