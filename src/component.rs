//! The component model: the lifecycle trait user types implement, the class
//! object describing a component type, and the updater handle through which
//! user code schedules state changes.

use crate::{
    element::View,
    instance::CompositeInstance,
    record::Record,
    runtime::WeakRuntime,
    updates,
};
use std::{
    any::Any,
    cell::RefCell,
    fmt::{Debug, Formatter, Result as FmtResult},
    rc::{Rc, Weak},
};
use tracing::warn;

/// A deferred user callback, run after the flush that scheduled it completes.
pub type Callback = Box<dyn FnOnce()>;

/// Object-safe access to [`Any`] for trait objects.
pub trait AsAny {
    /// This value as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// This value as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A stateful component. Every method except [`Component::render`] has a
/// default body, so simple components implement only what they use.
///
/// Lifecycle methods receive a [`Cx`] giving the props, state, and masked
/// context current at the time of the call, plus the [`Updater`] used to
/// schedule changes.
#[allow(unused_variables)]
pub trait Component: AsAny + 'static {
    /// Produce the component's child view from current props and state.
    fn render(&self, cx: &Cx) -> View;

    /// The state the component starts with.
    fn initial_state(&self, props: &Record, context: &Record) -> Record {
        Record::new()
    }

    /// Runs immediately before the initial render. State enqueued here is
    /// merged before rendering, without a trip through the update queue.
    fn will_mount(&mut self, cx: &Cx) {}

    /// Runs after the component's subtree is in the document. Fires after
    /// every mount of the enclosing transaction completes, children first.
    fn did_mount(&mut self, cx: &Cx) {}

    /// Runs when a new descriptor or context arrives, before the
    /// should-update decision.
    fn will_receive_props(&mut self, cx: &Cx, next_props: &Record, next_context: &Record) {}

    /// Decide whether the update proceeds. Defaults to `true`; skipped
    /// entirely when a force-update is pending.
    fn should_update(
        &self,
        cx: &Cx,
        next_props: &Record,
        next_state: &Record,
        next_context: &Record,
    ) -> bool {
        true
    }

    /// Runs after the update decision, before re-rendering.
    fn will_update(&mut self, cx: &Cx, next_props: &Record, next_state: &Record) {}

    /// Runs after the re-rendered subtree is committed, with the props and
    /// state that were current before the update.
    fn did_update(&mut self, cx: &Cx, prev_props: &Record, prev_state: &Record) {}

    /// Runs before teardown. During a guarded unmount a panic here is logged
    /// and teardown proceeds.
    fn will_unmount(&mut self, cx: &Cx) {}

    /// Context entries this component contributes to its subtree. Every key
    /// must be declared in [`ComponentClass::child_context_keys`].
    fn child_context(&self, cx: &Cx) -> Record {
        Record::new()
    }

    /// Recovery hook for panics during the component's initial mount. Only
    /// consulted when [`ComponentClass::handles_errors`] is `true`; return
    /// `true` to retry the mount once after pending state is drained.
    fn handle_error(&mut self, cx: &Cx, error: &CaughtError) -> bool {
        false
    }
}

/// The class object for a component type: constructs instances and declares
/// the static facts the reconciler needs before an instance exists.
///
/// This object *is* the component marker: a callable without one is treated
/// as a stateless function instead.
pub trait ComponentClass {
    /// Construct a fresh public instance.
    fn create(&self) -> Box<dyn Component>;

    /// A name for diagnostics.
    fn display_name(&self) -> &str {
        "Component"
    }

    /// Props applied underneath explicit config entries.
    fn default_props(&self) -> Record {
        Record::new()
    }

    /// The context keys instances of this class can see. Everything else is
    /// masked out of their [`Cx`].
    fn context_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// The context keys instances of this class may contribute.
    fn child_context_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Opt in to the [`Component::handle_error`] initial-mount retry.
    fn handles_errors(&self) -> bool {
        false
    }
}

/// The view of a component's surroundings handed to lifecycle methods.
pub struct Cx<'a> {
    props: &'a Record,
    state: &'a Record,
    context: &'a Record,
    updater: Updater,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(
        props: &'a Record,
        state: &'a Record,
        context: &'a Record,
        updater: Updater,
    ) -> Self {
        Cx { props, state, context, updater }
    }

    /// Current props.
    pub fn props(&self) -> &Record {
        self.props
    }

    /// Current state.
    pub fn state(&self) -> &Record {
        self.state
    }

    /// Context, masked by the class's declared keys.
    pub fn context(&self) -> &Record {
        self.context
    }

    /// The handle event handlers should capture to schedule updates later.
    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    /// Schedule a shallow state merge; see [`Updater::set_state`].
    pub fn set_state(&self, patch: Record) {
        self.updater.set_state(patch);
    }

    /// Schedule a functional state patch; see [`Updater::set_state_with`].
    pub fn set_state_with(
        &self,
        patch: impl Fn(&Record, &Record, &Record) -> Record + 'static,
    ) {
        self.updater.set_state_with(patch);
    }

    /// Schedule a whole-state replacement; see [`Updater::replace_state`].
    pub fn replace_state(&self, next: Record) {
        self.updater.replace_state(next);
    }

    /// Schedule a re-render that skips `should_update`.
    pub fn force_update(&self) {
        self.updater.force_update();
    }

    /// Run `callback` after the flush that applies the pending updates.
    pub fn enqueue_callback(&self, callback: impl FnOnce() + 'static) {
        self.updater.enqueue_callback(callback);
    }
}

/// A state patch awaiting application: a record to shallow-merge, or a
/// function of the accumulated state, props, and context.
#[derive(Clone)]
pub enum StatePatch {
    /// Shallow-merge this record.
    Record(Record),
    /// Merge the record this function returns.
    With(Rc<dyn Fn(&Record, &Record, &Record) -> Record>),
}

impl Debug for StatePatch {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            StatePatch::Record(r) => f.debug_tuple("Record").field(r).finish(),
            StatePatch::With(..) => f.write_str("With(<fn>)"),
        }
    }
}

/// A cloneable handle through which user code schedules updates against one
/// component. Handles stay valid across unmount; operations on a dead handle
/// log a warning and do nothing.
#[derive(Clone)]
pub struct Updater {
    runtime: WeakRuntime,
    instance: Weak<CompositeInstance>,
}

impl Updater {
    pub(crate) fn new(runtime: WeakRuntime, instance: &Rc<CompositeInstance>) -> Self {
        Updater { runtime, instance: Rc::downgrade(instance) }
    }

    fn live(&self) -> Option<(crate::runtime::Runtime, Rc<CompositeInstance>)> {
        match (self.runtime.upgrade(), self.instance.upgrade()) {
            (Some(rt), Some(inst)) => Some((rt, inst)),
            _ => {
                warn!("ignoring an update scheduled against an unmounted component");
                None
            }
        }
    }

    /// Enqueue a shallow state merge and schedule an update pass.
    pub fn set_state(&self, patch: Record) {
        if let Some((rt, inst)) = self.live() {
            updates::enqueue_set_state(&rt, &inst, StatePatch::Record(patch));
        }
    }

    /// Enqueue a functional patch `(state, props, context) -> record` and
    /// schedule an update pass.
    pub fn set_state_with(&self, patch: impl Fn(&Record, &Record, &Record) -> Record + 'static) {
        if let Some((rt, inst)) = self.live() {
            updates::enqueue_set_state(&rt, &inst, StatePatch::With(Rc::new(patch)));
        }
    }

    /// Enqueue a whole-state replacement and schedule an update pass.
    pub fn replace_state(&self, next: Record) {
        if let Some((rt, inst)) = self.live() {
            updates::enqueue_replace_state(&rt, &inst, next);
        }
    }

    /// Schedule an update pass that skips `should_update`.
    pub fn force_update(&self) {
        if let Some((rt, inst)) = self.live() {
            updates::enqueue_force_update(&rt, &inst);
        }
    }

    /// Run `callback` after the flush that applies the pending updates.
    pub fn enqueue_callback(&self, callback: impl FnOnce() + 'static) {
        if let Some((rt, inst)) = self.live() {
            updates::enqueue_callback(&rt, &inst, Box::new(callback));
        }
    }

    /// Whether the component this handle points at is still mounted.
    pub fn is_mounted(&self) -> bool {
        self.runtime.upgrade().is_some() && self.instance.upgrade().is_some()
    }
}

pub(crate) type ComponentCell = Rc<RefCell<Option<Box<dyn Component>>>>;

/// The public face of a mounted composite: a shared handle to the user's
/// component value, downcastable to its concrete type.
#[derive(Clone)]
pub struct ComponentHandle {
    cell: ComponentCell,
}

impl ComponentHandle {
    pub(crate) fn new(cell: ComponentCell) -> Self {
        ComponentHandle { cell }
    }

    pub(crate) fn cell_key(&self) -> usize {
        Rc::as_ptr(&self.cell) as *const () as usize
    }

    /// Borrow the component as its concrete type. Returns `None` if the
    /// component has unmounted or is of a different type.
    pub fn with<C: Component, R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        let borrowed = self.cell.borrow();
        let component = borrowed.as_ref()?;
        component.as_any().downcast_ref::<C>().map(f)
    }

    /// Mutably borrow the component as its concrete type.
    pub fn with_mut<C: Component, R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let mut borrowed = self.cell.borrow_mut();
        let component = borrowed.as_mut()?;
        component.as_any_mut().downcast_mut::<C>().map(f)
    }

    /// Whether the component is still mounted.
    pub fn is_mounted(&self) -> bool {
        self.cell.borrow().is_some()
    }
}

impl Debug for ComponentHandle {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(if self.is_mounted() { "ComponentHandle" } else { "ComponentHandle(unmounted)" })
    }
}

/// What a mounted tree exposes to the outside: the root composite's handle,
/// or the root host node.
#[derive(Clone, Debug)]
pub enum Public {
    /// A composite's public instance.
    Component(ComponentHandle),
    /// A host element's DOM node.
    Node(twigdom::Node),
}

impl Public {
    /// The component handle, if this is one.
    pub fn as_component(&self) -> Option<&ComponentHandle> {
        match self {
            Public::Component(c) => Some(c),
            _ => None,
        }
    }

    /// The DOM node, if this is one.
    pub fn as_node(&self) -> Option<&twigdom::Node> {
        match self {
            Public::Node(n) => Some(n),
            _ => None,
        }
    }
}

/// A panic payload captured from user code.
pub struct CaughtError {
    payload: Box<dyn Any + Send>,
}

impl CaughtError {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        CaughtError { payload }
    }

    pub(crate) fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// A best-effort description of the panic.
    pub fn message(&self) -> String {
        if let Some(s) = self.payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = self.payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_string()
        }
    }
}

impl Debug for CaughtError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "CaughtError({})", self.message())
    }
}

/// The shim wrapped around a bare callable so the reconciler can treat every
/// composite uniformly: its entire behaviour is invoking the callable from
/// `render`.
pub(crate) struct StatelessShim {
    pub(crate) function: Rc<crate::element::StatelessFn>,
}

impl Component for StatelessShim {
    fn render(&self, cx: &Cx) -> View {
        (self.function)(cx.props(), cx.context())
    }
}
