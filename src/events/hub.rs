//! The event plugin hub: the ordered plugin registry, the tables derived from
//! plugin metadata at injection time, the per-instance listener bank, and the
//! queue synthetic events drain through.

use crate::{
    events::synthetic::{Handler, SyntheticEvent},
    instance::Instance,
    runtime::Runtime,
};
use std::{
    collections::HashMap,
    mem,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
    rc::Rc,
};
use tracing::{error, trace, warn};

/// The two registration names of a phased event prop.
#[derive(Clone, Debug)]
pub struct PhasedNames {
    /// The bubble-phase prop, e.g. `on_click`.
    pub bubbled: String,
    /// The capture-phase prop, e.g. `on_click_capture`.
    pub captured: String,
}

/// One synthetic event type a plugin produces.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// The synthetic event's name.
    pub event_name: String,
    /// Registration names for two-phase events.
    pub phased: Option<PhasedNames>,
    /// The single registration name for non-phased events.
    pub registration_name: Option<String>,
    /// The native event names that must be trapped for this type to fire.
    pub dependencies: Vec<String>,
}

/// Which propagation phase a registration name selects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchPhase {
    /// Target-to-root.
    Bubbled,
    /// Root-to-target.
    Captured,
}

/// An event plugin: declares the event types it synthesises and extracts
/// synthetic events from trapped native ones.
#[allow(unused_variables)]
pub trait EventPlugin {
    /// A name for diagnostics.
    fn name(&self) -> &'static str;

    /// The event types this plugin produces; read once at injection.
    fn event_types(&self) -> Vec<DispatchConfig>;

    /// Produce synthetic events for a trapped native event, with their
    /// dispatch lists already accumulated.
    fn extract_events(
        &self,
        rt: &Runtime,
        top_level: &str,
        target: Option<&Instance>,
        native: &twigdom::event::Event,
    ) -> Vec<SyntheticEvent>;

    /// Hook run after a listener lands in the bank.
    fn did_put_listener(&self, rt: &Runtime, instance: &Instance, registration_name: &str) {}

    /// Hook run before a listener leaves the bank.
    fn will_delete_listener(&self, rt: &Runtime, instance: &Instance, registration_name: &str) {}
}

/// Everything the registry knows about one registration name.
#[derive(Clone, Debug)]
pub struct RegistrationInfo {
    /// Index of the owning plugin in injection order.
    pub plugin_index: usize,
    /// The synthetic event the name registers for.
    pub event_name: String,
    /// The propagation phase, `None` for non-phased registrations.
    pub phase: Option<DispatchPhase>,
    /// Native events that must be trapped before this registration works.
    pub dependencies: Vec<String>,
}

/// The ordered plugin list and the lookup tables derived from it.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Rc<dyn EventPlugin>>,
    registrations: HashMap<String, RegistrationInfo>,
}

impl PluginRegistry {
    /// Append a plugin and derive its tables. Injection order is dispatch
    /// order.
    pub fn inject(&mut self, plugin: Rc<dyn EventPlugin>) {
        let plugin_index = self.plugins.len();
        for config in plugin.event_types() {
            let mut register = |name: &str, phase: Option<DispatchPhase>| {
                let previous = self.registrations.insert(
                    name.to_string(),
                    RegistrationInfo {
                        plugin_index,
                        event_name: config.event_name.clone(),
                        phase,
                        dependencies: config.dependencies.clone(),
                    },
                );
                assert!(
                    previous.is_none(),
                    "two plugins registered the event prop {:?}",
                    name
                );
            };
            if let Some(phased) = &config.phased {
                register(&phased.bubbled, Some(DispatchPhase::Bubbled));
                register(&phased.captured, Some(DispatchPhase::Captured));
            }
            if let Some(name) = &config.registration_name {
                register(name, None);
            }
        }
        trace!(plugin = plugin.name(), "injected event plugin");
        self.plugins.push(plugin);
    }

    /// The plugins in injection order.
    pub fn plugins(&self) -> &[Rc<dyn EventPlugin>] {
        &self.plugins
    }

    /// Look up a registration name.
    pub fn registration(&self, name: &str) -> Option<&RegistrationInfo> {
        self.registrations.get(name)
    }

    /// Whether `name` is a registered event prop.
    pub fn is_registration_name(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }
}

/// Store a listener for `(instance, registration name)` and notify the owning
/// plugin.
pub(crate) fn put_listener(rt: &Runtime, instance: &Instance, registration_name: &str, listener: Handler) {
    let plugin = {
        let registry = rt.inner.registry.borrow();
        match registry.registration(registration_name) {
            Some(info) => registry.plugins()[info.plugin_index].clone(),
            None => {
                warn!(registration_name, "ignoring listener for an unregistered event prop");
                return;
            }
        }
    };
    rt.inner
        .listener_bank
        .borrow_mut()
        .entry(registration_name.to_string())
        .or_insert_with(HashMap::new)
        .insert(instance.id(), listener);
    plugin.did_put_listener(rt, instance, registration_name);
}

/// Look up the listener an instance registered under `registration_name`.
pub(crate) fn get_listener(rt: &Runtime, instance_id: u64, registration_name: &str) -> Option<Handler> {
    rt.inner
        .listener_bank
        .borrow()
        .get(registration_name)
        .and_then(|per_instance| per_instance.get(&instance_id))
        .cloned()
}

/// Remove one listener, notifying the owning plugin first.
pub(crate) fn delete_listener(rt: &Runtime, instance: &Instance, registration_name: &str) {
    let plugin = {
        let registry = rt.inner.registry.borrow();
        registry
            .registration(registration_name)
            .map(|info| registry.plugins()[info.plugin_index].clone())
    };
    if let Some(plugin) = plugin {
        plugin.will_delete_listener(rt, instance, registration_name);
    }
    if let Some(per_instance) = rt.inner.listener_bank.borrow_mut().get_mut(registration_name) {
        per_instance.remove(&instance.id());
    }
}

/// Remove every listener an instance registered; run on unmount.
pub(crate) fn delete_all_listeners(rt: &Runtime, instance: &Instance) {
    let names: Vec<String> = rt
        .inner
        .listener_bank
        .borrow()
        .iter()
        .filter(|(_, per_instance)| per_instance.contains_key(&instance.id()))
        .map(|(name, _)| name.clone())
        .collect();
    for name in names {
        delete_listener(rt, instance, &name);
    }
}

/// Run every plugin against a trapped native event, accumulating the
/// synthetic events they produce.
pub(crate) fn extract_events(
    rt: &Runtime,
    top_level: &str,
    target: Option<&Instance>,
    native: &twigdom::event::Event,
) -> Vec<SyntheticEvent> {
    let plugins: Vec<Rc<dyn EventPlugin>> = rt.inner.registry.borrow().plugins().to_vec();
    let mut events = Vec::new();
    for plugin in plugins {
        events.extend(plugin.extract_events(rt, top_level, target, native));
    }
    events
}

/// Push synthetic events onto the process-wide queue.
pub(crate) fn enqueue_events(rt: &Runtime, events: Vec<SyntheticEvent>) {
    rt.inner.event_queue.borrow_mut().extend(events);
}

/// Drain the event queue, executing each event's accumulated dispatches in
/// order. Panics from listeners are caught per-listener; the first is
/// re-raised after the whole queue drains, later ones are logged.
pub(crate) fn process_event_queue(rt: &Runtime) {
    let queue: Vec<SyntheticEvent> = mem::take(&mut *rt.inner.event_queue.borrow_mut());
    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;

    for mut event in queue {
        let listeners = mem::take(&mut event.dispatch_listeners);
        let instances = mem::take(&mut event.dispatch_instances);
        debug_assert_eq!(listeners.len(), instances.len());

        for (listener, instance) in listeners.into_iter().zip(instances) {
            if event.is_propagation_stopped() {
                break;
            }
            event.current_instance = Some(instance);
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.call(&mut event)));
            event.current_instance = None;
            if let Err(payload) = outcome {
                if first_panic.is_none() {
                    first_panic = Some(payload);
                } else {
                    error!("additional event listener panic suppressed during queue drain");
                }
            }
        }

        if event.is_persistent() {
            drop(event);
        } else {
            rt.release_event(event);
        }
    }

    if let Some(payload) = first_panic {
        resume_unwind(payload);
    }
}
