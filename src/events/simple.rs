//! The default event plugin: a table-driven mapping from the common native
//! events to phased `on_*` / `on_*_capture` props, one synthetic event each.

use crate::{
    events::{
        hub::{DispatchConfig, EventPlugin, PhasedNames},
        propagation,
        synthetic::SyntheticEvent,
    },
    instance::Instance,
    runtime::Runtime,
};

/// `(native event name, registration base)`; the capture-phase name appends
/// `_capture`.
const EVENT_TYPES: &[(&str, &str)] = &[
    ("click", "on_click"),
    ("dblclick", "on_dblclick"),
    ("mousedown", "on_mouse_down"),
    ("mouseup", "on_mouse_up"),
    ("mousemove", "on_mouse_move"),
    ("keydown", "on_key_down"),
    ("keyup", "on_key_up"),
    ("keypress", "on_key_press"),
    ("focus", "on_focus"),
    ("blur", "on_blur"),
    ("input", "on_input"),
    ("change", "on_change"),
    ("submit", "on_submit"),
    ("scroll", "on_scroll"),
];

/// The plugin injected by default at runtime construction.
pub struct SimpleEventPlugin;

impl SimpleEventPlugin {
    fn phased_names(registration_base: &str) -> PhasedNames {
        PhasedNames {
            bubbled: registration_base.to_string(),
            captured: format!("{}_capture", registration_base),
        }
    }
}

impl EventPlugin for SimpleEventPlugin {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn event_types(&self) -> Vec<DispatchConfig> {
        EVENT_TYPES
            .iter()
            .map(|(native, base)| DispatchConfig {
                event_name: native.to_string(),
                phased: Some(Self::phased_names(base)),
                registration_name: None,
                dependencies: vec![native.to_string()],
            })
            .collect()
    }

    fn extract_events(
        &self,
        rt: &Runtime,
        top_level: &str,
        target: Option<&Instance>,
        native: &twigdom::event::Event,
    ) -> Vec<SyntheticEvent> {
        let base = match EVENT_TYPES.iter().find(|(name, _)| *name == top_level) {
            Some((_, base)) => *base,
            None => return Vec::new(),
        };

        let mut event = rt.acquire_event();
        event.event_name.push_str(top_level);
        event.native_name.push_str(native.name());
        event.bubbles = native.bubbles();
        event.cancelable = native.cancelable();
        event.detail = Some(native.detail().clone());
        event.native = Some(native.clone());
        event.target_instance = target.cloned();
        event.target_node = native.target();

        propagation::accumulate_two_phase_dispatches(rt, &mut event, &Self::phased_names(base));
        vec![event]
    }
}
