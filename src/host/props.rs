//! Property application and diffing for host elements: the write-path table,
//! style normalisation, event-prop routing into the plugin hub, and the raw
//! inner-HTML escape hatch.

use crate::{
    error::Error,
    events::{hub, shim},
    instance::{HostInstance, Instance},
    record::{Record, Value},
    runtime::Runtime,
    transaction::ReconcileTransaction,
};
use std::rc::Rc;
use tracing::{trace, warn};
use twigdom::{Document, Node as DomNode};

/// Tags that never take content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

/// Style properties whose bare numbers stay unitless; everything else gets
/// `px` appended.
const UNITLESS_STYLES: &[&str] = &[
    "animation-iteration-count",
    "column-count",
    "fill-opacity",
    "flex",
    "flex-grow",
    "flex-shrink",
    "font-weight",
    "line-clamp",
    "line-height",
    "opacity",
    "order",
    "orphans",
    "stroke-opacity",
    "widows",
    "z-index",
    "zoom",
];

/// Attributes written by presence: truthy values set `name=""`, falsy values
/// remove the attribute.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen", "async", "autofocus", "autoplay", "checked", "controls", "default",
    "defer", "disabled", "formnovalidate", "hidden", "loop", "multiple", "muted", "novalidate",
    "open", "readonly", "required", "reversed", "scoped", "seamless", "selected",
];

/// How one prop reaches the DOM.
pub(crate) struct PropInfo {
    /// The attribute name written.
    pub attribute: String,
    /// Whether the attribute is presence-valued.
    pub boolean: bool,
}

/// The write path for a prop name. This table is the internal default behind
/// the property-registry contract: names map straight onto attributes, with a
/// boolean set carved out.
pub(crate) fn property_info(name: &str) -> PropInfo {
    PropInfo { attribute: name.to_string(), boolean: BOOLEAN_ATTRIBUTES.contains(&name) }
}

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Custom elements pass props straight through as attributes.
pub(crate) fn is_custom_element(tag: &str, props: &Record) -> bool {
    tag.contains('-') || props.contains_key("is")
}

/// Extract the raw-HTML payload: a record of the shape `{ "__html": "…" }`.
pub(crate) fn inner_html_of(props: &Record) -> Result<Option<String>, Error> {
    match props.get("dangerous_inner_html") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Map(map)) => match map.get("__html") {
            Some(Value::Str(html)) => Ok(Some(html.clone())),
            _ => Err(Error::MalformedInnerHtml),
        },
        Some(..) => Err(Error::MalformedInnerHtml),
    }
}

/// The content-shape assertions that run before any DOM write.
pub(crate) fn assert_valid_props(tag: &str, props: &Record) -> Result<(), Error> {
    let has_children = props.get("children").map_or(false, |v| !v.is_null());
    let html = inner_html_of(props)?;

    if is_void_element(tag) && (has_children || html.is_some()) {
        return Err(Error::VoidElementContent { tag: tag.to_string() });
    }
    if has_children && html.is_some() {
        return Err(Error::InnerHtmlWithChildren);
    }
    match props.get("style") {
        None | Some(Value::Null) | Some(Value::Map(..)) => {}
        Some(..) => return Err(Error::StyleMustBeRecord),
    }
    Ok(())
}

/// Normalise one style value: empty, null, and `false` clear the entry;
/// numbers are stringified, gaining `px` unless the property is unitless;
/// strings are trimmed.
pub(crate) fn dangerous_style_value(name: &str, value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => String::new(),
        Value::Str(s) => s.trim().to_string(),
        Value::Num(n) => {
            if *n == 0.0 {
                "0".to_string()
            } else if UNITLESS_STYLES.contains(&name) {
                format_number(*n)
            } else {
                format!("{}px", format_number(*n))
            }
        }
        other => {
            warn!(name, ?other, "ignoring non-scalar style value");
            String::new()
        }
    }
}

/// Render the applied style record as a `style` attribute value.
pub(crate) fn serialize_style(style: &Record) -> String {
    let mut out = String::new();
    for (name, value) in style.iter() {
        let rendered = dangerous_style_value(name, value);
        if rendered.is_empty() {
            continue;
        }
        out.push_str(name);
        out.push(':');
        out.push_str(&rendered);
        out.push(';');
    }
    out
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Render a prop value as an attribute string; `None` means "do not write".
fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Num(n) => Some(format_number(*n)),
        Value::Str(s) => Some(s.clone()),
        other => {
            warn!(?other, "ignoring a prop value with no attribute rendering");
            None
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

/// Names handled outside the ordinary write paths.
fn is_reserved(name: &str) -> bool {
    matches!(name, "children" | "dangerous_inner_html")
}

/// Apply a mounting element's props to its fresh node.
pub(crate) fn set_initial_properties(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    node: &DomNode,
    props: &Record,
    document: &Document,
) -> Result<(), Error> {
    let tag = host.tag.borrow().clone();
    let custom = is_custom_element(&tag, props);

    for (name, value) in props.iter() {
        if is_reserved(name) || value.is_null() {
            continue;
        }
        if name == "style" {
            let style = value.as_record().cloned().unwrap_or_default();
            let rendered = serialize_style(&style);
            if !rendered.is_empty() {
                node.set_attribute("style", &rendered);
            }
            *host.previous_style.borrow_mut() = Some(style);
        } else if rt.is_registration_name(name) {
            if let Some(handler) = value.as_handler() {
                enqueue_put_listener(rt, host, tx, document, name, handler.clone());
            } else {
                warn!(name, "expected a handler value for an event prop");
            }
        } else if name == "ref" || name == "key" {
            // extracted by the element factory; never reaches props in
            // practice, but tolerate hand-built records
            continue;
        } else if custom {
            if let Some(rendered) = attribute_value(value) {
                node.set_attribute(name, &rendered);
            }
        } else {
            let info = property_info(name);
            if info.boolean {
                if is_truthy(value) {
                    node.set_attribute(&info.attribute, "");
                }
            } else if let Some(rendered) = attribute_value(value) {
                node.set_attribute(&info.attribute, &rendered);
            }
        }
    }
    Ok(())
}

/// Diff two prop records onto the mounted node: removed or nulled keys are
/// cleared first, then changed keys are written.
pub(crate) fn update_properties(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    prev_props: &Record,
    next_props: &Record,
    document: &Document,
) -> Result<(), Error> {
    let tag = host.tag.borrow().clone();
    let custom = is_custom_element(&tag, next_props);
    let node = host.dom_node();
    let instance = Instance::Host(host.clone());

    // removals
    for (name, _prev) in prev_props.iter() {
        if is_reserved(name) {
            continue;
        }
        let still_present = next_props.get(name).map_or(false, |v| !v.is_null());
        if still_present {
            continue;
        }
        if name == "style" {
            if host.previous_style.borrow_mut().take().is_some() {
                node.remove_attribute("style");
            }
        } else if rt.is_registration_name(name) {
            hub::delete_listener(rt, &instance, name);
        } else {
            node.remove_attribute(&property_info(name).attribute);
        }
    }

    // additions and changes
    for (name, next_value) in next_props.iter() {
        if is_reserved(name) || next_value.is_null() {
            continue;
        }
        if prev_props.get(name) == Some(next_value) {
            continue;
        }
        if name == "style" {
            update_style(host, &node, next_value.as_record().cloned().unwrap_or_default());
        } else if rt.is_registration_name(name) {
            if let Some(handler) = next_value.as_handler() {
                enqueue_put_listener(rt, host, tx, document, name, handler.clone());
            } else {
                warn!(name, "expected a handler value for an event prop");
            }
        } else if custom {
            if let Some(rendered) = attribute_value(next_value) {
                node.set_attribute(name, &rendered);
            }
        } else {
            let info = property_info(name);
            if info.boolean {
                if is_truthy(next_value) {
                    node.set_attribute(&info.attribute, "");
                } else {
                    node.remove_attribute(&info.attribute);
                }
            } else if let Some(rendered) = attribute_value(next_value) {
                node.set_attribute(&info.attribute, &rendered);
            }
        }
    }
    Ok(())
}

/// Diff style sub-keys: entries gone from the next style clear, changed
/// entries rewrite. A delta-free diff leaves the attribute untouched.
fn update_style(host: &Rc<HostInstance>, node: &DomNode, next_style: Record) {
    let prev_style = host.previous_style.borrow_mut().replace(next_style.clone());
    let prev_style = prev_style.unwrap_or_default();

    let mut removed = 0usize;
    let mut changed = 0usize;
    for (name, _) in prev_style.iter() {
        if !next_style.contains_key(name) {
            removed += 1;
        }
    }
    for (name, value) in next_style.iter() {
        if prev_style.get(name) != Some(value) {
            changed += 1;
        }
    }
    if removed == 0 && changed == 0 {
        return;
    }
    trace!(removed, changed, "rewriting style attribute");

    let rendered = serialize_style(&next_style);
    if rendered.is_empty() {
        node.remove_attribute("style");
    } else {
        node.set_attribute("style", &rendered);
    }
}

/// Route an event prop into the hub: make sure the document traps the
/// dependencies now, and land the listener in the bank when the transaction's
/// mount-ready queue drains.
fn enqueue_put_listener(
    rt: &Runtime,
    host: &Rc<HostInstance>,
    tx: &mut ReconcileTransaction,
    document: &Document,
    registration_name: &str,
    handler: crate::events::Handler,
) {
    shim::listen_to(rt, document, registration_name);
    let rt = rt.clone();
    let instance = Instance::Host(host.clone());
    let name = registration_name.to_string();
    tx.enqueue_mount_ready(move || {
        hub::put_listener(&rt, &instance, &name, handler);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn style_values_normalise() {
        assert_eq!(dangerous_style_value("width", &Value::Num(10.0)), "10px");
        assert_eq!(dangerous_style_value("z-index", &Value::Num(3.0)), "3");
        assert_eq!(dangerous_style_value("opacity", &Value::Num(0.5)), "0.5");
        assert_eq!(dangerous_style_value("width", &Value::Num(0.0)), "0");
        assert_eq!(dangerous_style_value("color", &Value::Str("  red  ".into())), "red");
        assert_eq!(dangerous_style_value("color", &Value::Null), "");
        assert_eq!(dangerous_style_value("color", &Value::Bool(false)), "");
    }

    #[test]
    fn style_serialisation_skips_cleared_entries() {
        let style = record! { "color" => "red", "display" => Value::Null, "width" => 4 };
        assert_eq!(serialize_style(&style), "color:red;width:4px;");
    }

    #[test]
    fn content_assertions() {
        assert!(assert_valid_props("br", &record! { "children" => Value::Node("x".into()) }).is_err());
        assert!(assert_valid_props("div", &record! { "style" => "nope" }).is_err());

        let both = record! {
            "children" => Value::Node("x".into()),
            "dangerous_inner_html" => record! { "__html" => "<b>y</b>" },
        };
        assert!(matches!(assert_valid_props("div", &both), Err(Error::InnerHtmlWithChildren)));

        let html_only = record! { "dangerous_inner_html" => record! { "__html" => "<b>y</b>" } };
        assert!(assert_valid_props("div", &html_only).is_ok());
    }
}
