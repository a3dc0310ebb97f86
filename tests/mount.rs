//! Mounting, markers, idempotent re-render, and unmount round-trips.

use arbor::{
    create_element, host, record,
    testing::Harness,
    Component, ComponentClass, ComponentKind, Cx, Error, Public, Record, RefCallback, Value, View,
};
use std::{
    cell::{Cell, RefCell},
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

#[test]
fn mounted_markup_carries_root_id_and_text_markers() {
    let h = Harness::new();
    h.render(create_element(host("div"), record! { "id" => "x" }, vec!["hello".into()])).unwrap();
    assert_eq!(
        h.html(),
        "<div data-arbor-root=\"\" data-arborid=\"0\" id=\"x\">\
         <!-- arbor-text: 1 -->hello<!-- /arbor-text --></div>"
    );
}

struct NothingClass;

impl ComponentClass for NothingClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Nothing)
    }

    fn display_name(&self) -> &str {
        "Nothing"
    }
}

struct Nothing;

impl Component for Nothing {
    fn render(&self, _cx: &Cx) -> View {
        View::Empty
    }
}

#[test]
fn empty_renders_leave_a_placeholder_comment() {
    let h = Harness::new();
    h.render(create_element(ComponentKind::class(NothingClass), Record::new(), vec![])).unwrap();
    assert_eq!(h.html(), "<!-- arbor-empty: 0 -->");
}

#[test]
fn unmount_restores_the_container_to_empty() {
    let h = Harness::new();
    h.render(create_element(host("div"), record! { "id" => "x" }, vec![])).unwrap();
    assert!(!h.html().is_empty());

    assert_eq!(h.unmount().unwrap(), true);
    assert_eq!(h.html(), "");
    assert_eq!(h.unmount().unwrap(), false, "a second unmount finds nothing");
}

#[test]
fn rerendering_the_same_type_updates_in_place() {
    let h = Harness::new();
    h.render(create_element(host("div"), record! { "id" => "x", "title" => "a" }, vec![])).unwrap();
    let first = h.container.first_child().unwrap();

    h.render(create_element(host("div"), record! { "id" => "y" }, vec![])).unwrap();
    let second = h.container.first_child().unwrap();

    assert_eq!(first, second, "the DOM node survives the update");
    assert_eq!(second.get_attribute("id").as_deref(), Some("y"));
    assert_eq!(second.get_attribute("title"), None, "dropped props are removed");
    assert_eq!(second.get_attribute("data-arborid").as_deref(), Some("0"));
}

struct CountingClass {
    constructions: Rc<Cell<usize>>,
}

impl ComponentClass for CountingClass {
    fn create(&self) -> Box<dyn Component> {
        self.constructions.set(self.constructions.get() + 1);
        Box::new(Counting)
    }

    fn display_name(&self) -> &str {
        "Counting"
    }
}

struct Counting;

impl Component for Counting {
    fn render(&self, cx: &Cx) -> View {
        let label = cx.props().get("label").and_then(Value::as_str).unwrap_or("-").to_string();
        create_element(host("p"), Record::new(), vec![label.into()]).into()
    }
}

#[test]
fn rendering_twice_reuses_the_component_instance() {
    let constructions = Rc::new(Cell::new(0));
    let kind = ComponentKind::class(CountingClass { constructions: constructions.clone() });

    let h = Harness::new();
    h.render(create_element(kind.clone(), record! { "label" => "one" }, vec![])).unwrap();
    h.render(create_element(kind, record! { "label" => "two" }, vec![])).unwrap();

    assert_eq!(constructions.get(), 1, "update, not remount");
    assert!(h.html().contains("two"));
}

#[test]
fn incompatible_roots_remount_from_scratch() {
    let h = Harness::new();
    h.render(create_element(host("div"), Record::new(), vec![])).unwrap();
    let div = h.container.first_child().unwrap();

    h.render(create_element(host("span"), Record::new(), vec![])).unwrap();
    let span = h.container.first_child().unwrap();

    assert_ne!(div, span);
    assert_eq!(span.tag().as_deref(), Some("span"));
}

#[test]
fn invalid_containers_are_rejected() {
    let h = Harness::new();
    let text = h.doc.create_text_node("not a container");
    h.doc.as_node().append_child(&text);

    let result = h.rt.render(create_element(host("div"), Record::new(), vec![]), &text);
    assert!(matches!(result, Err(Error::InvalidContainer { .. })));
}

#[test]
fn raw_inner_html_renders_verbatim() {
    let h = Harness::new();
    h.render(create_element(
        host("div"),
        record! { "dangerous_inner_html" => record! { "__html" => "<b>bold</b>" } },
        vec![],
    ))
    .unwrap();
    assert!(h.html().contains("<b>bold</b>"));
}

#[test]
fn content_contract_violations_surface_as_errors() {
    let h = Harness::new();

    let conflicting = create_element(
        host("div"),
        record! { "dangerous_inner_html" => record! { "__html" => "<b>x</b>" } },
        vec!["child".into()],
    );
    assert!(matches!(h.render(conflicting), Err(Error::InnerHtmlWithChildren)));

    let void_with_children = create_element(host("br"), Record::new(), vec!["child".into()]);
    assert!(matches!(h.render(void_with_children), Err(Error::VoidElementContent { .. })));

    let bad_tag = create_element(host("1bad"), Record::new(), vec![]);
    assert!(matches!(h.render(bad_tag), Err(Error::InvalidTag { .. })));
}

#[test]
fn stateless_functions_render_through_a_shim() {
    let kind = ComponentKind::stateless(|props, _context| {
        let msg = props.get("msg").and_then(Value::as_str).unwrap_or("?").to_string();
        create_element(host("p"), Record::new(), vec![msg.into()]).into()
    });

    let h = Harness::new();
    h.render(create_element(kind, record! { "msg" => "from fn" }, vec![])).unwrap();
    assert!(h.html().contains("from fn"));
}

#[test]
fn render_callback_runs_after_commit() {
    let h = Harness::new();
    let seen = Rc::new(RefCell::new(String::new()));
    let seen_in_callback = seen.clone();
    let container = h.container.clone();

    h.rt.render_with_callback(
        create_element(host("div"), Record::new(), vec!["done".into()]),
        &h.container,
        move || *seen_in_callback.borrow_mut() = container.inner_html(),
    )
    .unwrap();

    assert!(seen.borrow().contains("done"), "the callback observed the committed tree");
}

#[test]
fn host_refs_attach_and_detach() {
    let h = Harness::new();
    let attached: Rc<RefCell<Vec<Option<String>>>> = Rc::new(RefCell::new(Vec::new()));
    let log = attached.clone();
    let ref_cb = RefCallback::new(move |public: Option<Public>| {
        log.borrow_mut().push(public.and_then(|p| p.as_node().and_then(|n| n.tag())));
    });

    h.render(create_element(host("div"), record! { "ref" => Value::Ref(ref_cb) }, vec![]))
        .unwrap();
    h.unmount().unwrap();

    assert_eq!(*attached.borrow(), vec![Some("div".to_string()), None]);
}

#[test]
fn component_refs_expose_the_public_instance() {
    let constructions = Rc::new(Cell::new(0));
    let kind = ComponentKind::class(CountingClass { constructions });

    let captured: Rc<RefCell<Option<Public>>> = Rc::new(RefCell::new(None));
    let slot = captured.clone();
    let ref_cb = RefCallback::new(move |public| {
        if public.is_some() {
            *slot.borrow_mut() = public;
        }
    });

    let h = Harness::new();
    h.render(create_element(
        kind,
        record! { "label" => "x", "ref" => Value::Ref(ref_cb) },
        vec![],
    ))
    .unwrap();

    let captured = captured.borrow();
    let handle = captured.as_ref().and_then(Public::as_component).expect("composite ref");
    assert_eq!(handle.with(|_: &Counting| ()).is_some(), true);
}

#[test]
fn render_errors_do_not_poison_the_container() {
    let h = Harness::new();
    let bad = create_element(host("1bad"), Record::new(), vec![]);
    assert!(h.render(bad).is_err());

    // the container is still usable for a valid tree
    h.render(create_element(host("div"), Record::new(), vec!["ok".into()])).unwrap();
    assert!(h.html().contains("ok"));
}

#[test]
fn svg_subtrees_switch_namespaces() {
    let h = Harness::new();
    h.render(create_element(
        host("div"),
        Record::new(),
        vec![create_element(
            host("svg"),
            Record::new(),
            vec![
                create_element(host("circle"), record! { "id" => "c" }, vec![]).into(),
                create_element(
                    host("foreignObject"),
                    Record::new(),
                    vec![create_element(host("p"), record! { "id" => "p" }, vec![]).into()],
                )
                .into(),
            ],
        )
        .into()],
    ))
    .unwrap();

    use twigdom::Namespace;
    assert_eq!(h.node_by_id("c").unwrap().namespace(), Some(Namespace::Svg));
    assert_eq!(
        h.node_by_id("p").unwrap().namespace(),
        Some(Namespace::Html),
        "foreignObject re-enters html"
    );
}

#[test]
fn boolean_attributes_write_by_presence() {
    let h = Harness::new();
    h.render(create_element(
        host("input"),
        record! { "id" => "f", "disabled" => true },
        vec![],
    ))
    .unwrap();
    assert_eq!(h.node_by_id("f").unwrap().get_attribute("disabled").as_deref(), Some(""));

    h.render(create_element(
        host("input"),
        record! { "id" => "f", "disabled" => false },
        vec![],
    ))
    .unwrap();
    assert_eq!(h.node_by_id("f").unwrap().get_attribute("disabled"), None);
}

#[test]
fn style_records_serialise_and_diff() {
    let h = Harness::new();
    h.render(create_element(
        host("div"),
        record! { "id" => "s", "style" => record! { "color" => "red", "width" => 10 } },
        vec![],
    ))
    .unwrap();
    assert_eq!(
        h.node_by_id("s").unwrap().get_attribute("style").as_deref(),
        Some("color:red;width:10px;")
    );

    h.render(create_element(
        host("div"),
        record! { "id" => "s", "style" => record! { "color" => "blue" } },
        vec![],
    ))
    .unwrap();
    assert_eq!(
        h.node_by_id("s").unwrap().get_attribute("style").as_deref(),
        Some("color:blue;"),
        "removed sub-keys are cleared"
    );

    h.render(create_element(host("div"), record! { "id" => "s" }, vec![])).unwrap();
    assert_eq!(h.node_by_id("s").unwrap().get_attribute("style"), None);
}

#[test]
fn panicking_renders_propagate() {
    struct PanicsClass;
    impl ComponentClass for PanicsClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Panics)
        }
    }
    struct Panics;
    impl Component for Panics {
        fn render(&self, _cx: &Cx) -> View {
            panic!("render exploded")
        }
    }

    let h = Harness::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        h.render(create_element(ComponentKind::class(PanicsClass), Record::new(), vec![]))
    }));
    assert!(result.is_err());
}
