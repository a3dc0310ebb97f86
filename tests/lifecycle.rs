//! Lifecycle ordering across mounts, updates, and teardown, including
//! teardown under panicking `will_unmount` hooks.

use arbor::{
    create_element, host, record,
    testing::Harness,
    Component, ComponentClass, ComponentKind, Cx, Record, Value, View,
};
use std::{
    cell::{Cell, RefCell},
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

type Log = Rc<RefCell<Vec<String>>>;

/// A component that narrates its lifecycle into a shared log and renders
/// either a wrapped child kind or a plain paragraph.
struct NarratorClass {
    label: &'static str,
    log: Log,
    child: Option<ComponentKind>,
    panic_on_unmount: bool,
}

impl NarratorClass {
    fn kind(label: &'static str, log: &Log, child: Option<ComponentKind>) -> ComponentKind {
        ComponentKind::class(NarratorClass {
            label,
            log: log.clone(),
            child,
            panic_on_unmount: false,
        })
    }
}

impl ComponentClass for NarratorClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Narrator {
            label: self.label,
            log: self.log.clone(),
            child: self.child.clone(),
            panic_on_unmount: self.panic_on_unmount,
        })
    }

    fn display_name(&self) -> &str {
        self.label
    }
}

struct Narrator {
    label: &'static str,
    log: Log,
    child: Option<ComponentKind>,
    panic_on_unmount: bool,
}

impl Narrator {
    fn note(&self, what: &str) {
        self.log.borrow_mut().push(format!("{} {}", self.label, what));
    }
}

impl Component for Narrator {
    fn render(&self, cx: &Cx) -> View {
        match &self.child {
            Some(kind) => {
                let mut config = Record::new();
                if let Some(msg) = cx.props().get("msg") {
                    config.insert("msg", msg.clone());
                }
                create_element(host("div"), Record::new(), vec![create_element(
                    kind.clone(),
                    config,
                    vec![],
                )
                .into()])
                .into()
            }
            None => {
                let msg = cx.props().get("msg").and_then(Value::as_str).unwrap_or("-").to_string();
                create_element(host("p"), Record::new(), vec![msg.into()]).into()
            }
        }
    }

    fn will_mount(&mut self, _cx: &Cx) {
        self.note("will_mount");
    }

    fn did_mount(&mut self, _cx: &Cx) {
        self.note("did_mount");
    }

    fn will_receive_props(&mut self, _cx: &Cx, _next_props: &Record, _next_context: &Record) {
        self.note("will_receive_props");
    }

    fn will_update(&mut self, _cx: &Cx, _next_props: &Record, _next_state: &Record) {
        self.note("will_update");
    }

    fn did_update(&mut self, _cx: &Cx, prev_props: &Record, _prev_state: &Record) {
        let prev = prev_props.get("msg").and_then(Value::as_str).unwrap_or("-").to_string();
        self.log.borrow_mut().push(format!("{} did_update prev={}", self.label, prev));
    }

    fn will_unmount(&mut self, _cx: &Cx) {
        self.note("will_unmount");
        if self.panic_on_unmount {
            panic!("unmount failure in {}", self.label);
        }
    }
}

#[test]
fn did_mount_fires_children_first_after_all_mounts() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let child = NarratorClass::kind("child", &log, None);
    let parent = NarratorClass::kind("parent", &log, Some(child));

    let h = Harness::new();
    h.render(create_element(parent, Record::new(), vec![])).unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["parent will_mount", "child will_mount", "child did_mount", "parent did_mount"]
    );
}

#[test]
fn updates_run_top_down_and_did_update_bottom_up() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let child = NarratorClass::kind("child", &log, None);
    let parent = NarratorClass::kind("parent", &log, Some(child));

    let h = Harness::new();
    h.render(create_element(parent.clone(), record! { "msg" => "a" }, vec![])).unwrap();
    log.borrow_mut().clear();

    h.render(create_element(parent, record! { "msg" => "b" }, vec![])).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "parent will_receive_props",
            "parent will_update",
            "child will_receive_props",
            "child will_update",
            "child did_update prev=a",
            "parent did_update prev=a",
        ]
    );
}

/// Renders a `<div>` holding three narrating children, and panics during its
/// own `will_unmount`.
struct ExplodingParentClass {
    log: Log,
}

impl ComponentClass for ExplodingParentClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(ExplodingParent { log: self.log.clone() })
    }

    fn display_name(&self) -> &str {
        "ExplodingParent"
    }
}

struct ExplodingParent {
    log: Log,
}

impl Component for ExplodingParent {
    fn render(&self, _cx: &Cx) -> View {
        let children: Vec<View> = ["one", "two", "three"]
            .iter()
            .map(|&label| {
                create_element(
                    ComponentKind::class(NarratorClass {
                        label,
                        log: self.log.clone(),
                        child: None,
                        panic_on_unmount: false,
                    }),
                    Record::new(),
                    vec![],
                )
                .into()
            })
            .collect();
        create_element(host("div"), Record::new(), children).into()
    }

    fn will_unmount(&mut self, _cx: &Cx) {
        self.log.borrow_mut().push("parent will_unmount".to_string());
        panic!("parent teardown failure");
    }
}

#[test]
fn teardown_reaches_every_child_even_when_a_hook_panics() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let parent = ComponentKind::class(ExplodingParentClass { log: log.clone() });

    let h = Harness::new();
    h.render(create_element(parent, Record::new(), vec![])).unwrap();
    log.borrow_mut().clear();

    let result = catch_unwind(AssertUnwindSafe(|| h.unmount()));
    assert!(result.is_err(), "the unmount panic surfaces from the public call");
    assert_eq!(h.html(), "", "the DOM is removed regardless");

    assert_eq!(
        *log.borrow(),
        vec![
            "parent will_unmount",
            "one will_unmount",
            "two will_unmount",
            "three will_unmount",
        ]
    );
}

#[test]
fn replacing_the_root_type_unmounts_the_old_tree_first() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let old_root = NarratorClass::kind("old", &log, None);

    let h = Harness::new();
    h.render(create_element(old_root, Record::new(), vec![])).unwrap();
    h.render(create_element(host("span"), Record::new(), vec!["new".into()])).unwrap();

    assert!(log.borrow().contains(&"old will_unmount".to_string()));
    assert!(h.html().contains("new"));
    assert!(h.html().starts_with("<span"));
}

struct StubbornClass {
    renders: Rc<Cell<usize>>,
}

impl ComponentClass for StubbornClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Stubborn { renders: self.renders.clone() })
    }

    fn display_name(&self) -> &str {
        "Stubborn"
    }
}

struct Stubborn {
    renders: Rc<Cell<usize>>,
}

impl Component for Stubborn {
    fn render(&self, _cx: &Cx) -> View {
        self.renders.set(self.renders.get() + 1);
        create_element(host("p"), Record::new(), vec!["stubborn".into()]).into()
    }

    fn should_update(
        &self,
        _cx: &Cx,
        _next_props: &Record,
        _next_state: &Record,
        _next_context: &Record,
    ) -> bool {
        false
    }
}

#[test]
fn should_update_false_skips_rerendering() {
    let renders = Rc::new(Cell::new(0));
    let kind = ComponentKind::class(StubbornClass { renders: renders.clone() });

    let h = Harness::new();
    h.render(create_element(kind.clone(), record! { "msg" => "a" }, vec![])).unwrap();
    h.render(create_element(kind, record! { "msg" => "b" }, vec![])).unwrap();

    assert_eq!(renders.get(), 1, "the second render was declined");
}
