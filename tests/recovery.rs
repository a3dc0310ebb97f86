//! The initial-mount recovery path: a component that opts into
//! `handle_error` gets one retry after the partial mount is rolled back.

use arbor::{
    create_element, host, record,
    testing::Harness,
    Component, ComponentClass, ComponentKind, Cx, Record, Value, View,
};
use std::{
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

type Log = Rc<RefCell<Vec<String>>>;

struct BombClass;

impl ComponentClass for BombClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Bomb)
    }

    fn display_name(&self) -> &str {
        "Bomb"
    }
}

struct Bomb;

impl Component for Bomb {
    fn render(&self, _cx: &Cx) -> View {
        panic!("bomb went off")
    }
}

struct WitnessClass {
    log: Log,
}

impl ComponentClass for WitnessClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Witness { log: self.log.clone() })
    }

    fn display_name(&self) -> &str {
        "Witness"
    }
}

struct Witness {
    log: Log,
}

impl Component for Witness {
    fn render(&self, _cx: &Cx) -> View {
        create_element(host("em"), Record::new(), vec!["witness".into()]).into()
    }

    fn will_mount(&mut self, _cx: &Cx) {
        self.log.borrow_mut().push("witness will_mount".into());
    }

    fn did_mount(&mut self, _cx: &Cx) {
        self.log.borrow_mut().push("witness did_mount".into());
    }

    fn will_unmount(&mut self, _cx: &Cx) {
        self.log.borrow_mut().push("witness will_unmount".into());
    }
}

/// Mounts a witness next to a bomb; on failure, falls back to a recovery
/// message.
struct BoundaryClass {
    log: Log,
}

impl ComponentClass for BoundaryClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Boundary { log: self.log.clone() })
    }

    fn display_name(&self) -> &str {
        "Boundary"
    }

    fn handles_errors(&self) -> bool {
        true
    }
}

struct Boundary {
    log: Log,
}

impl Component for Boundary {
    fn initial_state(&self, _props: &Record, _context: &Record) -> Record {
        record! { "failed" => false }
    }

    fn render(&self, cx: &Cx) -> View {
        let failed = cx.state().get("failed").and_then(Value::as_bool).unwrap_or(false);
        if failed {
            create_element(host("p"), Record::new(), vec!["recovered".into()]).into()
        } else {
            create_element(
                host("div"),
                Record::new(),
                vec![
                    create_element(
                        ComponentKind::class(WitnessClass { log: self.log.clone() }),
                        Record::new(),
                        vec![],
                    )
                    .into(),
                    create_element(ComponentKind::class(BombClass), Record::new(), vec![]).into(),
                ],
            )
            .into()
        }
    }

    fn handle_error(&mut self, cx: &Cx, error: &arbor::CaughtError) -> bool {
        self.log.borrow_mut().push(format!("caught: {}", error.message()));
        cx.set_state(record! { "failed" => true });
        true
    }
}

#[test]
fn a_handling_boundary_retries_with_its_recovery_state() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let h = Harness::new();
    h.render(create_element(
        ComponentKind::class(BoundaryClass { log: log.clone() }),
        Record::new(),
        vec![],
    ))
    .unwrap();

    assert!(h.html().contains("recovered"), "got {}", h.html());
    assert!(log.borrow().contains(&"caught: bomb went off".to_string()));
}

#[test]
fn the_rolled_back_partial_mount_never_announces_itself() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let h = Harness::new();
    h.render(create_element(
        ComponentKind::class(BoundaryClass { log: log.clone() }),
        Record::new(),
        vec![],
    ))
    .unwrap();

    let seen = log.borrow();
    assert!(seen.contains(&"witness will_mount".to_string()), "the witness began mounting");
    assert!(
        seen.contains(&"witness will_unmount".to_string()),
        "the partial mount was torn down: {:?}",
        *seen
    );
    assert!(
        !seen.contains(&"witness did_mount".to_string()),
        "the rolled-back mount-ready queue never fired: {:?}",
        *seen
    );
}

#[test]
fn without_the_hook_the_panic_propagates() {
    struct PlainClass;
    impl ComponentClass for PlainClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Plain)
        }
    }
    struct Plain;
    impl Component for Plain {
        fn render(&self, _cx: &Cx) -> View {
            create_element(ComponentKind::class(BombClass), Record::new(), vec![]).into()
        }
    }

    let h = Harness::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        h.render(create_element(ComponentKind::class(PlainClass), Record::new(), vec![]))
    }));
    assert!(result.is_err());
}
