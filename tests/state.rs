//! State batching: patch folding, functional patches, replacement, forced
//! updates, and flush callbacks.

use arbor::{
    create_element, host, record,
    testing::Harness,
    Component, ComponentClass, ComponentKind, Cx, Record, Updater, Value, View,
};
use std::{
    cell::{Cell, RefCell},
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

type UpdaterSlot = Rc<RefCell<Option<Updater>>>;

/// Renders its numeric state as text and leaks its updater to the test.
struct CounterClass {
    updater: UpdaterSlot,
    renders: Rc<Cell<usize>>,
    prev_seen: Rc<RefCell<Vec<String>>>,
}

impl CounterClass {
    fn kind(updater: &UpdaterSlot, renders: &Rc<Cell<usize>>) -> ComponentKind {
        ComponentKind::class(CounterClass {
            updater: updater.clone(),
            renders: renders.clone(),
            prev_seen: Rc::new(RefCell::new(Vec::new())),
        })
    }
}

impl ComponentClass for CounterClass {
    fn create(&self) -> Box<dyn Component> {
        Box::new(Counter {
            updater: self.updater.clone(),
            renders: self.renders.clone(),
            prev_seen: self.prev_seen.clone(),
        })
    }

    fn display_name(&self) -> &str {
        "Counter"
    }
}

struct Counter {
    updater: UpdaterSlot,
    renders: Rc<Cell<usize>>,
    prev_seen: Rc<RefCell<Vec<String>>>,
}

fn state_number(state: &Record, key: &str) -> Option<f64> {
    state.get(key).and_then(Value::as_num)
}

impl Component for Counter {
    fn initial_state(&self, _props: &Record, _context: &Record) -> Record {
        record! { "n" => 0 }
    }

    fn render(&self, cx: &Cx) -> View {
        *self.updater.borrow_mut() = Some(cx.updater());
        self.renders.set(self.renders.get() + 1);
        let n = state_number(cx.state(), "n").unwrap_or(-1.0);
        create_element(host("p"), Record::new(), vec![format!("n={}", n).into()]).into()
    }

    fn did_update(&mut self, _cx: &Cx, _prev_props: &Record, prev_state: &Record) {
        let prev = state_number(prev_state, "n").unwrap_or(-1.0);
        self.prev_seen.borrow_mut().push(format!("prev n={}", prev));
    }
}

fn counter_harness() -> (Harness, UpdaterSlot, Rc<Cell<usize>>) {
    let updater: UpdaterSlot = Rc::new(RefCell::new(None));
    let renders = Rc::new(Cell::new(0));
    let h = Harness::new();
    h.render(create_element(CounterClass::kind(&updater, &renders), Record::new(), vec![]))
        .unwrap();
    (h, updater, renders)
}

#[test]
fn batched_patches_fold_into_one_render() {
    let (h, updater, renders) = counter_harness();
    assert_eq!(renders.get(), 1);

    let u = updater.borrow().clone().unwrap();
    h.rt.batched_updates(|| {
        u.set_state(record! { "n" => 1 });
        u.set_state_with(|state, _props, _context| {
            record! { "n" => state.get("n").and_then(Value::as_num).unwrap_or(0.0) + 1.0 }
        });
        u.set_state(record! { "n" => 3 });
    });

    assert!(h.html().contains("n=3"));
    assert_eq!(renders.get(), 2, "three patches, one re-render");
}

#[test]
fn functional_patches_see_the_running_accumulator() {
    let (h, updater, _renders) = counter_harness();
    let u = updater.borrow().clone().unwrap();

    h.rt.batched_updates(|| {
        u.set_state(record! { "n" => 10 });
        u.set_state_with(|state, _p, _c| {
            record! { "n" => state.get("n").and_then(Value::as_num).unwrap_or(0.0) * 2.0 }
        });
    });

    assert!(h.html().contains("n=20"));
}

#[test]
fn unbatched_updates_flush_immediately() {
    let (h, updater, renders) = counter_harness();
    let u = updater.borrow().clone().unwrap();

    u.set_state(record! { "n" => 7 });
    assert!(h.html().contains("n=7"));
    u.set_state(record! { "n" => 8 });
    assert!(h.html().contains("n=8"));
    assert_eq!(renders.get(), 3);
}

#[test]
fn did_update_sees_the_pre_batch_state() {
    let updater: UpdaterSlot = Rc::new(RefCell::new(None));
    let renders = Rc::new(Cell::new(0));
    let prev_seen = Rc::new(RefCell::new(Vec::new()));
    let kind = ComponentKind::class(CounterClass {
        updater: updater.clone(),
        renders,
        prev_seen: prev_seen.clone(),
    });

    let h = Harness::new();
    h.render(create_element(kind, Record::new(), vec![])).unwrap();

    let u = updater.borrow().clone().unwrap();
    h.rt.batched_updates(|| {
        u.set_state(record! { "n" => 1 });
        u.set_state(record! { "n" => 2 });
    });

    assert_eq!(*prev_seen.borrow(), vec!["prev n=0"]);
}

#[test]
fn replace_state_drops_unmentioned_keys() {
    struct PairClass {
        updater: UpdaterSlot,
    }
    impl ComponentClass for PairClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Pair { updater: self.updater.clone() })
        }
    }
    struct Pair {
        updater: UpdaterSlot,
    }
    impl Component for Pair {
        fn initial_state(&self, _props: &Record, _context: &Record) -> Record {
            record! { "a" => 1, "b" => 2 }
        }

        fn render(&self, cx: &Cx) -> View {
            *self.updater.borrow_mut() = Some(cx.updater());
            let describe = |key: &str| {
                cx.state()
                    .get(key)
                    .and_then(Value::as_num)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string())
            };
            let text = format!("a={} b={}", describe("a"), describe("b"));
            create_element(host("p"), Record::new(), vec![text.into()]).into()
        }
    }

    let updater: UpdaterSlot = Rc::new(RefCell::new(None));
    let h = Harness::new();
    h.render(create_element(
        ComponentKind::class(PairClass { updater: updater.clone() }),
        Record::new(),
        vec![],
    ))
    .unwrap();
    assert!(h.html().contains("a=1 b=2"));

    let u = updater.borrow().clone().unwrap();
    u.replace_state(record! { "a" => 9 });
    assert!(h.html().contains("a=9 b=-"), "replacement does not merge: {}", h.html());

    // a merge after the replacement layers normally again
    u.set_state(record! { "b" => 5 });
    assert!(h.html().contains("a=9 b=5"));
}

#[test]
fn force_update_overrides_a_declining_component() {
    struct DecliningClass {
        updater: UpdaterSlot,
        renders: Rc<Cell<usize>>,
    }
    impl ComponentClass for DecliningClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Declining { updater: self.updater.clone(), renders: self.renders.clone() })
        }
    }
    struct Declining {
        updater: UpdaterSlot,
        renders: Rc<Cell<usize>>,
    }
    impl Component for Declining {
        fn render(&self, cx: &Cx) -> View {
            *self.updater.borrow_mut() = Some(cx.updater());
            self.renders.set(self.renders.get() + 1);
            create_element(host("p"), Record::new(), vec!["declining".into()]).into()
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

    let updater: UpdaterSlot = Rc::new(RefCell::new(None));
    let renders = Rc::new(Cell::new(0));
    let h = Harness::new();
    h.render(create_element(
        ComponentKind::class(DecliningClass { updater: updater.clone(), renders: renders.clone() }),
        Record::new(),
        vec![],
    ))
    .unwrap();

    let u = updater.borrow().clone().unwrap();
    u.set_state(record! { "ignored" => 1 });
    assert_eq!(renders.get(), 1, "should_update declined the state update");

    u.force_update();
    assert_eq!(renders.get(), 2, "force_update bypasses should_update");
}

#[test]
fn flush_callbacks_run_in_enqueue_order_after_commit() {
    let (h, updater, _renders) = counter_harness();
    let u = updater.borrow().clone().unwrap();

    let observed: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let container = h.container.clone();

    let first = observed.clone();
    let first_container = container.clone();
    let second = observed.clone();

    h.rt.batched_updates(|| {
        u.set_state(record! { "n" => 42 });
        u.enqueue_callback(move || {
            let committed = first_container.inner_html().contains("n=42");
            first.borrow_mut().push(format!("first committed={}", committed));
        });
        u.enqueue_callback(move || second.borrow_mut().push("second".to_string()));
    });

    assert_eq!(*observed.borrow(), vec!["first committed=true", "second"]);
}

#[test]
fn object_patch_folding_is_associative() {
    let p1 = record! { "a" => 1, "b" => 1 };
    let p2 = record! { "b" => 2, "c" => 2 };
    let p3 = record! { "c" => 3, "d" => 3 };

    let (h1, u1, _) = counter_harness();
    let u = u1.borrow().clone().unwrap();
    h1.rt.batched_updates(|| {
        u.set_state(p1.clone());
        u.set_state(p2.clone());
        u.set_state(p3.clone());
    });

    let (h2, u2, _) = counter_harness();
    let u = u2.borrow().clone().unwrap();
    h2.rt.batched_updates(|| {
        u.set_state(p1);
        u.set_state(p2.merged(&p3));
    });

    assert_eq!(h1.html(), h2.html());
}

#[test]
fn state_updates_during_render_are_rejected() {
    struct RogueClass;
    impl ComponentClass for RogueClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Rogue)
        }
    }
    struct Rogue;
    impl Component for Rogue {
        fn render(&self, cx: &Cx) -> View {
            cx.set_state(record! { "boom" => 1 });
            View::Empty
        }
    }

    let h = Harness::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        h.render(create_element(ComponentKind::class(RogueClass), Record::new(), vec![]))
    }));
    assert!(result.is_err());
}

#[test]
fn set_state_in_did_mount_schedules_a_follow_up_pass() {
    struct EagerClass {
        renders: Rc<Cell<usize>>,
    }
    impl ComponentClass for EagerClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Eager { renders: self.renders.clone() })
        }
    }
    struct Eager {
        renders: Rc<Cell<usize>>,
    }
    impl Component for Eager {
        fn initial_state(&self, _props: &Record, _context: &Record) -> Record {
            record! { "n" => 0 }
        }

        fn render(&self, cx: &Cx) -> View {
            self.renders.set(self.renders.get() + 1);
            let n = cx.state().get("n").and_then(Value::as_num).unwrap_or(-1.0);
            create_element(host("p"), Record::new(), vec![format!("n={}", n).into()]).into()
        }

        fn did_mount(&mut self, cx: &Cx) {
            cx.set_state(record! { "n" => 1 });
        }
    }

    let renders = Rc::new(Cell::new(0));
    let h = Harness::new();
    h.render(create_element(
        ComponentKind::class(EagerClass { renders: renders.clone() }),
        Record::new(),
        vec![],
    ))
    .unwrap();

    assert!(h.html().contains("n=1"), "the follow-up pass committed before render returned");
    assert_eq!(renders.get(), 2);
}

#[test]
fn will_mount_state_merges_without_a_queue_round_trip() {
    struct PrimedClass {
        renders: Rc<Cell<usize>>,
    }
    impl ComponentClass for PrimedClass {
        fn create(&self) -> Box<dyn Component> {
            Box::new(Primed { renders: self.renders.clone() })
        }
    }
    struct Primed {
        renders: Rc<Cell<usize>>,
    }
    impl Component for Primed {
        fn initial_state(&self, _props: &Record, _context: &Record) -> Record {
            record! { "n" => 0 }
        }

        fn render(&self, cx: &Cx) -> View {
            self.renders.set(self.renders.get() + 1);
            let n = cx.state().get("n").and_then(Value::as_num).unwrap_or(-1.0);
            create_element(host("p"), Record::new(), vec![format!("n={}", n).into()]).into()
        }

        fn will_mount(&mut self, cx: &Cx) {
            cx.set_state(record! { "n" => 5 });
        }
    }

    let renders = Rc::new(Cell::new(0));
    let h = Harness::new();
    h.render(create_element(
        ComponentKind::class(PrimedClass { renders: renders.clone() }),
        Record::new(),
        vec![],
    ))
    .unwrap();

    assert!(h.html().contains("n=5"));
    assert_eq!(renders.get(), 1, "the merge happened before the first render");
}
