//! Keyed child reconciliation observed from the outside: DOM identity
//! survives reorders, and the emitted operations are the minimal set the
//! forward-scan algorithm promises.

use arbor::{
    create_element, host, record,
    testing::Harness,
    Component, ComponentClass, ComponentKind, Cx, Record, Value, View,
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};
use twigdom::{Mutation, Node};

fn li(key: &str) -> View {
    create_element(host("li"), record! { "key" => key, "id" => key }, vec![]).into()
}

fn list(keys: &[&str]) -> arbor::Element {
    create_element(host("ul"), Record::new(), keys.iter().map(|k| li(k)).collect())
}

fn drain(mutations: &mut futures::channel::mpsc::UnboundedReceiver<Mutation>) -> Vec<Mutation> {
    let mut out = Vec::new();
    while let Ok(Some(m)) = mutations.try_next() {
        out.push(m);
    }
    out
}

#[test]
fn rotating_the_tail_to_the_front_is_moves_only() {
    let h = Harness::new();
    h.render(list(&["a", "b", "c"])).unwrap();

    let before: Vec<Node> =
        ["a", "b", "c"].iter().map(|k| h.node_by_id(k).unwrap()).collect();
    let mut mutations = h.container.observe_mutations();

    h.render(list(&["c", "a", "b"])).unwrap();

    let ul = h.container.first_child().unwrap();
    let order: Vec<String> =
        ul.child_nodes().iter().filter_map(|n| n.get_attribute("id")).collect();
    assert_eq!(order, vec!["c", "a", "b"]);

    for (key, node) in ["a", "b", "c"].iter().zip(&before) {
        assert_eq!(h.node_by_id(key).unwrap(), *node, "node {} kept its identity", key);
    }

    let ops = drain(&mut mutations);
    assert!(
        ops.iter()
            .all(|m| matches!(m, Mutation::InsertBefore { .. } | Mutation::Append { .. })),
        "a pure reorder emits only repositioning operations, got {:?}",
        ops
    );
    // the forward scan keeps `c` in place and shifts `a` and `b` behind it
    assert_eq!(ops.len(), 2);
}

#[test]
fn moving_the_head_to_the_back_is_one_move() {
    let h = Harness::new();
    h.render(list(&["a", "b", "c"])).unwrap();
    let mut mutations = h.container.observe_mutations();

    h.render(list(&["b", "c", "a"])).unwrap();

    let ul = h.container.first_child().unwrap();
    let order: Vec<String> =
        ul.child_nodes().iter().filter_map(|n| n.get_attribute("id")).collect();
    assert_eq!(order, vec!["b", "c", "a"]);

    let ops = drain(&mut mutations);
    assert_eq!(ops.len(), 1, "only `a` moves: {:?}", ops);
    assert!(matches!(ops[0], Mutation::Append { .. }), "`a` lands at the end: {:?}", ops);
}

#[test]
fn inserting_in_the_middle_is_one_insert() {
    let h = Harness::new();
    h.render(list(&["a", "c"])).unwrap();
    let mut mutations = h.container.observe_mutations();

    h.render(list(&["a", "b", "c"])).unwrap();

    let ops = drain(&mut mutations);
    assert_eq!(ops.len(), 1, "got {:?}", ops);
    assert!(matches!(ops[0], Mutation::InsertBefore { .. }));

    let ul = h.container.first_child().unwrap();
    let order: Vec<String> =
        ul.child_nodes().iter().filter_map(|n| n.get_attribute("id")).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn removing_a_child_is_one_remove() {
    let h = Harness::new();
    h.render(list(&["a", "b", "c"])).unwrap();
    let mut mutations = h.container.observe_mutations();

    h.render(list(&["a", "c"])).unwrap();

    let ops = drain(&mut mutations);
    assert_eq!(ops.len(), 1, "got {:?}", ops);
    assert!(matches!(ops[0], Mutation::Remove { .. }));
}

struct ItemClass {
    constructions: Rc<Cell<usize>>,
}

impl ComponentClass for ItemClass {
    fn create(&self) -> Box<dyn Component> {
        self.constructions.set(self.constructions.get() + 1);
        Box::new(Item)
    }

    fn display_name(&self) -> &str {
        "Item"
    }
}

struct Item;

impl Component for Item {
    fn render(&self, cx: &Cx) -> View {
        let label = cx.props().get("label").and_then(Value::as_str).unwrap_or("?").to_string();
        create_element(host("li"), Record::new(), vec![label.into()]).into()
    }
}

#[test]
fn keyed_composites_survive_reorders_without_remounting() {
    let constructions = Rc::new(Cell::new(0));
    let kind = ComponentKind::class(ItemClass { constructions: constructions.clone() });
    let item = |key: &str| -> View {
        create_element(kind.clone(), record! { "key" => key, "label" => key }, vec![]).into()
    };

    let h = Harness::new();
    h.render(create_element(host("ul"), Record::new(), vec![item("x"), item("y"), item("z")]))
        .unwrap();
    assert_eq!(constructions.get(), 3);

    h.render(create_element(host("ul"), Record::new(), vec![item("z"), item("x"), item("y")]))
        .unwrap();
    assert_eq!(constructions.get(), 3, "reordering recreated a component");

    let ul = h.container.first_child().unwrap();
    assert_eq!(ul.text_content(), "zxy");
}

#[test]
fn changing_a_key_replaces_the_instance() {
    let constructions = Rc::new(Cell::new(0));
    let kind = ComponentKind::class(ItemClass { constructions: constructions.clone() });
    let item = |key: &str| -> View {
        create_element(kind.clone(), record! { "key" => key, "label" => key }, vec![]).into()
    };

    let h = Harness::new();
    h.render(create_element(host("ul"), Record::new(), vec![item("x")])).unwrap();
    h.render(create_element(host("ul"), Record::new(), vec![item("fresh")])).unwrap();

    assert_eq!(constructions.get(), 2, "a new key means a new instance");
    assert_eq!(h.container.first_child().unwrap().text_content(), "fresh");
}

#[test]
fn text_children_update_between_their_markers() {
    let h = Harness::new();
    h.render(create_element(host("div"), Record::new(), vec!["hello".into()])).unwrap();

    let div = h.container.first_child().unwrap();
    let markers_before: Vec<Node> = div
        .child_nodes()
        .into_iter()
        .filter(|n| n.kind() == twigdom::NodeKind::Comment)
        .collect();
    assert_eq!(markers_before.len(), 2);

    h.render(create_element(host("div"), Record::new(), vec!["world".into()])).unwrap();

    let markers_after: Vec<Node> = div
        .child_nodes()
        .into_iter()
        .filter(|n| n.kind() == twigdom::NodeKind::Comment)
        .collect();
    assert_eq!(markers_before, markers_after, "the comment markers are stable");
    assert_eq!(div.text_content(), "world");
}

#[test]
fn mixed_keyed_and_text_children_keep_element_identity() {
    let h = Harness::new();
    let keyed_li =
        || -> View { create_element(host("li"), record! { "key" => "k", "id" => "k" }, vec![]).into() };

    h.render(create_element(host("div"), Record::new(), vec!["before".into(), keyed_li()]))
        .unwrap();
    let keyed_node = h.node_by_id("k").unwrap();

    h.render(create_element(host("div"), Record::new(), vec![keyed_li(), "after".into()]))
        .unwrap();
    assert_eq!(h.node_by_id("k").unwrap(), keyed_node, "the keyed element survived");
    assert_eq!(h.container.first_child().unwrap().text_content(), "after");
}

#[test]
fn deeply_keyed_state_is_preserved_across_reorders() {
    // components hold a per-instance marker in a cell to prove the same
    // instance answers after the reorder
    struct TaggedClass {
        next_tag: Rc<Cell<u32>>,
        seen: Rc<RefCell<Vec<(String, u32)>>>,
    }
    impl ComponentClass for TaggedClass {
        fn create(&self) -> Box<dyn Component> {
            let tag = self.next_tag.get();
            self.next_tag.set(tag + 1);
            Box::new(Tagged { tag, seen: self.seen.clone() })
        }
    }
    struct Tagged {
        tag: u32,
        seen: Rc<RefCell<Vec<(String, u32)>>>,
    }
    impl Component for Tagged {
        fn render(&self, cx: &Cx) -> View {
            let key = cx.props().get("label").and_then(Value::as_str).unwrap_or("?").to_string();
            self.seen.borrow_mut().push((key, self.tag));
            create_element(host("li"), Record::new(), vec![]).into()
        }
    }

    let next_tag = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let kind = ComponentKind::class(TaggedClass { next_tag, seen: seen.clone() });
    let item = |key: &str| -> View {
        create_element(kind.clone(), record! { "key" => key, "label" => key }, vec![]).into()
    };

    let h = Harness::new();
    h.render(create_element(host("ul"), Record::new(), vec![item("p"), item("q")])).unwrap();
    seen.borrow_mut().clear();

    h.render(create_element(host("ul"), Record::new(), vec![item("q"), item("p")])).unwrap();

    let observed = seen.borrow();
    assert!(observed.contains(&("p".to_string(), 0)), "p kept instance 0: {:?}", *observed);
    assert!(observed.contains(&("q".to_string(), 1)), "q kept instance 1: {:?}", *observed);
}
