#[macro_use]
extern crate criterion;

use arbor::{create_element, host, record, testing::Harness, Record, View};
use criterion::Criterion;

criterion_group!(reconcile, mount_keyed_list, reorder_keyed_list);
criterion_main!(reconcile);

fn keyed_list(n: usize, rotate: usize) -> arbor::Element {
    let children: Vec<View> = (0..n)
        .map(|i| {
            let key = format!("k{}", (i + rotate) % n);
            create_element(host("li"), record! { "key" => key }, vec![]).into()
        })
        .collect();
    create_element(host("ul"), Record::new(), children)
}

fn mount_keyed_list(c: &mut Criterion) {
    c.bench_function("mount 100 keyed items", |b| {
        b.iter(|| {
            let h = Harness::new();
            h.render(keyed_list(100, 0)).unwrap();
        })
    });
}

fn reorder_keyed_list(c: &mut Criterion) {
    let h = Harness::new();
    h.render(keyed_list(100, 0)).unwrap();
    let mut rotate = 0;
    c.bench_function("rotate 100 keyed items", |b| {
        b.iter(|| {
            rotate += 1;
            h.render(keyed_list(100, rotate % 100)).unwrap();
        })
    });
}
