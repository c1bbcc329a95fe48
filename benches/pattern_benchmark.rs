//! Benchmarks for inventory pattern resolution, the other hot path invoked
//! once per task per target when the executor scopes a task to its hosts.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use katmer::inventory::{normalize, resolve_pattern, wildcard_match};
use serde_yaml::Value;

fn large_inventory() -> katmer::inventory::Inventory {
    let mut hosts = String::new();
    for i in 0..500 {
        hosts.push_str(&format!("      web{i}:\n        ansible_host: 10.0.0.{}\n", i % 256));
    }
    let yaml = format!(
        r#"
all:
  children:
    webservers:
      hosts:
{hosts}
    staging:
      hosts:
        web1:
        web2:
    production:
      hosts:
        web3:
        web4:
"#
    );
    let layer: Value = serde_yaml::from_str(&yaml).unwrap();
    normalize(&[layer]).unwrap()
}

fn resolve_simple_group(c: &mut Criterion) {
    let inventory = large_inventory();
    c.bench_function("resolve_pattern/simple_group", |b| {
        b.iter(|| resolve_pattern(&inventory, black_box("webservers")))
    });
}

fn resolve_exclude_intersect(c: &mut Criterion) {
    let inventory = large_inventory();
    c.bench_function("resolve_pattern/exclude_intersect", |b| {
        b.iter(|| resolve_pattern(&inventory, black_box("webservers:!staging:@production")))
    });
}

fn resolve_wildcard(c: &mut Criterion) {
    let inventory = large_inventory();
    c.bench_function("resolve_pattern/wildcard", |b| {
        b.iter(|| resolve_pattern(&inventory, black_box("web1*")))
    });
}

fn wildcard_match_single(c: &mut Criterion) {
    c.bench_function("wildcard_match/single", |b| {
        b.iter(|| wildcard_match(black_box("web?42"), black_box("web142")))
    });
}

criterion_group!(
    benches,
    resolve_simple_group,
    resolve_exclude_intersect,
    resolve_wildcard,
    wildcard_match_single
);
criterion_main!(benches);
