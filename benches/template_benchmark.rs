//! Benchmarks for the template evaluator, which runs once per task per
//! target during a normal `run` — the hottest path in the engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use katmer::template::TemplateEngine;
use serde_json::json;

fn scope() -> serde_json::Value {
    json!({
        "item": "nginx",
        "env": "production",
        "hosts": ["web1", "web2", "web3"],
        "version": "1.24.0",
        "vars": {
            "nested": {"value": 42},
        },
    })
}

fn render_template_literal(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let scope = scope();
    c.bench_function("render_template/literal", |b| {
        b.iter(|| engine.render_template(black_box("plain text with no expressions"), &scope))
    });
}

fn render_template_interpolated(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let scope = scope();
    c.bench_function("render_template/interpolated", |b| {
        b.iter(|| {
            engine.render_template(
                black_box("installing {{ item }} {{ version }} on {{ env }} for {{ vars.nested.value }} hosts"),
                &scope,
            )
        })
    });
}

fn eval_bool_condition(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let scope = scope();
    c.bench_function("eval_bool/when_condition", |b| {
        b.iter(|| engine.eval_bool(black_box("env == 'production' and item == 'nginx'"), &scope))
    });
}

fn eval_expression_loop_items(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let scope = scope();
    c.bench_function("eval_expression/loop_items", |b| {
        b.iter(|| engine.eval_expression(black_box("hosts"), &scope))
    });
}

criterion_group!(
    benches,
    render_template_literal,
    render_template_interpolated,
    eval_bool_condition,
    eval_expression_loop_items
);
criterion_main!(benches);
