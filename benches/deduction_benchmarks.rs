use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tesorito_pos::{
    config::StockPolicy,
    entities::ingredient,
    services::inventory::{aggregate_requirements, plan_deductions, RecipeComponent},
    services::orders::OrderTotals,
};
use uuid::Uuid;

/// `ingredients` shared by every menu item, `lines` order lines of 1..=3 units each.
fn fixture(
    lines: usize,
    ingredients: usize,
) -> (Vec<(i32, Vec<RecipeComponent>)>, HashMap<Uuid, ingredient::Model>) {
    let now = Utc::now();
    let stock: HashMap<Uuid, ingredient::Model> = (0..ingredients)
        .map(|i| {
            let id = Uuid::new_v4();
            let model = ingredient::Model {
                id,
                name: format!("Ingrediente {}", i),
                unit: "kg".into(),
                current_stock: Decimal::from(500),
                minimum_stock: Decimal::from(10),
                cost_per_unit: Some(Decimal::new(4250, 2)),
                created_at: now,
                updated_at: now,
            };
            (id, model)
        })
        .collect();
    let ids: Vec<Uuid> = stock.keys().copied().collect();

    let order_lines = (0..lines)
        .map(|line| {
            let recipe = ids
                .iter()
                .map(|id| RecipeComponent {
                    ingredient_id: *id,
                    quantity_required: Decimal::new(125, 3),
                })
                .collect();
            ((line % 3 + 1) as i32, recipe)
        })
        .collect();
    (order_lines, stock)
}

fn aggregation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_requirements");

    for lines in [1usize, 5, 20, 50] {
        let (order_lines, _) = fixture(lines, 8);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &order_lines, |b, order_lines| {
            b.iter(|| {
                aggregate_requirements(
                    order_lines
                        .iter()
                        .map(|(qty, recipe)| (*qty, recipe.as_slice())),
                )
            });
        });
    }

    group.finish();
}

fn planning_benchmark(c: &mut Criterion) {
    let (order_lines, stock) = fixture(20, 12);
    let requirements = aggregate_requirements(
        order_lines
            .iter()
            .map(|(qty, recipe)| (*qty, recipe.as_slice())),
    );

    let mut group = c.benchmark_group("plan_deductions");
    for policy in [StockPolicy::Strict, StockPolicy::Permissive] {
        group.bench_function(policy.to_string(), |b| {
            b.iter(|| plan_deductions(black_box(&requirements), black_box(&stock), policy))
        });
    }
    group.finish();
}

fn totals_benchmark(c: &mut Criterion) {
    let rate = Decimal::new(16, 2);
    c.bench_function("order_totals", |b| {
        b.iter(|| OrderTotals::from_subtotal(black_box(Decimal::new(123_456, 2)), black_box(rate)))
    });
}

criterion_group!(
    benches,
    aggregation_benchmark,
    planning_benchmark,
    totals_benchmark
);
criterion_main!(benches);
