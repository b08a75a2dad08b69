//! Criterion benchmarks for PQL parsing, conversion and serialization.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use portal_pql::prelude::*;
use std::hint::black_box;

/// Generate a PQL statement with `facets` facets spread over a few categories.
fn generate_pql(facets: usize) -> String {
    let categories = ["donor", "gene", "mutation", "project"];
    let words = [
        "male",
        "female",
        "protein_coding",
        "lincRNA",
        "missense_variant",
        "frameshift_variant",
        "Brain",
        "Liver",
    ];

    let mut clauses = Vec::with_capacity(facets);
    for i in 0..facets {
        let category = categories[i % categories.len()];
        let terms: Vec<String> = (0..(1 + i % 4))
            .map(|j| format!("'{}'", words[(i * 7 + j * 3) % words.len()]))
            .collect();
        let clause = format!("in({category}.facet{i},{})", terms.join(","));
        if i % 3 == 0 {
            clauses.push(format!("not({clause})"));
        } else {
            clauses.push(clause);
        }
    }

    format!(
        "select(*),facets(*),and({}),sort(-donor.age,+id),limit(0,25)",
        clauses.join(",")
    )
}

/// Benchmark tokenizing and parsing.
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for size in [4, 32, 256] {
        let pql = generate_pql(size);
        group.throughput(Throughput::Bytes(pql.len() as u64));
        group.bench_function(format!("parse_{size}_facets"), |b| {
            b.iter(|| black_box(parse(black_box(&pql))))
        });
    }

    group.finish();
}

/// Benchmark query object conversion in both directions.
fn bench_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("translation");

    let service = PqlService::new();
    let pql = generate_pql(64);
    let query = service.convert_pql_to_query_object(&pql).unwrap();

    group.bench_function("pql_to_query_object", |b| {
        b.iter(|| black_box(service.convert_pql_to_query_object(black_box(&pql))))
    });

    group.bench_function("query_object_to_pql", |b| {
        b.iter(|| black_box(service.convert_query_to_pql(black_box(&query))))
    });

    group.finish();
}

/// Benchmark replaying a builder chain.
fn bench_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder");

    let pql = generate_pql(16);
    let mut builder = PqlBuilder::new(&pql);
    for i in 0..50 {
        builder = builder
            .add_term("donor", "primarySite", format!("site{}", i % 10))
            .unwrap();
    }
    let builder = builder.includes_facets().set_limit(Limit::size(10));

    group.throughput(Throughput::Elements(builder.actions().len() as u64));
    group.bench_function("build_50_actions", |b| b.iter(|| black_box(builder.build())));
    group.bench_function("build_filters_50_actions", |b| {
        b.iter(|| black_box(builder.build_filters()))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_translation, bench_builder);
criterion_main!(benches);
