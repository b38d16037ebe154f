//! Diff and curation pipeline performance benchmarks.
//!
//! Measures the N-way diff and the full curate run over synthetic annotation
//! projects of increasing size and disagreement rate.

use std::collections::BTreeMap;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use concord::{
    AgreementStrategy, AnnotationInstance, AnnotatorDocument, Curator, DiffEngine, LayerSchema,
    ProjectSchema, ThresholdStrategy,
};

const LABELS: [&str; 4] = ["PER", "ORG", "LOC", "MISC"];

fn bench_schema() -> ProjectSchema {
    ProjectSchema::new()
        .with_layer(LayerSchema::span("ne").with_feature("value", concord::FeatureKind::String))
        .with_layer(LayerSchema::relation("dep"))
}

/// Generate one annotation project: `annotators` documents over the same
/// synthetic text, each with `spans` named-entity spans and a dependency
/// relation between every tenth adjacent pair. `noise` is the probability
/// that an annotator deviates from the reference label.
fn generate_project(
    annotators: usize,
    spans: usize,
    noise: f64,
    seed: u64,
) -> BTreeMap<String, AnnotatorDocument> {
    let mut rng = StdRng::seed_from_u64(seed);

    // Reference layout shared by all annotators.
    let layout: Vec<(usize, usize, usize)> = (0..spans)
        .map(|i| {
            let begin = i * 12 + rng.gen_range(0..4);
            let len = rng.gen_range(3..10);
            (begin, begin + len, rng.gen_range(0..LABELS.len()))
        })
        .collect();

    (0..annotators)
        .map(|a| {
            let name = format!("annotator{a}");
            let mut doc = AnnotatorDocument::new(&name);
            let mut refs = Vec::with_capacity(layout.len());
            for &(begin, end, label) in &layout {
                let label = if rng.gen_bool(noise) {
                    rng.gen_range(0..LABELS.len())
                } else {
                    label
                };
                refs.push(doc.push(
                    AnnotationInstance::span("ne", begin, end).with_feature("value", LABELS[label]),
                ));
            }
            for pair in refs.chunks(2).step_by(5) {
                if let [source, target] = pair {
                    doc.push(AnnotationInstance::relation("dep", *source, *target));
                }
            }
            (name, doc)
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    let schema = bench_schema();

    for &spans in &[100usize, 500, 2_000] {
        let docs = generate_project(3, spans, 0.1, 7);
        let instances: usize = docs.values().map(|d| d.len()).sum();

        group.throughput(Throughput::Elements(instances as u64));
        group.bench_with_input(BenchmarkId::new("three_annotators", spans), &docs, |b, docs| {
            let engine = DiffEngine::new();
            b.iter(|| engine.diff(&schema, black_box(docs)).unwrap());
        });
    }

    group.finish();
}

fn bench_diff_by_annotator_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_annotators");
    let schema = bench_schema();

    for &annotators in &[2usize, 4, 8] {
        let docs = generate_project(annotators, 500, 0.1, 11);

        group.bench_with_input(
            BenchmarkId::from_parameter(annotators),
            &docs,
            |b, docs| {
                let engine = DiffEngine::new();
                b.iter(|| engine.diff(&schema, black_box(docs)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_curate(c: &mut Criterion) {
    let mut group = c.benchmark_group("curate");

    for &noise in &[0.0f64, 0.2] {
        let docs = generate_project(3, 500, noise, 23);
        let label = format!("noise_{noise}");

        group.bench_with_input(BenchmarkId::new("agreement", &label), &docs, |b, docs| {
            let curator = Curator::new(bench_schema());
            b.iter(|| curator.curate(black_box(docs), &AgreementStrategy).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("threshold", &label), &docs, |b, docs| {
            let curator = Curator::new(bench_schema());
            let strategy = ThresholdStrategy::new(2);
            b.iter(|| curator.curate(black_box(docs), &strategy).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff, bench_diff_by_annotator_count, bench_curate);
criterion_main!(benches);
