use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ergscore::{
    AthleteProfile, EffortCalculator, FieldValidator, InMemoryPbStore, Interval, RawMeasurement,
    WorkoutPipeline, WorkoutSource, WorkoutSubmission,
};
use std::sync::Arc;

/// Benchmarks for the scoring core
///
/// Scoring cost should grow linearly with interval count.

fn create_intervals(count: usize) -> Vec<Interval> {
    (0..count)
        .map(|i| Interval {
            distance_metres: 500.0,
            time_seconds: 100.0 + (i % 7) as f64,
            avg_heart_rate: Some(150.0 + (i % 20) as f64),
            stroke_rate: Some(24.0 + (i % 6) as f64),
        })
        .collect()
}

fn bench_effort_calculation(c: &mut Criterion) {
    let profile = AthleteProfile::default();
    let mut group = c.benchmark_group("Effort Calculation");

    for &size in &[1, 10, 50, 200] {
        let intervals = create_intervals(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("calculate", size),
            &intervals,
            |b, intervals| {
                b.iter(|| EffortCalculator::calculate(black_box(&profile), black_box(intervals)));
            },
        );
    }

    group.finish();
}

fn bench_field_repair(c: &mut Criterion) {
    let swapped = RawMeasurement {
        total_time_seconds: Some(105.0),
        avg_split_seconds: Some(540.0),
        avg_heart_rate: Some(300.0),
        avg_stroke_rate: Some(9.0),
        confidence: Some(95),
        ..RawMeasurement::default()
    };

    c.bench_function("field_repair_swapped", |b| {
        b.iter(|| FieldValidator::repair(black_box(&swapped)))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let pipeline = WorkoutPipeline::new(Arc::new(InMemoryPbStore::new()));
    let profile = AthleteProfile::default();
    let submission = WorkoutSubmission {
        user_id: "bench".to_string(),
        source: WorkoutSource::Ocr,
        measurement: RawMeasurement {
            total_time_seconds: Some(420.0),
            total_distance_metres: Some(2000.0),
            avg_heart_rate: Some(178.0),
            ..RawMeasurement::default()
        },
        intervals: None,
        achieved_at: None,
    };

    c.bench_function("pipeline_process", |b| {
        b.iter(|| pipeline.process(black_box(&submission), &profile))
    });
}

criterion_group!(
    benches,
    bench_effort_calculation,
    bench_field_repair,
    bench_pipeline
);
criterion_main!(benches);
