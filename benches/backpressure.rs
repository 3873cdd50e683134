use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use std::time::Duration;
use text_pipeline::{MapTransform, PassthroughTransform, PipelineBuilder};

/// Producer feeding a slow consumer: time is dominated by how quickly a full queue
/// hands control back to the blocked producer.
fn benchmark_slow_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("slow_consumer_500_records");
    for capacity in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let pipeline = PipelineBuilder::new()
                    .queue_capacity(capacity)
                    .add_stage("producer", Box::new(PassthroughTransform))
                    .add_stage(
                        "slow",
                        Box::new(MapTransform::new("slow", |record: String| {
                            thread::sleep(Duration::from_micros(50));
                            Some(record)
                        })),
                    )
                    .build()
                    .expect("Build failed");

                for i in 0..500 {
                    pipeline.feed(black_box(i.to_string())).expect("Feed failed");
                }

                pipeline.shutdown().expect("Shutdown failed");
            });
        });
    }
    group.finish();
}

fn benchmark_shutdown_drain(c: &mut Criterion) {
    c.bench_function("shutdown_drain_five_stages", |b| {
        b.iter(|| {
            let mut builder = PipelineBuilder::new().queue_capacity(32);
            for i in 0..5 {
                builder = builder.add_stage(format!("stage{i}"), Box::new(PassthroughTransform));
            }
            let pipeline = builder.build().expect("Build failed");

            for i in 0..100 {
                pipeline.feed(black_box(i.to_string())).expect("Feed failed");
            }

            pipeline.shutdown().expect("Shutdown failed");
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(15))
        .sample_size(20);
    targets = benchmark_slow_consumer, benchmark_shutdown_drain
);
criterion_main!(benches);
