//! Benchmarks for the pipeline scheduler.
//!
//! Covers the driver-loop hot path: submit, out-of-order completion,
//! ordered consume, over a trivial thread-backed executor.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use infer_pipeline::config::PipelineConfig;
use infer_pipeline::core::{AsyncPipeline, OutputMap, SubmitOutcome};
use infer_pipeline::runtime::ThreadBackend;

/// Executor doing a token amount of arithmetic per item.
fn bench_executor(item: u64) -> anyhow::Result<OutputMap> {
    let mut outputs = OutputMap::new();
    outputs.insert("out".into(), vec![(item as f32).sqrt()]);
    Ok(outputs)
}

fn drive(pipe: &AsyncPipeline<u64, u64, ThreadBackend<u64, u64>>, frames: u64) {
    let mut next_item = 0u64;
    let mut delivered = 0u64;
    while delivered < frames {
        while next_item < frames {
            match pipe.submit(next_item, next_item) {
                SubmitOutcome::Submitted(_) => next_item += 1,
                SubmitOutcome::Rejected { .. } => break,
            }
        }
        if let Some(result) = pipe.consume().expect("bench executor never fails") {
            black_box(result.frame_id);
            delivered += 1;
        } else if next_item == frames {
            pipe.wait_for_result().expect("bench executor never fails");
        } else {
            pipe.wait_for_data().expect("bench executor never fails");
        }
    }
}

fn bench_pipeline_throughput(c: &mut Criterion) {
    const FRAMES: u64 = 256;

    let mut group = c.benchmark_group("pipeline_throughput");
    group.throughput(Throughput::Elements(FRAMES));

    for slots in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(slots), &slots, |b, &slots| {
            let pipe = AsyncPipeline::new(
                &PipelineConfig::new().with_max_parallel_requests(slots),
                ThreadBackend::new(slots, bench_executor),
            )
            .expect("valid config");
            b.iter(|| drive(&pipe, FRAMES));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline_throughput);
criterion_main!(benches);
