//! End-to-end tests over the tokio backend adapter.

#![cfg(feature = "tokio-runtime")]

use std::time::Duration;

use async_trait::async_trait;

use infer_pipeline::config::PipelineConfig;
use infer_pipeline::core::{AsyncPipeline, OutputMap};
use infer_pipeline::runtime::{AsyncSlotExecutor, TokioBackend};

/// Async "model" that scales its input after a small await point.
#[derive(Clone)]
struct ScaleExecutor {
    factor: f32,
}

#[async_trait]
impl AsyncSlotExecutor<Vec<f32>> for ScaleExecutor {
    async fn infer(&self, item: Vec<f32>) -> anyhow::Result<OutputMap> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut outputs = OutputMap::new();
        outputs.insert("scaled".into(), item.iter().map(|v| v * self.factor).collect());
        Ok(outputs)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn tokio_backend_delivers_in_order() {
    let pipe = AsyncPipeline::new(
        &PipelineConfig::new().with_max_parallel_requests(3),
        TokioBackend::new(ScaleExecutor { factor: 2.0 }),
    )
    .unwrap();

    for i in 0..3u32 {
        assert!(pipe.submit(vec![i as f32], i).is_submitted());
    }

    // Waits block the driver; keep them off the runtime workers.
    let pipe = tokio::task::spawn_blocking(move || {
        for expected in 0..3u32 {
            pipe.wait_for_result().unwrap();
            let result = pipe.consume().unwrap().unwrap();
            assert_eq!(result.frame_id, u64::from(expected));
            assert_eq!(result.meta, expected);
            assert_eq!(result.outputs["scaled"], vec![expected as f32 * 2.0]);
        }
        pipe
    })
    .await
    .unwrap();

    assert_eq!(pipe.stats().delivered, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_task_surfaces_as_sticky_error() {
    #[derive(Clone)]
    struct FailingExecutor;

    #[async_trait]
    impl AsyncSlotExecutor<u32> for FailingExecutor {
        async fn infer(&self, item: u32) -> anyhow::Result<OutputMap> {
            if item == 0 {
                anyhow::bail!("tensor shape mismatch");
            }
            Ok(OutputMap::new())
        }
    }

    let pipe = AsyncPipeline::new(
        &PipelineConfig::new().with_max_parallel_requests(2),
        TokioBackend::new(FailingExecutor),
    )
    .unwrap();

    assert!(pipe.submit(0, ()).is_submitted());
    assert!(pipe.submit(1, ()).is_submitted());

    tokio::task::spawn_blocking(move || {
        pipe.wait_idle();
        let err = pipe.consume().unwrap_err();
        assert!(err.to_string().contains("tensor shape mismatch"), "got: {err}");
    })
    .await
    .unwrap();
}
