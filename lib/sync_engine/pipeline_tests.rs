use std::sync::Arc;

use crate::distribution::{ProductSnapshot, VersionId};

use super::pipeline::{segment_file_name, BatchPipeline};
use super::scheduler::BatchProcessor;
use super::test_support::{
    catalog_with_segments, scratch_dir, MockDistributionClient, MockPostProcessor,
};
use super::types::{BatchError, MissingSegmentPolicy, SyncEngineConfig};

fn pipeline_config(label: &str) -> SyncEngineConfig {
    SyncEngineConfig {
        staging_dir: scratch_dir(label),
        path_filters: vec!["unused".to_string()],
        channels: vec![7, 9],
        ..SyncEngineConfig::default()
    }
}

fn client_with_segments(primary: &[u16], secondary: &[u16]) -> Arc<MockDistributionClient> {
    Arc::new(MockDistributionClient::new(ProductSnapshot {
        version: VersionId::new("v1"),
        catalogs: vec![
            catalog_with_segments(7, primary),
            catalog_with_segments(9, secondary),
        ],
    }))
}

#[test]
fn segment_file_names_are_zero_padded() {
    assert_eq!(segment_file_name("pak01", 0), "pak01_000.vpk");
    assert_eq!(segment_file_name("pak01", 42), "pak01_042.vpk");
    assert_eq!(segment_file_name("pak01", 333), "pak01_333.vpk");
}

#[tokio::test]
async fn missing_segment_is_skipped_and_batch_proceeds() {
    let config = pipeline_config("missing_skip");
    let client = client_with_segments(&[1], &[3]);
    let post = Arc::new(MockPostProcessor::default());

    let catalogs = vec![catalog_with_segments(7, &[1]), catalog_with_segments(9, &[3])];
    let pipeline = BatchPipeline::new(client.clone(), catalogs, &config, Some(post.clone()));

    pipeline
        .process_batch(&[1, 2, 3])
        .await
        .expect("batch should tolerate the gap");

    // Segment 2 was nowhere; the others were fetched and the hook still ran.
    let fetched: Vec<String> = client.fetched().into_iter().map(|(_, name)| name).collect();
    assert!(fetched.contains(&"pak01_001.vpk".to_string()));
    assert!(fetched.contains(&"pak01_003.vpk".to_string()));
    assert!(!fetched.contains(&"pak01_002.vpk".to_string()));
    assert_eq!(post.calls(), 1);
}

#[tokio::test]
async fn strict_policy_fails_the_batch_before_post_processing() {
    let mut config = pipeline_config("missing_strict");
    config.missing_segment_policy = MissingSegmentPolicy::FailBatch;
    let client = client_with_segments(&[1], &[]);
    let post = Arc::new(MockPostProcessor::default());

    let catalogs = vec![catalog_with_segments(7, &[1])];
    let pipeline = BatchPipeline::new(client, catalogs, &config, Some(post.clone()));

    let err = pipeline
        .process_batch(&[1, 2])
        .await
        .expect_err("strict policy must fail the batch");

    assert!(matches!(err, BatchError::MissingSegment { segment: 2 }));
    assert_eq!(post.calls(), 0);
}

#[tokio::test]
async fn wide_batch_is_fully_fetched_under_bounded_parallelism() {
    let mut config = pipeline_config("fan_out");
    config.fetch_parallelism = 2;
    let segments: Vec<u16> = (1..=6).collect();
    let client = client_with_segments(&segments, &[]);
    let post = Arc::new(MockPostProcessor::default());

    let catalogs = vec![catalog_with_segments(7, &segments)];
    let pipeline = BatchPipeline::new(client.clone(), catalogs, &config, Some(post.clone()));

    pipeline.process_batch(&segments).await.expect("batch");

    let mut fetched: Vec<String> = client.fetched().into_iter().map(|(_, name)| name).collect();
    fetched.sort();
    let mut expected: Vec<String> = segments
        .iter()
        .map(|&segment| segment_file_name("pak01", segment))
        .collect();
    expected.sort();
    assert_eq!(fetched, expected);
    assert_eq!(post.batches(), vec![segments]);
}

#[tokio::test]
async fn channel_priority_order_decides_the_source() {
    let config = pipeline_config("priority");
    // Segment 5 exists in both channels; the first catalog must win.
    let client = client_with_segments(&[5], &[5]);

    let catalogs = vec![catalog_with_segments(7, &[5]), catalog_with_segments(9, &[5])];
    let pipeline = BatchPipeline::new(client.clone(), catalogs, &config, None);

    pipeline.process_batch(&[5]).await.expect("batch");

    assert_eq!(client.fetched(), vec![(7, "pak01_005.vpk".to_string())]);
}

#[tokio::test]
async fn fetch_transport_error_fails_the_batch() {
    let config = pipeline_config("transport");
    let client = client_with_segments(&[1, 2], &[]);
    client.fail_fetches_of("pak01_002.vpk");
    let post = Arc::new(MockPostProcessor::default());

    let catalogs = vec![catalog_with_segments(7, &[1, 2])];
    let pipeline = BatchPipeline::new(client, catalogs, &config, Some(post.clone()));

    let err = pipeline
        .process_batch(&[1, 2])
        .await
        .expect_err("transport failure must fail the batch");

    assert!(matches!(err, BatchError::Fetch(_)));
    assert_eq!(post.calls(), 0);
}

#[tokio::test]
async fn successful_batch_sweeps_staged_files() {
    let config = pipeline_config("sweep");
    let client = client_with_segments(&[1, 2], &[]);

    let catalogs = vec![catalog_with_segments(7, &[1, 2])];
    let pipeline = BatchPipeline::new(client, catalogs, &config, None);

    pipeline.process_batch(&[1, 2]).await.expect("batch");

    assert!(!config.staging_dir.join("pak01_001.vpk").exists());
    assert!(!config.staging_dir.join("pak01_002.vpk").exists());
}

#[tokio::test]
async fn failed_post_processing_preserves_staged_files() {
    let config = pipeline_config("preserve");
    let client = client_with_segments(&[1], &[]);
    let post = Arc::new(MockPostProcessor::failing_at(1));

    let catalogs = vec![catalog_with_segments(7, &[1])];
    let pipeline = BatchPipeline::new(client, catalogs, &config, Some(post));

    let err = pipeline
        .process_batch(&[1])
        .await
        .expect_err("post-process failure must fail the batch");
    assert!(matches!(err, BatchError::PostProcess(_)));

    // Artifacts of the failed batch stay on disk for inspection and retry.
    assert!(config.staging_dir.join("pak01_001.vpk").exists());
}

#[tokio::test]
async fn transient_output_tree_is_swept_after_success() {
    let mut config = pipeline_config("transient");
    let output_dir = config.staging_dir.join("extracted");
    std::fs::create_dir_all(&output_dir).expect("create output tree");
    std::fs::write(output_dir.join("axe.png"), b"png").expect("seed output file");
    config.transient_output = Some(output_dir.clone());

    let client = client_with_segments(&[1], &[]);
    let catalogs = vec![catalog_with_segments(7, &[1])];
    let pipeline = BatchPipeline::new(client, catalogs, &config, None);

    pipeline.process_batch(&[1]).await.expect("batch");

    assert!(!output_dir.exists());
}
