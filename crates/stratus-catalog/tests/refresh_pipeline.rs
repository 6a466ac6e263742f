//! End-to-end tests for the discovery pipelines over in-memory
//! collaborators.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use stratus_catalog::{
    CatalogError, CollectorConfig, FailureKind, RefreshRunner, StorageCatalogRepository,
};
use stratus_core::registry::{DescriptorRow, StageListing};
use stratus_core::{MemoryBackend, MemoryRegistry, PlatformContext};

fn ctx() -> PlatformContext {
    PlatformContext::new("CATALOG_ADMIN").expect("valid role")
}

fn location_row(property: &str, provider: &str, region: &str, locations: &[&str]) -> DescriptorRow {
    let payload = serde_json::json!({
        "NAME": format!("{region}-loc"),
        "STORAGE_PROVIDER": provider,
        "STORAGE_REGION": region,
        "STORAGE_ALLOWED_LOCATIONS": locations,
    });
    DescriptorRow {
        parent_property: "STORAGE_LOCATIONS".into(),
        property: property.into(),
        property_type: "String".into(),
        property_value: payload.to_string(),
    }
}

fn external_stage(name: &str, url: &str) -> StageListing {
    StageListing {
        name: name.into(),
        database_name: "RAW_DB".into(),
        schema_name: "PUBLIC".into(),
        region: Some("us-east-1".into()),
        cloud: Some("AWS".into()),
        url: Some(url.into()),
        stage_type: "EXTERNAL".into(),
    }
}

fn runner(registry: MemoryRegistry) -> (RefreshRunner<MemoryRegistry>, Arc<StorageCatalogRepository>) {
    let repository = Arc::new(StorageCatalogRepository::new(Arc::new(MemoryBackend::new())));
    let runner = RefreshRunner::new(Arc::new(registry), Arc::clone(&repository));
    (runner, repository)
}

#[tokio::test]
async fn volume_pipeline_end_to_end() {
    let registry = MemoryRegistry::new().with_volume(
        "ICEBERG_VOL",
        vec![
            location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p1", "s3://b/p2"]),
            location_row("STORAGE_LOCATION_2", "S3", "eu-west-1", &["s3://b/p3"]),
        ],
    );
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let report = runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    assert_eq!(report.entities_processed, 1);
    assert!(report.skipped.is_empty());
    assert_eq!(report.rows_written, 3);

    let rows = repository.volume_paths().await.expect("query");
    let triples: Vec<_> = rows
        .iter()
        .map(|r| (r.volume_name.as_str(), r.storage_region.as_str(), r.s3_path.as_str()))
        .collect();
    assert_eq!(
        triples,
        [
            ("ICEBERG_VOL", "us-east-1", "s3://b/p1"),
            ("ICEBERG_VOL", "us-east-1", "s3://b/p2"),
            ("ICEBERG_VOL", "eu-west-1", "s3://b/p3"),
        ]
    );
}

#[tokio::test]
async fn all_filtered_volume_emits_zero_rows() {
    let registry = MemoryRegistry::new().with_volume(
        "GCS_VOL",
        vec![
            location_row("STORAGE_LOCATION_1", "GCS", "us-central1", &["gcs://b/1"]),
            location_row("STORAGE_LOCATION_2", "GCS", "us-central1", &["gcs://b/2"]),
        ],
    );
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let report = runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    assert_eq!(report.entities_processed, 1);
    assert_eq!(report.rows_written, 0);
    assert!(repository.volume_paths().await.expect("query").is_empty());
}

#[tokio::test]
async fn repeated_region_rows_sum_and_keep_order() {
    let registry = MemoryRegistry::new().with_volume(
        "MULTI",
        vec![
            location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/a"]),
            location_row("STORAGE_LOCATION_2", "S3", "us-east-1", &["s3://b/b", "s3://b/c"]),
        ],
    );
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    let rows = repository.volume_paths().await.expect("query");
    assert_eq!(rows.len(), 3);
    let paths: Vec<_> = rows.iter().map(|r| r.s3_path.as_str()).collect();
    assert_eq!(paths, ["s3://b/a", "s3://b/b", "s3://b/c"]);
}

#[tokio::test]
async fn pipeline_is_idempotent() {
    let registry = MemoryRegistry::new()
        .with_volume(
            "VOL",
            vec![location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p"])],
        )
        .with_stage(external_stage("EXT", "s3://b/stage"));
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let token = CancellationToken::new();
    runner.refresh_volume_paths(&ctx(), &token).await.expect("first");
    let first_rows = repository.volume_paths().await.expect("query");
    runner.refresh_volume_paths(&ctx(), &token).await.expect("second");
    let second_rows = repository.volume_paths().await.expect("query");

    assert_eq!(first_rows, second_rows);

    runner.refresh_stage_paths(&ctx(), &token).await.expect("stages 1");
    let first_stages = repository.stage_paths().await.expect("query");
    runner.refresh_stage_paths(&ctx(), &token).await.expect("stages 2");
    let second_stages = repository.stage_paths().await.expect("query");

    assert_eq!(first_stages, second_stages);
}

#[tokio::test]
async fn partial_failure_reflects_survivors_and_reports_one_skip() {
    let mut registry = MemoryRegistry::new();
    for i in 0..2 {
        registry = registry.with_volume(
            format!("VOL_{i}"),
            vec![location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p"])],
        );
    }
    registry = registry.with_failing_volume("VOL_BROKEN");
    for i in 2..4 {
        registry = registry.with_volume(
            format!("VOL_{i}"),
            vec![location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p"])],
        );
    }

    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let report = runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    assert_eq!(report.entities_processed, 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].entity, "VOL_BROKEN");
    assert_eq!(report.skipped[0].kind, FailureKind::Upstream);
    assert!(report.is_partial());

    let rows = repository.volume_paths().await.expect("query");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.volume_name != "VOL_BROKEN"));
}

#[tokio::test]
async fn malformed_descriptor_skips_only_that_volume() {
    let registry = MemoryRegistry::new()
        .with_volume(
            "OK_VOL",
            vec![location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p"])],
        )
        .with_volume(
            "BAD_VOL",
            vec![DescriptorRow {
                parent_property: "STORAGE_LOCATIONS".into(),
                property: "STORAGE_LOCATION_1".into(),
                property_type: "String".into(),
                property_value: "{truncated".into(),
            }],
        );
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let report = runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    assert_eq!(report.entities_processed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].kind, FailureKind::MalformedDescriptor);

    let rows = repository.volume_paths().await.expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].volume_name, "OK_VOL");
}

#[tokio::test]
async fn stage_pipeline_filters_and_projects() {
    let registry = MemoryRegistry::new()
        .with_stage(external_stage("EXT_A", "s3://b/a"))
        .with_stage(StageListing {
            name: "INTERNAL_STAGE".into(),
            database_name: "DB".into(),
            schema_name: "SC".into(),
            region: None,
            cloud: None,
            url: None,
            stage_type: "INTERNAL".into(),
        })
        .with_stage(external_stage("EXT_B", "s3://b/b"));
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let report = runner
        .refresh_stage_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    assert_eq!(report.entities_processed, 2);
    let rows = repository.stage_paths().await.expect("query");
    let names: Vec<_> = rows.iter().map(|r| r.stage_name.as_str()).collect();
    assert_eq!(names, ["EXT_A", "EXT_B"]);
    assert_eq!(rows[0].stage_url, "s3://b/a");
    assert_eq!(rows[0].storage_provider, "AWS");
}

#[tokio::test]
async fn cancellation_leaves_table_at_pre_run_state() {
    let registry = MemoryRegistry::new().with_volume(
        "VOL",
        vec![location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/new"])],
    );
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    // Seed the table, then cancel before a second run writes.
    runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("seed");
    let before = repository.volume_paths().await.expect("query");

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = runner
        .refresh_volume_paths(&ctx(), &cancelled)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, CatalogError::Cancelled { .. }));

    let after = repository.volume_paths().await.expect("query");
    assert_eq!(before, after);
}

#[tokio::test]
async fn refresh_all_runs_both_pipelines() {
    let registry = MemoryRegistry::new()
        .with_volume(
            "VOL",
            vec![location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p"])],
        )
        .with_stage(external_stage("EXT", "s3://b/stage"));
    let (runner, repository) = runner(registry);
    repository.initialize().await.expect("init");

    let (volumes, stages) = runner.refresh_all(&ctx(), &CancellationToken::new()).await;
    volumes.expect("volume run");
    stages.expect("stage run");

    assert_eq!(repository.volume_paths().await.expect("v").len(), 1);
    assert_eq!(repository.stage_paths().await.expect("s").len(), 1);
}

#[tokio::test]
async fn refresh_against_uninitialized_repository_fails() {
    let registry = MemoryRegistry::new();
    let (runner, _repository) = runner(registry);

    let err = runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect_err("not initialized");
    assert!(matches!(err, CatalogError::Core(_)));
}

#[tokio::test]
async fn custom_provider_filter_is_honored() {
    let registry = MemoryRegistry::new().with_volume(
        "MIXED",
        vec![
            location_row("STORAGE_LOCATION_1", "S3", "us-east-1", &["s3://b/p"]),
            location_row("STORAGE_LOCATION_2", "GCS", "us-central1", &["gcs://b/q"]),
        ],
    );
    let repository = Arc::new(StorageCatalogRepository::new(Arc::new(MemoryBackend::new())));
    repository.initialize().await.expect("init");
    let runner = RefreshRunner::new(Arc::new(registry), Arc::clone(&repository)).with_config(
        CollectorConfig {
            provider: "GCS".into(),
            ..CollectorConfig::default()
        },
    );

    runner
        .refresh_volume_paths(&ctx(), &CancellationToken::new())
        .await
        .expect("refresh");

    let rows = repository.volume_paths().await.expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].s3_path, "gcs://b/q");
}
