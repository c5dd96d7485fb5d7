mod common;

use std::{collections::HashMap, sync::Arc, time::Duration};

use cgscope::{
    cluster::Workload,
    config::{ProbeConfig, ScanConfig},
    models::ObjectType,
    orchestration::{AnalysisOrchestrator, ReportRow},
    CgscopeError,
};
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

use common::{
    container, deployment, leftovers, stderr, stdout, FakeClusterReader, FakeImage,
    FakeImageRuntime,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const WEB: &str = "quay.io/shop/web:2";

const WORKER: &str = "quay.io/shop/worker:5";

const INTERNAL: &str = "image-registry.openshift-image-registry.svc:5000/shop/api@sha256:ab12";

const ROUTE: &str = "default-route-openshift-image-registry.apps.demo.example.com";

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_orchestrator_joins_one_analysis_per_image() -> anyhow::Result<()> {
    let work = tempdir()?;
    let reader = FakeClusterReader {
        workloads: vec![
            deployment("shop", "web", "app=web", WEB),
            deployment("shop-canary", "web", "app=web", WEB),
            deployment("shop", "worker", "app=worker", WORKER),
        ],
        ..Default::default()
    };
    let runtime = FakeImageRuntime::with_images([
        (
            WEB,
            FakeImage {
                files: vec!["/usr/local/bin/node"],
                outputs: HashMap::from([("/usr/local/bin/node", stdout("v20.11.1\n"))]),
                ..Default::default()
            },
        ),
        (
            WORKER,
            FakeImage {
                files: vec!["/usr/bin/java"],
                outputs: HashMap::from([(
                    "/usr/bin/java",
                    stderr(
                        "openjdk version \"1.8.0_362\"\n\
                         OpenJDK Runtime Environment (build 1.8.0_362-b08)\n",
                    ),
                )]),
                ..Default::default()
            },
        ),
    ]);

    let report = AnalysisOrchestrator::new(Arc::new(reader), analyze_config(&work))
        .with_runtime(runtime.clone())
        .run()
        .await?;

    let rows = report.get_rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].node_cgroup_v2_compatible, "Yes");
    assert_eq!(rows[0].node_version, "20.11.1");
    assert_eq!(analysis_columns(&rows[0]), analysis_columns(&rows[1]));
    assert_eq!(rows[1].namespace, "shop-canary");
    assert_eq!(rows[2].java_binary, "/usr/bin/java");
    assert_eq!(rows[2].java_cgroup_v2_compatible, "No");
    assert_eq!(rows[2].node_cgroup_v2_compatible, "N/A");
    assert!(rows.iter().all(|row| row.analysis_error.is_empty()));

    // Each distinct image is pulled exactly once.
    let mut pulled: Vec<_> = runtime.pulled().into_iter().map(|(r, _)| r).collect();
    pulled.sort();
    assert_eq!(pulled, [WEB, WORKER]);

    let summary = report.get_summary();
    assert_eq!(*summary.get_records(), 3);
    assert_eq!(*summary.get_distinct_images(), 2);
    assert_eq!(*summary.get_analyzed(), 2);
    assert_eq!(*summary.get_failed(), 0);
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_orchestrator_without_analysis_reports_inventory_only() -> anyhow::Result<()> {
    let reader: Arc<FakeClusterReader> = Arc::new(FakeClusterReader {
        workloads: vec![deployment("shop", "web", "app=web", WEB)],
        ..Default::default()
    });

    let report = AnalysisOrchestrator::new(reader.clone(), ScanConfig::builder().build())
        .run()
        .await?;
    let rows = report.get_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].image_name, WEB);
    assert!(analysis_columns(&rows[0]).iter().all(|value| value.is_empty()));
    assert_eq!(*report.get_summary().get_analyzed(), 0);

    let result = AnalysisOrchestrator::new(reader, ScanConfig::builder().analyze(true).build())
        .run()
        .await;
    assert!(matches!(result, Err(CgscopeError::InvalidArgument(_))));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_orchestrator_pulls_internal_images_through_the_route() -> anyhow::Result<()> {
    let work = tempdir()?;
    let rewritten = format!("{ROUTE}/shop/api@sha256:ab12");
    let reader = FakeClusterReader {
        workloads: vec![deployment("shop", "api", "app=api", INTERNAL)],
        route: Some(ROUTE.to_string()),
        ..Default::default()
    };
    let runtime = FakeImageRuntime::with_images([(
        rewritten.clone(),
        FakeImage {
            files: vec!["/usr/bin/dotnet"],
            outputs: HashMap::from([("/usr/bin/dotnet", stdout("3.1.32\n"))]),
            ..Default::default()
        },
    )]);

    let report = AnalysisOrchestrator::new(Arc::new(reader), analyze_config(&work))
        .with_runtime(runtime.clone())
        .run()
        .await?;

    assert_eq!(runtime.pulled(), [(rewritten.clone(), true)]);
    assert_eq!(runtime.removed(), [rewritten]);

    let row = &report.get_rows()[0];
    assert_eq!(row.image_name, INTERNAL);
    assert_eq!(row.dotnet_version, "3.1.32");
    assert_eq!(row.dotnet_cgroup_v2_compatible, "No");
    assert_eq!(row.analysis_error, "");
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_orchestrator_records_failures_and_keeps_going() -> anyhow::Result<()> {
    let work = tempdir()?;
    let reader = FakeClusterReader {
        workloads: vec![
            deployment("shop", "web", "app=web", WEB),
            deployment("shop", "private", "app=private", "registry.example.com/private:1"),
        ],
        ..Default::default()
    };
    let runtime = FakeImageRuntime::with_images([(WEB, FakeImage::default())]);

    let report = AnalysisOrchestrator::new(Arc::new(reader), analyze_config(&work))
        .with_runtime(runtime)
        .run()
        .await?;

    let rows = report.get_rows();
    assert_eq!(rows[0].analysis_error, "");
    assert_eq!(rows[0].java_cgroup_v2_compatible, "N/A");
    assert!(rows[1].analysis_error.contains("manifest unknown"));
    assert_eq!(rows[1].java_binary, "None");
    assert_eq!(*report.get_summary().get_failed(), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_orchestrator_cancellation_cleans_up_in_flight_probes() -> anyhow::Result<()> {
    let work = tempdir()?;
    let reader = FakeClusterReader {
        workloads: vec![
            deployment("shop", "web", "app=web", WEB),
            deployment("shop", "worker", "app=worker", WORKER),
        ],
        ..Default::default()
    };
    let runtime = FakeImageRuntime::with_images([
        (
            WEB,
            FakeImage {
                files: vec!["/usr/bin/java"],
                run_delay: Some(Duration::from_secs(30)),
                ..Default::default()
            },
        ),
        (WORKER, FakeImage::default()),
    ]);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        }
    });

    // One probe at a time, so the worker image is never started.
    let config = ScanConfig::builder()
        .analyze(true)
        .probe(
            ProbeConfig::builder()
                .work_dir(work.path().to_path_buf())
                .build(),
        )
        .build();
    let report = AnalysisOrchestrator::new(Arc::new(reader), config)
        .with_runtime(runtime.clone())
        .with_cancellation(cancel)
        .run()
        .await?;

    for row in report.get_rows() {
        assert_eq!(row.analysis_error, "cancelled");
        assert_eq!(row.java_cgroup_v2_compatible, "N/A");
    }

    // The dropped probe still removed its image and export directory.
    assert_eq!(runtime.removed(), [WEB]);
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_orchestrator_fails_on_unreachable_cluster() {
    let reader = FakeClusterReader {
        unreachable: true,
        workloads: vec![deployment("shop", "web", "app=web", WEB)],
        ..Default::default()
    };

    let result = AnalysisOrchestrator::new(Arc::new(reader), ScanConfig::builder().build())
        .run()
        .await;
    assert!(matches!(result, Err(CgscopeError::ClusterUnreachable(_))));
}

#[test_log::test(tokio::test)]
async fn test_orchestrator_reports_template_images_for_pending_containers() -> anyhow::Result<()>
{
    let web = Workload::builder()
        .kind(ObjectType::Deployment)
        .name("web")
        .namespace("shop")
        .replicas(2)
        .selector("app=web")
        .containers(vec![container("app", WEB), container("proxy", "envoy:1.29")])
        .build();

    let reader = FakeClusterReader {
        workloads: vec![web],
        ..Default::default()
    };

    let report = AnalysisOrchestrator::new(Arc::new(reader), ScanConfig::builder().build())
        .run()
        .await?;
    let images: Vec<_> = report
        .get_rows()
        .iter()
        .map(|row| (row.container_name.as_str(), row.image_name.as_str()))
        .collect();
    assert_eq!(images, [("app", WEB), ("proxy", "envoy:1.29")]);
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn analyze_config(work: &TempDir) -> ScanConfig {
    ScanConfig::builder()
        .analyze(true)
        .concurrency(2)
        .probe(
            ProbeConfig::builder()
                .work_dir(work.path().to_path_buf())
                .build(),
        )
        .build()
}

fn analysis_columns(row: &ReportRow) -> [&str; 10] {
    let values = row.values();
    [
        values[6], values[7], values[8], values[9], values[10], values[11], values[12],
        values[13], values[14], values[15],
    ]
}
