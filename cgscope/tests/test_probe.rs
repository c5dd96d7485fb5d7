mod common;

use std::{collections::HashMap, time::Duration};

use cgscope::{
    compat::RuntimeKind,
    config::ProbeConfig,
    models::{Compatibility, RuntimeFamily},
    probe::RuntimeProbe,
    resolve::PullTarget,
};
use tempfile::tempdir;

use common::{leftovers, stderr, stdout, FakeImage, FakeImageRuntime};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const IMAGE: &str = "quay.io/shop/web:2";

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_probe_classifies_every_runtime_found() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            files: vec![
                "/usr/lib/jvm/java-1.8.0/jre/bin/java",
                "/opt/app/node_modules/.bin/node",
                "/usr/local/bin/node",
            ],
            links: vec![("/usr/bin/java", "/usr/lib/jvm/java-1.8.0/jre/bin/java")],
            outputs: HashMap::from([
                (
                    "/usr/bin/java",
                    stderr(
                        "openjdk version \"1.8.0_372\"\n\
                         OpenJDK Runtime Environment (build 1.8.0_372-b07)\n",
                    ),
                ),
                ("/usr/local/bin/node", stdout("v18.17.0\n")),
            ]),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    let java = result.finding(RuntimeFamily::Java);
    assert_eq!(java.binary_display(), "/usr/bin/java");
    assert_eq!(java.get_version(), "1.8.0_372");
    assert_eq!(java.get_runtime(), &Some(RuntimeKind::OpenJdk));
    assert_eq!(java.get_compatibility(), &Compatibility::Yes);

    let node = result.finding(RuntimeFamily::Node);
    assert_eq!(node.binary_display(), "/usr/local/bin/node");
    assert_eq!(node.get_version(), "18.17.0");
    assert_eq!(node.get_compatibility(), &Compatibility::No);

    let dotnet = result.finding(RuntimeFamily::Dotnet);
    assert_eq!(dotnet.binary_display(), "None");
    assert_eq!(dotnet.get_compatibility(), &Compatibility::NotApplicable);

    assert_eq!(result.get_analysis_error(), &None);
    assert_eq!(runtime.removed(), [IMAGE]);
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_probe_without_runtimes_reports_not_applicable() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            files: vec!["/bin/sh", "/etc/alternatives/java"],
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    for family in RuntimeFamily::ALL {
        let finding = result.finding(family);
        assert_eq!(finding.binary_display(), "None");
        assert_eq!(finding.get_version(), "");
        assert_eq!(finding.get_compatibility(), &Compatibility::NotApplicable);
    }
    assert_eq!(result.get_analysis_error(), &None);
    assert!(runtime.runs.lock().unwrap().is_empty());
    assert_eq!(runtime.removed(), [IMAGE]);
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_probe_records_pull_failures() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            pull_error: Some("unauthorized: authentication required".to_string()),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    for family in RuntimeFamily::ALL {
        assert_eq!(result.finding(family).binary_display(), "None");
        assert_eq!(
            result.finding(family).get_compatibility(),
            &Compatibility::NotApplicable
        );
    }
    let error = result.get_analysis_error().clone().unwrap_or_default();
    assert!(error.contains("unauthorized"), "{error}");
    assert!(runtime.removed().is_empty());
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_probe_keeps_binaries_with_unreadable_versions() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            files: vec!["/usr/bin/java", "/usr/share/dotnet/dotnet"],
            outputs: HashMap::from([
                (
                    "/usr/bin/java",
                    stderr("Error: could not open `/usr/lib/jvm/jre/lib/amd64/jvm.cfg'\n"),
                ),
                ("/usr/share/dotnet/dotnet", stdout("8.0.1\n")),
            ]),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    let java = result.finding(RuntimeFamily::Java);
    assert_eq!(java.binary_display(), "/usr/bin/java");
    assert_eq!(java.get_version(), "");
    assert_eq!(java.get_compatibility(), &Compatibility::NotApplicable);

    let dotnet = result.finding(RuntimeFamily::Dotnet);
    assert_eq!(dotnet.get_version(), "8.0.1");
    assert_eq!(dotnet.get_compatibility(), &Compatibility::Yes);

    let error = result.get_analysis_error().clone().unwrap_or_default();
    assert!(error.starts_with("Java: unrecognized version output"), "{error}");
    assert_eq!(runtime.removed(), [IMAGE]);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_probe_times_out_slow_pulls() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            pull_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .pull_timeout(Duration::from_millis(50))
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    let error = result.get_analysis_error().clone().unwrap_or_default();
    assert!(error.starts_with("pull timed out"), "{error}");
    assert_eq!(
        result.finding(RuntimeFamily::Java).get_compatibility(),
        &Compatibility::NotApplicable
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_probe_times_out_slow_version_probes() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            files: vec!["/usr/local/bin/node"],
            run_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .probe_timeout(Duration::from_millis(50))
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    let node = result.finding(RuntimeFamily::Node);
    assert_eq!(node.binary_display(), "/usr/local/bin/node");
    assert_eq!(node.get_compatibility(), &Compatibility::NotApplicable);

    let error = result.get_analysis_error().clone().unwrap_or_default();
    assert!(error.contains("version probe timed out"), "{error}");
    assert_eq!(runtime.removed(), [IMAGE]);
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_analysis_cleans_up_after_a_panicking_runtime() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            files: vec!["/usr/bin/java"],
            run_panic: Some("runtime crashed mid-run"),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);
    let result = probe.analyze(IMAGE, &target(IMAGE)).await;

    let error = result.get_analysis_error().clone().unwrap_or_default();
    assert!(error.starts_with("analysis panicked"), "{error}");
    assert!(error.contains("runtime crashed mid-run"), "{error}");
    assert_eq!(runtime.removed(), [IMAGE]);
    assert!(leftovers(work.path()).is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_probe_is_repeatable() -> anyhow::Result<()> {
    let work = tempdir()?;
    let runtime = FakeImageRuntime::with_images([(
        IMAGE,
        FakeImage {
            files: vec!["/opt/java/openjdk/bin/java"],
            outputs: HashMap::from([(
                "/opt/java/openjdk/bin/java",
                stderr(
                    "openjdk version \"11.0.15\" 2022-04-19\n\
                     OpenJDK Runtime Environment Temurin-11.0.15+10 (build 11.0.15+10)\n",
                ),
            )]),
            ..Default::default()
        },
    )]);

    let config = ProbeConfig::builder()
        .work_dir(work.path().to_path_buf())
        .build();
    let probe = RuntimeProbe::new(runtime.clone(), config);

    let first = probe.analyze(IMAGE, &target(IMAGE)).await;
    let second = probe.analyze(IMAGE, &target(IMAGE)).await;

    assert_eq!(first, second);
    assert_eq!(
        first.finding(RuntimeFamily::Java).get_compatibility(),
        &Compatibility::No
    );
    assert_eq!(runtime.removed(), [IMAGE, IMAGE]);
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn target(reference: &str) -> PullTarget {
    PullTarget {
        reference: reference.to_string(),
        insecure: false,
    }
}
