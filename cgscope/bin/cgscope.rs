use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::PathBuf,
    sync::Arc,
};

use cgscope::{
    cli::{AnsiStyles, CgscopeArgs},
    cluster::{ClusterReader, KubeClusterReader},
    orchestration::{cluster_name_from_url, report_path, AnalysisOrchestrator, Report},
    probe::{PodmanRuntime, RegistryAuthfile},
    CgscopeError, CgscopeResult,
};
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> CgscopeResult<()> {
    dotenvy::dotenv().ok();
    let args = CgscopeArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cleaning up");
                cancel.cancel();
            }
        }
    });

    run(&args, cancel).await
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

async fn run(args: &CgscopeArgs, cancel: CancellationToken) -> CgscopeResult<()> {
    let cluster_config = args.cluster_config();
    let config = args.scan_config()?;
    let reader: Arc<dyn ClusterReader> = Arc::new(KubeClusterReader::connect(&cluster_config).await?);

    let mut orchestrator =
        AnalysisOrchestrator::new(Arc::clone(&reader), config.clone()).with_cancellation(cancel);

    // A temporary copy of the cluster pull secret is deleted when this drops.
    let authfile = if *config.get_analyze() {
        RegistryAuthfile::resolve(
            args.authfile.clone(),
            reader.as_ref(),
            config.get_probe().get_work_dir(),
        )
        .await
    } else {
        None
    };

    if *config.get_analyze() {
        let runtime =
            PodmanRuntime::locate(authfile.as_ref().map(|file| file.path().to_path_buf()))?;
        orchestrator = orchestrator.with_runtime(Arc::new(runtime));
    }

    let report = orchestrator.run().await?;
    drop(authfile);

    report.get_summary().log();
    write_report(args, &report, cluster_config.get_api_url().as_deref())
}

fn write_report(args: &CgscopeArgs, report: &Report, api_url: Option<&str>) -> CgscopeResult<()> {
    let path: Option<PathBuf> = match (&args.output, &args.output_dir) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(dir)) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating report directory {}", dir.display()))
                .map_err(CgscopeError::custom)?;
            Some(report_path(
                dir,
                &cluster_name_from_url(api_url),
                args.format,
                chrono::Local::now(),
            ))
        }
        (None, None) => None,
    };

    match path {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating report file {}", path.display()))
                .map_err(CgscopeError::custom)?;
            report.write(args.format, BufWriter::new(file))?;
            eprintln!(
                "{} {} rows to {}",
                "wrote".valid(),
                report.get_rows().len(),
                path.display().to_string().literal()
            );
        }
        None => report.write(args.format, io::stdout().lock())?,
    }

    Ok(())
}
