use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use getset::Getters;
use serde::Serialize;

use crate::{
    models::{AnalysisResult, ContainerImageRecord, ObjectType, RuntimeFinding},
    CgscopeResult, ListError,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The report columns, in output order.
pub const REPORT_COLUMNS: [&str; 16] = [
    "container_name",
    "namespace",
    "object_type",
    "object_name",
    "image_name",
    "image_id",
    "java_binary",
    "java_version",
    "java_cgroup_v2_compatible",
    "node_binary",
    "node_version",
    "node_cgroup_v2_compatible",
    "dotnet_binary",
    "dotnet_version",
    "dotnet_cgroup_v2_compatible",
    "analysis_error",
];

const UNKNOWN_CLUSTER: &str = "unknown";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How the report is serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Comma separated values with a header row.
    #[default]
    Csv,

    /// A JSON array of row objects.
    Json,
}

/// One output row: a container record joined with the analysis of its image.
///
/// Analysis columns are empty when analysis was not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// The container name.
    pub container_name: String,

    /// The namespace of the owning object.
    pub namespace: String,

    /// The kind of the owning object.
    pub object_type: String,

    /// The name of the owning object.
    pub object_name: String,

    /// The resolved image reference.
    pub image_name: String,

    /// The image ID, empty when no live pod was consulted.
    pub image_id: String,

    /// The Java binary path or `None`.
    pub java_binary: String,

    /// The Java version text.
    pub java_version: String,

    /// `Yes`, `No` or `N/A`.
    pub java_cgroup_v2_compatible: String,

    /// The Node.js binary path or `None`.
    pub node_binary: String,

    /// The Node.js version text.
    pub node_version: String,

    /// `Yes`, `No` or `N/A`.
    pub node_cgroup_v2_compatible: String,

    /// The .NET binary path or `None`.
    pub dotnet_binary: String,

    /// The .NET version text.
    pub dotnet_version: String,

    /// `Yes`, `No` or `N/A`.
    pub dotnet_cgroup_v2_compatible: String,

    /// Every problem met while analyzing the image.
    pub analysis_error: String,
}

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ScanSummary {
    /// Reported containers.
    records: usize,

    /// Distinct image references.
    distinct_images: usize,

    /// Images that went through the probe.
    analyzed: usize,

    /// Analyzed images with an analysis error.
    failed: usize,

    /// Records per object type.
    counts: BTreeMap<ObjectType, usize>,

    /// Workload kinds that could not be listed, with the reason.
    list_failures: Vec<ListError>,
}

/// The joined rows of a run and its totals.
#[derive(Debug, Clone, Default, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Report {
    /// One row per reported container, in collection order.
    rows: Vec<ReportRow>,

    /// The run totals.
    summary: ScanSummary,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ReportRow {
    /// Joins a record with the analysis of its image, if any.
    pub fn new(record: &ContainerImageRecord, analysis: Option<&AnalysisResult>) -> Self {
        let mut row = Self {
            container_name: record.get_container_name().clone(),
            namespace: record.get_namespace().clone(),
            object_type: record.get_object_type().to_string(),
            object_name: record.get_object_name().clone(),
            image_name: record.get_image_reference().clone(),
            image_id: record.get_image_id().clone().unwrap_or_default(),
            ..Default::default()
        };

        let Some(analysis) = analysis else {
            return row;
        };

        (row.java_binary, row.java_version, row.java_cgroup_v2_compatible) =
            finding_columns(analysis.get_java());
        (row.node_binary, row.node_version, row.node_cgroup_v2_compatible) =
            finding_columns(analysis.get_node());
        (row.dotnet_binary, row.dotnet_version, row.dotnet_cgroup_v2_compatible) =
            finding_columns(analysis.get_dotnet());
        row.analysis_error = analysis.get_analysis_error().clone().unwrap_or_default();

        row
    }

    /// The row's values in [`REPORT_COLUMNS`] order.
    pub fn values(&self) -> [&str; 16] {
        [
            &self.container_name,
            &self.namespace,
            &self.object_type,
            &self.object_name,
            &self.image_name,
            &self.image_id,
            &self.java_binary,
            &self.java_version,
            &self.java_cgroup_v2_compatible,
            &self.node_binary,
            &self.node_version,
            &self.node_cgroup_v2_compatible,
            &self.dotnet_binary,
            &self.dotnet_version,
            &self.dotnet_cgroup_v2_compatible,
            &self.analysis_error,
        ]
    }
}

impl ScanSummary {
    pub(super) fn new(
        records: usize,
        distinct_images: usize,
        counts: BTreeMap<ObjectType, usize>,
        list_failures: Vec<ListError>,
    ) -> Self {
        Self {
            records,
            distinct_images,
            counts,
            list_failures,
            ..Default::default()
        }
    }

    /// Listing failures that lost data, leaving out kinds the cluster does not serve.
    pub fn collection_failures(&self) -> impl Iterator<Item = &ListError> {
        self.list_failures
            .iter()
            .filter(|failure| !failure.is_kind_unavailable())
    }

    pub(super) fn count_analysis(&mut self, result: &AnalysisResult) {
        self.analyzed += 1;
        if result.has_error() {
            self.failed += 1;
        }
    }

    /// Logs the totals.
    pub fn log(&self) {
        for (kind, count) in &self.counts {
            tracing::info!("{kind}: {count} containers");
        }

        for failure in &self.list_failures {
            if failure.is_kind_unavailable() {
                tracing::debug!("skipped: {failure}");
            }
        }

        for failure in self.collection_failures() {
            tracing::warn!("not collected: {failure}");
        }

        tracing::info!(
            "{} containers, {} distinct images, {} analyzed, {} with analysis errors",
            self.records,
            self.distinct_images,
            self.analyzed,
            self.failed
        );
    }
}

impl Report {
    pub(super) fn new(rows: Vec<ReportRow>, summary: ScanSummary) -> Self {
        Self { rows, summary }
    }

    /// Writes the report in `format`.
    pub fn write(&self, format: ReportFormat, writer: impl Write) -> CgscopeResult<()> {
        match format {
            ReportFormat::Csv => self.write_csv(writer),
            ReportFormat::Json => self.write_json(writer),
        }
    }

    /// Writes a header row and one line per row.
    pub fn write_csv(&self, mut writer: impl Write) -> CgscopeResult<()> {
        writeln!(writer, "{}", REPORT_COLUMNS.join(","))?;
        for row in &self.rows {
            let line = row.values().map(csv_field).join(",");
            writeln!(writer, "{line}")?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Writes the rows as a pretty printed JSON array.
    pub fn write_json(&self, mut writer: impl Write) -> CgscopeResult<()> {
        serde_json::to_writer_pretty(&mut writer, &self.rows)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Quotes a CSV field when it holds a separator, a quote or a line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Derives a short cluster name from an API server URL.
///
/// `https://api.prod.example.com:6443` yields `prod`. Other hosts yield their first label.
pub fn cluster_name_from_url(api_url: Option<&str>) -> String {
    let host = api_url.map(host_of).unwrap_or_default();
    let mut labels = host.split('.').filter(|label| !label.is_empty());

    match labels.next() {
        Some("api") => labels.next().unwrap_or("api").to_string(),
        Some(first) => first.to_string(),
        None => UNKNOWN_CLUSTER.to_string(),
    }
}

/// The report path inside `output_dir`, named after the cluster and the run time.
pub fn report_path(
    output_dir: &Path,
    cluster_name: &str,
    format: ReportFormat,
    now: DateTime<Local>,
) -> PathBuf {
    let extension = match format {
        ReportFormat::Csv => "csv",
        ReportFormat::Json => "json",
    };

    output_dir.join(format!(
        "{cluster_name}-{}.{extension}",
        now.format("%Y%m%d-%H%M%S")
    ))
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn finding_columns(finding: &RuntimeFinding) -> (String, String, String) {
    (
        finding.binary_display().to_string(),
        finding.get_version().clone(),
        finding.get_compatibility().to_string(),
    )
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.split(':').next().unwrap_or_default()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
