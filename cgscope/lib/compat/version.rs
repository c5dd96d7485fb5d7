use std::{fmt, sync::LazyLock};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::models::RuntimeFamily;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static SEMERU_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)IBM Semeru").unwrap());

static IBM_JAVA_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)IBM (?:J9|SDK)").unwrap());

/// `openjdk version "11.0.16"`, `java version "1.8.0_372"`.
static JAVA_QUOTED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:openjdk|java) version ["']?([0-9][^"'\s]*)["']?"#).unwrap()
});

/// `openjdk 17.0.1 2021-10-19`.
static JAVA_BARE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:openjdk|java) (\d+(?:\.\d+)*)").unwrap());

/// `1.8.0_372`, `1.8.0_u372`, `1.8.0_372-b07`.
static JAVA_LEGACY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1\.(\d+)\.(\d+)(?:_u?(\d+))?(?:-b(\d+))?").unwrap());

/// `11.0.16`, `17`, `11.0.16.1`, `21-ea`.
static JAVA_MODERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?").unwrap());

/// `IBM Semeru Runtime Open Edition 11.0.16.0 (build 11.0.16+8)`.
static SEMERU_RUNTIME_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Semeru Runtime[^\n(]*?\b(\d+)\.(\d+)\.(\d+)\.(\d+)\b").unwrap()
});

/// `1.8.0_345-b01` as printed in the Semeru build line.
static SEMERU_LEGACY_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b1\.(\d+)\.0_(\d+)-b(\d+)").unwrap());

/// `8.0.345-b01`.
static SEMERU_TAGGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\.(\d+)\.(\d+)-b(\d+)").unwrap());

/// `1.8.0_345` without a build tag.
static SEMERU_LEGACY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b1\.(\d+)\.0_(\d+)\b").unwrap());

/// `(build 8.0.7.15 - pxa6480sr7fp15-...)`.
static IBM_JAVA_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(build (\d+)\.(\d+)\.(\d+)\.(\d+)\b").unwrap());

static FOUR_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\.(\d+)\.(\d+)\.(\d+)\b").unwrap());

/// A line that starts with `v20.3.0`, as printed by `node --version`.
static NODE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*v(\d+)\.(\d+)\.(\d+)\b").unwrap());

/// A line that starts with a version triplet, as printed by `dotnet --version`.
static DOTNET_VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)\.(\d+)\.(\d+)").unwrap());

/// `Microsoft.NETCore.App 8.0.1 [/usr/share/dotnet/shared/Microsoft.NETCore.App]`.
static DOTNET_RUNTIME_LISTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Microsoft\.NETCore\.App (\d+)\.(\d+)\.(\d+)").unwrap());

/// `  Version: 8.0.1` from `dotnet --info`.
static DOTNET_HOST_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Version:\s*(\d+)\.(\d+)\.(\d+)").unwrap());

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A comparable runtime version.
///
/// Ordering is lexicographic over `(major, minor, patch, build)`; a missing build sorts below
/// every present build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    major: u32,
    minor: u32,
    patch: u32,
    build: Option<u32>,
}

/// The vendor grammar a version was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuntimeKind {
    /// OpenJDK or Oracle HotSpot.
    OpenJdk,

    /// IBM Semeru Runtimes.
    Semeru,

    /// IBM SDK, Java Technology Edition.
    IbmJava,

    /// Node.js.
    Node,

    /// .NET.
    Dotnet,
}

/// The outcome of reading a version out of probe output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedVersion {
    /// The output matched the grammar.
    Parsed {
        /// The grammar that matched.
        kind: RuntimeKind,

        /// The comparable version.
        version: RuntimeVersion,

        /// The version text as it appeared in the output.
        text: String,
    },

    /// The output did not match; the raw text is kept for diagnostics.
    Unparsed {
        /// The grammar that was tried.
        kind: RuntimeKind,

        /// The probe output.
        raw: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeVersion {
    /// Creates a version.
    pub const fn new(major: u32, minor: u32, patch: u32, build: Option<u32>) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// The major version.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// The minor version.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The patch version.
    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// The vendor build or update component.
    pub fn build(&self) -> Option<u32> {
        self.build
    }
}

impl RuntimeKind {
    /// The family the kind belongs to.
    pub fn family(&self) -> RuntimeFamily {
        match self {
            RuntimeKind::OpenJdk | RuntimeKind::Semeru | RuntimeKind::IbmJava => {
                RuntimeFamily::Java
            }
            RuntimeKind::Node => RuntimeFamily::Node,
            RuntimeKind::Dotnet => RuntimeFamily::Dotnet,
        }
    }

    /// A human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RuntimeKind::OpenJdk => "OpenJDK",
            RuntimeKind::Semeru => "IBM Semeru",
            RuntimeKind::IbmJava => "IBM Java",
            RuntimeKind::Node => "Node.js",
            RuntimeKind::Dotnet => ".NET",
        }
    }
}

impl ParsedVersion {
    /// The grammar that produced this outcome.
    pub fn kind(&self) -> RuntimeKind {
        match self {
            ParsedVersion::Parsed { kind, .. } | ParsedVersion::Unparsed { kind, .. } => *kind,
        }
    }

    /// Returns true if a version was read.
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParsedVersion::Parsed { .. })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads the version of a `family` binary from its version probe output.
pub fn parse_version(family: RuntimeFamily, output: &str) -> ParsedVersion {
    let kind = match family {
        RuntimeFamily::Java => detect_java_kind(output),
        RuntimeFamily::Node => RuntimeKind::Node,
        RuntimeFamily::Dotnet => RuntimeKind::Dotnet,
    };

    let parsed = match kind {
        RuntimeKind::OpenJdk => parse_openjdk(output),
        RuntimeKind::Semeru => parse_semeru(output),
        RuntimeKind::IbmJava => parse_ibm_java(output),
        RuntimeKind::Node => parse_node(output),
        RuntimeKind::Dotnet => parse_dotnet(output),
    };

    match parsed {
        Some((version, text)) => ParsedVersion::Parsed {
            kind,
            version,
            text,
        },
        None => ParsedVersion::Unparsed {
            kind,
            raw: output.trim().to_string(),
        },
    }
}

/// Picks the Java vendor grammar from `java -version` output.
pub fn detect_java_kind(output: &str) -> RuntimeKind {
    if SEMERU_MARKER.is_match(output) {
        RuntimeKind::Semeru
    } else if IBM_JAVA_MARKER.is_match(output) {
        RuntimeKind::IbmJava
    } else {
        RuntimeKind::OpenJdk
    }
}

/// OpenJDK / HotSpot. The legacy `1.8.0_N` form becomes major 8 with `N` as the build.
pub fn parse_openjdk(output: &str) -> Option<(RuntimeVersion, String)> {
    let text = JAVA_QUOTED_VERSION
        .captures(output)
        .or_else(|| JAVA_BARE_VERSION.captures(output))
        .map(|caps| caps[1].to_string())?;

    if let Some(caps) = JAVA_LEGACY.captures(&text) {
        let version = RuntimeVersion::new(
            number(&caps, 1)?,
            number(&caps, 2)?,
            0,
            optional_number(&caps, 3),
        );
        return Some((version, text));
    }

    let caps = JAVA_MODERN.captures(&text)?;
    let version = RuntimeVersion::new(
        number(&caps, 1)?,
        optional_number(&caps, 2).unwrap_or(0),
        optional_number(&caps, 3).unwrap_or(0),
        optional_number(&caps, 4),
    );
    Some((version, text))
}

/// IBM Semeru. The trailing build tag becomes the build component.
pub fn parse_semeru(output: &str) -> Option<(RuntimeVersion, String)> {
    if let Some(caps) = SEMERU_RUNTIME_VERSION.captures(output) {
        let text = format!("{}.{}.{}.{}", &caps[1], &caps[2], &caps[3], &caps[4]);
        return Some((four_part(&caps)?, text));
    }

    if let Some(caps) = SEMERU_LEGACY_BUILD.captures(output) {
        let version = RuntimeVersion::new(
            number(&caps, 1)?,
            0,
            number(&caps, 2)?,
            Some(number(&caps, 3)?),
        );
        return Some((version, caps[0].to_string()));
    }

    if let Some(caps) = SEMERU_TAGGED.captures(output) {
        return Some((four_part(&caps)?, caps[0].to_string()));
    }

    if let Some(caps) = SEMERU_LEGACY.captures(output) {
        let version = RuntimeVersion::new(number(&caps, 1)?, 0, number(&caps, 2)?, None);
        return Some((version, caps[0].to_string()));
    }

    parse_openjdk(output)
}

/// IBM SDK, Java Technology Edition. Only the `V.R.SR.FP` service level is meaningful.
pub fn parse_ibm_java(output: &str) -> Option<(RuntimeVersion, String)> {
    let caps = IBM_JAVA_BUILD
        .captures(output)
        .or_else(|| FOUR_PART.captures(output))?;
    let version = four_part(&caps)?;
    let text = format!("{}.{}.{}.{}", &caps[1], &caps[2], &caps[3], &caps[4]);
    Some((version, text))
}

/// Node.js `major.minor.patch`.
pub fn parse_node(output: &str) -> Option<(RuntimeVersion, String)> {
    triplet(&NODE_VERSION, output)
}

/// .NET `major.minor.patch`.
pub fn parse_dotnet(output: &str) -> Option<(RuntimeVersion, String)> {
    triplet(&DOTNET_VERSION_LINE, output)
        .or_else(|| triplet(&DOTNET_RUNTIME_LISTING, output))
        .or_else(|| triplet(&DOTNET_HOST_VERSION, output))
}

fn triplet(re: &Regex, output: &str) -> Option<(RuntimeVersion, String)> {
    let caps = re.captures(output)?;
    let version = RuntimeVersion::new(
        number(&caps, 1)?,
        number(&caps, 2)?,
        number(&caps, 3)?,
        None,
    );
    let text = format!("{}.{}.{}", &caps[1], &caps[2], &caps[3]);
    Some((version, text))
}

fn four_part(caps: &Captures<'_>) -> Option<RuntimeVersion> {
    Some(RuntimeVersion::new(
        number(caps, 1)?,
        number(caps, 2)?,
        number(caps, 3)?,
        Some(number(caps, 4)?),
    ))
}

fn number(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn optional_number(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
