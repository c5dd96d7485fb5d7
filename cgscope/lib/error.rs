use std::{
    error::Error,
    fmt::{self, Display},
    time::Duration,
};
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a cgscope-related operation.
pub type CgscopeResult<T> = Result<T, CgscopeError>;

/// An error that occurred while inventorying or analyzing images.
#[derive(Debug, Error)]
pub enum CgscopeError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error returned by the Kubernetes client.
    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// The cluster could not be reached or refused our credentials.
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),

    /// Listing one workload kind failed.
    #[error(transparent)]
    List(#[from] ListError),

    /// An invalid argument was supplied.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A namespace exclusion pattern could not be compiled.
    #[error("invalid namespace pattern '{pattern}': {source}")]
    InvalidNamespacePattern {
        /// The offending pattern.
        pattern: String,

        /// The underlying regex error.
        source: regex::Error,
    },

    /// The container runtime binary could not be located.
    #[error("container runtime not found: {0}")]
    RuntimeNotFound(String),

    /// Pulling an image failed.
    #[error("failed to pull image {reference}: {reason}")]
    ImagePull {
        /// The image reference.
        reference: String,

        /// Why the pull failed.
        reason: String,
    },

    /// Exporting an image filesystem failed.
    #[error("failed to export image {reference}: {reason}")]
    ImageExport {
        /// The image reference.
        reference: String,

        /// Why the export failed.
        reason: String,
    },

    /// Removing a pulled image failed.
    #[error("failed to remove image {reference}: {reason}")]
    ImageRemove {
        /// The image reference.
        reference: String,

        /// Why the removal failed.
        reason: String,
    },

    /// Running a binary inside an image failed.
    #[error("failed to run {binary} in {reference}: {reason}")]
    ImageExec {
        /// The image reference.
        reference: String,

        /// The binary that was run.
        binary: String,

        /// Why the run failed.
        reason: String,
    },

    /// Unpacking an exported filesystem failed.
    #[error("rootfs extraction failed: {0}")]
    RootfsExtraction(String),

    /// An operation did not finish in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,

        /// The budget that was exceeded.
        duration: Duration,
    },

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// Why listing a workload kind failed.
///
/// The resolver treats every variant as non-fatal. The distinction matters for reporting:
/// an absent API group is expected on vanilla Kubernetes, the others are not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    /// The API group serving this kind is not installed.
    #[error("{kind} is not available in this cluster")]
    KindUnavailable {
        /// The workload kind.
        kind: String,
    },

    /// The credentials may not list this kind.
    #[error("not allowed to list {kind}: {message}")]
    Forbidden {
        /// The workload kind.
        kind: String,

        /// The server message.
        message: String,
    },

    /// Any other failure talking to the API server.
    #[error("failed to list {kind}: {message}")]
    Transport {
        /// The workload kind.
        kind: String,

        /// The error message.
        message: String,
    },
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CgscopeError {
    /// Wraps an ad hoc error, keeping its context chain.
    pub fn custom(error: impl Into<anyhow::Error>) -> CgscopeError {
        CgscopeError::Custom(AnyError {
            error: error.into(),
        })
    }
}

impl ListError {
    /// Classifies a kube client error raised while listing `kind`.
    pub fn from_kube(kind: impl Into<String>, error: &kube::Error) -> Self {
        let kind = kind.into();
        match error {
            kube::Error::Api(response) if response.code == 404 => {
                ListError::KindUnavailable { kind }
            }
            kube::Error::Api(response) if response.code == 401 || response.code == 403 => {
                ListError::Forbidden {
                    kind,
                    message: response.message.clone(),
                }
            }
            other => ListError::Transport {
                kind,
                message: other.to_string(),
            },
        }
    }

    /// Returns true if the kind is simply not served by the cluster.
    pub fn is_kind_unavailable(&self) -> bool {
        matches!(self, ListError::KindUnavailable { .. })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
