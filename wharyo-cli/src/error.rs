//! Error types emitted by the Wharyo CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use wharyo_core::{FeatureId, FeatureStoreError, GeometryParseError};

/// Errors emitted by the Wharyo CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name of the option.
        field: &'static str,
        /// Environment variable that may supply it.
        env: &'static str,
    },
    /// A configured source path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSource {
        /// Flag name of the option.
        field: &'static str,
        /// Path that was configured.
        path: Utf8PathBuf,
    },
    /// A configured source path exists but has the wrong kind.
    #[error("{field} path {path:?} is not a {expected}")]
    SourceKind {
        /// Flag name of the option.
        field: &'static str,
        /// Path that was configured.
        path: Utf8PathBuf,
        /// `file` or `directory`.
        expected: &'static str,
    },
    /// A configured source path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSource {
        /// Flag name of the option.
        field: &'static str,
        /// Path that was configured.
        path: Utf8PathBuf,
        /// Source error from the filesystem.
        #[source]
        source: std::io::Error,
    },
    /// The geometry option did not hold valid WKT or EWKT.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(#[source] GeometryParseError),
    /// The attributes option did not hold a JSON object.
    #[error("attributes must be a JSON object: {0}")]
    InvalidAttributes(#[source] serde_json::Error),
    /// The feature store rejected the operation.
    #[error(transparent)]
    Store(#[from] FeatureStoreError),
    /// No feature has the requested identifier.
    #[error("layer {layer:?} holds no feature {id}")]
    FeatureNotFound {
        /// Requested identifier.
        id: FeatureId,
        /// Layer that was searched.
        layer: String,
    },
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
    /// The log subscriber could not be installed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),
}
