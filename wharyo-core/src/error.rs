//! Error taxonomy shared by every feature store backend.
//!
//! Callers match on [`FeatureStoreError`] to decide whether a failure stems
//! from their own input, from an unreachable or read-only data source, or
//! from a layer whose on-disk configuration cannot be trusted.

use std::{error::Error as StdError, fmt};

use thiserror::Error;

use crate::{GeometryKind, UnsupportedAttributeType};

/// Boxed error carried as the cause of a data source failure.
pub type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Why a layer's data source cannot currently be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSourceUnavailableReason {
    /// The backing store could not be opened, read or written.
    ConnectionUnavailable,
    /// The backing store exists but does not accept writes.
    ReadOnlyAccess,
}

impl fmt::Display for DataSourceUnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConnectionUnavailable => "connection unavailable",
            Self::ReadOnlyAccess => "read-only access",
        })
    }
}

/// Why a layer's metadata is considered broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigurationBrokenReason {
    /// The identifier field is missing or holds values that are not
    /// non-negative integers.
    InvalidIdField,
    /// The attribute table or its field descriptions cannot be read.
    NoAttributeMetadata,
    /// The layer declares no usable geometry type.
    NoGeometryMetadata,
}

impl fmt::Display for ConfigurationBrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidIdField => "invalid id field",
            Self::NoAttributeMetadata => "no attribute metadata",
            Self::NoGeometryMetadata => "no geometry metadata",
        })
    }
}

/// Caller input that is rejected before any backend is consulted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionViolation {
    /// The layer name was empty.
    #[error("layer name must not be empty")]
    EmptyLayerName,
    /// The layer name cannot address a single layer.
    #[error("layer name {name:?} must be a single path segment")]
    InvalidLayerName {
        /// The rejected layer name.
        name: String,
    },
    /// An attribute was constructed without a name.
    #[error("attribute name must not be empty")]
    EmptyAttributeName,
}

/// Why a feature cannot be stored in a layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokenFeatureReason {
    /// The feature carries no geometry.
    #[error("feature has no geometry")]
    MissingGeometry,
    /// The feature geometry contains no coordinates.
    #[error("feature geometry is empty")]
    EmptyGeometry,
    /// The feature geometry is expressed in a different CRS.
    #[error("feature CRS EPSG:{feature} differs from layer CRS EPSG:{layer}")]
    CrsMismatch {
        /// SRID attached to the feature geometry.
        feature: u32,
        /// SRID declared by the layer.
        layer: u32,
    },
    /// The geometry kind is not coherent with the layer's declared kind.
    #[error("geometry kind {found} does not fit layer geometry kind {declared}")]
    GeometryKindMismatch {
        /// Kind of the supplied geometry.
        found: GeometryKind,
        /// Kind declared by the layer.
        declared: GeometryKind,
    },
    /// The geometry is coherent but the storage medium cannot encode it.
    #[error("geometry cannot be encoded by the layer: {detail}")]
    UnrepresentableGeometry {
        /// Description of the encoding limitation.
        detail: String,
    },
}

/// Errors raised by feature stores, the layer router and the service.
#[derive(Debug, Error)]
pub enum FeatureStoreError {
    /// Caller input was rejected before reaching a backend.
    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),
    /// No registered backend claims the layer.
    #[error("no backend supports layer {layer:?}")]
    LayerNotSupported {
        /// Name of the unclaimed layer.
        layer: String,
    },
    /// The layer's data source cannot be used.
    #[error("data source for layer {layer:?} is unavailable: {reason}")]
    DataSourceUnavailable {
        /// Name of the affected layer.
        layer: String,
        /// Classification of the failure.
        reason: DataSourceUnavailableReason,
        /// Underlying error, when one was reported.
        #[source]
        source: Option<BoxedSource>,
    },
    /// The layer's metadata is broken.
    #[error("configuration of layer {layer:?} is broken ({reason}): {detail}")]
    ConfigurationBroken {
        /// Name of the affected layer.
        layer: String,
        /// Classification of the breakage.
        reason: ConfigurationBrokenReason,
        /// Human-readable description of what was found.
        detail: String,
    },
    /// The supplied feature cannot be stored in the layer.
    #[error("feature rejected by layer {layer:?}: {reason}")]
    BrokenFeature {
        /// Name of the target layer.
        layer: String,
        /// Why the feature was rejected.
        reason: BrokenFeatureReason,
    },
    /// A dynamic value could not be classified as an attribute type.
    #[error(transparent)]
    UnsupportedAttributeType(#[from] UnsupportedAttributeType),
}

impl FeatureStoreError {
    /// Build a [`FeatureStoreError::LayerNotSupported`] for `layer`.
    #[must_use]
    pub fn layer_not_supported(layer: &str) -> Self {
        Self::LayerNotSupported {
            layer: layer.to_owned(),
        }
    }

    /// Build a [`FeatureStoreError::DataSourceUnavailable`] with an optional
    /// underlying cause.
    #[must_use]
    pub fn unavailable(
        layer: &str,
        reason: DataSourceUnavailableReason,
        source: Option<BoxedSource>,
    ) -> Self {
        Self::DataSourceUnavailable {
            layer: layer.to_owned(),
            reason,
            source,
        }
    }

    /// Build a [`DataSourceUnavailableReason::ConnectionUnavailable`] error
    /// wrapping `source`.
    #[must_use]
    pub fn connection<E>(layer: &str, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        Self::unavailable(
            layer,
            DataSourceUnavailableReason::ConnectionUnavailable,
            Some(source.into()),
        )
    }

    /// Build a [`FeatureStoreError::ConfigurationBroken`].
    #[must_use]
    pub fn broken_configuration(
        layer: &str,
        reason: ConfigurationBrokenReason,
        detail: impl Into<String>,
    ) -> Self {
        Self::ConfigurationBroken {
            layer: layer.to_owned(),
            reason,
            detail: detail.into(),
        }
    }

    /// Build a [`FeatureStoreError::BrokenFeature`].
    #[must_use]
    pub fn broken_feature(layer: &str, reason: BrokenFeatureReason) -> Self {
        Self::BrokenFeature {
            layer: layer.to_owned(),
            reason,
        }
    }

    /// Return the data source reason when this is an availability failure.
    #[must_use]
    pub const fn unavailable_reason(&self) -> Option<DataSourceUnavailableReason> {
        match self {
            Self::DataSourceUnavailable { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Return the configuration reason when this is a broken layer.
    #[must_use]
    pub const fn configuration_reason(&self) -> Option<ConfigurationBrokenReason> {
        match self {
            Self::ConfigurationBroken { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
