//! The uniform contract implemented by every backend adapter.
//!
//! A [`FeatureStore`] persists features for the layers it claims through
//! [`FeatureStore::supports_layer`]. Implementations open their medium on
//! every call and keep no state between calls, so the medium stays the
//! single source of truth even when edited externally.

use std::sync::Arc;

use crate::{Attribute, Feature, FeatureGeometry, FeatureId, FeatureStoreError, PreconditionViolation};

/// CRUD access to the features of one storage medium.
///
/// Callers serialise mutations per layer; see [`crate::LayerRouter`].
pub trait FeatureStore: Send + Sync {
    /// Short backend name used in logs, for example `"shapefile"`.
    fn backend(&self) -> &'static str;

    /// Whether this store holds `layer`. Empty names are never supported.
    fn supports_layer(&self, layer: &str) -> bool;

    /// Persist `feature` and return its new identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureStoreError::BrokenFeature`] when the geometry is
    /// missing, empty, in a foreign CRS or of an incoherent kind, and the
    /// data source or configuration variants when the medium is unusable.
    fn create_feature(&self, feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError>;

    /// Reconstruct the feature stored under `id`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns the data source or configuration variants when the medium is
    /// unusable.
    fn get_feature_by_id(&self, id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError>;

    /// Overwrite the matching attributes of feature `id`.
    ///
    /// An empty slice is a no-op. Attributes naming unknown fields or with
    /// incompatible types are skipped. An unknown `id` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the data source or configuration variants when the medium is
    /// unusable.
    fn update_feature_attributes(
        &self,
        id: FeatureId,
        attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError>;

    /// Replace the geometry of feature `id`. An unknown `id` is a no-op.
    ///
    /// # Errors
    ///
    /// Applies the same geometry checks as
    /// [`FeatureStore::create_feature`].
    fn update_feature_geometry(
        &self,
        id: FeatureId,
        geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError>;

    /// Remove feature `id`. An unknown `id` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the data source or configuration variants when the medium is
    /// unusable.
    fn delete_feature(&self, id: FeatureId, layer: &str) -> Result<(), FeatureStoreError>;
}

impl<S> FeatureStore for Arc<S>
where
    S: FeatureStore + ?Sized,
{
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn supports_layer(&self, layer: &str) -> bool {
        (**self).supports_layer(layer)
    }

    fn create_feature(&self, feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError> {
        (**self).create_feature(feature, layer)
    }

    fn get_feature_by_id(&self, id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError> {
        (**self).get_feature_by_id(id, layer)
    }

    fn update_feature_attributes(
        &self,
        id: FeatureId,
        attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        (**self).update_feature_attributes(id, attributes, layer)
    }

    fn update_feature_geometry(
        &self,
        id: FeatureId,
        geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        (**self).update_feature_geometry(id, geometry, layer)
    }

    fn delete_feature(&self, id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        (**self).delete_feature(id, layer)
    }
}

/// Check that `layer` names exactly one layer directory.
///
/// Empty names, `.`, `..` and names containing path separators or NUL are
/// rejected.
///
/// # Errors
///
/// Returns the matching [`PreconditionViolation`].
pub fn validate_layer_name(layer: &str) -> Result<(), PreconditionViolation> {
    if layer.is_empty() {
        return Err(PreconditionViolation::EmptyLayerName);
    }
    let escapes = matches!(layer, "." | "..")
        || layer.contains(['/', '\\', '\0']);
    if escapes {
        return Err(PreconditionViolation::InvalidLayerName {
            name: layer.to_owned(),
        });
    }
    Ok(())
}
