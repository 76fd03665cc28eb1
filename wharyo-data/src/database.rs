//! Database-backed layers.
//!
//! Only layer ownership is resolved here: a layer belongs to the database
//! when the layer registry lists it with the `DATABASE` tag. Feature access
//! for such layers is not available yet, so every CRUD call reports the
//! layer as unsupported.

use log::debug;
use wharyo_core::{
    Attribute, Feature, FeatureGeometry, FeatureId, FeatureStore, FeatureStoreError,
    validate_layer_name,
};

use crate::layer_config::{BackendType, LayerConfig};

/// Adapter for layers registered under the `DATABASE` backend tag.
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    config: LayerConfig,
}

impl DatabaseStore {
    /// Resolve layer ownership through `config`.
    #[must_use]
    pub const fn new(config: LayerConfig) -> Self {
        Self { config }
    }

    /// Registry consulted by [`FeatureStore::supports_layer`].
    #[must_use]
    pub const fn config(&self) -> &LayerConfig {
        &self.config
    }

    fn unsupported<T>(layer: &str, operation: &str) -> Result<T, FeatureStoreError> {
        validate_layer_name(layer)?;
        debug!("database layer {layer:?} cannot serve {operation}");
        Err(FeatureStoreError::layer_not_supported(layer))
    }
}

impl FeatureStore for DatabaseStore {
    fn backend(&self) -> &'static str {
        "database"
    }

    fn supports_layer(&self, layer: &str) -> bool {
        validate_layer_name(layer).is_ok() && self.config.claims(layer, BackendType::Database)
    }

    fn create_feature(&self, _feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError> {
        Self::unsupported(layer, "create")
    }

    fn get_feature_by_id(&self, _id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError> {
        Self::unsupported(layer, "read")
    }

    fn update_feature_attributes(
        &self,
        _id: FeatureId,
        _attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        Self::unsupported(layer, "attribute update")
    }

    fn update_feature_geometry(
        &self,
        _id: FeatureId,
        _geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        Self::unsupported(layer, "geometry update")
    }

    fn delete_feature(&self, _id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        Self::unsupported(layer, "delete")
    }
}
