//! Placeholder adapter for layers served over WFS.
//!
//! No transport exists yet, so the adapter claims no layers and rejects
//! every operation with [`FeatureStoreError::LayerNotSupported`].

use log::debug;
use wharyo_core::{
    Attribute, Feature, FeatureGeometry, FeatureId, FeatureStore, FeatureStoreError,
    validate_layer_name,
};

/// WFS adapter stub.
#[derive(Debug, Clone, Copy, Default)]
pub struct WfsStore;

impl WfsStore {
    /// Create the stub.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn not_served<T>(layer: &str) -> Result<T, FeatureStoreError> {
    validate_layer_name(layer)?;
    debug!("WFS adapter does not serve layer {layer:?}");
    Err(FeatureStoreError::layer_not_supported(layer))
}

impl FeatureStore for WfsStore {
    fn backend(&self) -> &'static str {
        "wfs"
    }

    fn supports_layer(&self, _layer: &str) -> bool {
        false
    }

    fn create_feature(&self, _feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError> {
        not_served(layer)
    }

    fn get_feature_by_id(&self, _id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError> {
        not_served(layer)
    }

    fn update_feature_attributes(
        &self,
        _id: FeatureId,
        _attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        not_served(layer)
    }

    fn update_feature_geometry(
        &self,
        _id: FeatureId,
        _geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        not_served(layer)
    }

    fn delete_feature(&self, _id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        not_served(layer)
    }
}
