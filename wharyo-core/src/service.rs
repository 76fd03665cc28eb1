//! The entry point used by callers.

use crate::{
    Attribute, Feature, FeatureGeometry, FeatureId, FeatureStore, FeatureStoreError, LayerRouter,
    validate_layer_name,
};

/// Routes feature operations to the adapter serving each layer.
///
/// Layer names are validated before any adapter is consulted, and a layer
/// no adapter claims fails with [`FeatureStoreError::LayerNotSupported`].
/// Adapter results are returned unchanged.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use wharyo_core::{
///     Attribute, FeatureGeometry, FeatureService, FieldType, GeometryKind, LayerRouter,
///     SchemaDescriptor, SchemaField, test_support::MemoryFeatureStore,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = SchemaDescriptor::new(
///     vec![
///         SchemaField::new("geom", FieldType::Geometry(GeometryKind::Point)),
///         SchemaField::new("id", FieldType::Long),
///         SchemaField::new("name", FieldType::String),
///     ],
///     None,
/// );
/// let store = MemoryFeatureStore::new().with_layer("wells", schema);
/// let service = FeatureService::new(LayerRouter::new().with_store(store));
///
/// let id = service.create_feature(
///     [Attribute::with_value("name", "north")?],
///     Some(FeatureGeometry::new(Point::new(1.0, 2.0))),
///     "wells",
/// )?;
/// let feature = service.get_feature(id, "wells")?.ok_or("feature missing")?;
/// assert_eq!(feature.id(), Some(id));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FeatureService {
    router: LayerRouter,
}

impl FeatureService {
    /// Wrap a configured router.
    #[must_use]
    pub const fn new(router: LayerRouter) -> Self {
        Self { router }
    }

    /// The underlying router.
    #[must_use]
    pub const fn router(&self) -> &LayerRouter {
        &self.router
    }

    /// Build a feature from `attributes` and `geometry` and persist it.
    ///
    /// Attributes repeating an earlier name are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureStoreError::Precondition`] for an invalid layer
    /// name, [`FeatureStoreError::LayerNotSupported`] when no adapter claims
    /// the layer, and otherwise whatever the adapter reports.
    pub fn create_feature(
        &self,
        attributes: impl IntoIterator<Item = Attribute>,
        geometry: Option<FeatureGeometry>,
        layer: &str,
    ) -> Result<FeatureId, FeatureStoreError> {
        validate_layer_name(layer)?;
        let feature = Feature::from_parts(geometry, attributes);
        self.mutate(layer, |store| store.create_feature(&feature, layer))
    }

    /// Fetch a feature by identifier.
    ///
    /// # Errors
    ///
    /// As for [`FeatureService::create_feature`].
    pub fn get_feature(
        &self,
        id: FeatureId,
        layer: &str,
    ) -> Result<Option<Feature>, FeatureStoreError> {
        validate_layer_name(layer)?;
        self.router
            .read(layer, |store| store.get_feature_by_id(id, layer))
            .unwrap_or_else(|| Err(FeatureStoreError::layer_not_supported(layer)))
    }

    /// Overwrite matching attributes of a feature.
    ///
    /// # Errors
    ///
    /// As for [`FeatureService::create_feature`].
    pub fn update_feature_attributes(
        &self,
        id: FeatureId,
        attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        self.mutate(layer, |store| {
            store.update_feature_attributes(id, attributes, layer)
        })
    }

    /// Replace the geometry of a feature.
    ///
    /// # Errors
    ///
    /// As for [`FeatureService::create_feature`].
    pub fn update_feature_geometry(
        &self,
        id: FeatureId,
        geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        self.mutate(layer, |store| store.update_feature_geometry(id, geometry, layer))
    }

    /// Remove a feature.
    ///
    /// # Errors
    ///
    /// As for [`FeatureService::create_feature`].
    pub fn delete_feature(&self, id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        self.mutate(layer, |store| store.delete_feature(id, layer))
    }

    fn mutate<T, F>(&self, layer: &str, operation: F) -> Result<T, FeatureStoreError>
    where
        F: FnOnce(&dyn FeatureStore) -> Result<T, FeatureStoreError>,
    {
        self.router
            .write(layer, operation)
            .unwrap_or_else(|| Err(FeatureStoreError::layer_not_supported(layer)))
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Point};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        AttributeValue, FieldType, GeometryKind, PreconditionViolation, SchemaDescriptor,
        SchemaField, test_support::MemoryFeatureStore,
    };

    #[fixture]
    fn service() -> FeatureService {
        let schema = SchemaDescriptor::new(
            vec![
                SchemaField::new("geom", FieldType::Geometry(GeometryKind::LineString)),
                SchemaField::new("id", FieldType::Long),
                SchemaField::new("name", FieldType::String),
            ],
            Some(2180),
        );
        let store = MemoryFeatureStore::new().with_layer("roads", schema);
        FeatureService::new(LayerRouter::new().with_store(store))
    }

    fn road() -> Option<FeatureGeometry> {
        Some(FeatureGeometry::new(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])).with_srid(2180))
    }

    #[rstest]
    fn unknown_layer_is_not_supported(service: FeatureService) {
        let err = service
            .create_feature(Vec::new(), road(), "rivers")
            .expect_err("nothing serves rivers");
        assert!(matches!(err, FeatureStoreError::LayerNotSupported { layer } if layer == "rivers"));
        assert!(matches!(
            service.get_feature(1, "rivers"),
            Err(FeatureStoreError::LayerNotSupported { .. })
        ));
    }

    #[rstest]
    fn empty_layer_name_fails_before_routing(service: FeatureService) {
        let err = service
            .create_feature(Vec::new(), road(), "")
            .expect_err("empty name");
        assert!(matches!(
            err,
            FeatureStoreError::Precondition(PreconditionViolation::EmptyLayerName)
        ));
    }

    #[rstest]
    fn point_is_rejected_by_line_layer(service: FeatureService) {
        let point = Some(FeatureGeometry::new(Point::new(0.0, 0.0)));
        let err = service
            .create_feature(Vec::new(), point, "roads")
            .expect_err("kind mismatch");
        assert!(matches!(err, FeatureStoreError::BrokenFeature { .. }));
    }

    #[rstest]
    fn full_lifecycle(service: FeatureService) {
        let id = service
            .create_feature(
                [Attribute::with_value("name", "A1").expect("valid")],
                road(),
                "roads",
            )
            .expect("create succeeds");
        service
            .update_feature_attributes(
                id,
                &[Attribute::with_value("name", "A2").expect("valid")],
                "roads",
            )
            .expect("update succeeds");
        let fetched = service
            .get_feature(id, "roads")
            .expect("read succeeds")
            .expect("feature exists");
        assert_eq!(
            fetched.attribute("name").and_then(Attribute::value),
            Some(&AttributeValue::Text("A2".into()))
        );
        service.delete_feature(id, "roads").expect("delete succeeds");
        assert!(service.get_feature(id, "roads").expect("read succeeds").is_none());
    }
}
