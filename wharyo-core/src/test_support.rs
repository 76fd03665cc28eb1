//! Test-only utilities: an in-memory [`FeatureStore`].
//!
//! [`MemoryFeatureStore`] applies the same schema reconciliation as the
//! file adapters without touching disk, which keeps router and service tests
//! quick and deterministic.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, PoisonError},
};

use crate::{
    Attribute, AttributeValue, Feature, FeatureGeometry, FeatureId, FeatureStore,
    FeatureStoreError, SchemaDescriptor, next_feature_id, schema::ID_FIELD,
};

#[derive(Debug, Clone, Default)]
struct MemoryLayer {
    schema: SchemaDescriptor,
    rows: BTreeMap<FeatureId, MemoryRow>,
}

#[derive(Debug, Clone, Default)]
struct MemoryRow {
    geometry: Option<FeatureGeometry>,
    values: HashMap<String, AttributeValue>,
}

/// Simple in-memory feature store keyed by layer name.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    layers: Mutex<HashMap<String, MemoryLayer>>,
}

impl MemoryFeatureStore {
    /// A store without layers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty layer with the given schema.
    #[must_use]
    pub fn with_layer(self, layer: &str, schema: SchemaDescriptor) -> Self {
        self.layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                layer.to_owned(),
                MemoryLayer {
                    schema,
                    rows: BTreeMap::new(),
                },
            );
        self
    }

    /// Number of features stored in `layer`.
    #[must_use]
    pub fn feature_count(&self, layer: &str) -> usize {
        self.layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(layer)
            .map_or(0, |stored| stored.rows.len())
    }

    fn with_layer_mut<T>(
        &self,
        layer: &str,
        operation: impl FnOnce(&mut MemoryLayer) -> Result<T, FeatureStoreError>,
    ) -> Result<T, FeatureStoreError> {
        let mut layers = self.layers.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = layers
            .get_mut(layer)
            .ok_or_else(|| FeatureStoreError::layer_not_supported(layer))?;
        stored.schema.require_identifier(layer)?;
        operation(stored)
    }
}

fn write_values(schema: &SchemaDescriptor, row: &mut MemoryRow, attributes: &[Attribute]) {
    for (field, attribute) in schema.writable_attributes(attributes) {
        match attribute.value() {
            Some(value) => row.values.insert(field.name().to_owned(), value.clone()),
            None => row.values.remove(field.name()),
        };
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn supports_layer(&self, layer: &str) -> bool {
        !layer.is_empty()
            && self
                .layers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(layer)
    }

    fn create_feature(&self, feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError> {
        self.with_layer_mut(layer, |stored| {
            stored.schema.check_geometry(feature.geometry(), layer)?;
            let id = next_feature_id(stored.rows.keys().copied()).ok_or_else(|| {
                FeatureStoreError::broken_configuration(
                    layer,
                    crate::ConfigurationBrokenReason::InvalidIdField,
                    format!("{ID_FIELD:?} values are exhausted"),
                )
            })?;
            let mut row = MemoryRow {
                geometry: feature.geometry().cloned(),
                values: HashMap::new(),
            };
            write_values(&stored.schema, &mut row, feature.attributes());
            stored.rows.insert(id, row);
            Ok(id)
        })
    }

    fn get_feature_by_id(&self, id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError> {
        self.with_layer_mut(layer, |stored| {
            let Some(row) = stored.rows.get(&id) else {
                return Ok(None);
            };
            let mut feature = Feature::from_parts(
                row.geometry.clone(),
                stored.schema.attribute_fields().filter_map(|field| {
                    let declared = field.field_type().attribute_type()?;
                    let mut attribute = Attribute::new(field.name(), declared).ok()?;
                    attribute.set_value(row.values.get(field.name()).cloned());
                    Some(attribute)
                }),
            );
            feature.set_id(id);
            Ok(Some(feature))
        })
    }

    fn update_feature_attributes(
        &self,
        id: FeatureId,
        attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        if attributes.is_empty() {
            return Ok(());
        }
        self.with_layer_mut(layer, |stored| {
            if let Some(row) = stored.rows.get_mut(&id) {
                write_values(&stored.schema, row, attributes);
            }
            Ok(())
        })
    }

    fn update_feature_geometry(
        &self,
        id: FeatureId,
        geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        self.with_layer_mut(layer, |stored| {
            stored.schema.check_geometry(Some(geometry), layer)?;
            if let Some(row) = stored.rows.get_mut(&id) {
                row.geometry = Some(geometry.clone());
            }
            Ok(())
        })
    }

    fn delete_feature(&self, id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        self.with_layer_mut(layer, |stored| {
            stored.rows.remove(&id);
            Ok(())
        })
    }
}
