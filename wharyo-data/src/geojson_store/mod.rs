//! GeoJSON-backed layers.
//!
//! A layer named `parcels` is the document `<home>/parcels/parcels.geojson`.
//! Each call reads and parses the document; mutations stage a rewritten
//! copy and commit it by rename.

mod document;

use camino::{Utf8Path, Utf8PathBuf};
use geojson::{JsonObject, feature::Id};
use log::{debug, warn};
use serde_json::{Number, Value};
use wharyo_core::{
    Attribute, ConfigurationBrokenReason, Feature, FeatureGeometry, FeatureId, FeatureStore,
    FeatureStoreError, SchemaDescriptor, next_feature_id, require_geometry, validate_layer_name,
};
use wharyo_fs::LayerTransaction;

use self::document::LayerDocument;
use crate::{
    io_error::{ensure_writable, io_failure},
    layer_config::{BackendType, LayerConfig},
};

const EXTENSION: &str = "geojson";

/// Adapter for layers stored as GeoJSON feature collections.
#[derive(Debug, Clone)]
pub struct GeoJsonStore {
    home: Utf8PathBuf,
    layer_config: Option<LayerConfig>,
}

impl GeoJsonStore {
    /// Serve layers found beneath `home`.
    #[must_use]
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self {
            home: home.into(),
            layer_config: None,
        }
    }

    /// Additionally require layers to be registered under `GEOJSON`.
    #[must_use]
    pub fn with_layer_config(mut self, config: LayerConfig) -> Self {
        self.layer_config = Some(config);
        self
    }

    /// Directory holding one sub-directory per layer.
    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    fn layer_dir(&self, layer: &str) -> Utf8PathBuf {
        wharyo_fs::layer_dir(&self.home, layer)
    }

    fn file_name(layer: &str) -> String {
        format!("{layer}.{EXTENSION}")
    }

    fn load(&self, layer: &str) -> Result<LayerDocument, FeatureStoreError> {
        let path = self.layer_dir(layer).join(Self::file_name(layer));
        let text = wharyo_fs::read_to_string(&path).map_err(|err| io_failure(layer, err))?;
        LayerDocument::parse(&text, layer)
    }

    fn save(&self, document: LayerDocument, layer: &str) -> Result<(), FeatureStoreError> {
        let dir = self.layer_dir(layer);
        let target = Self::file_name(layer);
        ensure_writable(layer, [dir.join(&target).as_path()])?;
        let bytes = document.render().map_err(|err| {
            FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::NoAttributeMetadata,
                err.to_string(),
            )
        })?;
        let mut transaction = LayerTransaction::begin(&dir).map_err(|err| io_failure(layer, err))?;
        if let Err(err) = transaction.write(&target, &bytes) {
            if let Err(release) = transaction.rollback() {
                warn!("failed to roll back write to layer {layer:?}: {release}");
            }
            return Err(io_failure(layer, err));
        }
        transaction.commit().map_err(|err| io_failure(layer, err))
    }
}

fn ids(document: &LayerDocument, layer: &str) -> Result<Vec<FeatureId>, FeatureStoreError> {
    document.schema.require_identifier(layer)?;
    document
        .collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            document::feature_id(feature.id.as_ref()).ok_or_else(|| {
                log::error!("feature {index} of layer {layer:?} has no usable id");
                FeatureStoreError::broken_configuration(
                    layer,
                    ConfigurationBrokenReason::InvalidIdField,
                    format!("feature {index} has no usable id"),
                )
            })
        })
        .collect()
}

fn position(
    document: &LayerDocument,
    id: FeatureId,
    layer: &str,
) -> Result<Option<usize>, FeatureStoreError> {
    Ok(ids(document, layer)?
        .iter()
        .position(|candidate| *candidate == id))
}

fn write_properties(
    schema: &SchemaDescriptor,
    properties: &mut JsonObject,
    attributes: &[Attribute],
) -> usize {
    let mut written = 0;
    for (field, attribute) in schema.writable_attributes(attributes) {
        match document::encode(attribute.value(), field.field_type()) {
            Some(value) => {
                properties.insert(field.name().to_owned(), value);
                written += 1;
            }
            None => debug!(
                "skipping attribute {:?}: value has no JSON form",
                attribute.name()
            ),
        }
    }
    written
}

fn geojson_geometry(geometry: &FeatureGeometry) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry.geometry()))
}

fn to_feature(document: &LayerDocument, stored: &geojson::Feature, id: FeatureId) -> Feature {
    let geometry = stored.geometry.as_ref().and_then(|geometry| {
        match geo::Geometry::<f64>::try_from(geometry.value.clone()) {
            Ok(converted) => {
                let mut geometry = FeatureGeometry::new(converted);
                geometry.set_srid(document.schema.crs());
                Some(geometry)
            }
            Err(err) => {
                warn!("feature {id} holds an unreadable geometry: {err}");
                None
            }
        }
    });
    let empty = JsonObject::new();
    let properties = stored.properties.as_ref().unwrap_or(&empty);
    let attributes = document.schema.attribute_fields().filter_map(|field| {
        let declared = field.field_type().attribute_type()?;
        let mut attribute = Attribute::new(field.name(), declared).ok()?;
        attribute.set_value(
            document::property(properties, field.name())
                .and_then(|value| document::decode(value, field.field_type(), field.name())),
        );
        Some(attribute)
    });
    let mut feature = Feature::from_parts(geometry, attributes);
    feature.set_id(id);
    feature
}

impl FeatureStore for GeoJsonStore {
    fn backend(&self) -> &'static str {
        "geojson"
    }

    fn supports_layer(&self, layer: &str) -> bool {
        if validate_layer_name(layer).is_err() {
            return false;
        }
        let dir = self.layer_dir(layer);
        let present = wharyo_fs::dir_is_dir(&dir).unwrap_or_else(|err| {
            debug!("cannot probe {dir}: {err}");
            false
        });
        present
            && self
                .layer_config
                .as_ref()
                .is_none_or(|config| config.claims(layer, BackendType::GeoJson))
    }

    fn create_feature(&self, feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError> {
        validate_layer_name(layer)?;
        let geometry = require_geometry(feature.geometry(), layer)?;
        let mut document = self.load(layer)?;
        let existing = ids(&document, layer)?;
        document.schema.check_geometry(Some(geometry), layer)?;
        let id = next_feature_id(existing).ok_or_else(|| {
            FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::InvalidIdField,
                "identifier values are exhausted",
            )
        })?;

        let mut properties: JsonObject = document
            .schema
            .attribute_fields()
            .map(|field| (field.name().to_owned(), Value::Null))
            .collect();
        write_properties(&document.schema, &mut properties, feature.attributes());
        document.collection.features.push(geojson::Feature {
            bbox: None,
            geometry: Some(geojson_geometry(geometry)),
            id: Some(Id::Number(Number::from(id))),
            properties: Some(properties),
            foreign_members: None,
        });
        self.save(document, layer)?;
        Ok(id)
    }

    fn get_feature_by_id(&self, id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError> {
        validate_layer_name(layer)?;
        let document = self.load(layer)?;
        let found = position(&document, id, layer)?;
        Ok(found
            .and_then(|index| document.collection.features.get(index))
            .map(|stored| to_feature(&document, stored, id)))
    }

    fn update_feature_attributes(
        &self,
        id: FeatureId,
        attributes: &[Attribute],
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        if attributes.is_empty() {
            return Ok(());
        }
        let mut document = self.load(layer)?;
        let Some(index) = position(&document, id, layer)? else {
            debug!("no feature {id} in layer {layer:?}; nothing to update");
            return Ok(());
        };
        let Some(stored) = document.collection.features.get_mut(index) else {
            return Ok(());
        };
        let properties = stored.properties.get_or_insert_with(JsonObject::new);
        if write_properties(&document.schema, properties, attributes) == 0 {
            debug!("no attribute fits layer {layer:?}; leaving feature {id} untouched");
            return Ok(());
        }
        self.save(document, layer)
    }

    fn update_feature_geometry(
        &self,
        id: FeatureId,
        geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        require_geometry(Some(geometry), layer)?;
        let mut document = self.load(layer)?;
        document.schema.check_geometry(Some(geometry), layer)?;
        let Some(index) = position(&document, id, layer)? else {
            debug!("no feature {id} in layer {layer:?}; nothing to update");
            return Ok(());
        };
        if let Some(stored) = document.collection.features.get_mut(index) {
            stored.geometry = Some(geojson_geometry(geometry));
        }
        self.save(document, layer)
    }

    fn delete_feature(&self, id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        let mut document = self.load(layer)?;
        let Some(index) = position(&document, id, layer)? else {
            debug!("no feature {id} in layer {layer:?}; nothing to delete");
            return Ok(());
        };
        document.collection.features.remove(index);
        self.save(document, layer)
    }
}
