//! Shapefile-backed layers.
//!
//! A layer named `roads` lives in `<home>/roads/` as `roads.shp`,
//! `roads.shx`, `roads.dbf` and, optionally, `roads.prj`. Every call reads
//! the schema afresh from the shape header, the dBase field descriptors and
//! the projection file. Mutations rewrite the shape, index and table files
//! into staged copies and commit them together by rename.

mod dbf;
mod shapes;

use std::io::{Seek, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, error, warn};
use shapefile::{
    Shape, ShapeReader, ShapeType,
    dbase::{self, Record, TableInfo, TableWriterBuilder},
};
use wharyo_core::{
    Attribute, BrokenFeatureReason, ConfigurationBrokenReason, Feature, FeatureGeometry,
    FeatureId, FeatureStore, FeatureStoreError, FieldType, SchemaDescriptor, SchemaField,
    next_feature_id, require_geometry, validate_layer_name,
};
use wharyo_fs::LayerTransaction;

use self::dbf::DbfField;
use crate::{
    io_error::{ensure_writable, io_failure},
    layer_config::{BackendType, LayerConfig},
};

const GEOMETRY_FIELD: &str = "the_geom";

/// Adapter for layers stored as ESRI shapefiles beneath a home directory.
///
/// # Examples
///
/// ```no_run
/// use wharyo_core::FeatureStore;
/// use wharyo_data::ShapefileStore;
///
/// let store = ShapefileStore::new("/srv/layers/shapefiles");
/// if store.supports_layer("parcels") {
///     let feature = store.get_feature_by_id(1, "parcels");
///     println!("{feature:?}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShapefileStore {
    home: Utf8PathBuf,
    layer_config: Option<LayerConfig>,
}

impl ShapefileStore {
    /// Serve layers found beneath `home`.
    #[must_use]
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self {
            home: home.into(),
            layer_config: None,
        }
    }

    /// Additionally require layers to be registered under `SHAPEFILE`.
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

    fn load(&self, layer: &str) -> Result<LoadedLayer, FeatureStoreError> {
        let files = LayerFiles::new(&self.home, layer);
        let shp = files.path("shp");
        if !exists(layer, &shp)? {
            error!("shapefile {shp} does not exist");
            return Err(FeatureStoreError::connection(
                layer,
                format!("{shp} does not exist"),
            ));
        }
        let dbf = files.path("dbf");
        if !exists(layer, &dbf)? {
            return Err(missing_attributes(layer, format!("{dbf} does not exist")));
        }

        let reader = ShapeReader::from_path(shp.as_std_path())
            .map_err(|err| shapefile_failure(layer, err))?;
        let shape_type = reader.header().shape_type;
        let Some(kind) = shapes::declared_kind(shape_type) else {
            error!("shapefile {shp} declares unsupported shape type {shape_type:?}");
            return Err(FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::NoGeometryMetadata,
                format!("shape type {shape_type:?} is not supported"),
            ));
        };
        let shapes = reader.read().map_err(|err| shapefile_failure(layer, err))?;

        let header = wharyo_fs::read(&dbf).map_err(|err| io_failure(layer, err))?;
        let fields =
            dbf::parse_fields(&header).map_err(|err| missing_attributes(layer, err.to_string()))?;
        let mut table = dbase::Reader::from_path(dbf.as_std_path())
            .map_err(|err| missing_attributes(layer, err.to_string()))?;
        let records = table
            .iter_records()
            .collect::<Result<Vec<Record>, _>>()
            .map_err(|err| missing_attributes(layer, err.to_string()))?;
        let table_info = table.into_table_info();
        if records.len() != shapes.len() {
            return Err(missing_attributes(
                layer,
                format!(
                    "{} shapes but {} attribute records",
                    shapes.len(),
                    records.len()
                ),
            ));
        }

        let schema_fields = std::iter::once(SchemaField::new(
            GEOMETRY_FIELD,
            FieldType::Geometry(kind),
        ))
        .chain(
            fields
                .iter()
                .map(|field| SchemaField::new(field.name(), field.field_type())),
        )
        .collect();
        let schema = SchemaDescriptor::new(schema_fields, read_crs(layer, &files)?);
        let rows = shapes
            .into_iter()
            .zip(records)
            .map(|(shape, record)| Row { shape, record })
            .collect();
        Ok(LoadedLayer {
            files,
            shape_type,
            fields,
            schema,
            table_info,
            rows,
        })
    }
}

fn exists(layer: &str, path: &Utf8Path) -> Result<bool, FeatureStoreError> {
    wharyo_fs::file_is_file(path).map_err(|err| io_failure(layer, err))
}

fn missing_attributes(layer: &str, detail: String) -> FeatureStoreError {
    error!("attribute table of layer {layer:?} is unusable: {detail}");
    FeatureStoreError::broken_configuration(
        layer,
        ConfigurationBrokenReason::NoAttributeMetadata,
        detail,
    )
}

fn invalid_id(layer: &str, detail: String) -> FeatureStoreError {
    error!("identifier field of layer {layer:?} is unusable: {detail}");
    FeatureStoreError::broken_configuration(layer, ConfigurationBrokenReason::InvalidIdField, detail)
}

fn shapefile_failure(layer: &str, err: shapefile::Error) -> FeatureStoreError {
    match err {
        shapefile::Error::IoError(source) => io_failure(layer, source),
        other => FeatureStoreError::connection(layer, other.to_string()),
    }
}

fn read_crs(layer: &str, files: &LayerFiles) -> Result<Option<u32>, FeatureStoreError> {
    let prj = files.path("prj");
    if !exists(layer, &prj)? {
        debug!("layer {layer:?} has no projection file");
        return Ok(None);
    }
    let definition = wharyo_fs::read_to_string(&prj).map_err(|err| io_failure(layer, err))?;
    let crs = shapes::prj_epsg(&definition);
    if crs.is_none() {
        warn!("projection file {prj} names no EPSG authority");
    }
    Ok(crs)
}

/// File names of one layer.
#[derive(Debug)]
struct LayerFiles {
    dir: Utf8PathBuf,
    stem: String,
}

impl LayerFiles {
    fn new(home: &Utf8Path, layer: &str) -> Self {
        Self {
            dir: wharyo_fs::layer_dir(home, layer),
            stem: layer.to_owned(),
        }
    }

    fn name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.stem)
    }

    fn path(&self, extension: &str) -> Utf8PathBuf {
        self.dir.join(self.name(extension))
    }
}

struct Row {
    shape: Shape,
    record: Record,
}

/// Everything read from a layer during one call.
struct LoadedLayer {
    files: LayerFiles,
    shape_type: ShapeType,
    fields: Vec<DbfField>,
    schema: SchemaDescriptor,
    table_info: TableInfo,
    rows: Vec<Row>,
}

impl LoadedLayer {
    fn id_field(&self, layer: &str) -> Result<&DbfField, FeatureStoreError> {
        let name = self.schema.require_identifier(layer)?.name();
        self.fields
            .iter()
            .find(|field| field.name() == name)
            .ok_or_else(|| invalid_id(layer, format!("no column named {name:?}")))
    }

    fn ids(&self, layer: &str) -> Result<Vec<FeatureId>, FeatureStoreError> {
        let name = self.id_field(layer)?.name();
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                dbf::decode_id(row.record.get(name)).ok_or_else(|| {
                    invalid_id(layer, format!("record {index} has no usable {name:?} value"))
                })
            })
            .collect()
    }

    fn position(&self, id: FeatureId, layer: &str) -> Result<Option<usize>, FeatureStoreError> {
        Ok(self.ids(layer)?.iter().position(|candidate| *candidate == id))
    }

    fn shape_for(&self, geometry: &FeatureGeometry, layer: &str) -> Result<Shape, FeatureStoreError> {
        self.schema.check_geometry(Some(geometry), layer)?;
        shapes::to_shape(geometry.geometry(), self.shape_type).map_err(|detail| {
            FeatureStoreError::broken_feature(
                layer,
                BrokenFeatureReason::UnrepresentableGeometry { detail },
            )
        })
    }

    fn blank_record(&self, layer: &str) -> Result<Record, FeatureStoreError> {
        let mut record = Record::default();
        for field in &self.fields {
            let value = field.null_value().ok_or_else(|| {
                missing_attributes(
                    layer,
                    format!("column {:?} has a kind that cannot be written", field.name()),
                )
            })?;
            record.insert(field.name().to_owned(), value);
        }
        Ok(record)
    }

    fn feature(&self, index: usize, id: FeatureId) -> Option<Feature> {
        let row = self.rows.get(index)?;
        let geometry = shapes::to_geometry(&row.shape).map(|shape| {
            let mut geometry = FeatureGeometry::new(shape);
            geometry.set_srid(self.schema.crs());
            geometry
        });
        let attributes = self.schema.attribute_fields().filter_map(|field| {
            let declared = field.field_type().attribute_type()?;
            let mut attribute = Attribute::new(field.name(), declared).ok()?;
            attribute.set_value(
                row.record
                    .get(field.name())
                    .and_then(|value| dbf::decode(value, field.field_type())),
            );
            Some(attribute)
        });
        let mut feature = Feature::from_parts(geometry, attributes);
        feature.set_id(id);
        Some(feature)
    }

    fn save(self, layer: &str) -> Result<(), FeatureStoreError> {
        let Self {
            files,
            shape_type,
            table_info,
            rows,
            ..
        } = self;
        let shp = files.path("shp");
        let shx = files.path("shx");
        let dbf = files.path("dbf");
        ensure_writable(layer, [shp.as_path(), shx.as_path(), dbf.as_path()])?;
        let code = shapes::shape_type_code(shape_type).ok_or_else(|| {
            FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::NoGeometryMetadata,
                format!("shape type {shape_type:?} cannot be written"),
            )
        })?;

        let mut transaction =
            LayerTransaction::begin(&files.dir).map_err(|err| io_failure(layer, err))?;
        let staged_shp = transaction.stage(&files.name("shp"));
        let staged_shx = transaction.stage(&files.name("shx"));
        transaction.stage(&files.name("dbf"));

        match write_staged(layer, &staged_shp, &staged_shx, code, table_info, &rows) {
            Ok(()) => transaction
                .commit()
                .map_err(|err| io_failure(layer, err)),
            Err(err) => {
                if let Err(release) = transaction.rollback() {
                    warn!("failed to roll back write to layer {layer:?}: {release}");
                }
                Err(err)
            }
        }
    }
}

fn write_staged(
    layer: &str,
    shp: &Utf8Path,
    shx: &Utf8Path,
    code: i32,
    table_info: TableInfo,
    rows: &[Row],
) -> Result<(), FeatureStoreError> {
    let mut writer = shapefile::Writer::from_path(
        shp.as_std_path(),
        TableWriterBuilder::from_table_info(table_info),
    )
    .map_err(|err| shapefile_failure(layer, err))?;
    for (index, row) in rows.iter().enumerate() {
        write_row(&mut writer, layer, index, row)?;
    }
    drop(writer);

    // Empty layers keep their declared shape type.
    for path in [shp, shx] {
        wharyo_fs::patch_bytes(path, shapes::SHAPE_TYPE_OFFSET, &code.to_le_bytes())
            .map_err(|err| io_failure(layer, err))?;
    }
    Ok(())
}

fn write_row<W: Write + Seek>(
    writer: &mut shapefile::Writer<W>,
    layer: &str,
    index: usize,
    row: &Row,
) -> Result<(), FeatureStoreError> {
    let written = match &row.shape {
        Shape::Point(point) => writer.write_shape_and_record(point, &row.record),
        Shape::Multipoint(points) => writer.write_shape_and_record(points, &row.record),
        Shape::Polyline(polyline) => writer.write_shape_and_record(polyline, &row.record),
        Shape::Polygon(polygon) => writer.write_shape_and_record(polygon, &row.record),
        _ => {
            return Err(FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::NoGeometryMetadata,
                format!("record {index} holds a null or measured shape"),
            ));
        }
    };
    written.map_err(|err| shapefile_failure(layer, err))
}

fn write_attributes(
    schema: &SchemaDescriptor,
    fields: &[DbfField],
    record: &mut Record,
    attributes: &[Attribute],
) -> usize {
    let mut written = 0;
    for (field, attribute) in schema.writable_attributes(attributes) {
        let Some(column) = fields.iter().find(|column| column.name() == field.name()) else {
            continue;
        };
        match column.encode(attribute.value()) {
            Some(value) => {
                record.insert(column.name().to_owned(), value);
                written += 1;
            }
            None => debug!(
                "skipping attribute {:?}: value does not fit column {:?}",
                attribute.name(),
                column.name()
            ),
        }
    }
    written
}

impl FeatureStore for ShapefileStore {
    fn backend(&self) -> &'static str {
        "shapefile"
    }

    fn supports_layer(&self, layer: &str) -> bool {
        if validate_layer_name(layer).is_err() {
            return false;
        }
        let shp = LayerFiles::new(&self.home, layer).path("shp");
        let present = wharyo_fs::file_is_file(&shp).unwrap_or_else(|err| {
            debug!("cannot probe {shp}: {err}");
            false
        });
        present
            && self
                .layer_config
                .as_ref()
                .is_none_or(|config| config.claims(layer, BackendType::Shapefile))
    }

    fn create_feature(&self, feature: &Feature, layer: &str) -> Result<FeatureId, FeatureStoreError> {
        validate_layer_name(layer)?;
        let geometry = require_geometry(feature.geometry(), layer)?;
        let mut loaded = self.load(layer)?;
        let id_field = loaded.id_field(layer)?.clone();
        let shape = loaded.shape_for(geometry, layer)?;
        let id = next_feature_id(loaded.ids(layer)?)
            .ok_or_else(|| invalid_id(layer, "identifier values are exhausted".to_owned()))?;
        let id_value = id_field.encode_id(id).ok_or_else(|| {
            invalid_id(
                layer,
                format!("column {:?} cannot hold identifier {id}", id_field.name()),
            )
        })?;

        let mut record = loaded.blank_record(layer)?;
        record.insert(id_field.name().to_owned(), id_value);
        write_attributes(&loaded.schema, &loaded.fields, &mut record, feature.attributes());
        loaded.rows.push(Row { shape, record });
        loaded.save(layer)?;
        Ok(id)
    }

    fn get_feature_by_id(&self, id: FeatureId, layer: &str) -> Result<Option<Feature>, FeatureStoreError> {
        validate_layer_name(layer)?;
        let loaded = self.load(layer)?;
        Ok(loaded
            .position(id, layer)?
            .and_then(|index| loaded.feature(index, id)))
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
        let mut loaded = self.load(layer)?;
        let Some(index) = loaded.position(id, layer)? else {
            debug!("no feature {id} in layer {layer:?}; nothing to update");
            return Ok(());
        };
        let Some(row) = loaded.rows.get_mut(index) else {
            return Ok(());
        };
        if write_attributes(&loaded.schema, &loaded.fields, &mut row.record, attributes) == 0 {
            debug!("no attribute fits layer {layer:?}; leaving feature {id} untouched");
            return Ok(());
        }
        loaded.save(layer)
    }

    fn update_feature_geometry(
        &self,
        id: FeatureId,
        geometry: &FeatureGeometry,
        layer: &str,
    ) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        require_geometry(Some(geometry), layer)?;
        let mut loaded = self.load(layer)?;
        let shape = loaded.shape_for(geometry, layer)?;
        let Some(index) = loaded.position(id, layer)? else {
            debug!("no feature {id} in layer {layer:?}; nothing to update");
            return Ok(());
        };
        if let Some(row) = loaded.rows.get_mut(index) {
            row.shape = shape;
        }
        loaded.save(layer)
    }

    fn delete_feature(&self, id: FeatureId, layer: &str) -> Result<(), FeatureStoreError> {
        validate_layer_name(layer)?;
        let mut loaded = self.load(layer)?;
        let Some(index) = loaded.position(id, layer)? else {
            debug!("no feature {id} in layer {layer:?}; nothing to delete");
            return Ok(());
        };
        loaded.rows.remove(index);
        loaded.save(layer)
    }
}

#[cfg(test)]
mod tests;
