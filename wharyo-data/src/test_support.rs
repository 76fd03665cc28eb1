//! Fixture layers for adapter tests.
//!
//! Layers are written programmatically, so no binary fixtures live in the
//! repository. The parcels layer holds three square polygons with ids 1 to
//! 3 in EPSG:2180; the wells layer holds a single point with id 7 and no
//! projection file.
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use wharyo_data::test_support::write_parcels_shapefile;
//!
//! # fn main() -> Result<(), wharyo_data::test_support::FixtureError> {
//! let dir = write_parcels_shapefile(Utf8Path::new("/tmp/layers"), "parcels")?;
//! assert!(dir.join("parcels.shp").exists());
//! # Ok(())
//! # }
//! ```

use std::{fs, io};

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, params};
use serde_json::{Value, json};
use shapefile::{
    Point, PolygonRing,
    dbase::{FieldName, FieldValue, Record, TableWriterBuilder},
};
use thiserror::Error;

use crate::layer_config::BackendType;

/// EPSG code declared by the parcels fixtures.
pub const PARCELS_CRS: u32 = 2180;

/// Projection definition written next to the parcels shapefile.
pub const PARCELS_PRJ: &str = concat!(
    "PROJCS[\"ETRS89 / Poland CS92\",GEOGCS[\"ETRS89\",",
    "DATUM[\"European_Terrestrial_Reference_System_1989\",",
    "SPHEROID[\"GRS 1980\",6378137,298.257222101,AUTHORITY[\"EPSG\",\"7019\"]],",
    "AUTHORITY[\"EPSG\",\"6258\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],",
    "UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],",
    "AUTHORITY[\"EPSG\",\"4258\"]],PROJECTION[\"Transverse_Mercator\"],",
    "PARAMETER[\"latitude_of_origin\",0],PARAMETER[\"central_meridian\",19],",
    "PARAMETER[\"scale_factor\",0.9993],PARAMETER[\"false_easting\",500000],",
    "PARAMETER[\"false_northing\",-5300000],UNIT[\"metre\",1,AUTHORITY[\"EPSG\",\"9001\"]],",
    "AUTHORITY[\"EPSG\",\"2180\"]]",
);

const PARCEL_COUNTS: [f64; 3] = [1.11, 2.22, 3.33];

/// Errors raised while writing fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// A directory or file could not be written.
    #[error("failed to write fixture file {path}")]
    Io {
        /// Path being written.
        path: Utf8PathBuf,
        /// Source error from the filesystem.
        #[source]
        source: io::Error,
    },
    /// The shapefile writer failed.
    #[error("failed to write shapefile fixture")]
    Shapefile(#[from] shapefile::Error),
    /// A dBase field name was rejected.
    #[error("invalid dBase field name {name:?}")]
    FieldName {
        /// The rejected name.
        name: &'static str,
    },
    /// The layer registry could not be written.
    #[error("failed to write layer registry")]
    Registry(#[from] rusqlite::Error),
    /// The GeoJSON document could not be encoded.
    #[error("failed to encode GeoJSON fixture")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Utf8Path) -> impl FnOnce(io::Error) -> FixtureError + '_ {
    move |source| FixtureError::Io {
        path: path.to_owned(),
        source,
    }
}

fn field_name(name: &'static str) -> Result<FieldName, FixtureError> {
    FieldName::try_from(name).map_err(|_| FixtureError::FieldName { name })
}

fn write_file(path: &Utf8Path, contents: &[u8]) -> Result<(), FixtureError> {
    let (dir, name) = wharyo_fs::open_dir_and_file(path).map_err(io_error(path))?;
    dir.write(name.as_str(), contents).map_err(io_error(path))
}

fn prepare_layer_dir(home: &Utf8Path, layer: &str) -> Result<Utf8PathBuf, FixtureError> {
    let dir = wharyo_fs::layer_dir(home, layer);
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    Ok(dir)
}

fn square(origin_x: f64) -> shapefile::Polygon {
    shapefile::Polygon::new(PolygonRing::Outer(vec![
        Point::new(origin_x, 0.0),
        Point::new(origin_x, 5.0),
        Point::new(origin_x + 5.0, 5.0),
        Point::new(origin_x + 5.0, 0.0),
        Point::new(origin_x, 0.0),
    ]))
}

/// Write a polygon shapefile layer with fields `id`, `name`, `count` and
/// `date` holding three parcels, plus an EPSG:2180 projection file.
///
/// Returns the layer directory.
///
/// # Errors
///
/// Returns [`FixtureError`] when any file cannot be written.
pub fn write_parcels_shapefile(home: &Utf8Path, layer: &str) -> Result<Utf8PathBuf, FixtureError> {
    let dir = prepare_layer_dir(home, layer)?;
    let table = TableWriterBuilder::new()
        .add_numeric_field(field_name("id")?, 10, 0)
        .add_character_field(field_name("name")?, 50)
        .add_numeric_field(field_name("count")?, 10, 2)
        .add_date_field(field_name("date")?);
    let shp = dir.join(format!("{layer}.shp"));
    let mut writer = shapefile::Writer::from_path(shp.as_std_path(), table)?;
    for (id, count) in (1_u32..).zip(PARCEL_COUNTS) {
        let mut record = Record::default();
        record.insert("id".to_owned(), FieldValue::Numeric(Some(f64::from(id))));
        record.insert(
            "name".to_owned(),
            FieldValue::Character(Some(format!("name{id}"))),
        );
        record.insert("count".to_owned(), FieldValue::Numeric(Some(count)));
        record.insert("date".to_owned(), FieldValue::Date(None));
        writer.write_shape_and_record(&square(f64::from(id) * 10.0), &record)?;
    }
    drop(writer);
    write_file(&dir.join(format!("{layer}.prj")), PARCELS_PRJ.as_bytes())?;
    Ok(dir)
}

/// Write a point shapefile layer with an integer `id`, a `name`, a float
/// `depth` and a logical `active` column, holding a single well with id 7.
///
/// No projection file is written.
///
/// # Errors
///
/// Returns [`FixtureError`] when any file cannot be written.
pub fn write_wells_shapefile(home: &Utf8Path, layer: &str) -> Result<Utf8PathBuf, FixtureError> {
    let dir = prepare_layer_dir(home, layer)?;
    let table = TableWriterBuilder::new()
        .add_integer_field(field_name("id")?)
        .add_character_field(field_name("name")?, 20)
        .add_float_field(field_name("depth")?, 10, 2)
        .add_logical_field(field_name("active")?);
    let shp = dir.join(format!("{layer}.shp"));
    let mut writer = shapefile::Writer::from_path(shp.as_std_path(), table)?;
    let mut record = Record::default();
    record.insert("id".to_owned(), FieldValue::Integer(7));
    record.insert(
        "name".to_owned(),
        FieldValue::Character(Some("old well".to_owned())),
    );
    record.insert("depth".to_owned(), FieldValue::Float(Some(12.5)));
    record.insert("active".to_owned(), FieldValue::Logical(Some(true)));
    writer.write_shape_and_record(&Point::new(5.0, 5.0), &record)?;
    drop(writer);
    Ok(dir)
}

/// A parcels feature collection mirroring [`write_parcels_shapefile`], with
/// `schema` and `crs` members.
#[must_use]
pub fn parcels_geojson() -> Value {
    let features: Vec<Value> = (1_u32..)
        .zip(PARCEL_COUNTS)
        .map(|(id, count)| {
            let x = f64::from(id) * 10.0;
            json!({
                "type": "Feature",
                "id": id,
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x, 0.0], [x, 5.0], [x + 5.0, 5.0], [x + 5.0, 0.0], [x, 0.0]]]
                },
                "properties": {"name": format!("name{id}"), "count": count, "date": null}
            })
        })
        .collect();
    json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": format!("EPSG:{PARCELS_CRS}")}},
        "schema": {
            "geometry": "Polygon",
            "properties": [
                {"name": "name", "type": "String"},
                {"name": "count", "type": "Double"},
                {"name": "date", "type": "Date"}
            ]
        },
        "features": features
    })
}

/// Write `document` as the GeoJSON layer `layer` beneath `home`.
///
/// Returns the layer directory.
///
/// # Errors
///
/// Returns [`FixtureError`] when encoding or writing fails.
pub fn write_geojson_layer(
    home: &Utf8Path,
    layer: &str,
    document: &Value,
) -> Result<Utf8PathBuf, FixtureError> {
    let dir = prepare_layer_dir(home, layer)?;
    let bytes = serde_json::to_vec_pretty(document)?;
    write_file(&dir.join(format!("{layer}.geojson")), &bytes)?;
    Ok(dir)
}

/// Create a layer registry at `path` listing `entries`.
///
/// # Errors
///
/// Returns [`FixtureError::Registry`] when SQLite rejects the statements.
pub fn write_layer_config(
    path: &Utf8Path,
    entries: &[(&str, BackendType)],
) -> Result<(), FixtureError> {
    let connection = Connection::open(path.as_std_path())?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS layer_config (
            layer_name TEXT NOT NULL,
            layer_type TEXT NOT NULL
        )",
        [],
    )?;
    for (layer, backend) in entries {
        connection.execute(
            "INSERT INTO layer_config (layer_name, layer_type) VALUES (?1, ?2)",
            params![layer, backend.tag()],
        )?;
    }
    Ok(())
}
