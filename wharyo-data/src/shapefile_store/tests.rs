//! Unit tests for the shapefile adapter, run against fixture layers written
//! into temporary directories.

use std::fs;

use chrono::NaiveDate;
use geo::{Area, BoundingRect, Geometry, LineString, Point, Polygon, polygon};
use rstest::{fixture, rstest};
use tempfile::TempDir;
use wharyo_core::{
    Attribute, AttributeValue, BrokenFeatureReason, ConfigurationBrokenReason,
    DataSourceUnavailableReason, Feature, FeatureGeometry, FeatureStore, FeatureStoreError,
    GeometryKind, PreconditionViolation,
};

use super::*;
use crate::test_support::{
    PARCELS_CRS, write_layer_config, write_parcels_shapefile, write_wells_shapefile,
};

struct Layers {
    _temp: TempDir,
    home: Utf8PathBuf,
    store: ShapefileStore,
}

#[fixture]
fn layers() -> Layers {
    let temp = TempDir::new().expect("create temp dir");
    let home = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    write_parcels_shapefile(&home, "parcels").expect("write parcels");
    write_wells_shapefile(&home, "wells").expect("write wells");
    let store = ShapefileStore::new(home.clone());
    Layers {
        _temp: temp,
        home,
        store,
    }
}

fn parcel(origin_x: f64, srid: u32) -> FeatureGeometry {
    let square: Polygon<f64> = polygon![
        (x: origin_x, y: 0.0),
        (x: origin_x, y: 5.0),
        (x: origin_x + 5.0, y: 5.0),
        (x: origin_x + 5.0, y: 0.0),
        (x: origin_x, y: 0.0),
    ];
    FeatureGeometry::new(square).with_srid(srid)
}

fn attribute(name: &str, value: impl Into<AttributeValue>) -> Attribute {
    Attribute::with_value(name, value).expect("valid attribute name")
}

fn read(store: &ShapefileStore, id: FeatureId, layer: &str) -> Feature {
    store
        .get_feature_by_id(id, layer)
        .expect("read succeeds")
        .unwrap_or_else(|| panic!("feature {id} exists in {layer}"))
}

fn value<'a>(feature: &'a Feature, name: &str) -> Option<&'a AttributeValue> {
    feature.attribute(name).and_then(Attribute::value)
}

#[rstest]
#[case("parcels", true)]
#[case("wells", true)]
#[case("rivers", false)]
#[case("", false)]
#[case("../parcels", false)]
fn claims_layers_with_a_shape_file(layers: Layers, #[case] layer: &str, #[case] expected: bool) {
    assert_eq!(layers.store.supports_layer(layer), expected);
}

#[rstest]
fn registry_gate_requires_a_listing(layers: Layers) {
    let registry = layers.home.join("layers.db");
    write_layer_config(&registry, &[("parcels", BackendType::Shapefile)]).expect("registry");
    let gated = ShapefileStore::new(layers.home.clone()).with_layer_config(LayerConfig::new(registry));
    assert!(gated.supports_layer("parcels"));
    assert!(!gated.supports_layer("wells"));
}

#[rstest]
fn reads_fixture_features(layers: Layers) {
    let feature = read(&layers.store, 2, "parcels");
    assert_eq!(feature.id(), Some(2));
    assert_eq!(value(&feature, "name"), Some(&AttributeValue::from("name2")));
    assert_eq!(value(&feature, "count"), Some(&AttributeValue::Double(2.22)));
    assert!(feature.attribute("date").is_some_and(Attribute::is_null));
    assert!(feature.attribute("id").is_none());
    let geometry = feature.geometry().expect("parcel has a geometry");
    assert_eq!(geometry.srid(), Some(PARCELS_CRS));
    assert_eq!(geometry.kind(), GeometryKind::Polygon);
}

#[rstest]
fn missing_ids_read_as_absent(layers: Layers) {
    assert!(layers
        .store
        .get_feature_by_id(42, "parcels")
        .expect("read succeeds")
        .is_none());
}

#[rstest]
fn created_features_round_trip(layers: Layers) {
    let feature = Feature::from_parts(
        Some(parcel(40.0, PARCELS_CRS)),
        [attribute("name", "test"), attribute("count", 4.44)],
    );
    let id = layers
        .store
        .create_feature(&feature, "parcels")
        .expect("create succeeds");
    assert_eq!(id, 4);

    let stored = read(&layers.store, id, "parcels");
    assert_eq!(value(&stored, "name"), Some(&AttributeValue::from("test")));
    assert_eq!(value(&stored, "count"), Some(&AttributeValue::Double(4.44)));
    let geometry = stored.geometry().expect("stored geometry");
    assert_eq!(geometry.srid(), Some(PARCELS_CRS));
    assert!((geometry.geometry().unsigned_area() - 25.0).abs() < f64::EPSILON);
    assert_eq!(
        geometry.geometry().bounding_rect(),
        parcel(40.0, PARCELS_CRS).geometry().bounding_rect()
    );
}

#[rstest]
fn commits_leave_no_staged_files(layers: Layers) {
    let feature = Feature::from_parts(Some(parcel(40.0, PARCELS_CRS)), []);
    layers
        .store
        .create_feature(&feature, "parcels")
        .expect("create succeeds");
    let mut names: Vec<String> = fs::read_dir(layers.home.join("parcels"))
        .expect("list layer")
        .map(|entry| {
            entry
                .expect("entry")
                .file_name()
                .into_string()
                .expect("utf-8 name")
        })
        .collect();
    names.sort();
    assert_eq!(
        names,
        ["parcels.dbf", "parcels.prj", "parcels.shp", "parcels.shx"]
    );
}

#[rstest]
fn dates_are_stored(layers: Layers) {
    let day = NaiveDate::from_ymd_opt(2019, 11, 2).expect("valid date");
    let feature = Feature::from_parts(Some(parcel(40.0, PARCELS_CRS)), [attribute("date", day)]);
    let id = layers
        .store
        .create_feature(&feature, "parcels")
        .expect("create succeeds");
    let stored = read(&layers.store, id, "parcels");
    assert_eq!(value(&stored, "date"), Some(&AttributeValue::from(day)));
}

#[rstest]
fn foreign_crs_is_rejected(layers: Layers) {
    let feature = Feature::from_parts(Some(parcel(40.0, 2179)), []);
    let err = layers
        .store
        .create_feature(&feature, "parcels")
        .expect_err("CRS mismatch");
    assert!(matches!(
        err,
        FeatureStoreError::BrokenFeature {
            reason: BrokenFeatureReason::CrsMismatch {
                feature: 2179,
                layer: 2180
            },
            ..
        }
    ));
    assert!(layers
        .store
        .get_feature_by_id(4, "parcels")
        .expect("read succeeds")
        .is_none());
}

#[rstest]
fn crs_less_geometries_are_accepted(layers: Layers) {
    let mut geometry = parcel(40.0, PARCELS_CRS);
    geometry.set_srid(None);
    let feature = Feature::from_parts(Some(geometry), []);
    assert_eq!(
        layers.store.create_feature(&feature, "parcels").expect("create succeeds"),
        4
    );
}

#[rstest]
fn points_do_not_fit_polygon_layers(layers: Layers) {
    let point = FeatureGeometry::new(Point::new(1.0, 1.0)).with_srid(PARCELS_CRS);
    let err = layers
        .store
        .create_feature(&Feature::from_parts(Some(point), []), "parcels")
        .expect_err("kind mismatch");
    assert!(matches!(
        err,
        FeatureStoreError::BrokenFeature {
            reason: BrokenFeatureReason::GeometryKindMismatch { .. },
            ..
        }
    ));
}

#[rstest]
fn features_need_a_geometry(layers: Layers) {
    let err = layers
        .store
        .create_feature(&Feature::new(), "parcels")
        .expect_err("no geometry");
    assert!(matches!(
        err,
        FeatureStoreError::BrokenFeature {
            reason: BrokenFeatureReason::MissingGeometry,
            ..
        }
    ));
}

#[rstest]
fn mismatched_and_unknown_attributes_are_dropped(layers: Layers) {
    let feature = Feature::from_parts(
        Some(parcel(40.0, PARCELS_CRS)),
        [
            attribute("NAME", "kept"),
            attribute("count", "not a number"),
            attribute("colour", "red"),
        ],
    );
    let id = layers
        .store
        .create_feature(&feature, "parcels")
        .expect("create succeeds");
    let stored = read(&layers.store, id, "parcels");
    assert_eq!(value(&stored, "name"), Some(&AttributeValue::from("kept")));
    assert!(stored.attribute("count").is_some_and(Attribute::is_null));
    assert!(stored.attribute("colour").is_none());
}

#[rstest]
fn attribute_updates_touch_one_feature(layers: Layers) {
    layers
        .store
        .update_feature_attributes(2, &[attribute("name", "renamed")], "parcels")
        .expect("update succeeds");
    assert_eq!(
        value(&read(&layers.store, 2, "parcels"), "name"),
        Some(&AttributeValue::from("renamed"))
    );
    assert_eq!(
        value(&read(&layers.store, 1, "parcels"), "name"),
        Some(&AttributeValue::from("name1"))
    );
}

#[rstest]
fn geometry_updates_replace_the_shape(layers: Layers) {
    layers
        .store
        .update_feature_geometry(1, &parcel(100.0, PARCELS_CRS), "parcels")
        .expect("update succeeds");
    let stored = read(&layers.store, 1, "parcels");
    let bounds = stored
        .geometry()
        .and_then(|geometry| geometry.geometry().bounding_rect())
        .expect("bounded geometry");
    assert!((bounds.min().x - 100.0).abs() < f64::EPSILON);
    assert_eq!(value(&stored, "name"), Some(&AttributeValue::from("name1")));
}

#[rstest]
fn missing_ids_are_no_ops(layers: Layers) {
    layers
        .store
        .update_feature_attributes(99, &[attribute("name", "ghost")], "parcels")
        .expect("update is a no-op");
    layers
        .store
        .update_feature_geometry(99, &parcel(0.0, PARCELS_CRS), "parcels")
        .expect("update is a no-op");
    layers
        .store
        .delete_feature(99, "parcels")
        .expect("delete is a no-op");
    for id in 1..=3 {
        assert_eq!(
            value(&read(&layers.store, id, "parcels"), "name"),
            Some(&AttributeValue::Text(format!("name{id}")))
        );
    }
}

#[rstest]
fn deletes_remove_one_feature(layers: Layers) {
    layers
        .store
        .delete_feature(3, "parcels")
        .expect("delete succeeds");
    assert!(layers
        .store
        .get_feature_by_id(3, "parcels")
        .expect("read succeeds")
        .is_none());
    assert_eq!(read(&layers.store, 2, "parcels").id(), Some(2));
    let next = layers
        .store
        .create_feature(&Feature::from_parts(Some(parcel(40.0, PARCELS_CRS)), []), "parcels")
        .expect("create succeeds");
    assert_eq!(next, 3);
}

#[rstest]
fn point_layers_use_integer_ids(layers: Layers) {
    let well = read(&layers.store, 7, "wells");
    assert_eq!(value(&well, "name"), Some(&AttributeValue::from("old well")));
    assert_eq!(value(&well, "depth"), Some(&AttributeValue::Double(12.5)));
    assert!(well.attribute("active").is_none());
    assert_eq!(well.geometry().and_then(FeatureGeometry::srid), None);
    assert_eq!(
        well.geometry().map(FeatureGeometry::geometry),
        Some(&Geometry::Point(Point::new(5.0, 5.0)))
    );

    let located = FeatureGeometry::new(Point::new(8.0, 9.0)).with_srid(4326);
    let id = layers
        .store
        .create_feature(
            &Feature::from_parts(Some(located), [attribute("depth", 3.5)]),
            "wells",
        )
        .expect("layers without a CRS accept any CRS");
    assert_eq!(id, 8);
    assert_eq!(
        value(&read(&layers.store, 8, "wells"), "depth"),
        Some(&AttributeValue::Double(3.5))
    );
}

#[rstest]
fn read_only_tables_reject_writes(layers: Layers) {
    let dbf = layers.home.join("parcels").join("parcels.dbf");
    let mut permissions = fs::metadata(&dbf).expect("metadata").permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&dbf, permissions).expect("set read-only");

    let err = layers
        .store
        .delete_feature(1, "parcels")
        .expect_err("read-only layer");
    assert_eq!(
        err.unavailable_reason(),
        Some(DataSourceUnavailableReason::ReadOnlyAccess)
    );
    assert_eq!(read(&layers.store, 1, "parcels").id(), Some(1));
}

#[rstest]
fn missing_tables_break_the_layer(layers: Layers) {
    fs::remove_file(layers.home.join("wells").join("wells.dbf")).expect("remove dbf");
    let err = layers
        .store
        .get_feature_by_id(7, "wells")
        .expect_err("no attribute table");
    assert_eq!(
        err.configuration_reason(),
        Some(ConfigurationBrokenReason::NoAttributeMetadata)
    );
}

#[rstest]
fn missing_shape_files_are_unavailable(layers: Layers) {
    let err = layers
        .store
        .get_feature_by_id(1, "rivers")
        .expect_err("no such layer");
    assert_eq!(
        err.unavailable_reason(),
        Some(DataSourceUnavailableReason::ConnectionUnavailable)
    );
}

#[rstest]
#[case::empty("", PreconditionViolation::EmptyLayerName)]
#[case::escaping(
    "../parcels",
    PreconditionViolation::InvalidLayerName { name: "../parcels".to_owned() }
)]
fn layer_names_are_checked_before_the_disk(
    layers: Layers,
    #[case] layer: &str,
    #[case] expected: PreconditionViolation,
) {
    let nested = ShapefileStore::new(layers.home.join("parcels"));
    let feature = Feature::from_parts(Some(parcel(40.0, PARCELS_CRS)), []);
    let outcomes = [
        nested.create_feature(&feature, layer).map(drop),
        nested.get_feature_by_id(1, layer).map(drop),
        nested.update_feature_attributes(1, &[attribute("name", "moved")], layer),
        nested.update_feature_geometry(1, &parcel(0.0, PARCELS_CRS), layer),
        nested.delete_feature(1, layer),
    ];
    for outcome in outcomes {
        match outcome.expect_err("layer name rejected") {
            FeatureStoreError::Precondition(found) => assert_eq!(found, expected),
            other => panic!("expected a precondition violation, found {other:?}"),
        }
    }
    assert_eq!(
        value(&read(&layers.store, 1, "parcels"), "name"),
        Some(&AttributeValue::from("name1"))
    );
}

#[rstest]
fn broken_geometries_are_rejected_before_the_layer_is_opened(layers: Layers) {
    let err = layers
        .store
        .create_feature(&Feature::new(), "rivers")
        .expect_err("no geometry");
    assert!(matches!(
        err,
        FeatureStoreError::BrokenFeature {
            reason: BrokenFeatureReason::MissingGeometry,
            ..
        }
    ));

    let empty = FeatureGeometry::new(LineString::<f64>::new(Vec::new()));
    let err = layers
        .store
        .update_feature_geometry(1, &empty, "rivers")
        .expect_err("empty geometry");
    assert!(matches!(
        err,
        FeatureStoreError::BrokenFeature {
            reason: BrokenFeatureReason::EmptyGeometry,
            ..
        }
    ));
}
