//! Tests for schema reconciliation.

use geo::{LineString, Point, polygon};
use rstest::{fixture, rstest};

use super::*;
use crate::AttributeValue;

#[fixture]
fn polygons() -> SchemaDescriptor {
    SchemaDescriptor::new(
        vec![
            SchemaField::new("the_geom", FieldType::Geometry(GeometryKind::MultiPolygon)),
            SchemaField::new("ID", FieldType::Long),
            SchemaField::new("name", FieldType::String),
            SchemaField::new("count", FieldType::Double),
            SchemaField::new("date", FieldType::Date),
            SchemaField::new("flag", FieldType::Unsupported("L".into())),
        ],
        Some(2180),
    )
}

fn square() -> FeatureGeometry {
    FeatureGeometry::new(polygon![
        (x: 0.0, y: 0.0),
        (x: 1.0, y: 0.0),
        (x: 1.0, y: 1.0),
        (x: 0.0, y: 0.0),
    ])
}

#[rstest]
fn roles_follow_type_and_name(polygons: SchemaDescriptor) {
    let roles: Vec<_> = polygons.fields().iter().map(SchemaField::role).collect();
    assert_eq!(
        roles,
        vec![
            FieldRole::Geometry,
            FieldRole::Identifier,
            FieldRole::Attribute,
            FieldRole::Attribute,
            FieldRole::Attribute,
            FieldRole::Attribute,
        ]
    );
    assert_eq!(polygons.geometry_kind(), Some(GeometryKind::MultiPolygon));
    assert_eq!(
        polygons.identifier_field().map(SchemaField::name),
        Some("ID")
    );
}

#[rstest]
fn zero_crs_means_undeclared() {
    assert_eq!(SchemaDescriptor::new(Vec::new(), Some(0)).crs(), None);
}

#[rstest]
fn missing_identifier_breaks_configuration() {
    let schema = SchemaDescriptor::new(vec![SchemaField::new("name", FieldType::String)], None);
    let err = schema.require_identifier("roads").expect_err("no id field");
    assert_eq!(
        err.configuration_reason(),
        Some(ConfigurationBrokenReason::InvalidIdField)
    );
}

#[rstest]
fn textual_identifier_breaks_configuration() {
    let schema = SchemaDescriptor::new(vec![SchemaField::new("id", FieldType::String)], None);
    assert!(schema.require_identifier("roads").is_err());
}

#[rstest]
fn polygon_fits_multipolygon_layer(polygons: SchemaDescriptor) {
    let kind = polygons
        .check_geometry(Some(&square().with_srid(2180)), "parcels")
        .expect("coherent geometry");
    assert_eq!(kind, GeometryKind::MultiPolygon);
}

#[rstest]
fn geometry_without_srid_is_accepted(polygons: SchemaDescriptor) {
    assert!(polygons.check_geometry(Some(&square()), "parcels").is_ok());
}

#[rstest]
fn foreign_crs_is_rejected(polygons: SchemaDescriptor) {
    let err = polygons
        .check_geometry(Some(&square().with_srid(2179)), "parcels")
        .expect_err("CRS differs");
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
}

#[rstest]
#[case(None, BrokenFeatureReason::MissingGeometry)]
#[case(
    Some(FeatureGeometry::new(LineString::<f64>::new(Vec::new()))),
    BrokenFeatureReason::EmptyGeometry
)]
#[case(
    Some(FeatureGeometry::new(Point::new(1.0, 1.0))),
    BrokenFeatureReason::GeometryKindMismatch {
        found: GeometryKind::Point,
        declared: GeometryKind::MultiPolygon,
    }
)]
fn broken_geometries_are_rejected(
    polygons: SchemaDescriptor,
    #[case] geometry: Option<FeatureGeometry>,
    #[case] expected: BrokenFeatureReason,
) {
    let err = polygons
        .check_geometry(geometry.as_ref(), "parcels")
        .expect_err("geometry is broken");
    match err {
        FeatureStoreError::BrokenFeature { reason, .. } => assert_eq!(reason, expected),
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn layer_without_geometry_field_is_broken() {
    let schema = SchemaDescriptor::new(vec![SchemaField::new("id", FieldType::Integer)], None);
    let err = schema
        .check_geometry(Some(&square()), "attributes_only")
        .expect_err("no geometry metadata");
    assert_eq!(
        err.configuration_reason(),
        Some(ConfigurationBrokenReason::NoGeometryMetadata)
    );
}

#[rstest]
fn writable_attributes_skip_unknown_and_mistyped(polygons: SchemaDescriptor) {
    let attributes = vec![
        Attribute::with_value("NAME", "test").expect("valid"),
        Attribute::with_value("count", 4.44).expect("valid"),
        Attribute::with_value("date", "not a date").expect("valid"),
        Attribute::with_value("missing", 1_i64).expect("valid"),
        Attribute::with_value("flag", true).expect("valid"),
        Attribute::with_value("id", 99_i64).expect("valid"),
    ];
    let written: Vec<_> = polygons
        .writable_attributes(&attributes)
        .into_iter()
        .map(|(field, attribute)| (field.name(), attribute.value().cloned()))
        .collect();
    assert_eq!(
        written,
        vec![
            ("name", Some(AttributeValue::Text("test".into()))),
            ("count", Some(AttributeValue::Double(4.44))),
        ]
    );
}

#[rstest]
#[case(vec![], Some(1))]
#[case(vec![1, 2, 3], Some(4))]
#[case(vec![7, 2], Some(8))]
#[case(vec![u64::MAX], None)]
fn next_identifier_is_max_plus_one(#[case] ids: Vec<FeatureId>, #[case] expected: Option<FeatureId>) {
    assert_eq!(next_feature_id(ids), expected);
}
