//! Core domain types for the Wharyo feature store.
//!
//! The crate defines the backend-agnostic feature model, the error taxonomy
//! shared by every adapter, the schema reconciliation rules and the routing
//! layer that dispatches operations to the adapter serving a layer.
//!
//! Responsibilities:
//! - Model attributes, features and geometries with their invariants.
//! - Decide which attributes and geometries a layer schema accepts.
//! - Route calls by layer name and serialise mutations per layer.
//!
//! Boundaries:
//! - No medium I/O happens here; adapters live in `wharyo-data`.
//! - Configuration is supplied by callers, never read from the environment.

mod attribute;
mod error;
mod feature;
mod geometry;
mod router;
pub mod schema;
mod service;
mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use attribute::{Attribute, AttributeType, AttributeValue, UnsupportedAttributeType};
pub use error::{
    BoxedSource, BrokenFeatureReason, ConfigurationBrokenReason, DataSourceUnavailableReason,
    FeatureStoreError, PreconditionViolation,
};
pub use feature::{Feature, FeatureId};
pub use geometry::{FeatureGeometry, GeometryKind, GeometryParseError, UnknownGeometryKind};
pub use router::LayerRouter;
pub use schema::{
    FieldRole, FieldType, SchemaDescriptor, SchemaField, is_attribute_compatible,
    is_geometry_compatible, next_feature_id, require_geometry,
};
pub use service::FeatureService;
pub use store::{FeatureStore, validate_layer_name};

/// Case-insensitive name comparison used for attribute and field names.
pub(crate) fn names_match(left: &str, right: &str) -> bool {
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::names_match;

    #[rstest]
    #[case("name", "NAME", true)]
    #[case("Łąka", "ŁĄKA", true)]
    #[case("name", "names", false)]
    #[case("", "", true)]
    fn names_compare_without_case(#[case] left: &str, #[case] right: &str, #[case] expected: bool) {
        assert_eq!(names_match(left, right), expected);
    }
}
