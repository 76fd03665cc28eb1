//! Facade crate for the Wharyo spatial feature store.
//!
//! This crate re-exports the backend-agnostic feature model, the routing
//! service and the concrete storage adapters so callers only depend on one
//! package.

#![forbid(unsafe_code)]

pub use wharyo_core::{
    Attribute, AttributeType, AttributeValue, BrokenFeatureReason, ConfigurationBrokenReason,
    DataSourceUnavailableReason, Feature, FeatureGeometry, FeatureId, FeatureService,
    FeatureStore, FeatureStoreError, GeometryKind, LayerRouter, PreconditionViolation,
    SchemaDescriptor, UnsupportedAttributeType,
};

pub use wharyo_data::{
    BackendType, DatabaseStore, GeoJsonStore, LayerConfig, LayerConfigError, ShapefileStore,
    WfsStore,
};
