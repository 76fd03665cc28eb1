//! Storage adapters for the Wharyo feature store.
//!
//! Responsibilities:
//! - Implement [`wharyo_core::FeatureStore`] for shapefiles, GeoJSON
//!   documents, configured database layers and WFS endpoints.
//! - Translate each medium's metadata into a
//!   [`wharyo_core::SchemaDescriptor`] on every call.
//! - Stage file rewrites in a transaction so a failed write leaves the
//!   layer untouched.
//!
//! Boundaries:
//! - Do not encode reconciliation rules (live in `wharyo-core`).
//! - Open the medium afresh for every operation; nothing is cached.
//!
//! Invariants:
//! - Thread-safe by default; adapters hold configuration only.
//! - No global mutable state.

mod database;
mod geojson_store;
mod io_error;
mod layer_config;
mod shapefile_store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
mod wfs;

pub use database::DatabaseStore;
pub use geojson_store::GeoJsonStore;
pub use layer_config::{BackendType, LayerConfig, LayerConfigError};
pub use shapefile_store::ShapefileStore;
pub use wfs::WfsStore;
