//! SQLite registry mapping layer names to the backend serving them.
//!
//! The registry lives in a `layer_config` table with `layer_name` and
//! `layer_type` text columns. Adapters consult it from
//! [`wharyo_core::FeatureStore::supports_layer`]; nothing else reads it.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use log::warn;
use rusqlite::{Connection, Error as SqliteError, OpenFlags, params};
use thiserror::Error;

const LAYER_QUERY: &str =
    "SELECT count(*) FROM layer_config WHERE layer_name = ?1 AND layer_type = ?2";

/// Backend tags recorded in the `layer_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    /// Layers stored in database tables.
    Database,
    /// Layers stored as shapefiles.
    Shapefile,
    /// Layers stored as GeoJSON documents.
    GeoJson,
    /// Layers served by a WFS endpoint.
    Wfs,
}

impl BackendType {
    /// Tag stored in the registry, for example `"SHAPEFILE"`.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Database => "DATABASE",
            Self::Shapefile => "SHAPEFILE",
            Self::GeoJson => "GEOJSON",
            Self::Wfs => "WFS",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Errors raised while consulting the layer registry.
#[derive(Debug, Error)]
pub enum LayerConfigError {
    /// Opening the SQLite database failed.
    #[error("failed to open layer configuration at {path}")]
    Open {
        /// Location of the registry database.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Running the lookup failed, typically because the table is missing.
    #[error("failed to query layer configuration at {path}")]
    Query {
        /// Location of the registry database.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Handle on a layer registry database.
///
/// The database is opened read-only for every lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    path: Utf8PathBuf,
}

impl LayerConfig {
    /// Point at the registry database at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the registry database.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Whether the registry lists `layer` under `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`LayerConfigError`] when the database cannot be opened or
    /// queried.
    pub fn lists(&self, layer: &str, backend: BackendType) -> Result<bool, LayerConfigError> {
        let connection = Connection::open_with_flags(
            self.path.as_std_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| LayerConfigError::Open {
            path: self.path.clone(),
            source,
        })?;
        let count: i64 = connection
            .query_row(LAYER_QUERY, params![layer, backend.tag()], |row| row.get(0))
            .map_err(|source| LayerConfigError::Query {
                path: self.path.clone(),
                source,
            })?;
        Ok(count > 0)
    }

    /// Like [`LayerConfig::lists`], but logs failures and reports them as
    /// "not listed". Empty layer names are never listed.
    #[must_use]
    pub fn claims(&self, layer: &str, backend: BackendType) -> bool {
        if layer.is_empty() {
            return false;
        }
        self.lists(layer, backend).unwrap_or_else(|err| {
            warn!("layer registry lookup for {layer:?} failed: {err}");
            false
        })
    }
}
