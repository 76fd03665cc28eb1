//! Layer sources shared by every command and the service built from them.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use wharyo_core::{FeatureService, LayerRouter};
use wharyo_data::{DatabaseStore, GeoJsonStore, LayerConfig, ShapefileStore, WfsStore};

use crate::CliError;

pub(crate) const ARG_SHAPEFILE_HOME: &str = "shapefile-home";
pub(crate) const ARG_GEOJSON_HOME: &str = "geojson-home";
pub(crate) const ARG_LAYER_CONFIG_DB: &str = "layer-config-db";

/// Where layers live. Every source is optional; a layer no source claims is
/// reported as unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LayerSources {
    /// Directory holding one sub-directory per shapefile layer.
    pub(crate) shapefile_home: Option<Utf8PathBuf>,
    /// Directory holding one sub-directory per GeoJSON layer.
    pub(crate) geojson_home: Option<Utf8PathBuf>,
    /// SQLite database holding the `layer_config` table.
    pub(crate) layer_config_db: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum Expected {
    File,
    Directory,
}

impl Expected {
    const fn noun(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }

    fn probe(self, path: &Utf8Path) -> std::io::Result<bool> {
        match self {
            Self::File => wharyo_fs::file_is_file(path),
            Self::Directory => wharyo_fs::dir_is_dir(path),
        }
    }
}

impl LayerSources {
    /// Check that every configured path exists with the expected kind.
    pub(crate) fn validate(&self) -> Result<(), CliError> {
        if let Some(home) = &self.shapefile_home {
            Self::require(home, ARG_SHAPEFILE_HOME, Expected::Directory)?;
        }
        if let Some(home) = &self.geojson_home {
            Self::require(home, ARG_GEOJSON_HOME, Expected::Directory)?;
        }
        if let Some(db) = &self.layer_config_db {
            Self::require(db, ARG_LAYER_CONFIG_DB, Expected::File)?;
        }
        Ok(())
    }

    fn require(path: &Utf8Path, field: &'static str, expected: Expected) -> Result<(), CliError> {
        let inspect = |source| CliError::InspectSource {
            field,
            path: path.to_path_buf(),
            source,
        };
        if !wharyo_fs::path_exists(path).map_err(inspect)? {
            return Err(CliError::MissingSource {
                field,
                path: path.to_path_buf(),
            });
        }
        if expected.probe(path).map_err(inspect)? {
            Ok(())
        } else {
            Err(CliError::SourceKind {
                field,
                path: path.to_path_buf(),
                expected: expected.noun(),
            })
        }
    }

    /// Build a service registering adapters in resolution order: database,
    /// shapefile, GeoJSON, WFS.
    pub(crate) fn service(&self) -> FeatureService {
        let mut router = LayerRouter::new();
        if let Some(db) = &self.layer_config_db {
            router.register(DatabaseStore::new(LayerConfig::new(db.clone())));
        }
        if let Some(home) = &self.shapefile_home {
            router.register(ShapefileStore::new(home.clone()));
        }
        if let Some(home) = &self.geojson_home {
            router.register(GeoJsonStore::new(home.clone()));
        }
        router.register(WfsStore::new());
        if self.shapefile_home.is_none() && self.geojson_home.is_none() {
            warn!("no layer home configured; only registered database layers resolve");
        }
        debug!("routing across {} adapters", router.len());
        FeatureService::new(router)
    }
}
