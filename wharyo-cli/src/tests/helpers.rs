//! Test helpers building layer homes for CLI commands.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tempfile::TempDir;
use wharyo_data::test_support::{parcels_geojson, write_geojson_layer, write_parcels_shapefile};

use crate::sources::LayerSources;

/// A temporary home holding the `parcels` shapefile layer and the `plots`
/// GeoJSON layer, both with features 1 to 3.
#[derive(Debug)]
pub(super) struct LayerHome {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl LayerHome {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        write_parcels_shapefile(&root, "parcels").expect("write parcels");
        write_geojson_layer(&root, "plots", &parcels_geojson()).expect("write plots");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn sources(&self) -> LayerSources {
        LayerSources {
            shapefile_home: Some(self.root.clone()),
            geojson_home: Some(self.root.clone()),
            layer_config_db: None,
        }
    }

    /// Flags pointing both layer homes at this directory.
    pub(super) fn home_flags(&self) -> Vec<String> {
        vec![
            "--shapefile-home".to_owned(),
            self.root.to_string(),
            "--geojson-home".to_owned(),
            self.root.to_string(),
        ]
    }
}

pub(super) fn parse_output(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("command output is JSON")
}
