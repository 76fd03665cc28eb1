//! `get` command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use wharyo_core::FeatureId;

use crate::{
    ARG_ID, ARG_LAYER, CliError, ENV_GET_ID, ENV_GET_LAYER,
    output::{FeatureView, write_json},
    sources::{ARG_GEOJSON_HOME, ARG_LAYER_CONFIG_DB, ARG_SHAPEFILE_HOME, LayerSources},
};

/// CLI arguments for the `get` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print a feature as JSON")]
#[ortho_config(prefix = "WHARYO")]
pub(crate) struct GetArgs {
    /// Name of the layer to read.
    #[arg(long = ARG_LAYER, value_name = "name")]
    #[serde(default)]
    pub(crate) layer: Option<String>,
    /// Identifier of the feature.
    #[arg(long = ARG_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<FeatureId>,
    /// Directory holding shapefile layers.
    #[arg(long = ARG_SHAPEFILE_HOME, value_name = "dir")]
    #[serde(default)]
    pub(crate) shapefile_home: Option<Utf8PathBuf>,
    /// Directory holding GeoJSON layers.
    #[arg(long = ARG_GEOJSON_HOME, value_name = "dir")]
    #[serde(default)]
    pub(crate) geojson_home: Option<Utf8PathBuf>,
    /// SQLite database mapping layers to backends.
    #[arg(long = ARG_LAYER_CONFIG_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) layer_config_db: Option<Utf8PathBuf>,
}

impl GetArgs {
    fn into_config(self) -> Result<GetConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        GetConfig::try_from(merged)
    }
}

/// Resolved `get` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GetConfig {
    pub(crate) sources: LayerSources,
    pub(crate) layer: String,
    pub(crate) id: FeatureId,
}

impl TryFrom<GetArgs> for GetConfig {
    type Error = CliError;

    fn try_from(args: GetArgs) -> Result<Self, Self::Error> {
        let layer = args.layer.ok_or(CliError::MissingArgument {
            field: ARG_LAYER,
            env: ENV_GET_LAYER,
        })?;
        let id = args.id.ok_or(CliError::MissingArgument {
            field: ARG_ID,
            env: ENV_GET_ID,
        })?;
        Ok(Self {
            sources: LayerSources {
                shapefile_home: args.shapefile_home,
                geojson_home: args.geojson_home,
                layer_config_db: args.layer_config_db,
            },
            layer,
            id,
        })
    }
}

pub(crate) fn run_get(args: GetArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    execute_get(&args.into_config()?, writer)
}

pub(crate) fn execute_get(config: &GetConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    config.sources.validate()?;
    let service = config.sources.service();
    let feature = service
        .get_feature(config.id, &config.layer)?
        .ok_or_else(|| CliError::FeatureNotFound {
            id: config.id,
            layer: config.layer.clone(),
        })?;
    write_json(writer, &FeatureView::from(&feature))
}
