//! `create` command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wharyo_core::{Attribute, FeatureGeometry};

use crate::{
    ARG_ATTRIBUTES, ARG_GEOMETRY, ARG_LAYER, CliError, ENV_CREATE_LAYER,
    output::{Created, write_json},
    sources::{ARG_GEOJSON_HOME, ARG_LAYER_CONFIG_DB, ARG_SHAPEFILE_HOME, LayerSources},
};

/// CLI arguments for the `create` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Persist a feature into a layer. The layer is resolved \
                 against the configured sources in order: registered \
                 database layers, shapefile layers, GeoJSON layers.",
    about = "Create a feature"
)]
#[ortho_config(prefix = "WHARYO")]
pub(crate) struct CreateArgs {
    /// Name of the target layer.
    #[arg(long = ARG_LAYER, value_name = "name")]
    #[serde(default)]
    pub(crate) layer: Option<String>,
    /// Geometry as WKT, optionally prefixed with `SRID=<n>;`.
    #[arg(long = ARG_GEOMETRY, value_name = "ewkt")]
    #[serde(default)]
    pub(crate) geometry: Option<String>,
    /// Attributes as a JSON object.
    #[arg(long = ARG_ATTRIBUTES, value_name = "json")]
    #[serde(default)]
    pub(crate) attributes: Option<String>,
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

impl CreateArgs {
    fn into_config(self) -> Result<CreateConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CreateConfig::try_from(merged)
    }
}

/// Resolved `create` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct CreateConfig {
    pub(crate) sources: LayerSources,
    pub(crate) layer: String,
    pub(crate) geometry: Option<FeatureGeometry>,
    pub(crate) attributes: Vec<Attribute>,
}

impl TryFrom<CreateArgs> for CreateConfig {
    type Error = CliError;

    fn try_from(args: CreateArgs) -> Result<Self, Self::Error> {
        let layer = args.layer.ok_or(CliError::MissingArgument {
            field: ARG_LAYER,
            env: ENV_CREATE_LAYER,
        })?;
        let geometry = args
            .geometry
            .as_deref()
            .map(str::parse::<FeatureGeometry>)
            .transpose()
            .map_err(CliError::InvalidGeometry)?;
        let attributes = args
            .attributes
            .as_deref()
            .map(parse_attributes)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            sources: LayerSources {
                shapefile_home: args.shapefile_home,
                geojson_home: args.geojson_home,
                layer_config_db: args.layer_config_db,
            },
            layer,
            geometry,
            attributes,
        })
    }
}

pub(crate) fn parse_attributes(text: &str) -> Result<Vec<Attribute>, CliError> {
    let object: Map<String, Value> =
        serde_json::from_str(text).map_err(CliError::InvalidAttributes)?;
    object
        .iter()
        .map(|(name, value)| Attribute::from_json(name.as_str(), value).map_err(CliError::from))
        .collect()
}

pub(crate) fn run_create(args: CreateArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    execute_create(args.into_config()?, writer)
}

pub(crate) fn execute_create(config: CreateConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    config.sources.validate()?;
    let service = config.sources.service();
    let id = service.create_feature(config.attributes, config.geometry, &config.layer)?;
    write_json(
        writer,
        &Created {
            layer: &config.layer,
            id,
        },
    )
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<CreateConfig, CliError> {
    let merged = CreateArgs::merge_from_layers(layers).map_err(CliError::from)?;
    CreateConfig::try_from(merged)
}
