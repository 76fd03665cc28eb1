//! JSON rendering of command results.

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use wharyo_core::{AttributeValue, Feature, FeatureId};

use crate::CliError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Output of `create`.
#[derive(Debug, Serialize)]
pub(crate) struct Created<'a> {
    pub(crate) layer: &'a str,
    pub(crate) id: FeatureId,
}

/// Output of `get`: the geometry as EWKT and attributes keyed by name.
#[derive(Debug, Serialize)]
pub(crate) struct FeatureView {
    id: Option<FeatureId>,
    geometry: Option<String>,
    attributes: Map<String, Value>,
}

impl From<&Feature> for FeatureView {
    fn from(feature: &Feature) -> Self {
        Self {
            id: feature.id(),
            geometry: feature.geometry().map(|geometry| geometry.to_ewkt()),
            attributes: feature
                .attributes()
                .iter()
                .map(|attribute| {
                    (
                        attribute.name().to_owned(),
                        attribute.value().map_or(Value::Null, value_json),
                    )
                })
                .collect(),
        }
    }
}

fn value_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Long(number) => Value::from(*number),
        AttributeValue::Double(number) => {
            Number::from_f64(*number).map_or(Value::Null, Value::Number)
        }
        AttributeValue::Text(text) => Value::String(text.clone()),
        AttributeValue::Boolean(flag) => Value::Bool(*flag),
        AttributeValue::Date(timestamp) => {
            Value::String(timestamp.format(TIMESTAMP_FORMAT).to_string())
        }
    }
}

/// Write `payload` as pretty JSON followed by a newline.
pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, payload: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(payload).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(text.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)
}
