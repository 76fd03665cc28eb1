//! Layer documents: a GeoJSON `FeatureCollection` carrying its schema and
//! CRS as foreign members.
//!
//! ```json
//! {
//!   "type": "FeatureCollection",
//!   "crs": {"type": "name", "properties": {"name": "EPSG:2180"}},
//!   "schema": {
//!     "geometry": "Polygon",
//!     "properties": [{"name": "name", "type": "String"}]
//!   },
//!   "features": []
//! }
//! ```
//!
//! Documents without a `schema` member have their schema inferred from the
//! first feature.

use chrono::{NaiveDate, NaiveDateTime};
use geojson::{FeatureCollection, GeoJson, JsonObject, feature::Id};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};
use wharyo_core::{
    AttributeValue, ConfigurationBrokenReason, FeatureId, FeatureStoreError, FieldRole, FieldType,
    GeometryKind, SchemaDescriptor, SchemaField,
};

const CRS_MEMBER: &str = "crs";
const SCHEMA_MEMBER: &str = "schema";
const ID_FIELD: &str = "id";
const GEOMETRY_FIELD: &str = "geometry";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize, Deserialize)]
struct PropertyMember {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct SchemaMember {
    geometry: String,
    properties: Vec<PropertyMember>,
}

/// A parsed layer document and the schema derived from it.
#[derive(Debug)]
pub(super) struct LayerDocument {
    pub(super) collection: FeatureCollection,
    pub(super) schema: SchemaDescriptor,
}

fn broken(layer: &str, reason: ConfigurationBrokenReason, detail: String) -> FeatureStoreError {
    log::error!("layer {layer:?} is misconfigured: {detail}");
    FeatureStoreError::broken_configuration(layer, reason, detail)
}

impl LayerDocument {
    /// Parse a layer document.
    ///
    /// # Errors
    ///
    /// [`ConfigurationBrokenReason::NoAttributeMetadata`] for text that is
    /// not a feature collection or has malformed property declarations, and
    /// [`ConfigurationBrokenReason::NoGeometryMetadata`] when no geometry
    /// kind can be determined.
    pub(super) fn parse(text: &str, layer: &str) -> Result<Self, FeatureStoreError> {
        let parsed = text.parse::<GeoJson>().map_err(|err| {
            broken(layer, ConfigurationBrokenReason::NoAttributeMetadata, err.to_string())
        })?;
        let GeoJson::FeatureCollection(collection) = parsed else {
            return Err(broken(
                layer,
                ConfigurationBrokenReason::NoAttributeMetadata,
                "document is not a feature collection".to_owned(),
            ));
        };
        let members = collection.foreign_members.as_ref();
        let crs = members.and_then(|map| map.get(CRS_MEMBER)).and_then(|crs| {
            let code = parse_crs(crs);
            if code.is_none() {
                warn!("layer {layer:?} declares an unreadable CRS: {crs}");
            }
            code
        });
        let fields = match members.and_then(|map| map.get(SCHEMA_MEMBER)) {
            Some(declared) => declared_fields(declared, layer)?,
            None => inferred_fields(&collection, layer)?,
        };
        Ok(Self {
            collection,
            schema: SchemaDescriptor::new(fields, crs),
        })
    }

    /// Serialise the document, recording the schema and CRS members.
    ///
    /// # Errors
    ///
    /// Fails when serialisation fails.
    pub(super) fn render(mut self) -> Result<Vec<u8>, serde_json::Error> {
        let members = self
            .collection
            .foreign_members
            .get_or_insert_with(JsonObject::new);
        members.insert(SCHEMA_MEMBER.to_owned(), schema_member(&self.schema)?);
        if let Some(code) = self.schema.crs() {
            members.insert(
                CRS_MEMBER.to_owned(),
                json!({"type": "name", "properties": {"name": format!("EPSG:{code}")}}),
            );
        }
        serde_json::to_vec_pretty(&self.collection)
    }
}

/// EPSG code in a named CRS member: `EPSG:2180` or
/// `urn:ogc:def:crs:EPSG::2180`.
pub(super) fn parse_crs(member: &Value) -> Option<u32> {
    let name = member.pointer("/properties/name")?.as_str()?;
    let (_, code) = name.rsplit_once(':')?;
    code.trim().parse().ok().filter(|code| *code != 0)
}

fn field_type_named(name: &str) -> FieldType {
    match name.to_ascii_lowercase().as_str() {
        "string" => FieldType::String,
        "integer" => FieldType::Integer,
        "long" => FieldType::Long,
        "float" => FieldType::Float,
        "double" => FieldType::Double,
        "date" => FieldType::Date,
        "timestamp" => FieldType::Timestamp,
        _ => FieldType::Unsupported(name.to_owned()),
    }
}

fn field_type_name(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Unsupported(native) => native.clone(),
        other => other.to_string(),
    }
}

fn identifier_and_geometry(kind: GeometryKind) -> Vec<SchemaField> {
    vec![
        SchemaField::new(GEOMETRY_FIELD, FieldType::Geometry(kind)),
        SchemaField::new(ID_FIELD, FieldType::Long),
    ]
}

fn declared_fields(declared: &Value, layer: &str) -> Result<Vec<SchemaField>, FeatureStoreError> {
    let kind = declared
        .get("geometry")
        .and_then(Value::as_str)
        .and_then(|name| name.parse::<GeometryKind>().ok())
        .ok_or_else(|| {
            broken(
                layer,
                ConfigurationBrokenReason::NoGeometryMetadata,
                "schema declares no known geometry kind".to_owned(),
            )
        })?;
    let properties = declared
        .get("properties")
        .cloned()
        .ok_or_else(|| {
            broken(
                layer,
                ConfigurationBrokenReason::NoAttributeMetadata,
                "schema declares no properties".to_owned(),
            )
        })
        .and_then(|properties| {
            serde_json::from_value::<Vec<PropertyMember>>(properties).map_err(|err| {
                broken(layer, ConfigurationBrokenReason::NoAttributeMetadata, err.to_string())
            })
        })?;
    let mut fields = identifier_and_geometry(kind);
    fields.extend(
        properties
            .iter()
            .filter(|property| !property.name.eq_ignore_ascii_case(ID_FIELD))
            .map(|property| SchemaField::new(&property.name, field_type_named(&property.kind))),
    );
    Ok(fields)
}

fn geometry_kind_of(value: &geojson::Value) -> GeometryKind {
    match value {
        geojson::Value::Point(_) => GeometryKind::Point,
        geojson::Value::MultiPoint(_) => GeometryKind::MultiPoint,
        geojson::Value::LineString(_) => GeometryKind::LineString,
        geojson::Value::MultiLineString(_) => GeometryKind::MultiLineString,
        geojson::Value::Polygon(_) => GeometryKind::Polygon,
        geojson::Value::MultiPolygon(_) => GeometryKind::MultiPolygon,
        geojson::Value::GeometryCollection(_) => GeometryKind::GeometryCollection,
    }
}

fn inferred_type(value: &Value) -> Option<FieldType> {
    match value {
        Value::Null => None,
        Value::String(_) => Some(FieldType::String),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(FieldType::Long),
        Value::Number(_) => Some(FieldType::Double),
        Value::Bool(_) => Some(FieldType::Unsupported("Boolean".to_owned())),
        Value::Array(_) => Some(FieldType::Unsupported("Array".to_owned())),
        Value::Object(_) => Some(FieldType::Unsupported("Object".to_owned())),
    }
}

fn inferred_fields(
    collection: &FeatureCollection,
    layer: &str,
) -> Result<Vec<SchemaField>, FeatureStoreError> {
    let Some(first) = collection.features.first() else {
        return Err(broken(
            layer,
            ConfigurationBrokenReason::NoGeometryMetadata,
            "no schema member and no features to infer one from".to_owned(),
        ));
    };
    let kind = first
        .geometry
        .as_ref()
        .map(|geometry| geometry_kind_of(&geometry.value))
        .ok_or_else(|| {
            broken(
                layer,
                ConfigurationBrokenReason::NoGeometryMetadata,
                "first feature has no geometry".to_owned(),
            )
        })?;
    debug!("inferring schema of layer {layer:?} from its first feature");
    let mut fields = identifier_and_geometry(kind);
    if let Some(properties) = &first.properties {
        fields.extend(properties.iter().filter_map(|(name, value)| {
            if name.eq_ignore_ascii_case(ID_FIELD) {
                return None;
            }
            inferred_type(value).map(|field_type| SchemaField::new(name, field_type))
        }));
    }
    Ok(fields)
}

fn schema_member(schema: &SchemaDescriptor) -> Result<Value, serde_json::Error> {
    let member = SchemaMember {
        geometry: schema
            .geometry_kind()
            .map(|kind| kind.as_str().to_owned())
            .unwrap_or_default(),
        properties: schema
            .fields()
            .iter()
            .filter(|field| field.role() == FieldRole::Attribute)
            .map(|field| PropertyMember {
                name: field.name().to_owned(),
                kind: field_type_name(field.field_type()),
            })
            .collect(),
    };
    serde_json::to_value(member)
}

/// Identifier held by a feature's `id` member.
pub(super) fn feature_id(id: Option<&Id>) -> Option<FeatureId> {
    match id? {
        Id::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| *value >= 0.0 && value.fract() == 0.0 && *value < 9.007_199_254_740_992e15)
                .map(|value| value as FeatureId)
        }),
        Id::String(text) => text.trim().parse().ok(),
    }
}

/// Property lookup by exact name, falling back to a case-insensitive match.
pub(super) fn property<'a>(properties: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    properties.get(name).or_else(|| {
        properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|day| day.and_time(chrono::NaiveTime::MIN))
        })
}

/// Decode a stored property for a field of `field_type`.
pub(super) fn decode(value: &Value, field_type: &FieldType, name: &str) -> Option<AttributeValue> {
    let decoded = match (field_type, value) {
        (_, Value::Null) => return None,
        (FieldType::Integer | FieldType::Long, Value::Number(number)) => {
            number.as_i64().map(AttributeValue::Long)
        }
        (FieldType::Float | FieldType::Double, Value::Number(number)) => {
            number.as_f64().map(AttributeValue::Double)
        }
        (FieldType::String, Value::String(text)) => Some(AttributeValue::Text(text.clone())),
        (FieldType::Date | FieldType::Timestamp, Value::String(text)) => {
            parse_date(text).map(AttributeValue::Date)
        }
        _ => None,
    };
    if decoded.is_none() {
        warn!("property {name:?} holds {value}, which does not fit {field_type}");
    }
    decoded
}

/// Encode an attribute value for a field of `field_type`. Absent values
/// become JSON null; `None` means the value has no JSON form.
pub(super) fn encode(value: Option<&AttributeValue>, field_type: &FieldType) -> Option<Value> {
    let Some(present) = value else {
        return Some(Value::Null);
    };
    match present {
        AttributeValue::Long(number) => Some(Value::from(*number)),
        AttributeValue::Double(number) => Number::from_f64(*number).map(Value::Number),
        AttributeValue::Text(text) => Some(Value::String(text.clone())),
        AttributeValue::Boolean(flag) => Some(Value::Bool(*flag)),
        AttributeValue::Date(timestamp) => {
            let format = if matches!(field_type, FieldType::Timestamp) {
                TIMESTAMP_FORMAT
            } else {
                DATE_FORMAT
            };
            Some(Value::String(timestamp.format(format).to_string()))
        }
    }
}
