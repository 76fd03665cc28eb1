//! Layer schemas and the reconciliation rules shared by all adapters.
//!
//! A [`SchemaDescriptor`] is derived from a medium's own metadata each time
//! an adapter touches a layer. Adapters use it to validate geometries, to
//! pick the attributes that may be written, and to map stored fields back to
//! attributes on read.

mod compat;

use std::fmt;

use log::{debug, warn};

use crate::{
    Attribute, AttributeType, BrokenFeatureReason, ConfigurationBrokenReason, FeatureGeometry,
    FeatureId, FeatureStoreError, GeometryKind, names_match,
};

pub use compat::{is_attribute_compatible, is_geometry_compatible};

/// Name of the field holding feature identifiers.
pub const ID_FIELD: &str = "id";

/// Native field kinds, normalised across media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Single-precision number.
    Float,
    /// Double-precision number.
    Double,
    /// Character data.
    String,
    /// Calendar date.
    Date,
    /// Date with time of day.
    Timestamp,
    /// Geometry column of the given kind.
    Geometry(GeometryKind),
    /// A native kind with no semantic mapping, named as the medium names it.
    Unsupported(String),
}

impl FieldType {
    /// The attribute type produced when reading a field of this kind, or
    /// `None` when such fields are skipped on read.
    #[must_use]
    pub const fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Self::Integer | Self::Long => Some(AttributeType::Long),
            Self::Float | Self::Double => Some(AttributeType::Double),
            Self::String => Some(AttributeType::Text),
            Self::Date | Self::Timestamp => Some(AttributeType::Date),
            Self::Geometry(_) | Self::Unsupported(_) => None,
        }
    }

    /// Whether attributes of `attribute_type` may be written to this field.
    #[must_use]
    pub const fn accepts(&self, attribute_type: AttributeType) -> bool {
        is_attribute_compatible(self, attribute_type)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("Integer"),
            Self::Long => f.write_str("Long"),
            Self::Float => f.write_str("Float"),
            Self::Double => f.write_str("Double"),
            Self::String => f.write_str("String"),
            Self::Date => f.write_str("Date"),
            Self::Timestamp => f.write_str("Timestamp"),
            Self::Geometry(kind) => write!(f, "Geometry({kind})"),
            Self::Unsupported(native) => write!(f, "Unsupported({native})"),
        }
    }
}

/// What a field is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// The primary key, mapped to [`crate::Feature::id`].
    Identifier,
    /// The geometry, mapped to [`crate::Feature::geometry`].
    Geometry,
    /// A plain attribute.
    Attribute,
}

/// One field of a layer schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    name: String,
    field_type: FieldType,
    role: FieldRole,
}

impl SchemaField {
    /// Describe a field. The role follows from the type and the name: a
    /// geometry type makes a geometry field and the name `id` (any case)
    /// makes the identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let field_name = name.into();
        let role = if matches!(field_type, FieldType::Geometry(_)) {
            FieldRole::Geometry
        } else if names_match(&field_name, ID_FIELD) {
            FieldRole::Identifier
        } else {
            FieldRole::Attribute
        };
        Self {
            name: field_name,
            field_type,
            role,
        }
    }

    /// Field name as stored by the medium.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalised field kind.
    #[must_use]
    pub const fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Role of the field.
    #[must_use]
    pub const fn role(&self) -> FieldRole {
        self.role
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

/// The record shape of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    fields: Vec<SchemaField>,
    crs: Option<u32>,
}

impl SchemaDescriptor {
    /// Build a descriptor. A CRS of zero means the layer declares none.
    #[must_use]
    pub fn new(fields: Vec<SchemaField>, crs: Option<u32>) -> Self {
        Self {
            fields,
            crs: crs.filter(|code| *code != 0),
        }
    }

    /// Fields in medium order.
    #[must_use]
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// EPSG code declared by the layer.
    #[must_use]
    pub const fn crs(&self) -> Option<u32> {
        self.crs
    }

    /// The identifier field, if the medium has one.
    #[must_use]
    pub fn identifier_field(&self) -> Option<&SchemaField> {
        self.fields
            .iter()
            .find(|field| field.role == FieldRole::Identifier)
    }

    /// Declared geometry kind, if the medium has a geometry field.
    #[must_use]
    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        self.fields.iter().find_map(|field| match field.field_type {
            FieldType::Geometry(kind) => Some(kind),
            _ => None,
        })
    }

    /// Plain attribute field matching `name` case-insensitively.
    #[must_use]
    pub fn attribute_field(&self, name: &str) -> Option<&SchemaField> {
        self.attribute_fields().find(|field| field.has_name(name))
    }

    /// Plain attribute fields in medium order.
    pub fn attribute_fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields
            .iter()
            .filter(|field| field.role == FieldRole::Attribute)
    }

    /// Return the identifier field, failing when it is absent or not an
    /// integer column.
    ///
    /// # Errors
    ///
    /// [`ConfigurationBrokenReason::InvalidIdField`] when the layer has no
    /// usable identifier field.
    pub fn require_identifier(&self, layer: &str) -> Result<&SchemaField, FeatureStoreError> {
        let Some(field) = self.identifier_field() else {
            log::error!("layer {layer:?} has no {ID_FIELD:?} field");
            return Err(FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::InvalidIdField,
                format!("no {ID_FIELD:?} field"),
            ));
        };
        if !matches!(
            field.field_type.attribute_type(),
            Some(AttributeType::Long | AttributeType::Double)
        ) {
            log::error!(
                "layer {layer:?} declares identifier field {:?} as {}",
                field.name,
                field.field_type
            );
            return Err(FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::InvalidIdField,
                format!("field {:?} has type {}", field.name, field.field_type),
            ));
        }
        Ok(field)
    }

    /// Declared geometry kind, failing when the layer has none.
    ///
    /// # Errors
    ///
    /// [`ConfigurationBrokenReason::NoGeometryMetadata`] when the schema has
    /// no geometry field.
    pub fn require_geometry_kind(&self, layer: &str) -> Result<GeometryKind, FeatureStoreError> {
        self.geometry_kind().ok_or_else(|| {
            log::error!("layer {layer:?} declares no geometry field");
            FeatureStoreError::broken_configuration(
                layer,
                ConfigurationBrokenReason::NoGeometryMetadata,
                "schema has no geometry field",
            )
        })
    }

    /// Validate a geometry about to be written to the layer.
    ///
    /// Presence and emptiness are checked first, then the layer's geometry
    /// metadata, the CRS and finally the geometry family. A geometry without
    /// an SRID is accepted with a warning, as is any geometry written to a
    /// layer that declares no CRS.
    ///
    /// # Errors
    ///
    /// [`FeatureStoreError::BrokenFeature`] for missing, empty, foreign-CRS
    /// or incoherent geometries and [`FeatureStoreError::ConfigurationBroken`]
    /// when the layer has no geometry metadata.
    pub fn check_geometry(
        &self,
        geometry: Option<&FeatureGeometry>,
        layer: &str,
    ) -> Result<GeometryKind, FeatureStoreError> {
        let candidate = require_geometry(geometry, layer)?;
        let declared = self.require_geometry_kind(layer)?;
        match (candidate.srid(), self.crs) {
            (Some(found), Some(expected)) if found != expected => {
                return Err(FeatureStoreError::broken_feature(
                    layer,
                    BrokenFeatureReason::CrsMismatch {
                        feature: found,
                        layer: expected,
                    },
                ));
            }
            (None, Some(expected)) => {
                warn!("geometry for layer {layer:?} has no CRS; assuming EPSG:{expected}");
            }
            (_, None) => debug!("layer {layer:?} declares no CRS; accepting geometry as is"),
            _ => {}
        }
        let found = candidate.kind();
        if !found.fits(declared) {
            return Err(FeatureStoreError::broken_feature(
                layer,
                BrokenFeatureReason::GeometryKindMismatch { found, declared },
            ));
        }
        Ok(declared)
    }

    /// Pair every attribute with the plain field it may be written to.
    ///
    /// Attributes naming no plain field, or whose type is incompatible with
    /// the field, are skipped without error. The identifier and geometry
    /// fields are never writable through attributes.
    #[must_use]
    pub fn writable_attributes<'a>(
        &'a self,
        attributes: &'a [Attribute],
    ) -> Vec<(&'a SchemaField, &'a Attribute)> {
        attributes
            .iter()
            .filter_map(|attribute| {
                let Some(field) = self.attribute_field(attribute.name()) else {
                    debug!("skipping attribute {:?}: no such field", attribute.name());
                    return None;
                };
                if !field.field_type.accepts(attribute.declared_type()) {
                    debug!(
                        "skipping attribute {:?}: {} does not fit field type {}",
                        attribute.name(),
                        attribute.declared_type(),
                        field.field_type
                    );
                    return None;
                }
                Some((field, attribute))
            })
            .collect()
    }
}

/// Reject a missing or empty geometry before the layer is opened.
///
/// # Errors
///
/// [`FeatureStoreError::BrokenFeature`] with
/// [`BrokenFeatureReason::MissingGeometry`] or
/// [`BrokenFeatureReason::EmptyGeometry`].
pub fn require_geometry<'a>(
    geometry: Option<&'a FeatureGeometry>,
    layer: &str,
) -> Result<&'a FeatureGeometry, FeatureStoreError> {
    let Some(candidate) = geometry else {
        return Err(FeatureStoreError::broken_feature(
            layer,
            BrokenFeatureReason::MissingGeometry,
        ));
    };
    if candidate.is_empty() {
        return Err(FeatureStoreError::broken_feature(
            layer,
            BrokenFeatureReason::EmptyGeometry,
        ));
    }
    Ok(candidate)
}

/// Next identifier for a layer holding `ids`: the maximum plus one, or one
/// for an empty layer.
///
/// Returns `None` once the identifier space is exhausted.
#[must_use]
pub fn next_feature_id(ids: impl IntoIterator<Item = FeatureId>) -> Option<FeatureId> {
    ids.into_iter().max().unwrap_or(0).checked_add(1)
}

#[cfg(test)]
mod tests;
