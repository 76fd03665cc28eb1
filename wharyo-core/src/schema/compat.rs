//! Type compatibility between attribute values and backend fields.
//!
//! Both checks are pure. Attribute compatibility only accepts exact
//! semantic families; there is no backend field kind that accepts
//! booleans.

use crate::{AttributeType, FeatureGeometry, GeometryKind};

use super::FieldType;

/// Whether an attribute of `attribute_type` may be written to a field of
/// `field_type`.
///
/// # Examples
///
/// ```
/// use wharyo_core::{AttributeType, FieldType, is_attribute_compatible};
///
/// assert!(is_attribute_compatible(&FieldType::Integer, AttributeType::Long));
/// assert!(!is_attribute_compatible(&FieldType::String, AttributeType::Long));
/// ```
#[must_use]
pub const fn is_attribute_compatible(field_type: &FieldType, attribute_type: AttributeType) -> bool {
    match attribute_type {
        AttributeType::Text => matches!(field_type, FieldType::String),
        AttributeType::Long => matches!(field_type, FieldType::Integer | FieldType::Long),
        AttributeType::Double => matches!(field_type, FieldType::Float | FieldType::Double),
        AttributeType::Date => matches!(field_type, FieldType::Date | FieldType::Timestamp),
        AttributeType::Boolean => false,
    }
}

/// Whether `geometry` may be stored in a layer whose geometry kind is named
/// `declared`.
///
/// An unrecognised kind name never matches.
#[must_use]
pub fn is_geometry_compatible(geometry: &FeatureGeometry, declared: &str) -> bool {
    declared
        .parse::<GeometryKind>()
        .is_ok_and(|kind| geometry.kind().fits(kind))
}
