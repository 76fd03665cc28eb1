//! Typed, named attribute values attached to features.
//!
//! An [`Attribute`] pairs a name with a declared [`AttributeType`] and an
//! optional [`AttributeValue`]. Assigning a non-null value re-derives the
//! declared type from the value, so the two never disagree; assigning null
//! keeps the previous type.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

use crate::{PreconditionViolation, names_match};

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// Signed integer.
    Long,
    /// Double-precision floating point number.
    Double,
    /// Free text.
    Text,
    /// Truth value.
    Boolean,
    /// Calendar date with an optional time of day.
    Date,
}

impl AttributeType {
    /// Upper-case name used in messages and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Double => "DOUBLE",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Signed integer value.
    Long(i64),
    /// Floating point value.
    Double(f64),
    /// Text value.
    Text(String),
    /// Boolean value.
    Boolean(bool),
    /// Date-time value. Plain dates are held at midnight.
    Date(NaiveDateTime),
}

/// Raised when a dynamic value has no matching [`AttributeType`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot store a JSON {kind} as an attribute value")]
pub struct UnsupportedAttributeType {
    kind: &'static str,
}

impl UnsupportedAttributeType {
    /// Describe a rejected value by its kind, for example `"array"`.
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self { kind }
    }

    /// Kind of the rejected value.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

impl AttributeValue {
    /// The [`AttributeType`] this value belongs to.
    #[must_use]
    pub const fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Long(_) => AttributeType::Long,
            Self::Double(_) => AttributeType::Double,
            Self::Text(_) => AttributeType::Text,
            Self::Boolean(_) => AttributeType::Boolean,
            Self::Date(_) => AttributeType::Date,
        }
    }

    /// Classify a JSON value.
    ///
    /// `null` yields `Ok(None)`. Integral numbers that fit in `i64` become
    /// [`AttributeValue::Long`], other numbers [`AttributeValue::Double`].
    /// Strings are kept as text; no date sniffing is attempted.
    ///
    /// # Errors
    ///
    /// Arrays and objects return [`UnsupportedAttributeType`].
    pub fn from_json(value: &Value) -> Result<Option<Self>, UnsupportedAttributeType> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(flag) => Ok(Some(Self::Boolean(*flag))),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Long)
                .or_else(|| number.as_f64().map(Self::Double))
                .map(Some)
                .ok_or(UnsupportedAttributeType::new("number")),
            Value::String(text) => Ok(Some(Self::Text(text.clone()))),
            Value::Array(_) => Err(UnsupportedAttributeType::new("array")),
            Value::Object(_) => Err(UnsupportedAttributeType::new("object")),
        }
    }

    /// Integer payload, if any.
    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Floating point payload, if any.
    #[must_use]
    pub const fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Date-time payload, if any.
    #[must_use]
    pub const fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        Self::Double(f64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for AttributeValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDate> for AttributeValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value.and_time(chrono::NaiveTime::MIN))
    }
}

/// A named, typed attribute.
///
/// # Examples
///
/// ```
/// use wharyo_core::{Attribute, AttributeType, AttributeValue};
///
/// # fn main() -> Result<(), wharyo_core::PreconditionViolation> {
/// let mut attribute = Attribute::new("count", AttributeType::Text)?;
/// attribute.set_value(Some(AttributeValue::Long(3)));
/// assert_eq!(attribute.declared_type(), AttributeType::Long);
/// attribute.set_value(None);
/// assert_eq!(attribute.declared_type(), AttributeType::Long);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    declared_type: AttributeType,
    value: Option<AttributeValue>,
}

impl Attribute {
    /// Create a null attribute with the given declared type.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionViolation::EmptyAttributeName`] when `name` is
    /// empty.
    pub fn new(
        name: impl Into<String>,
        declared_type: AttributeType,
    ) -> Result<Self, PreconditionViolation> {
        let attribute_name = name.into();
        if attribute_name.is_empty() {
            return Err(PreconditionViolation::EmptyAttributeName);
        }
        Ok(Self {
            name: attribute_name,
            declared_type,
            value: None,
        })
    }

    /// Create an attribute holding `value`, typed after the value.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionViolation::EmptyAttributeName`] when `name` is
    /// empty.
    pub fn with_value(
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<Self, PreconditionViolation> {
        let attribute_value = value.into();
        let mut attribute = Self::new(name, attribute_value.attribute_type())?;
        attribute.value = Some(attribute_value);
        Ok(attribute)
    }

    /// Create an attribute from a JSON value.
    ///
    /// A JSON `null` produces a null attribute declared as
    /// [`AttributeType::Text`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::FeatureStoreError::Precondition`] for an empty name
    /// and [`crate::FeatureStoreError::UnsupportedAttributeType`] for arrays
    /// and objects.
    pub fn from_json(
        name: impl Into<String>,
        value: &Value,
    ) -> Result<Self, crate::FeatureStoreError> {
        let mut attribute = Self::new(name, AttributeType::Text)?;
        attribute.assign_json(value)?;
        Ok(attribute)
    }

    /// Attribute name as supplied by the caller.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type; always agrees with a non-null value.
    #[must_use]
    pub const fn declared_type(&self) -> AttributeType {
        self.declared_type
    }

    /// Current value, or `None` when null.
    #[must_use]
    pub const fn value(&self) -> Option<&AttributeValue> {
        self.value.as_ref()
    }

    /// Whether the attribute currently holds null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    /// Replace the value, re-deriving the declared type for non-null values.
    pub fn set_value(&mut self, value: Option<AttributeValue>) {
        if let Some(assigned) = &value {
            self.declared_type = assigned.attribute_type();
        }
        self.value = value;
    }

    /// Replace the value with a classified JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedAttributeType`] for arrays and objects; the
    /// attribute is left untouched in that case.
    pub fn assign_json(&mut self, value: &Value) -> Result<(), UnsupportedAttributeType> {
        let classified = AttributeValue::from_json(value)?;
        self.set_value(classified);
        Ok(())
    }
}
