//! dBase field descriptors and value conversion.
//!
//! The `dbase` crate does not expose decimal counts, which decide whether a
//! numeric column holds integers, so descriptors are read from the table
//! header directly.

use chrono::{Datelike, NaiveDate};
use log::warn;
use shapefile::dbase::{self, FieldValue};
use thiserror::Error;
use wharyo_core::{AttributeValue, FeatureId, FieldType};

const DESCRIPTOR_START: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const NAME_LEN: usize = 11;
const TYPE_OFFSET: usize = 11;
const LENGTH_OFFSET: usize = 16;
const DECIMALS_OFFSET: usize = 17;
const MAX_INTEGER_DIGITS: u8 = 9;

/// Errors raised while decoding a dBase header.
#[derive(Debug, Error, PartialEq, Eq)]
pub(super) enum DbfHeaderError {
    /// The file ends before the header does.
    #[error("dBase header is truncated")]
    Truncated,
    /// A field descriptor carries no name.
    #[error("dBase field descriptor {index} has no name")]
    UnnamedField {
        /// Zero-based descriptor position.
        index: usize,
    },
}

/// One column of a dBase table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DbfField {
    name: String,
    kind: u8,
    length: u8,
    decimals: u8,
}

impl DbfField {
    pub(super) fn name(&self) -> &str {
        &self.name
    }

    /// Normalised kind. Numeric columns without decimals hold integers;
    /// logical, memo and currency columns have no attribute mapping.
    pub(super) fn field_type(&self) -> FieldType {
        match self.kind {
            b'C' => FieldType::String,
            b'N' if self.decimals == 0 && self.length <= MAX_INTEGER_DIGITS => FieldType::Integer,
            b'N' if self.decimals == 0 => FieldType::Long,
            b'N' | b'O' => FieldType::Double,
            b'F' => FieldType::Float,
            b'I' => FieldType::Integer,
            b'D' => FieldType::Date,
            other => FieldType::Unsupported(char::from(other).to_string()),
        }
    }

    /// Value stored in this column for a new row before attributes apply.
    pub(super) fn null_value(&self) -> Option<FieldValue> {
        match self.kind {
            b'C' => Some(FieldValue::Character(None)),
            b'N' => Some(FieldValue::Numeric(None)),
            b'F' => Some(FieldValue::Float(None)),
            b'D' => Some(FieldValue::Date(None)),
            b'L' => Some(FieldValue::Logical(None)),
            b'I' => Some(FieldValue::Integer(0)),
            b'O' => Some(FieldValue::Double(0.0)),
            b'Y' => Some(FieldValue::Currency(0.0)),
            b'M' => Some(FieldValue::Memo(String::new())),
            _ => None,
        }
    }

    /// Encode an identifier, or `None` when the column cannot hold it.
    pub(super) fn encode_id(&self, id: FeatureId) -> Option<FieldValue> {
        match self.kind {
            b'N' => u32::try_from(id)
                .ok()
                .map(|value| FieldValue::Numeric(Some(f64::from(value)))),
            b'O' => u32::try_from(id)
                .ok()
                .map(|value| FieldValue::Double(f64::from(value))),
            b'F' => u16::try_from(id)
                .ok()
                .map(|value| FieldValue::Float(Some(f32::from(value)))),
            b'I' => i32::try_from(id).ok().map(FieldValue::Integer),
            _ => None,
        }
    }

    /// Encode an attribute value for this column. Absent values become the
    /// column's null. Returns `None` when the value does not fit.
    pub(super) fn encode(&self, value: Option<&AttributeValue>) -> Option<FieldValue> {
        let Some(present) = value else {
            return self.null_value();
        };
        match (self.kind, present) {
            (b'C', AttributeValue::Text(text)) => {
                Some(FieldValue::Character(Some(self.fit_text(text))))
            }
            (b'N', AttributeValue::Long(number)) => Some(FieldValue::Numeric(Some(*number as f64))),
            (b'N', AttributeValue::Double(number)) => Some(FieldValue::Numeric(Some(*number))),
            (b'F', AttributeValue::Long(number)) => Some(FieldValue::Float(Some(*number as f32))),
            (b'F', AttributeValue::Double(number)) => Some(FieldValue::Float(Some(*number as f32))),
            (b'O', AttributeValue::Long(number)) => Some(FieldValue::Double(*number as f64)),
            (b'O', AttributeValue::Double(number)) => Some(FieldValue::Double(*number)),
            (b'I', AttributeValue::Long(number)) => i32::try_from(*number).ok().map(FieldValue::Integer),
            (b'D', AttributeValue::Date(timestamp)) => {
                let year = u32::try_from(timestamp.year()).ok()?;
                Some(FieldValue::Date(Some(dbase::Date::new(
                    timestamp.day(),
                    timestamp.month(),
                    year,
                ))))
            }
            _ => None,
        }
    }

    fn fit_text(&self, text: &str) -> String {
        let limit = usize::from(self.length);
        if text.len() <= limit {
            return text.to_owned();
        }
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        warn!(
            "truncating value for field {:?} to {limit} bytes",
            self.name
        );
        text.get(..end).unwrap_or_default().to_owned()
    }
}

/// Decode the field descriptors of a dBase file.
pub(super) fn parse_fields(bytes: &[u8]) -> Result<Vec<DbfField>, DbfHeaderError> {
    let raw_len: [u8; 2] = bytes
        .get(8..10)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DbfHeaderError::Truncated)?;
    let header_len = usize::from(u16::from_le_bytes(raw_len));
    let descriptors = bytes
        .get(DESCRIPTOR_START..header_len)
        .ok_or(DbfHeaderError::Truncated)?;

    let mut fields = Vec::new();
    for (index, chunk) in descriptors.chunks(DESCRIPTOR_LEN).enumerate() {
        if chunk.first() == Some(&HEADER_TERMINATOR) {
            return Ok(fields);
        }
        fields.push(parse_descriptor(index, chunk)?);
    }
    Err(DbfHeaderError::Truncated)
}

fn parse_descriptor(index: usize, chunk: &[u8]) -> Result<DbfField, DbfHeaderError> {
    let byte_at = |offset: usize| chunk.get(offset).copied().ok_or(DbfHeaderError::Truncated);
    let raw_name = chunk.get(..NAME_LEN).ok_or(DbfHeaderError::Truncated)?;
    let name_bytes = raw_name.split(|byte| *byte == 0).next().unwrap_or_default();
    let name = String::from_utf8_lossy(name_bytes).trim().to_owned();
    if name.is_empty() {
        return Err(DbfHeaderError::UnnamedField { index });
    }
    Ok(DbfField {
        name,
        kind: byte_at(TYPE_OFFSET)?.to_ascii_uppercase(),
        length: byte_at(LENGTH_OFFSET)?,
        decimals: byte_at(DECIMALS_OFFSET)?,
    })
}

/// Decode a stored value for a field of `field_type`.
pub(super) fn decode(value: &FieldValue, field_type: &FieldType) -> Option<AttributeValue> {
    let integral = matches!(field_type, FieldType::Integer | FieldType::Long);
    match value {
        FieldValue::Character(Some(text)) => Some(AttributeValue::Text(text.clone())),
        FieldValue::Numeric(Some(number)) if integral => Some(AttributeValue::Long(*number as i64)),
        FieldValue::Numeric(Some(number)) | FieldValue::Double(number) => {
            Some(AttributeValue::Double(*number))
        }
        FieldValue::Float(Some(number)) => Some(AttributeValue::Double(f64::from(*number))),
        FieldValue::Integer(number) => Some(AttributeValue::Long(i64::from(*number))),
        FieldValue::Date(Some(date)) => {
            let year = i32::try_from(date.year()).ok()?;
            NaiveDate::from_ymd_opt(year, date.month(), date.day()).map(AttributeValue::from)
        }
        _ => None,
    }
}

/// Decode a stored identifier. Only non-negative whole numbers qualify.
pub(super) fn decode_id(value: Option<&FieldValue>) -> Option<FeatureId> {
    match value? {
        FieldValue::Numeric(Some(number)) | FieldValue::Double(number) => whole_number(*number),
        FieldValue::Float(Some(number)) => whole_number(f64::from(*number)),
        FieldValue::Integer(number) => FeatureId::try_from(*number).ok(),
        _ => None,
    }
}

fn whole_number(number: f64) -> Option<FeatureId> {
    const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;
    (number.is_finite() && number >= 0.0 && number.fract() == 0.0 && number < EXACT_LIMIT)
        .then(|| number as FeatureId)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::*;

    fn descriptor(name: &str, kind: u8, length: u8, decimals: u8) -> Vec<u8> {
        let mut bytes = vec![0_u8; DESCRIPTOR_LEN];
        for (slot, byte) in bytes.iter_mut().zip(name.bytes()) {
            *slot = byte;
        }
        bytes[TYPE_OFFSET] = kind;
        bytes[LENGTH_OFFSET] = length;
        bytes[DECIMALS_OFFSET] = decimals;
        bytes
    }

    fn header(descriptors: &[Vec<u8>]) -> Vec<u8> {
        let header_len = DESCRIPTOR_START + descriptors.len() * DESCRIPTOR_LEN + 1;
        let mut bytes = vec![0_u8; DESCRIPTOR_START];
        bytes[0] = 0x03;
        let encoded = u16::try_from(header_len).expect("small header").to_le_bytes();
        bytes[8] = encoded[0];
        bytes[9] = encoded[1];
        for entry in descriptors {
            bytes.extend_from_slice(entry);
        }
        bytes.push(HEADER_TERMINATOR);
        bytes
    }

    fn field(kind: u8, length: u8, decimals: u8) -> DbfField {
        DbfField {
            name: "value".to_owned(),
            kind,
            length,
            decimals,
        }
    }

    #[rstest]
    fn descriptors_are_decoded_in_order() {
        let bytes = header(&[
            descriptor("id", b'N', 10, 0),
            descriptor("name", b'C', 50, 0),
            descriptor("count", b'N', 10, 2),
            descriptor("date", b'D', 8, 0),
        ]);
        let fields = parse_fields(&bytes).expect("valid header");
        let summary: Vec<(&str, FieldType)> = fields
            .iter()
            .map(|field| (field.name(), field.field_type()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("id", FieldType::Long),
                ("name", FieldType::String),
                ("count", FieldType::Double),
                ("date", FieldType::Date),
            ]
        );
    }

    #[rstest]
    fn truncated_headers_are_rejected() {
        let mut bytes = header(&[descriptor("id", b'N', 10, 0)]);
        bytes.truncate(40);
        assert_eq!(parse_fields(&bytes), Err(DbfHeaderError::Truncated));
        assert_eq!(parse_fields(&[0_u8; 4]), Err(DbfHeaderError::Truncated));
    }

    #[rstest]
    #[case(b'N', 9, 0, FieldType::Integer)]
    #[case(b'N', 18, 0, FieldType::Long)]
    #[case(b'N', 12, 3, FieldType::Double)]
    #[case(b'F', 12, 3, FieldType::Float)]
    #[case(b'I', 4, 0, FieldType::Integer)]
    #[case(b'L', 1, 0, FieldType::Unsupported("L".to_owned()))]
    fn kinds_are_normalised(
        #[case] kind: u8,
        #[case] length: u8,
        #[case] decimals: u8,
        #[case] expected: FieldType,
    ) {
        assert_eq!(field(kind, length, decimals).field_type(), expected);
    }

    #[rstest]
    #[case(FieldValue::Numeric(Some(3.0)), Some(3))]
    #[case(FieldValue::Numeric(Some(3.5)), None)]
    #[case(FieldValue::Numeric(Some(-1.0)), None)]
    #[case(FieldValue::Numeric(None), None)]
    #[case(FieldValue::Integer(12), Some(12))]
    #[case(FieldValue::Character(Some("3".to_owned())), None)]
    fn identifiers_must_be_whole_numbers(
        #[case] value: FieldValue,
        #[case] expected: Option<FeatureId>,
    ) {
        assert_eq!(decode_id(Some(&value)), expected);
    }

    #[rstest]
    fn numeric_values_follow_the_field_type() {
        let value = FieldValue::Numeric(Some(4.0));
        assert_eq!(decode(&value, &FieldType::Long), Some(AttributeValue::Long(4)));
        assert_eq!(
            decode(&value, &FieldType::Double),
            Some(AttributeValue::Double(4.0))
        );
    }

    #[rstest]
    fn dates_survive_encoding() {
        let day = NaiveDate::from_ymd_opt(2021, 3, 14).expect("valid date");
        let encoded = field(b'D', 8, 0)
            .encode(Some(&AttributeValue::from(day)))
            .expect("date fits");
        assert_eq!(
            decode(&encoded, &FieldType::Date),
            Some(AttributeValue::from(day))
        );
    }

    #[rstest]
    fn mismatched_values_do_not_encode() {
        assert!(field(b'I', 4, 0).encode(Some(&AttributeValue::Long(i64::MAX))).is_none());
        assert!(field(b'C', 10, 0).encode(Some(&AttributeValue::Double(1.0))).is_none());
        assert_eq!(
            field(b'C', 10, 0).encode(None),
            Some(FieldValue::Character(None))
        );
    }

    #[rstest]
    fn long_text_is_truncated_on_a_char_boundary() {
        let encoded = field(b'C', 4, 0).encode(Some(&AttributeValue::from("abcé")));
        assert_eq!(encoded, Some(FieldValue::Character(Some("abc".to_owned()))));
    }
}
