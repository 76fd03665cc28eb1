//! Geometry values and geometry kinds.
//!
//! [`FeatureGeometry`] wraps a [`geo::Geometry`] together with an optional
//! EPSG code. [`GeometryKind`] names the simple-feature kinds a layer may
//! declare and knows which kinds are coherent with each other: single and
//! multi variants of the same family are interchangeable.

use std::{fmt, str::FromStr};

use geo::{Geometry, HasDimensions};
use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

/// Simple-feature geometry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// A collection of positions.
    MultiPoint,
    /// A single polyline.
    LineString,
    /// A collection of polylines.
    MultiLineString,
    /// A single polygon with optional holes.
    Polygon,
    /// A collection of polygons.
    MultiPolygon,
    /// A heterogeneous collection.
    GeometryCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeometryFamily {
    Point,
    Line,
    Polygon,
}

/// Raised when a geometry kind name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown geometry kind {name:?}")]
pub struct UnknownGeometryKind {
    /// The rejected name.
    pub name: String,
}

impl GeometryKind {
    /// Kind of a [`geo::Geometry`]. Lines map to line strings; rectangles
    /// and triangles map to polygons.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::Line(_) | Geometry::LineString(_) => Self::LineString,
            Geometry::MultiLineString(_) => Self::MultiLineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Self::Polygon,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            Geometry::GeometryCollection(_) => Self::GeometryCollection,
        }
    }

    /// Canonical simple-feature name, for example `"MultiPolygon"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::MultiPoint => "MultiPoint",
            Self::LineString => "LineString",
            Self::MultiLineString => "MultiLineString",
            Self::Polygon => "Polygon",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }

    const fn family(self) -> Option<GeometryFamily> {
        match self {
            Self::Point | Self::MultiPoint => Some(GeometryFamily::Point),
            Self::LineString | Self::MultiLineString => Some(GeometryFamily::Line),
            Self::Polygon | Self::MultiPolygon => Some(GeometryFamily::Polygon),
            Self::GeometryCollection => None,
        }
    }

    /// Whether a geometry of this kind may be stored in a layer declaring
    /// `declared`.
    ///
    /// Identical kinds always fit. Otherwise both kinds must belong to the
    /// same point, line or polygon family. Collections only fit
    /// collections.
    #[must_use]
    pub fn fits(self, declared: Self) -> bool {
        if self == declared {
            return true;
        }
        match (self.family(), declared.family()) {
            (Some(found), Some(expected)) => found == expected,
            _ => false,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryKind {
    type Err = UnknownGeometryKind;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        const KINDS: [GeometryKind; 7] = [
            GeometryKind::Point,
            GeometryKind::MultiPoint,
            GeometryKind::LineString,
            GeometryKind::MultiLineString,
            GeometryKind::Polygon,
            GeometryKind::MultiPolygon,
            GeometryKind::GeometryCollection,
        ];
        let trimmed = name.trim();
        KINDS
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownGeometryKind {
                name: name.to_owned(),
            })
    }
}

/// Errors raised when parsing WKT or EWKT text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryParseError {
    /// The `SRID=<n>;` prefix did not hold a valid code.
    #[error("invalid SRID prefix {prefix:?}")]
    InvalidSrid {
        /// Text found between `SRID=` and `;`.
        prefix: String,
    },
    /// The WKT body could not be parsed.
    #[error("invalid WKT: {message}")]
    InvalidWkt {
        /// Parser message.
        message: String,
    },
}

/// A geometry with an optional spatial reference.
///
/// An SRID of zero is treated as unknown and stored as `None`.
///
/// # Examples
///
/// ```
/// use wharyo_core::{FeatureGeometry, GeometryKind};
///
/// # fn main() -> Result<(), wharyo_core::GeometryParseError> {
/// let geometry: FeatureGeometry = "SRID=2180;POINT (1 2)".parse()?;
/// assert_eq!(geometry.srid(), Some(2180));
/// assert_eq!(geometry.kind(), GeometryKind::Point);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGeometry {
    geometry: Geometry<f64>,
    srid: Option<u32>,
}

impl FeatureGeometry {
    /// Wrap a geometry without a spatial reference.
    #[must_use]
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            srid: None,
        }
    }

    /// Attach an EPSG code. Zero clears it.
    #[must_use]
    pub fn with_srid(mut self, srid: u32) -> Self {
        self.set_srid(Some(srid));
        self
    }

    /// Replace the EPSG code. `Some(0)` is stored as `None`.
    pub fn set_srid(&mut self, srid: Option<u32>) {
        self.srid = srid.filter(|code| *code != 0);
    }

    /// EPSG code, when known.
    #[must_use]
    pub const fn srid(&self) -> Option<u32> {
        self.srid
    }

    /// Borrow the wrapped geometry.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Unwrap into the underlying geometry.
    #[must_use]
    pub fn into_geometry(self) -> Geometry<f64> {
        self.geometry
    }

    /// Simple-feature kind of the wrapped geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }

    /// Whether the geometry holds no coordinates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Render the geometry as WKT without the SRID.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        self.geometry.wkt_string()
    }

    /// Render as EWKT, prefixing `SRID=<n>;` when the SRID is known.
    #[must_use]
    pub fn to_ewkt(&self) -> String {
        match self.srid {
            Some(srid) => format!("SRID={srid};{}", self.to_wkt()),
            None => self.to_wkt(),
        }
    }
}

impl FromStr for FeatureGeometry {
    type Err = GeometryParseError;

    /// Parse WKT, optionally prefixed with `SRID=<n>;`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let (srid, body) = match split_srid(trimmed) {
            Some((prefix, body)) => {
                let code = prefix.trim().parse::<u32>().map_err(|_| {
                    GeometryParseError::InvalidSrid {
                        prefix: prefix.to_owned(),
                    }
                })?;
                (Some(code), body)
            }
            None => (None, trimmed),
        };
        let geometry = Geometry::<f64>::try_from_wkt_str(body).map_err(|err| {
            GeometryParseError::InvalidWkt {
                message: err.to_string(),
            }
        })?;
        let mut parsed = Self::new(geometry);
        parsed.set_srid(srid);
        Ok(parsed)
    }
}

fn split_srid(text: &str) -> Option<(&str, &str)> {
    let head = text.get(..5)?;
    if !head.eq_ignore_ascii_case("SRID=") {
        return None;
    }
    text.get(5..)?.split_once(';')
}

impl From<Geometry<f64>> for FeatureGeometry {
    fn from(geometry: Geometry<f64>) -> Self {
        Self::new(geometry)
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Point, coord, polygon};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(GeometryKind::Polygon, GeometryKind::MultiPolygon, true)]
    #[case(GeometryKind::MultiPolygon, GeometryKind::Polygon, true)]
    #[case(GeometryKind::Point, GeometryKind::MultiPoint, true)]
    #[case(GeometryKind::LineString, GeometryKind::MultiLineString, true)]
    #[case(GeometryKind::Point, GeometryKind::Polygon, false)]
    #[case(GeometryKind::LineString, GeometryKind::Polygon, false)]
    #[case(GeometryKind::GeometryCollection, GeometryKind::GeometryCollection, true)]
    #[case(GeometryKind::GeometryCollection, GeometryKind::MultiPoint, false)]
    fn kinds_fit_within_family(
        #[case] found: GeometryKind,
        #[case] declared: GeometryKind,
        #[case] expected: bool,
    ) {
        assert_eq!(found.fits(declared), expected);
    }

    #[rstest]
    #[case("POLYGON", GeometryKind::Polygon)]
    #[case("multipolygon", GeometryKind::MultiPolygon)]
    #[case(" LineString ", GeometryKind::LineString)]
    fn kind_names_parse_case_insensitively(#[case] name: &str, #[case] expected: GeometryKind) {
        assert_eq!(name.parse::<GeometryKind>(), Ok(expected));
    }

    #[rstest]
    fn unknown_kind_is_rejected() {
        assert!("Circle".parse::<GeometryKind>().is_err());
    }

    #[rstest]
    fn ewkt_prefix_sets_srid() {
        let geometry: FeatureGeometry = "SRID=2180;POINT(1 2)".parse().expect("valid EWKT");
        assert_eq!(geometry.srid(), Some(2180));
        assert_eq!(geometry.geometry(), &Geometry::Point(Point::new(1.0, 2.0)));
    }

    #[rstest]
    fn plain_wkt_has_no_srid() {
        let geometry: FeatureGeometry = "LINESTRING(0 0,1 1)".parse().expect("valid WKT");
        assert_eq!(geometry.srid(), None);
        assert_eq!(geometry.kind(), GeometryKind::LineString);
    }

    #[rstest]
    #[case("SRID=abc;POINT(1 2)")]
    #[case("POLYGON((0 0,1 1")]
    #[case("not wkt")]
    fn malformed_text_is_rejected(#[case] text: &str) {
        assert!(text.parse::<FeatureGeometry>().is_err());
    }

    #[rstest]
    fn zero_srid_is_unknown() {
        let geometry = FeatureGeometry::new(Point::new(0.0, 0.0)).with_srid(0);
        assert_eq!(geometry.srid(), None);
    }

    #[rstest]
    fn emptiness_follows_coordinates() {
        let empty = FeatureGeometry::new(LineString::<f64>::new(Vec::new()));
        assert!(empty.is_empty());
        let empty_multi = FeatureGeometry::new(MultiPolygon::<f64>::new(Vec::new()));
        assert!(empty_multi.is_empty());
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        assert!(!FeatureGeometry::new(square).is_empty());
    }

    #[rstest]
    fn ewkt_round_trips_through_text() {
        let geometry = FeatureGeometry::new(Point::from(coord! { x: 3.0, y: 4.0 })).with_srid(4326);
        let reparsed: FeatureGeometry = geometry.to_ewkt().parse().expect("own output parses");
        assert_eq!(reparsed, geometry);
    }
}
