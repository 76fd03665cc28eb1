//! Conversion between shapefile records and `geo` geometries.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use shapefile::{Multipoint, PolygonRing, Polyline, Shape, ShapeType};
use wharyo_core::GeometryKind;

/// Byte offset of the shape type in `.shp` and `.shx` headers.
pub(super) const SHAPE_TYPE_OFFSET: u64 = 32;

/// Geometry kind declared by a shape header. Z, M, multipatch and null
/// layers have none.
pub(super) const fn declared_kind(shape_type: ShapeType) -> Option<GeometryKind> {
    match shape_type {
        ShapeType::Point => Some(GeometryKind::Point),
        ShapeType::Multipoint => Some(GeometryKind::MultiPoint),
        ShapeType::Polyline => Some(GeometryKind::MultiLineString),
        ShapeType::Polygon => Some(GeometryKind::MultiPolygon),
        _ => None,
    }
}

/// Header code for the shape types that can be written.
pub(super) const fn shape_type_code(shape_type: ShapeType) -> Option<i32> {
    match shape_type {
        ShapeType::Point => Some(1),
        ShapeType::Polyline => Some(3),
        ShapeType::Polygon => Some(5),
        ShapeType::Multipoint => Some(8),
        _ => None,
    }
}

/// EPSG code of the outermost CRS in a `.prj` definition.
pub(super) fn prj_epsg(definition: &str) -> Option<u32> {
    let upper = definition.to_ascii_uppercase();
    let (_, tail) = upper.rsplit_once("AUTHORITY[")?;
    let (body, _) = tail.split_once(']')?;
    let (authority, code) = body.split_once(',')?;
    if authority.trim().trim_matches('"') != "EPSG" {
        return None;
    }
    code.trim().trim_matches('"').parse().ok()
}

const fn coord(point: &shapefile::Point) -> Coord<f64> {
    Coord {
        x: point.x,
        y: point.y,
    }
}

fn line_string(points: &[shapefile::Point]) -> LineString<f64> {
    LineString::new(points.iter().map(coord).collect())
}

/// Geometry held by a shape, or `None` for null and unsupported shapes.
pub(super) fn to_geometry(shape: &Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Point(point) => Some(Geometry::Point(coord(point).into())),
        Shape::Multipoint(multipoint) => Some(Geometry::MultiPoint(MultiPoint::new(
            multipoint
                .points()
                .iter()
                .map(|point| coord(point).into())
                .collect(),
        ))),
        Shape::Polyline(polyline) => {
            let mut parts: Vec<LineString<f64>> =
                polyline.parts().iter().map(|part| line_string(part)).collect();
            if parts.len() == 1 {
                parts.pop().map(Geometry::LineString)
            } else {
                Some(Geometry::MultiLineString(MultiLineString::new(parts)))
            }
        }
        Shape::Polygon(polygon) => {
            let mut polygons = group_rings(polygon.rings());
            match polygons.len() {
                0 => None,
                1 => polygons.pop().map(Geometry::Polygon),
                _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
            }
        }
        _ => None,
    }
}

/// Each outer ring opens a polygon; inner rings attach to the latest one.
fn group_rings(rings: &[PolygonRing<shapefile::Point>]) -> Vec<Polygon<f64>> {
    let mut grouped: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        let boundary = line_string(ring.points());
        match (ring, grouped.last_mut()) {
            (PolygonRing::Inner(_), Some((_, holes))) => holes.push(boundary),
            _ => grouped.push((boundary, Vec::new())),
        }
    }
    grouped
        .into_iter()
        .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
        .collect()
}

fn normalise(geometry: &Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Line(line) => Geometry::LineString(LineString::new(vec![line.start, line.end])),
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        Geometry::Triangle(triangle) => Geometry::Polygon(triangle.to_polygon()),
        other => other.clone(),
    }
}

fn shape_point(coord: Coord<f64>) -> shapefile::Point {
    shapefile::Point::new(coord.x, coord.y)
}

/// Encode `geometry` as a shape of `shape_type`.
///
/// # Errors
///
/// Returns a description of the limitation when the geometry has no
/// encoding in the layer's shape type.
pub(super) fn to_shape(geometry: &Geometry<f64>, shape_type: ShapeType) -> Result<Shape, String> {
    match (shape_type, normalise(geometry)) {
        (ShapeType::Point, Geometry::Point(point)) => Ok(Shape::Point(shape_point(point.0))),
        (ShapeType::Point, Geometry::MultiPoint(points)) if points.0.len() == 1 => points
            .0
            .first()
            .map(|point| Shape::Point(shape_point(point.0)))
            .ok_or_else(|| "multipoint has no point".to_owned()),
        (ShapeType::Multipoint, Geometry::Point(point)) => Ok(Shape::Multipoint(
            Multipoint::new(vec![shape_point(point.0)]),
        )),
        (ShapeType::Multipoint, Geometry::MultiPoint(points)) => Ok(Shape::Multipoint(
            Multipoint::new(points.iter().map(|point| shape_point(point.0)).collect()),
        )),
        (ShapeType::Polyline, Geometry::LineString(line)) => polyline(&[line]),
        (ShapeType::Polyline, Geometry::MultiLineString(lines)) => polyline(&lines.0),
        (ShapeType::Polygon, Geometry::Polygon(polygon)) => polygon_shape(&[polygon]),
        (ShapeType::Polygon, Geometry::MultiPolygon(polygons)) => polygon_shape(&polygons.0),
        (other, unsupported) => Err(format!(
            "{} cannot be stored in a {other:?} shapefile",
            GeometryKind::of(&unsupported)
        )),
    }
}

fn polyline(lines: &[LineString<f64>]) -> Result<Shape, String> {
    if lines.is_empty() {
        return Err("polyline has no parts".to_owned());
    }
    let mut parts: Vec<Vec<shapefile::Point>> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.0.len() < 2 {
            return Err("polyline parts need at least two points".to_owned());
        }
        parts.push(line.coords().copied().map(shape_point).collect());
    }
    Ok(Shape::Polyline(Polyline::with_parts(parts)))
}

fn polygon_shape(polygons: &[Polygon<f64>]) -> Result<Shape, String> {
    let mut rings = Vec::new();
    for polygon in polygons {
        rings.push(PolygonRing::Outer(ring_points(polygon.exterior())?));
        for interior in polygon.interiors() {
            rings.push(PolygonRing::Inner(ring_points(interior)?));
        }
    }
    if rings.is_empty() {
        return Err("polygon has no rings".to_owned());
    }
    Ok(Shape::Polygon(shapefile::Polygon::with_rings(rings)))
}

fn ring_points(ring: &LineString<f64>) -> Result<Vec<shapefile::Point>, String> {
    if ring.0.len() < 4 {
        return Err("polygon rings need at least four points".to_owned());
    }
    Ok(ring.coords().copied().map(shape_point).collect())
}

#[cfg(test)]
mod tests {
    use geo::{Line, MultiPoint, Point, Rect, polygon};
    use rstest::rstest;

    use super::*;

    fn square(offset: f64) -> Polygon<f64> {
        polygon![
            (x: offset, y: 0.0),
            (x: offset + 1.0, y: 0.0),
            (x: offset + 1.0, y: 1.0),
            (x: offset, y: 1.0),
            (x: offset, y: 0.0),
        ]
    }

    #[rstest]
    #[case("PROJCS[\"ETRS89 / Poland CS92\",GEOGCS[\"ETRS89\",AUTHORITY[\"EPSG\",\"4258\"]],AUTHORITY[\"EPSG\",\"2180\"]]", Some(2180))]
    #[case("GEOGCS[\"WGS 84\",authority[\"epsg\",\"4326\"]]", Some(4326))]
    #[case("PROJCS[\"Local\",AUTHORITY[\"ESRI\",\"102100\"]]", None)]
    #[case("PROJCS[\"Unnamed\"]", None)]
    fn prj_authority_is_read(#[case] definition: &str, #[case] expected: Option<u32>) {
        assert_eq!(prj_epsg(definition), expected);
    }

    #[rstest]
    #[case(ShapeType::Polygon, Some(GeometryKind::MultiPolygon))]
    #[case(ShapeType::Polyline, Some(GeometryKind::MultiLineString))]
    #[case(ShapeType::PointZ, None)]
    #[case(ShapeType::NullShape, None)]
    fn header_kinds(#[case] shape_type: ShapeType, #[case] expected: Option<GeometryKind>) {
        assert_eq!(declared_kind(shape_type), expected);
    }

    #[rstest]
    fn single_polygons_round_trip() {
        let geometry = Geometry::Polygon(square(0.0));
        let shape = to_shape(&geometry, ShapeType::Polygon).expect("encodable");
        let decoded = to_geometry(&shape).expect("decodable");
        assert_eq!(GeometryKind::of(&decoded), GeometryKind::Polygon);
    }

    #[rstest]
    fn multi_polygons_keep_every_part() {
        let geometry = Geometry::MultiPolygon(MultiPolygon::new(vec![square(0.0), square(5.0)]));
        let shape = to_shape(&geometry, ShapeType::Polygon).expect("encodable");
        match to_geometry(&shape) {
            Some(Geometry::MultiPolygon(decoded)) => assert_eq!(decoded.0.len(), 2),
            other => panic!("expected a multipolygon, got {other:?}"),
        }
    }

    #[rstest]
    fn lines_and_rects_are_normalised() {
        let line = Geometry::Line(Line::new((0.0, 0.0), (2.0, 2.0)));
        assert!(matches!(
            to_shape(&line, ShapeType::Polyline),
            Ok(Shape::Polyline(_))
        ));
        let rect = Geometry::Rect(Rect::new((0.0, 0.0), (1.0, 1.0)));
        assert!(matches!(
            to_shape(&rect, ShapeType::Polygon),
            Ok(Shape::Polygon(_))
        ));
    }

    #[rstest]
    fn points_need_point_layers() {
        let point = Geometry::Point(Point::new(1.0, 2.0));
        assert!(matches!(to_shape(&point, ShapeType::Point), Ok(Shape::Point(_))));
        assert!(to_shape(&point, ShapeType::Polygon).is_err());
        let pair = Geometry::MultiPoint(MultiPoint::from(vec![(0.0, 0.0), (1.0, 1.0)]));
        assert!(to_shape(&pair, ShapeType::Point).is_err());
    }

    #[rstest]
    fn degenerate_lines_are_rejected() {
        let stub = Geometry::LineString(LineString::from(vec![(0.0, 0.0)]));
        assert!(to_shape(&stub, ShapeType::Polyline).is_err());
    }
}
