use anyhow::{anyhow, bail, Context, Result};
use geojson::{GeoJson, Geometry, JsonObject, Value};

use crate::crs::Crs;
use crate::geo::Point;
use crate::layer::{Feature, VectorLayer};
use crate::shape::{EllipseShape, PointShape, Polygon, PolygonShape, Polyline, Shape};

fn to_point(position: &[f64]) -> Result<Point> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Point::new(*x, *y)),
        [_, _, ..] => bail!("non-finite coordinate {:?}", position),
        _ => bail!("position needs at least two values, got {}", position.len()),
    }
}

fn to_points(positions: &[Vec<f64>]) -> Result<Vec<Point>> {
    positions.iter().map(|p| to_point(p)).collect()
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon> {
    let (outer, holes) = rings
        .split_first()
        .ok_or_else(|| anyhow!("polygon without rings"))?;
    let holes = holes
        .iter()
        .map(|h| to_points(h))
        .collect::<Result<Vec<_>>>()?;
    Polygon::new(to_points(outer)?, holes).ok_or_else(|| anyhow!("outer ring has fewer than 3 vertices"))
}

/// Convert one GeoJSON geometry into an engine shape.
///
/// Multi-part lines and polygons become one multi-part shape. Multi-points
/// and geometry collections have no single-shape form and are rejected.
pub fn shape_from_geometry(geometry: &Geometry) -> Result<Shape> {
    match &geometry.value {
        Value::Point(p) => Ok(Shape::Point(PointShape::new(to_point(p)?))),
        Value::LineString(line) => {
            let line = Polyline::new(vec![to_points(line)?])
                .ok_or_else(|| anyhow!("line has fewer than 2 points"))?;
            Ok(Shape::Polyline(line))
        }
        Value::MultiLineString(lines) => {
            let parts = lines.iter().map(|l| to_points(l)).collect::<Result<Vec<_>>>()?;
            let line = Polyline::new(parts).ok_or_else(|| anyhow!("no line part has 2 points"))?;
            Ok(Shape::Polyline(line))
        }
        Value::Polygon(rings) => Ok(Shape::Polygon(PolygonShape::single(to_polygon(rings)?))),
        Value::MultiPolygon(polygons) => {
            // Degenerate members are skipped as long as one survives
            let parts: Vec<Polygon> = polygons.iter().filter_map(|p| to_polygon(p).ok()).collect();
            let shape = PolygonShape::new(parts).ok_or_else(|| anyhow!("no valid polygon member"))?;
            Ok(Shape::Polygon(shape))
        }
        Value::MultiPoint(_) => bail!("multi-point geometries must be split into points"),
        Value::GeometryCollection(_) => bail!("geometry collections must be split into members"),
    }
}

fn number(props: Option<&JsonObject>, key: &str) -> Option<f64> {
    props
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
}

/// Apply point-only properties: a direction from `angle` or `wind_dir`,
/// and `radius` or `radius_x`/`radius_y` turning the point into a circle
/// or an ellipse
fn decorate(shape: Shape, props: Option<&JsonObject>) -> Shape {
    let mut point = match shape {
        Shape::Point(p) => p,
        other => return other,
    };
    if let Some(r) = number(props, "radius").filter(|r| *r > 0.0) {
        return Shape::Circle(EllipseShape::circle(point.point, r));
    }
    if let (Some(rx), Some(ry)) = (number(props, "radius_x"), number(props, "radius_y")) {
        return Shape::Ellipse(EllipseShape::new(point.point, rx, ry));
    }
    point.angle = number(props, "angle").or_else(|| number(props, "wind_dir"));
    Shape::Point(point)
}

/// Expand a geometry into shapes, splitting multi-points and collections.
/// Members that cannot form a shape are logged and skipped.
fn collect_shapes(geometry: &Geometry, out: &mut Vec<Shape>) {
    match &geometry.value {
        Value::MultiPoint(points) => {
            for p in points {
                match to_point(p) {
                    Ok(p) => out.push(Shape::Point(PointShape::new(p))),
                    Err(e) => log::warn!("skipping point: {e}"),
                }
            }
        }
        Value::GeometryCollection(members) => {
            for g in members {
                collect_shapes(g, out);
            }
        }
        _ => match shape_from_geometry(geometry) {
            Ok(shape) => out.push(shape),
            Err(e) => log::warn!("skipping geometry: {e}"),
        },
    }
}

fn push_features(
    layer: &mut VectorLayer,
    geometry: Option<&Geometry>,
    props: Option<&JsonObject>,
) {
    let Some(geometry) = geometry else {
        return;
    };
    let label = props
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut shapes = Vec::new();
    collect_shapes(geometry, &mut shapes);
    for shape in shapes {
        layer.push(Feature {
            shape: decorate(shape, props),
            label: label.clone(),
        });
    }
}

/// Build a vector layer from GeoJSON text whose coordinates are in `crs`.
///
/// The `name` property becomes the feature label. Features without a
/// geometry are skipped.
pub fn layer_from_geojson_str(name: &str, text: &str, crs: Crs) -> Result<VectorLayer> {
    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("Failed to parse GeoJSON for layer {name}"))?;

    let mut layer = VectorLayer::new(name, crs);
    match &geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                push_features(&mut layer, feature.geometry.as_ref(), feature.properties.as_ref());
            }
        }
        GeoJson::Feature(f) => {
            push_features(&mut layer, f.geometry.as_ref(), f.properties.as_ref());
        }
        GeoJson::Geometry(g) => push_features(&mut layer, Some(g), None),
    }
    log::debug!("loaded {} features into layer {name}", layer.len());
    Ok(layer)
}
