//! # GeoJSON conversion
//!
//! Projects tile-local coordinates onto WGS84 longitude and latitude
//! (via spherical Web Mercator), and assembles GeoJSON geometry objects.
//! Polygon rings are grouped into polygons by winding order.

use crate::error::GeometryError;
use crate::feature::Feature;
use crate::geometry::{Geometry, Ring};
use crate::value::{FeatureId, Value};
use geo::Coord;
use indexmap::IndexMap;
use serde::Serialize;
use std::f64::consts::PI;

/// A GeoJSON position: `[longitude, latitude]`.
pub type Position = [f64; 2];

/// A GeoJSON geometry object.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

/// A GeoJSON feature object.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct GeoJsonFeature {
    pub id: Option<FeatureId>,
    pub geometry: GeoJsonGeometry,
    pub properties: IndexMap<String, Value>,
}

/// A GeoJSON feature collection object.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<GeoJsonFeature>,
}

/// Maps tile-local coordinates of tile `(x, y, z)` to longitude and latitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileProjection {
    size: f64,
    x0: f64,
    y0: f64,
}

impl TileProjection {
    pub fn new(extent: u32, x: u32, y: u32, z: u8) -> Self {
        let extent = f64::from(extent);
        Self {
            size: extent * 2f64.powi(i32::from(z)),
            x0: extent * f64::from(x),
            y0: extent * f64::from(y),
        }
    }

    pub fn project(&self, p: Coord<i32>) -> Position {
        let y2 = 180.0 - (f64::from(p.y) + self.y0) * 360.0 / self.size;
        [
            (f64::from(p.x) + self.x0) * 360.0 / self.size - 180.0,
            360.0 / PI * (y2 * PI / 180.0).exp().atan() - 90.0,
        ]
    }

    fn project_ring(&self, ring: &[Coord<i32>]) -> Vec<Position> {
        ring.iter().map(|p| self.project(*p)).collect()
    }
}

/// The shoelace sum of a ring.
///
/// The sign gives the winding order; the magnitude is twice the enclosed area.
pub fn signed_area(ring: &[Coord<i32>]) -> i64 {
    let Some(last) = ring.last() else {
        return 0;
    };

    let mut sum = 0;
    let mut p2 = last;
    for p1 in ring {
        sum += (i64::from(p2.x) - i64::from(p1.x)) * (i64::from(p1.y) + i64::from(p2.y));
        p2 = p1;
    }
    sum
}

/// Groups rings into polygons.
///
/// The first ring with a non-zero area sets the winding order of outer rings.
/// Every following ring with the same winding starts a new polygon;
/// rings of the opposite winding are holes in the current polygon.
/// Rings with zero area are dropped.
///
/// A single ring (or none) is returned as one group without any area computation.
pub fn classify_rings<T>(rings: Vec<T>) -> Vec<Vec<T>>
where
    T: AsRef<[Coord<i32>]>,
{
    if rings.len() <= 1 {
        return vec![rings];
    }

    let mut polygons = Vec::new();
    let mut polygon: Option<Vec<T>> = None;
    let mut outer_is_ccw: Option<bool> = None;

    for ring in rings {
        let area = signed_area(ring.as_ref());
        if area == 0 {
            continue;
        }

        let is_ccw = area < 0;
        let outer = *outer_is_ccw.get_or_insert(is_ccw);

        if is_ccw == outer {
            if let Some(finished) = polygon.replace(vec![ring]) {
                polygons.push(finished);
            }
        } else if let Some(polygon) = polygon.as_mut() {
            polygon.push(ring);
        }
    }

    polygons.extend(polygon);
    polygons
}

impl Geometry {
    /// Projects the geometry into a GeoJSON geometry object.
    ///
    /// A single part produces the simple type (`Point`, `LineString`, `Polygon`),
    /// anything else the corresponding `Multi` type.
    pub fn to_geojson(&self, projection: &TileProjection) -> GeoJsonGeometry {
        match self {
            Geometry::Point(rings) => {
                let mut points: Vec<Position> = rings
                    .iter()
                    .filter_map(|ring| ring.first())
                    .map(|p| projection.project(*p))
                    .collect();
                if points.len() == 1 {
                    GeoJsonGeometry::Point {
                        coordinates: points.remove(0),
                    }
                } else {
                    GeoJsonGeometry::MultiPoint {
                        coordinates: points,
                    }
                }
            }
            Geometry::LineString(rings) => {
                let mut lines: Vec<Vec<Position>> =
                    rings.iter().map(|ring| projection.project_ring(ring)).collect();
                if lines.len() == 1 {
                    GeoJsonGeometry::LineString {
                        coordinates: lines.remove(0),
                    }
                } else {
                    GeoJsonGeometry::MultiLineString { coordinates: lines }
                }
            }
            Geometry::Polygon(rings) => {
                let groups = classify_rings::<&Ring>(rings.iter().collect());
                let mut polygons: Vec<Vec<Vec<Position>>> = groups
                    .into_iter()
                    .map(|polygon| {
                        polygon
                            .into_iter()
                            .map(|ring| projection.project_ring(ring))
                            .collect()
                    })
                    .collect();
                if polygons.len() == 1 {
                    GeoJsonGeometry::Polygon {
                        coordinates: polygons.remove(0),
                    }
                } else {
                    GeoJsonGeometry::MultiPolygon {
                        coordinates: polygons,
                    }
                }
            }
        }
    }
}

impl Feature<'_> {
    /// Converts the feature into a GeoJSON feature, as located in tile `(x, y, z)`.
    ///
    /// # Errors
    ///
    /// Fails on malformed geometry, or if the feature type is unknown.
    pub fn to_geojson(&self, x: u32, y: u32, z: u8) -> Result<GeoJsonFeature, GeometryError> {
        let projection = TileProjection::new(self.extent(), x, y, z);
        Ok(GeoJsonFeature {
            id: self.id().cloned(),
            geometry: self.geometry()?.to_geojson(&projection),
            properties: self.properties().clone(),
        })
    }
}
