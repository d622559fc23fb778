//! # Geometry command interpretation
//!
//! Feature geometry is a packed stream of command integers.
//! Each command word carries a command ID in its low 3 bits and a repeat count in the rest.
//! `MoveTo` and `LineTo` are followed by one zig-zag encoded `(dx, dy)` pair per repetition,
//! relative to the previous position (starting at the origin for every geometry).
//!
//! See <https://github.com/mapbox/vector-tile-spec/tree/master/2.1#43-geometry-encoding>.

use crate::error::GeometryError;
use geo::{Coord, Rect, coord};
use num_enum::TryFromPrimitive;
use pbf_reader::PbfReader;
use serde::Serialize;

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

/// Human-readable names of the geometry types, indexed by wire value.
pub const GEOM_TYPE_NAMES: [&str; 4] = ["Unknown", "Point", "LineString", "Polygon"];

/// A sequence of tile-local points.
///
/// Closed rings repeat their first point at the end as a separate value.
pub type Ring<T = i32> = Vec<Coord<T>>;

/// The type of geometry stored in a feature.
///
/// See <https://github.com/mapbox/vector-tile-spec/tree/master/2.1#434-geometry-types>.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, Serialize,
)]
#[repr(u8)]
pub enum GeomType {
    #[default]
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl GeomType {
    /// The name used for this type in GeoJSON (without any `Multi` prefix).
    pub const fn name(self) -> &'static str {
        GEOM_TYPE_NAMES[self as usize]
    }
}

/// A decoded drawing command with an absolute position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    MoveTo(Coord<i32>),
    LineTo(Coord<i32>),
    ClosePath,
}

/// Iterates over the commands of a geometry stream, accumulating deltas into absolute positions.
///
/// A command word is executed as soon as it is read, even when it ends the stream.
/// Iteration stops at the end of the stream (dropping any outstanding repetitions),
/// or after the first error.
pub struct CommandReader<'a> {
    reader: PbfReader<'a>,
    command: u32,
    remaining: u64,
    cursor: Coord<i32>,
    failed: bool,
}

impl<'a> CommandReader<'a> {
    pub fn new(reader: PbfReader<'a>) -> Self {
        Self {
            reader,
            command: MOVE_TO,
            remaining: 0,
            cursor: coord! { x: 0, y: 0 },
            failed: false,
        }
    }

    fn read_position(&mut self) -> Result<Coord<i32>, GeometryError> {
        let dx = self.reader.read_svarint()?;
        let dy = self.reader.read_svarint()?;
        let x = i32::try_from(dx)
            .ok()
            .and_then(|dx| self.cursor.x.checked_add(dx))
            .ok_or(GeometryError::CoordinateOverflow)?;
        let y = i32::try_from(dy)
            .ok()
            .and_then(|dy| self.cursor.y.checked_add(dy))
            .ok_or(GeometryError::CoordinateOverflow)?;
        self.cursor = coord! { x: x, y: y };
        Ok(self.cursor)
    }

    fn next_command(&mut self) -> Result<Option<Command>, GeometryError> {
        if self.reader.is_at_end() {
            return Ok(None);
        }

        if self.remaining == 0 {
            let word = self.reader.read_varint()?;
            #[allow(clippy::cast_possible_truncation)]
            let command = (word & 0x7) as u32;
            self.command = command;
            // A zero count still runs the command once
            self.remaining = (word >> 3).max(1);
        }

        self.remaining -= 1;

        match self.command {
            MOVE_TO => self.read_position().map(|p| Some(Command::MoveTo(p))),
            LINE_TO => self.read_position().map(|p| Some(Command::LineTo(p))),
            CLOSE_PATH => Ok(Some(Command::ClosePath)),
            other => Err(GeometryError::UnknownCommand(other)),
        }
    }
}

impl Iterator for CommandReader<'_> {
    type Item = Result<Command, GeometryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = self.next_command().transpose();
        if matches!(result, Some(Err(_))) {
            self.failed = true;
        }
        result
    }
}

/// Decodes a command stream into rings.
///
/// Every `MoveTo` starts a new ring.
/// `ClosePath` appends a copy of the ring's first point;
/// some encoders omit the closing vertex and downstream consumers rely on it being present.
///
/// # Errors
///
/// Fails on the first malformed command.
pub fn decode_rings<I>(commands: I) -> Result<Vec<Ring>, GeometryError>
where
    I: IntoIterator<Item = Result<Command, GeometryError>>,
{
    let mut rings = Vec::new();
    let mut ring: Option<Ring> = None;

    for command in commands {
        match command? {
            Command::MoveTo(p) => {
                if let Some(finished) = ring.replace(vec![p]) {
                    rings.push(finished);
                }
            }
            Command::LineTo(p) => {
                if let Some(ring) = ring.as_mut() {
                    ring.push(p);
                }
            }
            Command::ClosePath => {
                if let Some(ring) = ring.as_mut()
                    && let Some(first) = ring.first().copied()
                {
                    ring.push(first);
                }
            }
        }
    }

    rings.extend(ring);
    Ok(rings)
}

/// Computes the bounding box of a command stream without materializing any rings.
///
/// Returns `None` for an empty geometry.
///
/// # Errors
///
/// Fails on the first malformed command.
pub fn decode_bbox<I>(commands: I) -> Result<Option<Rect<i32>>, GeometryError>
where
    I: IntoIterator<Item = Result<Command, GeometryError>>,
{
    let mut bounds: Option<(Coord<i32>, Coord<i32>)> = None;
    let mut started = false;

    for command in commands {
        let p = match command? {
            Command::MoveTo(p) => {
                started = true;
                p
            }
            Command::LineTo(p) => p,
            Command::ClosePath => continue,
        };

        // Points before the first MoveTo are not part of any ring
        if !started {
            continue;
        }

        bounds = Some(match bounds {
            None => (p, p),
            Some((min, max)) => (
                coord! { x: min.x.min(p.x), y: min.y.min(p.y) },
                coord! { x: max.x.max(p.x), y: max.y.max(p.y) },
            ),
        });
    }

    Ok(bounds.map(|(min, max)| Rect::new(min, max)))
}

/// Decoded feature geometry, tagged by feature type.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// One single-point ring per point.
    Point(Vec<Ring>),
    LineString(Vec<Ring>),
    /// Outer rings and holes, in stream order.
    Polygon(Vec<Ring>),
}

impl Geometry {
    /// Wraps decoded rings in the variant matching `geom_type`.
    ///
    /// # Errors
    ///
    /// Geometry of unknown type cannot be interpreted.
    pub fn new(geom_type: GeomType, rings: Vec<Ring>) -> Result<Self, GeometryError> {
        match geom_type {
            GeomType::Point => Ok(Geometry::Point(rings)),
            GeomType::LineString => Ok(Geometry::LineString(rings)),
            GeomType::Polygon => Ok(Geometry::Polygon(rings)),
            GeomType::Unknown => Err(GeometryError::UnknownGeometryType),
        }
    }

    pub const fn geom_type(&self) -> GeomType {
        match self {
            Geometry::Point(_) => GeomType::Point,
            Geometry::LineString(_) => GeomType::LineString,
            Geometry::Polygon(_) => GeomType::Polygon,
        }
    }

    pub fn rings(&self) -> &[Ring] {
        match self {
            Geometry::Point(rings) | Geometry::LineString(rings) | Geometry::Polygon(rings) => {
                rings
            }
        }
    }

    pub fn into_rings(self) -> Vec<Ring> {
        match self {
            Geometry::Point(rings) | Geometry::LineString(rings) | Geometry::Polygon(rings) => {
                rings
            }
        }
    }
}
