//! # Overzoom clipping
//!
//! Renders a sub-tile of a coarser tile: the feature geometry is clipped to the window
//! covering child tile `(x_pos, y_pos)` at `dz` levels below the source tile,
//! padded by a small margin, and rescaled into the canonical 4096 unit extent.
//!
//! Points and lines keep only the parts inside the window.
//! Polygon vertices outside the window are snapped onto its border,
//! which keeps rings closed at the cost of degenerate edges along the border;
//! consecutive horizontal or vertical runs created by snapping are collapsed.

use crate::error::GeometryError;
use crate::geometry::{Command, GeomType, Ring};
use crate::{CANONICAL_EXTENT, OVERZOOM_MARGIN};
use geo::{Coord, coord};
use tracing::trace;

/// Selects the child tile to clip a feature to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OverzoomParams {
    /// Number of zoom levels between the source tile and the target tile.
    pub dz: u8,
    /// Column of the target tile among the `2^dz` children.
    pub x_pos: u32,
    /// Row of the target tile among the `2^dz` children.
    pub y_pos: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClipMode {
    Point,
    LineString,
    Polygon,
}

impl ClipMode {
    /// The minimum number of vertices for a ring to survive clipping.
    const fn min_vertices(self) -> usize {
        match self {
            ClipMode::Point => 1,
            ClipMode::LineString => 2,
            ClipMode::Polygon => 4,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Intercept {
    ratio: f64,
    point: Coord<f64>,
}

/// Clips a single geometry command stream to an overzoom window.
pub struct Clipper {
    mode: ClipMode,
    final_ratio: f64,
    margin: f64,
    min: Coord<f64>,
    max: Coord<f64>,
    lines: Vec<Ring<f64>>,
    line: Ring<f64>,
    prev_is_in: bool,
    prev: Coord<f64>,
    first: Coord<f64>,
    is_horizontal: bool,
    is_vertical: bool,
}

impl Clipper {
    /// Prepares a clipper for geometry of `geom_type` in a layer with the given `extent`.
    ///
    /// # Errors
    ///
    /// Geometry of unknown type cannot be clipped,
    /// and `dz` must leave a window narrower than the whole coordinate space (below 32).
    pub fn new(
        geom_type: GeomType,
        extent: u32,
        params: OverzoomParams,
    ) -> Result<Self, GeometryError> {
        let mode = match geom_type {
            GeomType::Point => ClipMode::Point,
            GeomType::LineString => ClipMode::LineString,
            GeomType::Polygon => ClipMode::Polygon,
            GeomType::Unknown => return Err(GeometryError::UnknownGeometryType),
        };

        let clip_extent = extent
            .checked_shr(u32::from(params.dz))
            .ok_or(GeometryError::OverzoomTooDeep(params.dz))?;
        let clip_extent = f64::from(clip_extent);
        let final_ratio =
            f64::from(CANONICAL_EXTENT) / f64::from(extent) * 2f64.powi(i32::from(params.dz));
        let margin = (f64::from(OVERZOOM_MARGIN) / final_ratio).min(clip_extent);

        let min = coord! {
            x: clip_extent * f64::from(params.x_pos) - margin,
            y: clip_extent * f64::from(params.y_pos) - margin,
        };
        let max = coord! {
            x: min.x + clip_extent + 2.0 * margin,
            y: min.y + clip_extent + 2.0 * margin,
        };

        trace!(?params, extent, ?min, ?max, "Clipping window");

        Ok(Self {
            mode,
            final_ratio,
            margin,
            min,
            max,
            lines: Vec::new(),
            line: Vec::new(),
            prev_is_in: false,
            prev: coord! { x: 0.0, y: 0.0 },
            first: coord! { x: 0.0, y: 0.0 },
            is_horizontal: false,
            is_vertical: false,
        })
    }

    /// Runs the command stream through the clipper.
    ///
    /// Returns `None` when no ring survives, which is distinct from an empty geometry.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed command.
    pub fn clip<I>(mut self, commands: I) -> Result<Option<Vec<Ring<f64>>>, GeometryError>
    where
        I: IntoIterator<Item = Result<Command, GeometryError>>,
    {
        for command in commands {
            match command? {
                Command::MoveTo(p) => self.move_to(to_f64(p)),
                Command::LineTo(p) => self.line_to(to_f64(p)),
                Command::ClosePath => self.close_path(),
            }
        }

        self.push_line();

        if self.lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.lines))
        }
    }

    fn is_in(&self, p: Coord<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    fn snap(&self, p: Coord<f64>) -> Coord<f64> {
        coord! {
            x: p.x.max(self.min.x).min(self.max.x),
            y: p.y.max(self.min.y).min(self.max.y),
        }
    }

    fn transform(&self, p: Coord<f64>) -> Coord<f64> {
        coord! {
            x: (p.x - (self.min.x + self.margin)) * self.final_ratio,
            y: (p.y - (self.min.y + self.margin)) * self.final_ratio,
        }
    }

    fn move_to(&mut self, p: Coord<f64>) {
        self.push_line();

        self.prev_is_in = self.is_in(p);
        self.emit_move_to(p, self.prev_is_in);

        self.prev = p;
        self.first = p;
    }

    fn line_to(&mut self, p: Coord<f64>) {
        let is_in = self.is_in(p);

        match (self.prev_is_in, is_in) {
            (true, true) => self.emit_line_to(p, true),
            (false, true) => {
                let mid = self.intersect(p, self.prev);
                self.emit_line_to(mid, true);
                self.emit_line_to(p, true);
            }
            (true, false) => {
                let mid = self.intersect(self.prev, p);
                self.emit_line_to(mid, true);
                self.emit_line_to(p, false);
            }
            (false, false) => self.cross_outside(self.prev, p),
        }

        self.prev_is_in = is_in;
        self.prev = p;
    }

    fn close_path(&mut self) {
        if !self.line.is_empty() && self.first != self.prev {
            self.line_to(self.first);
        }
    }

    /// Handles a segment whose endpoints both lie outside the window.
    /// The segment may still pass through the window, or cut one of its corners.
    fn cross_outside(&mut self, p1: Coord<f64>, p2: Coord<f64>) {
        let (min, max) = (self.min, self.max);

        if (p1.x <= min.x && p2.x <= min.x)
            || (p1.x >= max.x && p2.x >= max.x)
            || (p1.y <= min.y && p2.y <= min.y)
            || (p1.y >= max.y && p2.y >= max.y)
        {
            self.emit_line_to(p2, false);
            return;
        }

        // Which side of the window the segment passes when it misses an edge
        let mut x_above = false;
        let mut y_above = false;
        let mut intercepts: Vec<Intercept> = Vec::with_capacity(2);

        for edge in [min.x, max.x] {
            if crosses(p1.x, p2.x, edge) {
                let ratio = (edge - p1.x) / (p2.x - p1.x);
                let y = p1.y + ratio * (p2.y - p1.y);
                if y <= min.y {
                    y_above = false;
                } else if y >= max.y {
                    y_above = true;
                } else {
                    intercepts.push(Intercept {
                        ratio,
                        point: coord! { x: edge, y: y },
                    });
                }
            }
        }

        for edge in [min.y, max.y] {
            if crosses(p1.y, p2.y, edge) {
                let ratio = (edge - p1.y) / (p2.y - p1.y);
                let x = p1.x + ratio * (p2.x - p1.x);
                if x <= min.x {
                    x_above = false;
                } else if x >= max.x {
                    x_above = true;
                } else {
                    intercepts.push(Intercept {
                        ratio,
                        point: coord! { x: x, y: edge },
                    });
                }
            }
        }

        if intercepts.is_empty() {
            let corner = coord! {
                x: if x_above { max.x } else { min.x },
                y: if y_above { max.y } else { min.y },
            };
            self.emit_line_to(corner, true);
        } else {
            if intercepts.len() > 1 && intercepts[0].ratio > intercepts[1].ratio {
                intercepts.truncate(2);
                intercepts.swap(0, 1);
            }
            for intercept in intercepts {
                self.emit_line_to(intercept.point, true);
            }
        }

        self.emit_line_to(p2, false);
    }

    /// Finds where the segment from `inside` to `outside` leaves the window.
    fn intersect(&self, inside: Coord<f64>, outside: Coord<f64>) -> Coord<f64> {
        let (min, max) = (self.min, self.max);

        if outside.x >= min.x && outside.x <= max.x {
            let y = if outside.y <= min.y { min.y } else { max.y };
            let x = inside.x + (y - inside.y) / (outside.y - inside.y) * (outside.x - inside.x);
            coord! { x: x, y: y }
        } else if outside.y >= min.y && outside.y <= max.y {
            let x = if outside.x <= min.x { min.x } else { max.x };
            let y = inside.y + (x - inside.x) / (outside.x - inside.x) * (outside.y - inside.y);
            coord! { x: x, y: y }
        } else {
            let mut y = if outside.y <= min.y { min.y } else { max.y };
            let mut x = if outside.x <= min.x { min.x } else { max.x };

            let x_ratio = (x - inside.x) / (outside.x - inside.x);
            let y_ratio = (y - inside.y) / (outside.y - inside.y);
            if x_ratio < y_ratio {
                y = inside.y + x_ratio * (outside.y - inside.y);
            } else {
                x = inside.x + y_ratio * (outside.x - inside.x);
            }
            coord! { x: x, y: y }
        }
    }

    fn push_line(&mut self) {
        let line = std::mem::take(&mut self.line);
        if line.len() >= self.mode.min_vertices() {
            self.lines.push(line);
        }
    }

    fn emit_move_to(&mut self, p: Coord<f64>, is_in: bool) {
        if self.mode == ClipMode::Polygon {
            let p = if is_in { p } else { self.snap(p) };
            self.line.push(self.transform(p));
            self.is_horizontal = false;
            self.is_vertical = false;
        } else if is_in {
            self.line.push(self.transform(p));
        }
    }

    #[expect(clippy::float_cmp)]
    fn emit_line_to(&mut self, p: Coord<f64>, is_in: bool) {
        if self.mode != ClipMode::Polygon {
            if is_in {
                let p = self.transform(p);
                if self.line.last() != Some(&p) {
                    self.line.push(p);
                }
            } else if !self.line.is_empty() {
                self.push_line();
            }
            return;
        }

        let p = self.transform(if is_in { p } else { self.snap(p) });

        let Some(last) = self.line.last().copied() else {
            self.line.push(p);
            return;
        };

        let is_horizontal = last.x == p.x;
        let is_vertical = last.y == p.y;
        if is_horizontal && is_vertical {
            return;
        }

        if (self.is_horizontal && is_horizontal) || (self.is_vertical && is_vertical) {
            // Extend the current run instead of adding a colinear vertex
            let len = self.line.len();
            self.line[len - 1] = p;
            match len.checked_sub(2).map(|i| self.line[i]) {
                Some(prev) => {
                    self.is_horizontal = prev.x == p.x;
                    self.is_vertical = prev.y == p.y;
                }
                None => {
                    self.is_horizontal = false;
                    self.is_vertical = false;
                }
            }
        } else {
            self.line.push(p);
            self.is_horizontal = is_horizontal;
            self.is_vertical = is_vertical;
        }
    }
}

/// Whether `edge` lies strictly between `a` and `b`.
fn crosses(a: f64, b: f64, edge: f64) -> bool {
    (a < edge && b > edge) || (a > edge && b < edge)
}

fn to_f64(p: Coord<i32>) -> Coord<f64> {
    coord! { x: f64::from(p.x), y: f64::from(p.y) }
}
