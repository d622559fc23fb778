//! # Mapbox Vector Tile decoding
//!
//! Lazily decodes [Mapbox Vector Tiles](https://github.com/mapbox/vector-tile-spec)
//! from a byte slice.
//! Layers are decoded when the tile is opened; features are decoded on access,
//! and their geometry only when asked for.
//!
//! Besides plain tile-local geometry, features can be converted to GeoJSON,
//! or clipped to a child tile for overzoomed rendering.
//! The version 3 extensions (inline complex attributes, value pools, elevation and splines)
//! are decoded as well.

// Private modules by default
mod attribute;
mod clipper;
mod error;
mod feature;
pub mod geojson;
pub mod geometry;
mod layer;
mod tile;
mod value;

#[cfg(test)]
mod test_fixtures;

// Pub use for re-export without too many levels of hierarchy.
pub use attribute::ComplexValueType;
pub use clipper::{Clipper, OverzoomParams};
pub use error::{DecodeError, Error, GeometryError};
pub use feature::Feature;
pub use geometry::{GEOM_TYPE_NAMES, GeomType, Geometry};
pub use layer::Layer;
pub use tile::{OwnedVectorTile, VectorTile};
pub use value::{FeatureId, Scaling, Value};

/// The layer extent assumed when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

/// The format version assumed when a layer does not declare one.
pub const DEFAULT_VERSION: u32 = 1;

/// The extent clipped geometry is rescaled to.
pub const CANONICAL_EXTENT: u32 = 4096;

/// Padding around the clip window, in canonical extent units.
pub const OVERZOOM_MARGIN: u32 = 64;
