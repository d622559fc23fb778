use crate::clipper::{Clipper, OverzoomParams};
use crate::error::{DecodeError, GeometryError};
use crate::geometry::{CommandReader, GeomType, Geometry, Ring, decode_bbox, decode_rings};
use crate::layer::Layer;
use crate::value::{FeatureId, Value};
use geo::Rect;
use indexmap::IndexMap;
use pbf_reader::{PbfReader, WireType};
use std::ops::Range;
use tracing::{trace, warn};

/// A single feature of a [`Layer`].
///
/// Properties are resolved when the feature is decoded.
/// Geometry and the extended (v3) attribute streams are only located,
/// and decoded on every call to the corresponding `load_*` method.
#[derive(Clone, Debug)]
pub struct Feature<'a> {
    layer: &'a Layer<'a>,
    id: Option<FeatureId>,
    geom_type: GeomType,
    properties: IndexMap<String, Value>,
    geometry: Option<Range<usize>>,
    geometric_attributes: Option<Range<usize>>,
    elevation: Option<Range<usize>>,
    spline_knots: Option<Range<usize>>,
    spline_degree: Option<u32>,
    overzoom: Option<OverzoomParams>,
}

impl<'a> Feature<'a> {
    /// Decodes the feature message occupying `range` of the layer's data.
    pub(crate) fn decode(layer: &'a Layer<'a>, range: Range<usize>) -> Result<Self, DecodeError> {
        let mut reader = PbfReader::with_range(layer.data(), range)?;
        let mut feature = Self {
            layer,
            id: None,
            geom_type: GeomType::Unknown,
            properties: IndexMap::new(),
            geometry: None,
            geometric_attributes: None,
            elevation: None,
            spline_knots: None,
            spline_degree: None,
            overzoom: None,
        };

        while !reader.is_at_end() {
            let (field, wire_type) = reader.read_key()?;
            match (field, wire_type) {
                (1, WireType::Varint) => {
                    feature.id = Some(FeatureId::Integer(reader.read_varint()?));
                }
                (2, WireType::Len) => feature.read_tags(reader.read_message()?)?,
                (3, WireType::Varint) => feature.geom_type = read_geom_type(reader.read_varint()?),
                (4, WireType::Len) => feature.geometry = Some(reader.read_len_range()?),
                (5, WireType::Len) => feature.read_extended_tags(reader.read_message()?)?,
                (6, WireType::Len) => {
                    feature.geometric_attributes = Some(reader.read_len_range()?);
                }
                (7, WireType::Len) => feature.elevation = Some(reader.read_len_range()?),
                (8, WireType::Len) => feature.spline_knots = Some(reader.read_len_range()?),
                (9, WireType::Varint) => {
                    let value = reader.read_varint()?;
                    feature.spline_degree = Some(u32::try_from(value).map_err(|_| {
                        DecodeError::FieldOutOfRange {
                            field: "spline_degree",
                            value,
                        }
                    })?);
                }
                (10, WireType::Len) => {
                    feature.id = Some(FeatureId::String(reader.read_string()?.into_owned()));
                }
                _ => {
                    trace!(field, ?wire_type, "Skipping unknown feature field");
                    reader.skip(wire_type)?;
                }
            }
        }

        Ok(feature)
    }

    /// Resolves basic tags: pairs of key and value table indices.
    fn read_tags(&mut self, mut tags: PbfReader<'_>) -> Result<(), DecodeError> {
        while !tags.is_at_end() {
            let key = self.layer.key(tags.read_varint()?)?;
            let value = self.layer.value(tags.read_varint()?)?;
            self.properties.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    /// Resolves extended tags: pairs of a key table index and an inline complex value.
    fn read_extended_tags(&mut self, mut tags: PbfReader<'_>) -> Result<(), DecodeError> {
        while !tags.is_at_end() {
            let key = self.layer.key(tags.read_varint()?)?;
            let value = self.layer.read_complex_value(&mut tags)?;
            self.properties.insert(key.to_string(), value);
        }
        Ok(())
    }

    #[inline]
    pub const fn id(&self) -> Option<&FeatureId> {
        self.id.as_ref()
    }

    #[inline]
    pub const fn geom_type(&self) -> GeomType {
        self.geom_type
    }

    /// The extent of the feature's coordinate space, inherited from its layer.
    #[inline]
    pub const fn extent(&self) -> u32 {
        self.layer.extent()
    }

    #[inline]
    pub const fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    #[inline]
    pub fn into_properties(self) -> IndexMap<String, Value> {
        self.properties
    }

    /// The degree of the feature's spline, if it has one.
    #[inline]
    pub const fn spline_degree(&self) -> Option<u32> {
        self.spline_degree
    }

    #[inline]
    pub const fn layer(&self) -> &'a Layer<'a> {
        self.layer
    }

    /// Iterates over the feature's geometry commands.
    ///
    /// A feature without geometry yields no commands.
    ///
    /// # Errors
    ///
    /// Fails if the stored geometry range does not lie within the tile data.
    pub fn commands(&self) -> Result<CommandReader<'a>, GeometryError> {
        let reader = match &self.geometry {
            Some(range) => PbfReader::with_range(self.layer.data(), range.clone())?,
            None => PbfReader::new(&[]),
        };
        Ok(CommandReader::new(reader))
    }

    /// Decodes the feature's geometry into rings of tile-local points.
    ///
    /// Every ring is a fresh, owned value; callers may mutate the result freely.
    ///
    /// # Errors
    ///
    /// Fails on malformed commands.
    pub fn load_geometry(&self) -> Result<Vec<Ring>, GeometryError> {
        decode_rings(self.commands()?)
    }

    /// Decodes the feature's geometry into the variant matching its type.
    ///
    /// # Errors
    ///
    /// Fails on malformed commands, or if the feature type is unknown.
    pub fn geometry(&self) -> Result<Geometry, GeometryError> {
        Geometry::new(self.geom_type, self.load_geometry()?)
    }

    /// Computes the bounding box of the feature's geometry without allocating rings.
    ///
    /// Returns `None` for a feature without points.
    ///
    /// # Errors
    ///
    /// Fails on malformed commands.
    pub fn bbox(&self) -> Result<Option<Rect<i32>>, GeometryError> {
        decode_bbox(self.commands()?)
    }

    /// Clips the feature's geometry to the child tile selected by `params`.
    ///
    /// Returns `None` if nothing of the feature lies within the child tile.
    ///
    /// # Errors
    ///
    /// Fails on malformed commands, or if the feature type is unknown.
    pub fn clip_geometry(
        &self,
        params: OverzoomParams,
    ) -> Result<Option<Vec<Ring<f64>>>, GeometryError> {
        Clipper::new(self.geom_type, self.extent(), params)?.clip(self.commands()?)
    }

    /// Stores overzoom parameters for [`Feature::load_clipped_geometry`].
    pub fn set_overzoom(&mut self, params: Option<OverzoomParams>) {
        self.overzoom = params;
    }

    #[inline]
    pub const fn overzoom(&self) -> Option<OverzoomParams> {
        self.overzoom
    }

    /// Clips the feature's geometry using the stored overzoom parameters.
    ///
    /// # Errors
    ///
    /// Fails if no parameters are set, and otherwise as [`Feature::clip_geometry`].
    pub fn load_clipped_geometry(&self) -> Result<Option<Vec<Ring<f64>>>, GeometryError> {
        let params = self.overzoom.ok_or(GeometryError::NoOverzoom)?;
        self.clip_geometry(params)
    }

    fn extended_reader(
        &self,
        range: Option<&Range<usize>>,
    ) -> Result<Option<PbfReader<'a>>, DecodeError> {
        range
            .map(|range| PbfReader::with_range(self.layer.data(), range.clone()))
            .transpose()
            .map_err(DecodeError::from)
    }

    /// Decodes the per-geometry attributes of a v3 feature.
    ///
    /// Returns `None` if the feature has none.
    ///
    /// # Errors
    ///
    /// Fails on dangling key indices and malformed values.
    pub fn load_geometric_attributes(
        &self,
    ) -> Result<Option<IndexMap<String, Value>>, DecodeError> {
        let Some(mut reader) = self.extended_reader(self.geometric_attributes.as_ref())? else {
            return Ok(None);
        };

        let mut attributes = IndexMap::new();
        while !reader.is_at_end() {
            let key = self.layer.key(reader.read_varint()?)?;
            let value = self.layer.read_complex_value(&mut reader)?;
            attributes.insert(key.to_string(), value);
        }

        Ok(Some(attributes))
    }

    /// Decodes the per-vertex elevations of a v3 feature,
    /// scaled by the layer's elevation scaling.
    ///
    /// Returns `None` if the feature has none.
    ///
    /// # Errors
    ///
    /// Fails on malformed data.
    pub fn load_elevation(&self) -> Result<Option<Vec<f64>>, DecodeError> {
        let Some(mut reader) = self.extended_reader(self.elevation.as_ref())? else {
            return Ok(None);
        };

        let scaling = self.layer.elevation_scaling();
        let mut elevation = Vec::new();
        let mut value: i64 = 0;
        while !reader.is_at_end() {
            value = value.wrapping_add(reader.read_svarint()?);
            elevation.push(scaling.scale(value));
        }

        Ok(Some(elevation))
    }

    /// Decodes the spline knots of a v3 feature.
    ///
    /// Returns `None` if the feature has none.
    ///
    /// # Errors
    ///
    /// Fails on malformed values.
    pub fn load_spline_knots(&self) -> Result<Option<Vec<Value>>, DecodeError> {
        let Some(mut reader) = self.extended_reader(self.spline_knots.as_ref())? else {
            return Ok(None);
        };

        let mut knots = Vec::new();
        while !reader.is_at_end() {
            knots.push(self.layer.read_complex_value(&mut reader)?);
        }

        Ok(Some(knots))
    }
}

fn read_geom_type(value: u64) -> GeomType {
    u8::try_from(value)
        .ok()
        .and_then(|v| GeomType::try_from(v).ok())
        .unwrap_or_else(|| {
            warn!(value, "Unrecognized feature type; treating it as unknown");
            GeomType::Unknown
        })
}
