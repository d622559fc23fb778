use crate::error::{DecodeError, Error};
use crate::feature::Feature;
use crate::geojson::FeatureCollection;
use crate::value::{Scaling, Value};
use crate::{DEFAULT_EXTENT, DEFAULT_VERSION};
use pbf_reader::{PbfError, PbfReader, WireType};
use std::borrow::Cow;
use std::ops::Range;
use tracing::trace;

/// A named layer of features sharing a coordinate space and attribute tables.
///
/// Only the layer's tables are decoded up front.
/// Features are decoded on access from their stored byte range.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer<'a> {
    data: &'a [u8],
    version: u32,
    name: Cow<'a, str>,
    extent: u32,
    keys: Vec<Cow<'a, str>>,
    values: Vec<Value>,
    features: Vec<Range<usize>>,
    // Version 3 value pools
    string_values: Vec<Cow<'a, str>>,
    float_values: Vec<f32>,
    double_values: Vec<f64>,
    int_values: Vec<u64>,
    elevation_scaling: Scaling,
    attribute_scalings: Vec<Scaling>,
    tile_x: Option<u32>,
    tile_y: Option<u32>,
    tile_z: Option<u32>,
}

impl<'a> Layer<'a> {
    /// Decodes the layer message occupying `range` of `data`.
    ///
    /// # Errors
    ///
    /// Fails if the message is malformed or any of its values cannot be decoded.
    pub(crate) fn decode(data: &'a [u8], range: Range<usize>) -> Result<Self, DecodeError> {
        let mut reader = PbfReader::with_range(data, range)?;
        let mut layer = Self {
            data,
            version: DEFAULT_VERSION,
            name: Cow::Borrowed(""),
            extent: DEFAULT_EXTENT,
            keys: Vec::new(),
            values: Vec::new(),
            features: Vec::new(),
            string_values: Vec::new(),
            float_values: Vec::new(),
            double_values: Vec::new(),
            int_values: Vec::new(),
            elevation_scaling: Scaling::default(),
            attribute_scalings: Vec::new(),
            tile_x: None,
            tile_y: None,
            tile_z: None,
        };

        while !reader.is_at_end() {
            let (field, wire_type) = reader.read_key()?;
            match (field, wire_type) {
                (15, WireType::Varint) => layer.version = read_u32(&mut reader, "version")?,
                (1, WireType::Len) => layer.name = reader.read_string()?,
                (2, WireType::Len) => layer.features.push(reader.read_len_range()?),
                (3, WireType::Len) => layer.keys.push(reader.read_string()?),
                (4, WireType::Len) => layer.values.push(read_value(reader.read_message()?)?),
                (5, WireType::Varint) => layer.extent = read_u32(&mut reader, "extent")?,
                (6, WireType::Len) => layer.string_values.push(reader.read_string()?),
                (7, _) => read_repeated(
                    &mut reader,
                    wire_type,
                    WireType::I32,
                    &mut layer.float_values,
                    PbfReader::read_f32,
                )?,
                (8, _) => read_repeated(
                    &mut reader,
                    wire_type,
                    WireType::I64,
                    &mut layer.double_values,
                    PbfReader::read_f64,
                )?,
                (9, _) => read_repeated(
                    &mut reader,
                    wire_type,
                    WireType::I64,
                    &mut layer.int_values,
                    PbfReader::read_fixed64,
                )?,
                (10, WireType::Len) => {
                    layer.elevation_scaling = read_scaling(reader.read_message()?)?;
                }
                (11, WireType::Len) => {
                    layer
                        .attribute_scalings
                        .push(read_scaling(reader.read_message()?)?);
                }
                (12, WireType::Varint) => layer.tile_x = Some(read_u32(&mut reader, "tile_x")?),
                (13, WireType::Varint) => layer.tile_y = Some(read_u32(&mut reader, "tile_y")?),
                (14, WireType::Varint) => layer.tile_z = Some(read_u32(&mut reader, "tile_z")?),
                _ => {
                    trace!(field, ?wire_type, "Skipping unknown layer field");
                    reader.skip(wire_type)?;
                }
            }
        }

        trace!(
            name = %layer.name,
            version = layer.version,
            extent = layer.extent,
            features = layer.features.len(),
            "Decoded layer"
        );

        Ok(layer)
    }

    /// The vector tile format version of this layer.
    #[inline]
    pub const fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The width and height of the layer's coordinate space.
    #[inline]
    pub const fn extent(&self) -> u32 {
        self.extent
    }

    /// The number of features in the layer.
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Tile coordinates the layer was encoded for, if the encoder recorded them.
    pub const fn tile_coordinates(&self) -> Option<(u32, u32, u32)> {
        match (self.tile_x, self.tile_y, self.tile_z) {
            (Some(x), Some(y), Some(z)) => Some((x, y, z)),
            _ => None,
        }
    }

    /// Decodes the feature at `index`.
    ///
    /// # Errors
    ///
    /// Fails if the index is out of bounds or the feature message is malformed.
    pub fn feature(&self, index: usize) -> Result<Feature<'_>, DecodeError> {
        let range = self
            .features
            .get(index)
            .ok_or(DecodeError::FeatureIndexOutOfBounds {
                index,
                length: self.features.len(),
            })?;

        Feature::decode(self, range.clone())
    }

    /// Decodes every feature in order.
    pub fn features(&self) -> impl ExactSizeIterator<Item = Result<Feature<'_>, DecodeError>> {
        self.features
            .iter()
            .map(|range| Feature::decode(self, range.clone()))
    }

    /// Converts every feature in the layer into GeoJSON.
    ///
    /// # Errors
    ///
    /// Fails on the first feature that cannot be decoded or converted.
    pub fn to_geojson(&self, x: u32, y: u32, z: u8) -> Result<FeatureCollection, Error> {
        let features = self
            .features()
            .map(|feature| Ok(feature?.to_geojson(x, y, z)?))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(FeatureCollection { features })
    }

    #[inline]
    pub(crate) const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub(crate) fn key(&self, index: u64) -> Result<&str, DecodeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.keys.get(i))
            .map(AsRef::as_ref)
            .ok_or(DecodeError::InvalidTableIndex {
                table: "key",
                index,
            })
    }

    pub(crate) fn value(&self, index: u64) -> Result<&Value, DecodeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.values.get(i))
            .ok_or(DecodeError::InvalidTableIndex {
                table: "value",
                index,
            })
    }

    pub(crate) fn string_values(&self) -> &[Cow<'a, str>] {
        &self.string_values
    }

    pub(crate) fn float_values(&self) -> &[f32] {
        &self.float_values
    }

    pub(crate) fn double_values(&self) -> &[f64] {
        &self.double_values
    }

    pub(crate) fn int_values(&self) -> &[u64] {
        &self.int_values
    }

    pub(crate) const fn elevation_scaling(&self) -> &Scaling {
        &self.elevation_scaling
    }

    pub(crate) fn attribute_scalings(&self) -> &[Scaling] {
        &self.attribute_scalings
    }
}

fn read_u32(reader: &mut PbfReader<'_>, field: &'static str) -> Result<u32, DecodeError> {
    let value = reader.read_varint()?;
    u32::try_from(value).map_err(|_| DecodeError::FieldOutOfRange { field, value })
}

/// Reads a repeated scalar field, accepting both packed and unpacked encodings.
fn read_repeated<'a, T>(
    reader: &mut PbfReader<'a>,
    wire_type: WireType,
    element_type: WireType,
    out: &mut Vec<T>,
    read: impl Fn(&mut PbfReader<'a>) -> Result<T, PbfError>,
) -> Result<(), PbfError> {
    if wire_type == element_type {
        out.push(read(reader)?);
    } else if wire_type == WireType::Len {
        let mut packed = reader.read_message()?;
        while !packed.is_at_end() {
            out.push(read(&mut packed)?);
        }
    } else {
        trace!(?wire_type, ?element_type, "Skipping mistyped pool value");
        reader.skip(wire_type)?;
    }
    Ok(())
}

/// Decodes a `Value` message.
///
/// The last recognized field wins.
fn read_value(mut message: PbfReader<'_>) -> Result<Value, DecodeError> {
    let mut value = None;

    while !message.is_at_end() {
        let (field, wire_type) = message.read_key()?;
        match (field, wire_type) {
            (1, WireType::Len) => value = Some(Value::String(message.read_string()?.into_owned())),
            (2, WireType::I32) => value = Some(Value::Float(message.read_f32()?)),
            (3, WireType::I64) => value = Some(Value::Double(message.read_f64()?)),
            (4, WireType::Varint) => value = Some(Value::Int(message.read_varint64()?)),
            (5, WireType::Varint) => value = Some(Value::UInt(message.read_varint()?)),
            (6, WireType::Varint) => value = Some(Value::Int(message.read_svarint()?)),
            (7, WireType::Varint) => value = Some(Value::Bool(message.read_bool()?)),
            _ => {
                trace!(field, ?wire_type, "Skipping unknown value field");
                message.skip(wire_type)?;
            }
        }
    }

    value.ok_or(DecodeError::MissingValue)
}

fn read_scaling(mut message: PbfReader<'_>) -> Result<Scaling, DecodeError> {
    let mut scaling = Scaling::default();

    while !message.is_at_end() {
        let (field, wire_type) = message.read_key()?;
        match (field, wire_type) {
            (1, WireType::Varint) => scaling.offset = message.read_svarint()?,
            (2, WireType::I64) => scaling.multiplier = message.read_f64()?,
            (3, WireType::I64) => scaling.base = message.read_f64()?,
            _ => message.skip(wire_type)?,
        }
    }

    Ok(scaling)
}
