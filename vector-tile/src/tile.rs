use crate::error::{DecodeError, Error};
use crate::geojson::FeatureCollection;
use crate::layer::Layer;
use indexmap::IndexMap;
use pbf_reader::{PbfReader, WireType};
use self_cell::self_cell;
use tracing::{debug, trace};

/// A decoded vector tile: its layers keyed by name, in the order they first appear.
///
/// The tile borrows the encoded bytes and never mutates them.
/// Features are decoded on demand with a fresh reader each time,
/// so a tile can be shared freely between threads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorTile<'a> {
    layers: IndexMap<String, Layer<'a>>,
}

impl<'a> VectorTile<'a> {
    /// Looks up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&Layer<'a>> {
        self.layers.get(name)
    }

    /// Iterates over the layers in tile order.
    pub fn layers(&self) -> impl ExactSizeIterator<Item = (&str, &Layer<'a>)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    /// The number of (non-empty) layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Converts every layer into a GeoJSON feature collection.
    ///
    /// # Errors
    ///
    /// Fails on the first feature that cannot be decoded or converted.
    pub fn to_geojson(
        &self,
        x: u32,
        y: u32,
        z: u8,
    ) -> Result<IndexMap<String, FeatureCollection>, Error> {
        self.layers
            .iter()
            .map(|(name, layer)| Ok((name.clone(), layer.to_geojson(x, y, z)?)))
            .collect()
    }
}

impl<'a> TryFrom<&'a [u8]> for VectorTile<'a> {
    type Error = DecodeError;

    fn try_from(data: &'a [u8]) -> Result<Self, Self::Error> {
        let mut reader = PbfReader::new(data);
        let mut layers = IndexMap::new();

        while !reader.is_at_end() {
            let (field, wire_type) = reader.read_key()?;
            if (field, wire_type) != (3, WireType::Len) {
                trace!(field, ?wire_type, "Skipping unknown tile field");
                reader.skip(wire_type)?;
                continue;
            }

            let layer = Layer::decode(data, reader.read_len_range()?)?;
            if layer.is_empty() {
                debug!(name = layer.name(), "Dropping layer without features");
                continue;
            }

            // A repeated name replaces the earlier layer, keeping its position
            layers.insert(layer.name().to_string(), layer);
        }

        Ok(Self { layers })
    }
}

self_cell! {
    /// An owned vector tile.
    ///
    /// An owned vector tile can be constructed from an owned byte array, `Vec<u8>`.
    pub struct OwnedVectorTile {
        owner: Vec<u8>,
        #[covariant]
        dependent: VectorTile,
    }

    impl {Debug}
}

impl OwnedVectorTile {
    /// The decoded tile.
    #[inline]
    pub fn tile(&self) -> &VectorTile<'_> {
        self.borrow_dependent()
    }
}

impl TryFrom<Vec<u8>> for OwnedVectorTile {
    type Error = DecodeError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        OwnedVectorTile::try_new(value, |data| VectorTile::try_from(data.as_slice()))
    }
}
