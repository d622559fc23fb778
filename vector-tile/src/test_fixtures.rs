//! Test-only tile encoding and shared fixture tiles.
//!
//! Fixture tiles are encoded in memory with `prost`,
//! so tests can state the exact wire contents they decode.

use crate::geometry::GeomType;
use crate::tile::VectorTile;
use prost::Message;
use std::ops::Range;
use std::sync::LazyLock;

#[derive(Clone, PartialEq, Message)]
pub struct TileMessage {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<LayerMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LayerMessage {
    #[prost(uint32, optional, tag = "15")]
    pub version: Option<u32>,
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<FeatureMessage>,
    #[prost(string, repeated, tag = "3")]
    pub keys: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<ValueMessage>,
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
    #[prost(string, repeated, tag = "6")]
    pub string_values: Vec<String>,
    #[prost(float, repeated, packed = "false", tag = "7")]
    pub float_values: Vec<f32>,
    #[prost(double, repeated, packed = "false", tag = "8")]
    pub double_values: Vec<f64>,
    #[prost(fixed64, repeated, packed = "false", tag = "9")]
    pub int_values: Vec<u64>,
    #[prost(message, optional, tag = "10")]
    pub elevation_scaling: Option<ScalingMessage>,
    #[prost(message, repeated, tag = "11")]
    pub attribute_scalings: Vec<ScalingMessage>,
    #[prost(uint32, optional, tag = "12")]
    pub tile_x: Option<u32>,
    #[prost(uint32, optional, tag = "13")]
    pub tile_y: Option<u32>,
    #[prost(uint32, optional, tag = "14")]
    pub tile_z: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FeatureMessage {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub tags: Vec<u32>,
    /// Kept as a plain integer so tests can encode out-of-range types.
    #[prost(uint32, optional, tag = "3")]
    pub r#type: Option<u32>,
    #[prost(uint32, repeated, packed = "true", tag = "4")]
    pub geometry: Vec<u32>,
    #[prost(uint64, repeated, packed = "true", tag = "5")]
    pub extended_tags: Vec<u64>,
    #[prost(uint64, repeated, packed = "true", tag = "6")]
    pub geometric_attributes: Vec<u64>,
    #[prost(sint64, repeated, packed = "true", tag = "7")]
    pub elevations: Vec<i64>,
    #[prost(uint64, repeated, packed = "true", tag = "8")]
    pub spline_knots: Vec<u64>,
    #[prost(uint32, optional, tag = "9")]
    pub spline_degree: Option<u32>,
    #[prost(string, optional, tag = "10")]
    pub string_id: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueMessage {
    #[prost(string, optional, tag = "1")]
    pub string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    pub int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    pub uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    pub sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    pub bool_value: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ScalingMessage {
    #[prost(sint64, optional, tag = "1")]
    pub offset: Option<i64>,
    #[prost(double, optional, tag = "2")]
    pub multiplier: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub base: Option<f64>,
}

impl ValueMessage {
    fn string(value: &str) -> Self {
        Self {
            string_value: Some(value.to_string()),
            ..Self::default()
        }
    }

    fn int(value: i64) -> Self {
        Self {
            int_value: Some(value),
            ..Self::default()
        }
    }

    fn uint(value: u64) -> Self {
        Self {
            uint_value: Some(value),
            ..Self::default()
        }
    }
}

/// Encodes a command word.
pub const fn command(id: u32, count: u32) -> u32 {
    (id & 0x7) | (count << 3)
}

/// Encodes a complex attribute value word.
pub const fn complex(value_type: u64, parameter: u64) -> u64 {
    value_type | (parameter << 4)
}

#[expect(clippy::cast_sign_loss)]
const fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Builds a geometry command stream from absolute positions.
#[derive(Clone, Debug, Default)]
pub struct GeometryBuilder {
    cursor: (i32, i32),
    words: Vec<u32>,
}

impl GeometryBuilder {
    fn points(mut self, id: u32, points: &[(i32, i32)]) -> Self {
        let count = u32::try_from(points.len()).expect("Too many points");
        self.words.push(command(id, count));
        for &(x, y) in points {
            self.words.push(zigzag(x - self.cursor.0));
            self.words.push(zigzag(y - self.cursor.1));
            self.cursor = (x, y);
        }
        self
    }

    pub fn move_to(self, points: &[(i32, i32)]) -> Self {
        self.points(1, points)
    }

    pub fn line_to(self, points: &[(i32, i32)]) -> Self {
        self.points(2, points)
    }

    pub fn close_path(mut self) -> Self {
        self.words.push(command(7, 1));
        self
    }

    pub fn finish(self) -> Vec<u32> {
        self.words
    }
}

/// Encodes a layer on its own, returning the bytes and the range of the layer message body.
pub fn decode_layer(message: &LayerMessage) -> (Vec<u8>, Range<usize>) {
    let data = message.encode_to_vec();
    let range = 0..data.len();
    (data, range)
}

/// Encodes a layer holding a single feature with the given geometry.
pub fn single_feature_layer(
    geom_type: GeomType,
    geometry: GeometryBuilder,
) -> (Vec<u8>, Range<usize>) {
    decode_layer(&LayerMessage {
        version: Some(2),
        name: "geojson".to_string(),
        features: vec![FeatureMessage {
            r#type: Some(geom_type as u32),
            geometry: geometry.finish(),
            ..FeatureMessage::default()
        }],
        ..LayerMessage::default()
    })
}

/// Collects features of a layer, interning tag keys and values as an encoder would.
struct LayerBuilder {
    layer: LayerMessage,
}

impl LayerBuilder {
    fn new(name: &str) -> Self {
        Self {
            layer: LayerMessage {
                version: Some(2),
                name: name.to_string(),
                extent: Some(4096),
                ..LayerMessage::default()
            },
        }
    }

    fn intern_tag(&mut self, key: &str, value: ValueMessage) -> [u32; 2] {
        let keys = &mut self.layer.keys;
        let key_index = keys.iter().position(|k| k == key).unwrap_or_else(|| {
            keys.push(key.to_string());
            keys.len() - 1
        });
        let values = &mut self.layer.values;
        let value_index = values.iter().position(|v| *v == value).unwrap_or_else(|| {
            values.push(value);
            values.len() - 1
        });
        [
            u32::try_from(key_index).expect("Too many keys"),
            u32::try_from(value_index).expect("Too many values"),
        ]
    }

    fn feature(
        mut self,
        id: Option<u64>,
        geom_type: GeomType,
        geometry: GeometryBuilder,
        properties: Vec<(&str, ValueMessage)>,
    ) -> Self {
        let tags = properties
            .into_iter()
            .flat_map(|(key, value)| self.intern_tag(key, value))
            .collect();
        self.layer.features.push(FeatureMessage {
            id,
            tags,
            r#type: Some(geom_type as u32),
            geometry: geometry.finish(),
            ..FeatureMessage::default()
        });
        self
    }

    fn filler(mut self, count: usize, geom_type: GeomType) -> Self {
        for i in 0..count {
            let offset = i32::try_from(i % 4000).expect("Offset overflow");
            let geometry = match geom_type {
                GeomType::LineString => GeometryBuilder::default()
                    .move_to(&[(offset, 10)])
                    .line_to(&[(offset + 5, 20)]),
                GeomType::Polygon => GeometryBuilder::default()
                    .move_to(&[(offset, 0)])
                    .line_to(&[(offset + 10, 0), (offset + 10, 10)])
                    .close_path(),
                GeomType::Point | GeomType::Unknown => {
                    GeometryBuilder::default().move_to(&[(offset, offset)])
                }
            };
            let id = u64::try_from(i).expect("Id overflow") + 1;
            self = self.feature(
                Some(id),
                geom_type,
                geometry,
                vec![("name", ValueMessage::string(&format!("filler {i}")))],
            );
        }
        self
    }

    fn build(self) -> LayerMessage {
        self.layer
    }
}

/// A tile shaped like the Mapbox Streets tile 14/8801/5371 (Berlin).
fn streets_tile() -> TileMessage {
    let mut layers = Vec::new();

    for (name, geom_type) in [
        ("landuse", GeomType::Polygon),
        ("waterway", GeomType::LineString),
        ("water", GeomType::Polygon),
        ("barrier_line", GeomType::LineString),
    ] {
        layers.push(LayerBuilder::new(name).filler(3, geom_type).build());
    }

    layers.push(
        LayerBuilder::new("building")
            .feature(
                Some(1_000_267_229_912),
                GeomType::Polygon,
                GeometryBuilder::default()
                    .move_to(&[(2039, -32)])
                    .line_to(&[(2035, -31), (2032, -31), (2032, -32)])
                    .close_path(),
                vec![("osm_id", ValueMessage::uint(1_000_267_229_912))],
            )
            .filler(20, GeomType::Polygon)
            .build(),
    );

    for (name, geom_type) in [
        ("landuse_overlay", GeomType::Polygon),
        ("tunnel", GeomType::LineString),
    ] {
        layers.push(LayerBuilder::new(name).filler(2, geom_type).build());
    }

    layers.push(
        LayerBuilder::new("road")
            .filler(656, GeomType::LineString)
            .feature(
                Some(4_076_951),
                GeomType::LineString,
                GeometryBuilder::default()
                    .move_to(&[(1988, 306)])
                    .line_to(&[(1808, 321), (1506, 347)]),
                vec![("class", ValueMessage::string("street"))],
            )
            .build(),
    );

    layers.push(
        LayerBuilder::new("bridge")
            .feature(
                Some(238_162_948),
                GeomType::LineString,
                GeometryBuilder::default()
                    .move_to(&[(3376, 1012)])
                    .line_to(&[(3373, 960)]),
                vec![
                    ("class", ValueMessage::string("service")),
                    ("oneway", ValueMessage::int(0)),
                    ("osm_id", ValueMessage::uint(238_162_948)),
                    ("type", ValueMessage::string("service")),
                ],
            )
            .build(),
    );

    for (name, geom_type) in [
        ("place_label", GeomType::Point),
        ("water_label", GeomType::Point),
    ] {
        layers.push(LayerBuilder::new(name).filler(4, geom_type).build());
    }

    layers.push(
        LayerBuilder::new("poi_label")
            .filler(11, GeomType::Point)
            .feature(
                Some(3_000_003_150_561),
                GeomType::Point,
                GeometryBuilder::default().move_to(&[(3898, 1731)]),
                vec![
                    ("localrank", ValueMessage::uint(1)),
                    ("maki", ValueMessage::string("park")),
                    ("name", ValueMessage::string("Mauerpark")),
                    ("name_de", ValueMessage::string("Mauerpark")),
                    ("name_en", ValueMessage::string("Mauerpark")),
                    ("name_es", ValueMessage::string("Mauerpark")),
                    ("name_fr", ValueMessage::string("Mauerpark")),
                    ("osm_id", ValueMessage::uint(3_000_003_150_561)),
                    ("ref", ValueMessage::string("")),
                    ("scalerank", ValueMessage::uint(2)),
                    ("type", ValueMessage::string("Park")),
                ],
            )
            .filler(546, GeomType::Point)
            .build(),
    );

    for (name, geom_type) in [
        ("road_label", GeomType::LineString),
        ("waterway_label", GeomType::LineString),
    ] {
        layers.push(LayerBuilder::new(name).filler(2, geom_type).build());
    }

    TileMessage { layers }
}

/// A tile with one feature of each type in a 32768 unit extent, for overzoom clipping.
fn clip_tile() -> TileMessage {
    let layer = |name: &str, geom_type: GeomType, geometry: GeometryBuilder| {
        let mut layer = LayerBuilder::new(name)
            .feature(Some(1), geom_type, geometry, vec![])
            .build();
        layer.extent = Some(32768);
        layer
    };

    TileMessage {
        layers: vec![
            layer(
                "polygon",
                GeomType::Polygon,
                GeometryBuilder::default()
                    .move_to(&[(0, 14336)])
                    .line_to(&[(0, 0), (6964, 1), (19712, 15936), (20000, 14336)])
                    .close_path(),
            ),
            layer(
                "line",
                GeomType::LineString,
                GeometryBuilder::default()
                    .move_to(&[(6964, 1)])
                    .line_to(&[(19712, 15936)]),
            ),
            layer(
                "point",
                GeomType::Point,
                GeometryBuilder::default().move_to(&[(10240, 14336), (16384, 10240), (20000, 20000)]),
            ),
        ],
    }
}

pub static TEST_STREETS_TILE_DATA: LazyLock<Vec<u8>> =
    LazyLock::new(|| streets_tile().encode_to_vec());

pub static TEST_STREETS_TILE: LazyLock<VectorTile<'static>> = LazyLock::new(|| {
    VectorTile::try_from(TEST_STREETS_TILE_DATA.as_slice())
        .expect("Unable to decode the streets fixture tile")
});

static TEST_CLIP_TILE_DATA: LazyLock<Vec<u8>> = LazyLock::new(|| clip_tile().encode_to_vec());

pub static TEST_CLIP_TILE: LazyLock<VectorTile<'static>> = LazyLock::new(|| {
    VectorTile::try_from(TEST_CLIP_TILE_DATA.as_slice())
        .expect("Unable to decode the clip fixture tile")
});
