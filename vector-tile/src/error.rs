use pbf_reader::PbfError;
use thiserror::Error;

/// Errors raised while decoding tile, layer, feature and attribute messages.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Malformed protobuf data: {0}")]
    Pbf(#[from] PbfError),
    #[error("Feature index {index} is out of bounds (the layer has {length} features).")]
    FeatureIndexOutOfBounds { index: usize, length: usize },
    #[error("The value message does not contain any recognized field.")]
    MissingValue,
    #[error("Unrecognized complex value type: {0}")]
    UnknownComplexValueType(u8),
    #[error("Index {index} does not exist in the layer's {table} table.")]
    InvalidTableIndex { table: &'static str, index: u64 },
    #[error("The {field} field value {value} is out of range.")]
    FieldOutOfRange { field: &'static str, value: u64 },
    #[error("Attribute values are nested too deeply.")]
    NestingTooDeep,
}

/// Errors raised while interpreting or converting feature geometry.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Malformed protobuf data: {0}")]
    Pbf(#[from] PbfError),
    #[error("Unknown geometry command {0}.")]
    UnknownCommand(u32),
    #[error("Coordinate delta overflows the tile coordinate space.")]
    CoordinateOverflow,
    #[error("Unknown feature type; the geometry cannot be interpreted.")]
    UnknownGeometryType,
    #[error("No overzoom parameters have been set on this feature.")]
    NoOverzoom,
    #[error("Cannot overzoom by {0} levels; the limit is 31.")]
    OverzoomTooDeep(u8),
}

/// Errors from operations that decode features and convert their geometry in one go.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
