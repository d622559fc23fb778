//! # Extended attribute values
//!
//! Version 3 layers encode attribute values inline as a single varint
//! with the value type in the low 4 bits and a type-specific parameter in the rest.
//! Scalars either carry their value in the parameter, or index into one of the layer's value pools.
//! Lists and maps use the parameter as an element count and are followed by their elements.

use crate::error::DecodeError;
use crate::layer::Layer;
use crate::value::Value;
use indexmap::IndexMap;
use num_enum::TryFromPrimitive;
use pbf_reader::PbfReader;

/// Lists and maps may not nest deeper than this.
const MAX_NESTING_DEPTH: usize = 64;

/// The type tag of a complex value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ComplexValueType {
    /// Index into the string pool.
    String = 0,
    /// Index into the float pool.
    Float = 1,
    /// Index into the double pool.
    Double = 2,
    /// Index into the int pool, read as unsigned.
    UInt = 3,
    /// Index into the int pool, zig-zag decoded.
    SInt = 4,
    /// Inline unsigned integer.
    InlineUInt = 5,
    /// Inline zig-zag encoded integer.
    InlineSInt = 6,
    /// `0` is null, `1` is false and `3` is true.
    BoolOrNull = 7,
    /// A list of the following `parameter` values.
    List = 8,
    /// A map of the following `parameter` key index and value pairs.
    Map = 9,
    /// A list of `parameter` delta-encoded numbers, preceded by a scaling index.
    DeltaList = 10,
}

#[inline]
#[expect(clippy::cast_possible_wrap)]
const fn decode_zigzag(value: u64) -> i64 {
    (value >> 1) as i64 ^ -((value & 1) as i64)
}

fn pool_index(index: u64, table: &'static str) -> Result<usize, DecodeError> {
    usize::try_from(index).map_err(|_| DecodeError::InvalidTableIndex { table, index })
}

fn lookup<'t, T>(pool: &'t [T], index: u64, table: &'static str) -> Result<&'t T, DecodeError> {
    pool.get(pool_index(index, table)?)
        .ok_or(DecodeError::InvalidTableIndex { table, index })
}

impl Layer<'_> {
    /// Reads one complex value from `reader`, including any nested elements.
    ///
    /// # Errors
    ///
    /// Fails on unknown value types, dangling pool indices and malformed data.
    pub(crate) fn read_complex_value(
        &self,
        reader: &mut PbfReader<'_>,
    ) -> Result<Value, DecodeError> {
        self.read_complex_value_nested(reader, 0)
    }

    fn read_complex_value_nested(
        &self,
        reader: &mut PbfReader<'_>,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::NestingTooDeep);
        }

        let complex = reader.read_varint()?;
        #[allow(clippy::cast_possible_truncation)]
        let tag = (complex & 0x0f) as u8;
        let parameter = complex >> 4;

        let value_type = ComplexValueType::try_from(tag)
            .map_err(|_| DecodeError::UnknownComplexValueType(tag))?;

        let value = match value_type {
            ComplexValueType::String => {
                Value::String(lookup(self.string_values(), parameter, "string")?.to_string())
            }
            ComplexValueType::Float => {
                Value::Float(*lookup(self.float_values(), parameter, "float")?)
            }
            ComplexValueType::Double => {
                Value::Double(*lookup(self.double_values(), parameter, "double")?)
            }
            ComplexValueType::UInt => Value::UInt(*lookup(self.int_values(), parameter, "int")?),
            ComplexValueType::SInt => {
                Value::Int(decode_zigzag(*lookup(self.int_values(), parameter, "int")?))
            }
            ComplexValueType::InlineUInt => Value::UInt(parameter),
            ComplexValueType::InlineSInt => Value::Int(decode_zigzag(parameter)),
            ComplexValueType::BoolOrNull => {
                if parameter == 0 {
                    Value::Null
                } else {
                    Value::Bool(parameter >> 1 != 0)
                }
            }
            ComplexValueType::List => {
                let mut values = Vec::new();
                for _ in 0..parameter {
                    values.push(self.read_complex_value_nested(reader, depth + 1)?);
                }
                Value::List(values)
            }
            ComplexValueType::Map => {
                let mut map = IndexMap::new();
                for _ in 0..parameter {
                    let key = self.key(reader.read_varint()?)?;
                    let value = self.read_complex_value_nested(reader, depth + 1)?;
                    map.insert(key.to_string(), value);
                }
                Value::Map(map)
            }
            ComplexValueType::DeltaList => {
                let scaling_index = reader.read_varint()?;
                let scaling =
                    *lookup(self.attribute_scalings(), scaling_index, "attribute scaling")?;

                let mut values = Vec::new();
                let mut accumulated: i64 = 0;
                for _ in 0..parameter {
                    let encoding = reader.read_varint()?;
                    if encoding == 0 {
                        values.push(Value::Null);
                    } else {
                        accumulated = accumulated.wrapping_add(decode_zigzag(encoding - 1));
                        values.push(Value::Double(scaling.scale(accumulated)));
                    }
                }
                Value::List(values)
            }
        };

        Ok(value)
    }
}
