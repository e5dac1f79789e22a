//! Bounded CBOR decoding for authenticator output.
//!
//! Attestation objects, COSE keys and extension maps arrive straight from the
//! browser, so the decoder refuses anything it cannot bound up front: the
//! total input length, nesting depth, map sizes and every declared length are
//! checked before a single byte is allocated. Only the subset of CBOR produced by
//! CTAP2 canonical encoding is accepted (definite lengths, no floats).

use ciborium::value::{Integer, Value};
use thiserror::Error;

pub const DEFAULT_MAX_LENGTH: usize = 64 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 8;
pub const DEFAULT_MAX_MAP_ENTRIES: usize = 64;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u64 = 20;
const SIMPLE_TRUE: u64 = 21;
const SIMPLE_NULL: u64 = 22;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    pub max_length: usize,
    pub max_depth: usize,
    /// Duplicate keys are found by a linear scan, so this also bounds the
    /// work done per key.
    pub max_map_entries: usize,
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_length: DEFAULT_MAX_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            max_map_entries: DEFAULT_MAX_MAP_ENTRIES,
        }
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CborError {
    #[error("input of {length} bytes exceeds limit of {limit}")]
    TooLong { length: usize, limit: usize },
    #[error("nesting exceeds depth limit of {0}")]
    TooDeep(usize),
    #[error("unexpected end of input at offset {0}")]
    Truncated(usize),
    #[error("indefinite length item at offset {0}")]
    IndefiniteLength(usize),
    #[error("unsupported item (major {major}, info {info}) at offset {offset}")]
    Unsupported { major: u8, info: u8, offset: usize },
    #[error("invalid utf-8 text at offset {0}")]
    InvalidUtf8(usize),
    #[error("map of {count} entries at offset {offset} exceeds limit of {limit}")]
    TooManyEntries {
        count: u64,
        limit: usize,
        offset: usize,
    },
    #[error("duplicate map key at offset {0}")]
    DuplicateKey(usize),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
    max_depth: usize,
    max_map_entries: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8], limits: Limits) -> Result<Decoder<'a>, CborError> {
        if input.len() > limits.max_length {
            return Err(CborError::TooLong {
                length: input.len(),
                limit: limits.max_length,
            });
        }

        Ok(Decoder {
            input,
            position: 0,
            max_depth: limits.max_depth,
            max_map_entries: limits.max_map_entries,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.position..]
    }

    pub fn decode_value(&mut self) -> Result<Value, CborError> {
        self.decode_at_depth(1)
    }

    fn decode_at_depth(&mut self, depth: usize) -> Result<Value, CborError> {
        if depth > self.max_depth {
            return Err(CborError::TooDeep(self.max_depth));
        }

        let offset = self.position;
        let initial_byte = self.take_byte()?;
        let major = initial_byte >> 5;
        let info = initial_byte & 0x1f;

        if major == MAJOR_SIMPLE {
            return match info {
                0..=23 => Self::simple(info as u64, offset),
                24 => {
                    let value = self.take_byte()? as u64;
                    Self::simple(value, offset)
                }
                _ => Err(CborError::Unsupported {
                    major,
                    info,
                    offset,
                }),
            };
        }

        let argument = self.argument(major, info, offset)?;

        match major {
            MAJOR_UNSIGNED => Ok(Value::Integer(Integer::from(argument))),
            MAJOR_NEGATIVE => {
                let value = -1 - i128::from(argument);

                match Integer::try_from(value) {
                    Ok(integer) => Ok(Value::Integer(integer)),
                    Err(_) => Err(CborError::Unsupported {
                        major,
                        info,
                        offset,
                    }),
                }
            }
            MAJOR_BYTES => {
                let bytes = self.take(argument)?;

                Ok(Value::Bytes(bytes.to_vec()))
            }
            MAJOR_TEXT => {
                let bytes = self.take(argument)?;

                match std::str::from_utf8(bytes) {
                    Ok(text) => Ok(Value::Text(text.to_owned())),
                    Err(_) => Err(CborError::InvalidUtf8(offset)),
                }
            }
            MAJOR_ARRAY => {
                let count = self.bounded_count(argument, 1)?;
                let mut array = Vec::with_capacity(count);

                for _ in 0..count {
                    array.push(self.decode_at_depth(depth + 1)?);
                }

                Ok(Value::Array(array))
            }
            MAJOR_MAP => {
                if argument > self.max_map_entries as u64 {
                    return Err(CborError::TooManyEntries {
                        count: argument,
                        limit: self.max_map_entries,
                        offset,
                    });
                }

                let count = self.bounded_count(argument, 2)?;
                let mut map: Vec<(Value, Value)> = Vec::with_capacity(count);

                for _ in 0..count {
                    let key_offset = self.position;
                    let key = self.decode_at_depth(depth + 1)?;

                    if map.iter().any(|(existing, _)| *existing == key) {
                        return Err(CborError::DuplicateKey(key_offset));
                    }

                    let value = self.decode_at_depth(depth + 1)?;

                    map.push((key, value));
                }

                Ok(Value::Map(map))
            }
            MAJOR_TAG => {
                let value = self.decode_at_depth(depth + 1)?;

                Ok(Value::Tag(argument, Box::new(value)))
            }
            _ => Err(CborError::Unsupported {
                major,
                info,
                offset,
            }),
        }
    }

    fn simple(value: u64, offset: usize) -> Result<Value, CborError> {
        match value {
            SIMPLE_FALSE => Ok(Value::Bool(false)),
            SIMPLE_TRUE => Ok(Value::Bool(true)),
            SIMPLE_NULL => Ok(Value::Null),
            _ => Err(CborError::Unsupported {
                major: MAJOR_SIMPLE,
                info: value.min(u8::MAX as u64) as u8,
                offset,
            }),
        }
    }

    fn argument(&mut self, major: u8, info: u8, offset: usize) -> Result<u64, CborError> {
        match info {
            0..=23 => Ok(info as u64),
            24 => Ok(self.take_byte()? as u64),
            25 => {
                let mut bytes = [0; 2];
                bytes.copy_from_slice(self.take(2)?);
                Ok(u16::from_be_bytes(bytes) as u64)
            }
            26 => {
                let mut bytes = [0; 4];
                bytes.copy_from_slice(self.take(4)?);
                Ok(u32::from_be_bytes(bytes) as u64)
            }
            27 => {
                let mut bytes = [0; 8];
                bytes.copy_from_slice(self.take(8)?);
                Ok(u64::from_be_bytes(bytes))
            }
            31 => Err(CborError::IndefiniteLength(offset)),
            _ => Err(CborError::Unsupported {
                major,
                info,
                offset,
            }),
        }
    }

    /// Every array element needs at least one byte and every map entry two, so a
    /// count larger than that cannot be satisfied by the remaining input.
    fn bounded_count(&self, count: u64, minimum_item_size: u64) -> Result<usize, CborError> {
        let remaining = (self.input.len() - self.position) as u64;

        match count.checked_mul(minimum_item_size) {
            Some(required) if required <= remaining => Ok(count as usize),
            _ => Err(CborError::Truncated(self.position)),
        }
    }

    fn take_byte(&mut self) -> Result<u8, CborError> {
        match self.input.get(self.position) {
            Some(byte) => {
                self.position += 1;

                Ok(*byte)
            }
            None => Err(CborError::Truncated(self.position)),
        }
    }

    fn take(&mut self, length: u64) -> Result<&'a [u8], CborError> {
        let remaining = self.input.len() - self.position;

        if length > remaining as u64 {
            return Err(CborError::Truncated(self.position));
        }

        let start = self.position;
        self.position += length as usize;

        Ok(&self.input[start..self.position])
    }
}

/// Decodes exactly one item; anything left over is an error.
pub fn from_slice(input: &[u8], limits: Limits) -> Result<Value, CborError> {
    let mut decoder = Decoder::new(input, limits)?;
    let value = decoder.decode_value()?;

    match decoder.remaining().len() {
        0 => Ok(value),
        trailing => Err(CborError::TrailingBytes(trailing)),
    }
}

/// Looks up a text key in a decoded map.
pub fn map_get<'v>(map: &'v [(Value, Value)], key: &str) -> Option<&'v Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(text) if text == key))
        .map(|(_, v)| v)
}

/// Looks up an integer key in a decoded map (COSE labels).
pub fn map_get_label(map: &[(Value, Value)], label: i64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| match k {
            Value::Integer(integer) => i128::from(*integer) == i128::from(label),
            _ => false,
        })
        .map(|(_, v)| v)
}
