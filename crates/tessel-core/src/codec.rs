//! Leaf kinds and their binary codec.
//!
//! Every primitive schema type maps to one [`PrimitiveKind`]. Fixed-width
//! kinds report a byte [`size`](Codec::size) and are eligible for
//! buffer-mapped storage; `varint`, `varuint` and `string` are variable
//! width and make any object containing them shapeless.
//!
//! All multi-byte encodings are little-endian. Variable-width integers use
//! LEB128 (zig-zag for signed), strings are a `varuint` byte length
//! followed by UTF-8.

use crate::error::CodecError;
use crate::value::Value;

/// Encode/decode one scalar value to/from a byte range.
pub trait Codec {
    /// Fixed encoded size in bytes, or `None` for variable-width kinds.
    fn size(&self) -> Option<usize>;

    /// Number of bytes `value` occupies once encoded.
    fn encoded_len(&self, value: &Value) -> usize;

    /// Encode `value` into `buf` starting at `offset`, returning the
    /// number of bytes written.
    fn encode(&self, value: &Value, buf: &mut [u8], offset: usize) -> Result<usize, CodecError>;

    /// Decode a value from `buf` starting at `offset`, returning the
    /// value and the number of bytes read.
    fn decode(&self, buf: &[u8], offset: usize) -> Result<(Value, usize), CodecError>;
}

/// The leaf types understood by the built-in registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `bool`, one byte.
    Bool,
    /// `int8`.
    Int8,
    /// `uint8`.
    UInt8,
    /// `int16`.
    Int16,
    /// `uint16`.
    UInt16,
    /// `int32`.
    Int32,
    /// `uint32`.
    UInt32,
    /// `int64`, carried losslessly as [`Value::Int`].
    Int64,
    /// `uint64`, carried losslessly as [`Value::UInt`].
    UInt64,
    /// `float32`.
    Float32,
    /// `float64`.
    Float64,
    /// `varint`, zig-zag LEB128.
    VarInt,
    /// `varuint`, LEB128.
    VarUInt,
    /// `string`, length-prefixed UTF-8.
    String,
}

impl PrimitiveKind {
    /// Every kind, in registry order.
    pub const ALL: [PrimitiveKind; 14] = [
        Self::Bool,
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::VarInt,
        Self::VarUInt,
        Self::String,
    ];

    /// The schema type name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::VarInt => "varint",
            Self::VarUInt => "varuint",
            Self::String => "string",
        }
    }

    /// Look a kind up by schema type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The implicit default: `false`, `0`, `0.0` or `""`.
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::VarInt => Value::Int(0),
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 | Self::VarUInt => {
                Value::UInt(0)
            }
            Self::Float32 | Self::Float64 => Value::Float(0.0),
            Self::String => Value::String(String::new()),
        }
    }

    /// Convert an arbitrary value into the canonical form this kind stores.
    ///
    /// Integers truncate toward zero and wrap like a typed-array store,
    /// `float32` rounds through single precision, `bool` takes the value's
    /// truthiness and `string` its display form. `Null` coerces to
    /// [`zero`](Self::zero).
    pub fn coerce(self, value: &Value) -> Value {
        if value.is_null() {
            return self.zero();
        }
        match self {
            Self::Bool => Value::Bool(value.truthy()),
            Self::Int8 => Value::Int(i64::from(value.to_integer() as i8)),
            Self::UInt8 => Value::UInt(u64::from(value.to_integer() as u8)),
            Self::Int16 => Value::Int(i64::from(value.to_integer() as i16)),
            Self::UInt16 => Value::UInt(u64::from(value.to_integer() as u16)),
            Self::Int32 => Value::Int(i64::from(value.to_integer() as i32)),
            Self::UInt32 => Value::UInt(u64::from(value.to_integer() as u32)),
            Self::Int64 | Self::VarInt => Value::Int(value.to_integer() as i64),
            Self::UInt64 => Value::UInt(value.to_integer() as u64),
            Self::VarUInt => Value::UInt(value.to_integer().max(0) as u64),
            Self::Float32 => Value::Float(f64::from(value.to_float() as f32)),
            Self::Float64 => Value::Float(value.to_float()),
            Self::String => match value {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            },
        }
    }
}

// ── LEB128 helpers ──────────────────────────────────────────────

fn varuint_len(mut n: u64) -> usize {
    let mut len = 1;
    while n >= 0x80 {
        n >>= 7;
        len += 1;
    }
    len
}

fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

fn write_varuint(mut n: u64, buf: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    let len = varuint_len(n);
    let out = slot(buf, offset, len)?;
    for byte in out.iter_mut() {
        *byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            *byte |= 0x80;
        }
    }
    Ok(len)
}

fn read_varuint(buf: &[u8], offset: usize) -> Result<(u64, usize), CodecError> {
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut pos = offset;
    loop {
        let byte = *buf.get(pos).ok_or(CodecError::Truncated {
            needed: pos - offset + 1,
            available: buf.len().saturating_sub(offset),
        })?;
        if shift >= 64 || (shift == 63 && byte & 0x7e != 0) {
            return Err(CodecError::Overlong);
        }
        result |= u64::from(byte & 0x7f) << shift;
        pos += 1;
        if byte & 0x80 == 0 {
            return Ok((result, pos - offset));
        }
        shift += 7;
    }
}

fn slot(buf: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8], CodecError> {
    let available = buf.len().saturating_sub(offset);
    if available < len {
        return Err(CodecError::Truncated {
            needed: len,
            available,
        });
    }
    Ok(&mut buf[offset..offset + len])
}

fn fixed<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], CodecError> {
    let available = buf.len().saturating_sub(offset);
    if available < N {
        return Err(CodecError::Truncated {
            needed: N,
            available,
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    Ok(out)
}

fn put(bytes: &[u8], buf: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    slot(buf, offset, bytes.len())?.copy_from_slice(bytes);
    Ok(bytes.len())
}

// ── Codec ───────────────────────────────────────────────────────

impl Codec for PrimitiveKind {
    fn size(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => Some(8),
            Self::VarInt | Self::VarUInt | Self::String => None,
        }
    }

    fn encoded_len(&self, value: &Value) -> usize {
        if let Some(size) = self.size() {
            return size;
        }
        match self.coerce(value) {
            Value::Int(n) => varuint_len(zigzag(n)),
            Value::UInt(n) => varuint_len(n),
            Value::String(s) => varuint_len(s.len() as u64) + s.len(),
            _ => 0,
        }
    }

    fn encode(&self, value: &Value, buf: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        let value = self.coerce(value);
        match (self, &value) {
            (Self::Bool, Value::Bool(b)) => put(&[u8::from(*b)], buf, offset),
            (Self::Int8, Value::Int(n)) => put(&(*n as i8).to_le_bytes(), buf, offset),
            (Self::UInt8, Value::UInt(n)) => put(&(*n as u8).to_le_bytes(), buf, offset),
            (Self::Int16, Value::Int(n)) => put(&(*n as i16).to_le_bytes(), buf, offset),
            (Self::UInt16, Value::UInt(n)) => put(&(*n as u16).to_le_bytes(), buf, offset),
            (Self::Int32, Value::Int(n)) => put(&(*n as i32).to_le_bytes(), buf, offset),
            (Self::UInt32, Value::UInt(n)) => put(&(*n as u32).to_le_bytes(), buf, offset),
            (Self::Int64, Value::Int(n)) => put(&n.to_le_bytes(), buf, offset),
            (Self::UInt64, Value::UInt(n)) => put(&n.to_le_bytes(), buf, offset),
            (Self::Float32, Value::Float(f)) => put(&(*f as f32).to_le_bytes(), buf, offset),
            (Self::Float64, Value::Float(f)) => put(&f.to_le_bytes(), buf, offset),
            (Self::VarInt, Value::Int(n)) => write_varuint(zigzag(*n), buf, offset),
            (Self::VarUInt, Value::UInt(n)) => write_varuint(*n, buf, offset),
            (Self::String, Value::String(s)) => {
                let head = write_varuint(s.len() as u64, buf, offset)?;
                let body = put(s.as_bytes(), buf, offset + head)?;
                Ok(head + body)
            }
            // coerce() always yields the variant matched above.
            _ => Ok(0),
        }
    }

    fn decode(&self, buf: &[u8], offset: usize) -> Result<(Value, usize), CodecError> {
        let decoded = match self {
            Self::Bool => (Value::Bool(fixed::<1>(buf, offset)?[0] != 0), 1),
            Self::Int8 => (Value::from(i8::from_le_bytes(fixed(buf, offset)?)), 1),
            Self::UInt8 => (Value::from(u8::from_le_bytes(fixed(buf, offset)?)), 1),
            Self::Int16 => (Value::from(i16::from_le_bytes(fixed(buf, offset)?)), 2),
            Self::UInt16 => (Value::from(u16::from_le_bytes(fixed(buf, offset)?)), 2),
            Self::Int32 => (Value::from(i32::from_le_bytes(fixed(buf, offset)?)), 4),
            Self::UInt32 => (Value::from(u32::from_le_bytes(fixed(buf, offset)?)), 4),
            Self::Int64 => (Value::from(i64::from_le_bytes(fixed(buf, offset)?)), 8),
            Self::UInt64 => (Value::from(u64::from_le_bytes(fixed(buf, offset)?)), 8),
            Self::Float32 => (Value::from(f32::from_le_bytes(fixed(buf, offset)?)), 4),
            Self::Float64 => (Value::from(f64::from_le_bytes(fixed(buf, offset)?)), 8),
            Self::VarInt => {
                let (n, len) = read_varuint(buf, offset)?;
                (Value::Int(unzigzag(n)), len)
            }
            Self::VarUInt => {
                let (n, len) = read_varuint(buf, offset)?;
                (Value::UInt(n), len)
            }
            Self::String => {
                let (n, head) = read_varuint(buf, offset)?;
                let start = offset + head;
                let len = usize::try_from(n).map_err(|_| CodecError::Overlong)?;
                let available = buf.len().saturating_sub(start);
                if available < len {
                    return Err(CodecError::Truncated {
                        needed: head + len,
                        available: available + head,
                    });
                }
                let s = std::str::from_utf8(&buf[start..start + len])
                    .map_err(|_| CodecError::InvalidUtf8)?;
                (Value::String(s.to_owned()), head + len)
            }
        };
        Ok(decoded)
    }
}
