//! Auxiliary tag fields: the byte-addressable, lazily-deserialized
//! tagged-value model.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};

/// A decoded array payload for the `B` aux type, one variant per subtype
/// byte.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float(Vec<f32>),
}

impl ArrayValue {
    fn subtype_code(&self) -> u8 {
        match self {
            ArrayValue::Int8(_) => b'c',
            ArrayValue::UInt8(_) => b'C',
            ArrayValue::Int16(_) => b's',
            ArrayValue::UInt16(_) => b'S',
            ArrayValue::Int32(_) => b'i',
            ArrayValue::UInt32(_) => b'I',
            ArrayValue::Float(_) => b'f',
        }
    }

    fn count(&self) -> usize {
        match self {
            ArrayValue::Int8(v) => v.len(),
            ArrayValue::UInt8(v) => v.len(),
            ArrayValue::Int16(v) => v.len(),
            ArrayValue::UInt16(v) => v.len(),
            ArrayValue::Int32(v) => v.len(),
            ArrayValue::UInt32(v) => v.len(),
            ArrayValue::Float(v) => v.len(),
        }
    }
}

/// A deserialized aux value, materialised on demand from the field's
/// byte buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Char(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float(f32),
    Text(String),
    Hex(Vec<u8>),
    Array(ArrayValue),
}

/// An unevaluated input to [`Field::new`] — distinct from [`Value`]
/// because integer literals here are subject to narrowest-subtype
/// selection on encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Char(u8),
    Int(i64),
    Float(f32),
    Text(String),
    Hex(Vec<u8>),
    Array(ArrayValue),
}

/// One auxiliary field: a contiguous `tag(2) + type(1) + payload` byte
/// buffer with constant-time `tag`/`kind` accessors and a `value`
/// accessor that deserializes on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    buf: Vec<u8>,
}

impl Field {
    /// Builds a field from an already-framed `tag + type + payload`
    /// buffer, as read off the wire.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn tag(&self) -> [u8; 2] {
        [self.buf[0], self.buf[1]]
    }

    /// The ASCII type code byte (`A`, `c`, `C`, `s`, `S`, `i`, `I`, `f`,
    /// `Z`, `H`, `B`).
    pub fn kind(&self) -> u8 {
        self.buf[2]
    }

    fn payload(&self) -> &[u8] {
        &self.buf[3..]
    }

    /// Deserializes the payload according to `kind`.
    pub fn value(&self) -> Result<Value> {
        let mut cur = Cursor::new(self.payload());
        match self.kind() {
            b'A' => Ok(Value::Char(
                cur.read_u8().map_err(|_| Error::Truncated("aux char"))?,
            )),
            b'c' => Ok(Value::Int8(
                cur.read_i8().map_err(|_| Error::Truncated("aux int8"))?,
            )),
            b'C' => Ok(Value::UInt8(
                cur.read_u8().map_err(|_| Error::Truncated("aux uint8"))?,
            )),
            b's' => Ok(Value::Int16(
                cur.read_i16::<LittleEndian>()
                    .map_err(|_| Error::Truncated("aux int16"))?,
            )),
            b'S' => Ok(Value::UInt16(
                cur.read_u16::<LittleEndian>()
                    .map_err(|_| Error::Truncated("aux uint16"))?,
            )),
            b'i' => Ok(Value::Int32(
                cur.read_i32::<LittleEndian>()
                    .map_err(|_| Error::Truncated("aux int32"))?,
            )),
            b'I' => Ok(Value::UInt32(
                cur.read_u32::<LittleEndian>()
                    .map_err(|_| Error::Truncated("aux uint32"))?,
            )),
            b'f' => Ok(Value::Float(
                cur.read_f32::<LittleEndian>()
                    .map_err(|_| Error::Truncated("aux float"))?,
            )),
            b'Z' => {
                let bytes = self.payload();
                let end = bytes
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(Error::Malformed("aux text missing terminator"))?;
                let text = std::str::from_utf8(&bytes[..end])
                    .map_err(|_| Error::Malformed("aux text not utf8"))?
                    .to_string();
                Ok(Value::Text(text))
            }
            b'H' => {
                let bytes = self.payload();
                let end = bytes
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(Error::Malformed("aux hex missing terminator"))?;
                let decoded =
                    hex::decode(&bytes[..end]).map_err(|_| Error::Malformed("aux hex not valid"))?;
                Ok(Value::Hex(decoded))
            }
            b'B' => decode_array(&mut cur).map(Value::Array),
            _ => Err(Error::Malformed("unknown aux type code")),
        }
    }

    /// Builds a new field, choosing the narrowest representation for
    /// integer inputs.
    pub fn new(tag: [u8; 2], input: Input) -> Result<Self> {
        let mut buf = vec![tag[0], tag[1]];
        match input {
            Input::Char(c) => {
                buf.push(b'A');
                buf.push(c);
            }
            Input::Int(v) => encode_narrowest_int(&mut buf, v)?,
            Input::Float(f) => {
                buf.push(b'f');
                buf.write_f32::<LittleEndian>(f).expect("vec write");
            }
            Input::Text(s) => {
                if s.len() > i32::MAX as usize {
                    return Err(Error::OutOfRange("aux text length"));
                }
                buf.push(b'Z');
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
            }
            Input::Hex(bytes) => {
                buf.push(b'H');
                buf.extend_from_slice(hex::encode_upper(&bytes).as_bytes());
                buf.push(0);
            }
            Input::Array(array) => {
                if array.count() > u32::MAX as usize {
                    return Err(Error::OutOfRange("aux array length"));
                }
                buf.push(b'B');
                buf.push(array.subtype_code());
                buf.write_u32::<LittleEndian>(array.count() as u32)
                    .expect("vec write");
                write_array_elements(&mut buf, &array);
            }
        }
        Ok(Self { buf })
    }
}

fn encode_narrowest_int(buf: &mut Vec<u8>, v: i64) -> Result<()> {
    if v >= 0 {
        if v <= u8::MAX as i64 {
            buf.push(b'C');
            buf.push(v as u8);
        } else if v <= u16::MAX as i64 {
            buf.push(b'S');
            buf.write_u16::<LittleEndian>(v as u16).expect("vec write");
        } else if v <= u32::MAX as i64 {
            buf.push(b'I');
            buf.write_u32::<LittleEndian>(v as u32).expect("vec write");
        } else {
            return Err(Error::OutOfRange("aux integer"));
        }
    } else if v >= i8::MIN as i64 {
        buf.push(b'c');
        buf.push(v as i8 as u8);
    } else if v >= i16::MIN as i64 {
        buf.push(b's');
        buf.write_i16::<LittleEndian>(v as i16).expect("vec write");
    } else if v >= i32::MIN as i64 {
        buf.push(b'i');
        buf.write_i32::<LittleEndian>(v as i32).expect("vec write");
    } else {
        return Err(Error::OutOfRange("aux integer"));
    }
    Ok(())
}

fn write_array_elements(buf: &mut Vec<u8>, array: &ArrayValue) {
    match array {
        ArrayValue::Int8(v) => v.iter().for_each(|&x| buf.push(x as u8)),
        ArrayValue::UInt8(v) => buf.extend_from_slice(v),
        ArrayValue::Int16(v) => v
            .iter()
            .for_each(|&x| buf.write_i16::<LittleEndian>(x).expect("vec write")),
        ArrayValue::UInt16(v) => v
            .iter()
            .for_each(|&x| buf.write_u16::<LittleEndian>(x).expect("vec write")),
        ArrayValue::Int32(v) => v
            .iter()
            .for_each(|&x| buf.write_i32::<LittleEndian>(x).expect("vec write")),
        ArrayValue::UInt32(v) => v
            .iter()
            .for_each(|&x| buf.write_u32::<LittleEndian>(x).expect("vec write")),
        ArrayValue::Float(v) => v
            .iter()
            .for_each(|&x| buf.write_f32::<LittleEndian>(x).expect("vec write")),
    }
}

fn decode_array(cur: &mut Cursor<&[u8]>) -> Result<ArrayValue> {
    let subtype = cur.read_u8().map_err(|_| Error::Truncated("aux array subtype"))?;
    let count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::Truncated("aux array count"))? as usize;
    let remaining = cur.get_ref().len() - cur.position() as usize;
    let element_size: usize = match subtype {
        b'c' | b'C' => 1,
        b's' | b'S' => 2,
        b'i' | b'I' | b'f' => 4,
        _ => return Err(Error::Malformed("unknown aux array subtype")),
    };
    if count.checked_mul(element_size).map(|n| n > remaining).unwrap_or(true) {
        return Err(Error::Malformed("aux array length exceeds buffer"));
    }
    macro_rules! read_n {
        ($read:ident) => {{
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(cur.$read().map_err(|_| Error::Truncated("aux array element"))?);
            }
            out
        }};
    }
    Ok(match subtype {
        b'c' => ArrayValue::Int8(read_n!(read_i8)),
        b'C' => ArrayValue::UInt8(read_n!(read_u8)),
        b's' => ArrayValue::Int16({
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(
                    cur.read_i16::<LittleEndian>()
                        .map_err(|_| Error::Truncated("aux array element"))?,
                );
            }
            out
        }),
        b'S' => {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(
                    cur.read_u16::<LittleEndian>()
                        .map_err(|_| Error::Truncated("aux array element"))?,
                );
            }
            ArrayValue::UInt16(out)
        }
        b'i' => {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(
                    cur.read_i32::<LittleEndian>()
                        .map_err(|_| Error::Truncated("aux array element"))?,
                );
            }
            ArrayValue::Int32(out)
        }
        b'I' => {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(
                    cur.read_u32::<LittleEndian>()
                        .map_err(|_| Error::Truncated("aux array element"))?,
                );
            }
            ArrayValue::UInt32(out)
        }
        b'f' => {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(
                    cur.read_f32::<LittleEndian>()
                        .map_err(|_| Error::Truncated("aux array element"))?,
                );
            }
            ArrayValue::Float(out)
        }
        _ => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_aux_picks_narrowest_unsigned_subtype() {
        let field = Field::new([b'N', b'M'], Input::Int(1)).unwrap();
        assert_eq!(field.as_bytes(), &[b'N', b'M', b'C', 0x01]);
        assert_eq!(field.value().unwrap(), Value::UInt8(1));
    }

    #[test]
    fn new_aux_picks_signed_subtype_for_negative() {
        let field = Field::new([b'X', b'X'], Input::Int(-5)).unwrap();
        assert_eq!(field.kind(), b'c');
        assert_eq!(field.value().unwrap(), Value::Int8(-5));
    }

    #[test]
    fn new_aux_widens_past_u8() {
        let field = Field::new([b'X', b'X'], Input::Int(1000)).unwrap();
        assert_eq!(field.kind(), b'S');
    }

    #[test]
    fn text_round_trips_through_null_terminator() {
        let field = Field::new([b'C', b'O'], Input::Text("hi".into())).unwrap();
        assert_eq!(field.value().unwrap(), Value::Text("hi".into()));
    }

    #[test]
    fn hex_round_trips() {
        let field = Field::new([b'X', b'H'], Input::Hex(vec![0xde, 0xad, 0xbe, 0xef])).unwrap();
        assert_eq!(field.value().unwrap(), Value::Hex(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn array_round_trips() {
        let field = Field::new([b'I', b'A'], Input::Array(ArrayValue::Int32(vec![1, -2, 3]))).unwrap();
        assert_eq!(
            field.value().unwrap(),
            Value::Array(ArrayValue::Int32(vec![1, -2, 3]))
        );
    }

    #[test]
    fn array_length_mismatch_is_malformed() {
        // subtype 'i' (4 bytes) claiming a count that runs past the buffer.
        let mut buf = vec![b'X', b'X', b'B', b'i'];
        buf.extend_from_slice(&100u32.to_le_bytes());
        let field = Field::from_bytes(buf);
        assert!(matches!(field.value(), Err(Error::Malformed(_))));
    }

    #[test]
    fn unknown_type_code_is_malformed() {
        let field = Field::from_bytes(vec![b'X', b'X', b'?']);
        assert!(matches!(field.value(), Err(Error::Malformed(_))));
    }
}
