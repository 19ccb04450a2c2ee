//! Binary NBT as used on the wire by this protocol revision.
//!
//! Compounds preserve entry order so a decoded tag re-encodes to the
//! same bytes. Only the subset of operations the proxy needs is
//! exposed: round-tripping whole tags and reading integer fields
//! (block entity coordinates).

use crate::protocol::{decoder, Decode, DecodeError, Decoder, Encode, Encoder};

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

/// An NBT tag payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Nbt {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    /// Element tag type plus items. The type survives even for empty
    /// lists so re-encoding is exact.
    List(u8, Vec<Nbt>),
    Compound(NbtCompound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Nbt {
    fn tag_type(&self) -> u8 {
        match self {
            Nbt::Byte(_) => TAG_BYTE,
            Nbt::Short(_) => TAG_SHORT,
            Nbt::Int(_) => TAG_INT,
            Nbt::Long(_) => TAG_LONG,
            Nbt::Float(_) => TAG_FLOAT,
            Nbt::Double(_) => TAG_DOUBLE,
            Nbt::ByteArray(_) => TAG_BYTE_ARRAY,
            Nbt::String(_) => TAG_STRING,
            Nbt::List(..) => TAG_LIST,
            Nbt::Compound(_) => TAG_COMPOUND,
            Nbt::IntArray(_) => TAG_INT_ARRAY,
            Nbt::LongArray(_) => TAG_LONG_ARRAY,
        }
    }
}

/// A compound payload: ordered named entries.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct NbtCompound(pub Vec<(String, Nbt)>);

impl NbtCompound {
    pub fn get(&self, name: &str) -> Option<&Nbt> {
        self.0
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Reads an integer-valued entry, accepting any integral tag width.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Nbt::Byte(x) => Some(i64::from(*x)),
            Nbt::Short(x) => Some(i64::from(*x)),
            Nbt::Int(x) => Some(i64::from(*x)),
            Nbt::Long(x) => Some(*x),
            _ => None,
        }
    }
}

/// A named root compound as it appears on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedTag {
    pub name: String,
    pub payload: NbtCompound,
}

impl NamedTag {
    pub fn new(payload: NbtCompound) -> Self {
        Self {
            name: String::new(),
            payload,
        }
    }
}

fn read_nbt_string(decoder: &mut Decoder) -> decoder::Result<String> {
    let length = usize::from(decoder.read_u16()?);
    let bytes = decoder.consume_slice(length)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn write_nbt_string(encoder: &mut Encoder, s: &str) {
    encoder.write_u16(s.len().try_into().unwrap_or(u16::MAX));
    encoder.write_slice(s.as_bytes());
}

fn read_payload(tag_type: u8, decoder: &mut Decoder) -> decoder::Result<Nbt> {
    Ok(match tag_type {
        TAG_BYTE => Nbt::Byte(decoder.read_i8()?),
        TAG_SHORT => Nbt::Short(decoder.read_i16()?),
        TAG_INT => Nbt::Int(decoder.read_i32()?),
        TAG_LONG => Nbt::Long(decoder.read_i64()?),
        TAG_FLOAT => Nbt::Float(decoder.read_f32()?),
        TAG_DOUBLE => Nbt::Double(decoder.read_f64()?),
        TAG_BYTE_ARRAY => {
            let length = usize::try_from(decoder.read_i32()?)?;
            Nbt::ByteArray(decoder.consume_slice(length)?.to_vec())
        }
        TAG_STRING => Nbt::String(read_nbt_string(decoder)?),
        TAG_LIST => {
            let element = decoder.read_u8()?;
            let length = decoder.read_i32()?.max(0);
            let mut items = Vec::new();
            for _ in 0..length {
                items.push(read_payload(element, decoder)?);
            }
            Nbt::List(element, items)
        }
        TAG_COMPOUND => Nbt::Compound(read_compound(decoder)?),
        TAG_INT_ARRAY => {
            let length = usize::try_from(decoder.read_i32()?)?;
            let mut items = Vec::with_capacity(length.min(4096));
            for _ in 0..length {
                items.push(decoder.read_i32()?);
            }
            Nbt::IntArray(items)
        }
        TAG_LONG_ARRAY => {
            let length = usize::try_from(decoder.read_i32()?)?;
            let mut items = Vec::with_capacity(length.min(2048));
            for _ in 0..length {
                items.push(decoder.read_i64()?);
            }
            Nbt::LongArray(items)
        }
        other => return Err(DecodeError::UnknownNbtTag(other)),
    })
}

fn read_compound(decoder: &mut Decoder) -> decoder::Result<NbtCompound> {
    let mut entries = Vec::new();
    loop {
        let tag_type = decoder.read_u8()?;
        if tag_type == TAG_END {
            break;
        }
        let name = read_nbt_string(decoder)?;
        let value = read_payload(tag_type, decoder)?;
        entries.push((name, value));
    }
    Ok(NbtCompound(entries))
}

fn write_payload(value: &Nbt, encoder: &mut Encoder) {
    match value {
        Nbt::Byte(x) => encoder.write_i8(*x),
        Nbt::Short(x) => encoder.write_i16(*x),
        Nbt::Int(x) => encoder.write_i32(*x),
        Nbt::Long(x) => encoder.write_i64(*x),
        Nbt::Float(x) => encoder.write_f32(*x),
        Nbt::Double(x) => encoder.write_f64(*x),
        Nbt::ByteArray(bytes) => {
            encoder.write_i32(bytes.len().try_into().unwrap_or(i32::MAX));
            encoder.write_slice(bytes);
        }
        Nbt::String(s) => write_nbt_string(encoder, s),
        Nbt::List(element, items) => {
            encoder.write_u8(*element);
            encoder.write_i32(items.len().try_into().unwrap_or(i32::MAX));
            for item in items {
                write_payload(item, encoder);
            }
        }
        Nbt::Compound(compound) => write_compound(compound, encoder),
        Nbt::IntArray(items) => {
            encoder.write_i32(items.len().try_into().unwrap_or(i32::MAX));
            for item in items {
                encoder.write_i32(*item);
            }
        }
        Nbt::LongArray(items) => {
            encoder.write_i32(items.len().try_into().unwrap_or(i32::MAX));
            for item in items {
                encoder.write_i64(*item);
            }
        }
    }
}

fn write_compound(compound: &NbtCompound, encoder: &mut Encoder) {
    for (name, value) in &compound.0 {
        encoder.write_u8(value.tag_type());
        write_nbt_string(encoder, name);
        write_payload(value, encoder);
    }
    encoder.write_u8(TAG_END);
}

impl Decode for NamedTag {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let tag_type = decoder.read_u8()?;
        if tag_type != TAG_COMPOUND {
            return Err(DecodeError::UnknownNbtTag(tag_type));
        }
        let name = read_nbt_string(decoder)?;
        let payload = read_compound(decoder)?;
        Ok(Self { name, payload })
    }
}

impl Encode for NamedTag {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(TAG_COMPOUND);
        write_nbt_string(encoder, &self.name);
        write_compound(&self.payload, encoder);
    }
}

/// A root tag slot that may be absent (a lone `TAG_End` byte).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct OptionalNbt(pub Option<NamedTag>);

impl Decode for OptionalNbt {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let tag_type = decoder.read_u8()?;
        if tag_type == TAG_END {
            return Ok(Self(None));
        }
        if tag_type != TAG_COMPOUND {
            return Err(DecodeError::UnknownNbtTag(tag_type));
        }
        let name = read_nbt_string(decoder)?;
        let payload = read_compound(decoder)?;
        Ok(Self(Some(NamedTag { name, payload })))
    }
}

impl Encode for OptionalNbt {
    fn encode(&self, encoder: &mut Encoder) {
        match &self.0 {
            Some(tag) => tag.encode(encoder),
            None => encoder.write_u8(TAG_END),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(tag: &NamedTag) -> NamedTag {
        let mut buf = Vec::new();
        tag.encode(&mut Encoder::new(&mut buf));
        NamedTag::decode(&mut Decoder::new(&buf)).unwrap()
    }

    #[test]
    fn empty_compound_round_trip() {
        let tag = NamedTag::new(NbtCompound::default());
        let mut buf = Vec::new();
        tag.encode(&mut Encoder::new(&mut buf));
        assert_eq!(buf, vec![0x0A, 0x00, 0x00, 0x00]);
        assert_eq!(round_trip(&tag), tag);
    }

    #[test]
    fn nested_round_trip_preserves_order() {
        let tag = NamedTag {
            name: "root".into(),
            payload: NbtCompound(vec![
                ("z".into(), Nbt::Int(-3)),
                ("a".into(), Nbt::String("hello".into())),
                (
                    "inner".into(),
                    Nbt::Compound(NbtCompound(vec![
                        ("list".into(), Nbt::List(TAG_SHORT, vec![Nbt::Short(1), Nbt::Short(2)])),
                        ("longs".into(), Nbt::LongArray(vec![1, -1])),
                    ])),
                ),
            ]),
        };
        assert_eq!(round_trip(&tag), tag);
    }

    #[test]
    fn block_entity_coordinates() {
        let tag = NamedTag::new(NbtCompound(vec![
            ("x".into(), Nbt::Int(16)),
            ("y".into(), Nbt::Int(65)),
            ("z".into(), Nbt::Int(-16)),
        ]));
        assert_eq!(tag.payload.get_int("x"), Some(16));
        assert_eq!(tag.payload.get_int("y"), Some(65));
        assert_eq!(tag.payload.get_int("z"), Some(-16));
        assert_eq!(tag.payload.get_int("id"), None);
    }

    #[test]
    fn absent_tag_is_single_end_byte() {
        let mut buf = Vec::new();
        OptionalNbt(None).encode(&mut Encoder::new(&mut buf));
        assert_eq!(buf, vec![0x00]);
        assert_eq!(
            OptionalNbt::decode(&mut Decoder::new(&buf)).unwrap(),
            OptionalNbt(None)
        );
    }
}
