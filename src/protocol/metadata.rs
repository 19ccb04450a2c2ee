//! The entity metadata stream: (index, type, value) triples terminated
//! by index 0xFF.

use crate::{
    position::BlockPosition,
    protocol::{
        chat::ChatComponent, decoder, nbt::OptionalNbt, slot::Slot, Decode, DecodeError, Decoder,
        Encode, Encoder,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    String(String),
    Chat(ChatComponent),
    Slot(Slot),
    Boolean(bool),
    Rotation(f32, f32, f32),
    Position(BlockPosition),
    OptPosition(Option<BlockPosition>),
    Direction(i32),
    OptUuid(Option<u128>),
    OptBlockId(i32),
    Nbt(OptionalNbt),
}

impl MetadataValue {
    fn type_id(&self) -> i32 {
        match self {
            MetadataValue::Byte(_) => 0,
            MetadataValue::VarInt(_) => 1,
            MetadataValue::Float(_) => 2,
            MetadataValue::String(_) => 3,
            MetadataValue::Chat(_) => 4,
            MetadataValue::Slot(_) => 5,
            MetadataValue::Boolean(_) => 6,
            MetadataValue::Rotation(..) => 7,
            MetadataValue::Position(_) => 8,
            MetadataValue::OptPosition(_) => 9,
            MetadataValue::Direction(_) => 10,
            MetadataValue::OptUuid(_) => 11,
            MetadataValue::OptBlockId(_) => 12,
            MetadataValue::Nbt(_) => 13,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetadataEntry {
    pub index: u8,
    pub value: MetadataValue,
}

/// A full metadata stream.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Metadata(pub Vec<MetadataEntry>);

impl Metadata {
    /// Merges `update` into this stream, replacing entries that share
    /// an index and appending new ones.
    pub fn merge(&mut self, update: &Metadata) {
        for entry in &update.0 {
            match self.0.iter_mut().find(|e| e.index == entry.index) {
                Some(existing) => existing.value = entry.value.clone(),
                None => self.0.push(entry.clone()),
            }
        }
    }
}

impl Decode for Metadata {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let mut entries = Vec::new();
        loop {
            let index = decoder.read_u8()?;
            if index == 0xFF {
                break;
            }
            let type_id = decoder.read_var_int()?;
            let value = match type_id {
                0 => MetadataValue::Byte(decoder.read_i8()?),
                1 => MetadataValue::VarInt(decoder.read_var_int()?),
                2 => MetadataValue::Float(decoder.read_f32()?),
                3 => MetadataValue::String(String::decode(decoder)?),
                4 => MetadataValue::Chat(ChatComponent::decode(decoder)?),
                5 => MetadataValue::Slot(Slot::decode(decoder)?),
                6 => MetadataValue::Boolean(decoder.read_bool()?),
                7 => MetadataValue::Rotation(
                    decoder.read_f32()?,
                    decoder.read_f32()?,
                    decoder.read_f32()?,
                ),
                8 => MetadataValue::Position(decoder.read_block_position()?),
                9 => MetadataValue::OptPosition(if decoder.read_bool()? {
                    Some(decoder.read_block_position()?)
                } else {
                    None
                }),
                10 => MetadataValue::Direction(decoder.read_var_int()?),
                11 => MetadataValue::OptUuid(if decoder.read_bool()? {
                    Some(u128::decode(decoder)?)
                } else {
                    None
                }),
                12 => MetadataValue::OptBlockId(decoder.read_var_int()?),
                13 => MetadataValue::Nbt(OptionalNbt::decode(decoder)?),
                other => return Err(DecodeError::UnknownDiscriminant(i64::from(other))),
            };
            entries.push(MetadataEntry { index, value });
        }
        Ok(Self(entries))
    }
}

impl Encode for Metadata {
    fn encode(&self, encoder: &mut Encoder) {
        for entry in &self.0 {
            encoder.write_u8(entry.index);
            encoder.write_var_int(entry.value.type_id());
            match &entry.value {
                MetadataValue::Byte(x) => encoder.write_i8(*x),
                MetadataValue::VarInt(x) => {
                    encoder.write_var_int(*x);
                }
                MetadataValue::Float(x) => encoder.write_f32(*x),
                MetadataValue::String(x) => encoder.write_string(x),
                MetadataValue::Chat(x) => x.encode(encoder),
                MetadataValue::Slot(x) => x.encode(encoder),
                MetadataValue::Boolean(x) => encoder.write_bool(*x),
                MetadataValue::Rotation(x, y, z) => {
                    encoder.write_f32(*x);
                    encoder.write_f32(*y);
                    encoder.write_f32(*z);
                }
                MetadataValue::Position(pos) => encoder.write_block_position(*pos),
                MetadataValue::OptPosition(pos) => {
                    encoder.write_bool(pos.is_some());
                    if let Some(pos) = pos {
                        encoder.write_block_position(*pos);
                    }
                }
                MetadataValue::Direction(x) => {
                    encoder.write_var_int(*x);
                }
                MetadataValue::OptUuid(uuid) => {
                    encoder.write_bool(uuid.is_some());
                    if let Some(uuid) = uuid {
                        uuid.encode(encoder);
                    }
                }
                MetadataValue::OptBlockId(x) => {
                    encoder.write_var_int(*x);
                }
                MetadataValue::Nbt(tag) => tag.encode(encoder),
            }
        }
        encoder.write_u8(0xFF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_round_trip() {
        let metadata = Metadata(vec![
            MetadataEntry {
                index: 0,
                value: MetadataValue::Byte(0x20),
            },
            MetadataEntry {
                index: 7,
                value: MetadataValue::VarInt(1234),
            },
            MetadataEntry {
                index: 2,
                value: MetadataValue::String("name".into()),
            },
            MetadataEntry {
                index: 6,
                value: MetadataValue::OptPosition(Some(BlockPosition::new(1, 2, 3))),
            },
        ]);
        let mut buf = Vec::new();
        metadata.encode(&mut Encoder::new(&mut buf));
        assert_eq!(Metadata::decode(&mut Decoder::new(&buf)).unwrap(), metadata);
    }

    #[test]
    fn merge_replaces_by_index() {
        let mut base = Metadata(vec![MetadataEntry {
            index: 0,
            value: MetadataValue::Byte(0),
        }]);
        base.merge(&Metadata(vec![
            MetadataEntry {
                index: 0,
                value: MetadataValue::Byte(0x40),
            },
            MetadataEntry {
                index: 11,
                value: MetadataValue::Boolean(true),
            },
        ]));
        assert_eq!(base.0.len(), 2);
        assert_eq!(base.0[0].value, MetadataValue::Byte(0x40));
    }
}
