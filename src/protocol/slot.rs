//! Item slots. An empty slot is encoded as item id -1.

use crate::protocol::{
    decoder,
    nbt::{NamedTag, OptionalNbt},
    Decode, Decoder, Encode, Encoder,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub id: i16,
    pub count: i8,
    pub damage: i16,
    pub tag: Option<NamedTag>,
}

/// A possibly-empty item slot.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Slot(pub Option<Item>);

impl Slot {
    pub const EMPTY: Slot = Slot(None);
}

impl Decode for Slot {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let id = decoder.read_i16()?;
        if id == -1 {
            return Ok(Slot(None));
        }
        let count = decoder.read_i8()?;
        let damage = decoder.read_i16()?;
        let tag = OptionalNbt::decode(decoder)?.0;
        Ok(Slot(Some(Item {
            id,
            count,
            damage,
            tag,
        })))
    }
}

impl Encode for Slot {
    fn encode(&self, encoder: &mut Encoder) {
        match &self.0 {
            None => encoder.write_i16(-1),
            Some(item) => {
                encoder.write_i16(item.id);
                encoder.write_i8(item.count);
                encoder.write_i16(item.damage);
                OptionalNbt(item.tag.clone()).encode(encoder);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::nbt::{Nbt, NbtCompound};

    #[test]
    fn empty_slot_is_minus_one() {
        let mut buf = Vec::new();
        Slot::EMPTY.encode(&mut Encoder::new(&mut buf));
        assert_eq!(buf, vec![0xFF, 0xFF]);
        assert_eq!(Slot::decode(&mut Decoder::new(&buf)).unwrap(), Slot::EMPTY);
    }

    #[test]
    fn item_with_tag_round_trips() {
        let slot = Slot(Some(Item {
            id: 276,
            count: 1,
            damage: 100,
            tag: Some(NamedTag::new(NbtCompound(vec![(
                "Unbreakable".into(),
                Nbt::Byte(1),
            )]))),
        }));
        let mut buf = Vec::new();
        slot.encode(&mut Encoder::new(&mut buf));
        assert_eq!(Slot::decode(&mut Decoder::new(&buf)).unwrap(), slot);
    }
}
