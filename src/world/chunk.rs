//! Chunk columns as cached by the mirror, plus the bit-packed section
//! codec used by the chunk data packet.

use crate::protocol::{
    nbt::NamedTag,
    packet::server::play::ChunkData,
    Decoder, Encoder,
};
use anyhow::{bail, Context};

pub const SECTIONS_PER_CHUNK: usize = 16;
pub const BLOCKS_PER_SECTION: usize = 4096;
pub const LIGHT_BYTES_PER_SECTION: usize = 2048;
pub const BIOME_BYTES: usize = 256;

/// Bits per block used when re-encoding cached sections. 13 bits holds
/// any global palette id of this revision, so no palette is needed.
const DIRECT_BITS_PER_BLOCK: u8 = 13;

#[derive(Clone, Debug, PartialEq)]
pub struct ChunkSection {
    /// Global palette ids, `(block id << 4) | meta`.
    pub blocks: Box<[u16; BLOCKS_PER_SECTION]>,
    pub block_light: Box<[u8; LIGHT_BYTES_PER_SECTION]>,
    /// Present iff the dimension is the overworld.
    pub sky_light: Option<Box<[u8; LIGHT_BYTES_PER_SECTION]>>,
}

impl ChunkSection {
    pub fn empty(has_sky_light: bool) -> Self {
        Self {
            blocks: Box::new([0; BLOCKS_PER_SECTION]),
            block_light: Box::new([0; LIGHT_BYTES_PER_SECTION]),
            sky_light: has_sky_light.then(|| Box::new([0xFF; LIGHT_BYTES_PER_SECTION])),
        }
    }

    pub fn block_index(x: i32, y: i32, z: i32) -> usize {
        (((y & 15) << 8) | ((z & 15) << 4) | (x & 15)) as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub x: i32,
    pub z: i32,
    pub sections: [Option<ChunkSection>; SECTIONS_PER_CHUNK],
    pub biomes: [u8; BIOME_BYTES],
    pub block_entities: Vec<NamedTag>,
}

impl Chunk {
    pub fn new(x: i32, z: i32) -> Self {
        Self {
            x,
            z,
            sections: std::array::from_fn(|_| None),
            biomes: [0; BIOME_BYTES],
            block_entities: Vec::new(),
        }
    }

    /// Applies a chunk data packet. A full packet replaces the column
    /// wholesale; a partial one overwrites only the sections in its
    /// bitmask.
    pub fn apply(&mut self, packet: &ChunkData, has_sky_light: bool) -> anyhow::Result<()> {
        let sections = decode_sections(packet, has_sky_light)?;
        for (index, section) in sections {
            self.sections[index] = Some(section);
        }
        if packet.full {
            let section_bytes = packet
                .data
                .len()
                .checked_sub(BIOME_BYTES)
                .context("chunk data shorter than biome array")?;
            let mut decoder = Decoder::new(&packet.data);
            decoder.consume_slice(section_bytes)?;
            self.biomes
                .copy_from_slice(decoder.consume_slice(BIOME_BYTES)?);
            self.block_entities = packet.block_entities.clone();
        } else {
            for tag in &packet.block_entities {
                let coords = (
                    tag.payload.get_int("x"),
                    tag.payload.get_int("y"),
                    tag.payload.get_int("z"),
                );
                self.block_entities.retain(|existing| {
                    (
                        existing.payload.get_int("x"),
                        existing.payload.get_int("y"),
                        existing.payload.get_int("z"),
                    ) != coords
                });
                self.block_entities.push(tag.clone());
            }
        }
        Ok(())
    }

    /// Re-encodes the whole column as a full chunk data packet using
    /// the direct (paletteless) 13-bit format.
    pub fn to_packet(&self) -> ChunkData {
        let mut data = Vec::new();
        let mut encoder = Encoder::new(&mut data);
        let mut bitmask = 0i32;

        for (index, section) in self.sections.iter().enumerate() {
            let Some(section) = section else { continue };
            bitmask |= 1 << index;

            // the direct format has no palette field
            encoder.write_u8(DIRECT_BITS_PER_BLOCK);

            let longs = pack_blocks(&*section.blocks, DIRECT_BITS_PER_BLOCK);
            encoder.write_var_int(longs.len() as i32);
            for long in &longs {
                encoder.write_u64(*long);
            }
            encoder.write_slice(&section.block_light[..]);
            if let Some(sky_light) = &section.sky_light {
                encoder.write_slice(&sky_light[..]);
            }
        }
        encoder.write_slice(&self.biomes);

        ChunkData {
            chunk_x: self.x,
            chunk_z: self.z,
            full: true,
            section_bitmask: bitmask,
            data,
            block_entities: self.block_entities.clone(),
        }
    }
}

/// Decodes the section payloads of a chunk data packet, returning
/// `(section index, section)` pairs for every bit in the mask.
fn decode_sections(
    packet: &ChunkData,
    has_sky_light: bool,
) -> anyhow::Result<Vec<(usize, ChunkSection)>> {
    let mut decoder = Decoder::new(&packet.data);
    let mut sections = Vec::new();

    for index in 0..SECTIONS_PER_CHUNK {
        if packet.section_bitmask & (1 << index) == 0 {
            continue;
        }

        let bits_per_block = decoder.read_u8()?;
        if bits_per_block == 0 || bits_per_block > 13 {
            bail!("invalid bits per block {bits_per_block}");
        }

        // Sections at 8 bits or fewer map indices through an id
        // palette. Wider sections store global ids directly and carry
        // no palette field at all.
        let palette = if bits_per_block <= 8 {
            let palette_length = decoder.read_var_int()?.max(0);
            let mut palette = Vec::with_capacity(palette_length as usize);
            for _ in 0..palette_length {
                palette.push(decoder.read_var_int()?);
            }
            Some(palette)
        } else {
            None
        };

        let long_count = usize::try_from(decoder.read_var_int()?)?;
        let mut longs = Vec::with_capacity(long_count);
        for _ in 0..long_count {
            longs.push(decoder.read_u64()?);
        }

        let mut blocks = Box::new([0u16; BLOCKS_PER_SECTION]);
        for (block_index, block) in blocks.iter_mut().enumerate() {
            let value = extract_bits(&longs, block_index, bits_per_block)?;
            *block = match &palette {
                Some(palette) => palette
                    .get(value as usize)
                    .copied()
                    .unwrap_or(0)
                    .try_into()
                    .unwrap_or(0),
                None => value as u16,
            };
        }

        let mut block_light = Box::new([0u8; LIGHT_BYTES_PER_SECTION]);
        block_light.copy_from_slice(decoder.consume_slice(LIGHT_BYTES_PER_SECTION)?);

        let sky_light = if has_sky_light {
            let mut light = Box::new([0u8; LIGHT_BYTES_PER_SECTION]);
            light.copy_from_slice(decoder.consume_slice(LIGHT_BYTES_PER_SECTION)?);
            Some(light)
        } else {
            None
        };

        sections.push((
            index,
            ChunkSection {
                blocks,
                block_light,
                sky_light,
            },
        ));
    }

    Ok(sections)
}

/// Reads entry `index` from a bitstream packed `bits` per entry.
/// Entries may straddle long boundaries.
fn extract_bits(longs: &[u64], index: usize, bits: u8) -> anyhow::Result<u64> {
    let bits = u64::from(bits);
    let mask = (1u64 << bits) - 1;
    let bit_index = index as u64 * bits;
    let long_index = (bit_index / 64) as usize;
    let offset = bit_index % 64;

    let Some(&low) = longs.get(long_index) else {
        bail!("chunk bitstream too short");
    };
    let mut value = low >> offset;
    if offset + bits > 64 {
        let Some(&high) = longs.get(long_index + 1) else {
            bail!("chunk bitstream too short");
        };
        value |= high << (64 - offset);
    }
    Ok(value & mask)
}

/// Packs 4096 entries into a long-aligned bitstream.
fn pack_blocks(blocks: &[u16; BLOCKS_PER_SECTION], bits: u8) -> Vec<u64> {
    let bits = u64::from(bits);
    let mut longs = vec![0u64; (BLOCKS_PER_SECTION as u64 * bits).div_ceil(64) as usize];
    for (index, &block) in blocks.iter().enumerate() {
        let value = u64::from(block);
        let bit_index = index as u64 * bits;
        let long_index = (bit_index / 64) as usize;
        let offset = bit_index % 64;
        longs[long_index] |= value << offset;
        if offset + bits > 64 {
            longs[long_index + 1] |= value >> (64 - offset);
        }
    }
    longs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_packing_round_trips_across_boundaries() {
        let mut blocks = Box::new([0u16; BLOCKS_PER_SECTION]);
        for (i, block) in blocks.iter_mut().enumerate() {
            *block = (i % 8191) as u16; // stay within 13 bits
        }
        let longs = pack_blocks(&blocks, 13);
        assert_eq!(longs.len(), 832);
        for i in 0..BLOCKS_PER_SECTION {
            assert_eq!(extract_bits(&longs, i, 13).unwrap(), u64::from(blocks[i]), "{i}");
        }
    }

    #[test]
    fn full_chunk_encode_decode_round_trip() {
        let mut chunk = Chunk::new(3, -7);
        let mut section = ChunkSection::empty(true);
        section.blocks[ChunkSection::block_index(0, 0, 0)] = 1 << 4;
        section.blocks[ChunkSection::block_index(15, 15, 15)] = (56 << 4) | 2;
        chunk.sections[0] = Some(section);
        chunk.biomes[0] = 7;

        let packet = chunk.to_packet();
        assert!(packet.full);
        assert_eq!(packet.section_bitmask, 1);

        let mut decoded = Chunk::new(3, -7);
        decoded.apply(&packet, true).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn direct_format_section_has_no_palette_field() {
        // A vanilla direct-format section: bits per block, then the
        // long array immediately — no palette length in between. Block
        // 0 sits in long 0; block 4 starts at bit 52 and straddles
        // into long 1.
        let mut longs = [0u64; 832];
        longs[0] = 0x1051 | (0x1ABC << 52);
        longs[1] = 0x1ABC >> 12;

        let mut data = Vec::new();
        let mut encoder = Encoder::new(&mut data);
        encoder.write_u8(13);
        encoder.write_var_int(longs.len() as i32);
        for long in &longs {
            encoder.write_u64(*long);
        }
        encoder.write_slice(&[0; LIGHT_BYTES_PER_SECTION]);
        data.extend_from_slice(&[0; BIOME_BYTES]);

        let packet = ChunkData {
            chunk_x: 0,
            chunk_z: 0,
            full: true,
            section_bitmask: 1,
            data,
            block_entities: Vec::new(),
        };
        let mut chunk = Chunk::new(0, 0);
        chunk.apply(&packet, false).unwrap();
        let section = chunk.sections[0].as_ref().unwrap();
        assert_eq!(section.blocks[0], 0x1051);
        assert_eq!(section.blocks[4], 0x1ABC);
        assert_eq!(section.blocks[1], 0);

        // the re-encoded section keeps the same layout: bits per
        // block, then the long-array count varint (832 = C0 06)
        let encoded = chunk.to_packet();
        assert_eq!(encoded.data[0], 13);
        assert_eq!(&encoded.data[1..3], &[0xC0, 0x06]);
        let mut decoded = Chunk::new(0, 0);
        decoded.apply(&encoded, false).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn paletted_section_resolves_ids() {
        // Hand-build a 4-bit paletted section: palette [air, stone],
        // with block 0 pointing at palette entry 1.
        let mut longs = vec![0u64; (BLOCKS_PER_SECTION * 4) / 64];
        longs[0] = 1;

        let mut data = Vec::new();
        let mut encoder = Encoder::new(&mut data);
        encoder.write_u8(4);
        encoder.write_var_int(2);
        encoder.write_var_int(0); // air
        encoder.write_var_int(16); // stone = 1 << 4
        encoder.write_var_int(longs.len() as i32);
        for long in &longs {
            encoder.write_u64(*long);
        }
        encoder.write_slice(&[0; LIGHT_BYTES_PER_SECTION]);
        data.extend_from_slice(&[0; BIOME_BYTES]);

        let packet = ChunkData {
            chunk_x: 0,
            chunk_z: 0,
            full: true,
            section_bitmask: 1,
            data,
            block_entities: Vec::new(),
        };
        let mut chunk = Chunk::new(0, 0);
        chunk.apply(&packet, false).unwrap();
        let section = chunk.sections[0].as_ref().unwrap();
        assert_eq!(section.blocks[0], 16);
        assert_eq!(section.blocks[1], 0);
        assert!(section.sky_light.is_none());
    }
}
