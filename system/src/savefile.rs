// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The save-file container: a small framed format wrapping whichever save
//! blocks a cartridge actually has (battery save plus, optionally, RTC
//! state), each zlib-compressed and individually checksummed so a damaged
//! block doesn't take the whole file down with it.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use gbacore_emu::save::SaveKind;

use crate::error::ConfigError;

const MAGIC: &[u8; 8] = b"GBAiDSav";
const FORMAT_VERSION: u8 = 1;

fn save_kind_tag(kind: SaveKind) -> u8 {
    match kind {
        SaveKind::Sram => 0,
        SaveKind::Flash512K => 1,
        SaveKind::Flash1M => 2,
        SaveKind::Eeprom => 3,
        SaveKind::Rtc => 4,
    }
}

fn save_kind_from_tag(tag: u8) -> Option<SaveKind> {
    match tag {
        0 => Some(SaveKind::Sram),
        1 => Some(SaveKind::Flash512K),
        2 => Some(SaveKind::Flash1M),
        3 => Some(SaveKind::Eeprom),
        4 => Some(SaveKind::Rtc),
        _ => None,
    }
}

/// One decoded block: which kind of save memory it holds, and its raw
/// (decompressed) bytes.
pub struct SaveBlock {
    pub kind: SaveKind,
    pub bytes: Vec<u8>,
}

/// Serializes save blocks into the container format: magic, version,
/// block count, a header CRC32 over those three fields, then each block as
/// kind byte + CRC32 + compressed length + zlib payload.
pub fn encode(blocks: &[SaveBlock]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.push(0); // flags, reserved
    out.write_u16::<LittleEndian>(blocks.len() as u16).unwrap();

    let header_crc = crc32fast::hash(&out[8..11]);
    out.write_u32::<LittleEndian>(header_crc).unwrap();

    for block in blocks {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&block.bytes).unwrap();
        let compressed = encoder.finish().unwrap();
        out.push(save_kind_tag(block.kind));
        out.write_u32::<LittleEndian>(crc32fast::hash(&block.bytes)).unwrap();
        out.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
        out.extend_from_slice(&compressed);
    }
    out
}

/// Parses a container produced by [`encode`], validating the header and
/// every block's checksum before returning.
pub fn decode(bytes: &[u8]) -> Result<Vec<SaveBlock>, ConfigError> {
    let bad = || ConfigError::CorruptSave("truncated save container".to_string());
    if bytes.len() < 15 || &bytes[0..8] != MAGIC {
        return Err(ConfigError::CorruptSave("bad magic".to_string()));
    }
    let count = u16::from_le_bytes([bytes[9], bytes[10]]) as usize;
    let header_crc = u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]);
    if crc32fast::hash(&bytes[8..11]) != header_crc {
        warn!("save container header checksum mismatch, refusing to load");
        return Err(ConfigError::CorruptSave("header checksum mismatch".to_string()));
    }

    let mut cursor = &bytes[15..];
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let kind_tag = cursor.read_u8().map_err(|_| bad())?;
        let kind = save_kind_from_tag(kind_tag)
            .ok_or_else(|| ConfigError::CorruptSave(format!("unknown save kind tag {}", kind_tag)))?;
        let crc = cursor.read_u32::<LittleEndian>().map_err(|_| bad())?;
        let len = cursor.read_u32::<LittleEndian>().map_err(|_| bad())? as usize;
        if cursor.len() < len {
            return Err(bad());
        }
        let (compressed, rest) = cursor.split_at(len);
        cursor = rest;

        let mut raw = Vec::new();
        ZlibDecoder::new(compressed)
            .read_to_end(&mut raw)
            .map_err(|e| ConfigError::CorruptSave(e.to_string()))?;
        if crc32fast::hash(&raw) != crc {
            return Err(ConfigError::CorruptSave(format!("block checksum mismatch for {:?}", kind)));
        }
        blocks.push(SaveBlock { kind, bytes: raw });
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_block() {
        let blocks = vec![SaveBlock {
            kind: SaveKind::Sram,
            bytes: vec![0xaa; 0x8000],
        }];
        let bytes = encode(&blocks);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(1, decoded.len());
        assert_eq!(SaveKind::Sram, decoded[0].kind);
        assert_eq!(blocks[0].bytes, decoded[0].bytes);
    }

    #[test]
    fn detects_corrupted_block() {
        let blocks = vec![SaveBlock {
            kind: SaveKind::Eeprom,
            bytes: vec![1, 2, 3, 4],
        }];
        let mut bytes = encode(&blocks);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 20];
        assert!(decode(&bytes).is_err());
    }
}
