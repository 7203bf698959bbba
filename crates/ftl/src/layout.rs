//! 元数据扇区的编码与解码
//!
//! ```text
//! 偏移  长度  内容
//! 0     4     魔数 "FTL1"
//! 4     4     擦除次数
//! 8     4     前 8 字节的 CRC32
//! 12    4     序列号（0xFFFFFFFF 表示空闲块）
//! 16    8*62  映射项：逻辑扇区号 u32 + 数据 CRC32 u32（逻辑扇区号全 1 表示未用）
//! ```
//!
//! 所有整数均为小端序。块头在擦除后立即写入前 12 字节，激活时再写序列号；
//! NOR 对同一值重复编程不改变内容，因此激活时可以整体重写块头。

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub(crate) const MAGIC: [u8; 4] = *b"FTL1";
pub(crate) const HEADER_LEN: usize = 16;
pub(crate) const ENTRY_LEN: usize = 8;
pub(crate) const UNUSED: u32 = u32::MAX;

/// 有效块头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    pub erase_count: u32,
    pub seq: Option<u32>,
}

/// 块头解码结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderState {
    /// 从未写过块头（全新芯片或擦除后掉电）
    Blank,
    Valid(BlockHeader),
    Garbage,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

pub(crate) fn data_crc(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

pub(crate) fn encode_header(erase_count: u32, seq: Option<u32>) -> [u8; HEADER_LEN] {
    let mut out = [0xFFu8; HEADER_LEN];
    out[0..4].copy_from_slice(&MAGIC);
    out[4..8].copy_from_slice(&erase_count.to_le_bytes());
    let crc = CRC32.checksum(&out[0..8]);
    out[8..12].copy_from_slice(&crc.to_le_bytes());
    out[12..16].copy_from_slice(&seq.unwrap_or(UNUSED).to_le_bytes());
    out
}

pub(crate) fn decode_header(meta: &[u8]) -> HeaderState {
    let header = &meta[..HEADER_LEN];
    if header.iter().all(|b| *b == 0xFF) {
        return HeaderState::Blank;
    }
    if header[0..4] != MAGIC || read_u32(header, 8) != CRC32.checksum(&header[0..8]) {
        return HeaderState::Garbage;
    }
    let seq = read_u32(header, 12);
    HeaderState::Valid(BlockHeader {
        erase_count: read_u32(header, 4),
        seq: (seq != UNUSED).then_some(seq),
    })
}

pub(crate) fn encode_entry(lba: u32, crc: u32) -> [u8; ENTRY_LEN] {
    let mut out = [0u8; ENTRY_LEN];
    out[0..4].copy_from_slice(&lba.to_le_bytes());
    out[4..8].copy_from_slice(&crc.to_le_bytes());
    out
}

/// 解码单个映射项，未用槽位返回 `None`
pub(crate) fn decode_entry(entry: &[u8]) -> Option<(u32, u32)> {
    let lba = read_u32(entry, 0);
    (lba != UNUSED).then(|| (lba, read_u32(entry, 4)))
}

/// 元数据扇区中第 `slot` 个映射项
pub(crate) fn entry_at(meta: &[u8], slot: usize) -> &[u8] {
    let at = HEADER_LEN + slot * ENTRY_LEN;
    &meta[at..at + ENTRY_LEN]
}

/// 所有映射项是否都未使用
pub(crate) fn entries_blank(meta: &[u8]) -> bool {
    meta[HEADER_LEN..].iter().all(|b| *b == 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_states() {
        let mut meta = [0xFFu8; 512];
        assert_eq!(decode_header(&meta), HeaderState::Blank);

        meta[..HEADER_LEN].copy_from_slice(&encode_header(7, None));
        assert_eq!(
            decode_header(&meta),
            HeaderState::Valid(BlockHeader { erase_count: 7, seq: None })
        );

        meta[..HEADER_LEN].copy_from_slice(&encode_header(7, Some(3)));
        assert_eq!(
            decode_header(&meta),
            HeaderState::Valid(BlockHeader { erase_count: 7, seq: Some(3) })
        );

        meta[5] ^= 0x01;
        assert_eq!(decode_header(&meta), HeaderState::Garbage);
    }

    #[test]
    fn test_activation_only_clears_bits() {
        let free = encode_header(42, None);
        let active = encode_header(42, Some(9));
        for (f, a) in free.iter().zip(active.iter()) {
            assert_eq!(f & a, *a);
        }
    }

    #[test]
    fn test_entries() {
        let mut meta = [0xFFu8; 512];
        assert!(entries_blank(&meta));
        assert_eq!(decode_entry(entry_at(&meta, 5)), None);

        let at = HEADER_LEN + 5 * ENTRY_LEN;
        meta[at..at + ENTRY_LEN].copy_from_slice(&encode_entry(100, 0xDEAD_BEEF));
        assert_eq!(decode_entry(entry_at(&meta, 5)), Some((100, 0xDEAD_BEEF)));
        assert!(!entries_blank(&meta));
    }
}
