//! FTL 核心：映射表、写入、垃圾回收、挂载扫描

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use device::{
    BlockDriver, BlockError, BlockIoctl, DeviceType, DiskStatus, Driver, NorFlash, SECTOR_SIZE,
};
use log::{debug, info, warn};
use sync::SpinLock;

use crate::error::FtlError;
use crate::layout::{self, HeaderState};

/// 物理块大小（字节）
pub const FTL_BLOCK_SIZE: usize = 32 * 1024;

/// 每个物理块中的数据槽位数
pub const SLOTS_PER_BLOCK: usize = 62;

const UNMAPPED: u32 = u32::MAX;

/// FTL 配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtlConfig {
    /// 垃圾回收后至少保留的空闲物理块数
    pub min_free_blocks: usize,
}

impl Default for FtlConfig {
    fn default() -> Self {
        Self { min_free_blocks: 10 }
    }
}

/// FTL 运行计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtlStats {
    /// 垃圾回收次数
    pub gc_runs: usize,
    /// 垃圾回收搬移的扇区数
    pub relocated_sectors: usize,
    /// 物理块擦除次数
    pub block_erases: usize,
}

#[derive(Debug, Clone, Copy)]
struct BlockInfo {
    erase_count: u32,
    /// `None` 表示空闲块
    seq: Option<u32>,
    /// 仍被映射表引用的槽位数
    valid: usize,
    /// 已使用的槽位数
    written: usize,
}

impl BlockInfo {
    fn free(erase_count: u32) -> Self {
        Self {
            erase_count,
            seq: None,
            valid: 0,
            written: 0,
        }
    }
}

fn block_base(block: usize) -> usize {
    block * FTL_BLOCK_SIZE
}

fn slot_offset(block: usize, slot: usize) -> usize {
    block_base(block) + (slot + 1) * SECTOR_SIZE
}

fn entry_offset(block: usize, slot: usize) -> usize {
    block_base(block) + layout::HEADER_LEN + slot * layout::ENTRY_LEN
}

fn location(block: usize, slot: usize) -> u32 {
    (block * SLOTS_PER_BLOCK + slot) as u32
}

/// 下一个序列号，回绕时跳过表示空闲块的全 1
fn next_seq(seq: u32) -> u32 {
    match seq.wrapping_add(1) {
        layout::UNUSED => 0,
        next => next,
    }
}

/// `a` 是否比 `b` 新
///
/// 序列号会回绕，按差值的符号比较。同时存活的块的序列号跨度远小于 2^31。
fn seq_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

struct FtlInner {
    flash: Box<dyn NorFlash>,
    config: FtlConfig,
    blocks: Vec<BlockInfo>,
    /// 逻辑扇区 -> 物理位置（块号 * 槽位数 + 槽位）
    map: Vec<u32>,
    active: Option<usize>,
    next_seq: u32,
    mounted: bool,
    stats: FtlStats,
}

/// 闪存转换层
///
/// 实现 [`BlockDriver`]，可直接作为 FAT 文件系统的下层设备。
pub struct Ftl {
    inner: SpinLock<FtlInner>,
    logical_sectors: usize,
}

impl Ftl {
    /// 在 Flash 上创建 FTL（未挂载）
    ///
    /// 物理块大小必须是 Flash 擦除块大小的整数倍，且物理块数至少为
    /// `min_free_blocks + 3`。
    pub fn new(flash: Box<dyn NorFlash>, config: FtlConfig) -> Result<Arc<Self>, FtlError> {
        let erase = flash.erase_size();
        if erase == 0 || erase > FTL_BLOCK_SIZE || FTL_BLOCK_SIZE % erase != 0 {
            return Err(FtlError::InvalidGeometry);
        }
        let block_count = flash.capacity() / FTL_BLOCK_SIZE;
        if config.min_free_blocks == 0 || block_count < config.min_free_blocks + 3 {
            return Err(FtlError::InvalidGeometry);
        }
        // 预留 min_free + 2 个块的容量，保证垃圾回收总能取得进展
        let logical_sectors = (block_count - config.min_free_blocks - 2) * SLOTS_PER_BLOCK;
        info!(
            "[FTL] {}: {} blocks of {} KiB, {} logical sectors, min free {}",
            flash.get_id(),
            block_count,
            FTL_BLOCK_SIZE / 1024,
            logical_sectors,
            config.min_free_blocks
        );
        Ok(Arc::new(Self {
            inner: SpinLock::new(FtlInner {
                flash,
                config,
                blocks: vec![BlockInfo::free(0); block_count],
                map: vec![UNMAPPED; logical_sectors],
                active: None,
                next_seq: 0,
                mounted: false,
                stats: FtlStats::default(),
            }),
            logical_sectors,
        }))
    }

    /// 扫描 Flash 重建映射表
    pub fn mount(&self) -> Result<(), FtlError> {
        let mut inner = self.inner.lock();
        inner.mounted = false;
        inner.scan()?;
        inner.mounted = true;
        info!(
            "[FTL] mounted, {} free blocks, next seq {}",
            inner.free_count(),
            inner.next_seq
        );
        Ok(())
    }

    /// 擦除全部物理块并写入空闲块头，之后需要重新挂载
    pub fn format(&self) -> Result<(), FtlError> {
        let mut inner = self.inner.lock();
        inner.format()
    }

    /// 卸载
    pub fn unmount(&self) {
        self.inner.lock().mounted = false;
    }

    /// 是否已挂载
    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }

    /// 逻辑扇区总数
    pub fn logical_sectors(&self) -> usize {
        self.logical_sectors
    }

    /// 物理块总数
    pub fn block_count(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    /// 当前空闲物理块数
    pub fn free_blocks(&self) -> usize {
        self.inner.lock().free_count()
    }

    /// 每个物理块的擦除次数
    pub fn erase_counts(&self) -> Vec<u32> {
        self.inner.lock().blocks.iter().map(|b| b.erase_count).collect()
    }

    /// 运行计数快照
    pub fn stats(&self) -> FtlStats {
        self.inner.lock().stats
    }

    /// 读取一个逻辑扇区，未写过的扇区读出全 0
    pub fn read_sector(&self, lba: usize, buf: &mut [u8]) -> Result<(), FtlError> {
        self.inner.lock().read(lba, buf)
    }

    /// 写入一个逻辑扇区
    pub fn write_sector(&self, lba: usize, data: &[u8]) -> Result<(), FtlError> {
        self.inner.lock().write(lba, data)
    }
}

impl FtlInner {
    fn free_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.seq.is_none()).count()
    }

    fn check(&self, lba: usize, len: usize) -> Result<(), FtlError> {
        if !self.mounted {
            return Err(FtlError::NotMounted);
        }
        if lba >= self.map.len() {
            return Err(FtlError::OutOfRange);
        }
        if len != SECTOR_SIZE {
            return Err(FtlError::OutOfRange);
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<(), FtlError> {
        let mut meta = vec![0u8; SECTOR_SIZE];
        let mut closed: Vec<(u32, usize)> = Vec::new();
        let mut stamped = 0;

        for block in 0..self.blocks.len() {
            self.flash.read(block_base(block), &mut meta)?;
            self.blocks[block] = match layout::decode_header(&meta) {
                HeaderState::Blank if layout::entries_blank(&meta) => BlockInfo::free(0),
                HeaderState::Valid(header) => {
                    stamped += 1;
                    match header.seq {
                        None if layout::entries_blank(&meta) => {
                            BlockInfo::free(header.erase_count)
                        }
                        None => {
                            warn!("[FTL] free block {} carries map entries", block);
                            return Err(FtlError::Corrupt);
                        }
                        Some(seq) => {
                            closed.push((seq, block));
                            BlockInfo {
                                erase_count: header.erase_count,
                                seq: Some(seq),
                                valid: 0,
                                written: 0,
                            }
                        }
                    }
                }
                _ => {
                    warn!("[FTL] block {} has a damaged header", block);
                    return Err(FtlError::Corrupt);
                }
            };
        }

        if stamped == 0 {
            warn!("[FTL] no formatted blocks found");
            return Err(FtlError::Corrupt);
        }

        // 按写入先后回放，最新的块最后处理
        let newest = closed
            .iter()
            .map(|&(seq, _)| seq)
            .reduce(|a, b| if seq_newer(b, a) { b } else { a });
        if let Some(newest) = newest {
            closed.sort_unstable_by_key(|&(seq, _)| {
                core::cmp::Reverse(newest.wrapping_sub(seq))
            });
        }
        if closed.windows(2).any(|w| w[0].0 == w[1].0) {
            warn!("[FTL] duplicate block sequence numbers");
            return Err(FtlError::Corrupt);
        }

        self.map.fill(UNMAPPED);
        for &(_, block) in &closed {
            self.flash.read(block_base(block), &mut meta)?;
            for slot in 0..SLOTS_PER_BLOCK {
                let Some((lba, _)) = layout::decode_entry(layout::entry_at(&meta, slot)) else {
                    continue;
                };
                self.blocks[block].written = slot + 1;
                let lba = lba as usize;
                if lba >= self.map.len() {
                    warn!("[FTL] block {} slot {} maps sector {} out of range", block, slot, lba);
                    return Err(FtlError::Corrupt);
                }
                let old = core::mem::replace(&mut self.map[lba], location(block, slot));
                if old != UNMAPPED {
                    self.blocks[old as usize / SLOTS_PER_BLOCK].valid -= 1;
                }
                self.blocks[block].valid += 1;
            }
        }

        self.next_seq = newest.map_or(0, next_seq);
        // 上次的活动块可能有写了一半的槽位，挂载后总是从新的空闲块开始写
        self.active = None;
        Ok(())
    }

    fn format(&mut self) -> Result<(), FtlError> {
        info!("[FTL] formatting {} blocks", self.blocks.len());
        self.mounted = false;
        for block in 0..self.blocks.len() {
            self.erase_block(block)?;
        }
        self.map.fill(UNMAPPED);
        self.active = None;
        self.next_seq = 0;
        Ok(())
    }

    fn erase_block(&mut self, block: usize) -> Result<(), FtlError> {
        let base = block_base(block);
        let step = self.flash.erase_size();
        for offset in (0..FTL_BLOCK_SIZE).step_by(step) {
            self.flash.erase_block(base + offset)?;
        }
        let erase_count = self.blocks[block].erase_count.saturating_add(1);
        self.blocks[block] = BlockInfo::free(erase_count);
        self.stats.block_erases += 1;
        self.flash
            .program(base, &layout::encode_header(erase_count, None))?;
        Ok(())
    }

    fn activate_free_block(&mut self) -> Result<usize, FtlError> {
        let block = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.seq.is_none())
            .min_by_key(|(_, b)| b.erase_count)
            .map(|(i, _)| i)
            .ok_or(FtlError::NoSpace)?;
        let seq = self.next_seq;
        self.next_seq = next_seq(seq);
        let erase_count = self.blocks[block].erase_count;
        self.flash
            .program(block_base(block), &layout::encode_header(erase_count, Some(seq)))?;
        self.blocks[block] = BlockInfo {
            erase_count,
            seq: Some(seq),
            valid: 0,
            written: 0,
        };
        self.active = Some(block);
        debug!("[FTL] block {} active, seq {}", block, seq);
        Ok(block)
    }

    /// 返回有空闲槽位的活动块，必要时先回收
    fn ensure_active(&mut self) -> Result<usize, FtlError> {
        loop {
            if let Some(block) = self.active {
                if self.blocks[block].written < SLOTS_PER_BLOCK {
                    return Ok(block);
                }
                self.active = None;
            }
            if self.free_count() > self.config.min_free_blocks {
                return self.activate_free_block();
            }
            self.collect_garbage()?;
        }
    }

    fn collect_garbage(&mut self) -> Result<(), FtlError> {
        let victim = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, b)| b.seq.is_some() && Some(*i) != self.active)
            // 有效扇区相同时先回收最旧的块
            .min_by_key(|(_, b)| {
                let age = b.seq.map_or(0, |seq| self.next_seq.wrapping_sub(seq));
                (b.valid, core::cmp::Reverse(age))
            })
            .map(|(i, _)| i)
            .ok_or(FtlError::NoSpace)?;
        let valid = self.blocks[victim].valid;
        if valid >= SLOTS_PER_BLOCK {
            warn!("[FTL] no reclaimable block");
            return Err(FtlError::NoSpace);
        }
        self.stats.gc_runs += 1;
        debug!("[FTL] gc victim {} with {} valid sectors", victim, valid);

        if valid > 0 {
            let dest = self.activate_free_block()?;
            self.relocate(victim, dest)?;
        }
        self.erase_block(victim)
    }

    fn relocate(&mut self, victim: usize, dest: usize) -> Result<(), FtlError> {
        let mut meta = vec![0u8; SECTOR_SIZE];
        let mut data = vec![0u8; SECTOR_SIZE];
        self.flash.read(block_base(victim), &mut meta)?;
        for slot in 0..SLOTS_PER_BLOCK {
            let Some((lba, crc)) = layout::decode_entry(layout::entry_at(&meta, slot)) else {
                continue;
            };
            if self.map.get(lba as usize) != Some(&location(victim, slot)) {
                continue;
            }
            self.flash.read(slot_offset(victim, slot), &mut data)?;
            // 保留原 CRC，搬移不掩盖已有的数据损坏
            self.append(dest, lba as usize, &data, crc)?;
            self.stats.relocated_sectors += 1;
        }
        Ok(())
    }

    fn append(&mut self, block: usize, lba: usize, data: &[u8], crc: u32) -> Result<(), FtlError> {
        let slot = self.blocks[block].written;
        // 先占用槽位，编程失败时该槽位作废
        self.blocks[block].written += 1;
        self.flash.program(slot_offset(block, slot), data)?;
        self.flash
            .program(entry_offset(block, slot), &layout::encode_entry(lba as u32, crc))?;

        let old = core::mem::replace(&mut self.map[lba], location(block, slot));
        if old != UNMAPPED {
            self.blocks[old as usize / SLOTS_PER_BLOCK].valid -= 1;
        }
        self.blocks[block].valid += 1;
        Ok(())
    }

    fn read(&mut self, lba: usize, buf: &mut [u8]) -> Result<(), FtlError> {
        self.check(lba, buf.len())?;
        let loc = self.map[lba];
        if loc == UNMAPPED {
            buf.fill(0);
            return Ok(());
        }
        let (block, slot) = (loc as usize / SLOTS_PER_BLOCK, loc as usize % SLOTS_PER_BLOCK);
        self.flash.read(slot_offset(block, slot), buf)?;

        let mut entry = [0u8; layout::ENTRY_LEN];
        self.flash.read(entry_offset(block, slot), &mut entry)?;
        match layout::decode_entry(&entry) {
            Some((_, crc)) if crc == layout::data_crc(buf) => Ok(()),
            _ => {
                warn!("[FTL] sector {} fails its checksum", lba);
                Err(FtlError::Corrupt)
            }
        }
    }

    fn write(&mut self, lba: usize, data: &[u8]) -> Result<(), FtlError> {
        self.check(lba, data.len())?;
        let block = self.ensure_active()?;
        self.append(block, lba, data, layout::data_crc(data))
    }
}

impl Driver for Ftl {
    fn device_type(&self) -> DeviceType {
        DeviceType::Block
    }

    fn get_id(&self) -> String {
        String::from("ftl0")
    }
}

impl BlockDriver for Ftl {
    fn status(&self) -> DiskStatus {
        if self.is_mounted() {
            DiskStatus::empty()
        } else {
            DiskStatus::NOINIT
        }
    }

    fn read_blocks(&self, sector: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        if buf.len() % SECTOR_SIZE != 0 {
            return Err(BlockError::InvalidBuffer);
        }
        let mut inner = self.inner.lock();
        for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            inner.read(sector + i, chunk)?;
        }
        Ok(())
    }

    fn write_blocks(&self, sector: usize, buf: &[u8]) -> Result<(), BlockError> {
        if buf.len() % SECTOR_SIZE != 0 {
            return Err(BlockError::InvalidBuffer);
        }
        let mut inner = self.inner.lock();
        for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
            inner.write(sector + i, chunk)?;
        }
        Ok(())
    }

    fn ioctl(&self, cmd: BlockIoctl) -> Result<usize, BlockError> {
        if !self.is_mounted() {
            return Err(BlockError::NotReady);
        }
        match cmd {
            BlockIoctl::SectorCount => Ok(self.logical_sectors),
            BlockIoctl::SectorSize => Ok(SECTOR_SIZE),
            // 擦除由 FTL 内部处理，对上层透明
            BlockIoctl::EraseBlockSize => Ok(1),
            BlockIoctl::Sync => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::RamNorFlash;

    const MIN_FREE: usize = 4;

    fn flash(blocks: usize) -> RamNorFlash {
        RamNorFlash::new(blocks * FTL_BLOCK_SIZE, 4096, 256)
    }

    fn mounted(flash: &RamNorFlash) -> Arc<Ftl> {
        let ftl = Ftl::new(
            Box::new(flash.clone()),
            FtlConfig {
                min_free_blocks: MIN_FREE,
            },
        )
        .unwrap();
        ftl.format().unwrap();
        ftl.mount().unwrap();
        ftl
    }

    fn sector(tag: u8) -> Vec<u8> {
        (0..SECTOR_SIZE).map(|i| tag.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn test_geometry() {
        let ftl = Ftl::new(Box::new(flash(16)), FtlConfig { min_free_blocks: 4 }).unwrap();
        assert_eq!(ftl.block_count(), 16);
        assert_eq!(ftl.logical_sectors(), 10 * SLOTS_PER_BLOCK);
        assert_eq!(ftl.device_type(), DeviceType::Block);
        assert_eq!(ftl.get_id(), "ftl0");

        let too_small = Ftl::new(Box::new(flash(6)), FtlConfig::default());
        assert!(matches!(too_small, Err(FtlError::InvalidGeometry)));

        let big_erase = RamNorFlash::new(16 * FTL_BLOCK_SIZE, 64 * 1024, 256);
        let result = Ftl::new(Box::new(big_erase), FtlConfig { min_free_blocks: 4 });
        assert!(matches!(result, Err(FtlError::InvalidGeometry)));
    }

    #[test]
    fn test_unmounted_and_range() {
        let ftl = Ftl::new(Box::new(flash(16)), FtlConfig { min_free_blocks: 4 }).unwrap();
        let mut buf = vec![0u8; SECTOR_SIZE];
        assert_eq!(ftl.read_sector(0, &mut buf), Err(FtlError::NotMounted));
        assert_eq!(ftl.status(), DiskStatus::NOINIT);

        ftl.format().unwrap();
        ftl.mount().unwrap();
        let count = ftl.logical_sectors();
        assert_eq!(ftl.read_sector(count, &mut buf), Err(FtlError::OutOfRange));
        assert_eq!(ftl.sector_count(), Ok(count));
    }

    #[test]
    fn test_unwritten_reads_zero() {
        let ftl = mounted(&flash(16));
        let mut buf = vec![0xAAu8; SECTOR_SIZE];
        ftl.read_sector(17, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_read_and_overwrite() {
        let ftl = mounted(&flash(16));
        ftl.write_sector(3, &sector(1)).unwrap();
        ftl.write_sector(3, &sector(2)).unwrap();
        let mut buf = vec![0u8; SECTOR_SIZE];
        ftl.read_sector(3, &mut buf).unwrap();
        assert_eq!(buf, sector(2));
    }

    #[test]
    fn test_blank_chip_is_corrupt() {
        let ftl = Ftl::new(Box::new(flash(16)), FtlConfig { min_free_blocks: 4 }).unwrap();
        assert_eq!(ftl.mount(), Err(FtlError::Corrupt));
        assert!(!ftl.is_mounted());
    }

    #[test]
    fn test_damaged_header_is_corrupt() {
        let nor = flash(16);
        let ftl = mounted(&nor);
        nor.corrupt(2 * FTL_BLOCK_SIZE, b"JUNK");
        ftl.unmount();
        assert_eq!(ftl.mount(), Err(FtlError::Corrupt));
    }

    #[test]
    fn test_duplicate_sequence_is_corrupt() {
        let nor = flash(16);
        let _ftl = mounted(&nor);
        // 格式化后每块擦除一次
        nor.corrupt(FTL_BLOCK_SIZE, &layout::encode_header(1, Some(7)));
        nor.corrupt(2 * FTL_BLOCK_SIZE, &layout::encode_header(1, Some(7)));

        let again = Ftl::new(Box::new(nor.clone()), FtlConfig { min_free_blocks: 4 }).unwrap();
        assert_eq!(again.mount(), Err(FtlError::Corrupt));
    }

    #[test]
    fn test_checksum_mismatch() {
        let nor = flash(16);
        let ftl = mounted(&nor);
        ftl.write_sector(9, &sector(5)).unwrap();
        let loc = ftl.inner.lock().map[9] as usize;
        let offset = slot_offset(loc / SLOTS_PER_BLOCK, loc % SLOTS_PER_BLOCK);
        nor.corrupt(offset + 100, &[0x00, 0x00]);

        let mut buf = vec![0u8; SECTOR_SIZE];
        assert_eq!(ftl.read_sector(9, &mut buf), Err(FtlError::Corrupt));
        assert_eq!(ftl.read_blocks(9, &mut buf), Err(BlockError::Io));
    }

    #[test]
    fn test_sequence_helpers() {
        assert_eq!(next_seq(5), 6);
        assert_eq!(next_seq(u32::MAX - 1), 0);
        assert!(seq_newer(0, u32::MAX - 1));
        assert!(!seq_newer(u32::MAX - 1, 0));
        assert!(!seq_newer(3, 3));
    }

    #[test]
    fn test_sequence_wraps_across_remount() {
        let nor = flash(16);
        let ftl = mounted(&nor);
        ftl.inner.lock().next_seq = u32::MAX - 2;
        // 依次占用序列号 MAX-2、MAX-1、0、1 的四个块
        let writes = SLOTS_PER_BLOCK * 4;
        for i in 0..writes {
            ftl.write_sector(7, &sector(i as u8)).unwrap();
        }
        assert_eq!(ftl.inner.lock().next_seq, 2);

        let again = Ftl::new(
            Box::new(nor.clone()),
            FtlConfig {
                min_free_blocks: MIN_FREE,
            },
        )
        .unwrap();
        again.mount().unwrap();
        assert_eq!(again.inner.lock().next_seq, 2);
        let mut buf = vec![0u8; SECTOR_SIZE];
        again.read_sector(7, &mut buf).unwrap();
        assert_eq!(buf, sector((writes - 1) as u8));
    }

    #[test]
    fn test_gc_keeps_free_margin() {
        let nor = flash(16);
        let ftl = mounted(&nor);
        let count = ftl.logical_sectors();
        let mut expected = vec![None; count];

        for i in 0..4000usize {
            let lba = (i * 37) % count;
            let tag = (i % 251) as u8;
            ftl.write_sector(lba, &sector(tag)).unwrap();
            expected[lba] = Some(tag);
            assert!(ftl.free_blocks() >= MIN_FREE, "free margin violated at write {}", i);
        }
        let stats = ftl.stats();
        assert!(stats.gc_runs > 0);

        let mut buf = vec![0u8; SECTOR_SIZE];
        for (lba, tag) in expected.iter().enumerate() {
            ftl.read_sector(lba, &mut buf).unwrap();
            assert_eq!(buf, sector(tag.unwrap_or(0)), "sector {}", lba);
        }
    }

    #[test]
    fn test_gc_relocates_cold_data() {
        let nor = flash(16);
        let ftl = mounted(&nor);
        // 冷数据只写一次，热数据反复覆盖同一个扇区
        for lba in 0..SLOTS_PER_BLOCK * 2 {
            ftl.write_sector(lba, &sector(lba as u8)).unwrap();
        }
        for i in 0..SLOTS_PER_BLOCK * 20 {
            ftl.write_sector(500, &sector(i as u8)).unwrap();
        }
        assert!(ftl.free_blocks() >= MIN_FREE);

        let mut buf = vec![0u8; SECTOR_SIZE];
        for lba in 0..SLOTS_PER_BLOCK * 2 {
            ftl.read_sector(lba, &mut buf).unwrap();
            assert_eq!(buf, sector(lba as u8));
        }
    }
}
