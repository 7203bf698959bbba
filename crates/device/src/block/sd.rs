//! SD 卡块设备驱动
//!
//! 在 [`SdioHost`] 控制器之上实现 [`BlockDriver`]：
//!
//! - 每次读写前检查卡是否在位，卡被拔出时立即返回 [`BlockError::NotReady`]，
//!   重新插入后在下一次访问时自动重新初始化；
//! - 控制器 DMA 只能访问特定内存区域且要求 4 字节对齐，不满足条件的调用方缓冲区
//!   逐扇区经由驱动内部的对齐暂存缓冲区中转；
//! - 每次传输最多尝试 [`SD_TRANSFER_RETRIES`] 次；
//! - 多扇区传输重试耗尽后退化为逐扇区传输。

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::ops::Range;

use log::{debug, error, info, warn};
use sync::SpinLock;

use super::{BlockDriver, BlockError, BlockIoctl, DiskStatus, SECTOR_SIZE, sectors_in};
use crate::driver::{DeviceType, Driver};

/// 单次传输的最大尝试次数
pub const SD_TRANSFER_RETRIES: usize = 3;

/// DMA 要求的缓冲区地址对齐
const DMA_ALIGN: usize = 4;

/// SD 控制器返回的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdError {
    /// 卡不在位
    NoCard,
    /// 命令或数据超时
    Timeout,
    /// 数据 CRC 校验失败
    Crc,
    /// 卡初始化失败
    InitFailed,
}

impl fmt::Display for SdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdError::NoCard => f.write_str("no card"),
            SdError::Timeout => f.write_str("timeout"),
            SdError::Crc => f.write_str("crc error"),
            SdError::InitFailed => f.write_str("card init failed"),
        }
    }
}

/// 卡初始化后报告的信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardInfo {
    /// 扇区总数
    pub sector_count: usize,
    /// 擦除块大小（扇区数）
    pub erase_block_sectors: usize,
}

/// SD 主控制器接口
///
/// 控制器的读写以 512 字节扇区为单位，缓冲区由 DMA 直接访问，
/// 因此必须位于 [`SdioHost::dma_region`] 内且按 4 字节对齐。
pub trait SdioHost: Send {
    /// 卡检测引脚是否指示卡在位
    fn card_present(&self) -> bool;

    /// 初始化卡（上电、识别、切换高速）
    fn init(&mut self) -> Result<CardInfo, SdError>;

    /// 从 `sector` 开始读取 `buf.len() / 512` 个扇区
    fn read_blocks(&mut self, sector: usize, buf: &mut [u8]) -> Result<(), SdError>;

    /// 从 `sector` 开始写入 `buf.len() / 512` 个扇区
    fn write_blocks(&mut self, sector: usize, buf: &[u8]) -> Result<(), SdError>;

    /// 等待卡完成内部编程
    fn wait_idle(&mut self) -> Result<(), SdError>;

    /// DMA 可访问的地址范围
    fn dma_region(&self) -> Range<usize>;
}

/// 驱动计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdStats {
    /// 失败后重试的传输次数
    pub retries: usize,
    /// 多扇区传输退化为逐扇区传输的次数
    pub single_sector_fallbacks: usize,
    /// 经由暂存缓冲区中转的扇区数
    pub staged_sectors: usize,
    /// 卡初始化次数
    pub inits: usize,
}

/// DMA 暂存缓冲区，保证 4 字节对齐
#[repr(C, align(4))]
struct Scratch([u8; SECTOR_SIZE]);

struct SdInner<H> {
    host: H,
    card: Option<CardInfo>,
    scratch: Box<Scratch>,
    stats: SdStats,
}

/// SD 卡块设备
pub struct SdCard<H: SdioHost> {
    inner: SpinLock<SdInner<H>>,
    device_id: usize,
}

impl<H: SdioHost> SdCard<H> {
    /// 在指定控制器上创建 SD 卡驱动
    ///
    /// 卡在第一次访问时才初始化。
    pub fn new(host: H, device_id: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: SpinLock::new(SdInner {
                host,
                card: None,
                scratch: Box::new(Scratch([0; SECTOR_SIZE])),
                stats: SdStats::default(),
            }),
            device_id,
        })
    }

    /// 获取驱动计数器快照
    pub fn stats(&self) -> SdStats {
        self.inner.lock().stats
    }

    /// 卡是否已完成初始化
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().card.is_some()
    }
}

impl<H: SdioHost> SdInner<H> {
    /// 检查卡在位并按需初始化
    fn ready(&mut self) -> Result<CardInfo, BlockError> {
        if !self.host.card_present() {
            if self.card.take().is_some() {
                warn!("[SD] card removed");
            }
            return Err(BlockError::NotReady);
        }
        if let Some(card) = self.card {
            return Ok(card);
        }
        self.stats.inits += 1;
        match self.host.init() {
            Ok(card) => {
                info!(
                    "[SD] card initialized: {} sectors, erase block {} sectors",
                    card.sector_count, card.erase_block_sectors
                );
                self.card = Some(card);
                Ok(card)
            }
            Err(e) => {
                error!("[SD] card init failed: {}", e);
                Err(BlockError::NotReady)
            }
        }
    }

    fn dma_capable(&self, addr: usize, len: usize) -> bool {
        let region = self.host.dma_region();
        addr % DMA_ALIGN == 0 && addr >= region.start && addr.saturating_add(len) <= region.end
    }

    /// 经由暂存缓冲区逐扇区读取
    fn read_staged(&mut self, sector: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let SdInner { host, scratch, stats, .. } = self;
        for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            stats.staged_sectors += 1;
            read_with_retry(host, stats, sector + i, &mut scratch.0)?;
            chunk.copy_from_slice(&scratch.0);
        }
        Ok(())
    }

    /// 经由暂存缓冲区逐扇区写入
    fn write_staged(&mut self, sector: usize, buf: &[u8]) -> Result<(), BlockError> {
        let SdInner { host, scratch, stats, .. } = self;
        for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
            stats.staged_sectors += 1;
            scratch.0.copy_from_slice(chunk);
            write_with_retry(host, stats, sector + i, &scratch.0)?;
        }
        Ok(())
    }

    fn read_direct(&mut self, sector: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let SdInner { host, stats, .. } = self;
        match read_with_retry(host, stats, sector, buf) {
            Err(BlockError::Io) if buf.len() > SECTOR_SIZE => {
                warn!(
                    "[SD] multi-sector read at {} x{} failed, retrying sector by sector",
                    sector,
                    buf.len() / SECTOR_SIZE
                );
                stats.single_sector_fallbacks += 1;
                for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
                    read_with_retry(host, stats, sector + i, chunk)?;
                }
                Ok(())
            }
            other => other,
        }
    }

    fn write_direct(&mut self, sector: usize, buf: &[u8]) -> Result<(), BlockError> {
        let SdInner { host, stats, .. } = self;
        match write_with_retry(host, stats, sector, buf) {
            Err(BlockError::Io) if buf.len() > SECTOR_SIZE => {
                warn!(
                    "[SD] multi-sector write at {} x{} failed, retrying sector by sector",
                    sector,
                    buf.len() / SECTOR_SIZE
                );
                stats.single_sector_fallbacks += 1;
                for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
                    write_with_retry(host, stats, sector + i, chunk)?;
                }
                Ok(())
            }
            other => other,
        }
    }
}

fn read_with_retry<H: SdioHost>(
    host: &mut H,
    stats: &mut SdStats,
    sector: usize,
    buf: &mut [u8],
) -> Result<(), BlockError> {
    for attempt in 0..SD_TRANSFER_RETRIES {
        if attempt > 0 {
            stats.retries += 1;
        }
        match host.read_blocks(sector, buf) {
            Ok(()) => return Ok(()),
            Err(SdError::NoCard) => return Err(BlockError::NotReady),
            Err(e) => debug!(
                "[SD] read sector {} x{} failed ({}), attempt {}",
                sector,
                buf.len() / SECTOR_SIZE,
                e,
                attempt + 1
            ),
        }
    }
    Err(BlockError::Io)
}

fn write_with_retry<H: SdioHost>(
    host: &mut H,
    stats: &mut SdStats,
    sector: usize,
    buf: &[u8],
) -> Result<(), BlockError> {
    for attempt in 0..SD_TRANSFER_RETRIES {
        if attempt > 0 {
            stats.retries += 1;
        }
        match host.write_blocks(sector, buf) {
            Ok(()) => return Ok(()),
            Err(SdError::NoCard) => return Err(BlockError::NotReady),
            Err(e) => debug!(
                "[SD] write sector {} x{} failed ({}), attempt {}",
                sector,
                buf.len() / SECTOR_SIZE,
                e,
                attempt + 1
            ),
        }
    }
    Err(BlockError::Io)
}

fn check_range(card: &CardInfo, sector: usize, count: usize) -> Result<(), BlockError> {
    match sector.checked_add(count) {
        Some(end) if end <= card.sector_count => Ok(()),
        _ => Err(BlockError::OutOfRange),
    }
}

impl<H: SdioHost> Driver for SdCard<H> {
    fn device_type(&self) -> DeviceType {
        DeviceType::Block
    }

    fn get_id(&self) -> String {
        alloc::format!("sdcard_{}", self.device_id)
    }
}

impl<H: SdioHost> BlockDriver for SdCard<H> {
    fn status(&self) -> DiskStatus {
        let inner = self.inner.lock();
        if !inner.host.card_present() {
            DiskStatus::NODISK | DiskStatus::NOINIT
        } else if inner.card.is_none() {
            DiskStatus::NOINIT
        } else {
            DiskStatus::empty()
        }
    }

    fn read_blocks(&self, sector: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let count = sectors_in(buf.len())?;
        if count == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        let card = inner.ready()?;
        check_range(&card, sector, count)?;

        if !inner.dma_capable(buf.as_ptr() as usize, buf.len()) {
            debug!("[SD] read buffer {:p} not DMA capable, staging", buf.as_ptr());
            return inner.read_staged(sector, buf);
        }

        inner.read_direct(sector, buf)
    }

    fn write_blocks(&self, sector: usize, buf: &[u8]) -> Result<(), BlockError> {
        let count = sectors_in(buf.len())?;
        if count == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        let card = inner.ready()?;
        check_range(&card, sector, count)?;

        if !inner.dma_capable(buf.as_ptr() as usize, buf.len()) {
            debug!("[SD] write buffer {:p} not DMA capable, staging", buf.as_ptr());
            return inner.write_staged(sector, buf);
        }

        inner.write_direct(sector, buf)
    }

    fn ioctl(&self, cmd: BlockIoctl) -> Result<usize, BlockError> {
        let mut inner = self.inner.lock();
        let card = inner.ready()?;
        match cmd {
            BlockIoctl::SectorCount => Ok(card.sector_count),
            BlockIoctl::SectorSize => Ok(SECTOR_SIZE),
            BlockIoctl::EraseBlockSize => Ok(card.erase_block_sectors),
            BlockIoctl::Sync => inner
                .host
                .wait_idle()
                .map(|_| 0)
                .map_err(|e| match e {
                    SdError::NoCard => BlockError::NotReady,
                    _ => BlockError::Io,
                }),
        }
    }
}
