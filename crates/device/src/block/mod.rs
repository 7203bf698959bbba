//! 块设备模块
//!
//! 包含块设备相关的驱动接口和实现。
//!
//! 所有块设备都以 512 字节扇区寻址，一次调用可以读写连续的多个扇区。
//! 这是 FAT 文件系统所需的下层接口（对应 FatFs 的 diskio 层）。

mod ram_disk;
mod sd;
mod sim_sd;

use core::fmt;

use bitflags::bitflags;

use crate::driver::Driver;

pub use ram_disk::RamDisk;
pub use sd::{CardInfo, SD_TRANSFER_RETRIES, SdCard, SdError, SdStats, SdioHost};
pub use sim_sd::SimSdHost;

/// 块设备扇区大小（字节）
pub const SECTOR_SIZE: usize = 512;

bitflags! {
    /// 磁盘状态位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DiskStatus: u8 {
        /// 驱动器尚未初始化
        const NOINIT = 0x01;
        /// 介质不存在（SD 卡被拔出）
        const NODISK = 0x02;
        /// 介质写保护
        const PROTECT = 0x04;
    }
}

/// 块设备控制命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIoctl {
    /// 查询扇区总数
    SectorCount,
    /// 查询扇区大小（字节）
    SectorSize,
    /// 查询擦除块大小（以扇区为单位）
    EraseBlockSize,
    /// 等待所有挂起的写入完成
    Sync,
}

/// 块设备错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// 设备未就绪（卡未插入或初始化失败）
    NotReady,
    /// 传输失败（重试耗尽）
    Io,
    /// 扇区号超出设备范围
    OutOfRange,
    /// 缓冲区长度不是扇区大小的整数倍
    InvalidBuffer,
    /// 设备不支持该命令
    Unsupported,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BlockError::NotReady => "device not ready",
            BlockError::Io => "block transfer failed",
            BlockError::OutOfRange => "sector out of range",
            BlockError::InvalidBuffer => "buffer is not a whole number of sectors",
            BlockError::Unsupported => "unsupported block command",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for BlockError {}

/// 块设备驱动程序接口
pub trait BlockDriver: Driver {
    /// 查询设备状态
    ///
    /// 返回空集表示设备已就绪。
    fn status(&self) -> DiskStatus;

    /// 读取从 `sector` 开始的 `buf.len() / SECTOR_SIZE` 个扇区
    ///
    /// # 参数：
    /// * `sector` - 起始扇区号
    /// * `buf` - 用于存储读取数据的缓冲区，长度必须是扇区大小的整数倍
    fn read_blocks(&self, sector: usize, buf: &mut [u8]) -> Result<(), BlockError>;

    /// 写入从 `sector` 开始的 `buf.len() / SECTOR_SIZE` 个扇区
    fn write_blocks(&self, sector: usize, buf: &[u8]) -> Result<(), BlockError>;

    /// 执行控制命令
    fn ioctl(&self, cmd: BlockIoctl) -> Result<usize, BlockError>;

    /// 获取扇区总数
    fn sector_count(&self) -> Result<usize, BlockError> {
        self.ioctl(BlockIoctl::SectorCount)
    }

    /// 将挂起的写入刷新到介质
    fn flush(&self) -> Result<(), BlockError> {
        self.ioctl(BlockIoctl::Sync).map(|_| ())
    }
}

/// 校验缓冲区并返回其覆盖的扇区数
pub(crate) fn sectors_in(buf_len: usize) -> Result<usize, BlockError> {
    if buf_len % SECTOR_SIZE != 0 {
        return Err(BlockError::InvalidBuffer);
    }
    Ok(buf_len / SECTOR_SIZE)
}
