//! 内存模拟块设备

use super::{BlockDriver, BlockError, BlockIoctl, DiskStatus, SECTOR_SIZE, sectors_in};
use crate::driver::{DeviceType, Driver};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use sync::SpinLock;

/// 内存模拟的块设备
///
/// 用于测试和开发。总是就绪，不会被拔出。
pub struct RamDisk {
    /// 存储数据
    data: SpinLock<Vec<u8>>,

    /// 设备 ID
    device_id: usize,
}

impl RamDisk {
    /// 创建包含 `sectors` 个扇区的内存磁盘
    pub fn new(sectors: usize, device_id: usize) -> Arc<Self> {
        Arc::new(Self {
            data: SpinLock::new(vec![0u8; sectors * SECTOR_SIZE]),
            device_id,
        })
    }

    /// 从字节数组创建，末尾不足一个扇区的部分会被截断
    pub fn from_bytes(mut data: Vec<u8>, device_id: usize) -> Arc<Self> {
        data.truncate(data.len() / SECTOR_SIZE * SECTOR_SIZE);
        Arc::new(Self {
            data: SpinLock::new(data),
            device_id,
        })
    }

    /// 获取原始数据（用于调试）
    pub fn raw_data(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// 获取设备 ID
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    fn byte_range(&self, len: usize, sector: usize, buf_len: usize) -> Result<(usize, usize), BlockError> {
        sectors_in(buf_len)?;
        let offset = sector
            .checked_mul(SECTOR_SIZE)
            .ok_or(BlockError::OutOfRange)?;
        let end = offset.checked_add(buf_len).ok_or(BlockError::OutOfRange)?;
        if end > len {
            return Err(BlockError::OutOfRange);
        }
        Ok((offset, end))
    }
}

impl Driver for RamDisk {
    fn device_type(&self) -> DeviceType {
        DeviceType::Block
    }

    fn get_id(&self) -> String {
        alloc::format!("ramdisk_{}", self.device_id)
    }
}

// 实现 BlockDriver trait
impl BlockDriver for RamDisk {
    fn status(&self) -> DiskStatus {
        DiskStatus::empty()
    }

    fn read_blocks(&self, sector: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let data = self.data.lock();
        let (start, end) = self.byte_range(data.len(), sector, buf.len())?;
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_blocks(&self, sector: usize, buf: &[u8]) -> Result<(), BlockError> {
        let mut data = self.data.lock();
        let (start, end) = self.byte_range(data.len(), sector, buf.len())?;
        data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn ioctl(&self, cmd: BlockIoctl) -> Result<usize, BlockError> {
        match cmd {
            BlockIoctl::SectorCount => Ok(self.data.lock().len() / SECTOR_SIZE),
            BlockIoctl::SectorSize => Ok(SECTOR_SIZE),
            BlockIoctl::EraseBlockSize => Ok(1),
            // 内存设备无需 flush
            BlockIoctl::Sync => Ok(0),
        }
    }
}
