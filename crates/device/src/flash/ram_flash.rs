//! 内存模拟 NOR Flash

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use sync::SpinLock;

use super::{FlashError, NorFlash};
use crate::driver::{DeviceType, Driver};

struct RamFlashInner {
    data: Vec<u8>,
    erase_counts: Vec<u32>,
    /// 允许的剩余编程次数，`None` 表示不限
    program_budget: Option<usize>,
}

/// 内存模拟的 NOR Flash
///
/// 遵守 NOR 的编程语义（只能 1 → 0），记录每个擦除块的擦除次数。
/// 句柄可克隆，测试可以在 Flash 交给上层之后继续观察和篡改其内容。
#[derive(Clone)]
pub struct RamNorFlash {
    inner: Arc<SpinLock<RamFlashInner>>,
    erase_size: usize,
    page_size: usize,
}

impl RamNorFlash {
    /// 创建容量为 `capacity` 字节的已擦除 Flash
    pub fn new(capacity: usize, erase_size: usize, page_size: usize) -> Self {
        let blocks = capacity / erase_size;
        Self {
            inner: Arc::new(SpinLock::new(RamFlashInner {
                data: vec![0xFF; blocks * erase_size],
                erase_counts: vec![0; blocks],
                program_budget: None,
            })),
            erase_size,
            page_size,
        }
    }

    /// 每个擦除块的擦除次数
    pub fn erase_counts(&self) -> Vec<u32> {
        self.inner.lock().erase_counts.clone()
    }

    /// 原始内容快照
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().data.clone()
    }

    /// 绕过 NOR 语义直接覆盖内容（模拟损坏）
    pub fn corrupt(&self, offset: usize, bytes: &[u8]) {
        let mut inner = self.inner.lock();
        inner.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// 限制后续允许成功的编程次数（模拟掉电）
    pub fn set_program_budget(&self, budget: Option<usize>) {
        self.inner.lock().program_budget = budget;
    }

    fn check(&self, len: usize, offset: usize, count: usize) -> Result<(), FlashError> {
        match offset.checked_add(count) {
            Some(end) if end <= len => Ok(()),
            _ => Err(FlashError::OutOfBounds),
        }
    }
}

impl Driver for RamNorFlash {
    fn device_type(&self) -> DeviceType {
        DeviceType::Flash
    }

    fn get_id(&self) -> String {
        alloc::format!("ramflash_{}k", self.capacity() / 1024)
    }
}

impl NorFlash for RamNorFlash {
    fn capacity(&self) -> usize {
        self.inner.lock().data.len()
    }

    fn erase_size(&self) -> usize {
        self.erase_size
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let inner = self.inner.lock();
        self.check(inner.data.len(), offset, buf.len())?;
        buf.copy_from_slice(&inner.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        let mut inner = self.inner.lock();
        self.check(inner.data.len(), offset, data.len())?;
        if let Some(budget) = inner.program_budget.as_mut() {
            if *budget == 0 {
                return Err(FlashError::ProgramFailed);
            }
            *budget -= 1;
        }
        for (cell, byte) in inner.data[offset..offset + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn erase_block(&mut self, offset: usize) -> Result<(), FlashError> {
        if offset % self.erase_size != 0 {
            return Err(FlashError::Unaligned);
        }
        let mut inner = self.inner.lock();
        self.check(inner.data.len(), offset, self.erase_size)?;
        inner.data[offset..offset + self.erase_size].fill(0xFF);
        inner.erase_counts[offset / self.erase_size] += 1;
        Ok(())
    }
}
