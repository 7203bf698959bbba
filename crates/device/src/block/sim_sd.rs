//! 内存模拟 SD 主控制器
//!
//! 用于主机测试：可以模拟拔卡、初始化失败、按扇区注入传输错误，
//! 以及限制 DMA 可访问区域。句柄可克隆，克隆之间共享同一张“卡”。

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use sync::SpinLock;

use super::SECTOR_SIZE;
use super::sd::{CardInfo, SdError, SdioHost};

struct SimCard {
    data: Vec<u8>,
    present: bool,
    init_fails: bool,
    /// 扇区号 -> 剩余失败次数
    faults: BTreeMap<usize, usize>,
    dma_region: Range<usize>,
    transfers: usize,
}

impl SimCard {
    /// 传输覆盖的扇区中只要有一个仍需失败，本次传输即失败，
    /// 并且所有被覆盖的故障扇区的剩余次数各减一
    fn take_fault(&mut self, sector: usize, count: usize) -> bool {
        let mut failed = false;
        for (_, remaining) in self.faults.range_mut(sector..sector + count) {
            if *remaining > 0 {
                *remaining -= 1;
                failed = true;
            }
        }
        failed
    }
}

/// 模拟 SD 控制器
#[derive(Clone)]
pub struct SimSdHost {
    card: Arc<SpinLock<SimCard>>,
}

impl SimSdHost {
    /// 创建容量为 `sectors` 个扇区的模拟卡，初始为插入状态
    pub fn new(sectors: usize) -> Self {
        Self {
            card: Arc::new(SpinLock::new(SimCard {
                data: vec![0u8; sectors * SECTOR_SIZE],
                present: true,
                init_fails: false,
                faults: BTreeMap::new(),
                dma_region: 0..usize::MAX,
                transfers: 0,
            })),
        }
    }

    /// 插入或拔出卡
    pub fn set_present(&self, present: bool) {
        self.card.lock().present = present;
    }

    /// 让后续的卡初始化失败
    pub fn set_init_fails(&self, fails: bool) {
        self.card.lock().init_fails = fails;
    }

    /// 使覆盖 `sector` 的接下来 `times` 次传输失败
    pub fn fail_sector(&self, sector: usize, times: usize) {
        self.card.lock().faults.insert(sector, times);
    }

    /// 设置 DMA 可访问的地址范围
    pub fn set_dma_region(&self, region: Range<usize>) {
        self.card.lock().dma_region = region;
    }

    /// 已发出的读写传输次数（含失败的）
    pub fn transfer_count(&self) -> usize {
        self.card.lock().transfers
    }

    /// 读取卡上一个扇区的原始内容
    pub fn sector(&self, sector: usize) -> Vec<u8> {
        let card = self.card.lock();
        card.data[sector * SECTOR_SIZE..(sector + 1) * SECTOR_SIZE].to_vec()
    }
}

impl SdioHost for SimSdHost {
    fn card_present(&self) -> bool {
        self.card.lock().present
    }

    fn init(&mut self) -> Result<CardInfo, SdError> {
        let card = self.card.lock();
        if !card.present {
            return Err(SdError::NoCard);
        }
        if card.init_fails {
            return Err(SdError::InitFailed);
        }
        Ok(CardInfo {
            sector_count: card.data.len() / SECTOR_SIZE,
            erase_block_sectors: 8,
        })
    }

    fn read_blocks(&mut self, sector: usize, buf: &mut [u8]) -> Result<(), SdError> {
        let mut card = self.card.lock();
        if !card.present {
            return Err(SdError::NoCard);
        }
        card.transfers += 1;
        if card.take_fault(sector, buf.len() / SECTOR_SIZE) {
            return Err(SdError::Crc);
        }
        let start = sector * SECTOR_SIZE;
        let src = card.data.get(start..start + buf.len()).ok_or(SdError::Timeout)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_blocks(&mut self, sector: usize, buf: &[u8]) -> Result<(), SdError> {
        let mut card = self.card.lock();
        if !card.present {
            return Err(SdError::NoCard);
        }
        card.transfers += 1;
        if card.take_fault(sector, buf.len() / SECTOR_SIZE) {
            return Err(SdError::Crc);
        }
        let start = sector * SECTOR_SIZE;
        let dst = card
            .data
            .get_mut(start..start + buf.len())
            .ok_or(SdError::Timeout)?;
        dst.copy_from_slice(buf);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<(), SdError> {
        if self.card.lock().present {
            Ok(())
        } else {
            Err(SdError::NoCard)
        }
    }

    fn dma_region(&self) -> Range<usize> {
        self.card.lock().dma_region.clone()
    }
}
