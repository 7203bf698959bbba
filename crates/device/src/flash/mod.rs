//! NOR Flash 模块
//!
//! 板载 SPI NOR Flash 的原始访问接口。NOR 的物理特性：
//!
//! - 编程只能把位从 1 变为 0，写入结果为 `旧值 & 新值`；
//! - 擦除以擦除块为单位，擦除后整块恢复为 0xFF；
//! - 读取可以从任意字节偏移开始。
//!
//! 闪存转换层（FTL）和日志结构文件系统都建立在这个接口之上。

mod ram_flash;

use core::fmt;

use crate::driver::Driver;

pub use ram_flash::RamNorFlash;

/// Flash 错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// 访问超出芯片容量
    OutOfBounds,
    /// 擦除地址未按擦除块对齐
    Unaligned,
    /// 编程失败
    ProgramFailed,
    /// 擦除失败
    EraseFailed,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FlashError::OutOfBounds => "flash access out of bounds",
            FlashError::Unaligned => "flash erase address not aligned",
            FlashError::ProgramFailed => "flash program failed",
            FlashError::EraseFailed => "flash erase failed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for FlashError {}

/// NOR Flash 驱动接口
pub trait NorFlash: Driver {
    /// 芯片总容量（字节）
    fn capacity(&self) -> usize;

    /// 擦除块大小（字节）
    fn erase_size(&self) -> usize;

    /// 编程页大小（字节）
    fn page_size(&self) -> usize;

    /// 从 `offset` 处读取 `buf.len()` 字节
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;

    /// 在 `offset` 处编程 `data`
    ///
    /// 只能把位从 1 清为 0；跨页写入由实现自行拆分。
    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError>;

    /// 擦除从 `offset` 开始的一个擦除块，`offset` 必须按擦除块对齐
    fn erase_block(&mut self, offset: usize) -> Result<(), FlashError>;

    /// 擦除整片
    fn erase_all(&mut self) -> Result<(), FlashError> {
        let step = self.erase_size();
        let mut offset = 0;
        while offset < self.capacity() {
            self.erase_block(offset)?;
            offset += step;
        }
        Ok(())
    }
}
