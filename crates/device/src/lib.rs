//! 存储设备驱动框架
//!
//! 此 crate 提供存储栈底层的设备抽象和通用实现，包括：
//!
//! - [`Driver`] trait - 设备驱动基础接口
//! - [`BlockDriver`] trait - 扇区寻址的块设备接口（FAT 文件系统的下层）
//! - [`SdCard`] - 可移动 SD 卡驱动（DMA 对齐回退、传输重试、拔卡检测）
//! - [`NorFlash`] trait - 板载 SPI NOR Flash 的原始接口（页编程、块擦除）
//!
//! 同时提供用于主机测试和仿真的内存实现：[`RamDisk`]、[`SimSdHost`]、[`RamNorFlash`]。

#![no_std]
#![allow(clippy::module_inception)]

extern crate alloc;

pub mod block;
pub mod driver;
pub mod flash;

// Re-export driver
pub use driver::{DeviceType, Driver};

// Re-export block
pub use block::{
    BlockDriver, BlockError, BlockIoctl, CardInfo, DiskStatus, RamDisk, SECTOR_SIZE,
    SD_TRANSFER_RETRIES, SdCard, SdError, SdStats, SdioHost, SimSdHost,
};

// Re-export flash
pub use flash::{FlashError, NorFlash, RamNorFlash};
