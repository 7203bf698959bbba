//! # 文件系统后端 (FS)
//!
//! 本 crate 提供存储路由层下面的两种文件系统后端胶水层。两种后端的原生 API
//! 没有共同结构，路由层通过带标签的枚举分别调用它们。
//!
//! ## 后端
//!
//! - **[fat]**: 基于 `fatfs` 的 FAT 卷，建在任意 [`device::BlockDriver`] 之上
//!   （SD 卡为驱动器 0，FTL 之上的内部存储为驱动器 1）
//! - **[lfs]**: 日志结构文件系统的原生 API（[`lfs::LfsDriver`]）及其卷封装，
//!   附带 NOR Flash 实现 [`lfs::FlashLfs`] 和内存实现 [`lfs::RamLfs`]
//!
//! 原生错误在这一层被翻译为 [`vfs::VfsError`]，上层不再二次解释。
//! 每次原生调用都持有共享的块设备 I/O 互斥锁。

pub mod fat;
pub mod lfs;

pub use fat::{BlockIo, Drive, FatDir, FatFile, FatVolume, split_drive};
pub use lfs::{
    FlashLfs, LfsDir, LfsDriver, LfsError, LfsFile, LfsInfo, LfsOpenFlags, LfsVolume, LfsWhence,
    RamLfs,
};
