//! 闪存转换层（FTL）
//!
//! 把 NOR Flash 呈现为 512 字节扇区组成的线性块设备，供 FAT 文件系统使用。
//!
//! # 布局
//!
//! Flash 被划分为 32 KiB 的物理块。每个物理块的第一个扇区是元数据扇区：
//! 16 字节块头（魔数、擦除次数、块头校验、序列号）加 62 个 8 字节的映射项
//! （逻辑扇区号 + 数据 CRC32）。其余扇区依次存放数据。
//!
//! # 写入
//!
//! 写入从不原地覆盖：数据追加到当前活动块的下一个空闲槽位，然后写映射项。
//! 同一逻辑扇区的多个副本中，序列号更大的块、槽位更靠后的副本为最新。
//!
//! # 垃圾回收
//!
//! 活动块写满且空闲块不多于 [`FtlConfig::min_free_blocks`] 时，同步执行垃圾回收：
//! 选出有效扇区最少的已关闭块，把其中的有效扇区搬移到新的活动块，然后擦除。
//! 分配空闲块时优先选择擦除次数最少的块（磨损均衡）。
//!
//! # 挂载
//!
//! 挂载时扫描全部物理块重建映射表。块头损坏、序列号重复或映射项越界都视为
//! 映射不一致，返回 [`FtlError::Corrupt`]，由上层决定是否整片擦除并重新格式化。

#![no_std]

extern crate alloc;

mod error;
mod ftl;
mod layout;

pub use error::FtlError;
pub use ftl::{FTL_BLOCK_SIZE, Ftl, FtlConfig, FtlStats, SLOTS_PER_BLOCK};
