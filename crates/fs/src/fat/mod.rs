//! FAT 后端
//!
//! 基于 `fatfs` 的 FAT12/16/32 卷。SD 卡是驱动器 0，FTL 之上的内部存储是
//! 驱动器 1，原生路径用 `1:` 前缀区分驱动器。

mod block_io;
mod error;
mod volume;

pub use block_io::{BlockIo, block_error};
pub use error::translate;
pub use volume::{Drive, FatDir, FatFile, FatVolume, split_drive};
