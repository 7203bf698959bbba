//! 统一存储模型
//!
//! 此 crate 定义存储路由层与两种文件系统后端之间共享的类型，包括：
//!
//! - [`VfsError`] - 统一错误码，两种后端的原生错误都在边界处翻译为它
//! - [`OpenFlags`] / [`FileAttributes`] - 打开标志和文件属性位
//! - [`FileInfo`] - 按后端打标签的元数据快照
//! - 路径规范化引擎
//! - [`MountTable`] - 路径前缀到后端的静态映射
//! - 文件名辅助函数（扩展名匹配、编号后缀）

#![no_std]

extern crate alloc;

pub mod error;
mod flags;
mod info;
mod mount;
pub mod name;
mod path;
mod volume;

// Re-export error
pub use error::VfsError;

// Re-export flags
pub use flags::{FileAttributes, OpenFlags};

// Re-export info
pub use info::{FatStat, FileInfo, FileType, LfsStat, fat_date, fat_time};

// Re-export mount
pub use mount::{
    Backend, DEFAULT_MOUNT, INTERNAL_MOUNT, InternalFormat, MountTable, PrimaryStorage,
    SDCARD_MOUNT, StorageLayout,
};

// Re-export path
pub use path::{MAX_NAME_LEN, PathComponent, normalize_path, parse_path, resolve_path};

// Re-export volume
pub use volume::VolumeStats;
