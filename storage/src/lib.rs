//! # 存储服务
//!
//! 在 SD 卡（FAT）和内部 NOR Flash（日志结构文件系统，或 FTL 之上的 FAT）
//! 之上提供统一的层次命名空间：
//!
//! - `/` - 根伪目录，列出已配置的存储
//! - `/SDCARD/...` - SD 卡
//! - `/INTERNAL/...` - 内部存储
//! - `/DEFAULT/...` - 主存储的别名
//!
//! [`StorageService`] 是显式构造、显式传递的服务对象。路径先规范化再按挂载表
//! 分类，改写为后端的原生路径后分派；文件和目录句柄是按后端打标签的枚举
//! （[`VfsFile`] / [`VfsDir`]），所有操作对标签做穷尽匹配。
//!
//! 句柄借用服务对象，重新挂载需要 `&mut StorageService`，
//! 因此编译期保证重新挂载之前所有句柄都已关闭。

mod config;
mod dir;
mod file;
mod lookup;
mod ops;
mod service;
mod transfer;

// Re-export config
pub use config::{
    COPY_BUFFER_SIZE, InternalMedia, StorageConfig, StorageMedia, WELL_KNOWN_DIRS,
};

// Re-export handles
pub use dir::VfsDir;
pub use file::VfsFile;

// Re-export service
pub use service::StorageService;

// Re-export the unified model for callers
pub use vfs::{
    FileAttributes, FileInfo, FileType, InternalFormat, OpenFlags, PrimaryStorage, StorageLayout,
    VfsError,
};
