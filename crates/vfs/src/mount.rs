//! 挂载表
//!
//! 路径前缀到后端的静态映射。存储布局在集成时选定，路由逻辑按完整的后端集合编写，
//! 布局较小时只是有些分支不可达。
//!
//! | 前缀 | 后端 | 原生路径 |
//! |---|---|---|
//! | `/` | 根伪目录 | - |
//! | `/SDCARD` | FAT（驱动器 0） | `/剩余部分` |
//! | `/INTERNAL` | FAT（驱动器 1）或日志结构 | `1:/剩余部分` 或 `/剩余部分` |
//! | `/DEFAULT` | 主存储的别名 | 同上 |
//!
//! 前缀按完整路径组件匹配：`/SDCARDX` 不属于 `/SDCARD`。

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// 内部存储上的文件系统格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalFormat {
    /// FTL 之上的 FAT
    Fat,
    /// 直接建在 NOR Flash 上的日志结构文件系统
    LittleFs,
}

/// `/DEFAULT` 指向的主存储
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryStorage {
    /// 内部存储
    Internal,
    /// SD 卡
    SdCard,
}

/// 存储布局（构建配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLayout {
    /// 只有 SD 卡
    SdCardOnly,
    /// 只有内部存储
    InternalOnly(InternalFormat),
    /// 两者都有
    Dual {
        /// 内部存储格式
        internal: InternalFormat,
        /// `/DEFAULT` 指向哪一个
        primary: PrimaryStorage,
    },
}

impl StorageLayout {
    /// 是否配置了 SD 卡
    pub fn has_sdcard(&self) -> bool {
        !matches!(self, StorageLayout::InternalOnly(_))
    }

    /// 内部存储格式，未配置内部存储时为 `None`
    pub fn internal(&self) -> Option<InternalFormat> {
        match self {
            StorageLayout::SdCardOnly => None,
            StorageLayout::InternalOnly(format) => Some(*format),
            StorageLayout::Dual { internal, .. } => Some(*internal),
        }
    }

    /// 主存储
    pub fn primary(&self) -> PrimaryStorage {
        match self {
            StorageLayout::SdCardOnly => PrimaryStorage::SdCard,
            StorageLayout::InternalOnly(_) => PrimaryStorage::Internal,
            StorageLayout::Dual { primary, .. } => *primary,
        }
    }
}

/// 路径所属的后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// 根伪目录
    Root,
    /// FAT 后端（SD 卡为驱动器 0，内部存储为驱动器 1）
    Fat,
    /// 日志结构后端
    Lfs,
    /// 无法识别的前缀
    Unknown,
}

/// SD 卡挂载点
pub const SDCARD_MOUNT: &str = "/SDCARD";
/// 内部存储挂载点
pub const INTERNAL_MOUNT: &str = "/INTERNAL";
/// 主存储别名
pub const DEFAULT_MOUNT: &str = "/DEFAULT";

/// 挂载表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountTable {
    layout: StorageLayout,
}

impl MountTable {
    /// 按存储布局创建挂载表
    pub const fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// 存储布局
    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    /// 把规范的绝对路径分类到后端，并改写为后端的原生路径
    pub fn classify(&self, path: &str) -> (Backend, String) {
        if path == "/" {
            return (Backend::Root, String::from("/"));
        }
        if let Some(rest) = strip_mount(path, INTERNAL_MOUNT) {
            if let Some(format) = self.layout.internal() {
                return internal_path(format, rest);
            }
        } else if let Some(rest) = strip_mount(path, SDCARD_MOUNT) {
            if self.layout.has_sdcard() {
                return sdcard_path(rest);
            }
        } else if let Some(rest) = strip_mount(path, DEFAULT_MOUNT) {
            match (self.layout.primary(), self.layout.internal()) {
                (PrimaryStorage::Internal, Some(format)) => return internal_path(format, rest),
                (PrimaryStorage::SdCard, _) if self.layout.has_sdcard() => {
                    return sdcard_path(rest);
                }
                _ => {}
            }
        }
        (Backend::Unknown, String::from(path))
    }

    /// 根伪目录中列出的条目
    pub fn root_entries(&self) -> Vec<&'static str> {
        let mut entries = Vec::new();
        if self.layout.internal().is_some() {
            entries.push(&INTERNAL_MOUNT[1..]);
        }
        if self.layout.has_sdcard() {
            entries.push(&SDCARD_MOUNT[1..]);
        }
        entries
    }
}

/// 按完整组件匹配前缀，返回剩余部分（空或以 `/` 开头）
fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(mount)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn sdcard_path(rest: &str) -> (Backend, String) {
    let native = if rest.is_empty() { "/" } else { rest };
    (Backend::Fat, String::from(native))
}

fn internal_path(format: InternalFormat, rest: &str) -> (Backend, String) {
    let native = if rest.is_empty() { "/" } else { rest };
    match format {
        InternalFormat::Fat => (Backend::Fat, format!("1:{}", native)),
        InternalFormat::LittleFs => (Backend::Lfs, String::from(native)),
    }
}
