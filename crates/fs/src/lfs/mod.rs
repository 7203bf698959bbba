//! 日志结构后端
//!
//! [`LfsDriver`] 是 littlefs 风格的原生 API：打开的文件和目录用整数句柄标识，
//! 错误是负的 errno 风格错误码。[`LfsVolume`] 在其上加锁并翻译错误和打开标志。
//!
//! [`FlashLfs`] 把文件系统存放在 NOR Flash 上，[`RamLfs`] 只在内存中保存。

mod flash;
mod meta;
mod ram;
mod volume;

pub use flash::FlashLfs;
pub use ram::RamLfs;
pub use volume::{LfsDir, LfsFile, LfsVolume};

use std::fmt;

use bitflags::bitflags;
use vfs::{MAX_NAME_LEN, OpenFlags, VfsError};

/// 打开的文件句柄
pub type LfsFileId = usize;
/// 打开的目录句柄
pub type LfsDirId = usize;

/// 原生错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfsError(pub i32);

impl LfsError {
    /// 输入输出错误
    pub const IO: Self = Self(-5);
    /// 文件系统损坏
    pub const CORRUPT: Self = Self(-84);
    /// 不存在
    pub const NOENT: Self = Self(-2);
    /// 已存在
    pub const EXIST: Self = Self(-17);
    /// 不是目录
    pub const NOTDIR: Self = Self(-20);
    /// 是目录
    pub const ISDIR: Self = Self(-21);
    /// 目录非空
    pub const NOTEMPTY: Self = Self(-39);
    /// 无效句柄
    pub const BADF: Self = Self(-9);
    /// 文件过大
    pub const FBIG: Self = Self(-27);
    /// 无效参数
    pub const INVAL: Self = Self(-22);
    /// 空间不足
    pub const NOSPC: Self = Self(-28);
    /// 内存不足
    pub const NOMEM: Self = Self(-12);
    /// 属性不存在
    pub const NOATTR: Self = Self(-61);
    /// 名字过长
    pub const NAMETOOLONG: Self = Self(-36);
}

impl fmt::Display for LfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lfs error {}", self.0)
    }
}

impl core::error::Error for LfsError {}

impl From<LfsError> for VfsError {
    fn from(err: LfsError) -> Self {
        VfsError::from_code(err.0)
    }
}

bitflags! {
    /// 原生打开标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LfsOpenFlags: u32 {
        /// 只读
        const RDONLY = 0x0001;
        /// 只写
        const WRONLY = 0x0002;
        /// 读写
        const RDWR = 0x0003;
        /// 不存在时创建
        const CREAT = 0x0100;
        /// 与 `CREAT` 一起使用，已存在时失败
        const EXCL = 0x0200;
        /// 打开时截断为 0
        const TRUNC = 0x0400;
        /// 每次写入前移动到文件末尾
        const APPEND = 0x0800;
    }
}

impl From<OpenFlags> for LfsOpenFlags {
    fn from(flags: OpenFlags) -> Self {
        let mut native = LfsOpenFlags::empty();
        if flags.contains(OpenFlags::READ) {
            native |= LfsOpenFlags::RDONLY;
        }
        if flags.contains(OpenFlags::WRITE) {
            native |= LfsOpenFlags::WRONLY;
        }
        // OPEN_APPEND 的位包含 OPEN_ALWAYS，必须先判断
        if flags.is_append() {
            native |= LfsOpenFlags::CREAT | LfsOpenFlags::APPEND;
        } else if flags.contains(OpenFlags::CREATE_ALWAYS) {
            native |= LfsOpenFlags::CREAT | LfsOpenFlags::TRUNC;
        } else if flags.contains(OpenFlags::CREATE_NEW) {
            native |= LfsOpenFlags::CREAT | LfsOpenFlags::EXCL;
        } else if flags.contains(OpenFlags::OPEN_ALWAYS) {
            native |= LfsOpenFlags::CREAT;
        }
        native
    }
}

/// 定位基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsWhence {
    /// 文件开头
    Set,
    /// 当前位置
    Cur,
    /// 文件末尾
    End,
}

/// 原生目录项信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsInfo {
    /// 名字
    pub name: String,
    /// 文件大小，目录为 0
    pub size: u64,
    /// 是否为目录
    pub is_dir: bool,
}

/// littlefs 风格的原生文件系统接口
///
/// 目录列举包含原生的 `.` 和 `..` 条目，由上层过滤。
pub trait LfsDriver: Send {
    /// 在介质上创建空文件系统
    fn format(&mut self) -> Result<(), LfsError>;
    /// 挂载，介质上没有有效文件系统时返回 [`LfsError::CORRUPT`]
    fn mount(&mut self) -> Result<(), LfsError>;
    /// 卸载，关闭所有打开的句柄
    fn unmount(&mut self) -> Result<(), LfsError>;
    /// 擦除整个介质
    fn erase_media(&mut self) -> Result<(), LfsError>;

    /// 打开文件
    fn file_open(&mut self, path: &str, flags: LfsOpenFlags) -> Result<LfsFileId, LfsError>;
    /// 关闭文件
    fn file_close(&mut self, file: LfsFileId) -> Result<(), LfsError>;
    /// 读取，返回读到的字节数
    fn file_read(&mut self, file: LfsFileId, buf: &mut [u8]) -> Result<usize, LfsError>;
    /// 写入，返回写入的字节数
    fn file_write(&mut self, file: LfsFileId, data: &[u8]) -> Result<usize, LfsError>;
    /// 移动读写位置，返回新位置
    fn file_seek(&mut self, file: LfsFileId, offset: i64, whence: LfsWhence)
    -> Result<u64, LfsError>;
    /// 当前读写位置
    fn file_tell(&mut self, file: LfsFileId) -> Result<u64, LfsError>;
    /// 文件大小
    fn file_size(&mut self, file: LfsFileId) -> Result<u64, LfsError>;
    /// 写回文件
    fn file_sync(&mut self, file: LfsFileId) -> Result<(), LfsError>;

    /// 打开目录
    fn dir_open(&mut self, path: &str) -> Result<LfsDirId, LfsError>;
    /// 读取下一个目录项，列举结束时返回 `None`
    fn dir_read(&mut self, dir: LfsDirId) -> Result<Option<LfsInfo>, LfsError>;
    /// 回到第一个目录项
    fn dir_rewind(&mut self, dir: LfsDirId) -> Result<(), LfsError>;
    /// 关闭目录
    fn dir_close(&mut self, dir: LfsDirId) -> Result<(), LfsError>;

    /// 查询元数据
    fn stat(&mut self, path: &str) -> Result<LfsInfo, LfsError>;
    /// 删除文件或空目录
    fn remove(&mut self, path: &str) -> Result<(), LfsError>;
    /// 重命名，目标已存在时替换（目录只能替换空目录）
    fn rename(&mut self, from: &str, to: &str) -> Result<(), LfsError>;
    /// 创建目录
    fn mkdir(&mut self, path: &str) -> Result<(), LfsError>;

    /// 已使用的块数
    fn fs_size(&mut self) -> Result<u64, LfsError>;
    /// 介质的总块数
    fn block_count(&self) -> u64;
    /// 块大小（字节）
    fn block_size(&self) -> u32;
}

/// 把路径拆成名字列表，名字超过 [`MAX_NAME_LEN`] 时返回 [`LfsError::NAMETOOLONG`]
fn components(path: &str) -> Result<Vec<String>, LfsError> {
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            if seg.len() > MAX_NAME_LEN {
                Err(LfsError::NAMETOOLONG)
            } else {
                Ok(seg.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_translation() {
        let flags = |f: OpenFlags| LfsOpenFlags::from(f);
        assert_eq!(flags(OpenFlags::READ), LfsOpenFlags::RDONLY);
        assert_eq!(
            flags(OpenFlags::READ | OpenFlags::WRITE),
            LfsOpenFlags::RDWR
        );
        assert_eq!(
            flags(OpenFlags::WRITE | OpenFlags::CREATE_NEW),
            LfsOpenFlags::WRONLY | LfsOpenFlags::CREAT | LfsOpenFlags::EXCL
        );
        assert_eq!(
            flags(OpenFlags::WRITE | OpenFlags::CREATE_ALWAYS),
            LfsOpenFlags::WRONLY | LfsOpenFlags::CREAT | LfsOpenFlags::TRUNC
        );
        assert_eq!(
            flags(OpenFlags::WRITE | OpenFlags::OPEN_ALWAYS),
            LfsOpenFlags::WRONLY | LfsOpenFlags::CREAT
        );
        assert_eq!(
            flags(OpenFlags::WRITE | OpenFlags::OPEN_APPEND),
            LfsOpenFlags::WRONLY | LfsOpenFlags::CREAT | LfsOpenFlags::APPEND
        );
    }

    #[test]
    fn test_error_translation() {
        assert_eq!(VfsError::from(LfsError::NOENT), VfsError::NoEnt);
        assert_eq!(VfsError::from(LfsError::NOTEMPTY), VfsError::NotEmpty);
        assert_eq!(VfsError::from(LfsError::NOSPC), VfsError::NoSpc);
        assert_eq!(VfsError::from(LfsError(-1000)), VfsError::Inval);
    }
}
